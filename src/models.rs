//! Wire entities of the garden REST API.
//!
//! Field names match the JSON on the wire (snake_case). Update payloads skip
//! `None` fields so only the changed values are sent.

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::validation::Validate;

/// Server-assigned identifier (opaque string)
pub type Id = String;

/// Paginated listing: `{entities, row_count}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pagination<T> {
    pub entities: Vec<T>,
    pub row_count: i64,
}

/// A REST resource served under `/api/<PATH>`.
///
/// Ties the entity to its store/update payloads and to the shape `index` returns
/// (most resources paginate, request/usage resources return a bare list).
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const PATH: &'static str;
    /// Resources whose cached reads go stale when this one changes
    const DEPENDENTS: &'static [&'static str] = &[];
    type Store: Serialize + Validate + Send + Sync;
    type Update: Serialize + Validate + Send + Sync;
    type Listing: Serialize + DeserializeOwned + Send + 'static;
}

// --- Auth ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthLoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub cellphone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserStore {
    pub name: String,
    pub email: String,
    pub password: String,
    pub cellphone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cellphone: Option<String>,
}

impl Entity for UserResponse {
    const PATH: &'static str = "/api/users";
    type Store = UserStore;
    type Update = UserUpdate;
    type Listing = Pagination<UserResponse>;
}

// --- People ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct People {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub birth_date: NaiveDate,
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PeopleStore {
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub birth_date: NaiveDate,
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PeopleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cellphone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Entity for People {
    const PATH: &'static str = "/api/peoples";
    type Store = PeopleStore;
    type Update = PeopleUpdate;
    type Listing = Pagination<People>;
}

// --- Tools ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub amount: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ToolStore {
    pub name: String,
    pub amount: i64,
    pub description: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Entity for Tool {
    const PATH: &'static str = "/api/tools";
    type Store = ToolStore;
    type Update = ToolUpdate;
    type Listing = Pagination<Tool>;
}

// --- Seeds ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SeedType {
    Vegetable,
    Fruit,
    Herb,
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Seed {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub amount: i64,
    pub seed_type: SeedType,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SeedStore {
    pub name: String,
    pub amount: i64,
    pub description: String,
    pub seed_type: SeedType,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed_type: Option<SeedType>,
}

impl Entity for Seed {
    const PATH: &'static str = "/api/seeds";
    type Store = SeedStore;
    type Update = SeedUpdate;
    type Listing = Pagination<Seed>;
}

// --- Grounds (terrains) and beds ---

/// One plantable subdivision of a ground; `label` is unique within the ground.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Bed {
    pub label: String,
    pub active: bool,
    pub free: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_id: Option<Id>,
    /// Schedule group id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_schedules_id: Option<Id>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ground {
    pub id: Id,
    pub address: String,
    pub width: i64,
    pub length: i64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<Id>,
    pub active: bool,
    #[serde(default)]
    pub beds: Vec<Bed>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroundStore {
    pub width: i64,
    pub length: i64,
    pub address: String,
    pub description: String,
    pub beds_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Id>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Id>,
}

impl Entity for Ground {
    const PATH: &'static str = "/api/grounds";
    type Store = GroundStore;
    type Update = GroundUpdate;
    type Listing = Pagination<Ground>;
}

// --- Bed schedules (schedule groups) ---

/// Planned planting-to-harvest interval for one seed
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BedSchedule {
    pub seed_id: Id,
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
}

/// Ordered schedule history of one bed plus the index of the active entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BedSchedules {
    pub id: Id,
    pub ground_id: Id,
    pub bed_label: String,
    #[serde(default)]
    pub schedules: Vec<BedSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_schedule: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BedScheduleStore {
    pub ground_id: Id,
    pub bed_label: String,
    pub schedules: Vec<BedSchedule>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BedScheduleUpdate {
    pub schedules: Vec<BedSchedule>,
    pub current_schedule: i64,
}

/// Moves the harvest date of the current schedule
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BedScheduleAdjust {
    pub end_at: NaiveDate,
}

/// Records the harvest that closes the current schedule
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BedScheduleClose {
    pub amount: i64,
    pub unit: String,
    pub date: NaiveDate,
}

/// Storing, closing or deleting a group rewrites the bed on its ground.
impl Entity for BedSchedules {
    const PATH: &'static str = "/api/bed-schedules";
    const DEPENDENTS: &'static [&'static str] = &[Ground::PATH];
    type Store = BedScheduleStore;
    type Update = BedScheduleUpdate;
    type Listing = Pagination<BedSchedules>;
}

// --- Voluntaries (volunteer assignments) ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Voluntary {
    pub id: Id,
    pub people_id: Id,
    pub people_name: String,
    pub ground_id: Id,
    pub bed_label: String,
    pub is_responsible: bool,
    pub start_at: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryStore {
    pub people_id: Id,
    pub ground_id: Id,
    pub bed_label: String,
    pub start_at: NaiveDate,
    pub is_responsible: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VoluntaryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_at: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_at: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_responsible: Option<bool>,
}

/// Per-item result of a batched assignment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryOrError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voluntary: Option<Voluntary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryStoreMany {
    pub results: Vec<VoluntaryOrError>,
}

impl Entity for Voluntary {
    const PATH: &'static str = "/api/voluntaries";
    type Store = VoluntaryStore;
    type Update = VoluntaryUpdate;
    type Listing = Pagination<Voluntary>;
}

// --- Ground donation requests ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroundDonate {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub ground_address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroundDonateStore {
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub birth_date: NaiveDate,
    pub address: String,
    pub ground_address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundDonateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cellphone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_address: Option<String>,
}

impl Entity for GroundDonate {
    const PATH: &'static str = "/api/grounds-donate";
    type Store = GroundDonateStore;
    type Update = GroundDonateUpdate;
    type Listing = Pagination<GroundDonate>;
}

// --- Volunteer requests ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryRequest {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub birth_date: NaiveDate,
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryRequestStore {
    pub name: String,
    pub email: String,
    pub cellphone: String,
    pub birth_date: NaiveDate,
    pub address: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VoluntaryRequestUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cellphone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Entity for VoluntaryRequest {
    const PATH: &'static str = "/api/voluntaries-request";
    type Store = VoluntaryRequestStore;
    type Update = VoluntaryRequestUpdate;
    type Listing = Vec<VoluntaryRequest>;
}

// --- Tool / seed usage tracking ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryUsingTool {
    pub voluntary_id: Id,
    pub tool_id: Id,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryUsingToolStart {
    pub voluntary_id: Id,
    pub tool_id: Id,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryUsingSeed {
    pub voluntary_id: Id,
    pub seed_id: Id,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VoluntaryUsingSeedStart {
    pub voluntary_id: Id,
    pub seed_id: Id,
}

/// Usage-tracking resources: started and ended, never updated in place.
pub trait UsageRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const PATH: &'static str;
    type Start: Serialize + Validate + Send + Sync;
}

impl UsageRecord for VoluntaryUsingTool {
    const PATH: &'static str = "/api/voluntaries-using-tools";
    type Start = VoluntaryUsingToolStart;
}

impl UsageRecord for VoluntaryUsingSeed {
    const PATH: &'static str = "/api/voluntaries-using-seeds";
    type Start = VoluntaryUsingSeedStart;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bed_optional_links_default_to_none() {
        let bed: Bed = serde_json::from_value(json!({
            "label": "A1",
            "active": true,
            "free": true
        }))
        .unwrap();
        assert_eq!(bed.seed_id, None);
        assert_eq!(bed.bed_schedules_id, None);
    }

    #[test]
    fn update_payload_omits_untouched_fields() {
        let update = SeedUpdate {
            amount: Some(12),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&update).unwrap(), json!({ "amount": 12 }));
    }

    #[test]
    fn schedule_group_reads_iso_dates() {
        let group: BedSchedules = serde_json::from_value(json!({
            "id": "g1",
            "ground_id": "t1",
            "bed_label": "A2",
            "schedules": [{ "seed_id": "s1", "start_at": "2024-03-01", "end_at": "2024-06-30" }],
            "current_schedule": 0
        }))
        .unwrap();
        assert_eq!(group.current_schedule, Some(0));
        assert_eq!(
            group.schedules[0].end_at,
            NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
        );
    }

    #[test]
    fn seed_type_is_lowercase_on_the_wire() {
        assert_eq!(serde_json::to_value(SeedType::Herb).unwrap(), json!("herb"));
    }
}
