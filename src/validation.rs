//! Client-side form validation.
//!
//! Payloads are checked before they are sent; failures come back as
//! [`FieldErrors`] keyed by wire field name so forms can show them inline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;

use crate::models::{
    BedSchedule, BedScheduleAdjust, BedScheduleClose, BedScheduleStore, BedScheduleUpdate,
    GroundDonateStore, GroundDonateUpdate, GroundStore, GroundUpdate, PeopleStore, PeopleUpdate,
    SeedStore, SeedUpdate, ToolStore, ToolUpdate, UserStore, UserUpdate, VoluntaryRequestStore,
    VoluntaryRequestUpdate, VoluntaryStore, VoluntaryUpdate, VoluntaryUsingSeedStart,
    VoluntaryUsingToolStart,
};

pub const REQUIRED: &str = "Required field";
pub const INVALID_EMAIL: &str = "Invalid email";
pub const NOT_POSITIVE: &str = "Must be greater than 0";
pub const BEFORE_2000: &str = "Year must be 2000 or later";
pub const END_BEFORE_START: &str = "Harvest date must be after planting date";
pub const NOT_ADULT: &str = "Must represent an adult";
pub const MANY_RESPONSIBLE: &str = "Only one responsible volunteer per bed";

/// Per-field error messages; the first message recorded for a field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    // --- rule helpers ---

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.add(field, REQUIRED);
        } else if !looks_like_email(value.trim()) {
            self.add(field, INVALID_EMAIL);
        }
        self
    }

    pub fn positive(&mut self, field: &str, value: i64) -> &mut Self {
        if value <= 0 {
            self.add(field, NOT_POSITIVE);
        }
        self
    }

    pub fn since_2000(&mut self, field: &str, value: NaiveDate) -> &mut Self {
        if value.year() < 2000 {
            self.add(field, BEFORE_2000);
        }
        self
    }

    pub fn adult(&mut self, field: &str, birth_date: NaiveDate) -> &mut Self {
        let today = Local::now().date_naive();
        if today.years_since(birth_date).unwrap_or(0) < 18 {
            self.add(field, NOT_ADULT);
        }
        self
    }

    fn required_opt(&mut self, field: &str, value: Option<&String>) -> &mut Self {
        if let Some(value) = value {
            self.required(field, value);
        }
        self
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{k}: {v}")).collect();
        write!(f, "{}", parts.join("; "))
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() >= 2
                && domain.split('.').all(|part| !part.is_empty())
        }
        None => false,
    }
}

/// Checked before a payload leaves the client.
pub trait Validate {
    fn validate(&self) -> Result<(), FieldErrors>;
}

impl Validate for PeopleStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("name", &self.name)
            .email("email", &self.email)
            .required("cellphone", &self.cellphone)
            .required("address", &self.address)
            .adult("birth_date", self.birth_date);
        errors.into_result()
    }
}

impl Validate for PeopleUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required_opt("name", self.name.as_ref())
            .required_opt("cellphone", self.cellphone.as_ref())
            .required_opt("address", self.address.as_ref());
        if let Some(email) = &self.email {
            errors.email("email", email);
        }
        if let Some(birth_date) = self.birth_date {
            errors.adult("birth_date", birth_date);
        }
        errors.into_result()
    }
}

impl Validate for UserStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("name", &self.name)
            .email("email", &self.email)
            .required("password", &self.password)
            .required("cellphone", &self.cellphone);
        errors.into_result()
    }
}

impl Validate for UserUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required_opt("name", self.name.as_ref())
            .required_opt("password", self.password.as_ref())
            .required_opt("cellphone", self.cellphone.as_ref());
        if let Some(email) = &self.email {
            errors.email("email", email);
        }
        errors.into_result()
    }
}

impl Validate for ToolStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("name", &self.name)
            .positive("amount", self.amount);
        errors.into_result()
    }
}

impl Validate for ToolUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.required_opt("name", self.name.as_ref());
        if let Some(amount) = self.amount {
            errors.positive("amount", amount);
        }
        errors.into_result()
    }
}

impl Validate for SeedStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("name", &self.name)
            .positive("amount", self.amount);
        errors.into_result()
    }
}

impl Validate for SeedUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.required_opt("name", self.name.as_ref());
        if let Some(amount) = self.amount {
            errors.positive("amount", amount);
        }
        errors.into_result()
    }
}

impl Validate for GroundStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("address", &self.address)
            .required("description", &self.description)
            .positive("width", self.width)
            .positive("length", self.length)
            .positive("beds_count", self.beds_count);
        errors.into_result()
    }
}

impl Validate for GroundUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required_opt("address", self.address.as_ref())
            .required_opt("description", self.description.as_ref());
        if let Some(width) = self.width {
            errors.positive("width", width);
        }
        if let Some(length) = self.length {
            errors.positive("length", length);
        }
        errors.into_result()
    }
}

/// Schedules are reported as `schedules.<index>.<field>`.
fn check_schedules(errors: &mut FieldErrors, schedules: &[BedSchedule]) {
    for (index, schedule) in schedules.iter().enumerate() {
        let prefix = format!("schedules.{index}");
        errors.required(&format!("{prefix}.seed_id"), &schedule.seed_id);
        errors.since_2000(&format!("{prefix}.start_at"), schedule.start_at);
        errors.since_2000(&format!("{prefix}.end_at"), schedule.end_at);
        if schedule.end_at < schedule.start_at {
            errors.add(format!("{prefix}.end_at"), END_BEFORE_START);
        }
    }
}

impl Validate for BedScheduleStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("ground_id", &self.ground_id)
            .required("bed_label", &self.bed_label);
        check_schedules(&mut errors, &self.schedules);
        errors.into_result()
    }
}

impl Validate for BedScheduleUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        check_schedules(&mut errors, &self.schedules);
        let in_range = usize::try_from(self.current_schedule)
            .map(|index| index < self.schedules.len())
            .unwrap_or(false);
        if !in_range {
            errors.add("current_schedule", "Must point at an existing schedule");
        }
        errors.into_result()
    }
}

impl Validate for BedScheduleAdjust {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.since_2000("end_at", self.end_at);
        errors.into_result()
    }
}

impl Validate for BedScheduleClose {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .positive("amount", self.amount)
            .required("unit", &self.unit)
            .since_2000("date", self.date);
        errors.into_result()
    }
}

impl Validate for VoluntaryStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("people_id", &self.people_id)
            .required("ground_id", &self.ground_id)
            .required("bed_label", &self.bed_label)
            .since_2000("start_at", self.start_at);
        errors.into_result()
    }
}

/// A batch assignment for one bed: each item valid, at most one responsible.
impl Validate for [VoluntaryStore] {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        for (index, item) in self.iter().enumerate() {
            if let Err(item_errors) = item.validate() {
                for (field, message) in item_errors.iter() {
                    errors.add(format!("{index}.{field}"), message);
                }
            }
        }
        if self.iter().filter(|item| item.is_responsible).count() > 1 {
            errors.add("is_responsible", MANY_RESPONSIBLE);
        }
        errors.into_result()
    }
}

impl Validate for VoluntaryUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if let Some(start_at) = self.start_at {
            errors.since_2000("start_at", start_at);
        }
        if let (Some(start_at), Some(end_at)) = (self.start_at, self.end_at) {
            if end_at < start_at {
                errors.add("end_at", "End date must be after start date");
            }
        }
        errors.into_result()
    }
}

impl Validate for GroundDonateStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("name", &self.name)
            .email("email", &self.email)
            .required("cellphone", &self.cellphone)
            .required("address", &self.address)
            .required("ground_address", &self.ground_address)
            .adult("birth_date", self.birth_date);
        errors.into_result()
    }
}

impl Validate for GroundDonateUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required_opt("name", self.name.as_ref())
            .required_opt("cellphone", self.cellphone.as_ref())
            .required_opt("address", self.address.as_ref())
            .required_opt("ground_address", self.ground_address.as_ref());
        if let Some(email) = &self.email {
            errors.email("email", email);
        }
        errors.into_result()
    }
}

impl Validate for VoluntaryRequestStore {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("name", &self.name)
            .email("email", &self.email)
            .required("cellphone", &self.cellphone)
            .required("address", &self.address)
            .adult("birth_date", self.birth_date);
        errors.into_result()
    }
}

impl Validate for VoluntaryRequestUpdate {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required_opt("name", self.name.as_ref())
            .required_opt("cellphone", self.cellphone.as_ref())
            .required_opt("address", self.address.as_ref());
        if let Some(email) = &self.email {
            errors.email("email", email);
        }
        errors.into_result()
    }
}

impl Validate for VoluntaryUsingToolStart {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("voluntary_id", &self.voluntary_id)
            .required("tool_id", &self.tool_id);
        errors.into_result()
    }
}

impl Validate for VoluntaryUsingSeedStart {
    fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors
            .required("voluntary_id", &self.voluntary_id)
            .required("seed_id", &self.seed_id);
        errors.into_result()
    }
}
