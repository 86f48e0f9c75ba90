//! Terrain board: a ground plus one resolved view state per bed.

use chrono::NaiveDate;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::{Api, BatchOutcome, IndexQuery};
use crate::beds::{grid_columns, resolve_bed, BedViewState};
use crate::error::ApiResult;
use crate::guard::GuardError;
use crate::models::{Bed, BedSchedules, Ground, Pagination, Seed, Voluntary, VoluntaryStore};

/// Volunteers shown per bed; one page is enough for any real bed.
pub const VOLUNTEERS_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainBoard {
    pub ground: Ground,
    pub beds: Vec<BedViewState>,
}

/// One row of the planting-plan modal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPlanting {
    pub start_at: NaiveDate,
    pub end_at: NaiveDate,
    /// Seed name, empty when the seed could not be loaded
    pub plantation: String,
}

impl TerrainBoard {
    /// Loads the ground and resolves every bed.
    ///
    /// Only the ground fetch is fatal. A failed per-bed lookup is logged and the
    /// field it would have filled stays absent.
    pub async fn load(api: &Api, ground_id: &str) -> ApiResult<Self> {
        let ground = api.grounds().show(ground_id).await?;
        debug!(ground_id, beds = ground.beds.len(), "resolving terrain board");

        let beds = join_all(ground.beds.iter().map(|bed| load_bed(api, &ground.id, bed))).await;
        Ok(Self { ground, beds })
    }

    pub fn columns(&self) -> usize {
        grid_columns(self.beds.len())
    }

    pub fn bed(&self, label: &str) -> Option<&BedViewState> {
        self.beds.iter().find(|state| state.bed.label == label)
    }

    /// Rows of `columns()` cards, in bed order.
    pub fn rows(&self) -> Vec<&[BedViewState]> {
        match self.columns() {
            0 => Vec::new(),
            columns => self.beds.chunks(columns).collect(),
        }
    }

    /// Sends one batched assignment and logs every item the server refused.
    ///
    /// A second submission for the same bed while the first is in flight is
    /// rejected with [`GuardError::Busy`] and never reaches the server.
    pub async fn assign_volunteers(
        &self,
        api: &Api,
        assignments: Vec<VoluntaryStore>,
    ) -> Result<BatchOutcome, GuardError> {
        let bed_label = assignments
            .first()
            .map(|item| item.bed_label.as_str())
            .unwrap_or_default();
        let _claim = api
            .guard()
            .try_begin(format!("assign:{}:{bed_label}", self.ground.id))?;

        let outcome = api.voluntaries().store_many(&assignments).await?;
        for (index, error) in &outcome.failed {
            let people_id = assignments
                .get(*index)
                .map(|item| item.people_id.as_str())
                .unwrap_or_default();
            warn!(ground_id = %self.ground.id, %people_id, %error, "volunteer not assigned");
        }
        Ok(outcome)
    }
}

async fn load_bed(api: &Api, ground_id: &str, bed: &Bed) -> BedViewState {
    let (seed, volunteers, group) = tokio::join!(
        load_seed(api, bed),
        load_volunteers(api, ground_id, &bed.label),
        load_group(api, bed),
    );
    resolve_bed(bed, ground_id, group.as_ref(), seed.as_ref(), &volunteers)
}

async fn load_seed(api: &Api, bed: &Bed) -> Option<Seed> {
    let seed_id = bed.seed_id.as_deref()?;
    match api.seeds().show(seed_id).await {
        Ok(seed) => Some(seed),
        Err(err) => {
            warn!(bed = %bed.label, %seed_id, error = %err, "seed lookup failed");
            None
        }
    }
}

async fn load_volunteers(api: &Api, ground_id: &str, bed_label: &str) -> Vec<Voluntary> {
    let query = IndexQuery::new()
        .page(1, VOLUNTEERS_PAGE_SIZE)
        .filter("ground_id", ground_id)
        .filter("bed_label", bed_label);
    match api.voluntaries().index(&query).await {
        Ok(Pagination { entities, .. }) => entities,
        Err(err) => {
            warn!(bed = %bed_label, error = %err, "volunteer lookup failed");
            Vec::new()
        }
    }
}

async fn load_group(api: &Api, bed: &Bed) -> Option<BedSchedules> {
    let group_id = bed.bed_schedules_id.as_deref()?;
    match api.bed_schedules().show(group_id).await {
        Ok(group) => Some(group),
        Err(err) => {
            warn!(bed = %bed.label, %group_id, error = %err, "schedule group lookup failed");
            None
        }
    }
}

/// Schedule history of a bed with seed names, for the planting-plan modal.
///
/// A bed without a schedule group has an empty plan.
pub async fn plantation_plan(api: &Api, bed: &Bed) -> ApiResult<Vec<PlannedPlanting>> {
    let Some(group_id) = bed.bed_schedules_id.as_deref() else {
        return Ok(Vec::new());
    };
    let group = api.bed_schedules().show(group_id).await?;

    let names = join_all(group.schedules.iter().map(|schedule| async move {
        match api.seeds().show(&schedule.seed_id).await {
            Ok(seed) => seed.name,
            Err(err) => {
                warn!(seed_id = %schedule.seed_id, error = %err, "seed lookup failed");
                String::new()
            }
        }
    }))
    .await;

    Ok(group
        .schedules
        .iter()
        .zip(names)
        .map(|(schedule, plantation)| PlannedPlanting {
            start_at: schedule.start_at,
            end_at: schedule.end_at,
            plantation,
        })
        .collect())
}
