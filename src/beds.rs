//! Bed status resolution and card display.
//!
//! A bed is `Complete` when its schedule group has a current schedule whose seed
//! differs from the bed's own seed (the harvest cycle moved on), otherwise `Free`
//! or `Occupied` from the bed's `free` flag. Clicking routes purely on status.

use std::fmt;

use serde::Serialize;

use crate::models::{Bed, BedSchedule, BedSchedules, Seed, Voluntary};
use crate::util::format_period;

/// Shown wherever a display field has no source value.
pub const PLACEHOLDER: &str = "...";
pub const FREE_USER_TEXT: &str = "Volunteer";
pub const FREE_PERIOD_TEXT: &str = "Available for planting";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BedStatus {
    Free,
    Occupied,
    Complete,
}

impl BedStatus {
    /// Legend entries in board order.
    pub const LEGEND: [BedStatus; 3] = [BedStatus::Free, BedStatus::Complete, BedStatus::Occupied];

    pub fn legend_label(self) -> &'static str {
        match self {
            BedStatus::Free => "Available",
            BedStatus::Complete => "Ready for harvest",
            BedStatus::Occupied => "Occupied",
        }
    }

    pub fn click_target(self) -> ClickTarget {
        match self {
            BedStatus::Complete => ClickTarget::None,
            BedStatus::Occupied => ClickTarget::InfoModal,
            BedStatus::Free => ClickTarget::UpdateModal,
        }
    }
}

impl fmt::Display for BedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BedStatus::Free => "free",
            BedStatus::Occupied => "occupied",
            BedStatus::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Which modal a click on a bed opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    /// Read-only, nothing opens
    None,
    InfoModal,
    UpdateModal,
}

/// Active schedule of a group; an out-of-range or negative index means none.
pub fn current_schedule(group: &BedSchedules) -> Option<&BedSchedule> {
    let index = usize::try_from(group.current_schedule?).ok()?;
    group.schedules.get(index)
}

pub fn bed_status(bed: &Bed, current: Option<&BedSchedule>) -> BedStatus {
    let completed = current.is_some_and(|schedule| bed.seed_id.as_ref() != Some(&schedule.seed_id));
    if completed {
        BedStatus::Complete
    } else if bed.free {
        BedStatus::Free
    } else {
        BedStatus::Occupied
    }
}

/// Derived, never persisted; rebuilt whenever a source entity changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BedViewState {
    pub ground_id: String,
    pub bed: Bed,
    pub status: BedStatus,
    pub current_schedule: Option<BedSchedule>,
    pub seed: Option<Seed>,
    pub responsible: Option<Voluntary>,
    pub volunteers: Vec<Voluntary>,
}

/// Combines a bed with its schedule group, seed and volunteers.
///
/// The group only counts when the bed links one; seeds and volunteers that
/// belong to another bed are ignored.
pub fn resolve_bed(
    bed: &Bed,
    ground_id: &str,
    group: Option<&BedSchedules>,
    seed: Option<&Seed>,
    volunteers: &[Voluntary],
) -> BedViewState {
    let current = group
        .filter(|_| bed.bed_schedules_id.is_some())
        .and_then(current_schedule);
    let status = bed_status(bed, current);

    let volunteers: Vec<Voluntary> = volunteers
        .iter()
        .filter(|v| v.ground_id == ground_id && v.bed_label == bed.label)
        .cloned()
        .collect();
    let responsible = volunteers.iter().find(|v| v.is_responsible).cloned();

    BedViewState {
        ground_id: ground_id.to_string(),
        bed: bed.clone(),
        status,
        current_schedule: current.cloned(),
        seed: seed
            .filter(|seed| bed.seed_id.as_deref() == Some(seed.id.as_str()))
            .cloned(),
        responsible,
        volunteers,
    }
}

/// What a bed card on the board shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BedCard {
    pub status: BedStatus,
    pub label: String,
    pub user: String,
    pub period: String,
    /// No plant line on free cards
    pub plant: Option<String>,
}

impl BedViewState {
    pub fn click_target(&self) -> ClickTarget {
        self.status.click_target()
    }

    pub fn period(&self) -> String {
        self.current_schedule
            .as_ref()
            .map(|s| format_period(s.start_at, s.end_at))
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn plant(&self) -> String {
        self.seed
            .as_ref()
            .map(|seed| seed.name.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn user(&self) -> String {
        self.responsible
            .as_ref()
            .map(|v| v.people_name.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn card(&self) -> BedCard {
        let label = self.bed.label.clone();
        match self.status {
            BedStatus::Free => BedCard {
                status: BedStatus::Free,
                label,
                user: FREE_USER_TEXT.to_string(),
                period: FREE_PERIOD_TEXT.to_string(),
                plant: None,
            },
            status => BedCard {
                status,
                label,
                user: self.user(),
                period: self.period(),
                plant: Some(self.plant()),
            },
        }
    }
}

/// Board width: `ceil(sqrt(bed_count))` columns.
pub fn grid_columns(bed_count: usize) -> usize {
    let mut columns = 0;
    while columns * columns < bed_count {
        columns += 1;
    }
    columns
}
