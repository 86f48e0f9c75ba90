//! Modal view-state machines for the terrain page.
//!
//! Each modal is an explicit enum; events move it between states and return the
//! side effect the page has to run (load a plan, save an assignment). Nothing
//! here touches the network.

use std::mem;

use chrono::NaiveDate;

use crate::beds::{BedViewState, ClickTarget};
use crate::models::{BedScheduleAdjust, BedScheduleClose, VoluntaryStore};
use crate::validation::{FieldErrors, Validate, REQUIRED};

/// One volunteer in the assignment list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolunteerEntry {
    pub people_id: String,
    pub name: String,
    pub start_at: NaiveDate,
}

/// Volunteers of a bed plus the chosen representative (the responsible one).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentForm {
    entries: Vec<VolunteerEntry>,
    representative: Option<String>,
    dirty: bool,
}

impl AssignmentForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-filled with the bed's current volunteers.
    pub fn from_bed(state: &BedViewState) -> Self {
        Self {
            entries: state
                .volunteers
                .iter()
                .map(|v| VolunteerEntry {
                    people_id: v.people_id.clone(),
                    name: v.people_name.clone(),
                    start_at: v.start_at,
                })
                .collect(),
            representative: state.responsible.as_ref().map(|v| v.people_id.clone()),
            dirty: false,
        }
    }

    pub fn entries(&self) -> &[VolunteerEntry] {
        &self.entries
    }

    pub fn representative(&self) -> Option<&str> {
        self.representative.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Adds a volunteer; the first one becomes representative. A person already
    /// in the list is not added twice.
    pub fn add(&mut self, entry: VolunteerEntry) -> bool {
        if self.entries.iter().any(|e| e.people_id == entry.people_id) {
            return false;
        }
        if self.entries.is_empty() {
            self.representative = Some(entry.people_id.clone());
        }
        self.entries.push(entry);
        self.dirty = true;
        true
    }

    /// Removes by position. Removing the representative hands the role to the
    /// first remaining volunteer.
    pub fn remove(&mut self, index: usize) -> Option<VolunteerEntry> {
        if index >= self.entries.len() {
            return None;
        }
        let removed = self.entries.remove(index);
        if self.representative.as_deref() == Some(removed.people_id.as_str()) {
            self.representative = self.entries.first().map(|e| e.people_id.clone());
        }
        self.dirty = true;
        Some(removed)
    }

    /// Makes `people_id` the representative; ignored if not in the list.
    pub fn select(&mut self, people_id: &str) -> bool {
        if !self.entries.iter().any(|e| e.people_id == people_id) {
            return false;
        }
        self.representative = Some(people_id.to_string());
        self.dirty = true;
        true
    }

    /// Closing with these changes needs a confirmation.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty && !self.entries.is_empty()
    }

    pub fn to_stores(&self, ground_id: &str, bed_label: &str) -> Vec<VoluntaryStore> {
        self.entries
            .iter()
            .map(|entry| VoluntaryStore {
                people_id: entry.people_id.clone(),
                ground_id: ground_id.to_string(),
                bed_label: bed_label.to_string(),
                start_at: entry.start_at,
                is_responsible: self.representative.as_deref() == Some(entry.people_id.as_str()),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTab {
    Volunteers,
    Planning,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BedModal {
    #[default]
    Closed,
    Info {
        bed: BedViewState,
    },
    Update {
        bed: BedViewState,
        tab: UpdateTab,
        form: AssignmentForm,
        confirm_discard: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BedModalEvent {
    ClickBed(BedViewState),
    /// "Edit" in the info modal
    Edit,
    OpenPlanning,
    BackToVolunteers,
    Close,
    ConfirmDiscard,
    CancelDiscard,
    Submit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BedModalEffect {
    None,
    /// Fetch the planting plan of this bed
    LoadPlantationPlan(BedViewState),
    /// Send this batch through `voluntaries/many`
    SaveAssignments(Vec<VoluntaryStore>),
}

impl BedModal {
    pub fn is_open(&self) -> bool {
        !matches!(self, BedModal::Closed)
    }

    pub fn handle(&mut self, event: BedModalEvent) -> BedModalEffect {
        let (next, effect) = transition(mem::take(self), event);
        *self = next;
        effect
    }

    /// The assignment form, when the update modal is open.
    pub fn form_mut(&mut self) -> Option<&mut AssignmentForm> {
        match self {
            BedModal::Update { form, .. } => Some(form),
            _ => None,
        }
    }
}

fn open_update(bed: BedViewState) -> BedModal {
    let form = AssignmentForm::from_bed(&bed);
    BedModal::Update {
        bed,
        tab: UpdateTab::Volunteers,
        form,
        confirm_discard: false,
    }
}

fn transition(state: BedModal, event: BedModalEvent) -> (BedModal, BedModalEffect) {
    use BedModalEvent as E;

    match (state, event) {
        (BedModal::Closed, E::ClickBed(bed)) => {
            let next = match bed.click_target() {
                ClickTarget::None => BedModal::Closed,
                ClickTarget::InfoModal => BedModal::Info { bed },
                ClickTarget::UpdateModal => open_update(bed),
            };
            (next, BedModalEffect::None)
        }
        (BedModal::Info { bed }, E::Edit) => (open_update(bed), BedModalEffect::None),
        (BedModal::Info { .. }, E::Close) => (BedModal::Closed, BedModalEffect::None),

        (BedModal::Update { bed, form, confirm_discard, .. }, E::OpenPlanning) => {
            let effect = BedModalEffect::LoadPlantationPlan(bed.clone());
            let next = BedModal::Update {
                bed,
                tab: UpdateTab::Planning,
                form,
                confirm_discard,
            };
            (next, effect)
        }
        (BedModal::Update { bed, form, confirm_discard, .. }, E::BackToVolunteers) => (
            BedModal::Update {
                bed,
                tab: UpdateTab::Volunteers,
                form,
                confirm_discard,
            },
            BedModalEffect::None,
        ),
        (BedModal::Update { bed, tab, form, .. }, E::Close) => {
            if form.has_unsaved_changes() {
                let next = BedModal::Update {
                    bed,
                    tab,
                    form,
                    confirm_discard: true,
                };
                (next, BedModalEffect::None)
            } else {
                (BedModal::Closed, BedModalEffect::None)
            }
        }
        (BedModal::Update { confirm_discard: true, .. }, E::ConfirmDiscard) => {
            (BedModal::Closed, BedModalEffect::None)
        }
        (BedModal::Update { bed, tab, form, .. }, E::CancelDiscard) => (
            BedModal::Update {
                bed,
                tab,
                form,
                confirm_discard: false,
            },
            BedModalEffect::None,
        ),
        (BedModal::Update { bed, form, .. }, E::Submit) => {
            let stores = form.to_stores(&bed.ground_id, &bed.bed.label);
            (BedModal::Closed, BedModalEffect::SaveAssignments(stores))
        }

        // Anything else leaves the modal where it is
        (state, _) => (state, BedModalEffect::None),
    }
}

// --- Harvest modal ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarvestTab {
    #[default]
    Close,
    Adjust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HarvestUnit {
    Grams,
    Kilograms,
    #[default]
    Units,
}

impl HarvestUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            HarvestUnit::Grams => "g",
            HarvestUnit::Kilograms => "kg",
            HarvestUnit::Units => "u",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdjustForm {
    pub end_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseForm {
    pub amount: Option<i64>,
    pub unit: HarvestUnit,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HarvestSubmission {
    Adjust(BedScheduleAdjust),
    Close(BedScheduleClose),
}

/// Harvest modal with two tabs; switching tabs keeps both forms' input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HarvestModal {
    #[default]
    Closed,
    Open {
        tab: HarvestTab,
        adjust: AdjustForm,
        close: CloseForm,
    },
}

impl HarvestModal {
    pub fn open() -> Self {
        HarvestModal::Open {
            tab: HarvestTab::default(),
            adjust: AdjustForm::default(),
            close: CloseForm::default(),
        }
    }

    pub fn select_tab(&mut self, selected: HarvestTab) {
        if let HarvestModal::Open { tab, .. } = self {
            *tab = selected;
        }
    }

    pub fn tab(&self) -> Option<HarvestTab> {
        match self {
            HarvestModal::Open { tab, .. } => Some(*tab),
            HarvestModal::Closed => None,
        }
    }

    pub fn adjust_form(&mut self) -> Option<&mut AdjustForm> {
        match self {
            HarvestModal::Open { adjust, .. } => Some(adjust),
            HarvestModal::Closed => None,
        }
    }

    pub fn close_form(&mut self) -> Option<&mut CloseForm> {
        match self {
            HarvestModal::Open { close, .. } => Some(close),
            HarvestModal::Closed => None,
        }
    }

    pub fn dismiss(&mut self) {
        *self = HarvestModal::Closed;
    }

    /// Validates the active tab's form. On success the modal closes and the
    /// payload for the matching endpoint is returned.
    pub fn submit(&mut self) -> Result<HarvestSubmission, FieldErrors> {
        let submission = match self {
            HarvestModal::Closed => return Err(FieldErrors::new()),
            HarvestModal::Open { tab: HarvestTab::Adjust, adjust, .. } => {
                let Some(end_at) = adjust.end_at else {
                    return Err(single("end_at", REQUIRED));
                };
                let body = BedScheduleAdjust { end_at };
                body.validate()?;
                HarvestSubmission::Adjust(body)
            }
            HarvestModal::Open { tab: HarvestTab::Close, close, .. } => {
                let mut missing = FieldErrors::new();
                if close.amount.is_none() {
                    missing.add("amount", REQUIRED);
                }
                if close.date.is_none() {
                    missing.add("date", REQUIRED);
                }
                let (Some(amount), Some(date)) = (close.amount, close.date) else {
                    return Err(missing);
                };
                let body = BedScheduleClose {
                    amount,
                    unit: close.unit.as_str().to_string(),
                    date,
                };
                body.validate()?;
                HarvestSubmission::Close(body)
            }
        };
        self.dismiss();
        Ok(submission)
    }
}

fn single(field: &str, message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.add(field, message);
    errors
}
