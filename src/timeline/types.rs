use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::EntityFamily;

/// Where an event falls relative to the patient's admission and nearest
/// surgery, computed by the builder (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventRelation {
    PreAdmission,
    PreOp,
    IntraOp,
    PostOp,
    Unknown,
}

/// One entry in the chronological hospital-course timeline. Corresponds to
/// one merged new_event entity (spec §3: `{date, type, description,
/// relationships, pod}`, plus the builder's own `daysSinceAdmission`/
/// `relation` additions from §4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub entity_id: Uuid,
    #[serde(rename = "type")]
    pub event_type: EntityFamily,
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Ids of the `EntityReference`s that resolved back to this event.
    pub relationships: Vec<Uuid>,
    pub pod: Option<i64>,
    pub days_since_admission: Option<i64>,
    pub relation: EventRelation,
}

/// The chronologically-ordered hospital course (spec §3/§4.7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub events: Vec<TimelineEvent>,
    pub admission_date: Option<NaiveDate>,
    pub discharge_date: Option<NaiveDate>,
}

impl Timeline {
    /// Spec §4.7 invariant (i): dated events are non-decreasing; unknown-date
    /// events only ever trail, never interleave with dated ones.
    pub fn is_sorted(&self) -> bool {
        let mut last_date: Option<NaiveDate> = None;
        let mut seen_unknown = false;
        for event in &self.events {
            match event.date {
                Some(d) => {
                    if seen_unknown {
                        return false;
                    }
                    if let Some(last) = last_date {
                        if d < last {
                            return false;
                        }
                    }
                    last_date = Some(d);
                }
                None => seen_unknown = true,
            }
        }
        true
    }
}
