use serde::{Deserialize, Serialize};

/// Prose sections of a generated discharge summary. Field set and naming is
/// the stable external contract (spec §3) — every key is always present,
/// even when empty, so callers can rely on the shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub chief_complaint: String,
    pub history_of_present_illness: String,
    pub hospital_course: String,
    pub procedures: String,
    pub complications: String,
    pub consultations: String,
    pub discharge_status: String,
    pub discharge_medications: String,
    pub discharge_disposition: String,
    pub follow_up_plan: String,
}

impl NarrativeSection {
    /// Section keys considered critical: the orchestrator's section
    /// completer (spec §4.9) runs a focused LLM/template call for any
    /// section still empty after parsing, and if one of these three is
    /// still empty even after that, `quality::completeness` raises a
    /// critical issue rather than silently emitting an empty section.
    pub const CRITICAL_KEYS: &'static [&'static str] = &[
        "chief_complaint",
        "hospital_course",
        "discharge_disposition",
    ];

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "chief_complaint" => Some(&self.chief_complaint),
            "history_of_present_illness" => Some(&self.history_of_present_illness),
            "hospital_course" => Some(&self.hospital_course),
            "procedures" => Some(&self.procedures),
            "complications" => Some(&self.complications),
            "consultations" => Some(&self.consultations),
            "discharge_status" => Some(&self.discharge_status),
            "discharge_medications" => Some(&self.discharge_medications),
            "discharge_disposition" => Some(&self.discharge_disposition),
            "follow_up_plan" => Some(&self.follow_up_plan),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: String) {
        match key {
            "chief_complaint" => self.chief_complaint = value,
            "history_of_present_illness" => self.history_of_present_illness = value,
            "hospital_course" => self.hospital_course = value,
            "procedures" => self.procedures = value,
            "complications" => self.complications = value,
            "consultations" => self.consultations = value,
            "discharge_status" => self.discharge_status = value,
            "discharge_medications" => self.discharge_medications = value,
            "discharge_disposition" => self.discharge_disposition = value,
            "follow_up_plan" => self.follow_up_plan = value,
            _ => {}
        }
    }

    /// Keys whose value is empty or whitespace-only after generation.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        const ALL: &[&str] = &[
            "chief_complaint",
            "history_of_present_illness",
            "hospital_course",
            "procedures",
            "complications",
            "consultations",
            "discharge_status",
            "discharge_medications",
            "discharge_disposition",
            "follow_up_plan",
        ];
        ALL.iter()
            .copied()
            .filter(|k| self.get(k).map(|v| v.trim().is_empty()).unwrap_or(true))
            .collect()
    }

    pub fn missing_critical_keys(&self) -> Vec<&'static str> {
        self.missing_keys()
            .into_iter()
            .filter(|k| Self::CRITICAL_KEYS.contains(k))
            .collect()
    }
}
