use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::citation::Citation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    Pass,
    Fail,
    /// A standard applies but the property is absent or not numeric.
    Missing,
    /// Value extracted, no standard configured for it.
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementStatus {
    Pass,
    Fail,
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pass,
    Fail,
    Incomplete,
    NoElements,
}

#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    pub property: String,
    pub label: String,
    pub unit: Option<String>,
    pub value: Option<f64>,
    /// Original text when the stored value could not be read as a number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// `<property set>.<property>` the value came from.
    pub source: Option<String>,
    /// Rendered comparison, e.g. `≤ 0.06`.
    pub standard: Option<String>,
    pub note: Option<String>,
    pub status: FindingStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementReport {
    pub target_id: String,
    pub target_label: String,
    pub step_id: u64,
    pub global_id: String,
    pub ifc_type: String,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub status: ElementStatus,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TargetSummary {
    pub label: String,
    pub elements: usize,
    pub passed: usize,
    pub failed: usize,
    pub incomplete: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub elements_scanned: usize,
    pub elements_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub incomplete: usize,
    pub findings_failed: usize,
    pub findings_missing: usize,
    pub per_target: BTreeMap<String, TargetSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub report_id: Uuid,
    pub file_name: String,
    pub checked_at: DateTime<Utc>,
    pub schema: Option<String>,
    pub status: ReportStatus,
    pub summary: Summary,
    pub elements: Vec<ElementReport>,
    pub citations: Vec<Citation>,
    pub warnings: Vec<String>,
}

impl ElementStatus {
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.iter().any(|f| f.status == FindingStatus::Fail) {
            ElementStatus::Fail
        } else if findings.iter().any(|f| f.status == FindingStatus::Missing) {
            ElementStatus::Incomplete
        } else {
            ElementStatus::Pass
        }
    }
}

impl ReportStatus {
    pub fn from_elements(elements: &[ElementReport]) -> Self {
        if elements.is_empty() {
            ReportStatus::NoElements
        } else if elements.iter().any(|e| e.status == ElementStatus::Fail) {
            ReportStatus::Fail
        } else if elements.iter().any(|e| e.status == ElementStatus::Incomplete) {
            ReportStatus::Incomplete
        } else {
            ReportStatus::Pass
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pass => "pass",
            ReportStatus::Fail => "fail",
            ReportStatus::Incomplete => "incomplete",
            ReportStatus::NoElements => "no_elements",
        }
    }
}
