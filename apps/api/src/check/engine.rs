//! Compliance engine: element → target → whitelisted properties → standards.

use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::check::extract::{extract_property, Extraction};
use crate::check::matcher::match_target;
use crate::check::report::{
    CheckReport, ElementReport, ElementStatus, Finding, FindingStatus, ReportStatus, Summary,
    TargetSummary,
};
use crate::ifc::{IfcElement, IfcModel};
use crate::standards::models::{PropertySpec, StandardsConfig, TargetDefinition};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
}

/// Checks every element that matches a configured target.
///
/// `only` restricts the report to the named target ids. Elements are still
/// matched against the full target list, so an element claimed by an
/// excluded target is skipped rather than reassigned.
pub fn check_model(
    model: &IfcModel,
    config: &StandardsConfig,
    only: Option<&[String]>,
    file_name: &str,
) -> Result<CheckReport, CheckError> {
    let selected: Option<HashSet<&str>> = match only {
        Some(ids) if !ids.is_empty() => {
            for id in ids {
                if !config.targets.iter().any(|t| &t.id == id) {
                    return Err(CheckError::UnknownTarget(id.clone()));
                }
            }
            Some(ids.iter().map(String::as_str).collect())
        }
        _ => None,
    };
    let included = |target: &TargetDefinition| {
        selected
            .as_ref()
            .map_or(true, |ids| ids.contains(target.id.as_str()))
    };

    let mut elements = Vec::new();
    for element in &model.elements {
        let Some(target) = match_target(element, &config.targets) else {
            continue;
        };
        if !included(target) {
            continue;
        }
        elements.push(check_element(element, target));
    }

    let summary = summarize(
        model.elements.len(),
        &elements,
        config.targets.iter().filter(|t| included(*t)),
    );
    let status = ReportStatus::from_elements(&elements);

    info!(
        "Checked {file_name}: {} of {} elements matched, status {}",
        summary.elements_checked,
        summary.elements_scanned,
        status.as_str()
    );

    Ok(CheckReport {
        report_id: Uuid::new_v4(),
        file_name: file_name.to_string(),
        checked_at: Utc::now(),
        schema: model.schema.clone(),
        status,
        summary,
        elements,
        citations: vec![],
        warnings: vec![],
    })
}

pub fn check_element(element: &IfcElement, target: &TargetDefinition) -> ElementReport {
    let findings: Vec<Finding> = target
        .properties
        .iter()
        .flat_map(|spec| evaluate_property(element, target, spec))
        .collect();

    debug!(
        "{} #{} ({}) as {}: {} findings",
        element.ifc_type,
        element.step_id,
        element.display_name(),
        target.id,
        findings.len()
    );

    ElementReport {
        target_id: target.id.clone(),
        target_label: target.label.clone(),
        step_id: element.step_id,
        global_id: element.global_id.clone(),
        ifc_type: element.ifc_type.clone(),
        name: element.name.clone(),
        tag: element.tag.clone(),
        status: ElementStatus::from_findings(&findings),
        findings,
    }
}

/// One finding per standard on the property, or a single `Info` finding when
/// the property has none.
fn evaluate_property(
    element: &IfcElement,
    target: &TargetDefinition,
    spec: &PropertySpec,
) -> Vec<Finding> {
    let extraction = extract_property(element, spec);
    let (value, raw, source) = match &extraction {
        Extraction::Found { value, source } => (Some(*value), None, Some(source.clone())),
        Extraction::NotNumeric { raw, source } => (None, Some(raw.clone()), Some(source.clone())),
        Extraction::Missing => (None, None, None),
    };
    let base = Finding {
        property: spec.key.clone(),
        label: spec.label.clone(),
        unit: spec.unit.clone(),
        value,
        raw,
        source,
        standard: None,
        note: None,
        status: FindingStatus::Info,
    };

    let findings: Vec<Finding> = target
        .standards_for(&spec.key)
        .map(|standard| Finding {
            standard: Some(standard.comparison.describe()),
            note: standard.note.clone(),
            status: match value {
                Some(v) if standard.comparison.evaluate(v) => FindingStatus::Pass,
                Some(_) => FindingStatus::Fail,
                None => FindingStatus::Missing,
            },
            ..base.clone()
        })
        .collect();

    if findings.is_empty() {
        vec![base]
    } else {
        findings
    }
}

fn summarize<'a>(
    scanned: usize,
    elements: &[ElementReport],
    targets: impl Iterator<Item = &'a TargetDefinition>,
) -> Summary {
    let mut per_target: BTreeMap<String, TargetSummary> = targets
        .map(|t| {
            (
                t.id.clone(),
                TargetSummary {
                    label: t.label.clone(),
                    ..Default::default()
                },
            )
        })
        .collect();

    let mut summary = Summary {
        elements_scanned: scanned,
        elements_checked: elements.len(),
        ..Default::default()
    };

    for element in elements {
        let entry = per_target.entry(element.target_id.clone()).or_default();
        entry.elements += 1;
        match element.status {
            ElementStatus::Pass => {
                summary.passed += 1;
                entry.passed += 1;
            }
            ElementStatus::Fail => {
                summary.failed += 1;
                entry.failed += 1;
            }
            ElementStatus::Incomplete => {
                summary.incomplete += 1;
                entry.incomplete += 1;
            }
        }
        for finding in &element.findings {
            match finding.status {
                FindingStatus::Fail => summary.findings_failed += 1,
                FindingStatus::Missing => summary.findings_missing += 1,
                _ => {}
            }
        }
    }

    summary.per_target = per_target;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifc::{ModelReader, StepModelReader, RAILWAY_FIXTURE};
    use crate::standards::defaults::default_config;
    use crate::standards::models::Comparison;

    fn fixture_report(only: Option<&[String]>) -> CheckReport {
        let model = StepModelReader.read(RAILWAY_FIXTURE.as_bytes()).unwrap();
        check_model(&model, &default_config(), only, "railway.ifc").unwrap()
    }

    fn by_tag<'a>(report: &'a CheckReport, tag: &str) -> &'a ElementReport {
        report
            .elements
            .iter()
            .find(|e| e.tag.as_deref() == Some(tag))
            .unwrap_or_else(|| panic!("no element tagged {tag}"))
    }

    #[test]
    fn test_fixture_overall() {
        let report = fixture_report(None);
        assert_eq!(report.status, ReportStatus::Fail);
        assert_eq!(report.summary.elements_scanned, 8);
        assert_eq!(report.summary.elements_checked, 7);
        assert_eq!(report.summary.passed, 4);
        assert_eq!(report.summary.failed, 2);
        assert_eq!(report.summary.incomplete, 1);
        assert_eq!(report.summary.per_target["rail"].elements, 2);
        assert_eq!(report.summary.per_target["rail"].failed, 1);
    }

    #[test]
    fn test_unmatched_elements_are_not_reported() {
        let report = fixture_report(None);
        assert!(report.elements.iter().all(|e| e.ifc_type != "IFCWALL"));
    }

    #[test]
    fn test_failing_ramp_findings() {
        let report = fixture_report(None);
        let ramp = by_tag(&report, "R-02");
        assert_eq!(ramp.status, ElementStatus::Fail);
        let slope = ramp.findings.iter().find(|f| f.property == "slope").unwrap();
        assert_eq!(slope.status, FindingStatus::Fail);
        assert_eq!(slope.standard.as_deref(), Some("≤ 0.06"));
        let width = ramp.findings.iter().find(|f| f.property == "width").unwrap();
        assert_eq!(width.status, FindingStatus::Missing);
        assert_eq!(width.value, None);
    }

    #[test]
    fn test_property_without_standard_is_info() {
        let report = fixture_report(None);
        let platform = by_tag(&report, "B-01");
        assert_eq!(platform.status, ElementStatus::Pass);
        let length = platform
            .findings
            .iter()
            .find(|f| f.property == "length")
            .unwrap();
        assert_eq!(length.status, FindingStatus::Info);
        assert_eq!(length.value, Some(210.0));
    }

    #[test]
    fn test_missing_only_is_incomplete() {
        let report = fixture_report(None);
        let mast = by_tag(&report, "M-12");
        assert_eq!(mast.status, ElementStatus::Incomplete);
        assert!(mast
            .findings
            .iter()
            .all(|f| f.status == FindingStatus::Missing));
    }

    #[test]
    fn test_type_override_fails_gauge() {
        let report = fixture_report(None);
        assert_eq!(by_tag(&report, "S-01").status, ElementStatus::Pass);
        let s02 = by_tag(&report, "S-02");
        assert_eq!(s02.findings[0].value, Some(1442.0));
        assert_eq!(s02.findings[0].status, FindingStatus::Fail);
    }

    #[test]
    fn test_target_filter() {
        let only = vec!["sleeper".to_string(), "platform".to_string()];
        let report = fixture_report(Some(only.as_slice()));
        assert_eq!(report.status, ReportStatus::Pass);
        assert_eq!(report.summary.elements_checked, 2);
        assert_eq!(report.summary.per_target.len(), 2);
    }

    #[test]
    fn test_unknown_target_in_filter() {
        let model = StepModelReader.read(RAILWAY_FIXTURE.as_bytes()).unwrap();
        let only = vec!["bridge".to_string()];
        let err = check_model(&model, &default_config(), Some(only.as_slice()), "x.ifc").unwrap_err();
        assert!(matches!(err, CheckError::UnknownTarget(id) if id == "bridge"));
    }

    #[test]
    fn test_no_matching_elements() {
        let model = IfcModel::default();
        let report = check_model(&model, &default_config(), None, "empty.ifc").unwrap();
        assert_eq!(report.status, ReportStatus::NoElements);
        assert_eq!(report.summary.per_target.len(), 5);
    }

    #[test]
    fn test_classification_record_is_not_a_sleeper() {
        let src = "ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\n\
                   #1=IFCWALL('0abcdefghijklmnopqrstu',$,'Wand',$,$,$,$,'W-1',$);\n\
                   #2=IFCCLASSIFICATIONREFERENCE('https://example.org/uniclass','2.3','Schwellen',$,'Betonschwelle B70',$);\n\
                   ENDSEC;\nEND-ISO-10303-21;\n";
        let model = StepModelReader.read(src.as_bytes()).unwrap();
        let report = check_model(&model, &default_config(), None, "wall.ifc").unwrap();
        assert_eq!(report.summary.elements_scanned, 1);
        assert_eq!(report.summary.elements_checked, 0);
        assert_eq!(report.status, ReportStatus::NoElements);
    }

    #[test]
    fn test_multiple_standards_on_one_property() {
        let model = StepModelReader.read(RAILWAY_FIXTURE.as_bytes()).unwrap();
        let mut config = default_config();
        let sleeper = config.targets.iter_mut().find(|t| t.id == "sleeper").unwrap();
        let mut extra = sleeper.standards[1].clone();
        extra.comparison = Comparison::Min { value: 0.62 };
        sleeper.standards.push(extra);

        let report = check_model(&model, &config, None, "railway.ifc").unwrap();
        let sw = by_tag(&report, "SW-1");
        let spacing: Vec<_> = sw.findings.iter().filter(|f| f.property == "spacing").collect();
        assert_eq!(spacing.len(), 2);
        assert_eq!(spacing[0].status, FindingStatus::Pass);
        assert_eq!(spacing[1].status, FindingStatus::Fail);
        assert_eq!(sw.status, ElementStatus::Fail);
    }
}
