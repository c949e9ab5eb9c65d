use serde::Serialize;

use crate::ifc::{IfcElement, PropertyValue};
use crate::standards::models::PropertySpec;

/// Outcome of looking up one whitelisted property on one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extraction {
    Found { value: f64, source: String },
    NotNumeric { raw: String, source: String },
    Missing,
}

/// Looks up a property by its candidate keys.
///
/// Order: every candidate in the preferred property set, then every candidate
/// in the remaining sets (alphabetical). Within a set an exact key match beats
/// a case-insensitive one.
pub fn extract_property(element: &IfcElement, spec: &PropertySpec) -> Extraction {
    let preferred = element
        .property_sets
        .get_key_value(spec.property_set.as_str())
        .into_iter();
    let others = element
        .property_sets
        .iter()
        .filter(|(name, _)| name.as_str() != spec.property_set);

    for (set_name, props) in preferred.chain(others) {
        for candidate in spec.candidates.iter().map(|c| c.trim()) {
            if candidate.is_empty() {
                continue;
            }
            let hit = props.get_key_value(candidate).or_else(|| {
                let wanted = candidate.to_lowercase();
                props.iter().find(|(key, _)| key.to_lowercase() == wanted)
            });
            if let Some((key, value)) = hit {
                let source = format!("{set_name}.{key}");
                return match value {
                    PropertyValue::Number(n) if n.is_finite() => {
                        Extraction::Found { value: *n, source }
                    }
                    PropertyValue::Text(text) => match parse_numeric(text) {
                        Some(value) => Extraction::Found { value, source },
                        None => Extraction::NotNumeric {
                            raw: text.clone(),
                            source,
                        },
                    },
                    other => Extraction::NotNumeric {
                        raw: describe_raw(other),
                        source,
                    },
                };
            }
        }
    }
    Extraction::Missing
}

fn describe_raw(value: &PropertyValue) -> String {
    match value {
        PropertyValue::Number(n) => n.to_string(),
        PropertyValue::Text(t) => t.clone(),
        PropertyValue::Bool(b) => b.to_string(),
        PropertyValue::Null => "null".to_string(),
    }
}

/// Unit suffixes tolerated after a number stored as text. Values are not
/// converted between units except for `%` and `‰`.
const UNIT_SUFFIXES: &[&str] = &["mm", "cm", "m", "km", "%", "‰", "°", "grad", "deg"];

/// Lenient numeric parse for values stored as text.
///
/// Accepts a decimal comma (`1,20`), surrounding whitespace and a known unit
/// suffix (`1.2 m`, `1435mm`). Thousands separators are not supported:
/// `1.435,0` is rejected rather than guessed.
pub fn parse_numeric(text: &str) -> Option<f64> {
    let text = text.trim();
    let is_number_char = |i: usize, c: char| {
        c.is_ascii_digit() || c == '.' || c == ',' || (i == 0 && (c == '-' || c == '+'))
    };
    let end = text
        .char_indices()
        .find(|&(i, c)| !is_number_char(i, c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(end);
    let unit = unit.trim();

    if number.chars().filter(|c| *c == '.' || *c == ',').count() > 1 {
        return None;
    }
    if !unit.is_empty() && !UNIT_SUFFIXES.iter().any(|u| unit.eq_ignore_ascii_case(u)) {
        return None;
    }
    let value: f64 = number.replace(',', ".").parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(match unit {
        "%" => value / 100.0,
        "‰" => value / 1000.0,
        _ => value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifc::{IfcModel, ModelReader, StepModelReader, RAILWAY_FIXTURE};
    use std::collections::BTreeMap;

    fn spec(set: &str, candidates: &[&str]) -> PropertySpec {
        PropertySpec {
            key: "k".to_string(),
            label: "K".to_string(),
            property_set: set.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            unit: None,
        }
    }

    fn element_with(psets: Vec<(&str, Vec<(&str, PropertyValue)>)>) -> IfcElement {
        let mut property_sets = BTreeMap::new();
        for (name, props) in psets {
            let props: BTreeMap<String, PropertyValue> = props
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect();
            property_sets.insert(name.to_string(), props);
        }
        IfcElement {
            step_id: 1,
            global_id: "g".to_string(),
            ifc_type: "IFCRAMP".to_string(),
            name: None,
            description: None,
            object_type: None,
            tag: None,
            property_sets,
        }
    }

    fn fixture() -> IfcModel {
        StepModelReader.read(RAILWAY_FIXTURE.as_bytes()).unwrap()
    }

    #[test]
    fn test_first_candidate_in_preferred_set() {
        let e = element_with(vec![(
            "ID-Daten",
            vec![
                ("Slope", PropertyValue::Number(0.02)),
                ("Neigung", PropertyValue::Number(0.05)),
            ],
        )]);
        assert_eq!(
            extract_property(&e, &spec("ID-Daten", &["Neigung", "Slope"])),
            Extraction::Found {
                value: 0.05,
                source: "ID-Daten.Neigung".to_string()
            }
        );
    }

    #[test]
    fn test_preferred_set_beats_earlier_candidate_elsewhere() {
        let e = element_with(vec![
            ("A_Other", vec![("Neigung", PropertyValue::Number(0.9))]),
            ("ID-Daten", vec![("Slope", PropertyValue::Number(0.03))]),
        ]);
        assert_eq!(
            extract_property(&e, &spec("ID-Daten", &["Neigung", "Slope"])),
            Extraction::Found {
                value: 0.03,
                source: "ID-Daten.Slope".to_string()
            }
        );
    }

    #[test]
    fn test_falls_back_to_other_sets() {
        let model = fixture();
        let platform = model
            .elements
            .iter()
            .find(|e| e.tag.as_deref() == Some("B-01"))
            .unwrap();
        assert_eq!(
            extract_property(platform, &spec("ID-Daten", &["Breite"])),
            Extraction::Found {
                value: 3.2,
                source: "Qto_SlabBaseQuantities.Breite".to_string()
            }
        );
    }

    #[test]
    fn test_case_insensitive_key() {
        let e = element_with(vec![("ID-Daten", vec![("SPURWEITE", PropertyValue::Number(1435.0))])]);
        assert!(matches!(
            extract_property(&e, &spec("ID-Daten", &["Spurweite"])),
            Extraction::Found { value, .. } if value == 1435.0
        ));
    }

    #[test]
    fn test_non_ascii_key_case_insensitive() {
        let e = element_with(vec![("ID-Daten", vec![("LÄNGE", PropertyValue::Number(2.6))])]);
        assert!(matches!(
            extract_property(&e, &spec("ID-Daten", &["Länge"])),
            Extraction::Found { .. }
        ));
    }

    #[test]
    fn test_text_values_parsed() {
        let model = fixture();
        let ramp = model
            .elements
            .iter()
            .find(|e| e.tag.as_deref() == Some("R-02"))
            .unwrap();
        match extract_property(ramp, &spec("ID-Daten", &["Neigung"])) {
            Extraction::Found { value, .. } => assert!((value - 0.085).abs() < 1e-12),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_non_numeric_value_reported() {
        let e = element_with(vec![(
            "ID-Daten",
            vec![
                ("Profil", PropertyValue::Text("60E2".to_string())),
                ("Aktiv", PropertyValue::Bool(true)),
            ],
        )]);
        assert_eq!(
            extract_property(&e, &spec("ID-Daten", &["Profil"])),
            Extraction::NotNumeric {
                raw: "60E2".to_string(),
                source: "ID-Daten.Profil".to_string()
            }
        );
        assert!(matches!(
            extract_property(&e, &spec("ID-Daten", &["Aktiv"])),
            Extraction::NotNumeric { .. }
        ));
    }

    #[test]
    fn test_missing_property() {
        let e = element_with(vec![("ID-Daten", vec![])]);
        assert_eq!(
            extract_property(&e, &spec("ID-Daten", &["Höhe", "Height"])),
            Extraction::Missing
        );
    }

    #[test]
    fn test_parse_numeric_variants() {
        assert_eq!(parse_numeric("1,20"), Some(1.2));
        assert_eq!(parse_numeric(" 1.2 m "), Some(1.2));
        assert_eq!(parse_numeric("-0,5"), Some(-0.5));
        assert_eq!(parse_numeric("6 %"), Some(0.06));
        assert_eq!(parse_numeric("1435mm"), Some(1435.0));
        assert_eq!(parse_numeric("1.435,0"), None);
        assert_eq!(parse_numeric("ca. 3"), None);
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("60E2"), None);
        assert_eq!(parse_numeric("5 ‰"), Some(0.005));
    }
}
