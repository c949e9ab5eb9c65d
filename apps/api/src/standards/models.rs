use serde::{Deserialize, Serialize};

pub const DEFAULT_PROPERTY_SET: &str = "ID-Daten";
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Administrator-maintained check configuration, persisted as one JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardsConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub targets: Vec<TargetDefinition>,
    /// Reference document used for citations when a request names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ReferenceConfig>,
}

fn default_version() -> u32 {
    1
}

/// A class of physical element the checker looks for (ramp, rail, platform, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDefinition {
    pub id: String,
    pub label: String,
    /// Entity types, matched case-insensitively (`IfcRamp` == `IFCRAMP`).
    #[serde(default)]
    pub ifc_types: Vec<String>,
    /// Substrings looked for in name, object type and tag.
    #[serde(default)]
    pub name_patterns: Vec<String>,
    pub properties: Vec<PropertySpec>,
    #[serde(default)]
    pub standards: Vec<Standard>,
}

impl TargetDefinition {
    pub fn property(&self, key: &str) -> Option<&PropertySpec> {
        self.properties.iter().find(|p| p.key == key)
    }

    pub fn standards_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Standard> {
        self.standards.iter().filter(move |s| s.property == key)
    }
}

/// One whitelisted property and the keys it may be stored under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub key: String,
    pub label: String,
    #[serde(default = "default_property_set")]
    pub property_set: String,
    /// Tried in order; the first one present wins.
    pub candidates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

fn default_property_set() -> String {
    DEFAULT_PROPERTY_SET.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standard {
    /// Key of the `PropertySpec` this standard applies to.
    pub property: String,
    pub comparison: Comparison,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Comparison {
    /// value ≥ `value`
    Min { value: f64 },
    /// value ≤ `value`
    Max { value: f64 },
    /// |value − target| ≤ tolerance
    Approx {
        target: f64,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
    },
    /// min ≤ value ≤ max
    Range { min: f64, max: f64 },
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

impl Comparison {
    pub fn evaluate(&self, value: f64) -> bool {
        if !value.is_finite() {
            return false;
        }
        match *self {
            Comparison::Min { value: min } => value >= min,
            Comparison::Max { value: max } => value <= max,
            // Small epsilon so that 1435 ± 3 accepts 1438 despite float noise.
            Comparison::Approx { target, tolerance } => {
                (value - target).abs() <= tolerance + f64::EPSILON * target.abs().max(1.0)
            }
            Comparison::Range { min, max } => value >= min && value <= max,
        }
    }

    /// Human-readable form, e.g. `≥ 1.2`, `1435 ± 3`, `0.55 … 0.96`.
    pub fn describe(&self) -> String {
        match self {
            Comparison::Min { value } => format!("≥ {}", fmt_number(*value)),
            Comparison::Max { value } => format!("≤ {}", fmt_number(*value)),
            Comparison::Approx { target, tolerance } => {
                format!("{} ± {}", fmt_number(*target), fmt_number(*tolerance))
            }
            Comparison::Range { min, max } => {
                format!("{} … {}", fmt_number(*min), fmt_number(*max))
            }
        }
    }

    pub fn numbers(&self) -> Vec<f64> {
        match *self {
            Comparison::Min { value } | Comparison::Max { value } => vec![value],
            Comparison::Approx { target, tolerance } => vec![target, tolerance],
            Comparison::Range { min, max } => vec![min, max],
        }
    }
}

/// Formats without trailing zeros: 1.20 → "1.2", 1435.0 → "1435".
pub fn fmt_number(value: f64) -> String {
    let text = format!("{value:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_string()
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceConfig {
    Path(String),
    Url(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_and_max_are_inclusive() {
        assert!(Comparison::Min { value: 1.2 }.evaluate(1.2));
        assert!(!Comparison::Min { value: 1.2 }.evaluate(1.19));
        assert!(Comparison::Max { value: 0.06 }.evaluate(0.06));
        assert!(!Comparison::Max { value: 0.06 }.evaluate(0.085));
    }

    #[test]
    fn test_approx_within_tolerance() {
        let gauge = Comparison::Approx {
            target: 1435.0,
            tolerance: 3.0,
        };
        assert!(gauge.evaluate(1435.0));
        assert!(gauge.evaluate(1438.0));
        assert!(gauge.evaluate(1432.0));
        assert!(!gauge.evaluate(1442.0));
    }

    #[test]
    fn test_approx_boundary_with_float_noise() {
        let c = Comparison::Approx {
            target: 0.3,
            tolerance: 0.1,
        };
        assert!(c.evaluate(0.1 + 0.1));
        assert!(c.evaluate(0.4));
    }

    #[test]
    fn test_range_is_inclusive() {
        let c = Comparison::Range {
            min: 0.55,
            max: 0.96,
        };
        assert!(c.evaluate(0.55));
        assert!(c.evaluate(0.76));
        assert!(c.evaluate(0.96));
        assert!(!c.evaluate(0.38));
    }

    #[test]
    fn test_non_finite_values_never_pass() {
        assert!(!Comparison::Min { value: 0.0 }.evaluate(f64::NAN));
        assert!(!Comparison::Min { value: 0.0 }.evaluate(f64::INFINITY));
    }

    #[test]
    fn test_describe() {
        assert_eq!(Comparison::Min { value: 1.2 }.describe(), "≥ 1.2");
        assert_eq!(Comparison::Max { value: 0.06 }.describe(), "≤ 0.06");
        assert_eq!(
            Comparison::Approx {
                target: 1435.0,
                tolerance: 3.0
            }
            .describe(),
            "1435 ± 3"
        );
        assert_eq!(
            Comparison::Range {
                min: 0.55,
                max: 0.96
            }
            .describe(),
            "0.55 … 0.96"
        );
    }

    #[test]
    fn test_comparison_serde_shape() {
        let c: Comparison = serde_json::from_str(r#"{"op":"approx","target":2.6}"#).unwrap();
        assert_eq!(
            c,
            Comparison::Approx {
                target: 2.6,
                tolerance: DEFAULT_TOLERANCE
            }
        );
        let json = serde_json::to_value(Comparison::Range { min: 1.0, max: 2.0 }).unwrap();
        assert_eq!(json["op"], "range");
    }

    #[test]
    fn test_property_set_defaults_to_id_daten() {
        let spec: PropertySpec =
            serde_json::from_str(r#"{"key":"slope","label":"Neigung","candidates":["Neigung"]}"#)
                .unwrap();
        assert_eq!(spec.property_set, "ID-Daten");
    }

    #[test]
    fn test_fmt_number() {
        assert_eq!(fmt_number(1.20), "1.2");
        assert_eq!(fmt_number(1435.0), "1435");
        assert_eq!(fmt_number(0.0), "0");
        assert_eq!(fmt_number(-0.5), "-0.5");
    }
}
