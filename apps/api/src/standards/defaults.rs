//! Built-in configuration used when no standards file exists yet.
//!
//! Thresholds are starting values for an administrator to adjust, not a
//! normative source.

use crate::standards::models::{
    Comparison, PropertySpec, Standard, StandardsConfig, TargetDefinition, DEFAULT_PROPERTY_SET,
};

fn property(key: &str, label: &str, candidates: &[&str], unit: Option<&str>) -> PropertySpec {
    PropertySpec {
        key: key.to_string(),
        label: label.to_string(),
        property_set: DEFAULT_PROPERTY_SET.to_string(),
        candidates: candidates.iter().map(|c| c.to_string()).collect(),
        unit: unit.map(str::to_string),
    }
}

fn standard(property: &str, comparison: Comparison, note: &str) -> Standard {
    Standard {
        property: property.to_string(),
        comparison,
        note: Some(note.to_string()),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn default_config() -> StandardsConfig {
    StandardsConfig {
        version: 1,
        reference: None,
        targets: vec![
            TargetDefinition {
                id: "ramp".to_string(),
                label: "Rampe".to_string(),
                ifc_types: strings(&["IfcRamp", "IfcRampFlight"]),
                name_patterns: vec![],
                properties: vec![
                    property("slope", "Neigung", &["Neigung", "Gefaelle", "Slope"], None),
                    property("width", "Breite", &["Breite", "Nutzbare Breite", "Width"], Some("m")),
                ],
                standards: vec![
                    standard("slope", Comparison::Max { value: 0.06 }, "maximum ramp gradient"),
                    standard("width", Comparison::Min { value: 1.2 }, "minimum clear width"),
                ],
            },
            TargetDefinition {
                id: "rail".to_string(),
                label: "Schiene".to_string(),
                ifc_types: strings(&["IfcRail"]),
                name_patterns: vec![],
                properties: vec![property(
                    "gauge",
                    "Spurweite",
                    &["Spurweite", "Gauge", "TrackGauge"],
                    Some("mm"),
                )],
                standards: vec![standard(
                    "gauge",
                    Comparison::Approx {
                        target: 1435.0,
                        tolerance: 3.0,
                    },
                    "standard gauge",
                )],
            },
            TargetDefinition {
                id: "platform".to_string(),
                label: "Bahnsteig".to_string(),
                ifc_types: strings(&["IfcSlab", "IfcPlate", "IfcBuildingElementProxy"]),
                name_patterns: strings(&["Bahnsteig", "Platform"]),
                properties: vec![
                    property(
                        "height",
                        "Bahnsteighöhe",
                        &["Bahnsteighöhe", "Bahnsteighoehe", "PlatformHeight", "Höhe"],
                        Some("m"),
                    ),
                    property("width", "Breite", &["Breite", "Nutzbare Breite", "Width"], Some("m")),
                    property("length", "Länge", &["Länge", "Laenge", "Length"], Some("m")),
                ],
                standards: vec![
                    standard(
                        "height",
                        Comparison::Range {
                            min: 0.55,
                            max: 0.96,
                        },
                        "platform height above rail",
                    ),
                    standard("width", Comparison::Min { value: 2.5 }, "minimum platform width"),
                ],
            },
            TargetDefinition {
                id: "mast".to_string(),
                label: "Mast".to_string(),
                ifc_types: strings(&["IfcColumn", "IfcMember", "IfcPole"]),
                name_patterns: strings(&["Mast"]),
                properties: vec![
                    property("height", "Höhe", &["Höhe", "Hoehe", "Height"], Some("m")),
                    property(
                        "clearance",
                        "Gleisabstand",
                        &["Gleisabstand", "Abstand Gleismitte", "Clearance"],
                        Some("m"),
                    ),
                ],
                standards: vec![
                    standard(
                        "height",
                        Comparison::Range {
                            min: 6.0,
                            max: 12.0,
                        },
                        "catenary mast height",
                    ),
                    standard(
                        "clearance",
                        Comparison::Min { value: 3.1 },
                        "distance to track centre",
                    ),
                ],
            },
            TargetDefinition {
                id: "sleeper".to_string(),
                label: "Schwelle".to_string(),
                ifc_types: vec![],
                name_patterns: strings(&["Schwelle", "Sleeper"]),
                properties: vec![
                    property("length", "Länge", &["Länge", "Laenge", "Length"], Some("m")),
                    property(
                        "spacing",
                        "Schwellenabstand",
                        &["Schwellenabstand", "Spacing"],
                        Some("m"),
                    ),
                ],
                standards: vec![
                    standard(
                        "length",
                        Comparison::Approx {
                            target: 2.6,
                            tolerance: 0.01,
                        },
                        "sleeper length",
                    ),
                    standard("spacing", Comparison::Max { value: 0.65 }, "maximum sleeper spacing"),
                ],
            },
        ],
    }
}
