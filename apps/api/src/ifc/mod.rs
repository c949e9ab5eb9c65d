//! IFC model reading.
//!
//! The checker only needs elements and their property sets. `ModelReader` is
//! the seam; `StepModelReader` is the built-in reader for STEP-encoded files.

pub mod reader;
pub mod step;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

pub use reader::StepModelReader;

/// Sample railway model shared by tests across modules.
#[cfg(test)]
pub(crate) const RAILWAY_FIXTURE: &str = include_str!("../../fixtures/railway.ifc");

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("malformed IFC file: {0}")]
    Step(#[from] step::StepError),

    #[error("model contains no entity instances")]
    Empty,
}

/// A property value as read from the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Null,
}

pub type PropertySet = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, Serialize)]
pub struct IfcElement {
    pub step_id: u64,
    pub global_id: String,
    /// Entity type as written in the file, e.g. `IFCRAMP`.
    pub ifc_type: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_type: Option<String>,
    pub tag: Option<String>,
    pub property_sets: BTreeMap<String, PropertySet>,
}

impl IfcElement {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.global_id)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IfcModel {
    pub schema: Option<String>,
    pub elements: Vec<IfcElement>,
}

pub trait ModelReader: Send + Sync {
    fn read(&self, bytes: &[u8]) -> Result<IfcModel, ModelError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct TypeSummary {
    pub count: usize,
    pub sample_name: Option<String>,
    pub property_sets: BTreeMap<String, Vec<String>>,
}

/// Overview of what a model contains, for administrators writing target definitions.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub schema: Option<String>,
    pub element_count: usize,
    pub types: BTreeMap<String, TypeSummary>,
}

/// Groups elements by entity type. Property names are taken from the first
/// instance of each type.
pub fn summarize(model: &IfcModel) -> ModelSummary {
    let mut types: BTreeMap<String, TypeSummary> = BTreeMap::new();
    for element in &model.elements {
        types
            .entry(element.ifc_type.clone())
            .and_modify(|t| t.count += 1)
            .or_insert_with(|| TypeSummary {
                count: 1,
                sample_name: element.name.clone(),
                property_sets: element
                    .property_sets
                    .iter()
                    .map(|(pset, props)| (pset.clone(), props.keys().cloned().collect()))
                    .collect(),
            });
    }
    ModelSummary {
        schema: model.schema.clone(),
        element_count: model.elements.len(),
        types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_groups_by_type() {
        let model = StepModelReader.read(RAILWAY_FIXTURE.as_bytes()).unwrap();
        let summary = summarize(&model);
        assert_eq!(summary.schema.as_deref(), Some("IFC4X3_ADD2"));
        assert_eq!(summary.types["IFCRAIL"].count, 2);
        let ramp = &summary.types["IFCRAMP"];
        assert_eq!(ramp.sample_name.as_deref(), Some("Rampe Nord"));
        assert!(ramp.property_sets["ID-Daten"].contains(&"Neigung".to_string()));
    }

    #[test]
    fn test_display_name_falls_back_to_global_id() {
        let element = IfcElement {
            step_id: 1,
            global_id: "0abc".to_string(),
            ifc_type: "IFCWALL".to_string(),
            name: None,
            description: None,
            object_type: None,
            tag: None,
            property_sets: BTreeMap::new(),
        };
        assert_eq!(element.display_name(), "0abc");
    }
}
