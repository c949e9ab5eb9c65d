//! Builds `IfcElement`s with their property sets from a parsed STEP file.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::ifc::step::{parse_step, EntityRecord, StepFile, StepValue};
use crate::ifc::{IfcElement, IfcModel, ModelError, ModelReader, PropertySet, PropertyValue};

/// Rooted entities that carry a GlobalId but are not physical elements.
const NON_ELEMENT_TYPES: &[&str] = &[
    "IFCPROJECT",
    "IFCPROJECTLIBRARY",
    "IFCPROPERTYSET",
    "IFCELEMENTQUANTITY",
    "IFCPROPERTYSETTEMPLATE",
    "IFCSIMPLEPROPERTYTEMPLATE",
    "IFCCOMPLEXPROPERTYTEMPLATE",
];

const QUANTITY_TYPES: &[&str] = &[
    "IFCQUANTITYLENGTH",
    "IFCQUANTITYAREA",
    "IFCQUANTITYVOLUME",
    "IFCQUANTITYCOUNT",
    "IFCQUANTITYWEIGHT",
    "IFCQUANTITYTIME",
    "IFCQUANTITYNUMBER",
];

type ItemReader = fn(&EntityRecord) -> Option<(String, PropertyValue)>;

// IfcRoot layout shared by every rooted entity.
const ATTR_GLOBAL_ID: usize = 0;
const ATTR_OWNER_HISTORY: usize = 1;
const ATTR_NAME: usize = 2;
const ATTR_DESCRIPTION: usize = 3;
const ATTR_OBJECT_TYPE: usize = 4;
const ATTR_TAG: usize = 7;

/// Reads STEP-encoded IFC (any schema version) without schema tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepModelReader;

impl ModelReader for StepModelReader {
    fn read(&self, bytes: &[u8]) -> Result<IfcModel, ModelError> {
        let file = parse_step(bytes)?;
        if file.entities.is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(build_model(&file))
    }
}

fn build_model(file: &StepFile) -> IfcModel {
    let mut elements: Vec<IfcElement> = file
        .entities
        .values()
        .filter(|e| is_element(e))
        .map(new_element)
        .collect();
    elements.sort_by_key(|e| e.step_id);

    let index: HashMap<u64, usize> = elements
        .iter()
        .enumerate()
        .map(|(i, e)| (e.step_id, i))
        .collect();

    // Type property sets first so occurrence values win.
    let mut by_type: Vec<&EntityRecord> = file.of_type("IFCRELDEFINESBYTYPE").collect();
    by_type.sort_by_key(|r| r.id);
    for rel in by_type {
        let type_object = rel
            .attr(5)
            .and_then(StepValue::as_ref_id)
            .and_then(|id| file.get(id));
        let Some(type_object) = type_object else {
            continue;
        };
        let pset_ids = type_object.attr(5).map(StepValue::ref_ids).unwrap_or_default();
        for object_id in rel.attr(4).map(StepValue::ref_ids).unwrap_or_default() {
            if let Some(&i) = index.get(&object_id) {
                for &pset_id in &pset_ids {
                    attach_property_definition(file, pset_id, &mut elements[i]);
                }
            }
        }
    }

    let mut by_properties: Vec<&EntityRecord> =
        file.of_type("IFCRELDEFINESBYPROPERTIES").collect();
    by_properties.sort_by_key(|r| r.id);
    for rel in by_properties {
        let definitions = rel.attr(5).map(StepValue::ref_ids).unwrap_or_default();
        for object_id in rel.attr(4).map(StepValue::ref_ids).unwrap_or_default() {
            if let Some(&i) = index.get(&object_id) {
                for &definition_id in &definitions {
                    attach_property_definition(file, definition_id, &mut elements[i]);
                }
            }
        }
    }

    debug!(
        "Read {} elements from {} entities ({} complex instances skipped)",
        elements.len(),
        file.entities.len(),
        file.skipped_complex
    );

    IfcModel {
        schema: file.schema.clone(),
        elements,
    }
}

/// An object occurrence: IfcRoot attributes (GlobalId, OwnerHistory) up to
/// ObjectType, and not a relationship, type object or property container.
fn is_element(entity: &EntityRecord) -> bool {
    let ty = entity.type_name.as_str();
    let rooted = entity.str_attr(ATTR_GLOBAL_ID).is_some_and(is_global_id)
        && matches!(
            entity.attr(ATTR_OWNER_HISTORY),
            Some(StepValue::Ref(_) | StepValue::Null)
        );
    rooted
        && entity.attrs.len() > ATTR_OBJECT_TYPE
        && !ty.starts_with("IFCREL")
        && !ty.ends_with("TYPE")
        && !NON_ELEMENT_TYPES.contains(&ty)
        && !QUANTITY_TYPES.contains(&ty)
}

/// 22 characters of the IFC base64 alphabet.
fn is_global_id(value: &str) -> bool {
    value.len() == 22
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
}

fn new_element(entity: &EntityRecord) -> IfcElement {
    let text = |index: usize| entity.str_attr(index).map(str::to_string);
    IfcElement {
        step_id: entity.id,
        global_id: text(ATTR_GLOBAL_ID).unwrap_or_default(),
        ifc_type: entity.type_name.clone(),
        name: text(ATTR_NAME),
        description: text(ATTR_DESCRIPTION),
        object_type: text(ATTR_OBJECT_TYPE),
        tag: text(ATTR_TAG),
        property_sets: BTreeMap::new(),
    }
}

fn attach_property_definition(file: &StepFile, definition_id: u64, element: &mut IfcElement) {
    let Some(definition) = file.get(definition_id) else {
        debug!("Dangling property definition #{definition_id}");
        return;
    };
    let (items_index, reader) = match definition.type_name.as_str() {
        "IFCPROPERTYSET" => (4, read_property as ItemReader),
        "IFCELEMENTQUANTITY" => (5, read_quantity as ItemReader),
        _ => return,
    };
    let Some(set_name) = definition.str_attr(ATTR_NAME) else {
        return;
    };

    let target: &mut PropertySet = element
        .property_sets
        .entry(set_name.to_string())
        .or_default();
    for item_id in definition
        .attr(items_index)
        .map(StepValue::ref_ids)
        .unwrap_or_default()
    {
        if let Some((name, value)) = file.get(item_id).and_then(reader) {
            target.insert(name, value);
        }
    }
}

fn read_property(entity: &EntityRecord) -> Option<(String, PropertyValue)> {
    let name = entity.str_attr(0)?.to_string();
    let value = match entity.type_name.as_str() {
        "IFCPROPERTYSINGLEVALUE" => entity.attr(2).map(to_property_value)?,
        "IFCPROPERTYENUMERATEDVALUE" => match entity.attr(2) {
            Some(StepValue::List(values)) => values
                .first()
                .map(to_property_value)
                .unwrap_or(PropertyValue::Null),
            _ => PropertyValue::Null,
        },
        _ => return None,
    };
    Some((name, value))
}

fn read_quantity(entity: &EntityRecord) -> Option<(String, PropertyValue)> {
    if !QUANTITY_TYPES.contains(&entity.type_name.as_str()) {
        return None;
    }
    let name = entity.str_attr(0)?.to_string();
    Some((name, entity.attr(3).map(to_property_value)?))
}

fn to_property_value(value: &StepValue) -> PropertyValue {
    match value {
        StepValue::Typed(_, inner) => to_property_value(inner),
        StepValue::Integer(i) => PropertyValue::Number(*i as f64),
        StepValue::Real(r) => PropertyValue::Number(*r),
        StepValue::String(s) => PropertyValue::Text(s.clone()),
        StepValue::Enum(e) => match e.as_str() {
            "T" | "TRUE" => PropertyValue::Bool(true),
            "F" | "FALSE" => PropertyValue::Bool(false),
            "U" | "UNKNOWN" => PropertyValue::Null,
            other => PropertyValue::Text(other.to_string()),
        },
        _ => PropertyValue::Null,
    }
}
