use crate::ifc::IfcElement;
use crate::standards::models::TargetDefinition;

/// Returns the first target (in configuration order) the element belongs to.
///
/// Both selectors must agree: the entity type must be listed in `ifc_types`
/// (when any are given) and one of `name_patterns` must occur in the name,
/// object type or tag (when any are given).
pub fn match_target<'a>(
    element: &IfcElement,
    targets: &'a [TargetDefinition],
) -> Option<&'a TargetDefinition> {
    targets.iter().find(|t| matches_target(element, t))
}

pub fn matches_target(element: &IfcElement, target: &TargetDefinition) -> bool {
    let types: Vec<&str> = non_blank(&target.ifc_types);
    let patterns: Vec<&str> = non_blank(&target.name_patterns);
    if types.is_empty() && patterns.is_empty() {
        return false;
    }

    let type_ok = types.is_empty()
        || types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&element.ifc_type));

    let name_ok = patterns.is_empty() || {
        let haystacks: Vec<String> = [&element.name, &element.object_type, &element.tag]
            .into_iter()
            .flatten()
            .map(|s| s.to_lowercase())
            .collect();
        patterns.iter().any(|p| {
            let needle = p.to_lowercase();
            haystacks.iter().any(|h| h.contains(&needle))
        })
    };

    type_ok && name_ok
}

fn non_blank(items: &[String]) -> Vec<&str> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}
