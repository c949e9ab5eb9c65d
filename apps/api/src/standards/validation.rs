use std::collections::HashSet;

use serde::Serialize;

use crate::standards::models::{Comparison, ReferenceConfig, StandardsConfig};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigIssue {
    /// JSON-path-like location, e.g. `targets[2].standards[0]`.
    pub location: String,
    pub message: String,
}

impl ConfigIssue {
    fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Checks a configuration before it is persisted, collecting every problem.
pub fn validate_config(config: &StandardsConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.targets.is_empty() {
        issues.push(ConfigIssue::new("targets", "at least one target is required"));
    }

    let mut target_ids = HashSet::new();
    for (t, target) in config.targets.iter().enumerate() {
        let at = format!("targets[{t}]");

        if target.id.trim().is_empty() {
            issues.push(ConfigIssue::new(&at, "id must not be empty"));
        } else if !target_ids.insert(target.id.as_str()) {
            issues.push(ConfigIssue::new(
                &at,
                format!("duplicate target id '{}'", target.id),
            ));
        }

        let has_selector = target.ifc_types.iter().any(|s| !s.trim().is_empty())
            || target.name_patterns.iter().any(|s| !s.trim().is_empty());
        if !has_selector {
            issues.push(ConfigIssue::new(
                &at,
                "needs at least one ifc_types or name_patterns entry",
            ));
        }

        if target.properties.is_empty() {
            issues.push(ConfigIssue::new(
                format!("{at}.properties"),
                "at least one property is required",
            ));
        }

        let mut keys = HashSet::new();
        for (p, spec) in target.properties.iter().enumerate() {
            let at = format!("{at}.properties[{p}]");
            if spec.key.trim().is_empty() {
                issues.push(ConfigIssue::new(&at, "key must not be empty"));
            } else if !keys.insert(spec.key.as_str()) {
                issues.push(ConfigIssue::new(
                    &at,
                    format!("duplicate property key '{}'", spec.key),
                ));
            }
            if spec.candidates.iter().all(|c| c.trim().is_empty()) {
                issues.push(ConfigIssue::new(&at, "candidates must not be empty"));
            }
        }

        for (s, standard) in target.standards.iter().enumerate() {
            let at = format!("{at}.standards[{s}]");
            if target.property(&standard.property).is_none() {
                issues.push(ConfigIssue::new(
                    &at,
                    format!("unknown property '{}'", standard.property),
                ));
            }
            if let Some(message) = comparison_problem(&standard.comparison) {
                issues.push(ConfigIssue::new(&at, message));
            }
        }
    }

    match &config.reference {
        Some(ReferenceConfig::Url(url))
            if !(url.starts_with("http://") || url.starts_with("https://")) =>
        {
            issues.push(ConfigIssue::new(
                "reference",
                "url must start with http:// or https://",
            ));
        }
        Some(ReferenceConfig::Path(path)) if path.trim().is_empty() => {
            issues.push(ConfigIssue::new("reference", "path must not be empty"));
        }
        _ => {}
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

fn comparison_problem(comparison: &Comparison) -> Option<&'static str> {
    if comparison.numbers().iter().any(|n| !n.is_finite()) {
        return Some("comparison values must be finite numbers");
    }
    match *comparison {
        Comparison::Range { min, max } if min > max => Some("range min must not exceed max"),
        Comparison::Approx { tolerance, .. } if tolerance < 0.0 => {
            Some("tolerance must not be negative")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standards::defaults::default_config;
    use crate::standards::models::Standard;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&default_config()), Ok(()));
    }

    #[test]
    fn test_empty_targets_rejected() {
        let config = StandardsConfig {
            version: 1,
            targets: vec![],
            reference: None,
        };
        let issues = validate_config(&config).unwrap_err();
        assert_eq!(issues[0].location, "targets");
    }

    #[test]
    fn test_duplicate_target_id() {
        let mut config = default_config();
        config.targets[1].id = config.targets[0].id.clone();
        let issues = validate_config(&config).unwrap_err();
        assert!(issues
            .iter()
            .any(|i| i.location == "targets[1]" && i.message.contains("duplicate")));
    }

    #[test]
    fn test_standard_must_reference_declared_property() {
        let mut config = default_config();
        config.targets[0].standards.push(Standard {
            property: "nonexistent".to_string(),
            comparison: Comparison::Min { value: 1.0 },
            note: None,
        });
        let issues = validate_config(&config).unwrap_err();
        assert!(issues[0].message.contains("unknown property 'nonexistent'"));
    }

    #[test]
    fn test_inverted_range_and_negative_tolerance() {
        let mut config = default_config();
        config.targets[0].standards[0].comparison = Comparison::Range { min: 2.0, max: 1.0 };
        config.targets[1].standards[0].comparison = Comparison::Approx {
            target: 1.0,
            tolerance: -0.5,
        };
        let issues = validate_config(&config).unwrap_err();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_nan_threshold_rejected() {
        let mut config = default_config();
        config.targets[0].standards[0].comparison = Comparison::Max { value: f64::NAN };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_target_needs_selector_and_candidates() {
        let mut config = default_config();
        config.targets[0].ifc_types.clear();
        config.targets[0].name_patterns.clear();
        config.targets[0].properties[0].candidates = vec![" ".to_string()];
        let issues = validate_config(&config).unwrap_err();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_reference_url_scheme() {
        let mut config = default_config();
        config.reference = Some(ReferenceConfig::Url("ftp://example.org/ril.pdf".to_string()));
        assert!(validate_config(&config).is_err());
    }
}
