//! Citations: ties each checked standard to a verbatim passage of a reference
//! document, located by the text-generation service.
//!
//! `AppState` holds an `Option<Arc<dyn CitationProvider>>`; it is `None` when
//! no API key is configured.

pub mod prompts;
pub mod reference;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::check::report::CheckReport;
use crate::citation::prompts::{build_citation_prompt, CITATION_SYSTEM};
use crate::citation::reference::{ReferenceDocument, MAX_REFERENCE_CHARS};
use crate::errors::AppError;
use crate::llm_client::LlmClient;

/// Upper bound on provider calls per report.
pub const MAX_CITATIONS: usize = 20;

#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub target_id: String,
    pub property: String,
    pub standard: String,
    pub quote: Option<String>,
    pub section: Option<String>,
    pub explanation: Option<String>,
    /// The quote occurs in the reference text.
    pub verified: bool,
    pub reference: String,
    pub backend: String,
}

/// What a provider returns before the quote is checked against the reference.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CitationDraft {
    #[serde(default)]
    pub quote: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

pub struct CitationRequest<'a> {
    pub target_label: &'a str,
    pub property_label: &'a str,
    pub unit: Option<&'a str>,
    pub standard: &'a str,
    pub note: Option<&'a str>,
    pub reference: &'a ReferenceDocument,
}

#[async_trait]
pub trait CitationProvider: Send + Sync {
    async fn cite(&self, request: &CitationRequest<'_>) -> Result<CitationDraft, AppError>;

    fn backend(&self) -> &'static str;
}

pub struct LlmCitationProvider(pub LlmClient);

#[async_trait]
impl CitationProvider for LlmCitationProvider {
    async fn cite(&self, request: &CitationRequest<'_>) -> Result<CitationDraft, AppError> {
        let prompt = build_citation_prompt(request);
        self.0
            .call_json::<CitationDraft>(&prompt, CITATION_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Citation lookup failed: {e}")))
    }

    fn backend(&self) -> &'static str {
        "llm"
    }
}

struct Pending {
    target_id: String,
    target_label: String,
    property: String,
    property_label: String,
    unit: Option<String>,
    standard: String,
    note: Option<String>,
}

/// Adds one citation per distinct (target, property, standard) in the report.
///
/// Provider failures never fail the report; they become warnings.
pub async fn annotate_report(
    report: &mut CheckReport,
    provider: &dyn CitationProvider,
    reference: &ReferenceDocument,
) {
    let mut seen = HashSet::new();
    let mut pending = Vec::new();
    for element in &report.elements {
        for finding in &element.findings {
            let Some(standard) = &finding.standard else {
                continue;
            };
            let key = (
                element.target_id.clone(),
                finding.property.clone(),
                standard.clone(),
            );
            if seen.insert(key) {
                pending.push(Pending {
                    target_id: element.target_id.clone(),
                    target_label: element.target_label.clone(),
                    property: finding.property.clone(),
                    property_label: finding.label.clone(),
                    unit: finding.unit.clone(),
                    standard: standard.clone(),
                    note: finding.note.clone(),
                });
            }
        }
    }

    if pending.len() > MAX_CITATIONS {
        warn!(
            "{} standards to cite, limiting to {MAX_CITATIONS}",
            pending.len()
        );
        report.warnings.push(format!(
            "Only the first {MAX_CITATIONS} of {} standards were cited",
            pending.len()
        ));
        pending.truncate(MAX_CITATIONS);
    }
    if reference.truncated {
        report.warnings.push(format!(
            "Reference document {} was truncated to {MAX_REFERENCE_CHARS} characters",
            reference.origin
        ));
    }

    for item in pending {
        let request = CitationRequest {
            target_label: &item.target_label,
            property_label: &item.property_label,
            unit: item.unit.as_deref(),
            standard: &item.standard,
            note: item.note.as_deref(),
            reference,
        };
        match provider.cite(&request).await {
            Ok(draft) => {
                let quote = draft.quote.trim().to_string();
                let verified = is_grounded(&quote, &reference.text);
                if !quote.is_empty() && !verified {
                    warn!(
                        "Quote for {} {} not found in {}",
                        item.target_id, item.property, reference.origin
                    );
                }
                report.citations.push(Citation {
                    target_id: item.target_id,
                    property: item.property,
                    standard: item.standard,
                    quote: (!quote.is_empty()).then_some(quote),
                    section: draft.section.filter(|s| !s.trim().is_empty()),
                    explanation: draft.explanation.filter(|s| !s.trim().is_empty()),
                    verified,
                    reference: reference.origin.clone(),
                    backend: provider.backend().to_string(),
                });
            }
            Err(e) => {
                warn!("Citation for {} {} failed: {e}", item.target_id, item.property);
                report.warnings.push(format!(
                    "No citation for {} / {} ({}): {e}",
                    item.target_label, item.property_label, item.standard
                ));
            }
        }
    }

    info!(
        "Added {} citations from {}",
        report.citations.len(),
        reference.origin
    );
}

/// True when every fragment of `quote` (fragments joined by `…` or `...`)
/// occurs in `reference`, ignoring case and whitespace differences.
pub fn is_grounded(quote: &str, reference: &str) -> bool {
    let haystack = normalize_for_match(reference);
    let quote = quote.replace("...", "…");
    let fragments: Vec<String> = quote
        .split('…')
        .map(normalize_for_match)
        .filter(|f| !f.is_empty())
        .collect();
    !fragments.is_empty() && fragments.iter().all(|f| haystack.contains(f.as_str()))
}

fn normalize_for_match(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| matches!(c, '"' | '„' | '“' | '”' | '\''))
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::engine::check_model;
    use crate::ifc::{ModelReader, StepModelReader, RAILWAY_FIXTURE};
    use crate::standards::defaults::default_config;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REFERENCE: &str = "§ 13 Bahnsteige\n(1) Die Bahnsteighöhe soll 0,76 m über Schienenoberkante betragen.\n\
                             § 5 Spurweite\nDie Spurweite beträgt 1435 mm.";

    struct FakeProvider {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl CitationProvider for FakeProvider {
        async fn cite(&self, request: &CitationRequest<'_>) -> Result<CitationDraft, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(request.property_label) == self.fail_on {
                return Err(AppError::Llm("rate limited".to_string()));
            }
            let quote = match request.property_label {
                "Spurweite" => "Die Spurweite beträgt 1435 mm.",
                "Bahnsteighöhe" => "Die Bahnsteighöhe soll 0,76 m  über Schienenoberkante",
                "Neigung" => "Rampen dürfen höchstens 6 % geneigt sein",
                _ => "",
            };
            Ok(CitationDraft {
                quote: quote.to_string(),
                section: Some("§ 13".to_string()),
                explanation: None,
            })
        }

        fn backend(&self) -> &'static str {
            "fake"
        }
    }

    fn reference(truncated: bool) -> ReferenceDocument {
        ReferenceDocument {
            origin: "ebo.txt".to_string(),
            text: REFERENCE.to_string(),
            truncated,
        }
    }

    fn report() -> CheckReport {
        let model = StepModelReader.read(RAILWAY_FIXTURE.as_bytes()).unwrap();
        check_model(&model, &default_config(), None, "railway.ifc").unwrap()
    }

    #[test]
    fn test_is_grounded() {
        assert!(is_grounded("die spurweite   beträgt 1435 mm", REFERENCE));
        assert!(is_grounded("„Die Bahnsteighöhe soll 0,76 m“", REFERENCE));
        assert!(is_grounded("§ 13 Bahnsteige … Schienenoberkante betragen", REFERENCE));
        assert!(!is_grounded("Die Spurweite beträgt 1520 mm", REFERENCE));
        assert!(!is_grounded("", REFERENCE));
        assert!(!is_grounded(" … ", REFERENCE));
    }

    #[tokio::test]
    async fn test_one_citation_per_distinct_standard() {
        let mut report = report();
        let provider = FakeProvider {
            calls: AtomicUsize::new(0),
            fail_on: None,
        };
        annotate_report(&mut report, &provider, &reference(false)).await;

        // ramp 2, rail 1, platform 2, mast 2, sleeper 2
        assert_eq!(provider.calls.load(Ordering::SeqCst), 9);
        assert_eq!(report.citations.len(), 9);
        assert!(report.warnings.is_empty());

        let gauge = report
            .citations
            .iter()
            .find(|c| c.property == "gauge")
            .unwrap();
        assert!(gauge.verified);
        assert_eq!(gauge.backend, "fake");

        let slope = report
            .citations
            .iter()
            .find(|c| c.property == "slope")
            .unwrap();
        assert!(!slope.verified);

        let mast = report
            .citations
            .iter()
            .find(|c| c.target_id == "mast")
            .unwrap();
        assert_eq!(mast.quote, None);
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_warning() {
        let mut report = report();
        let provider = FakeProvider {
            calls: AtomicUsize::new(0),
            fail_on: Some("Spurweite"),
        };
        annotate_report(&mut report, &provider, &reference(true)).await;

        assert_eq!(report.citations.len(), 8);
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.iter().any(|w| w.contains("truncated")));
        assert!(report.warnings.iter().any(|w| w.contains("Spurweite")));
    }
}
