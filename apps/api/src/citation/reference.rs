//! Loads the reference document a citation is drawn from.

use std::path::PathBuf;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info};

/// Upper bound on reference text handed to the text-generation service.
pub const MAX_REFERENCE_CHARS: usize = 60_000;

#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("could not read reference file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("could not fetch reference URL: {0}")]
    Http(#[from] reqwest::Error),

    #[error("reference URL {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("reference URL must use http or https: {0}")]
    UnsupportedUrl(String),

    #[error("could not extract text from PDF: {0}")]
    Pdf(String),

    #[error("reference document {0} contains no text")]
    Empty(String),
}

#[derive(Debug, Clone)]
pub enum ReferenceSource {
    Upload { file_name: String, bytes: Bytes },
    Url(String),
    Path(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ReferenceDocument {
    /// File name, URL or path, for display.
    pub origin: String,
    pub text: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Pdf,
    Html,
    Text,
}

impl DocumentKind {
    fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        let lower = lower.split(|c: char| c == '?' || c == '#').next().unwrap_or_default();
        if lower.ends_with(".pdf") {
            DocumentKind::Pdf
        } else if lower.ends_with(".html") || lower.ends_with(".htm") {
            DocumentKind::Html
        } else {
            DocumentKind::Text
        }
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.to_lowercase();
        if ct.starts_with("application/pdf") {
            Some(DocumentKind::Pdf)
        } else if ct.starts_with("text/html") || ct.starts_with("application/xhtml") {
            Some(DocumentKind::Html)
        } else if ct.starts_with("text/") {
            Some(DocumentKind::Text)
        } else {
            None
        }
    }
}

pub async fn load_reference(
    source: ReferenceSource,
    http: &reqwest::Client,
) -> Result<ReferenceDocument, ReferenceError> {
    let (origin, kind, bytes) = match source {
        ReferenceSource::Upload { file_name, bytes } => {
            let kind = DocumentKind::from_name(&file_name);
            (file_name, kind, bytes)
        }
        ReferenceSource::Path(path) => {
            let origin = path.display().to_string();
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|source| ReferenceError::Io {
                    path: origin.clone(),
                    source,
                })?;
            (origin.clone(), DocumentKind::from_name(&origin), Bytes::from(bytes))
        }
        ReferenceSource::Url(url) => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ReferenceError::UnsupportedUrl(url));
            }
            let response = http.get(&url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ReferenceError::Status {
                    url,
                    status: status.as_u16(),
                });
            }
            let kind = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .and_then(DocumentKind::from_content_type)
                .unwrap_or_else(|| DocumentKind::from_name(&url));
            let bytes = response.bytes().await?;
            (url, kind, bytes)
        }
    };

    debug!("Decoding reference {origin} as {kind:?} ({} bytes)", bytes.len());
    let raw = decode(kind, bytes).await?;
    let normalized = normalize_whitespace(&raw);
    if normalized.is_empty() {
        return Err(ReferenceError::Empty(origin));
    }
    let (text, truncated) = truncate_chars(&normalized, MAX_REFERENCE_CHARS);
    info!(
        "Loaded reference {origin}: {} chars{}",
        text.chars().count(),
        if truncated { " (truncated)" } else { "" }
    );

    Ok(ReferenceDocument {
        origin,
        text,
        truncated,
    })
}

async fn decode(kind: DocumentKind, bytes: Bytes) -> Result<String, ReferenceError> {
    match kind {
        // Text extraction is CPU-bound and may panic on malformed input.
        DocumentKind::Pdf => tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| ReferenceError::Pdf(e.to_string()))
        })
        .await
        .map_err(|e| ReferenceError::Pdf(format!("extraction aborted: {e}")))?,
        DocumentKind::Html => Ok(html2text::from_read(bytes.as_ref(), 100)),
        DocumentKind::Text => Ok(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Collapses runs of spaces and tabs, trims lines and drops repeated blank lines.
pub fn normalize_whitespace(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut blank = false;
    for line in text.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            if !blank && !out.is_empty() {
                out.push(String::new());
            }
            blank = true;
        } else {
            out.push(line);
            blank = false;
        }
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

/// Cuts `text` to at most `max` characters, never inside a character.
pub fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => (text[..byte_index].to_string(), true),
        None => (text.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(DocumentKind::from_name("Ril_813.PDF"), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::from_name("https://example.org/ebo.html?lang=de"),
            DocumentKind::Html
        );
        assert_eq!(DocumentKind::from_name("notes.txt"), DocumentKind::Text);
    }

    #[test]
    fn test_kind_from_content_type() {
        assert_eq!(
            DocumentKind::from_content_type("text/html; charset=utf-8"),
            Some(DocumentKind::Html)
        );
        assert_eq!(
            DocumentKind::from_content_type("application/pdf"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::from_content_type("application/octet-stream"), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        let text = "  § 13   Bahnsteige \n\n\n\t(1) Die Höhe\tbeträgt 0,76 m.  \n\n";
        assert_eq!(
            normalize_whitespace(text),
            "§ 13 Bahnsteige\n\n(1) Die Höhe beträgt 0,76 m."
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let (text, truncated) = truncate_chars("Höhe über", 3);
        assert_eq!(text, "Höh");
        assert!(truncated);
        let (text, truncated) = truncate_chars("kurz", 10);
        assert_eq!(text, "kurz");
        assert!(!truncated);
    }

    #[tokio::test]
    async fn test_upload_html_is_converted_to_text() {
        let html = "<html><body><h1>EBO</h1><p>Bahnsteigh&ouml;he 0,76 m</p></body></html>";
        let doc = load_reference(
            ReferenceSource::Upload {
                file_name: "ebo.html".to_string(),
                bytes: Bytes::from(html),
            },
            &reqwest::Client::new(),
        )
        .await
        .unwrap();
        assert!(doc.text.contains("Bahnsteighöhe 0,76 m"));
        assert!(!doc.text.contains("<p>"));
    }

    #[tokio::test]
    async fn test_local_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("richtlinie.txt");
        std::fs::write(&path, "Die Spurweite beträgt 1435 mm.").unwrap();
        let doc = load_reference(ReferenceSource::Path(path), &reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(doc.text, "Die Spurweite beträgt 1435 mm.");
        assert!(!doc.truncated);
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let err = load_reference(
            ReferenceSource::Path(PathBuf::from("/nonexistent/reference.txt")),
            &reqwest::Client::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReferenceError::Io { .. }));
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let err = load_reference(
            ReferenceSource::Upload {
                file_name: "empty.txt".to_string(),
                bytes: Bytes::from_static(b"  \n\t "),
            },
            &reqwest::Client::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReferenceError::Empty(_)));
    }

    #[tokio::test]
    async fn test_non_http_url_rejected() {
        let err = load_reference(
            ReferenceSource::Url("file:///etc/passwd".to_string()),
            &reqwest::Client::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ReferenceError::UnsupportedUrl(_)));
    }
}
