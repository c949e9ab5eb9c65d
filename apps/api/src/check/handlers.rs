use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::check::engine::check_model;
use crate::check::report::CheckReport;
use crate::citation::reference::{load_reference, ReferenceSource};
use crate::citation::{annotate_report, CitationProvider};
use crate::errors::AppError;
use crate::ifc::{summarize, IfcModel, ModelReader, ModelSummary};
use crate::render::{pdf_file_name, render_report_pdf, ReportFormat};
use crate::standards::models::{ReferenceConfig, StandardsConfig};
use crate::state::AppState;
use crate::uploads::{validate_ifc_name, UploadError};

pub const REPORT_STATUS_HEADER: &str = "x-report-status";

/// A file part of the upload form.
struct FilePart {
    file_name: String,
    bytes: Bytes,
}

/// Fields of the check/inspect forms. Unknown fields are ignored.
#[derive(Default)]
struct CheckForm {
    file: Option<FilePart>,
    targets: Option<String>,
    format: Option<String>,
    cite: bool,
    reference_url: Option<String>,
    reference_file: Option<FilePart>,
}

async fn read_form(mut multipart: Multipart) -> Result<CheckForm, AppError> {
    let mut form = CheckForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "reference_file" => {
                let file_name = field.file_name().unwrap_or_default().trim().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                // Browsers send an empty part when no file was chosen.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                let part = FilePart { file_name, bytes };
                if name == "file" {
                    form.file = Some(part);
                } else {
                    form.reference_file = Some(part);
                }
            }
            "targets" | "format" | "cite" | "reference_url" => {
                let value = field.text().await.map_err(multipart_error)?;
                let value = value.trim().to_string();
                match name.as_str() {
                    "targets" => form.targets = Some(value),
                    "format" => form.format = Some(value),
                    "cite" => form.cite = is_checked(&value),
                    _ => form.reference_url = Some(value).filter(|v| !v.is_empty()),
                }
            }
            other => debug!("Ignoring form field '{other}'"),
        }
    }
    Ok(form)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::Validation(format!("Malformed upload: {}", e.body_text()))
    }
}

/// Checkbox semantics: `true`, `on`, `1` or `yes`.
fn is_checked(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "on" | "1" | "yes"
    )
}

/// Comma-separated target ids; blanks and repeats dropped. `None` means all.
fn parse_targets(raw: Option<&str>) -> Option<Vec<String>> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.unwrap_or_default().split(',').map(str::trim) {
        if !id.is_empty() && !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    (!ids.is_empty()).then_some(ids)
}

/// Form upload first, then form URL, then the configured default.
fn resolve_reference(
    form: &mut CheckForm,
    config: &StandardsConfig,
) -> Result<ReferenceSource, AppError> {
    if let Some(part) = form.reference_file.take() {
        return Ok(ReferenceSource::Upload {
            file_name: part.file_name,
            bytes: part.bytes,
        });
    }
    if let Some(url) = form.reference_url.take() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Validation(format!(
                "reference_url must be an http(s) URL, got '{url}'"
            )));
        }
        return Ok(ReferenceSource::Url(url));
    }
    match &config.reference {
        Some(ReferenceConfig::Url(url)) => Ok(ReferenceSource::Url(url.clone())),
        Some(ReferenceConfig::Path(path)) => Ok(ReferenceSource::Path(PathBuf::from(path))),
        None => Err(AppError::Validation(
            "Citations need a reference document: upload one, give a reference_url, \
             or configure a default reference"
                .to_string(),
        )),
    }
}

/// Parses the model on a blocking thread; STEP files can be large.
async fn read_model(reader: Arc<dyn ModelReader>, bytes: Bytes) -> Result<IfcModel, AppError> {
    let model = tokio::task::spawn_blocking(move || reader.read(&bytes))
        .await
        .map_err(|e| AppError::Internal(anyhow!("IFC reader task failed: {e}")))??;
    Ok(model)
}

/// POST /api/v1/inspect
/// Lists entity types and property names of an uploaded model without checking it.
pub async fn handle_inspect(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ModelSummary>, AppError> {
    let form = read_form(multipart).await?;
    let file = form.file.ok_or(UploadError::MissingFile)?;
    let file_name = validate_ifc_name(&file.file_name)?;

    let model = read_model(state.model_reader.clone(), file.bytes).await?;
    let summary = summarize(&model);
    info!(
        "Inspected {file_name}: {} elements of {} types",
        summary.element_count,
        summary.types.len()
    );
    Ok(Json(summary))
}

/// POST /api/v1/check
/// Stores the upload, checks it against the current standards and returns the
/// report as JSON or as a PDF attachment.
pub async fn handle_check(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let mut form = read_form(multipart).await?;

    let format = match form.format.as_deref() {
        Some(value) => ReportFormat::parse(value).ok_or_else(|| {
            AppError::Validation(format!("Unknown format '{value}', expected json or pdf"))
        })?,
        None => ReportFormat::Json,
    };
    let file = form.file.take().ok_or(UploadError::MissingFile)?;
    let config = state.standards.load().await?;
    let only = parse_targets(form.targets.as_deref());

    // Fail fast on citation preconditions before any parsing work.
    let citation: Option<(Arc<dyn CitationProvider>, ReferenceSource)> = if form.cite {
        let provider = state.citations.clone().ok_or_else(|| {
            AppError::Validation(
                "Citations are not available: ANTHROPIC_API_KEY is not configured".to_string(),
            )
        })?;
        Some((provider, resolve_reference(&mut form, &config)?))
    } else {
        None
    };

    let stored = state.uploads.save(&file.file_name, &file.bytes).await?;
    info!(
        "Checking upload {} ({} bytes, stored at {})",
        stored.id,
        stored.size,
        stored.path.display()
    );
    let model = read_model(state.model_reader.clone(), file.bytes).await?;
    let mut report = check_model(&model, &config, only.as_deref(), &stored.file_name)?;

    if let Some((provider, source)) = citation {
        match load_reference(source, &state.http).await {
            Ok(reference) => annotate_report(&mut report, provider.as_ref(), &reference).await,
            Err(e) => {
                warn!("Reference document unavailable: {e}");
                report
                    .warnings
                    .push(format!("Reference document unavailable: {e}"));
            }
        }
    }

    match format {
        ReportFormat::Json => Ok(Json(report).into_response()),
        ReportFormat::Pdf => pdf_response(report).await,
    }
}

async fn pdf_response(report: CheckReport) -> Result<Response, AppError> {
    let file_name = pdf_file_name(&report);
    let status = report.status.as_str();
    let bytes = tokio::task::spawn_blocking(move || render_report_pdf(&report))
        .await
        .map_err(|e| AppError::Internal(anyhow!("PDF render task failed: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
            (
                header::HeaderName::from_static(REPORT_STATUS_HEADER),
                status.to_string(),
            ),
        ],
        bytes,
    )
        .into_response())
}
