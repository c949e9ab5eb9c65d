pub mod pdf;

pub use pdf::render_report_pdf;

use crate::check::report::CheckReport;

/// Response format of `POST /api/v1/check`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Pdf,
}

impl ReportFormat {
    /// Parses the `format` form field. Blank means JSON.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "" | "json" => Some(ReportFormat::Json),
            "pdf" => Some(ReportFormat::Pdf),
            _ => None,
        }
    }
}

/// `railcheck_<model stem>_<first 8 chars of report id>.pdf`, ASCII only.
pub fn pdf_file_name(report: &CheckReport) -> String {
    let stem = report
        .file_name
        .rsplit_once('.')
        .map_or(report.file_name.as_str(), |(stem, _)| stem);
    let stem: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let id = report.report_id.simple().to_string();
    format!("railcheck_{stem}_{}.pdf", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ifc::IfcModel;
    use crate::standards::defaults::default_config;

    #[test]
    fn test_parse_format() {
        assert_eq!(ReportFormat::parse(""), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse("JSON"), Some(ReportFormat::Json));
        assert_eq!(ReportFormat::parse(" pdf "), Some(ReportFormat::Pdf));
        assert_eq!(ReportFormat::parse("docx"), None);
    }

    #[test]
    fn test_pdf_file_name_is_ascii() {
        let report = crate::check::engine::check_model(
            &IfcModel::default(),
            &default_config(),
            None,
            "Bahnhof Süd v2.ifc",
        )
        .unwrap();
        let name = pdf_file_name(&report);
        assert!(name.starts_with("railcheck_Bahnhof_S_d_v2_"));
        assert!(name.ends_with(".pdf"));
        assert!(name.is_ascii());
    }
}
