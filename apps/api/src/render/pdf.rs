//! PDF export of a check report.
//!
//! Pages are A4 with the base-14 Helvetica fonts in WinAnsi encoding, so no
//! font files are embedded.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use thiserror::Error;
use tracing::debug;

use crate::check::report::{CheckReport, ElementStatus, FindingStatus, ReportStatus};
use crate::standards::models::fmt_number;

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN_LEFT: i64 = 50;
const TOP: i64 = 792;
const BOTTOM: i64 = 60;
const FOOTER_Y: i64 = 30;
pub const WRAP_COLUMNS: usize = 95;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("could not write PDF: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Heading,
    Body,
    Small,
}

impl Style {
    fn font(self) -> &'static str {
        match self {
            Style::Title | Style::Heading => "F2",
            Style::Body | Style::Small => "F1",
        }
    }

    fn size(self) -> i64 {
        match self {
            Style::Title => 16,
            Style::Heading => 12,
            Style::Body => 9,
            Style::Small => 8,
        }
    }

    fn leading(self) -> i64 {
        match self {
            Style::Title => 24,
            Style::Heading => 18,
            Style::Body => 12,
            Style::Small => 11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Plain,
    Green,
    Red,
    Amber,
}

impl Tone {
    fn rgb(self) -> Vec<Object> {
        let (r, g, b) = match self {
            Tone::Plain => (0.0, 0.0, 0.0),
            Tone::Green => (0.1, 0.5, 0.2),
            Tone::Red => (0.75, 0.1, 0.1),
            Tone::Amber => (0.8, 0.5, 0.0),
        };
        vec![Object::Real(r), Object::Real(g), Object::Real(b)]
    }
}

#[derive(Debug, Clone)]
struct Line {
    text: String,
    style: Style,
    tone: Tone,
}

/// Collects report lines, wrapping long ones.
#[derive(Default)]
struct LineBuffer {
    lines: Vec<Line>,
}

impl LineBuffer {
    fn push(&mut self, text: impl AsRef<str>, style: Style, tone: Tone) {
        for chunk in wrap(text.as_ref(), WRAP_COLUMNS) {
            self.lines.push(Line {
                text: chunk,
                style,
                tone,
            });
        }
    }

    fn body(&mut self, text: impl AsRef<str>) {
        self.push(text, Style::Body, Tone::Plain);
    }

    fn blank(&mut self) {
        self.push("", Style::Body, Tone::Plain);
    }
}

pub fn render_report_pdf(report: &CheckReport) -> Result<Vec<u8>, RenderError> {
    let lines = layout_report(report);
    let pages = paginate(&lines);
    debug!(
        "Rendering report {} as PDF: {} lines on {} pages",
        report.report_id,
        lines.len(),
        pages.len()
    );

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let total = pages.len();
    let mut kids: Vec<Object> = Vec::with_capacity(total);
    for (index, page) in pages.iter().enumerate() {
        let content = page_content(page, index + 1, total);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => total as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

fn layout_report(report: &CheckReport) -> Vec<Line> {
    let mut out = LineBuffer::default();

    out.push("IFC Compliance Report", Style::Title, Tone::Plain);
    out.body(format!("File: {}", report.file_name));
    out.body(format!(
        "Checked: {}",
        report.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.body(format!(
        "Schema: {}",
        report.schema.as_deref().unwrap_or("unknown")
    ));
    out.body(format!("Report ID: {}", report.report_id));
    out.push(
        format!("Overall status: {}", report.status.as_str().to_uppercase()),
        Style::Heading,
        report_tone(report.status),
    );
    out.blank();

    let s = &report.summary;
    out.push("Summary", Style::Heading, Tone::Plain);
    out.body(format!(
        "Elements scanned: {}, checked: {}",
        s.elements_scanned, s.elements_checked
    ));
    out.body(format!(
        "Passed: {}, failed: {}, incomplete: {}",
        s.passed, s.failed, s.incomplete
    ));
    out.body(format!(
        "Failed findings: {}, missing values: {}",
        s.findings_failed, s.findings_missing
    ));
    for (id, target) in &s.per_target {
        out.body(format!(
            "  {} ({id}): {} elements, {} passed, {} failed, {} incomplete",
            target.label, target.elements, target.passed, target.failed, target.incomplete
        ));
    }
    out.blank();

    out.push("Elements", Style::Heading, Tone::Plain);
    if report.elements.is_empty() {
        out.body("No element matched a configured target.");
    }
    for element in &report.elements {
        let name = element.name.as_deref().unwrap_or("(unnamed)");
        let tag = element
            .tag
            .as_deref()
            .map(|t| format!(" [{t}]"))
            .unwrap_or_default();
        out.push(
            format!(
                "{} {} #{}: {name}{tag}  {}",
                element_status_label(element.status),
                element.target_label,
                element.step_id,
                element.ifc_type
            ),
            Style::Body,
            element_tone(element.status),
        );
        for finding in &element.findings {
            let value = match (finding.value, &finding.raw) {
                (Some(v), _) => format!(
                    "{}{}",
                    fmt_number(v),
                    finding
                        .unit
                        .as_deref()
                        .map(|u| format!(" {u}"))
                        .unwrap_or_default()
                ),
                (None, Some(raw)) => format!("'{raw}' (not numeric)"),
                (None, None) => "not found".to_string(),
            };
            let standard = finding
                .standard
                .as_deref()
                .map(|s| format!(", required {s}"))
                .unwrap_or_default();
            let source = finding
                .source
                .as_deref()
                .map(|s| format!("  ({s})"))
                .unwrap_or_default();
            out.push(
                format!(
                    "    {}: {value}{standard} -> {}{source}",
                    finding.label,
                    finding_status_label(finding.status)
                ),
                Style::Small,
                finding_tone(finding.status),
            );
        }
    }

    if !report.citations.is_empty() {
        out.blank();
        out.push("Citations", Style::Heading, Tone::Plain);
        for citation in &report.citations {
            out.body(format!(
                "{} / {} ({}), {}:",
                citation.target_id, citation.property, citation.standard, citation.reference
            ));
            match &citation.quote {
                Some(quote) => {
                    let marker = if citation.verified {
                        ""
                    } else {
                        " [not found in reference]"
                    };
                    out.push(
                        format!("    \"{quote}\"{marker}"),
                        Style::Small,
                        if citation.verified { Tone::Plain } else { Tone::Amber },
                    );
                }
                None => out.push(
                    "    No supporting passage found.",
                    Style::Small,
                    Tone::Amber,
                ),
            }
            if let Some(section) = &citation.section {
                out.push(format!("    Section: {section}"), Style::Small, Tone::Plain);
            }
            if let Some(explanation) = &citation.explanation {
                out.push(format!("    {explanation}"), Style::Small, Tone::Plain);
            }
        }
    }

    if !report.warnings.is_empty() {
        out.blank();
        out.push("Warnings", Style::Heading, Tone::Plain);
        for warning in &report.warnings {
            out.push(format!("- {warning}"), Style::Body, Tone::Amber);
        }
    }

    out.lines
}

fn paginate(lines: &[Line]) -> Vec<Vec<Line>> {
    let mut pages = vec![];
    let mut current = vec![];
    let mut y = TOP;
    for line in lines {
        if y - line.style.leading() < BOTTOM && !current.is_empty() {
            pages.push(std::mem::take(&mut current));
            y = TOP;
        }
        y -= line.style.leading();
        current.push(line.clone());
    }
    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

fn page_content(lines: &[Line], number: usize, total: usize) -> Content {
    let mut ops = vec![];
    let mut y = TOP;
    for line in lines {
        y -= line.style.leading();
        if line.text.is_empty() {
            continue;
        }
        ops.push(Operation::new("rg", line.tone.rgb()));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![line.style.font().into(), line.style.size().into()],
        ));
        ops.push(Operation::new("Td", vec![MARGIN_LEFT.into(), y.into()]));
        ops.push(Operation::new("Tj", vec![pdf_string(&line.text)]));
        ops.push(Operation::new("ET", vec![]));
    }

    ops.push(Operation::new("rg", Tone::Plain.rgb()));
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec!["F1".into(), 8.into()]));
    ops.push(Operation::new(
        "Td",
        vec![(PAGE_WIDTH / 2 - 25).into(), FOOTER_Y.into()],
    ));
    ops.push(Operation::new(
        "Tj",
        vec![pdf_string(&format!("Page {number} of {total}"))],
    ));
    ops.push(Operation::new("ET", vec![]));

    Content { operations: ops }
}

fn pdf_string(text: &str) -> Object {
    Object::String(encode_win_ansi(text), StringFormat::Literal)
}

/// Maps text to WinAnsiEncoding bytes; characters without a code point are
/// spelled out or replaced by `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{20}'..='\u{7e}' => out.push(c as u8),
            '\u{a0}'..='\u{ff}' => out.push(c as u32 as u8),
            '€' => out.push(0x80),
            '‚' => out.push(0x82),
            '„' => out.push(0x84),
            '…' => out.push(0x85),
            '‰' => out.push(0x89),
            '‘' => out.push(0x91),
            '’' => out.push(0x92),
            '“' => out.push(0x93),
            '”' => out.push(0x94),
            '•' => out.push(0x95),
            '–' => out.push(0x96),
            '—' => out.push(0x97),
            '≥' => out.extend_from_slice(b">="),
            '≤' => out.extend_from_slice(b"<="),
            c if c.is_whitespace() => out.push(b' '),
            _ => out.push(b'?'),
        }
    }
    out
}

/// Greedy word wrap on character count; continuation lines keep the leading
/// indent and words longer than a line are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    if text.chars().count() <= width {
        return vec![text.to_string()];
    }
    let indent: String = text.chars().take_while(|c| *c == ' ').collect();
    let mut lines = vec![];
    let mut current = indent.clone();
    let mut fresh = true;
    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while !word.is_empty() {
            let used = current.chars().count();
            let needed = if fresh { word.len() } else { word.len() + 1 };
            if used + needed <= width {
                if !fresh {
                    current.push(' ');
                }
                current.extend(word.drain(..));
                fresh = false;
            } else if !fresh {
                lines.push(std::mem::replace(&mut current, indent.clone()));
                fresh = true;
            } else {
                let room = width.saturating_sub(used).max(1);
                let rest = word.split_off(room);
                current.extend(word.drain(..));
                lines.push(std::mem::replace(&mut current, indent.clone()));
                word = rest;
            }
        }
    }
    if !fresh {
        lines.push(current);
    }
    lines
}

fn report_tone(status: ReportStatus) -> Tone {
    match status {
        ReportStatus::Pass => Tone::Green,
        ReportStatus::Fail => Tone::Red,
        ReportStatus::Incomplete | ReportStatus::NoElements => Tone::Amber,
    }
}

fn element_tone(status: ElementStatus) -> Tone {
    match status {
        ElementStatus::Pass => Tone::Green,
        ElementStatus::Fail => Tone::Red,
        ElementStatus::Incomplete => Tone::Amber,
    }
}

fn finding_tone(status: FindingStatus) -> Tone {
    match status {
        FindingStatus::Pass => Tone::Green,
        FindingStatus::Fail => Tone::Red,
        FindingStatus::Missing => Tone::Amber,
        FindingStatus::Info => Tone::Plain,
    }
}

fn element_status_label(status: ElementStatus) -> &'static str {
    match status {
        ElementStatus::Pass => "[PASS]",
        ElementStatus::Fail => "[FAIL]",
        ElementStatus::Incomplete => "[INCOMPLETE]",
    }
}

fn finding_status_label(status: FindingStatus) -> &'static str {
    match status {
        FindingStatus::Pass => "pass",
        FindingStatus::Fail => "FAIL",
        FindingStatus::Missing => "missing",
        FindingStatus::Info => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::engine::check_model;
    use crate::ifc::{ModelReader, StepModelReader, RAILWAY_FIXTURE};
    use crate::standards::defaults::default_config;

    fn fixture_report() -> CheckReport {
        let model = StepModelReader.read(RAILWAY_FIXTURE.as_bytes()).unwrap();
        check_model(&model, &default_config(), None, "railway.ifc").unwrap()
    }

    #[test]
    fn test_encode_win_ansi() {
        assert_eq!(encode_win_ansi("Höhe"), vec![b'H', 0xf6, b'h', b'e']);
        assert_eq!(encode_win_ansi("≤ 0.06"), b"<= 0.06".to_vec());
        assert_eq!(encode_win_ansi("1435 ± 3"), vec![b'1', b'4', b'3', b'5', b' ', 0xb1, b' ', b'3']);
        assert_eq!(encode_win_ansi("0.55 … 0.96")[5], 0x85);
        assert_eq!(encode_win_ansi("漢"), b"?".to_vec());
        assert_eq!(
            encode_win_ansi("Spurweite\r\n1435 mm\tgemessen\u{2028}"),
            b"Spurweite  1435 mm gemessen ".to_vec()
        );
    }

    #[test]
    fn test_wrap_short_line_untouched() {
        assert_eq!(wrap("Rampe Nord", 95), vec!["Rampe Nord".to_string()]);
        assert_eq!(wrap("", 95), vec![String::new()]);
    }

    #[test]
    fn test_wrap_keeps_indent_and_width() {
        let text = format!("    {}", "Schwelle ".repeat(30));
        let lines = wrap(&text, 40);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.chars().count() <= 40, "{line:?}");
            assert!(line.starts_with("    "));
        }
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let lines = wrap(&"x".repeat(250), 95);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].len(), 60);
    }

    #[test]
    fn test_layout_contains_header_and_elements() {
        let report = fixture_report();
        let lines = layout_report(&report);
        let text: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert!(text.contains(&"File: railway.ifc"));
        assert!(text.contains(&"Overall status: FAIL"));
        assert!(text.iter().any(|l| l.starts_with("[FAIL] Rampe #15")));
        assert!(text.iter().any(|l| l.contains("Spurweite: 1442 mm, required 1435 ± 3 -> FAIL")));
        let failed = lines
            .iter()
            .find(|l| l.text.starts_with("[FAIL]"))
            .unwrap();
        assert_eq!(failed.tone, Tone::Red);
    }

    #[test]
    fn test_render_produces_pdf() {
        let bytes = render_report_pdf(&fixture_report()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_long_report_spans_pages() {
        let mut report = fixture_report();
        report.warnings = (0..150).map(|i| format!("warning number {i}")).collect();
        let bytes = render_report_pdf(&report).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 3);
    }
}
