use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::Local;
use genpdf::elements::{Break, Paragraph, UnorderedList};
use genpdf::fonts::{FontData, FontFamily};
use genpdf::style::{Style, StyledString};
use genpdf::{Document, SimplePageDecorator};
use tracing::{debug, info};

use crate::research::types::SubQuestion;

/// Directories and family names tried, in order, for the PDF font.
const FONT_CANDIDATES: &[(&str, &str)] = &[
    ("", "LiberationSans"),
    ("/usr/share/fonts/truetype/liberation", "LiberationSans"),
    ("/usr/share/fonts/liberation", "LiberationSans"),
    ("/usr/share/fonts/truetype/dejavu", "DejaVuSans"),
    ("/System/Library/Fonts", "Helvetica"),
    ("/Library/Fonts", "Arial"),
];

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no usable PDF font found (searched: {0})")]
    FontUnavailable(String),
    #[error("failed to render PDF: {0}")]
    Render(String),
    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// Report body split on blank lines, each paragraph ending in a period.
pub fn report_paragraphs(report: &str) -> Vec<String> {
    report
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.ends_with('.') {
                p.to_string()
            } else {
                format!("{}.", p)
            }
        })
        .collect()
}

fn load_font_family(candidates: &[(&str, &str)]) -> Result<FontFamily<FontData>, ExportError> {
    for (dir, name) in candidates {
        match genpdf::fonts::from_files(dir, name, None) {
            Ok(family) => {
                debug!(dir, name, "Loaded PDF font");
                return Ok(family);
            }
            Err(e) => debug!(dir, name, "Font not usable: {}", e),
        }
    }
    let searched = candidates
        .iter()
        .map(|(dir, name)| format!("{}/{}", dir, name))
        .collect::<Vec<_>>()
        .join(", ");
    Err(ExportError::FontUnavailable(searched))
}

fn styled(text: &str, size: u8) -> Paragraph {
    let style = Style::new().bold().with_font_size(size);
    Paragraph::new(StyledString::new(text.to_string(), style))
}

/// Title, generation time, bulleted sub-questions, then the report body.
pub fn write_pdf(
    path: &Path,
    title: &str,
    subquestions: &[SubQuestion],
    report: &str,
) -> Result<(), ExportError> {
    let font_family = load_font_family(FONT_CANDIDATES)?;

    let mut doc = Document::new(font_family);
    doc.set_title(title);

    let mut decorator = SimplePageDecorator::new();
    decorator.set_margins(30);
    doc.set_page_decorator(decorator);

    doc.push(styled(title, 18));
    doc.push(Paragraph::new(
        Local::now().format("Generated on %Y-%m-%d %H:%M").to_string(),
    ));
    doc.push(Break::new(1));

    doc.push(styled("Planner Output (Subquestions)", 14));
    let mut list = UnorderedList::new();
    for sq in subquestions {
        list.push(Paragraph::new(sq.display_line()));
    }
    doc.push(list);
    doc.push(Break::new(1));

    doc.push(styled("Synthesis Report", 14));
    for paragraph in report_paragraphs(report) {
        doc.push(Paragraph::new(paragraph));
        doc.push(Break::new(0.5));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    doc.render_to_file(path)
        .map_err(|e| ExportError::Render(e.to_string()))?;

    info!(path = %path.display(), "Wrote PDF report");
    Ok(())
}

/// Plain-text rendition: question, numbered sub-questions, report.
pub fn render_text_report(question: &str, subquestions: &[SubQuestion], report: &str) -> String {
    let mut out = format!("Research Question: {}\n\nSubquestions:\n", question);
    for (i, sq) in subquestions.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, sq.text);
    }
    out.push_str("\nSynthesis Report:\n");
    out.push_str(report);
    out
}

pub fn write_text_report(
    path: &Path,
    question: &str,
    subquestions: &[SubQuestion],
    report: &str,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_text_report(question, subquestions, report))?;
    info!(path = %path.display(), "Wrote text report");
    Ok(())
}
