//! Safety report rendering.
//!
//! Rendering happens in two steps: [`layout::build`] turns the answers into an
//! ordered list of [`layout::Block`]s, then [`pdf::write_pdf`] paginates and
//! draws them.

pub mod layout;
pub mod pdf;

use std::path::PathBuf;

use crate::config::ReportDefaults;
use crate::error::ReportError;
use crate::models::AnswerSet;
use crate::staging::Staging;

pub const REPORT_TITLE: &str = "Safety Report";
pub const DOWNLOAD_NAME: &str = "incident_report.pdf";

/// Fixed parts of every report.
#[derive(Debug, Clone, Default)]
pub struct ReportTemplate {
    pub logo_path: Option<PathBuf>,
    pub defaults: ReportDefaults,
}

/// One sub-report: the answers for an image plus the staged filename, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub answers: AnswerSet,
    pub image: Option<String>,
}

/// Pair answers with filenames by position. The answers decide how many
/// sub-reports there are; an answer without a filename renders without a photo
/// and surplus filenames are dropped.
#[must_use]
pub fn pair_entries(answers: Vec<AnswerSet>, images: Vec<String>) -> Vec<ReportEntry> {
    if answers.len() != images.len() {
        tracing::warn!(
            answers = answers.len(),
            images = images.len(),
            "answer and image counts differ"
        );
    }
    let mut images = images.into_iter();
    answers
        .into_iter()
        .map(|answers| ReportEntry {
            answers,
            image: images.next().filter(|name| !name.is_empty()),
        })
        .collect()
}

/// Render the complete report as PDF bytes.
///
/// # Errors
///
/// Missing images are substituted, not reported. Any other I/O failure or a PDF
/// writer failure aborts the render.
pub fn render(
    entries: &[ReportEntry],
    template: &ReportTemplate,
    staging: &Staging,
) -> Result<Vec<u8>, ReportError> {
    let blocks = layout::build(entries, template, staging)?;
    let bytes = pdf::write_pdf(&blocks, REPORT_TITLE)?;
    tracing::info!(
        reports = entries.len(),
        blocks = blocks.len(),
        size = bytes.len(),
        "rendered safety report"
    );
    Ok(bytes)
}
