use std::path::Path;

use crate::error::ReportError;
use crate::image_io::{EmbeddedImage, to_embedded_jpeg};
use crate::report::{REPORT_TITLE, ReportEntry, ReportTemplate};
use crate::staging::{Staging, read_asset};

/// Points per inch.
pub const INCH: f64 = 72.0;
pub const MISSING_IMAGE_TEXT: &str = "Image not available";

const GAP: f64 = 12.0;
const TABLE_COLUMNS: [f64; 2] = [2.0 * INCH, 4.0 * INCH];
const LOGO_SIZE: f64 = 2.0 * INCH;
const EVIDENCE_SIZE: f64 = 3.0 * INCH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// A unit of report content, laid out top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    SubHeading(String),
    Body(String),
    /// Two-column grid table; widths in points.
    Table {
        rows: Vec<[String; 2]>,
        col_widths: [f64; 2],
    },
    /// Image scaled to `width` x `height` points.
    Image {
        image: EmbeddedImage,
        width: f64,
        height: f64,
        align: Align,
    },
    Spacer(f64),
}

fn table(rows: Vec<[String; 2]>) -> Block {
    Block::Table {
        rows,
        col_widths: TABLE_COLUMNS,
    }
}

fn row(label: &str, value: impl Into<String>) -> [String; 2] {
    [label.to_string(), value.into()]
}

/// Lay out the whole report.
///
/// # Errors
///
/// Only on I/O failures other than a missing file.
pub fn build(
    entries: &[ReportEntry],
    template: &ReportTemplate,
    staging: &Staging,
) -> Result<Vec<Block>, ReportError> {
    let mut blocks = Vec::new();

    if let Some(logo) = template.logo_path.as_deref()
        && let Some(image) = load_image(logo, read_asset(logo))?
    {
        blocks.push(Block::Image {
            image,
            width: LOGO_SIZE,
            height: LOGO_SIZE,
            align: Align::Left,
        });
    }

    blocks.push(Block::Title(REPORT_TITLE.to_string()));
    blocks.push(Block::Spacer(GAP));

    let d = &template.defaults;
    for (i, entry) in entries.iter().enumerate() {
        let n = i + 1;
        let a = &entry.answers;

        blocks.push(Block::Heading(format!("Report ID: SR{n}")));
        blocks.push(Block::Spacer(GAP));

        blocks.push(Block::Heading("1. Incident Details".into()));
        blocks.push(Block::Spacer(GAP));
        blocks.push(table(vec![
            row("Incident ID:", format!("SI{n}")),
            row("Date/Time:", d.date_time.as_str()),
            row("Location:", d.location.as_str()),
            row("Incident Type:", d.incident_type.as_str()),
        ]));
        blocks.push(Block::Spacer(GAP));

        section(
            &mut blocks,
            "2. Incident Description",
            "Brief Description:",
            &a.incident,
        );
        section(
            &mut blocks,
            "3. Personnel Involved",
            "Number of Personnel Involved:",
            &a.num_people,
        );

        blocks.push(Block::Heading("4. Equipment Involved".into()));
        blocks.push(Block::Spacer(GAP));
        blocks.push(table(vec![
            row("List of Equipment:", d.equipment.as_str()),
            row("Drive Mode:", d.drive_mode.as_str()),
            row("Speed:", a.speed.as_str()),
        ]));
        blocks.push(Block::Spacer(GAP));

        section(
            &mut blocks,
            "5. Analysis of the Incident",
            "Potential Causes:",
            &a.full_description,
        );

        blocks.push(Block::Heading("6. Photographic Evidence".into()));
        blocks.push(Block::Spacer(GAP));
        let evidence = match entry.image.as_deref() {
            Some(name) => load_image(&staging.dir().join(name), staging.read(name))?,
            None => None,
        };
        match evidence {
            Some(image) => blocks.push(Block::Image {
                image,
                width: EVIDENCE_SIZE,
                height: EVIDENCE_SIZE,
                align: Align::Center,
            }),
            None => blocks.push(Block::Body(MISSING_IMAGE_TEXT.into())),
        }
        blocks.push(Block::Spacer(GAP));
    }

    Ok(blocks)
}

fn section(blocks: &mut Vec<Block>, heading: &str, label: &str, body: &str) {
    blocks.push(Block::Heading(heading.into()));
    blocks.push(Block::Spacer(GAP));
    blocks.push(Block::SubHeading(label.into()));
    blocks.push(Block::Body(body.into()));
    blocks.push(Block::Spacer(GAP));
}

/// Missing or undecodable images become `None`; other read errors propagate.
fn load_image(
    path: &Path,
    read: Result<Vec<u8>, ReportError>,
) -> Result<Option<EmbeddedImage>, ReportError> {
    match read {
        Ok(bytes) => match to_embedded_jpeg(&bytes) {
            Ok(image) => Ok(Some(image)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "image can't be decoded, leaving it out");
                Ok(None)
            }
        },
        Err(ReportError::MissingAsset(missing)) => {
            tracing::debug!(path = %missing.display(), "image not found, leaving it out");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
