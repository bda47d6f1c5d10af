use oxidize_pdf::{Color, Document, Font, Image, Page};

use crate::error::ReportError;
use crate::image_io::EmbeddedImage;
use crate::report::layout::{Align, Block};

// US Letter, one inch margins.
const PAGE_WIDTH: f64 = 612.0;
const PAGE_HEIGHT: f64 = 792.0;
const MARGIN: f64 = 72.0;
const FRAME_WIDTH: f64 = PAGE_WIDTH - 2.0 * MARGIN;
/// Usable height of a page, in points.
pub const FRAME_HEIGHT: f64 = PAGE_HEIGHT - 2.0 * MARGIN;
const TOP: f64 = PAGE_HEIGHT - MARGIN;

const CELL_PAD: f64 = 4.0;
const GRID_LINE: f64 = 0.5;
const DESCENT: f64 = 0.22;

#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub bold: bool,
    pub size: f64,
    pub leading: f64,
    pub space_before: f64,
    pub space_after: f64,
    pub align: Align,
}

impl Style {
    fn font(self) -> Font {
        if self.bold {
            Font::HelveticaBold
        } else {
            Font::Helvetica
        }
    }
}

pub const TITLE: Style = Style {
    bold: true,
    size: 18.0,
    leading: 22.0,
    space_before: 0.0,
    space_after: 6.0,
    align: Align::Center,
};

pub const HEADING: Style = Style {
    bold: true,
    size: 14.0,
    leading: 18.0,
    space_before: 12.0,
    space_after: 6.0,
    align: Align::Left,
};

pub const SUB_HEADING: Style = Style {
    bold: true,
    size: 12.0,
    leading: 14.0,
    space_before: 12.0,
    space_after: 6.0,
    align: Align::Left,
};

pub const BODY: Style = Style {
    bold: false,
    size: 10.0,
    leading: 12.0,
    space_before: 6.0,
    space_after: 0.0,
    align: Align::Left,
};

/// Paginate `blocks` onto Letter pages and serialize the document.
///
/// # Errors
///
/// Returns `Pdf` if the writer rejects text, an image, or the final output.
pub fn write_pdf(blocks: &[Block], title: &str) -> Result<Vec<u8>, ReportError> {
    let mut w = PdfWriter::new(title);
    for block in blocks {
        match block {
            Block::Title(text) => w.paragraph(text, TITLE)?,
            Block::Heading(text) => w.paragraph(text, HEADING)?,
            Block::SubHeading(text) => w.paragraph(text, SUB_HEADING)?,
            Block::Body(text) => w.paragraph(text, BODY)?,
            Block::Table { rows, col_widths } => w.table(rows, *col_widths)?,
            Block::Image {
                image,
                width,
                height,
                align,
            } => w.image(image, *width, *height, *align)?,
            Block::Spacer(h) => w.space(*h),
        }
    }
    w.finish()
}

struct PdfWriter {
    doc: Document,
    page: Page,
    pages: usize,
    /// Top of the free area on the current page.
    y: f64,
    /// Nothing drawn on the current page yet.
    fresh: bool,
    /// Lowest point anything was drawn at, over all pages.
    lowest: f64,
    images: usize,
}

impl PdfWriter {
    fn new(title: &str) -> Self {
        let mut doc = Document::new();
        doc.set_title(title);
        Self {
            doc,
            page: Page::new(PAGE_WIDTH, PAGE_HEIGHT),
            pages: 1,
            y: TOP,
            fresh: true,
            lowest: TOP,
            images: 0,
        }
    }

    fn break_if_needed(&mut self, height: f64) {
        if self.y - height >= MARGIN || self.fresh {
            return;
        }
        self.new_page();
    }

    fn new_page(&mut self) {
        let full = std::mem::replace(&mut self.page, Page::new(PAGE_WIDTH, PAGE_HEIGHT));
        self.doc.add_page(full);
        self.pages += 1;
        self.y = TOP;
        self.fresh = true;
    }

    /// Take `height` points off the free area for content about to be drawn.
    fn claim(&mut self, height: f64) {
        self.y -= height;
        self.lowest = self.lowest.min(self.y);
        self.fresh = false;
    }

    // Vertical space is dropped at the top of a page.
    fn space(&mut self, height: f64) {
        if !self.fresh {
            self.y -= height;
        }
    }

    fn paragraph(&mut self, text: &str, style: Style) -> Result<(), ReportError> {
        self.space(style.space_before);
        for line in wrap_lines(text, style.bold, style.size, FRAME_WIDTH) {
            self.break_if_needed(style.leading);
            self.claim(style.leading);
            let x = match style.align {
                Align::Left => MARGIN,
                Align::Center => {
                    MARGIN + (FRAME_WIDTH - text_width(&line, style.bold, style.size)).max(0.0) / 2.0
                }
            };
            self.page
                .text()
                .set_font(style.font(), style.size)
                .at(x, self.y + style.size * DESCENT)
                .write(&line)
                .map_err(pdf_err)?;
        }
        self.space(style.space_after);
        Ok(())
    }

    fn table(&mut self, rows: &[[String; 2]], col_widths: [f64; 2]) -> Result<(), ReportError> {
        let total: f64 = col_widths.iter().sum();
        let left = MARGIN + (FRAME_WIDTH - total).max(0.0) / 2.0;

        for row in rows {
            let mut cells: Vec<Vec<String>> = row
                .iter()
                .zip(col_widths)
                .map(|(text, w)| wrap_lines(text, BODY.bold, BODY.size, w - 2.0 * CELL_PAD))
                .collect();
            let lines = cells.iter().map(Vec::len).max().unwrap_or(0);

            for (i, take) in row_chunks(lines, self.y - MARGIN).into_iter().enumerate() {
                if i > 0 {
                    self.new_page();
                }
                if take == 0 {
                    continue;
                }
                let chunk: Vec<Vec<String>> = cells
                    .iter_mut()
                    .map(|c| c.drain(..take.min(c.len())).collect())
                    .collect();
                self.table_row(&chunk, take, left, col_widths)?;
            }
        }
        Ok(())
    }

    fn table_row(
        &mut self,
        cells: &[Vec<String>],
        lines: usize,
        left: f64,
        col_widths: [f64; 2],
    ) -> Result<(), ReportError> {
        let height = row_height(lines);
        let top = self.y;
        let mut x = left;
        for (cell, w) in cells.iter().zip(col_widths) {
            self.page
                .graphics()
                .set_stroke_color(Color::rgb(0.0, 0.0, 0.0))
                .set_line_width(GRID_LINE)
                .rectangle(x, top - height, w, height)
                .stroke();

            let mut baseline = top - CELL_PAD - BODY.leading + BODY.size * DESCENT;
            for line in cell {
                self.page
                    .text()
                    .set_font(BODY.font(), BODY.size)
                    .at(x + CELL_PAD, baseline)
                    .write(line)
                    .map_err(pdf_err)?;
                baseline -= BODY.leading;
            }
            x += w;
        }
        self.claim(height);
        Ok(())
    }

    fn image(
        &mut self,
        image: &EmbeddedImage,
        width: f64,
        height: f64,
        align: Align,
    ) -> Result<(), ReportError> {
        self.break_if_needed(height);
        let x = match align {
            Align::Left => MARGIN,
            Align::Center => MARGIN + (FRAME_WIDTH - width).max(0.0) / 2.0,
        };

        self.images += 1;
        let name = format!("Im{}", self.images);
        let pdf_image = Image::from_jpeg_data(image.jpeg.clone()).map_err(pdf_err)?;
        self.page.add_image(name.clone(), pdf_image);
        self.page
            .draw_image(&name, x, self.y - height, width, height)
            .map_err(pdf_err)?;

        self.claim(height);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<u8>, ReportError> {
        if self.lowest < MARGIN - 0.01 {
            return Err(ReportError::Pdf(format!(
                "content runs {:.1}pt past the bottom margin",
                MARGIN - self.lowest
            )));
        }
        self.doc.add_page(self.page);
        tracing::debug!(pages = self.pages, images = self.images, "writing pdf");
        let mut bytes = Vec::new();
        self.doc.write(&mut bytes).map_err(pdf_err)?;
        Ok(bytes)
    }
}

/// Height of a table row holding `lines` wrapped lines.
#[must_use]
pub fn row_height(lines: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let lines = lines.max(1) as f64;
    lines * BODY.leading + 2.0 * CELL_PAD
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn lines_fitting(room: f64) -> usize {
    let n = ((room - 2.0 * CELL_PAD) / BODY.leading).floor();
    if n > 0.0 { n as usize } else { 0 }
}

/// Split a table row of `lines` wrapped lines across pages, given `room`
/// points left on the current page. Each element is the number of lines drawn
/// on one page, starting with the current one. A leading `0` means the row
/// starts on the next page. A row only splits when it is taller than a page.
#[must_use]
pub fn row_chunks(lines: usize, room: f64) -> Vec<usize> {
    let lines = lines.max(1);
    let first = lines_fitting(room);
    if lines <= first {
        return vec![lines];
    }

    let per_page = lines_fitting(FRAME_HEIGHT);
    let mut left = lines;
    let mut chunks = Vec::new();
    if lines <= per_page || first == 0 {
        chunks.push(0);
    } else {
        chunks.push(first);
        left -= first;
    }
    while left > 0 {
        let take = left.min(per_page);
        chunks.push(take);
        left -= take;
    }
    chunks
}

fn pdf_err<E: std::fmt::Display>(e: E) -> ReportError {
    ReportError::Pdf(e.to_string())
}

/// Approximate Helvetica advance width of `ch`, in 1/1000 em.
fn glyph_width(ch: char) -> f64 {
    match ch {
        '\'' => 191.0,
        'i' | 'j' | 'l' => 222.0,
        ' ' | '.' | ',' | ':' | ';' | '!' | 'f' | 't' | 'I' | '/' => 278.0,
        'r' | '-' | '(' | ')' => 333.0,
        'm' | 'M' => 833.0,
        'w' => 722.0,
        'W' => 944.0,
        '0'..='9' => 556.0,
        c if c.is_ascii_uppercase() => 667.0,
        _ => 556.0,
    }
}

/// Approximate rendered width of `text` in points.
#[must_use]
pub fn text_width(text: &str, bold: bool, size: f64) -> f64 {
    let em: f64 = text.chars().map(glyph_width).sum();
    let scale = if bold { 1.05 } else { 1.0 };
    em * scale * size / 1000.0
}

/// Greedy word wrap to `max_width` points. Explicit newlines start a new line,
/// words wider than a line are split by character. Blank input gives no lines.
#[must_use]
pub fn wrap_lines(text: &str, bold: bool, size: f64, max_width: f64) -> Vec<String> {
    let fits = |s: &str| text_width(s, bold, size) <= max_width;
    let mut lines = Vec::new();

    for raw in text.lines() {
        let mut current = String::new();
        for word in raw.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if fits(&candidate) {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            // Hard-split a word that is too wide on its own.
            for ch in word.chars() {
                current.push(ch);
                if !fits(&current) && current.chars().count() > 1 {
                    current.pop();
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}
