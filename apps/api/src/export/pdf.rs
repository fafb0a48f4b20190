//! Printable export: lays feedback text out on A4 pages and serializes a PDF.
//!
//! Text is narrowed to Latin-1 (sent as WinAnsiEncoding with Helvetica); anything
//! outside that set is dropped without notice. Rendering has no failure path for
//! callers.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::error;

use crate::export::font_metrics::{FontMetricTable, HELVETICA};

pub const PDF_MIME: &str = "application/pdf";

// Page geometry in millimetres (A4 portrait).
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const BOTTOM_MARGIN_MM: f32 = 15.0;
/// Inner padding between the text column edge and the glyphs.
const CELL_PADDING_MM: f32 = 1.0;
const LINE_HEIGHT_MM: f32 = 10.0;
const FONT_SIZE_PT: f32 = 12.0;

const PT_PER_MM: f32 = 72.0 / 25.4;

/// One laid-out page: baseline positions (in points, PDF coordinates) and line bytes.
#[derive(Debug, Default)]
struct PageLayout {
    lines: Vec<(f32, f32, Vec<u8>)>,
}

/// Renders `text` as a paginated PDF and returns the file bytes.
pub fn render_pdf(text: &str) -> Vec<u8> {
    let pages = layout_pages(text, &HELVETICA);
    match write_document(&pages, &HELVETICA) {
        Ok(bytes) => bytes,
        Err(e) => {
            // Only reachable on an internal serializer fault.
            error!("PDF serialization failed: {e}");
            Vec::new()
        }
    }
}

/// Keeps only characters representable in a single Latin-1 byte.
/// Tabs become spaces; control characters and everything above U+00FF are dropped.
pub fn narrow_to_latin1(line: &str) -> String {
    line.chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            ' '..='~' | '\u{A0}'..='\u{FF}' => Some(c),
            _ => None,
        })
        .collect()
}

/// Latin-1 code points map one-to-one onto bytes.
fn latin1_bytes(line: &str) -> Vec<u8> {
    line.chars().map(|c| c as u32 as u8).collect()
}

fn text_width_em() -> f32 {
    let column_mm = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - 2.0 * CELL_PADDING_MM;
    column_mm / (FONT_SIZE_PT / PT_PER_MM)
}

/// Greedy word wrap at `max_width` em. Words wider than a full line are broken
/// by character. A blank input line yields a single empty output line.
fn wrap_line(line: &str, metrics: &FontMetricTable, max_width: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0_f32;

    for word in line.split_whitespace() {
        let word_w = metrics.measure_str(word);
        let space_w = if current.is_empty() {
            0.0
        } else {
            metrics.space_width
        };

        if current_width + space_w + word_w <= max_width {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_width += space_w + word_w;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }

        if word_w <= max_width {
            current.push_str(word);
            current_width = word_w;
        } else {
            // Break an over-long word across as many lines as needed.
            for c in word.chars() {
                let c_w = metrics.char_width(c);
                if current_width + c_w > max_width && !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                    current_width = 0.0;
                }
                current.push(c);
                current_width += c_w;
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn layout_pages(text: &str, metrics: &FontMetricTable) -> Vec<PageLayout> {
    let max_width = text_width_em();
    let font_size_mm = FONT_SIZE_PT / PT_PER_MM;
    let page_break_at = PAGE_HEIGHT_MM - BOTTOM_MARGIN_MM;
    let x_pt = (MARGIN_MM + CELL_PADDING_MM) * PT_PER_MM;

    let mut pages = vec![PageLayout::default()];
    let mut y_mm = MARGIN_MM;

    for source_line in text.split('\n') {
        let narrowed = narrow_to_latin1(source_line);
        for wrapped in wrap_line(&narrowed, metrics, max_width) {
            if y_mm + LINE_HEIGHT_MM > page_break_at {
                pages.push(PageLayout::default());
                y_mm = MARGIN_MM;
            }
            // Vertically centre the glyphs in the line cell.
            let baseline_mm = y_mm + 0.5 * LINE_HEIGHT_MM + 0.3 * font_size_mm;
            let y_pt = (PAGE_HEIGHT_MM - baseline_mm) * PT_PER_MM;
            if let Some(page) = pages.last_mut() {
                page.lines.push((x_pt, y_pt, latin1_bytes(&wrapped)));
            }
            y_mm += LINE_HEIGHT_MM;
        }
    }
    pages
}

fn page_content(page: &PageLayout) -> Content {
    let mut operations = Vec::with_capacity(page.lines.len() * 5);
    for (x, y, bytes) in &page.lines {
        if bytes.is_empty() {
            continue;
        }
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), FONT_SIZE_PT.into()]));
        operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(bytes.clone())],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    Content { operations }
}

fn write_document(pages: &[PageLayout], metrics: &FontMetricTable) -> lopdf::Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => metrics.base_font,
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content = page_content(page);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            (PAGE_WIDTH_MM * PT_PER_MM).into(),
            (PAGE_HEIGHT_MM * PT_PER_MM).into(),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}
