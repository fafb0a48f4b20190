//! Text extraction: turns an uploaded PDF or plain-text artifact into a string.
//!
//! Extraction never fails. Unreadable pages, unparseable documents and invalid
//! UTF-8 degrade to partial or empty text, flagged through `Extraction::degraded`.

use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, warn};

/// The two upload types the assistant accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    Text,
}

impl DocumentKind {
    /// Resolves the kind from a declared MIME type, then from the file extension.
    /// Returns `None` for anything that is neither a PDF nor plain text.
    pub fn detect(content_type: Option<&str>, file_name: Option<&str>) -> Option<Self> {
        let mime = content_type
            .map(|c| c.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();
        match mime.as_str() {
            "application/pdf" => return Some(Self::Pdf),
            "text/plain" => return Some(Self::Text),
            _ => {}
        }

        let extension = file_name
            .and_then(|n| n.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())?;
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Raw upload: bytes plus declared kind. Immutable once received.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

/// Text derived from an upload. `text` is always defined, possibly empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    pub text: String,
    /// True when part of the input was lost (failed pages, unparseable PDF, bad bytes).
    pub degraded: bool,
    /// Page count for PDFs; `None` for plain text.
    pub pages_total: Option<usize>,
    pub pages_failed: usize,
}

pub fn extract_text(document: &UploadedDocument) -> Extraction {
    match document.kind {
        DocumentKind::Pdf => extract_pdf(&document.bytes),
        DocumentKind::Text => {
            let (text, dropped) = decode_utf8_dropping_invalid(&document.bytes);
            if dropped > 0 {
                debug!("Dropped {dropped} undecodable byte sequences from text upload");
            }
            Extraction {
                text,
                degraded: dropped > 0,
                pages_total: None,
                pages_failed: 0,
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PDF
// ────────────────────────────────────────────────────────────────────────────

/// Extracts each page in order and joins them with `\n`.
/// A page that fails or reads back blank contributes an empty string and counts
/// toward `pages_failed`.
fn extract_pdf(bytes: &[u8]) -> Extraction {
    let document = match guarded(|| lopdf::Document::load_mem(bytes)) {
        Some(Ok(doc)) => doc,
        Some(Err(e)) => {
            warn!("PDF could not be parsed, extracting nothing: {e}");
            return unreadable_pdf();
        }
        None => {
            warn!("PDF parser panicked, extracting nothing");
            return unreadable_pdf();
        }
    };

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let mut pages_failed = 0usize;

    let pages: Vec<String> = page_numbers
        .iter()
        .map(|&number| match guarded(|| document.extract_text(&[number])) {
            Some(Ok(text)) if !text.trim().is_empty() => text,
            Some(Ok(_)) => {
                warn!("PDF page {number} yielded no text");
                pages_failed += 1;
                String::new()
            }
            Some(Err(e)) => {
                warn!("PDF page {number} yielded no text: {e}");
                pages_failed += 1;
                String::new()
            }
            None => {
                warn!("PDF page {number} panicked during extraction");
                pages_failed += 1;
                String::new()
            }
        })
        .collect();

    Extraction {
        text: pages.join("\n"),
        degraded: pages_failed > 0,
        pages_total: Some(page_numbers.len()),
        pages_failed,
    }
}

fn unreadable_pdf() -> Extraction {
    Extraction {
        text: String::new(),
        degraded: true,
        pages_total: Some(0),
        pages_failed: 0,
    }
}

/// Runs a parser step, turning a panic inside the PDF library into `None`.
fn guarded<T>(f: impl FnOnce() -> T) -> Option<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).ok()
}

// ────────────────────────────────────────────────────────────────────────────
// Plain text
// ────────────────────────────────────────────────────────────────────────────

/// Decodes UTF-8, discarding invalid sequences instead of substituting U+FFFD.
/// Returns the text and the number of invalid sequences dropped.
fn decode_utf8_dropping_invalid(mut bytes: &[u8]) -> (String, usize) {
    let mut out = String::with_capacity(bytes.len());
    let mut dropped = 0usize;

    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                out.push_str(valid);
                return (out, dropped);
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                // `valid` is guaranteed UTF-8 by `valid_up_to`.
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                dropped += 1;
                match e.error_len() {
                    Some(len) => bytes = &rest[len..],
                    // Truncated sequence at end of input.
                    None => return (out, dropped),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pdf::render_pdf;

    fn text_upload(bytes: &[u8]) -> UploadedDocument {
        UploadedDocument {
            kind: DocumentKind::Text,
            bytes: bytes.to_vec(),
        }
    }

    fn pdf_upload(bytes: Vec<u8>) -> UploadedDocument {
        UploadedDocument {
            kind: DocumentKind::Pdf,
            bytes,
        }
    }

    /// Three pages where page 2's `Contents` references an object that does not exist.
    fn pdf_with_broken_middle_page() -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Document, Object, ObjectId, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id, },
        });

        let mut kids: Vec<Object> = Vec::new();
        for label in ["PageOne", "", "PageThree"] {
            let contents_id: ObjectId = if label.is_empty() {
                (9999, 0)
            } else {
                let content = Content {
                    operations: vec![
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 12.into()]),
                        Operation::new("Td", vec![72.into(), 720.into()]),
                        Operation::new("Tj", vec![Object::string_literal(label)]),
                        Operation::new("ET", vec![]),
                    ],
                };
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()))
            };
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => contents_id,
            });
            kids.push(page_id.into());
        }

        let page_count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_detect_kind_from_mime() {
        assert_eq!(
            DocumentKind::detect(Some("application/pdf"), None),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::detect(Some("text/plain; charset=utf-8"), Some("cv.bin")),
            Some(DocumentKind::Text)
        );
    }

    #[test]
    fn test_detect_kind_falls_back_to_extension() {
        assert_eq!(
            DocumentKind::detect(Some("application/octet-stream"), Some("CV.PDF")),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(
            DocumentKind::detect(None, Some("letter.txt")),
            Some(DocumentKind::Text)
        );
    }

    #[test]
    fn test_detect_kind_rejects_other_types() {
        assert_eq!(DocumentKind::detect(Some("image/png"), Some("photo.png")), None);
        assert_eq!(DocumentKind::detect(None, Some("noextension")), None);
        assert_eq!(DocumentKind::detect(None, None), None);
    }

    #[test]
    fn test_plain_text_roundtrip() {
        let out = extract_text(&text_upload(
            "Hello, I am a driver with 5 years experience.".as_bytes(),
        ));
        assert_eq!(out.text, "Hello, I am a driver with 5 years experience.");
        assert!(!out.degraded);
        assert_eq!(out.pages_total, None);
    }

    #[test]
    fn test_plain_text_drops_invalid_bytes() {
        let mut bytes = b"caf".to_vec();
        bytes.push(0xE9); // latin-1 'é', invalid as UTF-8 here
        bytes.extend_from_slice(b" cr\xC3\xA8me");
        let out = extract_text(&text_upload(&bytes));
        assert_eq!(out.text, "caf crème");
        assert!(out.degraded);
        assert!(!out.text.contains('\u{FFFD}'));
    }

    #[test]
    fn test_plain_text_truncated_sequence_at_end() {
        let out = extract_text(&text_upload(b"ok\xE2\x82"));
        assert_eq!(out.text, "ok");
        assert!(out.degraded);
    }

    #[test]
    fn test_empty_inputs_never_fail() {
        let text = extract_text(&text_upload(b""));
        assert_eq!(text.text, "");
        assert!(!text.degraded);

        let pdf = extract_text(&pdf_upload(Vec::new()));
        assert_eq!(pdf.text, "");
        assert!(pdf.degraded);
    }

    #[test]
    fn test_malformed_pdf_degrades_to_empty() {
        let out = extract_text(&pdf_upload(b"%PDF-1.4\n1 0 obj << /Type /Catalog".to_vec()));
        assert_eq!(out.text, "");
        assert!(out.degraded);
    }

    #[test]
    fn test_pdf_pages_are_extracted_in_order() {
        // Enough lines to spill onto a second page.
        let source: String = (1..=40)
            .map(|i| format!("Line number {i}"))
            .collect::<Vec<_>>()
            .join("\n");
        let bytes = render_pdf(&source);

        let out = extract_text(&pdf_upload(bytes));
        assert_eq!(out.pages_total, Some(2));
        assert_eq!(out.pages_failed, 0);
        assert!(!out.degraded);
        let first = out.text.find("Line number 1").unwrap();
        let last = out.text.find("Line number 40").unwrap();
        assert!(first < last);
    }

    #[test]
    fn test_broken_page_contributes_empty_text() {
        let out = extract_text(&pdf_upload(pdf_with_broken_middle_page()));
        assert_eq!(out.pages_total, Some(3));
        assert_eq!(out.pages_failed, 1);
        assert!(out.degraded);

        let first = out.text.find("PageOne").unwrap();
        let third = out.text.find("PageThree").unwrap();
        assert!(first < third);
        // Only separators sit between the surviving pages.
        assert!(out.text[first + "PageOne".len()..third].trim().is_empty());
    }
}
