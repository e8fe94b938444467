//! Multi-format text extraction for fetched document bytes.
//!
//! Sniffing is an ordered list of (predicate, extractor) rules evaluated
//! first-match-wins: plain-text extensions, PDF (extension or magic), then
//! DOCX (extension or zip containing `word/document.xml`, config-gated),
//! with a best-effort text decode as the final fallback. The pipeline is
//! total: unreadable documents come back as empty text with the
//! format-correct MIME type and an explicit [`Fidelity::Degraded`] marker,
//! never as an error.

use std::io::Read;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_OCTET: &str = "application/octet-stream";

const TEXT_EXTENSIONS: [&str; 5] = [".txt", ".md", ".csv", ".json", ".log"];
const PDF_MAGIC: &[u8] = b"%PDF";
/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Why an extraction degraded to empty text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    /// PDF could not be parsed, or is encrypted beyond the empty-password
    /// attempt.
    PdfUnreadable,
    /// DOCX archive or its document XML could not be parsed.
    OoxmlUnreadable,
    /// The extractor panicked mid-parse (hostile input taking down the
    /// blocking task), so no format verdict exists.
    ExtractorCrashed,
}

impl std::fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DegradeReason::PdfUnreadable => write!(f, "PDF unreadable"),
            DegradeReason::OoxmlUnreadable => write!(f, "DOCX unreadable"),
            DegradeReason::ExtractorCrashed => write!(f, "extraction crashed"),
        }
    }
}

/// Whether the extracted text reflects the document's content or the
/// extractor had to give up. Lets callers tell "empty document" apart
/// from "unreadable document" without sentinel strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fidelity {
    Full,
    Degraded(DegradeReason),
}

/// Extraction outcome.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub mime: &'static str,
    pub fidelity: Fidelity,
}

impl Extracted {
    fn full(text: String, mime: &'static str) -> Self {
        Self {
            text,
            mime,
            fidelity: Fidelity::Full,
        }
    }

    fn degraded(mime: &'static str, reason: DegradeReason) -> Self {
        Self {
            text: String::new(),
            mime,
            fidelity: Fidelity::Degraded(reason),
        }
    }

    pub fn degrade_reason(&self) -> Option<DegradeReason> {
        match self.fidelity {
            Fidelity::Full => None,
            Fidelity::Degraded(reason) => Some(reason),
        }
    }
}

/// Extract plain text from document bytes. Total over arbitrary input.
pub fn extract(filename: &str, bytes: &[u8], enable_docx: bool) -> Extracted {
    let name = filename.to_lowercase();

    if TEXT_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
        return Extracted::full(decode_text(bytes), MIME_TEXT);
    }

    if name.ends_with(".pdf") || bytes.starts_with(PDF_MAGIC) {
        return extract_pdf(bytes);
    }

    if enable_docx && (name.ends_with(".docx") || is_docx_archive(bytes)) {
        return extract_docx(bytes);
    }

    Extracted::full(decode_text(bytes), MIME_OCTET)
}

// ── Text decoding ───────────────────────────────────────────────────────

/// Decode bytes as text, trying UTF-8, then UTF-16, then Latin-1. Latin-1
/// accepts any byte sequence, so this never fails.
fn decode_text(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    if let Some(s) = decode_utf16(bytes) {
        return s;
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// BOM-aware UTF-16 decode, little-endian when no BOM is present. `None`
/// on odd length or unpaired surrogates.
fn decode_utf16(bytes: &[u8]) -> Option<String> {
    let (payload, big_endian) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (rest, false),
        [0xFE, 0xFF, rest @ ..] => (rest, true),
        _ => (bytes, false),
    };
    if payload.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|pair| {
            if big_endian {
                u16::from_be_bytes([pair[0], pair[1]])
            } else {
                u16::from_le_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

// ── PDF ─────────────────────────────────────────────────────────────────

fn extract_pdf(bytes: &[u8]) -> Extracted {
    // The vault's OCR writes the text layer back into stored PDFs, so a
    // parseable PDF normally yields text directly.
    if let Ok(text) = pdf_extract::extract_text_from_mem(bytes) {
        return Extracted::full(text.trim().to_string(), MIME_PDF);
    }
    // Owner-password-only protection decrypts with an empty password.
    match pdf_extract::extract_text_from_mem_encrypted(bytes, "") {
        Ok(text) => Extracted::full(text.trim().to_string(), MIME_PDF),
        Err(_) => Extracted::degraded(MIME_PDF, DegradeReason::PdfUnreadable),
    }
}

// ── DOCX ────────────────────────────────────────────────────────────────

/// Capability sniff: the buffer is a zip archive containing an entry whose
/// path ends in `word/document.xml`.
fn is_docx_archive(bytes: &[u8]) -> bool {
    match zip::ZipArchive::new(std::io::Cursor::new(bytes)) {
        Ok(archive) => archive
            .file_names()
            .any(|n| n.ends_with("word/document.xml")),
        Err(_) => false,
    }
}

fn extract_docx(bytes: &[u8]) -> Extracted {
    match try_extract_docx(bytes) {
        Ok(text) => Extracted::full(text, MIME_DOCX),
        Err(_) => Extracted::degraded(MIME_DOCX, DegradeReason::OoxmlUnreadable),
    }
}

fn try_extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let entry_name = archive
        .file_names()
        .find(|n| n.ends_with("word/document.xml"))
        .map(|n| n.to_string())
        .ok_or_else(|| "word/document.xml not found".to_string())?;

    let entry = archive.by_name(&entry_name).map_err(|e| e.to_string())?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("word/document.xml exceeds size limit".to_string());
    }

    extract_paragraphs(&xml)
}

/// Paragraph text from WordprocessingML: `<w:t>` runs concatenated within
/// a paragraph, paragraphs joined with newlines.
fn extract_paragraphs(xml: &[u8]) -> Result<String, String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    // Text runs outside any paragraph keep their own line.
                    if !current.is_empty() {
                        paragraphs.push(std::mem::take(&mut current));
                    }
                    in_paragraph = true;
                }
                b"t" => {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        current.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && in_paragraph {
                    paragraphs.push(std::mem::take(&mut current));
                    in_paragraph = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    Ok(paragraphs.join("\n"))
}
