//! Text extraction backends and the [`DocumentLoader`] that dispatches to
//! them.
//!
//! | Kind      | Backend                                                   |
//! |-----------|-----------------------------------------------------------|
//! | TXT       | [`PlainTextExtractor`] — UTF-8 (lossy), BOM stripped      |
//! | DOCX, DOC | [`DocxExtractor`] — reads `word/document.xml` from the zip |
//! | PDF       | [`PdfExtractor`] — pipes the file through `pdftotext`     |
//!
//! Legacy binary `.doc` files are routed to the DOCX backend, which rejects
//! anything that is not an Office Open XML package with a decode error.

use std::io::{Cursor, Read};
use std::path::Path;
use std::process::Stdio;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::kind::DocumentKind;
use crate::config::DocumentConfig;

// ---------------------------------------------------------------------------
// DocumentError
// ---------------------------------------------------------------------------

/// Errors raised while accepting or reading a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file is not a PDF, DOC, DOCX or TXT document.
    #[error("unsupported file type: {name} (PDF, DOC, DOCX or TXT only)")]
    UnsupportedType { name: String },

    /// The file is larger than the configured limit.
    #[error("file is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },

    /// The file could not be decoded into text.
    #[error("failed to read {kind} document: {message}")]
    Decode { kind: DocumentKind, message: String },

    /// Extraction succeeded but produced no readable text.
    #[error("document contains no readable text")]
    Empty,

    /// The file could not be read from disk.
    #[error("failed to open document: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// DocumentFile
// ---------------------------------------------------------------------------

/// An uploaded or opened file: its name, optional declared MIME type and
/// raw content.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl DocumentFile {
    pub fn new(name: impl Into<String>, mime: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime,
            bytes,
        }
    }

    /// Read a file from disk.  No MIME type is known, so detection falls
    /// back to the extension.
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, None, bytes))
    }

    /// Size of the content in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Detected kind, if supported.
    pub fn kind(&self) -> Option<DocumentKind> {
        DocumentKind::detect(&self.name, self.mime.as_deref())
    }
}

// ---------------------------------------------------------------------------
// DocumentExtractor trait
// ---------------------------------------------------------------------------

/// Converts a document's bytes into plain text.
///
/// Implementors must be `Send + Sync` so a loader can be shared behind an
/// `Arc`.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, file: &DocumentFile) -> Result<String, DocumentError>;
}

// ---------------------------------------------------------------------------
// PlainTextExtractor
// ---------------------------------------------------------------------------

/// Decodes TXT files as UTF-8, replacing invalid sequences.
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, file: &DocumentFile) -> Result<String, DocumentError> {
        let bytes = file
            .bytes
            .strip_prefix(&[0xEF, 0xBB, 0xBF])
            .unwrap_or(&file.bytes[..]);
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

// ---------------------------------------------------------------------------
// DocxExtractor
// ---------------------------------------------------------------------------

/// Extracts the raw text of an Office Open XML word-processing document.
///
/// Text runs (`<w:t>`) are concatenated; paragraph ends and line breaks
/// become newlines, tabs become tab characters.
pub struct DocxExtractor;

/// Path of the main document part inside the package.
const DOCX_BODY_PART: &str = "word/document.xml";

impl DocxExtractor {
    fn read_body(bytes: &[u8]) -> Result<String, String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
        let mut part = archive
            .by_name(DOCX_BODY_PART)
            .map_err(|e| format!("{DOCX_BODY_PART}: {e}"))?;
        let mut xml = String::new();
        part.read_to_string(&mut xml).map_err(|e| e.to_string())?;
        Ok(xml)
    }
}

#[async_trait]
impl DocumentExtractor for DocxExtractor {
    async fn extract(&self, file: &DocumentFile) -> Result<String, DocumentError> {
        let kind = file.kind().unwrap_or(DocumentKind::Docx);
        let xml = Self::read_body(&file.bytes)
            .map_err(|message| DocumentError::Decode { kind, message })?;
        Ok(docx_xml_to_text(&xml))
    }
}

/// Flatten WordprocessingML into plain text.
fn docx_xml_to_text(xml: &str) -> String {
    static MARKUP: OnceLock<Regex> = OnceLock::new();
    let markup = MARKUP.get_or_init(|| {
        Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\b[^>]*/>|<w:br\b[^>]*/>|</w:p>")
            .expect("static regex")
    });

    let mut text = String::with_capacity(xml.len() / 4);
    for caps in markup.captures_iter(xml) {
        match caps.get(1) {
            Some(run) => text.push_str(&unescape_xml(run.as_str())),
            None => {
                let tag = &caps[0];
                if tag.starts_with("<w:tab") {
                    text.push('\t');
                } else {
                    text.push('\n');
                }
            }
        }
    }
    text.trim_end().to_string()
}

/// Resolve the predefined XML entities and numeric character references.
fn unescape_xml(s: &str) -> String {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    let entity = ENTITY.get_or_init(|| {
        Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("static regex")
    });

    entity
        .replace_all(s, |caps: &Captures<'_>| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if name.starts_with("#x") => {
                    u32::from_str_radix(&name[2..], 16).ok().and_then(char::from_u32)
                }
                _ => name[1..].parse::<u32>().ok().and_then(char::from_u32),
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

// ---------------------------------------------------------------------------
// PdfExtractor
// ---------------------------------------------------------------------------

/// Extracts PDF text by piping the document through an external converter
/// (`pdftotext - -` by default).  Page breaks become blank lines.
pub struct PdfExtractor {
    program: String,
}

impl PdfExtractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn decode_error(message: String) -> DocumentError {
        DocumentError::Decode {
            kind: DocumentKind::Pdf,
            message,
        }
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, file: &DocumentFile) -> Result<String, DocumentError> {
        let mut child = Command::new(&self.program)
            .args(["-enc", "UTF-8", "-", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::decode_error(format!("cannot run {}: {e}", self.program)))?;

        // Feed stdin from a separate task so a chatty converter cannot
        // deadlock on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = file.bytes.clone();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&bytes).await {
                    log::warn!("pdf: failed to write document to converter: {e}");
                }
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| Self::decode_error(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::decode_error(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.replace('\u{000C}', "\n\n").trim_end().to_string())
    }
}

// ---------------------------------------------------------------------------
// DocumentLoader
// ---------------------------------------------------------------------------

/// Validates incoming files and routes them to the right extractor.
///
/// ```rust,no_run
/// use speech_reader::config::DocumentConfig;
/// use speech_reader::document::{DocumentFile, DocumentLoader};
///
/// # async fn example() -> Result<(), speech_reader::document::DocumentError> {
/// let loader = DocumentLoader::from_config(&DocumentConfig::default());
/// let file = DocumentFile::from_path("notes.txt".as_ref())?;
/// let text = loader.load(&file).await?;
/// println!("{text}");
/// # Ok(())
/// # }
/// ```
pub struct DocumentLoader {
    max_bytes: u64,
    text: Box<dyn DocumentExtractor>,
    docx: Box<dyn DocumentExtractor>,
    pdf: Box<dyn DocumentExtractor>,
}

impl DocumentLoader {
    /// Build a loader with the default backends.
    pub fn from_config(config: &DocumentConfig) -> Self {
        Self {
            max_bytes: config.max_file_bytes(),
            text: Box::new(PlainTextExtractor),
            docx: Box::new(DocxExtractor),
            pdf: Box::new(PdfExtractor::new(config.pdf_program.clone())),
        }
    }

    /// Replace the PDF backend.
    pub fn with_pdf_extractor(mut self, pdf: Box<dyn DocumentExtractor>) -> Self {
        self.pdf = pdf;
        self
    }

    /// Check type and size without reading the content.
    pub fn validate(&self, file: &DocumentFile) -> Result<DocumentKind, DocumentError> {
        let kind = file.kind().ok_or_else(|| DocumentError::UnsupportedType {
            name: file.name.clone(),
        })?;
        if file.size() > self.max_bytes {
            return Err(DocumentError::TooLarge {
                size: file.size(),
                limit: self.max_bytes,
            });
        }
        Ok(kind)
    }

    /// Validate `file` and extract its text.
    ///
    /// Fails with [`DocumentError::Empty`] when the document holds nothing
    /// but whitespace.
    pub async fn load(&self, file: &DocumentFile) -> Result<String, DocumentError> {
        let kind = self.validate(file)?;
        log::debug!("document: extracting {} ({kind}, {} bytes)", file.name, file.size());

        let extractor = match kind {
            DocumentKind::Txt => &self.text,
            DocumentKind::Docx | DocumentKind::Doc => &self.docx,
            DocumentKind::Pdf => &self.pdf,
        };

        let text = extractor.extract(file).await?;
        if text.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
