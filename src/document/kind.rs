//! Supported document kinds and their detection.
//!
//! The declared MIME type is consulted first; the filename extension is the
//! fallback for files that arrive without one (e.g. opened from disk).

use std::fmt;

/// MIME type of PDF documents.
pub const PDF_MIME: &str = "application/pdf";
/// MIME type of Office Open XML word-processing documents.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
/// MIME type of legacy Word documents.
pub const DOC_MIME: &str = "application/msword";
/// MIME type of plain text.
pub const TEXT_MIME: &str = "text/plain";

/// A document format the reader can extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    Doc,
    Txt,
}

impl DocumentKind {
    /// Detect the kind of a file from its MIME type and name.
    ///
    /// Kinds are tried in a fixed order (PDF, DOCX, DOC, TXT); for each one
    /// a matching MIME type or a matching extension is enough.  Returns
    /// `None` for anything else.
    ///
    /// ```
    /// use speech_reader::document::DocumentKind;
    ///
    /// assert_eq!(DocumentKind::detect("Report.PDF", None), Some(DocumentKind::Pdf));
    /// assert_eq!(DocumentKind::detect("notes", Some("text/plain")), Some(DocumentKind::Txt));
    /// assert_eq!(DocumentKind::detect("image.png", Some("image/png")), None);
    /// ```
    pub fn detect(name: &str, mime: Option<&str>) -> Option<Self> {
        let name = name.to_lowercase();
        let mime = mime.map(|m| m.trim().to_lowercase());
        let mime = mime.as_deref();

        [Self::Pdf, Self::Docx, Self::Doc, Self::Txt]
            .into_iter()
            .find(|kind| mime == Some(kind.mime()) || name.ends_with(kind.extension()))
    }

    /// Canonical MIME type.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Pdf => PDF_MIME,
            Self::Docx => DOCX_MIME,
            Self::Doc => DOC_MIME,
            Self::Txt => TEXT_MIME,
        }
    }

    /// Filename extension including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
            Self::Doc => ".doc",
            Self::Txt => ".txt",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Doc => "DOC",
            Self::Txt => "TXT",
        };
        f.write_str(label)
    }
}
