//! Document intake: type detection, size pre-check and text extraction.
//!
//! ```text
//! DocumentFile { name, mime, bytes }
//!        │
//!        ▼
//! DocumentLoader::validate   ── unsupported type / too large ──▶ DocumentError
//!        │
//!        ▼
//! DocumentExtractor (TXT | DOCX/DOC | PDF)  ──▶ plain text
//! ```

pub mod extract;
pub mod kind;

pub use extract::{
    DocumentError, DocumentExtractor, DocumentFile, DocumentLoader, DocxExtractor,
    PdfExtractor, PlainTextExtractor,
};
pub use kind::DocumentKind;
