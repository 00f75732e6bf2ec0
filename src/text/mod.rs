//! Text handling for read-aloud playback.
//!
//! [`segment`] turns a document's plain text into the ordered list of
//! speakable segments that both playback modes iterate over.

pub mod segment;

pub use segment::{segment, segment_with_limit, DEFAULT_MAX_SEGMENT_CHARS};
