//! Read documents aloud segment by segment, either with a local speech
//! engine (device mode) or with a remote AI voice (remote mode).

pub mod app;
pub mod audio;
pub mod config;
pub mod document;
pub mod gateway;
pub mod playback;
pub mod text;
