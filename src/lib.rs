//! subdub - subtitle-driven dubbing and video localization tools
//!
//! Synthesizes speech aligned to subtitle timing through a remote voice
//! service and ffmpeg, and ships the surrounding tools: subtitle translation
//! through a chat-completion API, batch resizing, overlay blending and cover
//! extraction.

pub mod cli;
pub mod config;
pub mod dub;
pub mod error;
pub mod media;
pub mod schedule;
pub mod speech;
pub mod subtitle;
pub mod translate;
pub mod workflow;
