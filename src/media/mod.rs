// Modular media processing architecture
//
// This module provides a clean abstraction over media processing operations:
// - Processor: ffmpeg-backed implementation of the trait below
// - Commands: Command builders, filter-graph rendering and output parsing

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Playable duration in seconds, `None` when the tool reports none
    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>>;

    /// Whether the file decodes without errors
    async fn validate(&self, path: &Path) -> Result<bool>;

    /// Re-time audio through a chain of tempo stages
    async fn change_tempo(&self, input: &Path, output: &Path, stages: &[f64]) -> Result<()>;

    /// Mix clips onto one track, each starting at its slot offset
    async fn mix_timeline(&self, slots: &[TimelineSlot], output: &Path) -> Result<()>;

    /// Resize a video with the given encoder backend
    async fn resize_video(
        &self,
        input: &Path,
        output: &Path,
        width: u32,
        height: u32,
        encoder: VideoEncoder,
    ) -> Result<()>;

    /// Composite overlay videos onto a main video
    async fn overlay(&self, request: &OverlayRequest) -> Result<()>;

    /// Locate an embedded cover picture stream
    async fn detect_cover_stream(&self, path: &Path) -> Result<Option<String>>;

    /// Write a cover image; returns whether the tool produced one
    async fn extract_cover(
        &self,
        input: &Path,
        output: &Path,
        map: Option<String>,
        min_size: Option<(u32, u32)>,
    ) -> Result<bool>;

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()>;

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Arc<dyn MediaProcessorTrait> {
        Arc::new(processor::MediaProcessorImpl::new(config))
    }
}
