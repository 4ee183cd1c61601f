use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{Result, SubdubError};
use super::{
    parse_cover_stream, parse_duration, parse_version_line, AudioEncoding, MediaCommandBuilder, MediaProcessorTrait,
    OverlayRequest, TimelineSlot, VideoEncoder,
};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    /// Create a new media processor implementation
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, config.command_timeout());

        Self {
            config,
            command_builder,
        }
    }

    fn encoding(&self) -> AudioEncoding {
        AudioEncoding {
            codec: self.config.audio_codec.clone(),
            quality: self.config.audio_quality.clone(),
        }
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe_duration(&self, path: &Path) -> Result<Option<f64>> {
        let output = self.command_builder.probe_duration(path).execute_capture().await?;
        let duration = parse_duration(&output.stderr);
        debug!("Duration of {}: {:?}", path.display(), duration);
        Ok(duration)
    }

    async fn validate(&self, path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => {}
            _ => return Ok(false),
        }

        let output = self.command_builder.validate(path).execute_capture().await?;
        if !output.success {
            debug!("{} is not playable: {}", path.display(), output.stderr.trim());
        }
        Ok(output.success)
    }

    async fn change_tempo(&self, input: &Path, output: &Path, stages: &[f64]) -> Result<()> {
        self.command_builder
            .change_tempo(input, output, stages, &self.config.audio_codec)
            .execute()
            .await
    }

    async fn mix_timeline(&self, slots: &[TimelineSlot], output: &Path) -> Result<()> {
        if slots.is_empty() {
            return Err(SubdubError::Media("Nothing to mix".to_string()));
        }

        info!("Mixing {} clips into {}", slots.len(), output.display());
        self.command_builder
            .mix_timeline(slots, output, &self.encoding())
            .execute()
            .await
    }

    async fn resize_video(
        &self,
        input: &Path,
        output: &Path,
        width: u32,
        height: u32,
        encoder: VideoEncoder,
    ) -> Result<()> {
        info!("Resizing {} to {}x{} ({})", input.display(), width, height, encoder.codec());
        self.command_builder
            .resize_video(input, output, width, height, encoder)
            .execute()
            .await
    }

    async fn overlay(&self, request: &OverlayRequest) -> Result<()> {
        info!(
            "Compositing overlays onto {} -> {}",
            request.main_video.display(),
            request.output.display()
        );
        self.command_builder.overlay(request).execute().await
    }

    async fn detect_cover_stream(&self, path: &Path) -> Result<Option<String>> {
        let output = self.command_builder.list_streams(path).execute_capture().await?;
        Ok(parse_cover_stream(&output.stderr))
    }

    async fn extract_cover(
        &self,
        input: &Path,
        output: &Path,
        map: Option<String>,
        min_size: Option<(u32, u32)>,
    ) -> Result<bool> {
        let result = self
            .command_builder
            .extract_cover(input, output, map.as_deref(), min_size)
            .execute_capture()
            .await?;

        if !result.success {
            debug!("Cover extraction failed for {}: {}", input.display(), result.stderr.trim());
        }
        Ok(result.success)
    }

    /// Check if media processor is available
    async fn check_availability(&self) -> Result<()> {
        let output = self
            .command_builder
            .version_check()
            .execute_capture()
            .await
            .map_err(|e| SubdubError::Media(format!("Media processor not found: {}", e)))?;

        if output.success {
            info!("Media processor is available");
            Ok(())
        } else {
            Err(SubdubError::Media("Media processor version check failed".to_string()))
        }
    }

    /// Get media processor version information
    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let output = self.command_builder.version_check().execute_capture().await?;
        if !output.success {
            return Err(SubdubError::Media(format!(
                "Media processor version check failed: {}",
                output.stderr.trim()
            )));
        }

        Ok(parse_version_line(&output.stdout).unwrap_or_else(|| "Unknown version".to_string()))
    }
}
