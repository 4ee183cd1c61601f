use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::OverlapPolicy;
use crate::error::{Result, SubdubError};
use crate::media::{MediaProcessorTrait, TimelineSlot};
use crate::subtitle::TimedEntry;
use super::SynthesizedClip;

/// Place surviving clips at their entries' start offsets.
///
/// With `OverlapPolicy::Truncate` each clip is cut where the next later clip
/// starts in time order, so no two clips ever sound at once. Of several clips
/// sharing a start offset only the first in subtitle order is kept.
pub fn plan_timeline(placed: &[(&TimedEntry, PathBuf)], overlap: OverlapPolicy) -> Vec<TimelineSlot> {
    placed
        .iter()
        .enumerate()
        .filter_map(|(i, (entry, path))| {
            let offset = entry.start_secs();
            let max_length = match overlap {
                OverlapPolicy::Keep => None,
                OverlapPolicy::Truncate => {
                    if placed[..i].iter().any(|(earlier, _)| earlier.start == entry.start) {
                        debug!("Dropping entry {}: another clip starts at {:.3}s", entry.index, offset);
                        return None;
                    }
                    placed
                        .iter()
                        .map(|(other, _)| other.start)
                        .filter(|start| *start > entry.start)
                        .min()
                        .map(|next| (next - entry.start).as_secs_f64())
                }
            };

            Some(TimelineSlot {
                path: path.clone(),
                offset,
                max_length,
            })
        })
        .collect()
}

/// Lays synthesized clips onto one track
pub struct Assembler<'a> {
    media: &'a dyn MediaProcessorTrait,
    audio_format: &'a str,
    overlap: OverlapPolicy,
}

impl<'a> Assembler<'a> {
    pub fn new(media: &'a dyn MediaProcessorTrait, audio_format: &'a str, overlap: OverlapPolicy) -> Self {
        Self {
            media,
            audio_format,
            overlap,
        }
    }

    /// Mix every playable clip at its offset. `label` names the source in errors.
    pub async fn assemble(
        &self,
        clips: &[SynthesizedClip<'_>],
        workdir: &Path,
        label: &str,
    ) -> Result<Vec<u8>> {
        let mut placed = Vec::with_capacity(clips.len());

        for (position, clip) in clips.iter().enumerate() {
            if clip.is_empty() {
                debug!("Skipping entry {}: no audio", clip.entry.index);
                continue;
            }

            let path = workdir.join(format!("clip_{:05}.{}", position, self.audio_format));
            tokio::fs::write(&path, &clip.audio).await?;

            match self.media.validate(&path).await {
                Ok(true) => placed.push((clip.entry, path)),
                Ok(false) => {
                    warn!("Skipping entry {}: audio is not playable", clip.entry.index);
                    let _ = tokio::fs::remove_file(&path).await;
                }
                Err(e) => {
                    warn!("Skipping entry {}: validation failed: {}", clip.entry.index, e);
                    let _ = tokio::fs::remove_file(&path).await;
                }
            }
        }

        if placed.is_empty() {
            return Err(SubdubError::NoValidClips(label.to_string()));
        }

        let slots = plan_timeline(&placed, self.overlap);
        info!("Assembling {} of {} clips", slots.len(), clips.len());

        let output = workdir.join(format!("assembled.{}", self.audio_format));
        self.media.mix_timeline(&slots, &output).await?;

        Ok(tokio::fs::read(&output).await?)
    }
}
