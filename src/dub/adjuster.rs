use std::path::Path;
use tracing::{debug, info, warn};

use crate::media::MediaProcessorTrait;
use super::{measure_clip, SynthesizedClip};

/// Highest factor a single tempo stage accepts.
const MAX_STAGE: f64 = 2.0;

/// Split the speed-up `current / target` into stages the tempo filter accepts.
///
/// Full 2x stages come first, then the remainder if it is not 1.
pub fn tempo_stages(current: f64, target: f64) -> Vec<f64> {
    let mut factor = current / target;
    let mut stages = Vec::new();

    while factor > MAX_STAGE {
        stages.push(MAX_STAGE);
        factor /= MAX_STAGE;
    }
    if (factor - 1.0).abs() > 1e-9 {
        stages.push(factor);
    }
    stages
}

/// Best-effort speed-up of clips that run past their display window.
/// Every failure path hands back the clip it was given.
pub struct DurationAdjuster<'a> {
    media: &'a dyn MediaProcessorTrait,
    audio_format: &'a str,
}

impl<'a> DurationAdjuster<'a> {
    pub fn new(media: &'a dyn MediaProcessorTrait, audio_format: &'a str) -> Self {
        Self { media, audio_format }
    }

    pub async fn adjust<'e>(&self, clip: SynthesizedClip<'e>, workdir: &Path) -> SynthesizedClip<'e> {
        let window = clip.entry.window();
        if window <= 0.0 {
            return clip;
        }

        let name = format!("measure_{}.{}", clip.entry.index, self.audio_format);
        let Some(duration) = measure_clip(self.media, workdir, &name, &clip.audio).await else {
            debug!("Entry {}: duration unknown, left as is", clip.entry.index);
            return clip;
        };
        if duration <= window {
            return clip;
        }

        let stages = tempo_stages(duration, window);
        info!(
            "Entry {}: {:.3}s exceeds {:.3}s window, tempo stages {:?}",
            clip.entry.index, duration, window, stages
        );

        match self.retime(&clip, &stages, workdir).await {
            Ok(audio) if !audio.is_empty() => SynthesizedClip::new(clip.entry, audio),
            Ok(_) => {
                warn!("Entry {}: tempo change produced no audio, keeping original", clip.entry.index);
                clip
            }
            Err(e) => {
                warn!("Entry {}: tempo change failed, keeping original: {}", clip.entry.index, e);
                clip
            }
        }
    }

    async fn retime(
        &self,
        clip: &SynthesizedClip<'_>,
        stages: &[f64],
        workdir: &Path,
    ) -> crate::error::Result<Vec<u8>> {
        let input = workdir.join(format!("slow_{}.{}", clip.entry.index, self.audio_format));
        let output = workdir.join(format!("fast_{}.{}", clip.entry.index, self.audio_format));

        tokio::fs::write(&input, &clip.audio).await?;
        let result = self.media.change_tempo(&input, &output, stages).await;
        let _ = tokio::fs::remove_file(&input).await;
        result?;

        let audio = tokio::fs::read(&output).await?;
        let _ = tokio::fs::remove_file(&output).await;
        Ok(audio)
    }
}
