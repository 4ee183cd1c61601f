// Subtitle-synchronized dubbing
//
// Per subtitle file: load entries, probe a speech rate once, synthesize every
// entry in order, optionally re-time overlong clips, lay all clips onto one
// track at their start offsets and write the result.

pub mod adjuster;
pub mod assembler;
pub mod prober;
pub mod writer;

use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use adjuster::{tempo_stages, DurationAdjuster};
pub use assembler::{plan_timeline, Assembler};
pub use prober::{select_probe_entry, RateProber};

use crate::config::{Config, DubConfig, SpeechLevel};
use crate::error::Result;
use crate::media::MediaProcessorTrait;
use crate::speech::ClipSynthesizer;
use crate::subtitle::{load_srt, TimedEntry};

/// Synthesized audio for one entry. Empty audio marks a failed synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip<'a> {
    pub entry: &'a TimedEntry,
    pub audio: Vec<u8>,
}

impl<'a> SynthesizedClip<'a> {
    pub fn new(entry: &'a TimedEntry, audio: Vec<u8>) -> Self {
        Self { entry, audio }
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}

/// Write `audio` into the work directory and ask the media tool for its length.
pub(crate) async fn measure_clip(
    media: &dyn MediaProcessorTrait,
    workdir: &Path,
    name: &str,
    audio: &[u8],
) -> Option<f64> {
    if audio.is_empty() {
        return None;
    }

    let path = workdir.join(name);
    if let Err(e) = tokio::fs::write(&path, audio).await {
        warn!("Failed to stage {}: {}", path.display(), e);
        return None;
    }

    let duration = match media.probe_duration(&path).await {
        Ok(duration) => duration,
        Err(e) => {
            warn!("Duration probe failed for {}: {}", path.display(), e);
            None
        }
    };

    let _ = tokio::fs::remove_file(&path).await;
    duration
}

/// Dubbing of subtitle files into timed audio tracks
pub struct DubPipeline {
    synthesizer: Box<dyn ClipSynthesizer>,
    media: Arc<dyn MediaProcessorTrait>,
    config: DubConfig,
    default_rate: SpeechLevel,
    audio_format: String,
}

impl DubPipeline {
    pub fn new(
        synthesizer: Box<dyn ClipSynthesizer>,
        media: Arc<dyn MediaProcessorTrait>,
        config: &Config,
    ) -> Self {
        Self {
            synthesizer,
            media,
            config: config.dub.clone(),
            default_rate: config.speech.rate,
            audio_format: config.media.audio_format.clone(),
        }
    }

    /// Dub one subtitle file and return the path of the written track.
    pub async fn process_file(&self, subtitle_path: &Path, output_dir: &Path) -> Result<PathBuf> {
        info!("Dubbing subtitle file: {}", subtitle_path.display());

        let entries = load_srt(subtitle_path).await?;
        info!("Loaded {} subtitle entries", entries.len());

        // Removed on drop, whichever way this function exits.
        let workdir = tempfile::Builder::new().prefix("subdub-").tempdir()?;

        let rate = if self.config.rate_probe {
            RateProber::new(
                self.synthesizer.as_ref(),
                self.media.as_ref(),
                self.config.density_threshold,
                self.default_rate,
            )
            .probe(&entries, workdir.path())
            .await
        } else {
            self.default_rate
        };
        info!("Speech rate for {}: {}", subtitle_path.display(), rate);

        let clips = self.synthesize_all(&entries, rate, workdir.path()).await;

        let track = Assembler::new(self.media.as_ref(), &self.audio_format, self.config.overlap)
            .assemble(&clips, workdir.path(), &subtitle_path.display().to_string())
            .await?;

        let output_path = writer::output_path(
            subtitle_path,
            output_dir,
            &self.config.audio_suffix,
            &self.audio_format,
        )?;
        writer::write_track(&output_path, &track).await?;

        info!("Dubbed audio written to {}", output_path.display());
        Ok(output_path)
    }

    async fn synthesize_all<'e>(
        &self,
        entries: &'e [TimedEntry],
        rate: SpeechLevel,
        workdir: &Path,
    ) -> Vec<SynthesizedClip<'e>> {
        let adjuster = DurationAdjuster::new(self.media.as_ref(), &self.audio_format);

        let pb = ProgressBar::new(entries.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} Synthesizing [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let mut clips = Vec::with_capacity(entries.len());
        for entry in entries {
            debug!("┌─ Entry {} [{:.3}s - {:.3}s]", entry.index, entry.start_secs(), entry.end_secs());
            debug!("│ Text: {}", entry.text);

            let clip = SynthesizedClip::new(entry, self.synthesizer.synthesize(entry, rate).await);
            let clip = if self.config.adjust_duration && !clip.is_empty() {
                adjuster.adjust(clip, workdir).await
            } else {
                clip
            };

            if clip.is_empty() {
                warn!("└─ Entry {} produced no audio", entry.index);
            } else {
                debug!("└─ {} bytes", clip.audio.len());
            }

            clips.push(clip);
            pb.inc(1);
        }

        pb.finish_and_clear();
        clips
    }
}
