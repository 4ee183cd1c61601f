use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::SpeechLevel;
use crate::media::MediaProcessorTrait;
use crate::speech::ClipSynthesizer;
use crate::subtitle::TimedEntry;
use super::measure_clip;

/// Entry the rate probe measures: the densest one at or below `threshold`
/// characters per second. Denser entries cannot fit at any rate and are ignored.
pub fn select_probe_entry(entries: &[TimedEntry], threshold: f64) -> Option<&TimedEntry> {
    entries
        .iter()
        .filter(|entry| entry.density() <= threshold)
        .fold(None, |best: Option<&TimedEntry>, entry| match best {
            Some(current) if current.density() >= entry.density() => Some(current),
            _ => Some(entry),
        })
}

/// Picks one speech rate per file, slowest first, that lets the densest
/// speakable entry fit its display window.
pub struct RateProber<'a> {
    synthesizer: &'a dyn ClipSynthesizer,
    media: &'a dyn MediaProcessorTrait,
    density_threshold: f64,
    default_rate: SpeechLevel,
}

impl<'a> RateProber<'a> {
    pub fn new(
        synthesizer: &'a dyn ClipSynthesizer,
        media: &'a dyn MediaProcessorTrait,
        density_threshold: f64,
        default_rate: SpeechLevel,
    ) -> Self {
        Self {
            synthesizer,
            media,
            density_threshold,
            default_rate,
        }
    }

    pub async fn probe(&self, entries: &[TimedEntry], workdir: &Path) -> SpeechLevel {
        let Some(entry) = select_probe_entry(entries, self.density_threshold) else {
            info!(
                "No entry at or below {:.1} chars/s, using default rate {}",
                self.density_threshold, self.default_rate
            );
            return self.default_rate;
        };

        let window = entry.window();
        info!(
            "Probing speech rate with entry {} ({:.2} chars/s, {:.3}s window)",
            entry.index,
            entry.density(),
            window
        );

        for rate in SpeechLevel::ALL {
            let audio = self.synthesizer.synthesize(entry, rate).await;
            let name = format!("probe_{}.audio", rate.as_str());

            // Empty audio or an unknown duration counts as not fitting.
            match measure_clip(self.media, workdir, &name, &audio).await {
                Some(duration) if duration <= window => {
                    info!("Rate {} fits ({:.3}s <= {:.3}s)", rate, duration, window);
                    return rate;
                }
                Some(duration) => debug!("Rate {} too slow ({:.3}s > {:.3}s)", rate, duration, window),
                None => debug!("Rate {} produced no measurable audio", rate),
            }
        }

        warn!("No rate fits entry {}, using {}", entry.index, SpeechLevel::VeryHigh);
        SpeechLevel::VeryHigh
    }
}
