use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::config::{SpeechConfig, SpeechLevel};
use crate::subtitle::TimedEntry;
use super::{ClipSynthesizer, CloneRequest, SpeakRequest, SpeechApi};

const REFERENCE_AUDIO: &str = "reference_audio.wav";
const REFERENCE_TEXT: &str = "reference_text.txt";

/// One way of producing audio for an entry, tried in order
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisStrategy {
    /// Voice cloning from a role alternate directory
    VoiceClone { role: String, dir: PathBuf },
    /// Built-in voice through `/speak`
    Standard,
}

/// Result of one clone attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Audio(Vec<u8>),
    /// Alternate unusable (missing directory or reference audio)
    Skipped(String),
    /// Worth trying the next alternate
    Transient(String),
    /// Abandon cloning for this entry
    Fatal(String),
}

/// Turns timed entries into audio through the remote synthesis service
pub struct SpeechSynthesizer {
    api: Box<dyn SpeechApi>,
    config: SpeechConfig,
    response_format: String,
}

impl SpeechSynthesizer {
    pub fn new<S: Into<String>>(api: Box<dyn SpeechApi>, config: SpeechConfig, response_format: S) -> Self {
        Self {
            api,
            config,
            response_format: response_format.into(),
        }
    }

    /// Ordered strategy list: every clone alternate, then the built-in voice.
    pub fn strategies(&self) -> Vec<SynthesisStrategy> {
        let mut strategies = Vec::new();

        if let Some(base) = self.config.clone.role.as_deref().filter(|r| !r.is_empty()) {
            for n in 1..=self.config.clone.alternates + 1 {
                let role = format!("{}{}", base, n);
                let dir = self.config.clone.roles_dir.join(&role);
                strategies.push(SynthesisStrategy::VoiceClone { role, dir });
            }
        }

        strategies.push(SynthesisStrategy::Standard);
        strategies
    }

    async fn speak_standard(&self, entry: &TimedEntry, rate: SpeechLevel) -> Vec<u8> {
        let request = SpeakRequest {
            name: self.config.voice_role.clone(),
            text: entry.text.clone(),
            pitch: self.config.pitch,
            speed: rate,
            temperature: self.config.temperature,
            top_k: self.config.top_k,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
            stream: false,
            response_format: self.response_format.clone(),
        };

        match self.api.speak(&request).await {
            Ok(reply) if reply.is_success() => reply.body,
            Ok(reply) => {
                warn!(
                    "Synthesis of entry {} failed with HTTP {}: {}",
                    entry.index,
                    reply.status,
                    String::from_utf8_lossy(&reply.body)
                );
                Vec::new()
            }
            Err(e) => {
                warn!("Synthesis of entry {} failed: {}", entry.index, e);
                Vec::new()
            }
        }
    }

    async fn speak_cloned(
        &self,
        role: &str,
        dir: &std::path::Path,
        entry: &TimedEntry,
        rate: SpeechLevel,
    ) -> AttemptOutcome {
        if !dir.is_dir() {
            return AttemptOutcome::Skipped(format!("role directory {} not found", dir.display()));
        }
        let reference_audio = dir.join(REFERENCE_AUDIO);
        if !reference_audio.is_file() {
            return AttemptOutcome::Skipped(format!("{} not found", reference_audio.display()));
        }

        let reference_text = match tokio::fs::read_to_string(dir.join(REFERENCE_TEXT)).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(_) => None,
        };

        let request = CloneRequest {
            text: entry.text.clone(),
            pitch: self.config.pitch,
            speed: rate,
            temperature: self.config.temperature,
            top_k: self.config.top_k,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
            stream: false,
            response_format: self.response_format.clone(),
            reference_audio,
            reference_text,
        };

        match self.api.clone_voice(&request).await {
            Ok(reply) if reply.is_success() && !reply.body.is_empty() => AttemptOutcome::Audio(reply.body),
            Ok(reply) if reply.is_success() => AttemptOutcome::Transient(format!("{} returned no audio", role)),
            Ok(reply) if reply.status == 500 => AttemptOutcome::Transient(format!("{} returned HTTP 500", role)),
            Ok(reply) => AttemptOutcome::Fatal(format!(
                "{} returned HTTP {}: {}",
                role,
                reply.status,
                String::from_utf8_lossy(&reply.body)
            )),
            Err(e) => AttemptOutcome::Transient(format!("{} request failed: {}", role, e)),
        }
    }
}

#[async_trait]
impl ClipSynthesizer for SpeechSynthesizer {
    async fn synthesize(&self, entry: &TimedEntry, rate: SpeechLevel) -> Vec<u8> {
        for strategy in self.strategies() {
            let (role, dir) = match strategy {
                SynthesisStrategy::Standard => return self.speak_standard(entry, rate).await,
                SynthesisStrategy::VoiceClone { role, dir } => (role, dir),
            };

            match self.speak_cloned(&role, &dir, entry, rate).await {
                AttemptOutcome::Audio(audio) => {
                    debug!("Entry {} cloned with {}", entry.index, role);
                    return audio;
                }
                AttemptOutcome::Skipped(reason) => debug!("Skipping clone role: {}", reason),
                AttemptOutcome::Transient(reason) => warn!("Clone attempt failed, trying next role: {}", reason),
                AttemptOutcome::Fatal(reason) => {
                    warn!("Voice cloning failed, switching to standard synthesis: {}", reason);
                    break;
                }
            }
        }

        self.speak_standard(entry, rate).await
    }
}
