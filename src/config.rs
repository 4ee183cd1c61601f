use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use crate::error::{Result, SubdubError};

/// Environment variable overriding `speech.base_url`
pub const TTS_URL_ENV: &str = "SUBDUB_TTS_URL";

fn default_density_threshold() -> f64 {
    6.0
}

fn default_roles_dir() -> PathBuf {
    PathBuf::from("flashtts_data/roles")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub speech: SpeechConfig,
    pub dub: DubConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
}

/// Ordered five-step scale shared by speech rate and pitch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechLevel {
    VeryLow,
    Low,
    #[default]
    Moderate,
    High,
    VeryHigh,
}

impl SpeechLevel {
    /// All levels, slowest/lowest first.
    pub const ALL: [SpeechLevel; 5] = [
        SpeechLevel::VeryLow,
        SpeechLevel::Low,
        SpeechLevel::Moderate,
        SpeechLevel::High,
        SpeechLevel::VeryHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl std::fmt::Display for SpeechLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeechLevel {
    type Err = SubdubError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| SubdubError::Config(format!(
                "Invalid speech level '{}'. Valid levels: very_low, low, moderate, high, very_high",
                s
            )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Base URL of the speech synthesis service
    pub base_url: String,
    /// Built-in voice used by the standard `/speak` path
    pub voice_role: String,
    /// Default speech rate when probing is off or inconclusive
    pub rate: SpeechLevel,
    /// Speech pitch
    pub pitch: SpeechLevel,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Optional voice-cloning identity
    #[serde(default)]
    pub clone: CloneConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneConfig {
    /// Base name of the clone role; alternates are `{role}1`, `{role}2`, ...
    pub role: Option<String>,
    /// Number of extra alternates tried after `{role}1`
    pub alternates: u32,
    /// Directory holding one sub-directory per role alternate
    #[serde(default = "default_roles_dir")]
    pub roles_dir: PathBuf,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            role: None,
            alternates: 0,
            roles_dir: default_roles_dir(),
        }
    }
}

/// How overlapping clips are laid onto the output timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Cut each clip where the next clip starts
    Truncate,
    /// Let clips overlap and mix
    Keep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DubConfig {
    /// Only subtitle files ending with `{subtitle_suffix}.srt` are dubbed in directory mode
    pub subtitle_suffix: String,
    /// Appended to the subtitle stem when naming the audio output
    pub audio_suffix: String,
    /// Probe the fastest entry to pick a speech rate per file
    pub rate_probe: bool,
    /// Tempo-scale clips that overrun their window
    pub adjust_duration: bool,
    /// Entries denser than this (chars/second) are ignored by the prober
    #[serde(default = "default_density_threshold")]
    pub density_threshold: f64,
    pub overlap: OverlapPolicy,
}

/// Batch-size validation of translated replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Count mismatch fails the attempt and is retried
    Strict,
    /// Count mismatch is logged and the reply is kept
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Vendor key used by `--vendor`
    pub vendor: String,
    /// Model type used by `--model-type`
    pub kind: String,
    pub model: String,
    /// Full chat-completions URL
    pub endpoint: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    /// Backoff per attempt in seconds; the last value repeats
    pub backoff_secs: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    pub providers: Vec<ProviderConfig>,
    /// Vendor used when none is given on the command line
    pub default_vendor: String,
    /// Language named in the translation prompt
    pub target_language: String,
    pub batch_size: usize,
    pub temperature: f32,
    pub validation: ValidationMode,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
    /// Suffix of translated output files
    pub output_suffix: String,
    /// Suffix of the untouched source backup written in directory mode
    pub original_suffix: String,
    /// API keys resolved at startup, keyed by vendor
    #[serde(skip)]
    pub api_keys: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Timeout for a single ffmpeg invocation
    pub command_timeout_secs: u64,
    /// Codec of synthesized and assembled audio
    pub audio_codec: String,
    /// Extra encoder arguments for the assembled track, e.g. ["-vbr", "3"]
    pub audio_quality: Vec<String>,
    /// Container extension of the assembled track
    pub audio_format: String,
}

impl MediaConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech: SpeechConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                voice_role: "male".to_string(),
                rate: SpeechLevel::Moderate,
                pitch: SpeechLevel::Moderate,
                temperature: 0.9,
                top_k: 50,
                top_p: 0.95,
                max_tokens: 2048,
                request_timeout_secs: 120,
                clone: CloneConfig::default(),
            },
            dub: DubConfig {
                subtitle_suffix: "_cn".to_string(),
                audio_suffix: String::new(),
                rate_probe: true,
                adjust_duration: false,
                density_threshold: default_density_threshold(),
                overlap: OverlapPolicy::Truncate,
            },
            translate: TranslateConfig {
                providers: vec![
                    ProviderConfig {
                        vendor: "siliconflow".to_string(),
                        kind: "chat".to_string(),
                        model: "deepseek-ai/DeepSeek-V3".to_string(),
                        endpoint: "https://api.siliconflow.cn/v1/chat/completions".to_string(),
                        api_key_env: "SILICONFLOW_API_KEY".to_string(),
                    },
                    ProviderConfig {
                        vendor: "deepseek".to_string(),
                        kind: "chat".to_string(),
                        model: "deepseek-chat".to_string(),
                        endpoint: "https://api.deepseek.com/chat/completions".to_string(),
                        api_key_env: "DEEPSEEK_API_KEY".to_string(),
                    },
                ],
                default_vendor: "siliconflow".to_string(),
                target_language: "Chinese".to_string(),
                batch_size: 30,
                temperature: 1.0,
                validation: ValidationMode::Strict,
                request_timeout_secs: 600,
                retry: RetryConfig {
                    max_attempts: 20,
                    backoff_secs: vec![
                        5, 10, 30, 60, 120,
                        300, 300, 300, 300, 300,
                        600, 600, 600, 600, 600,
                        1800, 1800, 1800, 1800, 1800,
                    ],
                },
                output_suffix: "_cn".to_string(),
                original_suffix: "_en".to_string(),
                api_keys: HashMap::new(),
            },
            media: MediaConfig {
                binary_path: "ffmpeg".to_string(),
                command_timeout_secs: 600,
                audio_codec: "aac".to_string(),
                audio_quality: vec!["-vbr".to_string(), "3".to_string()],
                audio_format: "m4a".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SubdubError::Config(format!("Failed to read config file: {}", e)))?;

        Ok(toml::from_str(&content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SubdubError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SubdubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply environment overrides once at startup.
    pub fn resolve_env(&mut self) {
        self.resolve_with(|key| std::env::var(key).ok());
    }

    fn resolve_with<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        if let Some(url) = lookup(TTS_URL_ENV).filter(|v| !v.is_empty()) {
            self.speech.base_url = url;
        }

        for provider in &self.translate.providers {
            if let Some(key) = lookup(&provider.api_key_env).filter(|v| !v.is_empty()) {
                self.translate.api_keys.insert(provider.vendor.clone(), key);
            }
        }
    }
}

impl TranslateConfig {
    /// Pick a provider by vendor and optional model type; the vendor's first
    /// model is used when the type does not match.
    pub fn select_provider(&self, vendor: &str, kind: Option<&str>) -> Result<&ProviderConfig> {
        let mut candidates = self.providers.iter().filter(|p| p.vendor == vendor).peekable();
        let first = candidates
            .peek()
            .copied()
            .ok_or_else(|| SubdubError::Config(format!("Unknown API vendor '{}'", vendor)))?;

        Ok(kind
            .and_then(|kind| candidates.find(|p| p.kind == kind))
            .unwrap_or(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_level_order_and_parse() {
        assert!(SpeechLevel::VeryLow < SpeechLevel::Low);
        assert!(SpeechLevel::High < SpeechLevel::VeryHigh);
        assert_eq!("very_high".parse::<SpeechLevel>().unwrap(), SpeechLevel::VeryHigh);
        assert_eq!("Moderate".parse::<SpeechLevel>().unwrap(), SpeechLevel::Moderate);
        assert!("fast".parse::<SpeechLevel>().is_err());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.dub.overlap = OverlapPolicy::Keep;
        config.speech.clone.role = Some("narrator".to_string());
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.dub.overlap, OverlapPolicy::Keep);
        assert_eq!(loaded.speech.clone.role.as_deref(), Some("narrator"));
        assert_eq!(loaded.translate.retry.backoff_secs.len(), 20);
        assert_eq!(loaded.media.audio_quality, vec!["-vbr", "3"]);
    }

    #[test]
    fn test_invalid_file_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "speech = 3").unwrap();
        assert!(matches!(Config::from_file(&path), Err(SubdubError::Toml(_))));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::from_file(&missing), Err(SubdubError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.resolve_with(|key| match key {
            TTS_URL_ENV => Some("http://tts:9000".to_string()),
            "DEEPSEEK_API_KEY" => Some("sk-test".to_string()),
            _ => None,
        });

        assert_eq!(config.speech.base_url, "http://tts:9000");
        assert_eq!(config.translate.api_keys.get("deepseek").map(String::as_str), Some("sk-test"));
        assert!(!config.translate.api_keys.contains_key("siliconflow"));
    }

    #[test]
    fn test_select_provider() {
        let mut config = Config::default().translate;
        config.providers.push(ProviderConfig {
            vendor: "deepseek".to_string(),
            kind: "reasoner".to_string(),
            model: "deepseek-reasoner".to_string(),
            endpoint: "https://api.deepseek.com/chat/completions".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
        });

        assert_eq!(config.select_provider("deepseek", None).unwrap().model, "deepseek-chat");
        assert_eq!(config.select_provider("deepseek", Some("reasoner")).unwrap().model, "deepseek-reasoner");
        assert_eq!(config.select_provider("deepseek", Some("missing")).unwrap().model, "deepseek-chat");
        assert!(config.select_provider("nobody", None).is_err());
    }
}
