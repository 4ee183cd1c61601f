// Speech synthesis
//
// - client: HTTP transport for the `/speak` and `/clone_voice` endpoints
// - synthesizer: per-entry synthesis with the clone-role fallback chain

pub mod client;
pub mod synthesizer;

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

pub use client::HttpSpeechApi;
pub use synthesizer::{AttemptOutcome, SpeechSynthesizer, SynthesisStrategy};

use crate::config::SpeechLevel;
use crate::error::Result;
use crate::subtitle::TimedEntry;

/// JSON body of `POST /speak`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeakRequest {
    pub name: String,
    pub text: String,
    pub pitch: SpeechLevel,
    pub speed: SpeechLevel,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub response_format: String,
}

/// Form fields of `POST /clone_voice`
#[derive(Debug, Clone, PartialEq)]
pub struct CloneRequest {
    pub text: String,
    pub pitch: SpeechLevel,
    pub speed: SpeechLevel,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stream: bool,
    pub response_format: String,
    pub reference_audio: PathBuf,
    pub reference_text: Option<String>,
}

/// Raw reply of the synthesis service
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechReply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl SpeechReply {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Transport to the remote synthesis service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechApi: Send + Sync {
    async fn speak(&self, request: &SpeakRequest) -> Result<SpeechReply>;

    async fn clone_voice(&self, request: &CloneRequest) -> Result<SpeechReply>;
}

/// Anything that turns an entry into audio bytes at a given rate.
/// Empty bytes mean synthesis failed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipSynthesizer: Send + Sync {
    async fn synthesize(&self, entry: &TimedEntry, rate: SpeechLevel) -> Vec<u8>;
}
