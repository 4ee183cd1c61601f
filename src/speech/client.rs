use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::SpeechConfig;
use crate::error::{Result, SubdubError};
use super::{CloneRequest, SpeakRequest, SpeechApi, SpeechReply};

/// reqwest-backed client of the synthesis service
pub struct HttpSpeechApi {
    client: Client,
    base_url: String,
}

impl HttpSpeechApi {
    pub fn new(config: &SpeechConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn into_reply(response: reqwest::Response) -> Result<SpeechReply> {
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(SpeechReply { status, body })
    }
}

#[async_trait]
impl SpeechApi for HttpSpeechApi {
    async fn speak(&self, request: &SpeakRequest) -> Result<SpeechReply> {
        let url = format!("{}/speak", self.base_url);
        debug!("POST {} ({} chars, speed {})", url, request.text.chars().count(), request.speed);

        let response = self.client.post(&url).json(request).send().await?;
        Self::into_reply(response).await
    }

    async fn clone_voice(&self, request: &CloneRequest) -> Result<SpeechReply> {
        let url = format!("{}/clone_voice", self.base_url);
        debug!("POST {} with reference {}", url, request.reference_audio.display());

        let audio = tokio::fs::read(&request.reference_audio).await.map_err(|e| {
            SubdubError::Speech(format!(
                "Cannot read reference audio {}: {}",
                request.reference_audio.display(),
                e
            ))
        })?;
        let part = Part::bytes(audio)
            .file_name("reference_audio.wav")
            .mime_str("audio/wav")?;

        let mut form = Form::new()
            .text("text", request.text.clone())
            .text("temperature", request.temperature.to_string())
            .text("response_format", request.response_format.clone())
            .text("pitch", request.pitch.to_string())
            .text("speed", request.speed.to_string())
            .text("top_k", request.top_k.to_string())
            .text("top_p", request.top_p.to_string())
            .text("max_tokens", request.max_tokens.to_string())
            .text("stream", request.stream.to_string())
            .part("reference_audio_file", part);

        if let Some(reference_text) = &request.reference_text {
            form = form.text("reference_text", reference_text.clone());
        }

        let response = self.client.post(&url).multipart(form).send().await?;
        Self::into_reply(response).await
    }
}
