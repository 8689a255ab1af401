//! HTTP transcription backend client

use super::{TranscriptionError, TranscriptionRequest, TranscriptionResponse};
use crate::runtime::TranscriptionClient;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// Posts recordings as multipart forms to the speech backend
pub struct HttpTranscriptionClient {
    client: Client,
    endpoint: String,
}

impl HttpTranscriptionClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TranscriptionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn build_form(request: &TranscriptionRequest) -> Result<Form, TranscriptionError> {
        let audio = Part::bytes(request.audio.data.clone())
            .file_name(request.audio.file_name())
            .mime_str(&request.audio.mime_type)?;

        Ok(Form::new()
            .part("file", audio)
            .text("use_name_detection", request.use_name_detection.to_string())
            .text("is_continuing", request.is_continuing.to_string())
            .text("voice", request.voice.as_str()))
    }
}

#[async_trait]
impl TranscriptionClient for HttpTranscriptionClient {
    async fn transcribe(
        &self,
        request: &TranscriptionRequest,
    ) -> Result<TranscriptionResponse, TranscriptionError> {
        let form = Self::build_form(request)?;

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Username", &request.username)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // The backend reports failures as {"error": "..."} where it can
            if let Ok(TranscriptionResponse {
                error: Some(error), ..
            }) = serde_json::from_str::<TranscriptionResponse>(&body)
            {
                return Err(TranscriptionError::Backend(error));
            }
            return Err(TranscriptionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::Decode(format!("{e} - body: {body}")))
    }
}
