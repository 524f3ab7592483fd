//! HTTP client for the certificate service, used by the `certificate-chat` binary.

use std::path::Path;

use bytes::Bytes;
use futures::Stream;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::certificate::analysis::AnalysisReport;
use crate::certificate::specs::CertificateSpecs;
use crate::chat::{ChatReply, ChatRequest};
use crate::conversation::log::ConversationLog;
use crate::conversation::message::Message;
use crate::conversation::reconcile::{consume_stream, TurnOutcome};
use crate::llm_client::Role;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What the upload flow keeps for the chat flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub analysis: AnalysisReport,
    pub specs: CertificateSpecs,
    pub raw_text: String,
}

impl AnalysisSnapshot {
    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ClientError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeReply {
    analysis: AnalysisReport,
    specifications: CertificateSpecs,
    certificate_text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Uploads a certificate PDF for structured analysis.
    pub async fn analyze(&self, pdf: &Path) -> Result<AnalysisSnapshot, ClientError> {
        let bytes = tokio::fs::read(pdf).await?;
        let file_name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "certificate.pdf".to_string());

        info!("Uploading {} ({} bytes)", file_name, bytes.len());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let response = self
            .http
            .post(self.url("/api/analyze"))
            .multipart(Form::new().part("file", part))
            .send()
            .await?;

        let reply: AnalyzeReply = checked(response).await?.json().await?;
        Ok(AnalysisSnapshot {
            analysis: reply.analysis,
            specs: reply.specifications,
            raw_text: reply.certificate_text,
        })
    }

    /// Starts a streamed answer. Fails if the server did not accept the request.
    pub async fn open_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = reqwest::Result<Bytes>>, ClientError> {
        let body = ChatRequest {
            stream: true,
            ..request.clone()
        };
        let response = self.http.post(self.url("/api/chat")).json(&body).send().await?;
        Ok(checked(response).await?.bytes_stream())
    }

    pub async fn ask(&self, request: &ChatRequest) -> Result<String, ClientError> {
        let body = ChatRequest {
            stream: false,
            ..request.clone()
        };
        let response = self.http.post(self.url("/api/chat")).json(&body).send().await?;
        let reply: ChatReply = checked(response).await?.json().await?;
        Ok(reply.response)
    }
}

/// Turns a non-2xx response into `ClientError::Server` using the error envelope.
async fn checked(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) => format!("{error} ({details})"),
        Ok(ErrorBody { error, .. }) => error,
        Err(_) => body,
    };
    Err(ClientError::Server {
        status: status.as_u16(),
        message,
    })
}

/// One certificate's follow-up conversation.
pub struct ChatSession {
    client: ChatClient,
    snapshot: AnalysisSnapshot,
    log: ConversationLog,
}

impl ChatSession {
    /// Seeds the log with the hidden preamble and the analysis as the opening answer.
    pub fn new(client: ChatClient, snapshot: AnalysisSnapshot) -> Self {
        let mut log = ConversationLog::for_certificate(&snapshot.raw_text);
        let id = log.allocate_id();
        log.upsert(
            Message::new(id, Role::Assistant, snapshot.analysis.to_narrative())
                .with_quick_questions(),
        );
        Self {
            client,
            snapshot,
            log,
        }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn snapshot(&self) -> &AnalysisSnapshot {
        &self.snapshot
    }

    /// Builds the request from the history so far, then records the question.
    fn submit(&mut self, question: &str) -> ChatRequest {
        let request = ChatRequest {
            message: question.to_string(),
            certificate_text: self.snapshot.raw_text.clone(),
            stream: false,
            conversation_history: self.log.history(),
        };
        self.log.push(Role::User, question);
        request
    }

    pub async fn ask_streaming<F>(&mut self, question: &str, on_update: F) -> TurnOutcome
    where
        F: FnMut(&Message, &str),
    {
        let request = self.submit(question);
        match self.client.open_stream(&request).await {
            Ok(body) => consume_stream(&mut self.log, body, on_update).await,
            Err(e) => {
                warn!("Chat request failed: {e}");
                self.log.push_apology();
                TurnOutcome::Failed
            }
        }
    }

    pub async fn ask(&mut self, question: &str) -> TurnOutcome {
        let request = self.submit(question);
        match self.client.ask(&request).await {
            Ok(answer) => {
                self.log.push(Role::Assistant, answer);
                TurnOutcome::Completed
            }
            Err(e) => {
                warn!("Chat request failed: {e}");
                self.log.push_apology();
                TurnOutcome::Failed
            }
        }
    }
}
