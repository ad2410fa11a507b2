//! Handoff - the only point where a run blocks for human input.
//!
//! A handoff shows exactly one prompt and consumes exactly one response.
//! It never retries and never times out; cancellation is the caller's concern.
//!
//! Two resumption modes:
//! - **Continue**: the response is returned and the run keeps going.
//! - **Terminate**: the response is returned as the last one the run acts on
//!   before finalizing. An empty reply means "no further input".

mod console;
mod scripted;

pub use console::ConsoleChannel;
pub use scripted::ScriptedChannel;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HandoffProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandoffMode {
    Continue,
    Terminate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffRequest {
    pub prompt: String,
    pub mode: HandoffMode,
}

impl HandoffRequest {
    pub fn continue_with(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            mode: HandoffMode::Continue,
        }
    }

    pub fn terminate_with(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            mode: HandoffMode::Terminate,
        }
    }
}

/// What the human sent back, typed by resumption mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffResponse {
    /// Keep executing with this text
    Continue(String),
    /// Stop automated processing after this; `None` means no further input
    Terminate(Option<String>),
}

impl HandoffResponse {
    pub fn text(&self) -> Option<&str> {
        match self {
            HandoffResponse::Continue(text) => Some(text),
            HandoffResponse::Terminate(text) => text.as_deref(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, HandoffResponse::Terminate(_))
    }
}

/// Boundary to the human. Only ever driven through [`Handoff`].
#[async_trait]
pub trait HumanChannel: Send {
    /// Show a prompt to the human
    async fn display(&mut self, prompt: &str) -> Result<(), HandoffProtocolError>;

    /// Block until the human replies
    async fn read_response(&mut self) -> Result<String, HandoffProtocolError>;
}

/// Suspension primitive wrapping a [`HumanChannel`].
pub struct Handoff {
    channel: Box<dyn HumanChannel>,
    exchanges: u32,
}

impl Handoff {
    pub fn new(channel: Box<dyn HumanChannel>) -> Self {
        Self {
            channel,
            exchanges: 0,
        }
    }

    /// Completed prompt/response exchanges
    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    pub async fn request_input(
        &mut self,
        request: HandoffRequest,
    ) -> Result<HandoffResponse, HandoffProtocolError> {
        debug!("Handoff ({:?}) awaiting human input", request.mode);
        self.channel.display(&request.prompt).await?;
        let text = self.channel.read_response().await?;
        self.exchanges += 1;

        Ok(match request.mode {
            HandoffMode::Continue => HandoffResponse::Continue(text),
            HandoffMode::Terminate if text.trim().is_empty() => HandoffResponse::Terminate(None),
            HandoffMode::Terminate => HandoffResponse::Terminate(Some(text)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_continue_mode_returns_text() {
        let channel = ScriptedChannel::new(["first answer"]);
        let transcript = channel.transcript();
        let mut handoff = Handoff::new(Box::new(channel));

        let response = handoff
            .request_input(HandoffRequest::continue_with("Question?"))
            .await
            .unwrap();

        assert_eq!(response, HandoffResponse::Continue("first answer".to_string()));
        assert!(!response.is_terminal());
        assert_eq!(handoff.exchanges(), 1);
        assert_eq!(transcript.lock().unwrap().as_slice(), ["Question?"]);
    }

    #[tokio::test]
    async fn test_terminate_mode_empty_reply_means_no_further_input() {
        let mut handoff = Handoff::new(Box::new(ScriptedChannel::new(["  ", "last words"])));

        let response = handoff
            .request_input(HandoffRequest::terminate_with("Anything else?"))
            .await
            .unwrap();
        assert_eq!(response, HandoffResponse::Terminate(None));
        assert!(response.text().is_none());

        let response = handoff
            .request_input(HandoffRequest::terminate_with("Anything else?"))
            .await
            .unwrap();
        assert!(response.is_terminal());
        assert_eq!(response.text(), Some("last words"));
    }

    #[tokio::test]
    async fn test_closed_channel_is_protocol_error() {
        let mut handoff = Handoff::new(Box::new(ScriptedChannel::new(Vec::<String>::new())));
        let result = handoff
            .request_input(HandoffRequest::continue_with("Question?"))
            .await;
        assert!(matches!(result, Err(HandoffProtocolError::ChannelClosed)));
        assert_eq!(handoff.exchanges(), 0);
    }

    #[tokio::test]
    async fn test_one_response_consumed_per_call() {
        let channel = ScriptedChannel::new(["a", "b", "c"]);
        let mut handoff = Handoff::new(Box::new(channel));
        let first = handoff
            .request_input(HandoffRequest::continue_with("1"))
            .await
            .unwrap();
        let second = handoff
            .request_input(HandoffRequest::continue_with("2"))
            .await
            .unwrap();
        assert_eq!(first.text(), Some("a"));
        assert_eq!(second.text(), Some("b"));
    }
}
