use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::HandoffProtocolError;

use super::HumanChannel;

/// Channel that replays canned responses. Used by demo mode and tests.
///
/// Once the script runs out the channel reports itself closed.
pub struct ScriptedChannel {
    responses: VecDeque<String>,
    transcript: Arc<Mutex<Vec<String>>>,
    echo: bool,
}

impl ScriptedChannel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            transcript: Arc::new(Mutex::new(Vec::new())),
            echo: false,
        }
    }

    /// Print prompts and replayed answers to stdout
    pub fn with_echo(mut self) -> Self {
        self.echo = true;
        self
    }

    /// Shared handle to every prompt displayed so far
    pub fn transcript(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.transcript)
    }
}

#[async_trait]
impl HumanChannel for ScriptedChannel {
    async fn display(&mut self, prompt: &str) -> Result<(), HandoffProtocolError> {
        if self.echo {
            println!("\n{}", prompt);
        }
        // A panicked reader must not cost us recorded prompts
        self.transcript
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());
        Ok(())
    }

    async fn read_response(&mut self) -> Result<String, HandoffProtocolError> {
        let response = self
            .responses
            .pop_front()
            .ok_or(HandoffProtocolError::ChannelClosed)?;
        if self.echo {
            println!("> {}", response);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transcript_survives_poisoned_lock() {
        let mut channel = ScriptedChannel::new(["answer"]);
        let transcript = channel.transcript();

        let shared = Arc::clone(&transcript);
        let poisoner = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("reader crashed while holding the transcript");
        });
        assert!(poisoner.join().is_err());
        assert!(transcript.is_poisoned());

        channel.display("Question?").await.unwrap();
        assert_eq!(channel.read_response().await.unwrap(), "answer");

        let recorded = transcript.lock().unwrap_or_else(|p| p.into_inner());
        assert_eq!(recorded.as_slice(), ["Question?"]);
    }
}
