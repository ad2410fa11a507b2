use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};

use crate::error::HandoffProtocolError;

use super::HumanChannel;

/// Interactive terminal channel.
///
/// An answer may span several lines and ends at the first empty line.
/// An empty first line is an empty answer (skip / confirm / done).
pub struct ConsoleChannel {
    lines: Lines<BufReader<Stdin>>,
    stdout: Stdout,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stdout: tokio::io::stdout(),
        }
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HumanChannel for ConsoleChannel {
    async fn display(&mut self, prompt: &str) -> Result<(), HandoffProtocolError> {
        self.stdout
            .write_all(format!("\n{}\n(finish with an empty line)\n> ", prompt).as_bytes())
            .await?;
        self.stdout.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<String, HandoffProtocolError> {
        let mut answer: Vec<String> = Vec::new();
        loop {
            match self.lines.next_line().await? {
                // EOF: deliver what we have, or report the channel gone
                None if answer.is_empty() => return Err(HandoffProtocolError::ChannelClosed),
                None => break,
                Some(line) if line.trim().is_empty() => break,
                Some(line) => answer.push(line),
            }
        }
        Ok(answer.join("\n"))
    }
}
