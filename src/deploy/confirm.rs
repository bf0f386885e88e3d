// ABOUTME: Confirmation gate between validating a new color and promoting it.
// ABOUTME: Automatic by default; can ask the operator on stdin instead.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::types::Color;

/// Decides whether a validated color may take traffic.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, new: Color, live: Color) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmMode {
    /// Promote as soon as the health gate passes.
    #[default]
    Auto,
    /// Ask on the terminal; anything but `y`/`yes` declines.
    Prompt,
}

impl ConfirmMode {
    pub fn from_auto(auto_confirm: bool) -> Self {
        if auto_confirm {
            ConfirmMode::Auto
        } else {
            ConfirmMode::Prompt
        }
    }
}

#[async_trait]
impl Confirm for ConfirmMode {
    async fn confirm(&self, new: Color, live: Color) -> bool {
        match self {
            ConfirmMode::Auto => true,
            ConfirmMode::Prompt => {
                let question = format!("{new} is healthy. Switch traffic from {live} to {new}? [y/N] ");
                let mut stderr = tokio::io::stderr();
                if let Err(e) = stderr.write_all(question.as_bytes()).await {
                    tracing::warn!("could not write confirmation prompt: {}", e);
                }
                let _ = stderr.flush().await;
                read_answer(BufReader::new(tokio::io::stdin())).await
            }
        }
    }
}

/// Read one line and accept only `y` or `yes`. EOF and read errors decline.
pub(crate) async fn read_answer<R: AsyncBufRead + Unpin>(mut reader: R) -> bool {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(e) => {
            tracing::warn!("could not read confirmation: {}", e);
            false
        }
    }
}
