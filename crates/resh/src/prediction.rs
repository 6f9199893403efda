//! Locally predicted echo
//!
//! Printable keys typed on the client are remembered with the frame that
//! carries them. Once the server's echo ack reaches that frame, the screen
//! the client holds already shows the host's echo and the prediction is
//! retired.

use std::collections::VecDeque;
use tracing::trace;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PredictedEcho {
    frame: u64,
    text: String,
}

/// Predictions waiting for the host's echo
#[derive(Debug, Default)]
pub struct EchoPredictions {
    pending: VecDeque<PredictedEcho>,
}

impl EchoPredictions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Predict the echo of `keys`, which will travel in client frame `frame`
    ///
    /// Control keys are not predicted; their effect on the screen is up to
    /// the host program.
    pub fn predict(&mut self, frame: u64, keys: &str) {
        let text: String = keys
            .graphemes(true)
            .filter(|g| !g.chars().any(char::is_control))
            .collect();
        if text.is_empty() {
            return;
        }

        match self.pending.back_mut() {
            Some(last) if last.frame == frame => last.text.push_str(&text),
            _ => self.pending.push_back(PredictedEcho { frame, text }),
        }
    }

    /// Retire every prediction the host has echoed by `echo_ack`
    ///
    /// Returns how many frames were retired.
    pub fn cull(&mut self, echo_ack: u64) -> usize {
        let before = self.pending.len();
        while self
            .pending
            .front()
            .is_some_and(|prediction| prediction.frame <= echo_ack)
        {
            self.pending.pop_front();
        }
        let retired = before - self.pending.len();
        if retired > 0 {
            trace!("Echo ack {} retired {} predictions", echo_ack, retired);
        }
        retired
    }

    /// Text predicted but not yet confirmed, oldest first
    pub fn pending_text(&self) -> String {
        self.pending.iter().map(|p| p.text.as_str()).collect()
    }

    /// Frames with unconfirmed predictions
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
