//! Streaming emitter: replays a finished answer as paced text chunks.
//!
//! The answer is split on ASCII spaces and each piece is sent followed by a
//! single space, so concatenating the chunks gives the answer plus one
//! trailing space. Runs of spaces produce empty pieces and are kept intact.
//! Between two chunks the emitter sleeps a uniformly random delay in
//! `[min_delay, max_delay]`. Emission stops as soon as the receiver is gone.

use agentloop_config::StreamConfig;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Capacity of the channel between the emitter task and the response body.
const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamEmitter {
    min_delay: Duration,
    max_delay: Duration,
}

impl StreamEmitter {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        if min_delay <= max_delay {
            Self {
                min_delay,
                max_delay,
            }
        } else {
            Self {
                min_delay: max_delay,
                max_delay: min_delay,
            }
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// No pacing at all.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// The chunks for `text`, in order.
    pub fn chunks(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(' ').map(|piece| format!("{piece} "))
    }

    fn jitter(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        if min == max {
            return self.min_delay;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Send every chunk of `text` to `tx`. Returns how many were delivered.
    pub async fn emit(&self, text: &str, tx: &mpsc::Sender<String>) -> usize {
        let mut sent = 0;
        for chunk in Self::chunks(text) {
            if sent > 0 {
                let delay = self.jitter();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            if tx.send(chunk).await.is_err() {
                debug!(sent, "Stream receiver dropped, stopping emission");
                return sent;
            }
            sent += 1;
        }
        sent
    }

    /// Emit `text` from a background task. Dropping the returned stream
    /// stops the task at its next send.
    pub fn spawn(&self, text: String) -> ReceiverStream<String> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let emitter = *self;
        tokio::spawn(async move {
            let sent = emitter.emit(&text, &tx).await;
            debug!(chunks = sent, "Stream emission finished");
        });
        ReceiverStream::new(rx)
    }
}

impl Default for StreamEmitter {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}
