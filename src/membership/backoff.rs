use std::time::Duration;

const INITIAL_DELAY_MS: u64 = 150;
const MAX_DELAY_MS: u64 = 1200;

/// Capped exponential backoff with a little jitter, shared by the background
/// loops that must keep retrying substrate calls.
#[derive(Debug, Clone)]
pub struct Backoff {
    delay_ms: u64,
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            delay_ms: INITIAL_DELAY_MS,
        }
    }

    pub fn reset(&mut self) {
        self.delay_ms = INITIAL_DELAY_MS;
    }

    pub fn current(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub async fn wait(&mut self) {
        let jitter = rand::random::<u64>() % 50;
        tokio::time::sleep(Duration::from_millis(self.delay_ms + jitter)).await;
        self.delay_ms = (self.delay_ms * 2).min(MAX_DELAY_MS);
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
