use crate::config::TmdbConfig;

use std::{collections::VecDeque, time::Duration};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

/// Admits at most `capacity` acquisitions within any rolling `window`.
///
/// Callers over the limit sleep until the oldest acquisition leaves the window,
/// so a wait never exceeds the window length.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    window: Duration,
    acquired: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(capacity: usize, window: Duration) -> RateLimiter {
        RateLimiter {
            capacity: capacity.max(1),
            window,
            acquired: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn from_config(config: &TmdbConfig) -> RateLimiter {
        Self::new(config.max_requests, config.window())
    }

    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut acquired = self.acquired.lock().await;
                let now = Instant::now();

                while let Some(oldest) = acquired.front() {
                    if now.duration_since(*oldest) >= self.window {
                        acquired.pop_front();
                    } else {
                        break;
                    }
                }

                match acquired.front() {
                    Some(oldest) if acquired.len() >= self.capacity => {
                        self.window - now.duration_since(*oldest)
                    }
                    _ => {
                        acquired.push_back(now);
                        return;
                    }
                }
            };

            debug!("Rate limit reached, waiting {:?}.", wait);
            tokio::time::sleep(wait).await;
        }
    }
}
