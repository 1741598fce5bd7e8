use tokio::time::Instant;

use crossfire_core::clock::Clock;

/// Session clock backed by the tokio timer, so paused-time tests drive it too.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    offset: f64,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::with_offset(0.0)
    }

    /// A clock reading `offset` seconds at creation, standing in for a
    /// participant whose device booted at a different time.
    pub fn with_offset(offset: f64) -> Self {
        Self {
            origin: Instant::now(),
            offset,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() + self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn follows_tokio_time() {
        let clock = TokioClock::with_offset(100.0);
        assert_eq!(clock.now(), 100.0);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!((clock.now() - 101.5).abs() < 1e-9);
    }
}
