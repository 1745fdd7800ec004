use crate::config::HarnessConfig;
use crate::driver::Driver;
use crate::error::StepError;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Oracle {
    timeout: Duration,
    interval: Duration,
    absence_hold: Duration,
}

impl Oracle {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            absence_hold: Duration::ZERO,
        }
    }

    pub fn with_absence_hold(mut self, hold: Duration) -> Self {
        self.absence_hold = hold;
        self
    }

    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.assert_timeout(), config.poll_interval())
            .with_absence_hold(config.absence_hold())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns on the first positive probe. Fails with
    /// [`StepError::AssertionFailure`] once `timeout` has elapsed.
    pub async fn assert_visible(
        &self,
        driver: &mut dyn Driver,
        text: &str,
    ) -> Result<Duration, StepError> {
        let started = Instant::now();
        let poll = async {
            let mut probes = 0u32;
            loop {
                probes += 1;
                if driver.text_visible(text).await? {
                    trace!(text, probes, "glyph visible");
                    return Ok(started.elapsed());
                }
                tokio::time::sleep(self.interval).await;
            }
        };

        match tokio::time::timeout(self.timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(StepError::AssertionFailure {
                expected: text.to_string(),
                elapsed: started.elapsed(),
            }),
        }
    }

    /// Watches for `text` during the absence hold and fails on first sighting.
    ///
    /// A zero hold performs a single probe.
    pub async fn assert_absent(
        &self,
        driver: &mut dyn Driver,
        text: &str,
    ) -> Result<Duration, StepError> {
        let started = Instant::now();
        loop {
            if driver.text_visible(text).await? {
                return Err(StepError::UnexpectedGlyph {
                    text: text.to_string(),
                    elapsed: started.elapsed(),
                });
            }
            let elapsed = started.elapsed();
            if elapsed >= self.absence_hold {
                return Ok(elapsed);
            }
            tokio::time::sleep(self.interval.min(self.absence_hold - elapsed)).await;
        }
    }
}
