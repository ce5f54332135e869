use std::time::Duration;
use tokio::time::sleep;

/// Exponential delay between failed polls, reset after the next success
#[derive(Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_retries: u32,
    current_attempt: u32,
}

#[derive(Debug)]
pub struct MaxRetriesExceeded;

impl std::fmt::Display for MaxRetriesExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Maximum retry attempts exceeded")
    }
}

impl std::error::Error for MaxRetriesExceeded {}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration, retries: u32) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max,
            max_retries: retries,
            current_attempt: 0,
        }
    }

    /// Delay the next attempt would wait, or None once retries are spent
    pub fn next_delay(&self) -> Option<Duration> {
        if self.current_attempt >= self.max_retries {
            return None;
        }

        let factor = 2u32.checked_pow(self.current_attempt).unwrap_or(u32::MAX);
        let delay = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay);
        Some(std::cmp::min(delay, self.max_delay))
    }

    pub async fn sleep(&mut self) -> Result<(), MaxRetriesExceeded> {
        let delay = self.next_delay().ok_or(MaxRetriesExceeded)?;

        log::warn!(
            "⏳ Retry attempt {} of {} in {}ms",
            self.current_attempt + 1,
            self.max_retries,
            delay.as_millis()
        );

        sleep(delay).await;
        self.current_attempt += 1;
        Ok(())
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_millis(350), 5);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        backoff.current_attempt = 1;
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        backoff.current_attempt = 2;
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(350)));
        backoff.current_attempt = 5;
        assert_eq!(backoff.next_delay(), None);
    }

    #[tokio::test]
    async fn test_sleep_exhausts_then_resets() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(1), Duration::from_millis(2), 2);
        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_ok());
        assert!(backoff.sleep().await.is_err());
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.sleep().await.is_ok());
    }
}
