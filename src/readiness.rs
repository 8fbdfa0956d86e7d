//! Waiting for a freshly created vault to become usable.
//!
//! A new vault's DNS record takes a while to appear. The wait is either a
//! fixed delay or a poll of cheap data-plane calls with doubling intervals.

use crate::client::SecretClient;
use crate::KeyVaultError;
use std::time::{Duration, Instant};
use tokio::time::delay_for;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            timeout: Duration::from_secs(120),
        }
    }
}

impl PollPolicy {
    /// Interval to sleep after `attempt` failed probes (0-based).
    pub fn interval(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_interval
            .checked_mul(factor)
            .map_or(self.max_interval, |d| d.min(self.max_interval))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Propagation {
    FixedDelay(Duration),
    Poll(PollPolicy),
}

impl Default for Propagation {
    fn default() -> Self {
        Propagation::Poll(PollPolicy::default())
    }
}

impl Propagation {
    /// Returns once the vault behind `client` can be used, or with the last
    /// probe error when polling runs out of time.
    pub async fn wait(&self, client: &mut SecretClient) -> Result<(), KeyVaultError> {
        match self {
            Propagation::FixedDelay(delay) => {
                info!(delay_secs = delay.as_secs(), "Waiting for vault DNS propagation");
                delay_for(*delay).await;
                Ok(())
            }
            Propagation::Poll(policy) => poll(client, policy).await,
        }
    }
}

async fn poll(client: &mut SecretClient, policy: &PollPolicy) -> Result<(), KeyVaultError> {
    let started = Instant::now();
    let mut attempt = 0;
    loop {
        let err = match client.probe().await {
            Ok(()) => {
                info!(attempts = attempt + 1, "Vault is reachable");
                return Ok(());
            }
            Err(e) => e,
        };
        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            return Err(err);
        }
        let interval = policy.interval(attempt).min(policy.timeout - elapsed);
        debug!(attempt, error = %err, retry_in_ms = interval.as_millis() as u64, "Vault not ready yet");
        delay_for(interval).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_double_up_to_the_cap() {
        let policy = PollPolicy::default();
        let secs: Vec<_> = (0..6).map(|a| policy.interval(a).as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 8, 8]);
        assert_eq!(policy.interval(40), Duration::from_secs(8));
    }

    #[test]
    fn polling_is_the_default() {
        assert_eq!(Propagation::default(), Propagation::Poll(PollPolicy::default()));
    }
}
