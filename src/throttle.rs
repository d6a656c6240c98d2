//! Flood-wait policy — pause-and-retry with a bounded budget.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DirectoryError;

/// Suspends the driver. Injected so tests can observe waits without
/// actually sleeping.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Production sleeper backed by tokio's timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bound on flood-wait retries for one logical call.
#[derive(Debug, Clone, Copy)]
pub struct FloodPolicy {
    pub max_retries: u32,
}

impl Default for FloodPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
        }
    }
}

/// Run `op`, pausing for the signaled duration and re-issuing the exact same
/// operation each time the platform responds with a flood wait. Gives up
/// after `policy.max_retries` waits and surfaces `FloodExhausted`; every
/// other error passes through untouched.
pub async fn with_flood_wait<T, F, Fut>(
    policy: FloodPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, DirectoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DirectoryError>>,
{
    let mut waits = 0u32;
    loop {
        match op().await {
            Err(DirectoryError::FloodWait { retry_after }) => {
                if waits >= policy.max_retries {
                    return Err(DirectoryError::FloodExhausted { attempts: waits });
                }
                waits += 1;
                tracing::warn!(
                    wait_secs = retry_after.as_secs(),
                    attempt = waits,
                    max = policy.max_retries,
                    "Flood wait signaled; pausing before retrying the same call"
                );
                sleeper.sleep(retry_after).await;
            }
            other => return other,
        }
    }
}
