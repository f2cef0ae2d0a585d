use crate::config::RetryPolicy;
use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Last error seen once every attempt allowed by the policy has failed.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `op` until it succeeds or the policy runs out of attempts, sleeping the
/// policy's fixed delay between tries. `op` receives the 1-based attempt number.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!("[Retry {attempt}/{}] {label}: {e}", policy.attempts());
                if attempt >= policy.attempts() {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: e,
                    });
                }
                tokio::time::sleep(policy.delay()).await;
            }
        }
    }
}
