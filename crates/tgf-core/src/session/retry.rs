use std::{future::Future, sync::Arc};

use tracing::{error, warn};

use crate::{
    errors::Error,
    ports::ClientHandle,
    session::{
        classify::{classify, FailureKind},
        pool::SessionPool,
    },
    Result,
};

/// Attempts per request, each on a freshly acquired session.
pub const MAX_RETRIES: usize = 3;

/// Runs operations against the pool with a bounded number of attempts.
///
/// Rate limits, dead sessions and per-channel bans each cost one attempt and
/// are retried on the next session in rotation; dead sessions are evicted on
/// the way. Unknown failures end the request on the spot. Nothing sleeps: the
/// platform's wait hint is handed back to the caller instead.
#[derive(Clone)]
pub struct SessionRunner {
    pool: Arc<SessionPool>,
    max_attempts: usize,
}

/// What happened so far within one `run`.
#[derive(Debug, Default)]
struct Attempts {
    used: usize,
    last: Option<FailureKind>,
}

impl SessionRunner {
    pub fn new(pool: Arc<SessionPool>) -> Self {
        Self {
            pool,
            max_attempts: MAX_RETRIES,
        }
    }

    pub fn pool(&self) -> &Arc<SessionPool> {
        &self.pool
    }

    /// Execute `op` with a session from the pool, retrying as described above.
    ///
    /// `name` only labels log events.
    pub async fn run<T, F, Fut>(&self, name: &'static str, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn ClientHandle>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempts = Attempts::default();

        while attempts.used < self.max_attempts {
            let attempt = attempts.used;
            let Some(client) = self.pool.acquire().await else {
                error!(func = name, "no_sessions");
                return Err(Error::PoolExhausted);
            };
            attempts.used += 1;

            let err = match op(client.clone()).await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            let kind = classify(&err);
            if !kind.is_retryable() {
                return Err(err);
            }
            if kind.evicts_session() {
                self.pool.evict(&client).await;
            }
            match &kind {
                FailureKind::RateLimited { wait_secs } => {
                    warn!(seconds = *wait_secs, attempt, func = name, "flood_wait");
                }
                FailureKind::SessionInvalid { reason } => {
                    let remaining = self.pool.len().await;
                    error!(
                        error_type = %reason,
                        error = %err,
                        session = client.name(),
                        attempt,
                        func = name,
                        sessions_remaining = remaining,
                        "session_dead"
                    );
                }
                FailureKind::ScopeDenied => {
                    warn!(error = %err, attempt, func = name, "user_banned_in_channel");
                }
                FailureKind::Unknown => {}
            }
            attempts.last = Some(kind);
        }

        Err(exhausted(attempts.last))
    }
}

/// Final error once the attempt budget is spent.
fn exhausted(last: Option<FailureKind>) -> Error {
    match last {
        Some(FailureKind::RateLimited { wait_secs }) => Error::RateLimited {
            retry_after_secs: wait_secs,
        },
        Some(FailureKind::SessionInvalid { reason }) => Error::SessionsDeauthorized { reason },
        Some(FailureKind::ScopeDenied) => Error::ScopeDenied,
        Some(FailureKind::Unknown) | None => {
            Error::External("retry budget exhausted without a recorded failure".to_string())
        }
    }
}
