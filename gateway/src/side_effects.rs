//! Best-effort writes that run after the outcome of a call is decided.
//!
//! A failure here is logged and counted, then dropped. Callers build their
//! response before or independently of these writes.
use crate::metrics_defs::SECONDARY_WRITE_FAILURES;
use shared::counter;
use std::fmt::Display;
use std::future::Future;

/// Awaits `write`; on error logs it and returns normally.
pub async fn attempt<F, T, E>(what: &'static str, write: F)
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    if let Err(e) = write.await {
        counter!(SECONDARY_WRITE_FAILURES, "write" => what).increment(1);
        tracing::warn!(write = what, error = %e, "best-effort write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attempt_swallows_errors() {
        attempt("test", async { Err::<(), _>("boom") }).await;

        let mut ran = false;
        attempt("test", async {
            ran = true;
            Ok::<_, String>(())
        })
        .await;
        assert!(ran);
    }
}
