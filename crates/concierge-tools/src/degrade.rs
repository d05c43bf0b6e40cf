//! Soft-failure policy for side effects.
//!
//! A failing side effect never reaches the model as an error: it is logged,
//! a fallback record is written for a human, and the tool reports
//! `manual_followup` instead.

use std::future::Future;

use concierge_core::error::Result;

/// Result of a degradable side effect.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    ManualFollowup,
}

/// Run `action`; on failure log it, run `fallback` and return `ManualFollowup`.
///
/// `fallback` is only built when the action failed. Its own failure is
/// logged and otherwise ignored.
pub async fn or_manual_followup<T, A, F, Fut>(what: &str, action: A, fallback: F) -> Outcome<T>
where
    A: Future<Output = Result<T>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    match action.await {
        Ok(value) => Outcome::Done(value),
        Err(e) => {
            tracing::warn!("⚠️ {what} failed, deferring to manual follow-up: {e}");
            if let Err(fallback_err) = fallback().await {
                tracing::error!("❌ {what}: fallback record also failed: {fallback_err}");
            }
            Outcome::ManualFollowup
        }
    }
}

/// Fallback for side effects that have nothing extra to record.
pub async fn no_fallback() -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::error::ConciergeError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_success_skips_fallback() {
        let fallbacks = AtomicUsize::new(0);
        let out = or_manual_followup("booking", async { Ok(7) }, || async {
            fallbacks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert_eq!(out, Outcome::Done(7));
        assert_eq!(fallbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_runs_fallback_once() {
        let fallbacks = AtomicUsize::new(0);
        let out: Outcome<i32> = or_manual_followup(
            "booking",
            async { Err(ConciergeError::Persistence("calendar down".into())) },
            || async {
                fallbacks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .await;
        assert_eq!(out, Outcome::ManualFollowup);
        assert_eq!(fallbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_fallback_still_degrades() {
        let out: Outcome<()> = or_manual_followup(
            "lead",
            async { Err(ConciergeError::Persistence("db locked".into())) },
            || async { Err(ConciergeError::Persistence("still locked".into())) },
        )
        .await;
        assert_eq!(out, Outcome::ManualFollowup);
    }
}
