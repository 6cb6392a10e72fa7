//! Entry checks run before a new report is created.
//!
//! The per-subject concurrency lock lives in [`ReportStore::create`], which
//! inserts only when no non-terminal report exists. This module holds the
//! cooldown and daily-budget checks; the cooldown input comes from
//! [`ReportStore::last_completed_at`].
//!
//! [`ReportStore::create`]: compintel_core::ReportStore::create
//! [`ReportStore::last_completed_at`]: compintel_core::ReportStore::last_completed_at

use std::time::Duration;

use chrono::{DateTime, Utc};
use compintel_core::{CreditLedger, StoreError};

use crate::error::Rejection;

/// Rejects when `last_completed` is less than `cooldown` before `now`.
///
/// # Errors
///
/// Returns [`Rejection::Cooldown`] with the whole seconds left, rounded up.
pub fn check_cooldown(
    last_completed: Option<DateTime<Utc>>,
    cooldown: Duration,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    let Some(last) = last_completed else {
        return Ok(());
    };
    let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
    if elapsed >= cooldown {
        return Ok(());
    }
    let remaining = cooldown - elapsed;
    let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
    Err(Rejection::Cooldown { remaining_secs })
}

/// Rejects when `used` has reached a non-zero `budget`.
///
/// # Errors
///
/// Returns [`Rejection::BudgetExhausted`].
pub fn check_budget(used: f64, budget: f64) -> Result<(), Rejection> {
    if budget > 0.0 && used >= budget {
        return Err(Rejection::BudgetExhausted { used, budget });
    }
    Ok(())
}

/// Credits used today, from the ledger.
///
/// # Errors
///
/// Propagates ledger failures.
pub async fn credits_used_today(ledger: &dyn CreditLedger) -> Result<f64, StoreError> {
    ledger.total(compintel_core::utc_today()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_previous_run_passes() {
        assert!(check_cooldown(None, Duration::from_secs(3600), Utc::now()).is_ok());
    }

    #[test]
    fn recent_completion_is_rejected_with_remaining_time() {
        let now = Utc::now();
        let last = now - chrono::Duration::seconds(600);
        let err = check_cooldown(Some(last), Duration::from_secs(3600), now).unwrap_err();
        assert_eq!(err, Rejection::Cooldown { remaining_secs: 3000 });
    }

    #[test]
    fn elapsed_cooldown_passes() {
        let now = Utc::now();
        let last = now - chrono::Duration::seconds(3600);
        assert!(check_cooldown(Some(last), Duration::from_secs(3600), now).is_ok());
    }

    #[test]
    fn zero_cooldown_never_rejects() {
        let now = Utc::now();
        assert!(check_cooldown(Some(now), Duration::ZERO, now).is_ok());
    }

    #[test]
    fn zero_budget_is_unlimited() {
        assert!(check_budget(1_000_000.0, 0.0).is_ok());
    }

    #[test]
    fn budget_rejects_at_ceiling() {
        assert!(check_budget(9.5, 10.0).is_ok());
        assert!(matches!(
            check_budget(10.0, 10.0),
            Err(Rejection::BudgetExhausted { .. })
        ));
    }
}
