//! Balance retry tests
//!
//! Tests exponential backoff timing, the attempt cap, and that only
//! transport failures are retried.

use crate::support::FlakyBalances;
use dca_sentinel::config::RetryConfig;
use dca_sentinel::wallet::{BalanceError, BalanceSource, RetryPolicy, RetryingBalanceSource};
use std::time::Duration;
use tokio::time::Instant;

const ADDRESS: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

fn transport() -> BalanceError {
    BalanceError::Transport("connection reset".to_string())
}

#[test]
fn test_delay_doubles_and_caps() {
    let policy = RetryPolicy::from(&RetryConfig {
        max_attempts: 6,
        base_delay_ms: 1000,
        max_delay_ms: 8000,
    });

    assert_eq!(policy.delay_for(1), Duration::from_secs(1));
    assert_eq!(policy.delay_for(2), Duration::from_secs(2));
    assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    assert_eq!(policy.delay_for(4), Duration::from_secs(8));
    assert_eq!(policy.delay_for(5), Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried_with_backoff() {
    let source = RetryingBalanceSource::new(
        FlakyBalances::new(vec![transport(), transport()]),
        RetryPolicy::default(),
    );

    let started = Instant::now();
    let balances = source.get_balances(ADDRESS).await.unwrap();

    assert_eq!(balances.address, ADDRESS);
    assert_eq!(source.inner().calls(), 3);
    // 1s after the first failure, 2s after the second
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "elapsed {:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_max_attempts() {
    let source = RetryingBalanceSource::new(
        FlakyBalances::new(vec![transport(), transport(), transport(), transport()]),
        RetryPolicy::default(),
    );

    let err = source.get_balances(ADDRESS).await.unwrap_err();

    assert!(matches!(err, BalanceError::Transport(_)));
    assert_eq!(source.inner().calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_non_transient_errors_are_not_retried() {
    for err in [
        BalanceError::InvalidAddress("nope".to_string()),
        BalanceError::Rpc("account not found".to_string()),
        BalanceError::Parse("unexpected shape".to_string()),
    ] {
        let source = RetryingBalanceSource::new(FlakyBalances::new(vec![err]), RetryPolicy::default());

        let started = Instant::now();
        assert!(source.get_balances(ADDRESS).await.is_err());
        assert_eq!(source.inner().calls(), 1);
        assert!(started.elapsed() < Duration::from_millis(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_attempt_policy() {
    let source = RetryingBalanceSource::new(
        FlakyBalances::new(vec![transport()]),
        RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            base_delay_ms: 10,
            max_delay_ms: 10,
        }),
    );

    assert!(source.get_balances(ADDRESS).await.is_err());
    assert_eq!(source.inner().calls(), 1);
}
