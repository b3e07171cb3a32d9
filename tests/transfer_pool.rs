// tests/transfer_pool.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use smartproxy::proxy::new_folder_name;
use smartproxy::transfer::{FileSelector, TransferPool};
use smartproxy_test_utils::with_timeout;

#[tokio::test]
async fn pool_never_runs_more_than_max_threads() {
    let pool = TransferPool::new(2);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            pool.spawn(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();
    assert_eq!(pool.in_flight(), 8);

    for handle in handles {
        with_timeout(handle).await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(pool.in_flight(), 0);
}

#[test]
fn pool_size_is_at_least_one() {
    assert_eq!(TransferPool::new(0).max_threads(), 1);
}

#[test]
fn selector_excludes_win_over_includes() {
    let selector = FileSelector::from_patterns(["*.out", "!debug/*", "  "]).unwrap();

    assert_eq!(selector.includes(), ["*.out".to_string()]);
    assert_eq!(selector.excludes(), ["debug/*".to_string()]);
    assert!(selector.matches("result.out"));
    assert!(selector.matches("deep/result.out"));
    assert!(!selector.matches("debug/trace.out"));
    assert!(!selector.matches("result.log"));
}

#[test]
fn empty_selector_matches_nothing() {
    let selector = FileSelector::from_patterns(Vec::<String>::new()).unwrap();
    assert!(selector.is_empty());
    assert!(!selector.matches("anything"));
}

#[test]
fn invalid_glob_is_reported() {
    assert!(FileSelector::from_patterns(["a[b"]).is_err());
}

#[test]
fn folder_names_are_unique_and_escaped() {
    let first = new_folder_name("bob");
    let second = new_folder_name("bob");
    assert_ne!(first, second);
    assert!(first.starts_with("bob_"));
    // yyyy-MM-dd_HH.mm.ss.SSS
    assert_eq!(first.len(), "bob_".len() + 23);

    let spaced = new_folder_name("jo doe");
    assert!(spaced.starts_with("jo%20doe_"));
}
