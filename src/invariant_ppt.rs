//! PPT Invariant System: runtime invariant enforcement with contract tracking.
//!
//! Sequencing code asserts its invariants by numeric ID. With the `ppt` feature
//! each passing assertion is recorded, so a contract test can later prove that
//! a run actually exercised the checks it claims to enforce.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use std::collections::HashSet;
#[cfg(feature = "ppt")]
use std::sync::Mutex;

// Invariant constants for contract tracking
pub const CONFIG_VALIDATED: u32 = 1;
pub const CATALOG_COLD_START: u32 = 2;
pub const BAR_IN_RANGE: u32 = 3;
pub const SLICE_REST_RESPECTED: u32 = 4;
pub const BRANCH_REST_RESPECTED: u32 = 5;
pub const LOOP_LIMIT_BOUND: u32 = 6;
pub const OUTPUT_MONOTONIC: u32 = 7;
pub const TERMINATION_BOUND: u32 = 8;
pub const SLICE_PLAY_RECORDED: u32 = 9;

#[cfg(feature = "ppt")]
lazy_static! {
    static ref INVARIANT_LOG: Mutex<HashSet<u32>> = Mutex::new(HashSet::new());
}

#[cfg(feature = "ppt")]
/// Assert an invariant: logs it and panics on failure.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let full_message = if let Some(ctx) = context {
            format!("Invariant {} failed: {} (context: {})", id, message, ctx)
        } else {
            format!("Invariant {} failed: {}", id, message)
        };
        tracing::error!("{}", full_message);
        panic!("{}", full_message);
    }
    // A poisoned log only loses bookkeeping, never the check itself.
    if let Ok(mut log) = INVARIANT_LOG.lock() {
        log.insert(id);
    }
}

#[cfg(not(feature = "ppt"))]
/// Assert an invariant: checks condition and panics on failure.
pub(crate) fn assert_invariant(_id: u32, condition: bool, message: &str, _context: Option<&str>) {
    if !condition {
        panic!("Invariant failed: {}", message);
    }
}

#[cfg(feature = "ppt")]
/// Contract test: checks that specified invariants were asserted.
pub fn contract_test(test_name: &str, required_invariants: &[u32]) {
    let missing: Vec<u32> = {
        let log = INVARIANT_LOG.lock().unwrap_or_else(|e| e.into_inner());
        required_invariants
            .iter()
            .copied()
            .filter(|inv| !log.contains(inv))
            .collect()
    };
    if !missing.is_empty() {
        panic!(
            "Contract test '{}' failed: invariants not enforced: {:?}",
            test_name,
            missing.iter().map(|&id| invariant_name(id)).collect::<Vec<_>>()
        );
    }
}

#[cfg(not(feature = "ppt"))]
/// Contract test: no-op when PPT feature is disabled.
pub fn contract_test(_test_name: &str, _required_invariants: &[u32]) {}

#[cfg(feature = "ppt")]
/// Clear invariant log (for between test runs).
pub fn clear_invariant_log() {
    INVARIANT_LOG
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clear();
}

#[cfg(not(feature = "ppt"))]
/// Clear invariant log: no-op when PPT feature is disabled.
pub fn clear_invariant_log() {}

/// Maps invariant ID to human-readable name (for diagnostics only).
pub const fn invariant_name(id: u32) -> &'static str {
    match id {
        CONFIG_VALIDATED => "CONFIG_VALIDATED",
        CATALOG_COLD_START => "CATALOG_COLD_START",
        BAR_IN_RANGE => "BAR_IN_RANGE",
        SLICE_REST_RESPECTED => "SLICE_REST_RESPECTED",
        BRANCH_REST_RESPECTED => "BRANCH_REST_RESPECTED",
        LOOP_LIMIT_BOUND => "LOOP_LIMIT_BOUND",
        OUTPUT_MONOTONIC => "OUTPUT_MONOTONIC",
        TERMINATION_BOUND => "TERMINATION_BOUND",
        SLICE_PLAY_RECORDED => "SLICE_PLAY_RECORDED",
        _ => "UNKNOWN",
    }
}
