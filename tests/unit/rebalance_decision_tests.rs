//! Rebalance Decision Tests
//!
//! Tests the borrow-limit band with hysteresis:
//! - Add below `limit * min`, up to `limit * target`
//! - Remove above `limit * max`, proportionally back to target
//! - Hold anywhere inside the band, bounds included
//! - Preserve share shrinks the usable limit

use alloy_primitives::U256;
use lbf_operator::constants::WAD;
use lbf_operator::strategy::reader::LendingPosition;
use lbf_operator::strategy::{decide, BorrowThresholds, RebalanceDecision};
use lbf_operator::testing::fixtures;

fn usd(n: u64) -> U256 {
    U256::from(n) * WAD
}

fn position(borrowed: u64, limit: u64) -> LendingPosition {
    LendingPosition {
        supplied_usd: usd(limit * 2),
        borrowed_usd: usd(borrowed),
        borrow_limit_usd: usd(limit),
    }
}

fn thresholds() -> BorrowThresholds {
    // 0.88 / 0.92 / 0.96
    BorrowThresholds::from_settings(&fixtures::lbf_settings())
}

#[test]
fn test_thresholds_from_settings() {
    let t = thresholds();
    assert_eq!(t.min, U256::from(880_000_000_000_000_000u64));
    assert_eq!(t.target, U256::from(920_000_000_000_000_000u64));
    assert_eq!(t.max, U256::from(960_000_000_000_000_000u64));
}

#[test]
fn test_hold_strictly_inside_band() {
    for borrowed in [881, 900, 920, 959] {
        assert_eq!(
            decide(&position(borrowed, 1000), &thresholds(), U256::ZERO),
            RebalanceDecision::Hold,
            "borrowed {} should hold",
            borrowed
        );
    }
}

#[test]
fn test_hold_on_band_edges() {
    assert_eq!(
        decide(&position(880, 1000), &thresholds(), U256::ZERO),
        RebalanceDecision::Hold
    );
    assert_eq!(
        decide(&position(960, 1000), &thresholds(), U256::ZERO),
        RebalanceDecision::Hold
    );
}

#[test]
fn test_add_up_to_target() {
    assert_eq!(
        decide(&position(879, 1000), &thresholds(), U256::ZERO),
        RebalanceDecision::Add {
            liquidity_usd: usd(41)
        }
    );
}

#[test]
fn test_add_from_nothing_borrowed() {
    assert_eq!(
        decide(&position(0, 1000), &thresholds(), U256::ZERO),
        RebalanceDecision::Add {
            liquidity_usd: usd(920)
        }
    );
}

#[test]
fn test_remove_back_to_target() {
    // (1000 - 920) / 1000 = 8%
    assert_eq!(
        decide(&position(1000, 1000), &thresholds(), U256::ZERO),
        RebalanceDecision::Remove {
            destruct_percentage: U256::from(80_000_000_000_000_000u64)
        }
    );
}

#[test]
fn test_remove_never_exceeds_everything() {
    let empty_limit = position(100, 0);
    match decide(&empty_limit, &thresholds(), U256::ZERO) {
        RebalanceDecision::Remove {
            destruct_percentage,
        } => assert_eq!(destruct_percentage, WAD),
        other => panic!("expected remove, got {:?}", other),
    }
}

#[test]
fn test_preserve_shrinks_usable_limit() {
    // Half the limit preserved: usable 500, band 440..480
    let preserve = WAD / U256::from(2u64);
    assert!(matches!(
        decide(&position(500, 1000), &thresholds(), preserve),
        RebalanceDecision::Remove { .. }
    ));
    assert_eq!(
        decide(&position(450, 1000), &thresholds(), preserve),
        RebalanceDecision::Hold
    );
}
