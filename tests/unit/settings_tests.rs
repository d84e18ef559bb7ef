//! Strategy Settings Tests
//!
//! Tests settings validation and the per-kind accessors:
//! - Borrow limit ordering and farm percentage sum
//! - Preserve tier lookup by storage TVL
//! - Autostart, timeout and cron switches
//! - Tagged serialization of the settings variant

use lbf_operator::error::AppError;
use lbf_operator::models::{
    CronCheck, OperationType, PreserveTier, StrategyKind, StrategySettings,
};
use lbf_operator::testing::fixtures::{self, dec};

#[test]
fn test_default_fixtures_are_valid() {
    let farms = vec![fixtures::farm(1)];
    assert!(StrategySettings::Lbf(fixtures::lbf_settings())
        .validate(&farms)
        .is_ok());
    assert!(StrategySettings::Lbl(fixtures::lbl_settings())
        .validate(&[])
        .is_ok());
}

#[test]
fn test_unordered_borrow_limits_rejected() {
    let mut settings = fixtures::lbf_settings();
    settings.borrow_limit_percentage_min = dec("0.95");

    let err = StrategySettings::Lbf(settings).validate(&[]).unwrap_err();
    assert!(matches!(err, AppError::SettingsInvalid(_)));
    assert!(err.is_policy_violation());
}

#[test]
fn test_zero_timeout_rejected() {
    let mut settings = fixtures::lbf_settings();
    settings.common.claim_timeout_ms = 0;
    assert!(StrategySettings::Lbf(settings).validate(&[]).is_err());
}

#[test]
fn test_farm_percentages_above_one_rejected() {
    let mut second = fixtures::farm(1);
    second.id = 2;
    second.percentage = dec("0.5");

    let result = StrategySettings::Lbf(fixtures::lbf_settings())
        .validate(&[fixtures::farm(1), second]);
    assert!(matches!(result, Err(AppError::SettingsInvalid(_))));
}

#[test]
fn test_lending_only_strategy_rejects_active_farms() {
    let result = StrategySettings::Lbl(fixtures::lbl_settings()).validate(&[fixtures::farm(1)]);
    assert!(matches!(result, Err(AppError::SettingsInvalid(_))));
}

#[test]
fn test_unsorted_preserve_tiers_rejected() {
    let mut settings = fixtures::lbf_settings();
    settings.preserve_tiers = vec![
        PreserveTier {
            min_storage_usd: dec("1000"),
            preserve_percent: dec("0.1"),
        },
        PreserveTier {
            min_storage_usd: dec("500"),
            preserve_percent: dec("0.2"),
        },
    ];
    assert!(StrategySettings::Lbf(settings).validate(&[]).is_err());
}

#[test]
fn test_preserve_percent_picks_highest_reached_tier() {
    let mut settings = fixtures::lbf_settings();
    settings.preserve_tiers = vec![
        PreserveTier {
            min_storage_usd: dec("0"),
            preserve_percent: dec("0.05"),
        },
        PreserveTier {
            min_storage_usd: dec("10000"),
            preserve_percent: dec("0.1"),
        },
        PreserveTier {
            min_storage_usd: dec("100000"),
            preserve_percent: dec("0.2"),
        },
    ];

    assert_eq!(settings.preserve_percent(dec("500")), dec("0.05"));
    assert_eq!(settings.preserve_percent(dec("10000")), dec("0.1"));
    assert_eq!(settings.preserve_percent(dec("250000")), dec("0.2"));
}

#[test]
fn test_autostart_and_timeouts_follow_common_settings() {
    let mut lbf = fixtures::lbf_settings();
    lbf.common.is_claim_autostart = true;
    lbf.common.claim_timeout_ms = 5_000;
    let settings = StrategySettings::Lbf(lbf);

    assert!(settings.autostart(OperationType::ClaimRun));
    assert!(!settings.autostart(OperationType::StrategyRun));
    assert!(!settings.autostart(OperationType::WithdrawAllToStorage));
    assert_eq!(settings.timeout_ms(OperationType::ClaimRun), 5_000);
    assert!(!settings.cron_enabled(CronCheck::AdminBalance));
}

#[test]
fn test_settings_serialize_with_kind_tag() {
    let settings = StrategySettings::Lbl(fixtures::lbl_settings());
    let encoded = serde_json::to_value(&settings).unwrap();
    assert_eq!(encoded["kind"], "LBL");

    let decoded: StrategySettings = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded.kind(), StrategyKind::Lbl);
    assert_eq!(decoded, settings);
}
