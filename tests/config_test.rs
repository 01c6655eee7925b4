// ==========================================
// 合规配置集成测试
// ==========================================

mod helpers;

use helpers::{d, dates_from, SnapshotBuilder};
use residency_compliance::{
    ComplianceConfig, ComplianceOrchestrator, ConstraintManager, ConstraintType, CoreError,
    DayPeriod, FindingType,
};
use std::sync::Arc;

#[test]
fn test_partial_json_keeps_defaults() {
    let config = ComplianceConfig::from_json_str(
        r#"{ "work_hours": { "weekly_hour_ceiling": 60.0, "warning_tiers": [55.0] },
             "call": { "max_consecutive_calls": 1 } }"#,
    )
    .unwrap();

    assert_eq!(config.work_hours.weekly_hour_ceiling, 60.0);
    assert_eq!(config.work_hours.rolling_window_days, 28);
    assert_eq!(config.work_hours.min_rest_hours, 10.0);
    assert_eq!(config.call.max_consecutive_calls, 1);
    assert_eq!(config.call.max_calls_per_window, 9);
    assert_eq!(config.leave.medical_blocking_after_days, 7);
    assert_eq!(config.rotation.min_rotation_days, 7);
}

#[test]
fn test_json_round_trip() {
    let mut config = ComplianceConfig::default();
    config
        .solver
        .weight_overrides
        .insert(ConstraintType::BlockPreference, 5.0);

    let raw = serde_json::to_string_pretty(&config).unwrap();
    assert!(raw.contains("BLOCK_PREFERENCE"));
    let parsed = ComplianceConfig::from_json_str(&raw).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_invalid_values_rejected() {
    let err = ComplianceConfig::from_json_str(r#"{ "work_hours": { "rolling_window_days": 30 } }"#)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig { ref key, .. } if key == "work_hours.rolling_window_days"));

    let err = ComplianceConfig::from_json_str(r#"{ "rotation": { "academic_year_start_month": 13 } }"#)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidConfig { .. }));

    let err = ComplianceConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, CoreError::ConfigParse(_)));
}

#[test]
fn test_weight_override_breaking_hierarchy_fails_registry() {
    let config = ComplianceConfig::from_json_str(
        r#"{ "solver": { "weight_overrides": { "CALL_WEEKDAY_BALANCE": 2000.0 } } }"#,
    )
    .unwrap();
    assert!(matches!(
        ConstraintManager::create_default(&config.solver),
        Err(CoreError::WeightHierarchyViolation { .. })
    ));
}

#[test]
fn test_lower_ceiling_changes_review_outcome() {
    // 每日上午 8 h => 56 h/周
    let start = d(2025, 9, 1);
    let mut builder = SnapshotBuilder::new(start)
        .resident("R1", 2)
        .faculty("F1")
        .clinic();
    for date in dates_from(start, 28) {
        builder = builder.staffed("R1", "F1", date, DayPeriod::Am, "CLINIC");
    }
    let snapshot = builder.build();
    let period = snapshot.block_span().unwrap();

    let default_report = ComplianceOrchestrator::new(Arc::new(ComplianceConfig::default()))
        .validate_complete_schedule(&period, &snapshot)
        .unwrap();
    assert!(!default_report
        .result_for("R1")
        .unwrap()
        .has_finding(FindingType::RollingAverageExceeded));

    let strict = ComplianceConfig::from_json_str(
        r#"{ "work_hours": { "weekly_hour_ceiling": 50.0, "warning_tiers": [45.0] } }"#,
    )
    .unwrap();
    let strict_report = ComplianceOrchestrator::new(Arc::new(strict))
        .validate_complete_schedule(&period, &snapshot)
        .unwrap();
    assert!(strict_report
        .result_for("R1")
        .unwrap()
        .has_finding(FindingType::RollingAverageExceeded));
}
