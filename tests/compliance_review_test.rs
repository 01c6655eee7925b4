// ==========================================
// 合规编排器集成测试
// ==========================================
// 场景: 完整排班 -> 五大领域校验 -> 报告/看板
// ==========================================

mod helpers;

use helpers::{block_id, d, dates_from, SnapshotBuilder};
use residency_compliance::domain::{Absence, Assignment, RotationTemplate};
use residency_compliance::config::ProcedureTarget;
use residency_compliance::{
    AbsenceType, ComplianceConfig, ComplianceDomain, ComplianceOrchestrator, DayPeriod,
    FindingType, RotationCategory, ScheduleSnapshot, SchedulePeriod, Severity,
};
use residency_compliance::engine::ReportStatus;
use std::sync::Arc;

fn orchestrator() -> ComplianceOrchestrator {
    ComplianceOrchestrator::new(Arc::new(ComplianceConfig::default()))
}

/// 四周门诊: R1/R2 每日上午门诊, F1 带教
fn four_week_clinic() -> SnapshotBuilder {
    let start = d(2025, 9, 1);
    let mut builder = SnapshotBuilder::new(start)
        .resident("R1", 2)
        .resident("R2", 2)
        .faculty("F1")
        .clinic();
    for date in dates_from(start, 28) {
        builder = builder
            .staffed("R1", "F1", date, DayPeriod::Am, "CLINIC")
            .primary("R2", date, DayPeriod::Am, "CLINIC");
    }
    builder
}

fn review(snapshot: &ScheduleSnapshot) -> residency_compliance::ScheduleValidationReport {
    let period = snapshot.block_span().unwrap();
    orchestrator()
        .validate_complete_schedule(&period, snapshot)
        .unwrap()
}

#[test]
fn test_compliant_four_week_schedule_has_no_blocking_findings() {
    let snapshot = four_week_clinic().build();
    let report = review(&snapshot);

    assert_eq!(report.status, ReportStatus::Compliant);
    assert_eq!(report.compliance_percentage, 100.0);
    assert_eq!(report.count_severity(Severity::Critical), 0);
    assert_eq!(report.count_severity(Severity::High), 0);
    assert!(report.pool_findings.is_empty());
    assert_eq!(report.supervision_compliance_percentage, 100.0);
}

#[test]
fn test_rolling_average_boundary_through_moonlighting() {
    // 院内 28 * 8 = 224 h, 院外 96 h => 恰好 80 h/周
    let mut at_ceiling = four_week_clinic();
    for date in dates_from(d(2025, 9, 1), 12) {
        at_ceiling = at_ceiling.moonlighting("R1", date, 8.0);
    }
    let report = review(&at_ceiling.clone_snapshot());
    let r1 = report.result_for("R1").unwrap();
    assert!(!r1.has_finding(FindingType::RollingAverageExceeded));
    assert_eq!(r1.violations_in(ComplianceDomain::WorkHours), 0);

    // 再加 0.4 h => 80.1 h/周
    let over = at_ceiling.moonlighting("R1", d(2025, 9, 20), 0.4).build();
    let report = review(&over);
    let r1 = report.result_for("R1").unwrap();
    let finding = r1
        .findings
        .iter()
        .find(|f| f.finding_type == FindingType::RollingAverageExceeded)
        .unwrap();
    assert_eq!(finding.severity, Severity::Critical);
    assert_eq!(finding.evidence.window_start, Some(d(2025, 9, 1)));
    assert_eq!(finding.evidence.window_end, Some(d(2025, 9, 28)));
    assert!(!r1.is_compliant);
    assert_eq!(report.status, ReportStatus::NonCompliant);
    // R2 不受影响
    assert!(report.result_for("R2").unwrap().is_compliant);
}

#[test]
fn test_third_consecutive_call_is_flagged() {
    let snapshot = four_week_clinic()
        .call("R2", d(2025, 9, 10))
        .call("R2", d(2025, 9, 11))
        .call("R2", d(2025, 9, 12))
        .build();
    let report = review(&snapshot);

    let r2 = report.result_for("R2").unwrap();
    assert!(r2.has_finding(FindingType::ConsecutiveCallExceeded));
    assert!(r2.violations_in(ComplianceDomain::Call) >= 1);
    assert!(!report.result_for("R1").unwrap().has_finding(FindingType::ConsecutiveCallExceeded));
}

#[test]
fn test_medical_leave_blocks_only_past_seven_days() {
    let seven_days = four_week_clinic()
        .absence(Absence::new("R2", AbsenceType::Medical, d(2025, 9, 8), d(2025, 9, 14)))
        .build();
    let report = review(&seven_days);
    assert!(!report
        .result_for("R2")
        .unwrap()
        .has_finding(FindingType::BlockingAbsenceConflict));

    let eight_days = four_week_clinic()
        .absence(Absence::new("R2", AbsenceType::Medical, d(2025, 9, 8), d(2025, 9, 15)))
        .build();
    let report = review(&eight_days);
    let r2 = report.result_for("R2").unwrap();
    let conflict = r2
        .findings
        .iter()
        .find(|f| f.finding_type == FindingType::BlockingAbsenceConflict)
        .unwrap();
    assert_eq!(conflict.severity, Severity::Critical);
    assert_eq!(conflict.evidence.dates.len(), 8);
    assert_eq!(r2.violations_in(ComplianceDomain::Leave), 1);
}

#[test]
fn test_faculty_deployment_conflict_lands_in_pool() {
    let snapshot = four_week_clinic()
        .absence(Absence::new("F1", AbsenceType::Deployment, d(2025, 9, 3), d(2025, 9, 5)))
        .build();
    let report = review(&snapshot);

    let conflict = report
        .pool_findings
        .iter()
        .find(|f| f.finding_type == FindingType::BlockingAbsenceConflict)
        .unwrap();
    assert_eq!(conflict.person_id.as_deref(), Some("F1"));
    assert_eq!(conflict.evidence.dates.len(), 3);
    assert_eq!(report.status, ReportStatus::NonCompliant);
    assert!(report.violations_by_domain[&ComplianceDomain::Leave] >= 1);
    // 带教的缺勤不计入住院医师个人结果
    assert!(report.result_for("R2").unwrap().is_compliant);
}

#[test]
fn test_faculty_consecutive_calls_land_in_pool() {
    let snapshot = four_week_clinic()
        .call("F1", d(2025, 9, 10))
        .call("F1", d(2025, 9, 11))
        .call("F1", d(2025, 9, 12))
        .build();
    let report = review(&snapshot);

    assert!(report.pool_findings.iter().any(|f| {
        f.finding_type == FindingType::ConsecutiveCallExceeded && f.person_id.as_deref() == Some("F1")
    }));
    assert!(report.violations_by_domain[&ComplianceDomain::Call] >= 1);
    assert!(!report.result_for("R1").unwrap().has_finding(FindingType::ConsecutiveCallExceeded));
}

#[test]
fn test_procedure_target_unmet_after_reviewed_year_ends() {
    // 复核六月排班, 快照日期已进入新学年
    let mut config = ComplianceConfig::default();
    config.rotation.procedure_targets = vec![ProcedureTarget {
        pgy_level: 1,
        procedure_code: "LP".to_string(),
        annual_target: 10,
    }];
    let june_10 = d(2025, 6, 10);
    let mut lumbar_puncture = Assignment::primary("R1", &block_id(june_10, DayPeriod::Am), Some("CLINIC"));
    lumbar_puncture.procedure_code = Some("LP".to_string());
    let snapshot = SnapshotBuilder::new(d(2025, 7, 5))
        .resident("R1", 1)
        .faculty("F1")
        .clinic()
        .block(june_10, DayPeriod::Am)
        .assign(lumbar_puncture)
        .supervise("F1", june_10, DayPeriod::Am, "CLINIC")
        .build();

    let report = ComplianceOrchestrator::new(Arc::new(config))
        .validate_complete_schedule(&SchedulePeriod::new(d(2025, 6, 1), d(2025, 6, 30)), &snapshot)
        .unwrap();

    let unmet = report
        .result_for("R1")
        .unwrap()
        .findings
        .iter()
        .find(|f| f.finding_type == FindingType::ProcedureVolumeUnmet)
        .unwrap();
    assert_eq!(unmet.severity, Severity::High);
    assert_eq!(unmet.evidence.count, Some(1));
    assert_eq!(unmet.evidence.window_end, Some(d(2025, 6, 30)));
}

#[test]
fn test_short_rotation_block_inside_horizon() {
    let start = d(2025, 9, 1);
    let mut builder = four_week_clinic()
        .resident("R3", 2)
        .resident("R4", 2)
        .rotation(RotationTemplate::new("WARD", RotationCategory::Inpatient, 8.0));
    // R3 五天病房, R4 七天病房, 均不触及快照边界
    for date in dates_from(start + chrono::Duration::days(7), 5) {
        builder = builder.primary("R3", date, DayPeriod::Am, "WARD");
    }
    for date in dates_from(start + chrono::Duration::days(7), 7) {
        builder = builder.primary("R4", date, DayPeriod::Am, "WARD");
    }
    let report = review(&builder.build());

    let r3 = report.result_for("R3").unwrap();
    let short = r3
        .findings
        .iter()
        .find(|f| f.finding_type == FindingType::RotationTooShort)
        .unwrap();
    assert_eq!(short.evidence.measured, Some(5.0));
    assert!(!report
        .result_for("R4")
        .unwrap()
        .has_finding(FindingType::RotationTooShort));
}

#[test]
fn test_adding_faculty_never_increases_supervision_findings() {
    let start = d(2025, 9, 1);
    let mut thin = SnapshotBuilder::new(start)
        .resident("R1", 1)
        .resident("R2", 1)
        .resident("R3", 1)
        .faculty("F1")
        .faculty("F2")
        .clinic();
    for id in ["R1", "R2", "R3"] {
        thin = thin.primary(id, start, DayPeriod::Am, "CLINIC");
    }
    thin = thin.supervise("F1", start, DayPeriod::Am, "CLINIC");

    let before = review(&thin.clone_snapshot());
    let after = review(&thin.supervise("F2", start, DayPeriod::Am, "CLINIC").build());

    let deficits = |report: &residency_compliance::ScheduleValidationReport| {
        report
            .all_findings()
            .filter(|f| f.finding_type == FindingType::SupervisionDeficit)
            .count()
    };
    assert_eq!(deficits(&before), 3);
    assert_eq!(deficits(&after), 0);
    assert!(after.supervision_compliance_percentage >= before.supervision_compliance_percentage);
}

#[test]
fn test_single_assignment_against_full_schedule() {
    let snapshot = four_week_clinic()
        .block(d(2025, 9, 29), DayPeriod::Am)
        .call("R2", d(2025, 9, 28))
        .build();
    let orchestrator = orchestrator();

    // R1 次日上午门诊: 带教缺口仅作提示
    let ok = orchestrator
        .validate_single_assignment(
            &Assignment::primary("R1", &block_id(d(2025, 9, 29), DayPeriod::Am), Some("CLINIC")),
            &snapshot,
        )
        .unwrap();
    assert!(ok.accepted, "{:?}", ok.reasons);

    // R2 前夜值班, 次日上午门诊被拒
    let rejected = orchestrator
        .validate_single_assignment(
            &Assignment::primary("R2", &block_id(d(2025, 9, 29), DayPeriod::Am), Some("CLINIC")),
            &snapshot,
        )
        .unwrap();
    assert!(!rejected.accepted);
    let (accepted, reasons): (bool, Vec<String>) = rejected.into();
    assert!(!accepted);
    assert!(!reasons.is_empty());
}

#[test]
fn test_dashboard_reflects_report() {
    let snapshot = four_week_clinic()
        .absence(Absence::new("R2", AbsenceType::Deployment, d(2025, 9, 8), d(2025, 9, 12)))
        .build();
    let orchestrator = orchestrator();
    let report = review(&snapshot);
    let dashboard = orchestrator.generate_dashboard_data(&report);

    assert_eq!(dashboard.headline.total_residents, 2);
    assert_eq!(dashboard.headline.compliant_residents, 1);
    assert_eq!(dashboard.top_residents.len(), 1);
    assert_eq!(dashboard.top_residents[0].person_id, "R2");
    assert_eq!(dashboard.top_residents[0].worst_severity, Some(Severity::Critical));

    let leave_tile = dashboard
        .domain_tiles
        .iter()
        .find(|t| t.domain == ComplianceDomain::Leave)
        .unwrap();
    assert_eq!(leave_tile.residents_affected, 1);

    let json = serde_json::to_string(&dashboard).unwrap();
    assert!(json.contains("BLOCKING_ABSENCE_CONFLICT"));
}

#[tokio::test]
async fn test_parallel_review_matches_sequential() {
    let snapshot = four_week_clinic()
        .call("R2", d(2025, 9, 10))
        .call("R2", d(2025, 9, 11))
        .call("R2", d(2025, 9, 12))
        .absence(Absence::new("R1", AbsenceType::Sick, d(2025, 9, 3), d(2025, 9, 7)))
        .build();
    let period = snapshot.block_span().unwrap();
    let orchestrator = orchestrator();

    let sequential = orchestrator
        .validate_complete_schedule(&period, &snapshot)
        .unwrap();
    let parallel = orchestrator
        .validate_complete_schedule_parallel(period, Arc::new(snapshot))
        .await
        .unwrap();

    assert_eq!(sequential, parallel);
}
