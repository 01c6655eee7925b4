// ==========================================
// 求解器集成测试
// ==========================================
// 场景: 快照 + 需求 -> 求解 -> 结果回填 -> 合规复核
// ==========================================

mod helpers;

use helpers::{block_id, d, dates_from, SnapshotBuilder};
use residency_compliance::constraint::ConstraintProfile;
use residency_compliance::engine::{CallDemand, SlotDemand};
use residency_compliance::{
    AbsenceType, ComplianceConfig, ComplianceOrchestrator, ConstraintManager, ConstraintType,
    CoreError, DayPeriod, Deadline, FindingType, ScheduleSnapshot, ScheduleSolver, SolveProblem,
    SolveStatus, SolverStrategy,
};
use residency_compliance::domain::Absence;
use std::sync::Arc;

fn config() -> Arc<ComplianceConfig> {
    Arc::new(ComplianceConfig::default())
}

/// 一周上午门诊需求, 每块 1 名住院医师 + 1 名带教
fn weekly_clinic_problem(snapshot: ScheduleSnapshot) -> SolveProblem {
    let mut problem = SolveProblem::new(snapshot);
    for date in dates_from(d(2025, 9, 1), 7) {
        let id = block_id(date, DayPeriod::Am);
        problem = problem
            .with_demand(SlotDemand::primary(&id, Some("CLINIC"), 1))
            .with_demand(SlotDemand::supervising(&id, Some("CLINIC"), 1));
    }
    problem
}

fn one_resident_week() -> ScheduleSnapshot {
    SnapshotBuilder::new(d(2025, 9, 1))
        .resident("R1", 2)
        .faculty("F1")
        .clinic()
        .daily_blocks(d(2025, 9, 1), 7, DayPeriod::Am)
        .build()
}

/// 求解结果回填快照
fn apply(mut snapshot: ScheduleSnapshot, result: &residency_compliance::SolveResult) -> ScheduleSnapshot {
    snapshot
        .assignments
        .extend(result.candidate.assignments.iter().cloned());
    for call in &result.candidate.calls {
        snapshot
            .call_dates
            .entry(call.person_id.clone())
            .or_default()
            .push(call.call_date);
    }
    snapshot
}

#[test]
fn test_solved_schedule_passes_compliance_review() {
    let snapshot = one_resident_week();
    let problem = weekly_clinic_problem(snapshot.clone());
    let registry = ConstraintManager::create_default(&config().solver).unwrap();
    let solver = ScheduleSolver::new(config());

    for strategy in SolverStrategy::ALL {
        let result = solver
            .solve(strategy, &problem, &registry, Deadline::unbounded())
            .unwrap();
        assert_eq!(result.status, SolveStatus::Complete, "{}", strategy);
        assert_eq!(result.candidate.assignments.len(), 14);

        let solved = apply(snapshot.clone(), &result);
        let period = solved.block_span().unwrap();
        let report = ComplianceOrchestrator::new(config())
            .validate_complete_schedule(&period, &solved)
            .unwrap();
        assert_eq!(report.total_violations(), 0, "{}: {:?}", strategy, report.remediation);
    }
}

#[test]
fn test_resilience_registry_solves_same_problem() {
    let problem = weekly_clinic_problem(one_resident_week());
    let registry = ConstraintManager::create_resilience_aware(&config().solver).unwrap();
    assert_eq!(registry.profile(), ConstraintProfile::Resilience);
    assert!(registry.contains(ConstraintType::ResilienceN1Coverage));

    let result = ScheduleSolver::new(config())
        .solve(SolverStrategy::Greedy, &problem, &registry, Deadline::unbounded())
        .unwrap();
    assert!(result.feasible);
    assert_eq!(result.score.hard_violations, 0);
}

#[test]
fn test_blocking_absence_respected_by_solver() {
    let snapshot = SnapshotBuilder::new(d(2025, 9, 1))
        .resident("R1", 2)
        .resident("R2", 2)
        .faculty("F1")
        .clinic()
        .daily_blocks(d(2025, 9, 1), 7, DayPeriod::Am)
        .absence(Absence::new("R1", AbsenceType::Deployment, d(2025, 9, 1), d(2025, 9, 30)))
        .build();
    let problem = weekly_clinic_problem(snapshot);
    let registry = ConstraintManager::create_default(&config().solver).unwrap();

    let result = ScheduleSolver::new(config())
        .solve(SolverStrategy::Exact, &problem, &registry, Deadline::unbounded())
        .unwrap();

    assert!(result.is_complete());
    assert!(result
        .candidate
        .assignments
        .iter()
        .all(|a| a.person_id != "R1"));
}

#[test]
fn test_call_demands_are_filled_and_spread() {
    let start = d(2025, 9, 1);
    let mut builder = SnapshotBuilder::new(start)
        .resident("R1", 2)
        .resident("R2", 2)
        .resident("R3", 2)
        .faculty("F1")
        .clinic()
        .block(start, DayPeriod::Am);
    builder = builder.supervise("F1", start, DayPeriod::Am, "CLINIC");
    let snapshot = builder.build();

    let mut problem = SolveProblem::new(snapshot)
        .with_demand(SlotDemand::primary(&block_id(start, DayPeriod::Am), Some("CLINIC"), 1));
    for date in dates_from(start, 6) {
        problem = problem.with_call_demand(CallDemand::new(date, 1));
    }
    let registry = ConstraintManager::create_default(&config().solver).unwrap();

    let result = ScheduleSolver::new(config())
        .solve(SolverStrategy::Greedy, &problem, &registry, Deadline::unbounded())
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.candidate.calls.len(), 6);
    // 任何人不得连续三晚值班
    for person in ["R1", "R2", "R3"] {
        let mut nights: Vec<_> = result
            .candidate
            .calls
            .iter()
            .filter(|c| c.person_id == person)
            .map(|c| c.call_date)
            .collect();
        nights.sort();
        for run in nights.windows(3) {
            assert!((run[2] - run[0]).num_days() > 2, "{} {:?}", person, nights);
        }
    }
}

#[test]
fn test_tight_call_rota_survives_review() {
    // 三名住院医师六晚值班, 每人窗口内至多两次 => 恰好每人两晚
    let mut tight = ComplianceConfig::default();
    tight.call.max_calls_per_window = 2;
    let tight = Arc::new(tight);

    let start = d(2025, 9, 1);
    let snapshot = SnapshotBuilder::new(start)
        .resident("R1", 2)
        .resident("R2", 2)
        .resident("R3", 2)
        .faculty("F1")
        .clinic()
        .daily_blocks(start, 6, DayPeriod::Am)
        .build();
    let mut problem = SolveProblem::new(snapshot.clone());
    for date in dates_from(start, 6) {
        let id = block_id(date, DayPeriod::Am);
        problem = problem
            .with_demand(SlotDemand::primary(&id, Some("CLINIC"), 1))
            .with_demand(SlotDemand::supervising(&id, Some("CLINIC"), 1))
            .with_call_demand(CallDemand::new(date, 1));
    }
    let registry = ConstraintManager::create_default(&tight.solver).unwrap();

    let result = ScheduleSolver::new(tight.clone())
        .solve(SolverStrategy::Greedy, &problem, &registry, Deadline::unbounded())
        .unwrap();
    assert!(result.is_complete(), "{:?}", result.status);
    for person in ["R1", "R2", "R3"] {
        let nights = result.candidate.calls.iter().filter(|c| c.person_id == person).count();
        assert_eq!(nights, 2, "{}", person);
    }

    let solved = apply(snapshot, &result);
    let period = solved.block_span().unwrap();
    let report = ComplianceOrchestrator::new(tight)
        .validate_complete_schedule(&period, &solved)
        .unwrap();
    for rule in [
        FindingType::PostCallRestViolation,
        FindingType::ConsecutiveCallExceeded,
        FindingType::CallFrequencyExceeded,
    ] {
        assert_eq!(report.all_findings().filter(|f| f.finding_type == rule).count(), 0, "{:?}", rule);
    }
}

#[test]
fn test_recovery_window_respected_by_solver_and_review() {
    let snapshot = SnapshotBuilder::new(d(2025, 9, 1))
        .resident("R1", 2)
        .resident("R2", 2)
        .faculty("F1")
        .clinic()
        .daily_blocks(d(2025, 9, 1), 7, DayPeriod::Am)
        .absence(Absence::new("R1", AbsenceType::Deployment, d(2025, 8, 1), d(2025, 8, 31)))
        .build();
    let problem = weekly_clinic_problem(snapshot.clone());
    let registry = ConstraintManager::create_default(&config().solver).unwrap();

    for strategy in [SolverStrategy::Exact, SolverStrategy::Greedy] {
        let result = ScheduleSolver::new(config())
            .solve(strategy, &problem, &registry, Deadline::unbounded())
            .unwrap();
        assert!(result.is_complete(), "{}: {:?}", strategy, result.status);
        assert!(result.candidate.assignments.iter().all(|a| a.person_id != "R1"));

        let solved = apply(snapshot.clone(), &result);
        let period = solved.block_span().unwrap();
        let report = ComplianceOrchestrator::new(config())
            .validate_complete_schedule(&period, &solved)
            .unwrap();
        let r1 = report.result_for("R1").unwrap();
        assert!(!r1.has_finding(FindingType::PostDeploymentRecovery));
        assert!(!r1.has_finding(FindingType::BlockingAbsenceConflict));
    }
}

#[test]
fn test_best_of_prefers_feasible_result() {
    let problem = weekly_clinic_problem(one_resident_week());
    let registry = ConstraintManager::create_default(&config().solver).unwrap();

    let result = ScheduleSolver::new(config())
        .solve_best_of(
            &[SolverStrategy::Greedy, SolverStrategy::Relaxation],
            &problem,
            &registry,
            Deadline::unbounded(),
        )
        .unwrap();
    assert!(result.feasible);
    assert!(!result.run_id.is_empty());
}

#[test]
fn test_faculty_only_pool_is_rejected() {
    let snapshot = SnapshotBuilder::new(d(2025, 9, 1))
        .clinic()
        .daily_blocks(d(2025, 9, 1), 7, DayPeriod::Am)
        .build();
    let problem = weekly_clinic_problem(snapshot);
    let registry = ConstraintManager::create_default(&config().solver).unwrap();

    let err = ScheduleSolver::new(config())
        .solve(SolverStrategy::Greedy, &problem, &registry, Deadline::unbounded())
        .unwrap_err();
    assert!(matches!(err, CoreError::EmptyPersonPool { .. }));
}
