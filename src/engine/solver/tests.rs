use super::*;
use crate::constraint::ConstraintManager;
use crate::domain::absence::Absence;
use crate::domain::person::Person;
use crate::domain::schedule::{Assignment, RotationTemplate, TimeBlock};
use crate::domain::snapshot::ScheduleSnapshot;
use crate::domain::types::{AbsenceType, AssignmentRole, DayPeriod, FindingType, RotationCategory};
use chrono::NaiveDate;
use std::time::Duration;

// ==========================================
// 测试辅助函数
// ==========================================

fn d(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, day).unwrap()
}

fn base_snapshot() -> ScheduleSnapshot {
    let mut snapshot = ScheduleSnapshot::new(d(1));
    snapshot.people = vec![
        Person::resident("R1", "Resident One", 2),
        Person::resident("R2", "Resident Two", 2),
        Person::faculty("F1", "Faculty One"),
    ];
    snapshot.blocks = vec![
        TimeBlock::new("B1", d(1), DayPeriod::Am),
        TimeBlock::new("B2", d(1), DayPeriod::Pm),
        TimeBlock::new("B3", d(2), DayPeriod::Am),
    ];
    snapshot.rotations = vec![RotationTemplate::new("CLINIC", RotationCategory::Clinic, 4.0)];
    snapshot
}

fn staffed_problem(snapshot: ScheduleSnapshot) -> SolveProblem {
    let mut problem = SolveProblem::new(snapshot);
    for block_id in ["B1", "B2", "B3"] {
        problem = problem
            .with_demand(SlotDemand::primary(block_id, Some("CLINIC"), 1))
            .with_demand(SlotDemand::supervising(block_id, Some("CLINIC"), 1));
    }
    problem
}

fn solver() -> ScheduleSolver {
    ScheduleSolver::new(Arc::new(ComplianceConfig::default()))
}

fn registry() -> ConstraintRegistry {
    ConstraintManager::create_default(&ComplianceConfig::default().solver).unwrap()
}

// ==========================================
// 正常求解
// ==========================================

#[test]
fn test_every_strategy_completes_small_problem() {
    let problem = staffed_problem(base_snapshot());
    let registry = registry();
    let solver = solver();

    for strategy in SolverStrategy::ALL {
        let result = solver
            .solve(strategy, &problem, &registry, Deadline::unbounded())
            .unwrap();
        assert!(result.is_complete(), "{} -> {:?}", strategy, result.status);
        assert!(result.feasible);
        assert!(!result.timed_out);
        assert_eq!(result.score.hard_violations, 0);
        assert_eq!(result.candidate.assignments.len(), 6);
        assert_eq!(result.strategy, strategy);
    }
}

#[test]
fn test_solution_contains_only_new_assignments() {
    let mut snapshot = base_snapshot();
    snapshot.assignments = vec![
        Assignment::primary("R1", "B3", Some("CLINIC")),
        Assignment::supervising("F1", "B3", Some("CLINIC")),
    ];
    let problem = SolveProblem::new(snapshot)
        .with_demand(SlotDemand::primary("B1", Some("CLINIC"), 1))
        .with_demand(SlotDemand::supervising("B1", Some("CLINIC"), 1));

    let result = solver()
        .solve(SolverStrategy::Greedy, &problem, &registry(), Deadline::unbounded())
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(result.candidate.assignments.len(), 2);
    assert!(result
        .candidate
        .assignments
        .iter()
        .all(|a| a.block_id == "B1"));
}

#[test]
fn test_greedy_is_deterministic_and_breaks_ties_by_person_id() {
    let problem = staffed_problem(base_snapshot());
    let registry = registry();
    let solver = solver();

    let first = solver
        .solve(SolverStrategy::Greedy, &problem, &registry, Deadline::unbounded())
        .unwrap();
    let second = solver
        .solve(SolverStrategy::Greedy, &problem, &registry, Deadline::unbounded())
        .unwrap();

    assert_eq!(first.candidate, second.candidate);
    // 首个槽位两名住院医师惩罚相同, 取 person_id 较小者
    assert!(first.candidate.assignments.iter().any(|a| {
        a.block_id == "B1" && a.person_id == "R1" && a.role == AssignmentRole::Primary
    }));
}

#[test]
fn test_solve_best_of_defaults_to_all_strategies() {
    let problem = staffed_problem(base_snapshot());
    let result = solver()
        .solve_best_of(&[], &problem, &registry(), Deadline::unbounded())
        .unwrap();

    assert!(result.feasible);
    assert!(result.is_complete());
}

// ==========================================
// 不可行 / 部分结果
// ==========================================

#[test]
fn test_all_candidates_on_blocking_absence_is_infeasible() {
    let mut snapshot = base_snapshot();
    for id in ["R1", "R2"] {
        snapshot.absences.insert(
            id.to_string(),
            vec![Absence::new(id, AbsenceType::Deployment, d(1), d(30))],
        );
    }
    let problem = staffed_problem(snapshot);

    for strategy in SolverStrategy::ALL {
        let result = solver()
            .solve(strategy, &problem, &registry(), Deadline::unbounded())
            .unwrap();
        match &result.status {
            SolveStatus::Infeasible {
                unfilled_slots,
                blocking,
            } => {
                assert_eq!(unfilled_slots.len(), 3);
                assert_eq!(blocking, &vec![ConstraintType::BlockingAbsence]);
            }
            other => panic!("{}: expected infeasible, got {:?}", strategy, other),
        }
        assert!(!result.feasible);
        assert_eq!(result.score, Score::worst());
    }
}

#[test]
fn test_exact_search_exhausted_reports_infeasible() {
    let mut snapshot = ScheduleSnapshot::new(d(1));
    snapshot.people = vec![Person::resident("R1", "Resident One", 2)];
    // 同日同时段两个时间块, 唯一住院医师无法同时承担
    snapshot.blocks = vec![
        TimeBlock::new("B1", d(1), DayPeriod::Am),
        TimeBlock::new("B2", d(1), DayPeriod::Am),
    ];
    let problem = SolveProblem::new(snapshot)
        .with_demand(SlotDemand::primary("B1", None, 1))
        .with_demand(SlotDemand::primary("B2", None, 1));

    let result = solver()
        .solve(SolverStrategy::Exact, &problem, &registry(), Deadline::unbounded())
        .unwrap();

    match &result.status {
        SolveStatus::Infeasible {
            unfilled_slots,
            blocking,
        } => {
            assert_eq!(unfilled_slots.len(), 2);
            assert!(blocking.contains(&ConstraintType::OnePrimaryPerBlock));
        }
        other => panic!("expected infeasible, got {:?}", other),
    }
    assert!(!result.timed_out);
}

#[test]
fn test_greedy_never_claims_infeasible_when_candidates_exist() {
    let mut snapshot = ScheduleSnapshot::new(d(1));
    snapshot.people = vec![Person::resident("R1", "Resident One", 2)];
    snapshot.blocks = vec![
        TimeBlock::new("B1", d(1), DayPeriod::Am),
        TimeBlock::new("B2", d(1), DayPeriod::Am),
    ];
    let problem = SolveProblem::new(snapshot)
        .with_demand(SlotDemand::primary("B1", None, 1))
        .with_demand(SlotDemand::primary("B2", None, 1));

    let result = solver()
        .solve(SolverStrategy::Greedy, &problem, &registry(), Deadline::unbounded())
        .unwrap();

    match &result.status {
        SolveStatus::Partial { unfilled_slots, .. } => assert_eq!(unfilled_slots.len(), 1),
        other => panic!("expected partial, got {:?}", other),
    }
    assert!(!result.feasible);
}

#[test]
fn test_expired_deadline_returns_partial_result() {
    let problem = staffed_problem(base_snapshot());
    let result = solver()
        .solve(
            SolverStrategy::Greedy,
            &problem,
            &registry(),
            Deadline::after(Duration::ZERO),
        )
        .unwrap();

    assert!(result.timed_out);
    assert!(!result.feasible);
    assert_eq!(result.status.as_str(), "PARTIAL");
}

// ==========================================
// 值班规则与派遣恢复期
// ==========================================

fn call_for(date: NaiveDate, person_id: &str) -> CallDemand {
    CallDemand {
        candidates: vec![person_id.to_string()],
        ..CallDemand::new(date, 1)
    }
}

#[test]
fn test_day_after_call_goes_to_rested_resident() {
    let problem = SolveProblem::new(base_snapshot())
        .with_call_demand(call_for(d(1), "R1"))
        .with_demand(SlotDemand::primary("B3", Some("CLINIC"), 1))
        .with_demand(SlotDemand::supervising("B3", Some("CLINIC"), 1));

    for strategy in SolverStrategy::ALL {
        let result = solver()
            .solve(strategy, &problem, &registry(), Deadline::unbounded())
            .unwrap();
        assert!(result.is_complete(), "{} -> {:?}", strategy, result.status);
        let primary = result
            .candidate
            .assignments
            .iter()
            .find(|a| a.role == AssignmentRole::Primary)
            .unwrap();
        assert_eq!(primary.person_id, "R2", "{}", strategy);
        assert!(result
            .findings
            .iter()
            .all(|f| f.finding_type != FindingType::PostCallRestViolation));
    }
}

#[test]
fn test_third_consecutive_call_is_never_complete() {
    let problem = SolveProblem::new(base_snapshot())
        .with_call_demand(call_for(d(1), "R1"))
        .with_call_demand(call_for(d(2), "R1"))
        .with_call_demand(call_for(d(3), "R1"));

    for strategy in SolverStrategy::ALL {
        let result = solver()
            .solve(strategy, &problem, &registry(), Deadline::unbounded())
            .unwrap();
        assert!(!result.feasible, "{}", strategy);
        assert!(!result.is_complete(), "{}", strategy);
        assert!(
            result.status.blocking().contains(&ConstraintType::CallConsecutiveLimit),
            "{} -> {:?}",
            strategy,
            result.status
        );
    }
}

#[test]
fn test_call_frequency_ceiling_is_hard() {
    let mut config = ComplianceConfig::default();
    config.call.max_calls_per_window = 1;
    let problem = SolveProblem::new(base_snapshot())
        .with_call_demand(call_for(d(1), "R1"))
        .with_call_demand(call_for(d(5), "R1"));

    let result = ScheduleSolver::new(Arc::new(config))
        .solve(SolverStrategy::Greedy, &problem, &registry(), Deadline::unbounded())
        .unwrap();
    assert!(!result.feasible);
    assert!(result.status.blocking().contains(&ConstraintType::CallFrequency));
}

#[test]
fn test_recovery_window_excluded_from_candidates() {
    let mut snapshot = base_snapshot();
    snapshot.absences.insert(
        "R1".to_string(),
        vec![Absence::new(
            "R1",
            AbsenceType::Deployment,
            NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(),
        )],
    );

    let open = SolveProblem::new(snapshot.clone())
        .with_demand(SlotDemand::primary("B1", Some("CLINIC"), 1));
    let result = solver()
        .solve(SolverStrategy::Exact, &open, &registry(), Deadline::unbounded())
        .unwrap();
    assert!(result.is_complete());
    assert_eq!(result.candidate.assignments[0].person_id, "R2");

    let only_r1 = SolveProblem::new(snapshot)
        .with_demand(SlotDemand::primary("B1", Some("CLINIC"), 1).with_candidates(&["R1"]));
    let result = solver()
        .solve(SolverStrategy::Greedy, &only_r1, &registry(), Deadline::unbounded())
        .unwrap();
    assert_eq!(
        result.status.blocking(),
        &[ConstraintType::PostDeploymentRecovery][..]
    );
    assert_eq!(result.status.as_str(), "INFEASIBLE");
}

// ==========================================
// 前置条件
// ==========================================

#[test]
fn test_empty_person_pool_is_error() {
    let mut snapshot = base_snapshot();
    snapshot.people.clear();
    let problem = staffed_problem(snapshot);

    let err = solver()
        .solve(SolverStrategy::Greedy, &problem, &registry(), Deadline::unbounded())
        .unwrap_err();
    assert!(matches!(err, CoreError::EmptyPersonPool { .. }));
}

#[test]
fn test_no_demands_is_error() {
    let problem = SolveProblem::new(base_snapshot());
    let err = solver()
        .solve(SolverStrategy::Exact, &problem, &registry(), Deadline::unbounded())
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput { ref field, .. } if field == "demands"));
}

#[test]
fn test_unknown_block_in_demand_is_error() {
    let problem = SolveProblem::new(base_snapshot())
        .with_demand(SlotDemand::primary("B9", None, 1));
    let err = solver()
        .solve(SolverStrategy::Greedy, &problem, &registry(), Deadline::unbounded())
        .unwrap_err();
    assert!(matches!(err, CoreError::UnknownReference { ref id, .. } if id == "B9"));
}

// ==========================================
// 结果比较
// ==========================================

#[test]
fn test_feasible_result_beats_cheaper_infeasible_result() {
    let feasible = SolveResult {
        run_id: "run-a".to_string(),
        strategy: SolverStrategy::Greedy,
        status: SolveStatus::Complete,
        timed_out: false,
        feasible: true,
        candidate: Default::default(),
        score: Score::new(0, 10_000.0),
        findings: Vec::new(),
        iterations: 1,
        elapsed_ms: 0,
    };
    let infeasible = SolveResult {
        run_id: "run-b".to_string(),
        strategy: SolverStrategy::Exact,
        status: SolveStatus::Partial {
            unfilled_slots: Vec::new(),
            blocking: vec![ConstraintType::SupervisionRatio],
        },
        feasible: false,
        score: Score::new(1, 0.0),
        ..feasible.clone()
    };

    assert!(feasible.compare(&infeasible).is_lt());
    assert!(infeasible.compare(&feasible).is_gt());
}

#[test]
fn test_strategy_parse_aliases() {
    assert_eq!("cp".parse::<SolverStrategy>().unwrap(), SolverStrategy::Exact);
    assert_eq!("Lagrangian".parse::<SolverStrategy>().unwrap(), SolverStrategy::Relaxation);
    assert_eq!("heuristic".parse::<SolverStrategy>().unwrap(), SolverStrategy::Greedy);
    assert!("annealing".parse::<SolverStrategy>().is_err());
}
