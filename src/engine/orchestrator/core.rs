use crate::config::ComplianceConfig;
use crate::domain::finding::ComplianceFinding;
use crate::domain::person::Person;
use crate::domain::schedule::{Assignment, SchedulePeriod};
use crate::domain::snapshot::{require_people, require_period, ScheduleSnapshot, SnapshotIndex};
use crate::domain::types::{AssignmentRole, ComplianceDomain, DayPeriod, Severity};
use crate::engine::call::{CallEquityReport, CallValidator};
use crate::engine::leave::LeaveValidator;
use crate::engine::orchestrator::dashboard::DashboardData;
use crate::engine::orchestrator::remediation::suggestions_for;
use crate::engine::orchestrator::report::{
    ComplianceCheckResult, ReportStatus, ScheduleValidationReport, SingleAssignmentCheck,
};
use crate::engine::rotation::RotationValidator;
use crate::engine::supervision::SupervisionValidator;
use crate::engine::work_hour::WorkHourValidator;
use crate::error::{CoreError, CoreResult};
use crate::perf::PerfGuard;
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

// ==========================================
// DomainPass - 单一领域的校验产出
// ==========================================
#[derive(Debug, Default)]
pub(crate) struct DomainPass {
    /// 住院医师 -> 归属发现
    per_person: BTreeMap<String, Vec<ComplianceFinding>>,
    /// 无法归属的发现
    pool: Vec<ComplianceFinding>,
    /// 带教合规占比 (仅带教领域)
    supervision_percentage: Option<f64>,
    /// 值班公平性 (仅值班领域)
    call_equity: Option<CallEquityReport>,
}

impl DomainPass {
    fn attribute(&mut self, person_id: &str, findings: Vec<ComplianceFinding>) {
        self.per_person
            .entry(person_id.to_string())
            .or_default()
            .extend(findings);
    }

    /// 住院医师的发现归个人, 带教医师的发现进入人员池
    fn attribute_person(&mut self, person: &Person, findings: Vec<ComplianceFinding>) {
        if person.is_resident() {
            self.attribute(&person.person_id, findings);
        } else {
            self.pool.extend(findings);
        }
    }
}

// ==========================================
// ComplianceOrchestrator - 合规编排器
// ==========================================
pub struct ComplianceOrchestrator {
    config: Arc<ComplianceConfig>,
}

impl ComplianceOrchestrator {
    /// 创建编排器实例
    ///
    /// # 参数
    /// - config: 合规阈值配置 (各校验引擎按运行从中构建)
    pub fn new(config: Arc<ComplianceConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ComplianceConfig {
        &self.config
    }

    // ==========================================
    // 整表校验
    // ==========================================

    /// 对周期内全部住院医师执行五大领域校验并汇总
    ///
    /// # 返回
    /// - `Ok(report)`: 违规与提示均作为报告数据返回
    /// - `Err(CoreError)`: 无人员、无在岗住院医师、周期倒置、悬空引用
    #[instrument(skip(self, snapshot), fields(
        start = %period.start,
        end = %period.end,
        people = snapshot.people.len()
    ))]
    pub fn validate_complete_schedule(
        &self,
        period: &SchedulePeriod,
        snapshot: &ScheduleSnapshot,
    ) -> CoreResult<ScheduleValidationReport> {
        let _perf = PerfGuard::new("orchestrator.validate_complete_schedule");
        let index = prepare(period, snapshot)?;
        let config = self.config.as_ref();

        debug!("步骤1: 工时校验");
        let work_hours = work_hour_pass(config, &index, period);
        debug!("步骤2: 带教校验");
        let supervision = supervision_pass(config, &index, period);
        debug!("步骤3: 值班校验");
        let call = call_pass(config, &index, period);
        debug!("步骤4: 缺勤校验");
        let leave = leave_pass(config, &index, period);
        debug!("步骤5: 轮转校验");
        let rotation = rotation_pass(config, &index, period);

        let report = assemble(
            *period,
            snapshot.as_of,
            &active_residents(&index),
            [work_hours, supervision, call, leave, rotation],
        );
        log_report(&report);
        Ok(report)
    }

    /// 五大领域并行校验 (阻塞线程池), 结果与同步路径一致
    pub async fn validate_complete_schedule_parallel(
        &self,
        period: SchedulePeriod,
        snapshot: Arc<ScheduleSnapshot>,
    ) -> CoreResult<ScheduleValidationReport> {
        let _perf = PerfGuard::new("orchestrator.validate_complete_schedule_parallel");
        let index = prepare(&period, &snapshot)?;
        info!(
            start = %period.start,
            end = %period.end,
            people = snapshot.people.len(),
            "开始并行合规校验"
        );

        let (work_hours, supervision, call, leave, rotation) = tokio::try_join!(
            spawn_pass(&self.config, &snapshot, period, work_hour_pass),
            spawn_pass(&self.config, &snapshot, period, supervision_pass),
            spawn_pass(&self.config, &snapshot, period, call_pass),
            spawn_pass(&self.config, &snapshot, period, leave_pass),
            spawn_pass(&self.config, &snapshot, period, rotation_pass),
        )?;
        let passes = [work_hours?, supervision?, call?, leave?, rotation?];

        let report = assemble(period, snapshot.as_of, &active_residents(&index), passes);
        log_report(&report);
        Ok(report)
    }

    // ==========================================
    // 单条排班预检
    // ==========================================

    /// 提交前预检单条排班: 只做与该排班相关的检查
    ///
    /// # 规则
    /// - 同日同时段重复、阻断型缺勤、派遣恢复期、资质/PGY、值班后恢复、新增工时违规 -> 拒绝
    /// - 带教人数不足只作提示 (带教可能随后补排)
    #[instrument(skip(self, candidate, snapshot), fields(
        person_id = %candidate.person_id,
        block_id = %candidate.block_id
    ))]
    pub fn validate_single_assignment(
        &self,
        candidate: &Assignment,
        snapshot: &ScheduleSnapshot,
    ) -> CoreResult<SingleAssignmentCheck> {
        let _perf = PerfGuard::new("orchestrator.validate_single_assignment");
        require_people(snapshot, "single assignment")?;
        let index = SnapshotIndex::build(snapshot)?;

        let person = index
            .person(&candidate.person_id)
            .ok_or_else(|| CoreError::UnknownReference {
                entity: "Person".to_string(),
                id: candidate.person_id.clone(),
            })?;
        let block = index
            .block(&candidate.block_id)
            .ok_or_else(|| CoreError::UnknownReference {
                entity: "TimeBlock".to_string(),
                id: candidate.block_id.clone(),
            })?;
        let rotation = match candidate.rotation_id.as_deref() {
            Some(id) => Some(index.rotation(id).ok_or_else(|| CoreError::UnknownReference {
                entity: "RotationTemplate".to_string(),
                id: id.to_string(),
            })?),
            None => None,
        };

        let date = block.date;
        let mut reasons = Vec::new();
        let mut advisories = Vec::new();

        if !person.active {
            reasons.push(format!("{} is not active", person.person_id));
        }

        // 同一时间块或同日同时段已有排班
        for existing in index.assignments_for_person(&person.person_id) {
            if existing.block_id == block.block_id {
                reasons.push(format!(
                    "{} is already assigned to block {} as {}",
                    person.person_id, block.block_id, existing.role
                ));
                continue;
            }
            let Some(other) = index.block(&existing.block_id) else {
                continue;
            };
            if other.date == date && other.period == block.period {
                reasons.push(format!(
                    "{} is already scheduled on {} {} (block {}, {})",
                    person.person_id, date, block.period, other.block_id, existing.role
                ));
            }
        }

        // 缺勤
        let leave = LeaveValidator::new(self.config.leave.clone());
        let absences = index.absences(&person.person_id);
        if let Some(absence) = leave.blocking_absence_on(absences, date) {
            reasons.push(format!(
                "{} is on blocking {} absence {}..{}",
                person.person_id, absence.absence_type, absence.start_date, absence.end_date
            ));
        }
        if let Some(absence) = leave.recovery_absence_on(absences, date) {
            reasons.push(format!(
                "{} is inside the post-deployment recovery window after {}",
                person.person_id, absence.end_date
            ));
        }

        // 资质与 PGY (仅主责)
        if let (Some(rotation), AssignmentRole::Primary) = (rotation, candidate.role) {
            if person.is_resident() && !rotation.allows_pgy(person.pgy_level) {
                reasons.push(format!(
                    "PGY-{} is not eligible for rotation {}",
                    person.pgy_level.unwrap_or(0),
                    rotation.rotation_id
                ));
            }
            for code in &rotation.required_credentials {
                if !person.holds_any_credential(code, date) {
                    reasons.push(format!(
                        "Rotation {} requires credential {} on {}",
                        rotation.rotation_id, code, date
                    ));
                }
            }
        }

        if candidate.role.counts_as_duty() && person.is_resident() {
            // 值班后恢复日不得有日间排班
            if block.period != DayPeriod::Night {
                let call = CallValidator::new(self.config.call.clone());
                reasons.extend(
                    call.check_post_call_rest(&person.person_id, index.call_dates(&person.person_id), &[date])
                        .into_iter()
                        .map(|f| f.message),
                );
            }

            // 工时: 只拒绝由本条排班新增或加重的阻断型发现
            let limits = &self.config.work_hours;
            let reach = Duration::days(limits.rolling_window_days.max(1) - 1);
            let local = SchedulePeriod::new(date - reach, date + reach);
            let validator = WorkHourValidator::new(limits.clone());
            let before = validator.validate_person(&index, &person.person_id, &local).findings;

            let mut merged = snapshot.assignments.clone();
            merged.push(candidate.clone());
            let calls = snapshot.call_records();
            let proposed = SnapshotIndex::build_with(snapshot, &merged, &calls)?;
            let after = validator.validate_person(&proposed, &person.person_id, &local).findings;
            reasons.extend(
                after
                    .into_iter()
                    .filter(|f| f.severity.is_blocking() && !before.contains(f))
                    .map(|f| f.message),
            );

            // 带教不足仅提示
            if candidate.role == AssignmentRole::Primary {
                let supervision = SupervisionValidator::new(self.config.supervision.clone());
                let stats = supervision.analyze_block(&proposed, block);
                if stats.deficit > 0 {
                    advisories.push(format!(
                        "Block {} would need {} supervising faculty but has {}",
                        block.block_id, stats.required_faculty, stats.actual_faculty
                    ));
                }
            }
        }

        let check = SingleAssignmentCheck {
            accepted: reasons.is_empty(),
            reasons,
            advisories,
        };
        if check.accepted {
            debug!(advisories = check.advisories.len(), "单条排班预检通过");
        } else {
            warn!(reasons = check.reasons.len(), "单条排班预检拒绝");
        }
        Ok(check)
    }

    // ==========================================
    // 看板投影
    // ==========================================

    pub fn generate_dashboard_data(&self, report: &ScheduleValidationReport) -> DashboardData {
        DashboardData::from_report(report)
    }
}

// ==========================================
// 前置条件
// ==========================================

fn prepare<'a>(period: &SchedulePeriod, snapshot: &'a ScheduleSnapshot) -> CoreResult<SnapshotIndex<'a>> {
    require_people(snapshot, "orchestrator")?;
    require_period(period)?;
    let index = SnapshotIndex::build(snapshot)?;
    if active_residents(&index).is_empty() {
        return Err(CoreError::EmptyPersonPool {
            context: "orchestrator: no active residents".to_string(),
        });
    }
    Ok(index)
}

fn active_residents<'a>(index: &SnapshotIndex<'a>) -> Vec<&'a Person> {
    index.residents().into_iter().filter(|p| p.active).collect()
}

fn active_people<'a>(index: &SnapshotIndex<'a>) -> Vec<&'a Person> {
    index.people_sorted().into_iter().filter(|p| p.active).collect()
}

fn spawn_pass<F>(
    config: &Arc<ComplianceConfig>,
    snapshot: &Arc<ScheduleSnapshot>,
    period: SchedulePeriod,
    pass: F,
) -> JoinHandle<CoreResult<DomainPass>>
where
    F: FnOnce(&ComplianceConfig, &SnapshotIndex<'_>, &SchedulePeriod) -> DomainPass + Send + 'static,
{
    let config = Arc::clone(config);
    let snapshot = Arc::clone(snapshot);
    tokio::task::spawn_blocking(move || {
        let index = SnapshotIndex::build(&snapshot)?;
        Ok(pass(&config, &index, &period))
    })
}

// ==========================================
// 五大领域
// ==========================================

fn work_hour_pass(config: &ComplianceConfig, index: &SnapshotIndex<'_>, period: &SchedulePeriod) -> DomainPass {
    let validator = WorkHourValidator::new(config.work_hours.clone());
    let mut pass = DomainPass::default();
    for person in active_residents(index) {
        let analysis = validator.validate_person(index, &person.person_id, period);
        pass.attribute(&person.person_id, analysis.findings);
    }
    pass
}

/// 时间块级发现归属到块内在岗住院医师; 带教医师的发现进入人员池
fn supervision_pass(config: &ComplianceConfig, index: &SnapshotIndex<'_>, period: &SchedulePeriod) -> DomainPass {
    let validator = SupervisionValidator::new(config.supervision.clone());
    let mut analysis = validator.validate_period(index, period);
    let residents: BTreeSet<String> = active_residents(index)
        .into_iter()
        .map(|p| p.person_id.clone())
        .collect();

    let mut pass = DomainPass {
        supervision_percentage: Some(analysis.compliance_percentage),
        ..Default::default()
    };
    for finding in std::mem::take(&mut analysis.findings) {
        match finding.person_id.as_deref() {
            Some(id) if residents.contains(id) => {
                let id = id.to_string();
                pass.attribute(&id, vec![finding]);
            }
            Some(_) => pass.pool.push(finding),
            None => {
                let present: Vec<&String> = finding
                    .evidence
                    .block_id
                    .as_deref()
                    .map(|block_id| analysis.residents_in_block(block_id))
                    .unwrap_or(&[])
                    .iter()
                    .filter(|id| residents.contains(*id))
                    .collect();
                if present.is_empty() {
                    pass.pool.push(finding);
                    continue;
                }
                for id in present {
                    let mut attributed = finding.clone();
                    attributed.person_id = Some(id.clone());
                    pass.attribute(id, vec![attributed]);
                }
            }
        }
    }
    pass
}

fn call_pass(config: &ComplianceConfig, index: &SnapshotIndex<'_>, period: &SchedulePeriod) -> DomainPass {
    let validator = CallValidator::new(config.call.clone());
    let mut pass = DomainPass::default();

    for person in active_people(index) {
        let calls = index.call_dates(&person.person_id);
        if calls.is_empty() {
            continue;
        }
        let day_work = day_work_dates(index, &person.person_id);
        let findings = validator.validate_person(&person.person_id, calls, &day_work, period);
        pass.attribute_person(person, findings);
    }

    // 公平性只在住院医师值班池内比较
    let residents = active_residents(index);
    let equity = validator.equity_for_period(index, &residents, period);
    pass.pool.extend(equity.findings.iter().cloned());
    pass.call_equity = Some(equity);
    pass
}

fn leave_pass(config: &ComplianceConfig, index: &SnapshotIndex<'_>, period: &SchedulePeriod) -> DomainPass {
    let validator = LeaveValidator::new(config.leave.clone());
    let as_of = index.snapshot.as_of;
    let mut pass = DomainPass::default();
    for person in active_people(index) {
        let findings = validator.validate_person(
            &person.person_id,
            index.absences(&person.person_id),
            &index.assignment_dates(&person.person_id),
            index.call_dates(&person.person_id),
            period,
            as_of,
        );
        pass.attribute_person(person, findings);
    }
    pass
}

fn rotation_pass(config: &ComplianceConfig, index: &SnapshotIndex<'_>, period: &SchedulePeriod) -> DomainPass {
    let validator = RotationValidator::new(config.rotation.clone());
    let as_of = index.snapshot.as_of;
    let mut pass = DomainPass::default();
    for person in active_residents(index) {
        let findings = validator.validate_person(index, person, period, as_of);
        pass.attribute(&person.person_id, findings);
    }
    pass
}

/// 日间 (非夜间时段) 计入值守的排班日期
fn day_work_dates(index: &SnapshotIndex<'_>, person_id: &str) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = index
        .assignments_for_person(person_id)
        .iter()
        .filter(|a| a.role.counts_as_duty())
        .filter_map(|a| index.block(&a.block_id))
        .filter(|b| b.period != DayPeriod::Night)
        .map(|b| b.date)
        .collect();
    dates.sort();
    dates.dedup();
    dates
}

// ==========================================
// 汇总
// ==========================================

fn assemble(
    period: SchedulePeriod,
    as_of: NaiveDate,
    residents: &[&Person],
    passes: [DomainPass; 5],
) -> ScheduleValidationReport {
    let mut supervision_percentage = 100.0;
    let mut call_equity = CallEquityReport::default();
    let mut pool_findings = Vec::new();
    let mut per_person: BTreeMap<String, Vec<ComplianceFinding>> = BTreeMap::new();

    // 按领域顺序拼接, 保证同步与并行路径输出一致
    for pass in passes {
        if let Some(pct) = pass.supervision_percentage {
            supervision_percentage = pct;
        }
        if let Some(equity) = pass.call_equity {
            call_equity = equity;
        }
        for (person_id, findings) in pass.per_person {
            per_person.entry(person_id).or_default().extend(findings);
        }
        pool_findings.extend(pass.pool);
    }

    let results: Vec<ComplianceCheckResult> = residents
        .iter()
        .map(|person| {
            let findings = per_person.remove(&person.person_id).unwrap_or_default();
            check_result(person, findings)
        })
        .collect();

    let mut violations_by_domain: BTreeMap<ComplianceDomain, u32> =
        ComplianceDomain::VALIDATED.iter().map(|d| (*d, 0)).collect();
    let mut findings_by_severity: BTreeMap<Severity, u32> = BTreeMap::new();
    for finding in results.iter().flat_map(|r| r.findings.iter()).chain(pool_findings.iter()) {
        *findings_by_severity.entry(finding.severity).or_insert(0) += 1;
        if finding.is_violation() {
            *violations_by_domain.entry(finding.domain()).or_insert(0) += 1;
        }
    }

    let total_residents = results.len();
    let compliant_residents = results.iter().filter(|r| r.is_compliant).count();
    let compliance_percentage = if total_residents == 0 {
        100.0
    } else {
        compliant_residents as f64 / total_residents as f64 * 100.0
    };

    let all_findings = || results.iter().flat_map(|r| r.findings.iter()).chain(pool_findings.iter());
    let status = ReportStatus::from_findings(all_findings());
    let remediation = suggestions_for(all_findings());

    let mut report = ScheduleValidationReport {
        period,
        as_of,
        status,
        total_residents,
        compliant_residents,
        compliance_percentage,
        supervision_compliance_percentage: supervision_percentage,
        call_equity,
        results,
        pool_findings,
        violations_by_domain,
        findings_by_severity,
        remediation,
        executive_summary: String::new(),
    };
    report.executive_summary = executive_summary(&report);
    report
}

fn check_result(person: &Person, findings: Vec<ComplianceFinding>) -> ComplianceCheckResult {
    let mut violation_counts: BTreeMap<ComplianceDomain, u32> =
        ComplianceDomain::VALIDATED.iter().map(|d| (*d, 0)).collect();
    let mut warning_counts = violation_counts.clone();
    for finding in &findings {
        let bucket = if finding.is_violation() {
            &mut violation_counts
        } else {
            &mut warning_counts
        };
        *bucket.entry(finding.domain()).or_insert(0) += 1;
    }
    let is_compliant = violation_counts.values().all(|c| *c == 0);
    let remediation = suggestions_for(&findings);

    ComplianceCheckResult {
        person_id: person.person_id.clone(),
        name: person.name.clone(),
        pgy_level: person.pgy_level,
        is_compliant,
        violation_counts,
        warning_counts,
        findings,
        remediation,
    }
}

fn executive_summary(report: &ScheduleValidationReport) -> String {
    let warnings = report.count_severity(Severity::Warning);
    let mut summary = format!(
        "Compliance review {}..{}: {} of {} residents fully compliant ({:.1}%). Overall status: {}.",
        report.period.start,
        report.period.end,
        report.compliant_residents,
        report.total_residents,
        report.compliance_percentage,
        report.status
    );
    summary.push_str(&format!(
        " {} violation(s) (critical {}, high {}, medium {}) and {} warning(s).",
        report.total_violations(),
        report.count_severity(Severity::Critical),
        report.count_severity(Severity::High),
        report.count_severity(Severity::Medium),
        warnings
    ));
    summary.push_str(&format!(
        " Supervision compliant in {:.1}% of staffed blocks. Call imbalance ratio {:.2} across {} resident(s).",
        report.supervision_compliance_percentage,
        report.call_equity.imbalance_ratio,
        report.call_equity.pool_size
    ));

    let worst_domain = report
        .violations_by_domain
        .iter()
        .filter(|(_, count)| **count > 0)
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)));
    if let Some((domain, count)) = worst_domain {
        summary.push_str(&format!(" Most affected domain: {} ({} violation(s)).", domain, count));
    }
    summary
}

fn log_report(report: &ScheduleValidationReport) {
    info!(
        total_residents = report.total_residents,
        compliant_residents = report.compliant_residents,
        compliance_percentage = report.compliance_percentage,
        violations = report.total_violations(),
        status = report.status.as_str(),
        "合规校验完成"
    );
}
