// 整改建议: 按违规类型给出固定文案, 同类只出现一次

use crate::domain::finding::ComplianceFinding;
use crate::domain::types::FindingType;
use std::collections::BTreeSet;

/// 单一违规类型的整改建议
pub fn remediation_for(finding_type: FindingType) -> &'static str {
    match finding_type {
        FindingType::RollingAverageExceeded => {
            "Reduce scheduled hours in the flagged rolling window (remove shifts or moonlighting) until the weekly average is at or below the ceiling."
        }
        FindingType::RollingAverageApproaching => {
            "Avoid adding further shifts in the flagged window; the weekly average is close to the ceiling."
        }
        FindingType::DutyPeriodExceeded => {
            "Split the continuous duty period or insert a hand-off so no single duty exceeds the maximum plus hand-off allowance."
        }
        FindingType::InsufficientRest => {
            "Move the next shift later so the minimum rest interval follows every duty period."
        }
        FindingType::SupervisionDeficit => {
            "Assign additional supervising faculty to the affected blocks or reduce the number of residents scheduled in them."
        }
        FindingType::FacultyDoubleBooked => {
            "Reassign one of the overlapping supervision duties to another faculty member."
        }
        FindingType::SpecialtySupervisionMissing => {
            "Schedule a faculty member holding the required specialty credential for the affected block."
        }
        FindingType::ProcedureSupervisionMissing => {
            "Add a credentialed supervising faculty member, or restrict the procedure to credentialed residents."
        }
        FindingType::CallFrequencyExceeded => {
            "Redistribute overnight calls to other residents so no window exceeds the call limit."
        }
        FindingType::ConsecutiveCallExceeded => {
            "Break up the consecutive call run by moving at least one call to another resident."
        }
        FindingType::CallSpacingViolation => {
            "Increase the gap between non-consecutive calls to the minimum number of rest days."
        }
        FindingType::PostCallRestViolation => {
            "Remove day assignments scheduled during the post-call recovery day(s)."
        }
        FindingType::CallEquityImbalance => {
            "Rebalance the call roster across the pool so the heaviest and lightest loads converge."
        }
        FindingType::BlockingAbsenceConflict => {
            "Remove all assignments and calls that fall inside the blocking absence and arrange coverage."
        }
        FindingType::ReturnFollowUpRequired => {
            "Confirm the return date with the resident before scheduling past the tentative return."
        }
        FindingType::PostDeploymentRecovery => {
            "Keep the resident unscheduled for the full post-deployment recovery window."
        }
        FindingType::RotationTooShort => {
            "Extend the rotation to at least the minimum duration or merge it with an adjacent rotation."
        }
        FindingType::RotationTooLong => {
            "Shorten the rotation to its template maximum and schedule the next rotation."
        }
        FindingType::RotationMinimumUnmet => {
            "Schedule the missing required rotation blocks before the academic year closes."
        }
        FindingType::RotationMinimumTrending => {
            "Plan upcoming blocks to bring required rotation progress back on pace."
        }
        FindingType::RotationSequenceViolation => {
            "Reorder rotations so prerequisite rotations are completed first."
        }
        FindingType::RotationSpacingViolation => {
            "Increase the spacing between the flagged rotations to the configured minimum."
        }
        FindingType::ProcedureVolumeUnmet => {
            "Assign procedure-bearing blocks to close the annual procedure volume gap."
        }
        FindingType::ProcedureVolumeTrending => {
            "Prioritize procedure opportunities for this resident to stay on pace."
        }
        FindingType::DuplicatePrimaryAssignment => {
            "Keep a single primary assignment per date and period for the resident."
        }
        FindingType::MissingCredential => {
            "Assign a credentialed resident or obtain the required credential before the rotation."
        }
        FindingType::PgyIneligible => {
            "Replace the resident with one at an eligible PGY level for this rotation."
        }
        FindingType::SoftConstraintPenalty => {
            "Review the schedule against preference and balance goals when re-optimizing."
        }
        FindingType::UnknownReference => {
            "Correct the assignment so every referenced record exists in the snapshot."
        }
    }
}

/// 一组发现的整改建议 (含提示类, 按类型顺序去重)
pub fn suggestions_for<'a>(findings: impl IntoIterator<Item = &'a ComplianceFinding>) -> Vec<String> {
    let types: BTreeSet<FindingType> = findings
        .into_iter()
        .map(|f| f.finding_type)
        .collect();
    types
        .into_iter()
        .map(|t| format!("[{}] {}", t.as_str(), remediation_for(t)))
        .collect()
}
