// ==========================================
// 住院医师排班合规核心 - 松弛策略 (拉格朗日乘子)
// ==========================================
// 规则: 软约束惩罚为目标函数, 硬约束以 乘子 x 违规数 计入目标
// 规则: 每轮构造后对仍违规的硬约束按步长抬高乘子, 直至可行或轮数耗尽
// 规则: 跨轮保留最优解 (可行优先, 再比惩罚分, 再比平局裁决键)
// ==========================================

use crate::constraint::{ConstraintType, Score};
use crate::engine::solver::problem::Deadline;
use crate::engine::solver::search::SearchSpace;
use crate::engine::solver::SearchOutcome;
use crate::error::CoreResult;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub(crate) fn search(space: &SearchSpace, deadline: &Deadline, rounds: u32, step: f64) -> CoreResult<SearchOutcome> {
    let mut multipliers: BTreeMap<ConstraintType, f64> = space
        .registry
        .all_hard()
        .iter()
        .map(|c| (c.constraint_type, step))
        .collect();

    let mut best: Option<(Score, Vec<(String, String)>, Vec<Option<String>>, BTreeSet<ConstraintType>)> = None;
    let mut iterations = 0u64;
    let mut timed_out = false;

    for round in 0..rounds.max(1) {
        if deadline.expired() {
            timed_out = true;
            break;
        }
        iterations += 1;

        let Some(choices) = construct(space, deadline, &multipliers)? else {
            timed_out = true;
            break;
        };
        let candidate = space.candidate_from(&choices);
        let outcome = space.evaluate(&candidate)?;
        let score = outcome.score();
        let key = candidate.tie_break_key();
        let violated: BTreeSet<ConstraintType> = outcome.violated_hard().into_iter().collect();

        let improves = match &best {
            None => true,
            Some((best_score, best_key, _, _)) => (score, &key) < (*best_score, best_key),
        };
        if improves {
            best = Some((score, key, choices, violated.clone()));
        }

        debug!(
            round,
            hard_violations = score.hard_violations,
            penalty = score.penalty,
            "松弛迭代"
        );

        if outcome.is_feasible {
            break;
        }
        for (constraint_type, count) in &outcome.hard_violations {
            if *count > 0 {
                *multipliers.entry(*constraint_type).or_insert(step) += step * *count as f64;
            }
        }
    }

    let slot_count = space.slots.len();
    Ok(match best {
        Some((_, _, choices, violated)) => SearchOutcome {
            choices,
            blocking: violated,
            timed_out,
            exhausted: false,
            iterations,
        },
        None => SearchOutcome {
            choices: vec![None; slot_count],
            blocking: BTreeSet::new(),
            timed_out,
            exhausted: false,
            iterations,
        },
    })
}

/// 单轮构造: 逐槽位选择 惩罚分 + 乘子加权违规 最小者 (超时返回 None)
fn construct(
    space: &SearchSpace,
    deadline: &Deadline,
    multipliers: &BTreeMap<ConstraintType, f64>,
) -> CoreResult<Option<Vec<Option<String>>>> {
    let mut choices: Vec<Option<String>> = vec![None; space.slots.len()];
    for slot in 0..space.slots.len() {
        if deadline.expired() {
            return Ok(None);
        }
        let mut best: Option<(f64, String)> = None;
        let mut trial = choices.clone();
        for person_id in &space.slots[slot].candidates {
            if space.conflicts(&choices, slot, person_id) {
                continue;
            }
            trial[slot] = Some(person_id.clone());
            let outcome = space.evaluate(&space.candidate_from(&trial))?;
            let lagrangian: f64 = outcome.total_penalty
                + outcome
                    .hard_violations
                    .iter()
                    .map(|(t, count)| multipliers.get(t).copied().unwrap_or(0.0) * *count as f64)
                    .sum::<f64>();
            // 候选已按 person_id 排序, 严格小于才替换即为确定性平局裁决
            if best.as_ref().map_or(true, |(cost, _)| lagrangian < *cost) {
                best = Some((lagrangian, person_id.clone()));
            }
        }
        choices[slot] = best.map(|(_, person_id)| person_id);
    }
    Ok(Some(choices))
}
