// ==========================================
// 住院医师排班合规核心 - 精确策略 (深度优先分支定界)
// ==========================================
// 规则: 单调硬约束在部分解上即违规 -> 剪枝
// 规则: 叶节点做完整评分, 保留最优可行解 (评分相同取平局裁决键较小者)
// 红线: 时间预算到期立即带当前最优解退出
// ==========================================

use crate::constraint::{ConstraintType, Score};
use crate::engine::solver::problem::Deadline;
use crate::engine::solver::search::SearchSpace;
use crate::engine::solver::SearchOutcome;
use crate::error::CoreResult;
use std::collections::BTreeSet;
use tracing::debug;

struct ExactState {
    choices: Vec<Option<String>>,
    best: Option<(Score, Vec<(String, String)>, Vec<Option<String>>)>,
    blocking: BTreeSet<ConstraintType>,
    iterations: u64,
    timed_out: bool,
}

pub(crate) fn search(space: &SearchSpace, deadline: &Deadline) -> CoreResult<SearchOutcome> {
    let mut state = ExactState {
        choices: vec![None; space.slots.len()],
        best: None,
        blocking: BTreeSet::new(),
        iterations: 0,
        timed_out: false,
    };
    descend(space, deadline, &mut state, 0)?;

    let exhausted = !state.timed_out;
    debug!(
        iterations = state.iterations,
        exhausted,
        found = state.best.is_some(),
        "精确搜索结束"
    );

    match state.best {
        Some((_, _, choices)) => Ok(SearchOutcome {
            choices,
            blocking: BTreeSet::new(),
            timed_out: state.timed_out,
            exhausted,
            iterations: state.iterations,
        }),
        None => Ok(SearchOutcome {
            choices: vec![None; space.slots.len()],
            blocking: state.blocking,
            timed_out: state.timed_out,
            exhausted,
            iterations: state.iterations,
        }),
    }
}

fn descend(space: &SearchSpace, deadline: &Deadline, state: &mut ExactState, slot: usize) -> CoreResult<()> {
    if state.timed_out {
        return Ok(());
    }
    if deadline.expired() {
        state.timed_out = true;
        return Ok(());
    }
    state.iterations += 1;

    if slot == space.slots.len() {
        let candidate = space.candidate_from(&state.choices);
        let outcome = space.evaluate(&candidate)?;
        if !outcome.is_feasible {
            state.blocking.extend(outcome.violated_hard());
            return Ok(());
        }
        let score = outcome.score();
        let key = candidate.tie_break_key();
        let improves = match &state.best {
            None => true,
            Some((best_score, best_key, _)) => (score, &key) < (*best_score, best_key),
        };
        if improves {
            state.best = Some((score, key, state.choices.clone()));
        }
        return Ok(());
    }

    let candidates = space.slots[slot].candidates.clone();
    for person_id in candidates {
        if space.conflicts(&state.choices, slot, &person_id) {
            continue;
        }
        state.choices[slot] = Some(person_id);
        let violated = space.monotone_violations(&space.candidate_from(&state.choices))?;
        if violated.is_empty() {
            descend(space, deadline, state, slot + 1)?;
        } else {
            state.blocking.extend(violated);
        }
        state.choices[slot] = None;
        if state.timed_out {
            break;
        }
    }
    Ok(())
}
