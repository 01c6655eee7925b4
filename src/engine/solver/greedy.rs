// ==========================================
// 住院医师排班合规核心 - 贪心策略 (局部回溯)
// ==========================================
// 规则: 按槽位顺序逐个指派, 候选按 (单调违规, 惩罚分, person_id) 排序
// 规则: 无可行候选时回溯到上一槽位换人, 回溯次数受限
// 规则: 回溯耗尽的槽位放弃并固定, 之后不再回溯越过该槽位
// ==========================================

use crate::constraint::ConstraintType;
use crate::engine::solver::problem::Deadline;
use crate::engine::solver::search::SearchSpace;
use crate::engine::solver::SearchOutcome;
use crate::error::CoreResult;
use std::collections::BTreeSet;
use tracing::debug;

struct Frame {
    ranked: Vec<String>,
    position: usize,
}

pub(crate) fn search(space: &SearchSpace, deadline: &Deadline, max_backtracks: u32) -> CoreResult<SearchOutcome> {
    let slot_count = space.slots.len();
    let mut choices: Vec<Option<String>> = vec![None; slot_count];
    let mut frames: Vec<Frame> = Vec::with_capacity(slot_count);
    let mut blocking: BTreeSet<ConstraintType> = BTreeSet::new();
    let mut backtracks = 0u32;
    let mut iterations = 0u64;
    let mut floor = 0usize;
    let mut timed_out = false;
    let mut slot = 0usize;

    while slot < slot_count {
        if deadline.expired() {
            timed_out = true;
            break;
        }
        iterations += 1;

        if frames.len() == slot {
            let ranked = rank_candidates(space, &choices, slot)?;
            frames.push(Frame { ranked, position: 0 });
        }

        let frame = &frames[slot];
        if frame.position < frame.ranked.len() {
            choices[slot] = Some(frame.ranked[frame.position].clone());
            slot += 1;
            continue;
        }

        // 死路: 回溯或放弃
        if slot > floor && backtracks < max_backtracks {
            frames.pop();
            backtracks += 1;
            slot -= 1;
            choices[slot] = None;
            frames[slot].position += 1;
            continue;
        }

        blocking.extend(space.blocking_for(&choices, slot)?);
        debug!(slot = %space.slots[slot].label, backtracks, "贪心放弃槽位");
        choices[slot] = None;
        slot += 1;
        floor = slot;
    }

    Ok(SearchOutcome {
        choices,
        blocking,
        timed_out,
        exhausted: false,
        iterations,
    })
}

/// 可行候选排序 (单调硬约束零违规者)
fn rank_candidates(space: &SearchSpace, choices: &[Option<String>], slot: usize) -> CoreResult<Vec<String>> {
    let mut scored = Vec::new();
    let mut trial = choices.to_vec();
    for person_id in &space.slots[slot].candidates {
        if space.conflicts(choices, slot, person_id) {
            continue;
        }
        trial[slot] = Some(person_id.clone());
        let candidate = space.candidate_from(&trial);
        if !space.monotone_violations(&candidate)?.is_empty() {
            continue;
        }
        let penalty = space.evaluate(&candidate)?.total_penalty;
        scored.push((penalty, person_id.clone()));
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(scored.into_iter().map(|(_, person_id)| person_id).collect())
}
