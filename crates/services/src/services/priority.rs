//! Dense 1-based ordering of projects.

/// Move `id` to `target` within `current` (pairs of `(id, priority)`) and
/// return the new dense ordering as `(id, priority)` pairs, priorities `1..=n`.
///
/// `target` is clamped into range. Ties in `current` are broken by id.
pub fn reorder(current: &[(i64, i64)], id: i64, target: i64) -> Vec<(i64, i64)> {
    let mut ordered: Vec<(i64, i64)> = current.to_vec();
    ordered.sort_by_key(|&(id, priority)| (priority, id));
    let mut ids: Vec<i64> = ordered.into_iter().map(|(id, _)| id).filter(|&other| other != id).collect();

    let max_index = ids.len() as i64;
    let index = (target.clamp(1, max_index + 1) - 1) as usize;
    ids.insert(index, id);

    number(ids)
}

/// Renumber `current` as `1..=n`, keeping relative order.
pub fn compact(current: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut ordered: Vec<(i64, i64)> = current.to_vec();
    ordered.sort_by_key(|&(id, priority)| (priority, id));
    number(ordered.into_iter().map(|(id, _)| id).collect())
}

/// Pairs whose priority differs between `before` and `after`.
pub fn changes(before: &[(i64, i64)], after: &[(i64, i64)]) -> Vec<(i64, i64)> {
    after
        .iter()
        .filter(|pair| !before.contains(pair))
        .copied()
        .collect()
}

fn number(ids: Vec<i64>) -> Vec<(i64, i64)> {
    ids.into_iter()
        .enumerate()
        .map(|(index, id)| (id, index as i64 + 1))
        .collect()
}
