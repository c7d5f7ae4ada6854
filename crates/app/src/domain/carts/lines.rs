//! Line reconciliation: quantity clamping, de-duplication and merging.

use rustc_hash::FxHashMap;

use crate::domain::carts::models::{CartLine, LineId, VariantKey};

/// Clamp a requested quantity into `[1, stock]`.
///
/// A stock snapshot of zero still allows a single unit; the snapshot is only a
/// hint and the order service has the final word on availability.
#[must_use]
pub fn clamp_quantity(requested: i64, stock: u32) -> u32 {
    let upper = i64::from(stock.max(1));

    u32::try_from(requested.clamp(1, upper)).unwrap_or(1)
}

/// `id`, or the first suffixed variant of it that no line in `lines` uses.
pub(crate) fn unique_line_id(lines: &[CartLine], id: LineId) -> LineId {
    let taken = |candidate: &LineId| lines.iter().any(|line| &line.line_id == candidate);

    if !taken(&id) {
        return id;
    }

    let mut suffix = 1;
    let mut candidate = id.with_suffix(suffix);

    while taken(&candidate) {
        suffix += 1;
        candidate = id.with_suffix(suffix);
    }

    candidate
}

/// Collapse lines sharing a variant key into the first-seen line.
///
/// The surviving line keeps its position and snapshot, and its id unless an
/// earlier line already holds it. Quantities are summed and clamped to the
/// surviving line's stock snapshot.
#[must_use]
pub fn dedupe(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut positions: FxHashMap<VariantKey, usize> = FxHashMap::default();
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());

    for mut line in lines {
        let key = line.variant_key();

        if let Some(existing) = positions.get(&key).and_then(|&index| merged.get_mut(index)) {
            let total = i64::from(existing.quantity) + i64::from(line.quantity);

            existing.quantity = clamp_quantity(total, existing.stock_snapshot);

            continue;
        }

        line.quantity = clamp_quantity(i64::from(line.quantity), line.stock_snapshot);
        line.size = key.size.clone();
        line.color = key.color.clone();
        line.line_id = unique_line_id(&merged, line.line_id);

        positions.insert(key, merged.len());
        merged.push(line);
    }

    merged
}

/// Union of two line sets, `primary` lines winning on metadata.
#[must_use]
pub fn merge(primary: Vec<CartLine>, secondary: Vec<CartLine>) -> Vec<CartLine> {
    let mut lines = primary;

    lines.extend(secondary);

    dedupe(lines)
}
