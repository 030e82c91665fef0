//! Adaptive mesh refinement engine.
//!
//! Two entry points:
//! - [`refine_where`]: one-shot refinement driven by a geometric predicate,
//!   repeated until no leaf below `max_level` satisfies it.
//! - [`adapt_wavelet`]: one refine/coarsen pass driven by a per-field local
//!   error estimate and a tolerance per field.
//!
//! Split cells receive their children's values through the field's
//! [`Prolongation`] rule; merged cells receive the mean of their four
//! children, which conserves the integral of every field.

use std::collections::HashSet;

use crate::grid::{CellKey, FieldId, Prolongation, QuadGrid};

/// Cells whose estimate stays below this fraction of the tolerance on every
/// field are candidates for merging.
pub const COARSEN_FRACTION: f64 = 2.0 / 3.0;

/// Geometry of a leaf, handed to refinement predicates.
#[derive(Debug, Clone, Copy)]
pub struct CellInfo {
    /// Cell identifier
    pub key: CellKey,
    /// Cell centre
    pub center: [f64; 2],
    /// Cell edge length
    pub size: f64,
}

/// Outcome of one adaptation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdaptStats {
    /// Leaves split into four children
    pub refined: usize,
    /// Groups of four siblings merged into their parent
    pub coarsened: usize,
    /// Leaf count after the pass
    pub cells: usize,
}

/// Split every leaf below `max_level` whose geometry satisfies `predicate`,
/// repeating on the new leaves until nothing changes.
///
/// Returns the total number of splits.
pub fn refine_where<F>(grid: &mut QuadGrid, max_level: u8, predicate: F) -> usize
where
    F: Fn(&CellInfo) -> bool,
{
    let mut total = 0;
    loop {
        let flags: Vec<bool> = grid
            .leaves()
            .iter()
            .map(|&key| {
                key.level < max_level
                    && predicate(&CellInfo {
                        key,
                        center: grid.center(key),
                        size: grid.cell_size(key.level),
                    })
            })
            .collect();
        let count = flags.iter().filter(|&&f| f).count();
        if count == 0 {
            break;
        }
        rebuild(grid, &flags, &HashSet::new());
        total += count;
    }
    tracing::debug!("refine_where: {} splits, {} cells", total, grid.len());
    total
}

/// Local detail estimate of a field on every leaf.
///
/// The estimate is the distance between the cell value and the mean of its
/// four face neighbours (boundary ghosts included). It vanishes for fields
/// that vary linearly and grows with the high-frequency content the current
/// resolution cannot represent.
pub fn wavelet_error(grid: &QuadGrid, id: FieldId) -> Vec<f64> {
    const DIRS: [[i8; 2]; 4] = [[1, 0], [-1, 0], [0, 1], [0, -1]];
    let values = grid.values(id);
    (0..grid.len())
        .map(|idx| {
            let mean = DIRS
                .iter()
                .map(|&d| grid.neighbor_value(id, idx, d))
                .sum::<f64>()
                / 4.0;
            (mean - values[idx]).abs()
        })
        .collect()
}

/// One wavelet-driven adaptation pass.
///
/// Leaves whose estimate exceeds the tolerance of any listed field are split
/// (if below `max_level`). Complete sibling groups above `min_level` whose
/// estimates stay under `COARSEN_FRACTION * tolerance` for every field are
/// merged. `fields` and `tolerances` are matched by position.
pub fn adapt_wavelet(
    grid: &mut QuadGrid,
    fields: &[FieldId],
    tolerances: &[f64],
    max_level: u8,
    min_level: u8,
) -> AdaptStats {
    debug_assert_eq!(
        fields.len(),
        tolerances.len(),
        "one tolerance is required per adapted field"
    );

    let errors: Vec<Vec<f64>> = fields.iter().map(|&f| wavelet_error(grid, f)).collect();

    let n = grid.len();
    let mut refine = vec![false; n];
    let mut calm = vec![true; n];
    for idx in 0..n {
        let level = grid.leaves()[idx].level;
        for (err, &tol) in errors.iter().zip(tolerances) {
            if err[idx] > tol {
                calm[idx] = false;
                if level < max_level {
                    refine[idx] = true;
                }
            } else if err[idx] > tol * COARSEN_FRACTION {
                calm[idx] = false;
            }
        }
    }

    let mut coarsen = HashSet::new();
    for (idx, key) in grid.leaves().iter().enumerate() {
        if !calm[idx] || key.level <= min_level {
            continue;
        }
        let Some(parent) = key.parent() else {
            continue;
        };
        if coarsen.contains(&parent) {
            continue;
        }
        let siblings_calm = parent
            .children()
            .iter()
            .all(|&c| grid.index_of(c).is_some_and(|ci| calm[ci]));
        if siblings_calm {
            coarsen.insert(parent);
        }
    }

    let refined = refine.iter().filter(|&&r| r).count();
    if refined > 0 || !coarsen.is_empty() {
        rebuild(grid, &refine, &coarsen);
    }

    AdaptStats {
        refined,
        coarsened: coarsen.len(),
        cells: grid.len(),
    }
}

/// Children values of leaf `idx` under the field's prolongation rule.
pub fn prolong(grid: &QuadGrid, id: FieldId, idx: usize) -> [f64; 4] {
    let v = grid.values(id)[idx];
    let rule = grid.prolongation(id);
    if rule == Prolongation::Injection {
        return [v; 4];
    }

    let g = grid.gradient(id, idx);
    let quarter = 0.25 * grid.cell_size(grid.leaves()[idx].level);
    let mut out = [v; 4];
    for (slot, child) in out.iter_mut().enumerate() {
        let sx = if slot & 1 == 1 { 1.0 } else { -1.0 };
        let sy = if slot & 2 == 2 { 1.0 } else { -1.0 };
        *child = v + quarter * (sx * g[0] + sy * g[1]);
        if rule == Prolongation::Fraction {
            *child = child.clamp(0.0, 1.0);
        }
    }
    out
}

/// Rebuild the leaf set: split flagged leaves, merge the listed parents.
fn rebuild(grid: &mut QuadGrid, refine: &[bool], coarsen: &HashSet<CellKey>) {
    let field_ids: Vec<FieldId> = grid.field_ids().collect();
    let mut cells = Vec::with_capacity(grid.len() + 3 * refine.len());
    let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(cells.capacity()); field_ids.len()];
    let mut merged = HashSet::new();

    for (idx, &key) in grid.leaves().iter().enumerate() {
        if let Some(parent) = key.parent().filter(|p| coarsen.contains(p)) {
            if !merged.insert(parent) {
                continue;
            }
            let siblings: Vec<usize> = parent
                .children()
                .iter()
                .filter_map(|&c| grid.index_of(c))
                .collect();
            cells.push(parent);
            for (column, &f) in values.iter_mut().zip(&field_ids) {
                let data = grid.values(f);
                column.push(siblings.iter().map(|&s| data[s]).sum::<f64>() / siblings.len() as f64);
            }
        } else if refine[idx] {
            let children_values: Vec<[f64; 4]> =
                field_ids.iter().map(|&f| prolong(grid, f, idx)).collect();
            for (slot, child) in key.children().into_iter().enumerate() {
                cells.push(child);
                for (column, cv) in values.iter_mut().zip(&children_values) {
                    column.push(cv[slot]);
                }
            }
        } else {
            cells.push(key);
            for (column, &f) in values.iter_mut().zip(&field_ids) {
                column.push(grid.values(f)[idx]);
            }
        }
    }

    grid.replace_cells(cells, values);
}
