//! Adaptive quadtree grid with cell-centred field storage.
//!
//! Only the leaves of the tree are stored. Each leaf is identified by its
//! [`CellKey`] (level plus integer coordinates at that level); a hash index
//! maps keys back to their position in the leaf array. Field values are kept
//! in parallel arrays, one `Vec<f64>` per field, so index `n` in every field
//! refers to leaf `n`.
//!
//! Leaves are always kept sorted by key. Every structural change goes through
//! [`QuadGrid::replace_cells`], which re-sorts and rebuilds the index, so the
//! iteration order (and therefore every reduction over the grid) is
//! reproducible from run to run.

use std::collections::HashMap;

use crate::boundary::{Boundary, BoundarySet, Side};

/// Deepest refinement level the integer cell coordinates can address.
pub const MAX_LEVEL_LIMIT: u8 = 20;

/// Identifier of a quadtree cell: refinement level and integer position.
///
/// At level `l` the domain is split into `2^l x 2^l` cells; `i` counts along
/// x and `j` along y, both from the domain origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Refinement level (0 = whole domain)
    pub level: u8,
    /// Column index at this level
    pub i: u32,
    /// Row index at this level
    pub j: u32,
}

impl CellKey {
    /// Create a key.
    pub fn new(level: u8, i: u32, j: u32) -> Self {
        Self { level, i, j }
    }

    /// Parent cell one level up, or `None` for the root.
    pub fn parent(&self) -> Option<CellKey> {
        if self.level == 0 {
            None
        } else {
            Some(CellKey::new(self.level - 1, self.i / 2, self.j / 2))
        }
    }

    /// The four children, ordered (-x,-y), (+x,-y), (-x,+y), (+x,+y).
    ///
    /// Bit 0 of the slot index selects +x, bit 1 selects +y.
    pub fn children(&self) -> [CellKey; 4] {
        let level = self.level + 1;
        let (i, j) = (2 * self.i, 2 * self.j);
        [
            CellKey::new(level, i, j),
            CellKey::new(level, i + 1, j),
            CellKey::new(level, i, j + 1),
            CellKey::new(level, i + 1, j + 1),
        ]
    }
}

/// Handle to a field registered on a [`QuadGrid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub(crate) usize);

impl FieldId {
    /// Position of the field in registration order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// How a field is interpolated onto the children of a split cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prolongation {
    /// Children inherit the parent value.
    Injection,
    /// Limited linear reconstruction from the parent and its neighbours.
    #[default]
    Linear,
    /// Limited linear reconstruction, clamped to [0, 1].
    ///
    /// The minmod limiter keeps the children inside the range of the
    /// neighbourhood and the four offsets cancel, so the parent volume is
    /// conserved.
    Fraction,
}

/// A named scalar field stored on the leaves.
#[derive(Debug, Clone)]
struct ScalarField {
    name: String,
    values: Vec<f64>,
    prolongation: Prolongation,
    boundary: BoundarySet,
}

/// Square adaptive quadtree covering `[origin, origin + size]^2`.
#[derive(Debug, Clone)]
pub struct QuadGrid {
    origin: [f64; 2],
    size: f64,
    base_level: u8,
    depth: u8,
    leaves: Vec<CellKey>,
    index: HashMap<CellKey, usize>,
    fields: Vec<ScalarField>,
}

impl QuadGrid {
    /// Create a uniform grid of `2^base_level` cells per side.
    pub fn new(origin: [f64; 2], size: f64, base_level: u8) -> Self {
        debug_assert!(size > 0.0, "domain size must be positive");
        debug_assert!(
            base_level <= MAX_LEVEL_LIMIT,
            "base level {base_level} exceeds {MAX_LEVEL_LIMIT}"
        );

        let n = 1u32 << base_level;
        let mut leaves = Vec::with_capacity((n as usize) * (n as usize));
        for i in 0..n {
            for j in 0..n {
                leaves.push(CellKey::new(base_level, i, j));
            }
        }
        let index = build_index(&leaves);

        Self {
            origin,
            size,
            base_level,
            depth: base_level,
            leaves,
            index,
            fields: Vec::new(),
        }
    }

    /// Lower-left corner of the domain.
    pub fn origin(&self) -> [f64; 2] {
        self.origin
    }

    /// Edge length of the domain.
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Level of the initial uniform grid. Coarsening never goes below it.
    pub fn base_level(&self) -> u8 {
        self.base_level
    }

    /// Deepest level currently present among the leaves.
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Number of leaf cells.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Return `true` if the grid has no cells (never the case after `new`).
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaf keys in storage order.
    pub fn leaves(&self) -> &[CellKey] {
        &self.leaves
    }

    /// Storage index of a leaf, if `key` is currently a leaf.
    pub fn index_of(&self, key: CellKey) -> Option<usize> {
        self.index.get(&key).copied()
    }

    /// Edge length of a cell at `level`.
    #[inline]
    pub fn cell_size(&self, level: u8) -> f64 {
        self.size / (1u64 << level) as f64
    }

    /// Edge length of the finest leaf.
    pub fn min_cell_size(&self) -> f64 {
        self.cell_size(self.depth)
    }

    /// Centre of the cell `key`.
    #[inline]
    pub fn center(&self, key: CellKey) -> [f64; 2] {
        let h = self.cell_size(key.level);
        [
            self.origin[0] + (key.i as f64 + 0.5) * h,
            self.origin[1] + (key.j as f64 + 0.5) * h,
        ]
    }

    /// Return `true` if `p` lies in the closed domain square.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.origin[0]
            && p[0] <= self.origin[0] + self.size
            && p[1] >= self.origin[1]
            && p[1] <= self.origin[1] + self.size
    }

    /// Leaf containing `p`, or `None` outside the domain.
    pub fn locate(&self, p: [f64; 2]) -> Option<usize> {
        if !self.contains(p) {
            return None;
        }
        for level in self.base_level..=self.depth {
            let n = 1i64 << level;
            let h = self.cell_size(level);
            let i = (((p[0] - self.origin[0]) / h).floor() as i64).clamp(0, n - 1) as u32;
            let j = (((p[1] - self.origin[1]) / h).floor() as i64).clamp(0, n - 1) as u32;
            if let Some(&idx) = self.index.get(&CellKey::new(level, i, j)) {
                return Some(idx);
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    /// Register a field initialised to zero. Re-registering a name returns
    /// the existing handle.
    pub fn add_field(&mut self, name: &str, prolongation: Prolongation) -> FieldId {
        if let Some(id) = self.field_id(name) {
            return id;
        }
        self.fields.push(ScalarField {
            name: name.to_string(),
            values: vec![0.0; self.leaves.len()],
            prolongation,
            boundary: BoundarySet::default(),
        });
        FieldId(self.fields.len() - 1)
    }

    /// Look up a field by name.
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields.iter().position(|f| f.name == name).map(FieldId)
    }

    /// Name a field was registered under.
    pub fn field_name(&self, id: FieldId) -> &str {
        &self.fields[id.0].name
    }

    /// Number of registered fields.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Handles of all registered fields in registration order.
    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> {
        (0..self.fields.len()).map(FieldId)
    }

    /// Leaf values of a field.
    pub fn values(&self, id: FieldId) -> &[f64] {
        &self.fields[id.0].values
    }

    /// Mutable leaf values of a field.
    pub fn values_mut(&mut self, id: FieldId) -> &mut [f64] {
        &mut self.fields[id.0].values
    }

    /// Prolongation rule used when cells of this field are split.
    pub fn prolongation(&self, id: FieldId) -> Prolongation {
        self.fields[id.0].prolongation
    }

    /// Change the prolongation rule of a field.
    pub fn set_prolongation(&mut self, id: FieldId, prolongation: Prolongation) {
        self.fields[id.0].prolongation = prolongation;
    }

    /// Boundary condition of a field on `side`.
    pub fn boundary(&self, id: FieldId, side: Side) -> Boundary {
        self.fields[id.0].boundary.get(side)
    }

    /// Set the boundary condition of a field on `side`.
    pub fn set_boundary(&mut self, id: FieldId, side: Side, boundary: Boundary) {
        self.fields[id.0].boundary.set(side, boundary);
    }

    /// Area-weighted sum of a field over all leaves.
    pub fn integrate(&self, id: FieldId) -> f64 {
        self.leaves
            .iter()
            .zip(&self.fields[id.0].values)
            .map(|(key, v)| {
                let h = self.cell_size(key.level);
                v * h * h
            })
            .sum()
    }

    /// Value one cell width away from leaf `idx` in direction `dir`.
    ///
    /// Crossing a domain edge yields the ghost value of that side's boundary
    /// condition. Across a level jump the value of whichever leaf contains the
    /// probe point is returned.
    pub fn neighbor_value(&self, id: FieldId, idx: usize, dir: [i8; 2]) -> f64 {
        let key = self.leaves[idx];
        let h = self.cell_size(key.level);
        let c = self.center(key);
        let p = [c[0] + dir[0] as f64 * h, c[1] + dir[1] as f64 * h];
        let field = &self.fields[id.0];
        match self.locate(p) {
            Some(n) => field.values[n],
            None => field
                .boundary
                .get(self.side_of(p))
                .ghost(field.values[idx]),
        }
    }

    /// Minmod-limited gradient of a field in leaf `idx`.
    pub fn gradient(&self, id: FieldId, idx: usize) -> [f64; 2] {
        let h = self.cell_size(self.leaves[idx].level);
        let v = self.fields[id.0].values[idx];
        let mut grad = [0.0; 2];
        for (axis, g) in grad.iter_mut().enumerate() {
            let mut up = [0i8; 2];
            let mut down = [0i8; 2];
            up[axis] = 1;
            down[axis] = -1;
            let forward = (self.neighbor_value(id, idx, up) - v) / h;
            let backward = (v - self.neighbor_value(id, idx, down)) / h;
            *g = minmod(forward, backward);
        }
        grad
    }

    /// Piecewise-constant sample of a field at `p`.
    ///
    /// Outside the domain a Dirichlet side returns its face value; a Neumann
    /// side returns the value at the nearest point inside.
    pub fn sample(&self, id: FieldId, p: [f64; 2]) -> f64 {
        match self.locate(p) {
            Some(idx) => self.fields[id.0].values[idx],
            None => match self.fields[id.0].boundary.get(self.side_of(p)) {
                Boundary::Dirichlet(value) => value,
                Boundary::Neumann => self.sample(id, self.clamp(p)),
            },
        }
    }

    /// Limited linear reconstruction of a field at `p`.
    pub fn sample_linear(&self, id: FieldId, p: [f64; 2]) -> f64 {
        match self.locate(p) {
            Some(idx) => {
                let c = self.center(self.leaves[idx]);
                let g = self.gradient(id, idx);
                self.fields[id.0].values[idx] + g[0] * (p[0] - c[0]) + g[1] * (p[1] - c[1])
            }
            None => match self.fields[id.0].boundary.get(self.side_of(p)) {
                Boundary::Dirichlet(value) => value,
                Boundary::Neumann => self.sample_linear(id, self.clamp(p)),
            },
        }
    }

    /// Number of leaves per level, coarsest first.
    pub fn level_histogram(&self) -> Vec<(u8, usize)> {
        let mut counts = vec![0usize; self.depth as usize + 1];
        for key in &self.leaves {
            counts[key.level as usize] += 1;
        }
        counts
            .into_iter()
            .enumerate()
            .filter(|(_, n)| *n > 0)
            .map(|(level, n)| (level as u8, n))
            .collect()
    }

    /// Replace the leaf set and all field values in one go.
    ///
    /// `values[f][n]` is the value of field `f` on `cells[n]`. The new leaves
    /// are re-sorted by key and the index rebuilt.
    pub(crate) fn replace_cells(&mut self, cells: Vec<CellKey>, values: Vec<Vec<f64>>) {
        debug_assert_eq!(values.len(), self.fields.len());
        debug_assert!(values.iter().all(|v| v.len() == cells.len()));

        let mut order: Vec<usize> = (0..cells.len()).collect();
        order.sort_by_key(|&n| cells[n]);

        self.leaves = order.iter().map(|&n| cells[n]).collect();
        for (field, column) in self.fields.iter_mut().zip(values) {
            field.values = order.iter().map(|&n| column[n]).collect();
        }
        self.depth = self
            .leaves
            .iter()
            .map(|k| k.level)
            .max()
            .unwrap_or(self.base_level);
        self.index = build_index(&self.leaves);
    }

    /// Side crossed by a point lying outside the domain.
    fn side_of(&self, p: [f64; 2]) -> Side {
        if p[1] < self.origin[1] {
            Side::Bottom
        } else if p[1] > self.origin[1] + self.size {
            Side::Top
        } else if p[0] < self.origin[0] {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Nearest point of the closed domain square.
    fn clamp(&self, p: [f64; 2]) -> [f64; 2] {
        [
            p[0].clamp(self.origin[0], self.origin[0] + self.size),
            p[1].clamp(self.origin[1], self.origin[1] + self.size),
        ]
    }
}

fn build_index(leaves: &[CellKey]) -> HashMap<CellKey, usize> {
    leaves.iter().enumerate().map(|(n, &k)| (k, n)).collect()
}

#[inline]
fn minmod(a: f64, b: f64) -> f64 {
    if a * b <= 0.0 {
        0.0
    } else if a.abs() < b.abs() {
        a
    } else {
        b
    }
}
