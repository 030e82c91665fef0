//! Domain-edge boundary conditions for cell-centred fields.
//!
//! Every field carries one condition per side of the square domain. Values
//! outside the domain are never stored; they are synthesised on demand as
//! ghost values when a stencil or a sample point crosses an edge.

use serde::{Deserialize, Serialize};

/// One side of the square simulation domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    /// x = x0
    Left = 0,
    /// x = x0 + L
    Right = 1,
    /// y = y0
    Bottom = 2,
    /// y = y0 + L
    Top = 3,
}

impl Side {
    /// All four sides in storage order.
    pub const ALL: [Side; 4] = [Side::Left, Side::Right, Side::Bottom, Side::Top];
}

/// Boundary condition applied on one side of the domain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Boundary {
    /// Zero normal gradient: the ghost value mirrors the interior value.
    #[default]
    Neumann,
    /// Fixed face value: the ghost value is `2 * value - interior`.
    Dirichlet(f64),
}

impl Boundary {
    /// Ghost value seen across the face from a cell holding `interior`.
    #[inline]
    pub fn ghost(self, interior: f64) -> f64 {
        match self {
            Boundary::Neumann => interior,
            Boundary::Dirichlet(value) => 2.0 * value - interior,
        }
    }
}

/// Per-side boundary conditions of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundarySet {
    sides: [Boundary; 4],
}

impl BoundarySet {
    /// Condition on `side`.
    pub fn get(&self, side: Side) -> Boundary {
        self.sides[side as usize]
    }

    /// Replace the condition on `side`.
    pub fn set(&mut self, side: Side, boundary: Boundary) {
        self.sides[side as usize] = boundary;
    }
}
