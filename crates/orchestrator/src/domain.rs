//! Domain & field registry: bounding box, base grid and named fields

use kernel::{Boundary, FieldId, FlowFields, Prolongation, QuadGrid, Side};

use crate::config::SimulationConfig;

/// Rank of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRank {
    /// One value per cell
    Scalar,
    /// Two components per cell, stored as `<name>.x` and `<name>.y`
    Vector,
}

/// Handle to a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldHandle {
    /// Scalar field
    Scalar(FieldId),
    /// Vector field components (x, y)
    Vector([FieldId; 2]),
}

impl FieldHandle {
    /// The scalar id, if this is a scalar field
    pub fn scalar(self) -> Option<FieldId> {
        match self {
            FieldHandle::Scalar(id) => Some(id),
            FieldHandle::Vector(_) => None,
        }
    }

    /// The component ids, if this is a vector field
    pub fn vector(self) -> Option<[FieldId; 2]> {
        match self {
            FieldHandle::Vector(ids) => Some(ids),
            FieldHandle::Scalar(_) => None,
        }
    }
}

/// Simulation box with its mesh and field registry
///
/// The box is square, with its bottom-left corner at `(-L/2, 0)` so that the
/// droplet axis sits at `x = 0` and the wall at `y = 0`.
#[derive(Debug, Clone)]
pub struct Domain {
    grid: QuadGrid,
}

impl Domain {
    /// Establish the box and a uniform base grid of `base_resolution` cells
    /// per side. `base_resolution` must be a power of two (checked by config
    /// validation).
    pub fn configure(box_length: f64, base_resolution: u32) -> Self {
        let base_level = base_resolution.trailing_zeros() as u8;
        let grid = QuadGrid::new([-0.5 * box_length, 0.0], box_length, base_level);
        tracing::debug!(
            "Domain configured: L = {}, base grid {}x{} (level {})",
            box_length,
            base_resolution,
            base_resolution,
            base_level
        );
        Self { grid }
    }

    /// Allocate a field. Redeclaring a name returns the existing field.
    pub fn declare_field(&mut self, name: &str, rank: FieldRank) -> FieldHandle {
        match rank {
            FieldRank::Scalar => FieldHandle::Scalar(self.declare_scalar(name)),
            FieldRank::Vector => FieldHandle::Vector(self.declare_vector(name)),
        }
    }

    /// Allocate a scalar field
    pub fn declare_scalar(&mut self, name: &str) -> FieldId {
        self.grid.add_field(name, Prolongation::Linear)
    }

    /// Allocate a vector field as two scalar components
    pub fn declare_vector(&mut self, name: &str) -> [FieldId; 2] {
        [
            self.grid.add_field(&format!("{name}.x"), Prolongation::Linear),
            self.grid.add_field(&format!("{name}.y"), Prolongation::Linear),
        ]
    }

    /// Look up a field (or vector component, e.g. `"u.y"`) by name
    pub fn field(&self, name: &str) -> Option<FieldId> {
        self.grid.field_id(name)
    }

    /// Bottom-left corner
    pub fn origin(&self) -> [f64; 2] {
        self.grid.origin()
    }

    /// Box edge length
    pub fn box_length(&self) -> f64 {
        self.grid.size()
    }

    /// Mesh (read-only)
    pub fn grid(&self) -> &QuadGrid {
        &self.grid
    }

    /// Mesh (mutable)
    pub fn grid_mut(&mut self) -> &mut QuadGrid {
        &mut self.grid
    }
}

/// Fields of the impact problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImpactFields {
    /// Initial interface, kept for reference after seeding
    pub seed: FieldId,
    /// Live volume fraction
    pub fraction: FieldId,
    /// Velocity components (x, y)
    pub velocity: [FieldId; 2],
    /// Pressure
    pub pressure: FieldId,
}

impl ImpactFields {
    /// Handles handed to the flow solver
    pub fn flow(&self) -> FlowFields {
        FlowFields {
            fraction: self.fraction,
            velocity: self.velocity,
            pressure: self.pressure,
        }
    }
}

/// Build the impact domain: box, base grid, the fields `f0`, `f`, `u`, `p`
/// and the wall conditions.
///
/// The bottom wall is no-slip and dry: both velocity components and `f` are
/// Dirichlet zero there. Every other side keeps the zero-gradient default.
pub fn impact_domain(config: &SimulationConfig) -> (Domain, ImpactFields) {
    let mut domain = Domain::configure(config.box_length, config.base_resolution);

    let fields = ImpactFields {
        seed: domain.declare_scalar("f0"),
        fraction: domain.declare_scalar("f"),
        velocity: domain.declare_vector("u"),
        pressure: domain.declare_scalar("p"),
    };

    let grid = domain.grid_mut();
    grid.set_prolongation(fields.fraction, Prolongation::Fraction);
    for id in [fields.fraction, fields.velocity[0], fields.velocity[1]] {
        grid.set_boundary(id, Side::Bottom, Boundary::Dirichlet(0.0));
    }

    tracing::info!(
        "Domain ready: {} base cells, fields [{}]",
        grid.len(),
        grid.field_ids()
            .map(|id| grid.field_name(id))
            .collect::<Vec<_>>()
            .join(", ")
    );

    (domain, fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_places_origin() {
        let domain = Domain::configure(30e-3, 64);
        assert_eq!(domain.origin(), [-15e-3, 0.0]);
        assert_eq!(domain.box_length(), 30e-3);
        assert_eq!(domain.grid().len(), 64 * 64);
        assert_eq!(domain.grid().base_level(), 6);
    }

    #[test]
    fn test_vector_fields_expand_to_components() {
        let mut domain = Domain::configure(1.0, 4);
        let u = domain.declare_field("u", FieldRank::Vector).vector().unwrap();
        assert_eq!(domain.field("u.x"), Some(u[0]));
        assert_eq!(domain.field("u.y"), Some(u[1]));
        assert_eq!(domain.field("u"), None);

        let again = domain.declare_field("u", FieldRank::Vector).vector().unwrap();
        assert_eq!(again, u);
        assert_eq!(domain.grid().field_count(), 2);
    }

    #[test]
    fn test_impact_domain_boundary_conditions() {
        let (domain, fields) = impact_domain(&SimulationConfig::default());
        let grid = domain.grid();
        assert_eq!(grid.field_count(), 5);
        for id in [fields.fraction, fields.velocity[0], fields.velocity[1]] {
            assert_eq!(grid.boundary(id, Side::Bottom), Boundary::Dirichlet(0.0));
            assert_eq!(grid.boundary(id, Side::Top), Boundary::Neumann);
        }
        assert_eq!(grid.boundary(fields.pressure, Side::Bottom), Boundary::Neumann);
        assert_eq!(grid.prolongation(fields.fraction), Prolongation::Fraction);
    }
}
