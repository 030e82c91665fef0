//! Adaptive refinement controller
//!
//! Holds the field set and the matching tolerance vector, and runs one
//! wavelet adaptation pass per completed step.

use kernel::{adapt_wavelet, AdaptStats, FieldId, QuadGrid};

use crate::config::SimulationConfig;
use crate::domain::ImpactFields;

/// Per-step refine/coarsen driver
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementController {
    fields: Vec<FieldId>,
    tolerances: Vec<f64>,
    max_level: u8,
    min_level: u8,
}

impl RefinementController {
    /// Create a controller. `fields[k]` is adapted against `tolerances[k]`;
    /// the two slices must have the same length.
    pub fn new(fields: &[FieldId], tolerances: &[f64], max_level: u8, min_level: u8) -> Self {
        debug_assert_eq!(
            fields.len(),
            tolerances.len(),
            "one tolerance is required per adapted field"
        );
        Self {
            fields: fields.to_vec(),
            tolerances: tolerances.to_vec(),
            max_level,
            min_level,
        }
    }

    /// Controller for the impact fields in the order f, p, u.x, u.y.
    /// Cells never coarsen below the base grid.
    pub fn for_impact(fields: &ImpactFields, config: &SimulationConfig) -> Self {
        Self::new(
            &[
                fields.fraction,
                fields.pressure,
                fields.velocity[0],
                fields.velocity[1],
            ],
            &config.tolerances.as_array(),
            config.max_level,
            config.base_level(),
        )
    }

    /// Adapted fields, in tolerance order
    pub fn fields(&self) -> &[FieldId] {
        &self.fields
    }

    /// Tolerances, in field order
    pub fn tolerances(&self) -> &[f64] {
        &self.tolerances
    }

    /// Finest level the pass may create
    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    /// One refine/coarsen pass over the whole mesh.
    pub fn adapt_step(&self, grid: &mut QuadGrid) -> AdaptStats {
        let stats = adapt_wavelet(
            grid,
            &self.fields,
            &self.tolerances,
            self.max_level,
            self.min_level,
        );
        tracing::debug!(
            "adapt: +{} split, -{} merged, {} cells",
            stats.refined,
            stats.coarsened,
            stats.cells
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::impact_domain;
    use crate::initial::seed;

    #[test]
    fn test_field_and_tolerance_order() {
        let mut config = SimulationConfig::default();
        config.tolerances.pressure = 0.5;
        config.tolerances.velocity_y = 0.25;
        let (_, fields) = impact_domain(&config);

        let controller = RefinementController::for_impact(&fields, &config);
        assert_eq!(
            controller.fields(),
            &[fields.fraction, fields.pressure, fields.velocity[0], fields.velocity[1]]
        );
        assert_eq!(controller.tolerances(), &[0.01, 0.5, 0.01, 0.25]);
        assert_eq!(controller.max_level(), 8);
    }

    #[test]
    fn test_adapt_keeps_interface_resolved() {
        let config = SimulationConfig {
            base_resolution: 32,
            max_level: 7,
            ..SimulationConfig::default()
        };
        let (mut domain, fields) = impact_domain(&config);
        seed(&mut domain, &fields, &config);
        let controller = RefinementController::for_impact(&fields, &config);

        let area = domain.grid().integrate(fields.fraction);
        for _ in 0..3 {
            controller.adapt_step(domain.grid_mut());
        }
        let grid = domain.grid();
        assert_eq!(grid.depth(), config.max_level);
        assert!(grid.leaves().iter().all(|k| k.level >= grid.base_level()));

        // Restriction and fraction prolongation both conserve the liquid area
        let after = grid.integrate(fields.fraction);
        assert!((after - area).abs() / area < 1e-9, "{after} vs {area}");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "one tolerance is required")]
    fn test_mismatched_tolerances() {
        let config = SimulationConfig::default();
        let (_, fields) = impact_domain(&config);
        RefinementController::new(&[fields.fraction], &[0.01, 0.01], 8, 6);
    }
}
