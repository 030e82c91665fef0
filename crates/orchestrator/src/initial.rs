//! Initial condition: refined droplet interface and impact velocity

use kernel::{refine_where, vof, Prolongation};

use crate::config::SimulationConfig;
use crate::domain::{Domain, ImpactFields};

/// What the seeding pass produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedReport {
    /// Cells split by the pre-refinement
    pub refined: usize,
    /// Leaf count after seeding
    pub cells: usize,
    /// Area of the liquid, `sum(f * cell area)` (m^2)
    pub liquid_area: f64,
    /// Analytic droplet area `pi * (D/2)^2` (m^2)
    pub exact_area: f64,
}

impl SeedReport {
    /// Relative difference between the seeded and analytic areas
    pub fn area_error(&self) -> f64 {
        (self.liquid_area - self.exact_area).abs() / self.exact_area
    }
}

/// Seed the droplet.
///
/// 1. Refine every cell whose centre lies within `sqrt(2) * D/2` of the
///    droplet centre `(0, h0)` up to `max_level`.
/// 2. Compute the volume fraction of `(D/2)^2 - x^2 - (y - h0)^2 > 0` into
///    the seed field, which from then on prolongs conservatively.
/// 3. Copy the seed into the live fraction and set `u.y = -U0 * f`.
pub fn seed(domain: &mut Domain, fields: &ImpactFields, config: &SimulationConfig) -> SeedReport {
    let radius = 0.5 * config.drop_diameter;
    let h0 = config.start_height;
    let grid = domain.grid_mut();

    let refined = refine_where(grid, config.max_level, |cell| {
        let [x, y] = cell.center;
        x * x + (y - h0) * (y - h0) < 2.0 * radius * radius
    });

    vof::fraction(grid, fields.seed, |x, y| {
        radius * radius - x * x - (y - h0) * (y - h0)
    });
    grid.set_prolongation(fields.seed, Prolongation::Fraction);

    let seeded = grid.values(fields.seed).to_vec();
    let u0 = config.impact_velocity;
    grid.values_mut(fields.fraction).copy_from_slice(&seeded);
    for (u, f) in grid.values_mut(fields.velocity[1]).iter_mut().zip(&seeded) {
        *u = -u0 * f;
    }

    let report = SeedReport {
        refined,
        cells: grid.len(),
        liquid_area: grid.integrate(fields.fraction),
        exact_area: std::f64::consts::PI * radius * radius,
    };
    tracing::info!(
        "Droplet seeded: {} splits, {} cells, area error {:.3e}",
        report.refined,
        report.cells,
        report.area_error()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::impact_domain;

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            base_resolution: 32,
            max_level: 7,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_seed_area_matches_circle() {
        let config = small_config();
        let (mut domain, fields) = impact_domain(&config);
        let report = seed(&mut domain, &fields, &config);

        assert!(report.refined > 0);
        assert!(
            report.area_error() < 0.02,
            "seeded area {} vs {}",
            report.liquid_area,
            report.exact_area
        );
        assert_eq!(domain.grid().depth(), config.max_level);
    }

    #[test]
    fn test_seed_sets_downward_velocity_inside_drop() {
        let config = small_config();
        let (mut domain, fields) = impact_domain(&config);
        seed(&mut domain, &fields, &config);
        let grid = domain.grid();

        let centre = grid.locate([0.0, config.start_height]).unwrap();
        assert_eq!(grid.values(fields.fraction)[centre], 1.0);
        assert_eq!(grid.values(fields.velocity[1])[centre], -config.impact_velocity);
        assert_eq!(grid.values(fields.velocity[0])[centre], 0.0);

        let far = grid.locate([10e-3, 20e-3]).unwrap();
        assert_eq!(grid.values(fields.fraction)[far], 0.0);
        assert_eq!(grid.values(fields.velocity[1])[far], 0.0);

        // f and f0 coincide after seeding
        assert_eq!(grid.values(fields.fraction), grid.values(fields.seed));
        assert!(grid
            .values(fields.fraction)
            .iter()
            .all(|&f| (0.0..=1.0).contains(&f)));
    }

    #[test]
    fn test_refinement_is_confined_to_circle() {
        let config = small_config();
        let (mut domain, fields) = impact_domain(&config);
        seed(&mut domain, &fields, &config);
        let grid = domain.grid();

        let corner = grid.locate([-14e-3, 29e-3]).unwrap();
        assert_eq!(grid.leaves()[corner].level, grid.base_level());
    }
}
