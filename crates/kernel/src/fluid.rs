//! Two-phase fluid properties.
//!
//! Phase 1 is the liquid (volume fraction `f = 1`), phase 2 the gas
//! (`f = 0`). Mixed cells use the arithmetic mean weighted by `f` for both
//! density and dynamic viscosity. All units are SI.

use serde::{Deserialize, Serialize};

/// Density of water at room temperature (kg/m^3).
pub const WATER_DENSITY: f64 = 997.0;

/// Dynamic viscosity of water at room temperature (Pa s).
pub const WATER_VISCOSITY: f64 = 0.89e-3;

/// Density of air at room temperature (kg/m^3).
pub const AIR_DENSITY: f64 = 1.293;

/// Dynamic viscosity of air at room temperature (Pa s).
pub const AIR_VISCOSITY: f64 = 1.8e-5;

/// Surface tension of a water/air interface (N/m).
pub const WATER_AIR_SURFACE_TENSION: f64 = 72.8e-3;

/// Material constants handed to the flow solver before the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidProperties {
    /// Liquid density (kg/m^3)
    pub rho1: f64,
    /// Gas density (kg/m^3)
    pub rho2: f64,
    /// Liquid dynamic viscosity (Pa s)
    pub mu1: f64,
    /// Gas dynamic viscosity (Pa s)
    pub mu2: f64,
    /// Surface tension coefficient (N/m)
    pub sigma: f64,
}

impl FluidProperties {
    /// Water droplet in air.
    pub fn water_air() -> Self {
        Self {
            rho1: WATER_DENSITY,
            rho2: AIR_DENSITY,
            mu1: WATER_VISCOSITY,
            mu2: AIR_VISCOSITY,
            sigma: WATER_AIR_SURFACE_TENSION,
        }
    }

    /// Mixture density for volume fraction `f`.
    #[inline]
    pub fn density(&self, f: f64) -> f64 {
        let f = f.clamp(0.0, 1.0);
        f * self.rho1 + (1.0 - f) * self.rho2
    }

    /// Mixture dynamic viscosity for volume fraction `f`.
    #[inline]
    pub fn viscosity(&self, f: f64) -> f64 {
        let f = f.clamp(0.0, 1.0);
        f * self.mu1 + (1.0 - f) * self.mu2
    }

    /// Mixture kinematic viscosity `mu(f) / rho(f)`.
    #[inline]
    pub fn kinematic_viscosity(&self, f: f64) -> f64 {
        self.viscosity(f) / self.density(f)
    }

    /// Largest kinematic viscosity of the two pure phases.
    pub fn max_kinematic_viscosity(&self) -> f64 {
        (self.mu1 / self.rho1).max(self.mu2 / self.rho2)
    }

    /// Mean of the two phase densities, used by the capillary step limit.
    pub fn mean_density(&self) -> f64 {
        0.5 * (self.rho1 + self.rho2)
    }
}

impl Default for FluidProperties {
    fn default() -> Self {
        Self::water_air()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_phases_recover_their_constants() {
        let p = FluidProperties::water_air();
        assert_eq!(p.density(1.0), WATER_DENSITY);
        assert_eq!(p.density(0.0), AIR_DENSITY);
        assert_eq!(p.viscosity(1.0), WATER_VISCOSITY);
        assert_eq!(p.viscosity(0.0), AIR_VISCOSITY);
    }

    #[test]
    fn fraction_is_clamped() {
        let p = FluidProperties::water_air();
        assert_eq!(p.density(1.5), WATER_DENSITY);
        assert_eq!(p.density(-0.5), AIR_DENSITY);
    }

    #[test]
    fn air_is_the_more_diffusive_phase() {
        let p = FluidProperties::water_air();
        let nu_air = AIR_VISCOSITY / AIR_DENSITY;
        assert!((p.max_kinematic_viscosity() - nu_air).abs() < 1e-18);
        assert!(p.kinematic_viscosity(1.0) < p.kinematic_viscosity(0.0));
    }
}
