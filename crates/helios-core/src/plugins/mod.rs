//! # Plugin Models
//!
//! Each plugin is compiled only when its Cargo feature is enabled. Plugins never
//! call each other; they read their inputs from and write their outputs to
//! primitive data in the [`Context`](crate::core::context::Context):
//!
//! | Plugin | Reads | Writes |
//! |--------|-------|--------|
//! | [`radiation`] | `reflectivity_<band>`, `transmissivity_<band>`, `emissivity_<band>`, `temperature` | `radiation_flux_<band>` |
//! | [`photosynthesis`] | `radiation_flux_PAR`, `temperature`, `air_CO2`, `moisture_conductance`, `boundarylayer_conductance` | `net_photosynthesis` |
//! | [`stomatal`] | `net_photosynthesis`, `air_*`, `temperature`, `radiation_flux_PAR` | `moisture_conductance` |
//! | [`energy_balance`] | `radiation_flux_<band>`, `air_*`, `wind_speed`, conductances | `temperature`, `sensible_flux`, `latent_flux` |
//! | [`boundary_layer`] | `wind_speed`, `object_length`, `air_temperature`, `temperature` | `boundarylayer_conductance` |
//! | [`sky_view_factor`] | geometry | `sky_view_factor` |
//!
//! The geometry generators ([`plant_architecture`], [`weber_penn`]) add primitives
//! and objects to the context; [`solar_position`] reads its date, time and
//! location; [`visualizer`] renders it.

#[cfg(feature = "boundarylayer")]
pub mod boundary_layer;
#[cfg(feature = "energybalance")]
pub mod energy_balance;
#[cfg(feature = "photosynthesis")]
pub mod photosynthesis;
#[cfg(feature = "plantarchitecture")]
pub mod plant_architecture;
#[cfg(feature = "radiation")]
pub mod radiation;
#[cfg(feature = "skyviewfactor")]
pub mod sky_view_factor;
#[cfg(feature = "solarposition")]
pub mod solar_position;
#[cfg(feature = "stomatalconductance")]
pub mod stomatal;
#[cfg(feature = "visualizer")]
pub mod visualizer;
#[cfg(feature = "weberpenntree")]
pub mod weber_penn;

use crate::core::context::Uuid;
use std::collections::HashMap;

/// Per-UUID parameter assignment with a model-wide default.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap<T> {
    default: T,
    overrides: HashMap<Uuid, T>,
}

impl<T: Clone> ParameterMap<T> {
    pub fn new(default: T) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Replaces the default and discards every per-UUID assignment.
    pub fn set_default(&mut self, value: T) {
        self.default = value;
        self.overrides.clear();
    }

    pub fn set_for(&mut self, uuids: &[Uuid], value: T) {
        for uuid in uuids {
            self.overrides.insert(*uuid, value.clone());
        }
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn get(&self, uuid: Uuid) -> &T {
        self.overrides.get(&uuid).unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence_until_the_default_is_reset() {
        let mut map = ParameterMap::new(1.0f32);
        map.set_for(&[3, 4], 2.0);
        assert_eq!(*map.get(3), 2.0);
        assert_eq!(*map.get(5), 1.0);
        map.set_default(0.5);
        assert_eq!(*map.get(3), 0.5);
    }
}
