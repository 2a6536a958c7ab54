//! # Surface Energy Balance
//!
//! Solves the steady (or, with a time step, transient) energy budget of every
//! primitive for its surface temperature `T`:
//!
//! ```text
//! R_abs − n ε σ T⁴ − n c_p g_H (T − T_a) − λ g_M (e_s(T) − e_a) / P − S = 0
//! ```
//!
//! `R_abs` sums `radiation_flux_<band>` over the registered bands and `n` is the
//! number of exchanging faces (two unless `twosided_flag` is zero). The moisture
//! conductance `g_M` combines the stomatal conductance in series with the
//! boundary-layer conductance to vapour. In dynamic runs the storage term is
//! `S = C (T − T_prev) / Δt`, where `C` is `heat_capacity` (J m⁻² K⁻¹).

use crate::core::constants::{
    CP_AIR_MOLAR, LAMBDA_WATER_MOLAR, STANDARD_PRESSURE, STEFAN_BOLTZMANN, saturation_vapor_pressure,
};
use crate::core::context::{Context, ContextError, Uuid};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{info, instrument, warn};

const OPTIONAL_OUTPUTS: [&str; 2] = ["net_radiation_flux", "storage_flux"];
const MAX_ITERATIONS: usize = 150;
const TOLERANCE: f32 = 1e-4;
const TEMPERATURE_TOLERANCE: f32 = 1e-3;

#[derive(Debug, Error)]
pub enum EnergyBalanceError {
    #[error("Invalid energy balance parameter: {0}")]
    InvalidParameter(String),
    #[error("Energy balance did not converge for UUID {0}")]
    NoConvergence(Uuid),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, EnergyBalanceError>;

#[derive(Debug, Clone, Copy)]
struct SurfaceInputs {
    absorbed: f32,
    air_temperature: f32,
    vapor_pressure: f32,
    pressure: f32,
    emissivity: f32,
    sides: f32,
    gh: f32,
    gm: f32,
    heat_capacity: f32,
    previous_temperature: f32,
}

#[derive(Debug, Clone, Copy)]
struct SurfaceFluxes {
    temperature: f32,
    sensible: f32,
    latent: f32,
    net_radiation: f32,
    storage: f32,
}

impl SurfaceInputs {
    fn fluxes(&self, t: f32, dt: Option<f32>) -> SurfaceFluxes {
        let emitted = self.sides * self.emissivity * STEFAN_BOLTZMANN * t.powi(4);
        let sensible = self.sides * CP_AIR_MOLAR * self.gh * (t - self.air_temperature);
        let latent =
            LAMBDA_WATER_MOLAR * self.gm * (saturation_vapor_pressure(t) - self.vapor_pressure) / self.pressure;
        let storage = match dt {
            Some(dt) => self.heat_capacity * (t - self.previous_temperature) / dt,
            None => 0.0,
        };
        SurfaceFluxes {
            temperature: t,
            sensible,
            latent,
            net_radiation: self.absorbed - emitted,
            storage,
        }
    }

    fn residual(&self, t: f32, dt: Option<f32>) -> f32 {
        let f = self.fluxes(t, dt);
        f.net_radiation - f.sensible - f.latent - f.storage
    }

    /// Secant iteration started from the air temperature.
    fn solve(&self, dt: Option<f32>) -> Option<SurfaceFluxes> {
        let mut t0 = self.air_temperature;
        let mut t1 = self.air_temperature + 1.0;
        let mut f0 = self.residual(t0, dt);
        if f0.abs() < TOLERANCE {
            return Some(self.fluxes(t0, dt));
        }
        for _ in 0..MAX_ITERATIONS {
            let f1 = self.residual(t1, dt);
            if f1.abs() < TOLERANCE {
                return Some(self.fluxes(t1, dt));
            }
            let slope = (f1 - f0) / (t1 - t0);
            if slope == 0.0 || !slope.is_finite() {
                return ((t1 - t0).abs() < TEMPERATURE_TOLERANCE).then(|| self.fluxes(t1, dt));
            }
            let next = t1 - f1 / slope;
            if !next.is_finite() {
                return None;
            }
            if (next - t1).abs() < TEMPERATURE_TOLERANCE {
                return Some(self.fluxes(next, dt));
            }
            (t0, f0, t1) = (t1, f1, next.max(1.0));
        }
        None
    }
}

#[derive(Debug, Default)]
pub struct EnergyBalanceModel {
    bands: Vec<String>,
    optional_outputs: Vec<String>,
    messages: bool,
}

impl EnergyBalanceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_messages(&mut self) {
        self.messages = true;
    }

    pub fn disable_messages(&mut self) {
        self.messages = false;
    }

    /// Registers a band whose `radiation_flux_<band>` contributes to the absorbed radiation.
    pub fn add_radiation_band(&mut self, band: &str) -> Result<()> {
        if band.is_empty() {
            return Err(EnergyBalanceError::InvalidParameter(
                "band label must not be empty".to_string(),
            ));
        }
        if !self.bands.iter().any(|b| b == band) {
            self.bands.push(band.to_string());
        }
        Ok(())
    }

    pub fn add_radiation_bands(&mut self, bands: &[&str]) -> Result<()> {
        for band in bands {
            self.add_radiation_band(band)?;
        }
        Ok(())
    }

    pub fn radiation_bands(&self) -> &[String] {
        &self.bands
    }

    pub fn optional_output_primitive_data(&mut self, label: &str) -> Result<()> {
        if !OPTIONAL_OUTPUTS.contains(&label) {
            return Err(EnergyBalanceError::InvalidParameter(format!(
                "'{label}' is not an optional output; expected one of {}",
                OPTIONAL_OUTPUTS.join(", ")
            )));
        }
        if !self.optional_outputs.iter().any(|l| l == label) {
            self.optional_outputs.push(label.to_string());
        }
        Ok(())
    }

    pub fn run(&self, context: &mut Context) -> Result<()> {
        let uuids = context.all_uuids();
        self.run_for_uuids(context, &uuids)
    }

    pub fn run_dynamic(&self, context: &mut Context, dt: f32) -> Result<()> {
        let uuids = context.all_uuids();
        self.run_for_uuids_dynamic(context, &uuids, dt)
    }

    #[instrument(skip_all, name = "energy_balance_run")]
    pub fn run_for_uuids(&self, context: &mut Context, uuids: &[Uuid]) -> Result<()> {
        self.solve(context, uuids, None)
    }

    #[instrument(skip_all, name = "energy_balance_run_dynamic", fields(dt = dt))]
    pub fn run_for_uuids_dynamic(&self, context: &mut Context, uuids: &[Uuid], dt: f32) -> Result<()> {
        if !(dt > 0.0) {
            return Err(EnergyBalanceError::InvalidParameter(format!(
                "time step {dt} must be positive"
            )));
        }
        self.solve(context, uuids, Some(dt))
    }

    fn inputs(&self, context: &Context, uuid: Uuid) -> Result<SurfaceInputs> {
        let value = |label: &str, default: f32| context.primitive_float_or(uuid, label, default);
        let absorbed: f32 = self
            .bands
            .iter()
            .map(|b| value(&format!("radiation_flux_{b}"), 0.0))
            .sum();
        let air_temperature = value("air_temperature", 300.0);
        let humidity = value("air_humidity", 0.5).clamp(0.0, 1.0);
        let wind_speed = value("wind_speed", 1.0).max(0.0);
        let length = match value("object_length", 0.0) {
            l if l > 0.0 => l,
            _ => context.primitive_area(uuid)?.sqrt(),
        };
        let gh = match context.primitive_scalar(uuid, "boundarylayer_conductance") {
            Some(g) => g,
            None if length > 0.0 => 0.135 * (wind_speed / length).sqrt(),
            None => 0.0,
        };
        let gs = value("moisture_conductance", 0.0);
        let gm = if gs > 0.0 && gh > 0.0 {
            1.0 / (1.0 / gs + 1.0 / (1.08 * gh))
        } else {
            0.0
        };
        Ok(SurfaceInputs {
            absorbed,
            air_temperature,
            vapor_pressure: humidity * saturation_vapor_pressure(air_temperature),
            pressure: value("air_pressure", STANDARD_PRESSURE),
            emissivity: value("emissivity", 1.0),
            sides: if value("twosided_flag", 1.0) == 0.0 { 1.0 } else { 2.0 },
            gh,
            gm,
            heat_capacity: value("heat_capacity", 0.0),
            previous_temperature: value("temperature", air_temperature),
        })
    }

    fn solve(&self, context: &mut Context, uuids: &[Uuid], dt: Option<f32>) -> Result<()> {
        context.validate_uuids(uuids)?;
        let inputs = uuids
            .iter()
            .map(|&uuid| Ok((uuid, self.inputs(context, uuid)?)))
            .collect::<Result<Vec<_>>>()?;

        let solved = inputs
            .par_iter()
            .map(|(uuid, input)| {
                input
                    .solve(dt)
                    .map(|f| (*uuid, f))
                    .ok_or(EnergyBalanceError::NoConvergence(*uuid))
            })
            .collect::<Result<Vec<_>>>();
        let solved = match solved {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Energy balance solve failed.");
                return Err(e);
            }
        };

        for (uuid, f) in &solved {
            context.set_primitive_data(*uuid, "temperature", f.temperature)?;
            context.set_primitive_data(*uuid, "sensible_flux", f.sensible)?;
            context.set_primitive_data(*uuid, "latent_flux", f.latent)?;
            for label in &self.optional_outputs {
                match label.as_str() {
                    "net_radiation_flux" => context.set_primitive_data(*uuid, label, f.net_radiation)?,
                    "storage_flux" => context.set_primitive_data(*uuid, label, f.storage)?,
                    _ => {}
                }
            }
        }
        if self.messages {
            info!(primitives = solved.len(), bands = self.bands.len(), "Energy balance model finished.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{RgbColor, SphericalCoord, Vec2, Vec3};

    fn f32_approx_equal(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() < tol
    }

    fn leaf(ctx: &mut Context) -> Uuid {
        let uuid = ctx
            .add_patch(Vec3::zeros(), Vec2::new(0.1, 0.1), SphericalCoord::default(), RgbColor::GREEN.into())
            .unwrap();
        ctx.set_primitive_data(uuid, "air_temperature", 295.0f32).unwrap();
        uuid
    }

    #[test]
    fn patch_without_radiation_relaxes_to_air_temperature() {
        let mut ctx = Context::new();
        let uuid = leaf(&mut ctx);
        ctx.set_primitive_data(uuid, "emissivity", 0.0f32).unwrap();
        let model = EnergyBalanceModel::new();
        model.run(&mut ctx).unwrap();
        let t: f32 = ctx.get_primitive_data(uuid, "temperature").unwrap();
        let h: f32 = ctx.get_primitive_data(uuid, "sensible_flux").unwrap();
        assert!(f32_approx_equal(t, 295.0, 1e-2));
        assert!(f32_approx_equal(h, 0.0, 1e-2));
    }

    #[test]
    fn absorbed_radiation_warms_and_transpiration_cools() {
        let mut ctx = Context::new();
        let dry = leaf(&mut ctx);
        let wet = leaf(&mut ctx);
        for uuid in [dry, wet] {
            ctx.set_primitive_data(uuid, "radiation_flux_SW", 400.0f32).unwrap();
            ctx.set_primitive_data(uuid, "radiation_flux_LW", 2.0 * STEFAN_BOLTZMANN * 295.0f32.powi(4))
                .unwrap();
        }
        ctx.set_primitive_data(wet, "moisture_conductance", 0.3f32).unwrap();

        let mut model = EnergyBalanceModel::new();
        model.add_radiation_bands(&["SW", "LW", "SW"]).unwrap();
        assert_eq!(model.radiation_bands().len(), 2);
        model.optional_output_primitive_data("net_radiation_flux").unwrap();
        model.run(&mut ctx).unwrap();

        let t_dry: f32 = ctx.get_primitive_data(dry, "temperature").unwrap();
        let t_wet: f32 = ctx.get_primitive_data(wet, "temperature").unwrap();
        let le: f32 = ctx.get_primitive_data(wet, "latent_flux").unwrap();
        assert!(t_dry > 295.0);
        assert!(t_wet < t_dry);
        assert!(le > 0.0);

        let rn: f32 = ctx.get_primitive_data(dry, "net_radiation_flux").unwrap();
        let h: f32 = ctx.get_primitive_data(dry, "sensible_flux").unwrap();
        assert!(f32_approx_equal(rn, h, 0.5));
    }

    #[test]
    fn dynamic_run_moves_part_way_toward_equilibrium() {
        let mut ctx = Context::new();
        let uuid = leaf(&mut ctx);
        ctx.set_primitive_data(uuid, "emissivity", 0.0f32).unwrap();
        ctx.set_primitive_data(uuid, "temperature", 305.0f32).unwrap();
        ctx.set_primitive_data(uuid, "heat_capacity", 5000.0f32).unwrap();
        let mut model = EnergyBalanceModel::new();
        model.optional_output_primitive_data("storage_flux").unwrap();
        model.run_dynamic(&mut ctx, 10.0).unwrap();
        let t: f32 = ctx.get_primitive_data(uuid, "temperature").unwrap();
        let s: f32 = ctx.get_primitive_data(uuid, "storage_flux").unwrap();
        assert!(t > 295.0 && t < 305.0);
        assert!(s < 0.0);
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        let mut ctx = Context::new();
        leaf(&mut ctx);
        let mut model = EnergyBalanceModel::new();
        assert!(matches!(
            model.run_dynamic(&mut ctx, -1.0),
            Err(EnergyBalanceError::InvalidParameter(_))
        ));
        assert!(matches!(
            model.optional_output_primitive_data("vapor"),
            Err(EnergyBalanceError::InvalidParameter(_))
        ));
        assert!(matches!(
            model.run_for_uuids(&mut ctx, &[99]),
            Err(EnergyBalanceError::Context(ContextError::UuidNotFound(99)))
        ));
    }
}
