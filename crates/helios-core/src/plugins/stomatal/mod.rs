//! # Stomatal Conductance
//!
//! Semi-empirical steady-state models of stomatal conductance to water vapour,
//! written to primitive data as `moisture_conductance` (mol m⁻² s⁻¹):
//!
//! - **BWB** (Ball, Woodrow & Berry 1987): `gs = gs0 + a1 · A · hs / Cs`
//! - **BBL** (Ball–Berry–Leuning 1995): `gs = gs0 + a1 · A / ((Cs − Γ)(1 + Ds/D0))`
//! - **MOPT** (Medlyn et al. 2011): `gs = gs0 + 1.6 (1 + g1/√Ds) · A / Cs`
//! - **BMF** (Buckley, Mott & Farquhar 2003): `gs = Em (Q + i0) / (k + b Q + (Q + i0) Ds)`
//!
//! In dynamic mode the conductance stored on the primitive relaxes toward the
//! steady-state value with an exponential time constant, which differs for
//! opening and closing.

use super::ParameterMap;
use crate::core::constants::{GAS_CONSTANT, PAR_W_TO_UMOL, ZERO_CELSIUS, saturation_vapor_pressure};
use crate::core::context::{Context, ContextError, Uuid};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, instrument};

const BMF_LIBRARY: &str = include_str!("bmf_species.toml");

const OUTPUT_LABEL: &str = "moisture_conductance";

#[derive(Debug, Error)]
pub enum StomatalError {
    #[error("Species '{0}' is not in the stomatal conductance library")]
    UnknownSpecies(String),
    #[error("Invalid stomatal conductance parameter: {0}")]
    InvalidParameter(String),
    #[error("Failed to parse the stomatal conductance species library: {0}")]
    Library(#[from] toml::de::Error),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, StomatalError>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BwbCoefficients {
    pub gs0: f32,
    pub a1: f32,
}

impl Default for BwbCoefficients {
    fn default() -> Self {
        Self { gs0: 0.0733, a1: 9.422 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BblCoefficients {
    pub gs0: f32,
    pub a1: f32,
    /// Vapour pressure deficit scale, mmol mol⁻¹.
    pub d0: f32,
}

impl Default for BblCoefficients {
    fn default() -> Self {
        Self {
            gs0: 0.0743,
            a1: 4.265,
            d0: 14570.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoptCoefficients {
    pub gs0: f32,
    /// kPa^0.5.
    pub g1: f32,
}

impl Default for MoptCoefficients {
    fn default() -> Self {
        Self { gs0: 0.0825, g1: 2.637 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BmfCoefficients {
    pub em: f32,
    pub i0: f32,
    pub k: f32,
    pub b: f32,
}

impl Default for BmfCoefficients {
    fn default() -> Self {
        Self {
            em: 7.92,
            i0: 53.46,
            k: 12220.0,
            b: 3.07,
        }
    }
}

/// Model and coefficients applied to one primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StomatalModel {
    Bwb(BwbCoefficients),
    Bbl(BblCoefficients),
    Mopt(MoptCoefficients),
    Bmf(BmfCoefficients),
}

impl Default for StomatalModel {
    fn default() -> Self {
        StomatalModel::Bmf(BmfCoefficients::default())
    }
}

/// Leaf-surface environment derived from primitive data.
#[derive(Debug, Clone, Copy)]
struct SurfaceState {
    assimilation: f32,
    /// Leaf-surface CO₂, µmol mol⁻¹.
    cs: f32,
    /// Leaf-surface relative humidity, 0–1.
    hs: f32,
    /// Leaf-to-air vapour pressure deficit, mmol mol⁻¹.
    ds: f32,
    /// CO₂ compensation point, µmol mol⁻¹.
    gamma: f32,
    /// Photon flux, µmol m⁻² s⁻¹.
    par: f32,
}

fn surface_state(context: &Context, uuid: Uuid) -> SurfaceState {
    let assimilation = context.primitive_float_or(uuid, "net_photosynthesis", 0.0);
    let ca = context.primitive_float_or(uuid, "air_CO2", 390.0);
    let humidity = context.primitive_float_or(uuid, "air_humidity", 0.5).clamp(0.0, 1.0);
    let t_air = context.primitive_float_or(uuid, "air_temperature", 300.0);
    let t_leaf = context.primitive_float_or(uuid, "temperature", 300.0);
    let gb = context.primitive_float_or(uuid, "boundarylayer_conductance", 1.0);
    let pressure = context.primitive_float_or(uuid, "air_pressure", crate::core::constants::STANDARD_PRESSURE);
    let par = context.primitive_float_or(uuid, "radiation_flux_PAR", 0.0) * PAR_W_TO_UMOL;

    let ea = humidity * saturation_vapor_pressure(t_air);
    let es_leaf = saturation_vapor_pressure(t_leaf);
    // Cs stays positive; the models divide by it.
    let cs = if gb > 0.0 { ca - 1.37 * assimilation / gb } else { ca };
    let cs = cs.max(1.0);
    let gamma = 42.75 * (37_830.0 / GAS_CONSTANT * (1.0 / (ZERO_CELSIUS + 25.0) - 1.0 / t_leaf)).exp();
    SurfaceState {
        assimilation,
        cs,
        hs: (ea / es_leaf).clamp(0.0, 1.0),
        ds: ((es_leaf - ea).max(0.0) / pressure) * 1000.0,
        gamma,
        par,
    }
}

fn steady_state(model: &StomatalModel, s: &SurfaceState) -> f32 {
    let a = s.assimilation.max(0.0);
    let gs = match *model {
        StomatalModel::Bwb(c) => c.gs0 + c.a1 * a * s.hs / s.cs,
        StomatalModel::Bbl(c) => {
            let drive = (s.cs - s.gamma).max(1.0);
            c.gs0 + c.a1 * a / (drive * (1.0 + s.ds / c.d0))
        }
        StomatalModel::Mopt(c) => {
            // Medlyn's D is in kPa: mmol mol⁻¹ × ~0.1 at sea level.
            let d_kpa = (s.ds * 0.101_325).max(1e-3);
            c.gs0 + 1.6 * (1.0 + c.g1 / d_kpa.sqrt()) * a / s.cs
        }
        StomatalModel::Bmf(c) => {
            let q = s.par.max(0.0);
            c.em * (q + c.i0) / (c.k + c.b * q + (q + c.i0) * s.ds)
        }
    };
    gs.max(0.0)
}

/// Parses the embedded BMF species table.
pub fn bmf_library() -> Result<BTreeMap<String, BmfCoefficients>> {
    Ok(toml::from_str(BMF_LIBRARY)?)
}

fn bmf_species(species: &str) -> Result<BmfCoefficients> {
    bmf_library()?
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(species))
        .map(|(_, c)| c)
        .ok_or_else(|| StomatalError::UnknownSpecies(species.to_string()))
}

#[derive(Debug)]
pub struct StomatalConductanceModel {
    models: ParameterMap<StomatalModel>,
    tau_open: f32,
    tau_close: f32,
    messages: bool,
}

impl Default for StomatalConductanceModel {
    fn default() -> Self {
        Self::new()
    }
}

impl StomatalConductanceModel {
    pub fn new() -> Self {
        Self {
            models: ParameterMap::new(StomatalModel::default()),
            tau_open: 300.0,
            tau_close: 300.0,
            messages: false,
        }
    }

    pub fn enable_messages(&mut self) {
        self.messages = true;
    }

    pub fn disable_messages(&mut self) {
        self.messages = false;
    }

    pub fn set_model(&mut self, model: StomatalModel) {
        self.models.set_default(model);
    }

    pub fn set_model_for_uuids(&mut self, model: StomatalModel, uuids: &[Uuid]) {
        self.models.set_for(uuids, model);
    }

    pub fn model_for(&self, uuid: Uuid) -> StomatalModel {
        *self.models.get(uuid)
    }

    pub fn set_bwb_coefficients(&mut self, coefficients: BwbCoefficients) {
        self.set_model(StomatalModel::Bwb(coefficients));
    }

    pub fn set_bwb_coefficients_for_uuids(&mut self, coefficients: BwbCoefficients, uuids: &[Uuid]) {
        self.set_model_for_uuids(StomatalModel::Bwb(coefficients), uuids);
    }

    pub fn set_bbl_coefficients(&mut self, coefficients: BblCoefficients) {
        self.set_model(StomatalModel::Bbl(coefficients));
    }

    pub fn set_bbl_coefficients_for_uuids(&mut self, coefficients: BblCoefficients, uuids: &[Uuid]) {
        self.set_model_for_uuids(StomatalModel::Bbl(coefficients), uuids);
    }

    pub fn set_mopt_coefficients(&mut self, coefficients: MoptCoefficients) {
        self.set_model(StomatalModel::Mopt(coefficients));
    }

    pub fn set_mopt_coefficients_for_uuids(&mut self, coefficients: MoptCoefficients, uuids: &[Uuid]) {
        self.set_model_for_uuids(StomatalModel::Mopt(coefficients), uuids);
    }

    pub fn set_bmf_coefficients(&mut self, coefficients: BmfCoefficients) {
        self.set_model(StomatalModel::Bmf(coefficients));
    }

    pub fn set_bmf_coefficients_for_uuids(&mut self, coefficients: BmfCoefficients, uuids: &[Uuid]) {
        self.set_model_for_uuids(StomatalModel::Bmf(coefficients), uuids);
    }

    pub fn set_bmf_from_library(&mut self, species: &str) -> Result<()> {
        let coefficients = bmf_species(species)?;
        self.set_bmf_coefficients(coefficients);
        Ok(())
    }

    pub fn set_bmf_from_library_for_uuids(&mut self, species: &str, uuids: &[Uuid]) -> Result<()> {
        let coefficients = bmf_species(species)?;
        self.set_bmf_coefficients_for_uuids(coefficients, uuids);
        Ok(())
    }

    /// Time constants (seconds) for stomatal opening and closing in dynamic runs.
    pub fn set_dynamic_time_constants(&mut self, tau_open: f32, tau_close: f32) -> Result<()> {
        if !(tau_open > 0.0 && tau_close > 0.0) {
            return Err(StomatalError::InvalidParameter(format!(
                "time constants must be positive (open {tau_open}, close {tau_close})"
            )));
        }
        self.tau_open = tau_open;
        self.tau_close = tau_close;
        Ok(())
    }

    pub fn run(&self, context: &mut Context) -> Result<()> {
        let uuids = context.all_uuids();
        self.run_for_uuids(context, &uuids)
    }

    #[instrument(skip_all, name = "stomatal_run")]
    pub fn run_for_uuids(&self, context: &mut Context, uuids: &[Uuid]) -> Result<()> {
        self.solve(context, uuids, None)
    }

    pub fn run_dynamic(&self, context: &mut Context, dt: f32) -> Result<()> {
        let uuids = context.all_uuids();
        self.run_dynamic_for_uuids(context, &uuids, dt)
    }

    #[instrument(skip_all, name = "stomatal_run_dynamic", fields(dt = dt))]
    pub fn run_dynamic_for_uuids(&self, context: &mut Context, uuids: &[Uuid], dt: f32) -> Result<()> {
        if !(dt > 0.0) {
            return Err(StomatalError::InvalidParameter(format!(
                "time step {dt} must be positive"
            )));
        }
        self.solve(context, uuids, Some(dt))
    }

    fn solve(&self, context: &mut Context, uuids: &[Uuid], dt: Option<f32>) -> Result<()> {
        context.validate_uuids(uuids)?;
        for &uuid in uuids {
            let target = steady_state(self.models.get(uuid), &surface_state(context, uuid));
            let gs = match (dt, context.primitive_scalar(uuid, OUTPUT_LABEL)) {
                (Some(dt), Some(previous)) => {
                    let tau = if target > previous { self.tau_open } else { self.tau_close };
                    target + (previous - target) * (-dt / tau).exp()
                }
                _ => target,
            };
            context.set_primitive_data(uuid, OUTPUT_LABEL, gs)?;
        }
        if self.messages {
            info!(primitives = uuids.len(), dynamic = dt.is_some(), "Stomatal conductance model finished.");
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

    fn leaf(ctx: &mut Context, humidity: f32) -> Uuid {
        let uuid = ctx
            .add_patch(Vec3::zeros(), Vec2::new(1.0, 1.0), SphericalCoord::default(), RgbColor::GREEN.into())
            .unwrap();
        ctx.set_primitive_data(uuid, "net_photosynthesis", 12.0f32).unwrap();
        ctx.set_primitive_data(uuid, "air_humidity", humidity).unwrap();
        ctx.set_primitive_data(uuid, "radiation_flux_PAR", 200.0f32).unwrap();
        uuid
    }

    #[test]
    fn bwb_conductance_increases_with_humidity() {
        let mut ctx = Context::new();
        let dry = leaf(&mut ctx, 0.3);
        let humid = leaf(&mut ctx, 0.8);
        let mut model = StomatalConductanceModel::new();
        model.set_bwb_coefficients(BwbCoefficients::default());
        model.run(&mut ctx).unwrap();
        let g_dry: f32 = ctx.get_primitive_data(dry, OUTPUT_LABEL).unwrap();
        let g_humid: f32 = ctx.get_primitive_data(humid, OUTPUT_LABEL).unwrap();
        assert!(g_humid > g_dry);
        assert!(g_dry > BwbCoefficients::default().gs0);
    }

    #[test]
    fn every_model_gives_a_positive_conductance() {
        let models = [
            StomatalModel::Bwb(BwbCoefficients::default()),
            StomatalModel::Bbl(BblCoefficients::default()),
            StomatalModel::Mopt(MoptCoefficients::default()),
            StomatalModel::Bmf(BmfCoefficients::default()),
        ];
        for m in models {
            let mut ctx = Context::new();
            let uuid = leaf(&mut ctx, 0.5);
            let mut model = StomatalConductanceModel::new();
            model.set_model(m);
            model.run(&mut ctx).unwrap();
            let g: f32 = ctx.get_primitive_data(uuid, OUTPUT_LABEL).unwrap();
            assert!(g > 0.0 && g < 5.0, "{m:?} gave {g}");
        }
    }

    #[test]
    fn co2_free_air_without_boundary_layer_stays_finite() {
        let models = [
            StomatalModel::Bwb(BwbCoefficients::default()),
            StomatalModel::Bbl(BblCoefficients::default()),
            StomatalModel::Mopt(MoptCoefficients::default()),
            StomatalModel::Bmf(BmfCoefficients::default()),
        ];
        for m in models {
            let mut ctx = Context::new();
            let uuid = leaf(&mut ctx, 0.5);
            ctx.set_primitive_data(uuid, "air_CO2", 0.0f32).unwrap();
            ctx.set_primitive_data(uuid, "boundarylayer_conductance", 0.0f32).unwrap();
            let mut model = StomatalConductanceModel::new();
            model.set_model(m);
            model.run(&mut ctx).unwrap();
            let g: f32 = ctx.get_primitive_data(uuid, OUTPUT_LABEL).unwrap();
            assert!(g.is_finite() && g >= 0.0, "{m:?} gave {g}");
        }
    }

    #[test]
    fn dynamic_run_relaxes_toward_steady_state() {
        let mut ctx = Context::new();
        let uuid = leaf(&mut ctx, 0.5);
        let model = StomatalConductanceModel::new();
        model.run(&mut ctx).unwrap();
        let steady: f32 = ctx.get_primitive_data(uuid, OUTPUT_LABEL).unwrap();

        ctx.set_primitive_data(uuid, OUTPUT_LABEL, 0.0f32).unwrap();
        model.run_dynamic(&mut ctx, 300.0).unwrap();
        let g: f32 = ctx.get_primitive_data(uuid, OUTPUT_LABEL).unwrap();
        assert!(f32_approx_equal(g, steady * (1.0 - (-1.0f32).exp()), 1e-4));
    }

    #[test]
    fn invalid_time_step_and_species_are_rejected() {
        let mut ctx = Context::new();
        leaf(&mut ctx, 0.5);
        let mut model = StomatalConductanceModel::new();
        assert!(matches!(
            model.run_dynamic(&mut ctx, 0.0),
            Err(StomatalError::InvalidParameter(_))
        ));
        assert!(matches!(
            model.set_bmf_from_library("Kudzu"),
            Err(StomatalError::UnknownSpecies(_))
        ));
        model.set_bmf_from_library("grape").unwrap();
        assert!(bmf_library().unwrap().contains_key("Almond"));
    }

    #[test]
    fn per_uuid_model_overrides_the_default() {
        let mut model = StomatalConductanceModel::new();
        model.set_bwb_coefficients_for_uuids(BwbCoefficients::default(), &[7]);
        assert!(matches!(model.model_for(7), StomatalModel::Bwb(_)));
        assert!(matches!(model.model_for(8), StomatalModel::Bmf(_)));
    }
}
