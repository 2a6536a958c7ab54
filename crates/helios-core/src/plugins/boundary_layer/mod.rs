//! # Boundary-Layer Conductance
//!
//! Heat boundary-layer conductance (mol m⁻² s⁻¹) of each primitive, written to
//! `boundarylayer_conductance`. The model is chosen per primitive by name:
//!
//! | Name | Model |
//! |------|-------|
//! | `Pohlhausen` | laminar forced convection over a flat plate |
//! | `InclinedPlate` | forced and free convection combined (sum of cubes) |
//! | `Sphere` | forced convection around a sphere of diameter `object_length` |
//! | `Ground` | log-law aerodynamic conductance above a rough surface |

use super::ParameterMap;
use crate::core::constants::{GAS_CONSTANT, STANDARD_PRESSURE};
use crate::core::context::{Context, ContextError, Uuid};
use phf::{Map, phf_map};
use thiserror::Error;
use tracing::{info, instrument};

const VON_KARMAN: f32 = 0.41;
const GROUND_REFERENCE_HEIGHT: f32 = 2.0;
const GROUND_ROUGHNESS: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoundaryLayerKind {
    #[default]
    Pohlhausen,
    InclinedPlate,
    Sphere,
    Ground,
}

static MODEL_NAMES: Map<&'static str, BoundaryLayerKind> = phf_map! {
    "Pohlhausen" => BoundaryLayerKind::Pohlhausen,
    "InclinedPlate" => BoundaryLayerKind::InclinedPlate,
    "Sphere" => BoundaryLayerKind::Sphere,
    "Ground" => BoundaryLayerKind::Ground,
};

impl BoundaryLayerKind {
    pub fn from_name(name: &str) -> Result<Self> {
        MODEL_NAMES
            .get(name)
            .copied()
            .ok_or_else(|| BoundaryLayerError::UnknownModel(name.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum BoundaryLayerError {
    #[error("Unknown boundary-layer model '{0}'; expected Pohlhausen, InclinedPlate, Sphere or Ground")]
    UnknownModel(String),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, BoundaryLayerError>;

#[derive(Debug, Clone, Copy)]
struct Environment {
    wind_speed: f32,
    length: f32,
    air_temperature: f32,
    surface_temperature: f32,
    pressure: f32,
}

fn conductance(kind: BoundaryLayerKind, env: &Environment) -> f32 {
    let u = env.wind_speed.max(0.0);
    let l = env.length.max(1e-6);
    match kind {
        BoundaryLayerKind::Pohlhausen => 0.135 * (u / l).sqrt(),
        BoundaryLayerKind::InclinedPlate => {
            let forced = 0.135 * (u / l).sqrt();
            let dt = (env.surface_temperature - env.air_temperature).abs();
            let free = 0.05 * (dt / l).powf(0.25);
            (forced.powi(3) + free.powi(3)).cbrt()
        }
        BoundaryLayerKind::Sphere => 0.21 * u.powf(0.6) / l.powf(0.4),
        BoundaryLayerKind::Ground => {
            let molar_density = env.pressure / (GAS_CONSTANT * env.air_temperature);
            let zm = GROUND_ROUGHNESS;
            let zh = 0.2 * zm;
            let z = GROUND_REFERENCE_HEIGHT;
            molar_density * VON_KARMAN.powi(2) * u / ((z / zm).ln() * (z / zh).ln())
        }
    }
}

#[derive(Debug, Default)]
pub struct BlConductanceModel {
    models: ParameterMap<BoundaryLayerKind>,
    messages: bool,
}

impl BlConductanceModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_messages(&mut self) {
        self.messages = true;
    }

    pub fn disable_messages(&mut self) {
        self.messages = false;
    }

    pub fn set_boundary_layer_model(&mut self, name: &str) -> Result<()> {
        self.models.set_default(BoundaryLayerKind::from_name(name)?);
        Ok(())
    }

    pub fn set_boundary_layer_model_for_uuids(&mut self, name: &str, uuids: &[Uuid]) -> Result<()> {
        self.models.set_for(uuids, BoundaryLayerKind::from_name(name)?);
        Ok(())
    }

    pub fn model_for(&self, uuid: Uuid) -> BoundaryLayerKind {
        *self.models.get(uuid)
    }

    pub fn run(&self, context: &mut Context) -> Result<()> {
        let uuids = context.all_uuids();
        self.run_for_uuids(context, &uuids)
    }

    #[instrument(skip_all, name = "boundary_layer_run")]
    pub fn run_for_uuids(&self, context: &mut Context, uuids: &[Uuid]) -> Result<()> {
        context.validate_uuids(uuids)?;
        for &uuid in uuids {
            let value = |label: &str, default: f32| context.primitive_float_or(uuid, label, default);
            let length = match value("object_length", 0.0) {
                l if l > 0.0 => l,
                _ => context.primitive_area(uuid)?.sqrt(),
            };
            let air_temperature = value("air_temperature", 300.0);
            let env = Environment {
                wind_speed: value("wind_speed", 1.0),
                length,
                air_temperature,
                surface_temperature: value("temperature", air_temperature),
                pressure: value("air_pressure", STANDARD_PRESSURE),
            };
            let g = conductance(*self.models.get(uuid), &env);
            context.set_primitive_data(uuid, "boundarylayer_conductance", g)?;
        }
        if self.messages {
            info!(primitives = uuids.len(), "Boundary-layer conductance model finished.");
        }
        Ok(())
    }
}
