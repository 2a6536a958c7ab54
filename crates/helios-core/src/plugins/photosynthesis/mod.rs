//! # Leaf Photosynthesis
//!
//! Computes net CO₂ assimilation (µmol m⁻² s⁻¹) for every primitive from its
//! absorbed PAR and leaf environment, using either an empirical response model
//! or the Farquhar–von Caemmerer–Berry biochemical model.
//!
//! Inputs are read from primitive data, with defaults when a label is absent:
//!
//! | Label | Default | Units |
//! |-------|---------|-------|
//! | `radiation_flux_PAR` | 0 | W m⁻² (converted to µmol m⁻² s⁻¹) |
//! | `temperature` | 300 | K |
//! | `air_CO2` | 390 | µmol mol⁻¹ |
//! | `moisture_conductance` | 0.25 | mol m⁻² s⁻¹ |
//! | `boundarylayer_conductance` | 1.0 | mol m⁻² s⁻¹ |
//!
//! The result is written to `net_photosynthesis`. Intermediate quantities can be
//! requested with [`PhotosynthesisModel::optional_output_primitive_data`].

mod models;

pub use models::{Assimilation, EmpiricalCoefficients, FarquharCoefficients, LeafState};

use super::ParameterMap;
use crate::core::constants::PAR_W_TO_UMOL;
use crate::core::context::{Context, ContextError, Uuid};
use rayon::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, instrument};

const SPECIES_LIBRARY: &str = include_str!("species.toml");

const OPTIONAL_OUTPUTS: [&str; 3] = ["Ci", "limitation_state", "Gamma_CO2"];

#[derive(Debug, Error)]
pub enum PhotosynthesisError {
    #[error("Species '{0}' is not in the photosynthesis library")]
    UnknownSpecies(String),
    #[error("Invalid photosynthesis parameter: {0}")]
    InvalidParameter(String),
    #[error("Failed to parse the photosynthesis species library: {0}")]
    Library(#[from] toml::de::Error),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, PhotosynthesisError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    #[default]
    Empirical,
    Farquhar,
}

/// Parses the embedded species table.
pub fn species_library() -> Result<BTreeMap<String, FarquharCoefficients>> {
    Ok(toml::from_str(SPECIES_LIBRARY)?)
}

/// Looks up one species, matching names case-insensitively.
pub fn species_coefficients(species: &str) -> Result<FarquharCoefficients> {
    species_library()?
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(species))
        .map(|(_, c)| c)
        .ok_or_else(|| PhotosynthesisError::UnknownSpecies(species.to_string()))
}

#[derive(Debug, Default)]
pub struct PhotosynthesisModel {
    model_type: ModelType,
    empirical: ParameterMap<EmpiricalCoefficients>,
    farquhar: ParameterMap<FarquharCoefficients>,
    optional_outputs: Vec<String>,
    messages: bool,
}

impl PhotosynthesisModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_messages(&mut self) {
        self.messages = true;
    }

    pub fn disable_messages(&mut self) {
        self.messages = false;
    }

    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    pub fn set_model_type_empirical(&mut self) {
        self.model_type = ModelType::Empirical;
    }

    pub fn set_model_type_farquhar(&mut self) {
        self.model_type = ModelType::Farquhar;
    }

    pub fn set_empirical_coefficients(&mut self, coefficients: EmpiricalCoefficients) {
        self.empirical.set_default(coefficients);
    }

    pub fn set_empirical_coefficients_for_uuids(&mut self, coefficients: EmpiricalCoefficients, uuids: &[Uuid]) {
        self.empirical.set_for(uuids, coefficients);
    }

    pub fn set_farquhar_coefficients(&mut self, coefficients: FarquharCoefficients) {
        self.farquhar.set_default(coefficients);
    }

    pub fn set_farquhar_coefficients_for_uuids(&mut self, coefficients: FarquharCoefficients, uuids: &[Uuid]) {
        self.farquhar.set_for(uuids, coefficients);
    }

    pub fn set_farquhar_from_library(&mut self, species: &str) -> Result<()> {
        let coefficients = species_coefficients(species)?;
        self.set_farquhar_coefficients(coefficients);
        Ok(())
    }

    pub fn set_farquhar_from_library_for_uuids(&mut self, species: &str, uuids: &[Uuid]) -> Result<()> {
        let coefficients = species_coefficients(species)?;
        self.set_farquhar_coefficients_for_uuids(coefficients, uuids);
        Ok(())
    }

    /// Default Farquhar coefficients (those applied to primitives without an override).
    pub fn farquhar_coefficients(&self) -> FarquharCoefficients {
        *self.farquhar.default_value()
    }

    pub fn available_species(&self) -> Result<Vec<String>> {
        Ok(species_library()?.into_keys().collect())
    }

    pub fn optional_output_primitive_data(&mut self, label: &str) -> Result<()> {
        if !OPTIONAL_OUTPUTS.contains(&label) {
            return Err(PhotosynthesisError::InvalidParameter(format!(
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

    #[instrument(skip_all, name = "photosynthesis_run")]
    pub fn run_for_uuids(&self, context: &mut Context, uuids: &[Uuid]) -> Result<()> {
        context.validate_uuids(uuids)?;
        let leaves: Vec<(Uuid, LeafState)> = uuids
            .iter()
            .map(|&uuid| (uuid, leaf_state(context, uuid)))
            .collect();

        let results: Vec<(Uuid, Assimilation)> = leaves
            .par_iter()
            .map(|(uuid, leaf)| {
                let a = match self.model_type {
                    ModelType::Empirical => models::empirical(self.empirical.get(*uuid), leaf),
                    ModelType::Farquhar => models::farquhar(self.farquhar.get(*uuid), leaf),
                };
                (*uuid, a)
            })
            .collect();

        for (uuid, a) in &results {
            context.set_primitive_data(*uuid, "net_photosynthesis", a.net)?;
            for label in &self.optional_outputs {
                match label.as_str() {
                    "Ci" => context.set_primitive_data(*uuid, "Ci", a.ci)?,
                    "limitation_state" => context.set_primitive_data(*uuid, "limitation_state", a.limitation)?,
                    "Gamma_CO2" => context.set_primitive_data(*uuid, "Gamma_CO2", a.gamma_star)?,
                    _ => {}
                }
            }
        }
        if self.messages {
            info!(primitives = results.len(), model = ?self.model_type, "Photosynthesis model finished.");
        }
        Ok(())
    }
}

fn leaf_state(context: &Context, uuid: Uuid) -> LeafState {
    LeafState {
        par: context.primitive_float_or(uuid, "radiation_flux_PAR", 0.0) * PAR_W_TO_UMOL,
        temperature: context.primitive_float_or(uuid, "temperature", 300.0),
        co2: context.primitive_float_or(uuid, "air_CO2", 390.0),
        gs: context.primitive_float_or(uuid, "moisture_conductance", 0.25),
        gb: context.primitive_float_or(uuid, "boundarylayer_conductance", 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{RgbColor, SphericalCoord, Vec2, Vec3};

    fn leaf(ctx: &mut Context, par_watts: f32) -> Uuid {
        let uuid = ctx
            .add_patch(Vec3::zeros(), Vec2::new(1.0, 1.0), SphericalCoord::default(), RgbColor::GREEN.into())
            .unwrap();
        ctx.set_primitive_data(uuid, "radiation_flux_PAR", par_watts).unwrap();
        uuid
    }

    #[test]
    fn embedded_library_lists_species() {
        let species = PhotosynthesisModel::new().available_species().unwrap();
        assert!(species.iter().any(|s| s == "Almond"));
        assert!(species.len() >= 10);
        let almond = species_coefficients("almond").unwrap();
        assert_eq!(almond.o2, FarquharCoefficients::default().o2);
    }

    #[test]
    fn unknown_species_is_reported() {
        let mut model = PhotosynthesisModel::new();
        assert!(matches!(
            model.set_farquhar_from_library("Kudzu"),
            Err(PhotosynthesisError::UnknownSpecies(_))
        ));
    }

    #[test]
    fn farquhar_run_increases_with_par() {
        let mut ctx = Context::new();
        let dim = leaf(&mut ctx, 20.0);
        let bright = leaf(&mut ctx, 300.0);
        let mut model = PhotosynthesisModel::new();
        model.set_model_type_farquhar();
        model.set_farquhar_from_library("Grape").unwrap();
        model.optional_output_primitive_data("Ci").unwrap();
        model.run(&mut ctx).unwrap();

        let a_dim: f32 = ctx.get_primitive_data(dim, "net_photosynthesis").unwrap();
        let a_bright: f32 = ctx.get_primitive_data(bright, "net_photosynthesis").unwrap();
        assert!(a_bright > a_dim);
        assert!(ctx.does_primitive_data_exist(bright, "Ci").unwrap());
        assert!(!ctx.does_primitive_data_exist(bright, "Gamma_CO2").unwrap());
    }

    #[test]
    fn per_uuid_coefficients_override_the_default() {
        let mut ctx = Context::new();
        let a = leaf(&mut ctx, 200.0);
        let b = leaf(&mut ctx, 200.0);
        let mut model = PhotosynthesisModel::new();
        let weak = EmpiricalCoefficients {
            asat: 5.0,
            ..EmpiricalCoefficients::default()
        };
        model.set_empirical_coefficients_for_uuids(weak, &[b]);
        model.run_for_uuids(&mut ctx, &[a, b]).unwrap();
        let fa: f32 = ctx.get_primitive_data(a, "net_photosynthesis").unwrap();
        let fb: f32 = ctx.get_primitive_data(b, "net_photosynthesis").unwrap();
        assert!(fa > fb);
    }

    #[test]
    fn unknown_optional_output_and_uuid_are_rejected() {
        let mut ctx = Context::new();
        let mut model = PhotosynthesisModel::new();
        assert!(matches!(
            model.optional_output_primitive_data("stomata"),
            Err(PhotosynthesisError::InvalidParameter(_))
        ));
        assert!(matches!(
            model.run_for_uuids(&mut ctx, &[42]),
            Err(PhotosynthesisError::Context(ContextError::UuidNotFound(42)))
        ));
    }
}
