//! # Plant Architecture
//!
//! Phytomer-based procedural plants. Each plant is a tree of shoots; every shoot
//! adds a phytomer (an internode tube and a leaf tile) once per phyllochron until
//! it reaches its node limit, and the axillary bud of a new phytomer grows into a
//! lateral shoot with a model-specific probability drawn from the context's RNG.
//!
//! Plant types come from an embedded TOML library that can be extended with
//! [`PlantArchitecture::load_plant_models_from_file`]. Geometry is regenerated in
//! the context after every change to a plant, and every generated object carries
//! the object data `plantID`.

mod model;
mod plant;

pub use model::{PlantLibrary, PlantModel};
pub use plant::{PlantInstance, ShootId};

use crate::core::context::{Context, ContextError, ObjectId, Uuid};
use crate::core::geometry::{Vec2, Vec3};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

const EMBEDDED_LIBRARY: &str = include_str!("plants.toml");

#[derive(Debug, Error)]
pub enum PlantArchitectureError {
    #[error("Plant model '{0}' does not exist in the library")]
    UnknownModel(String),
    #[error("Plant ID {0} does not exist")]
    PlantNotFound(u32),
    #[error("No plant model has been loaded; call load_plant_model_from_library first")]
    NoModelLoaded,
    #[error("Invalid plant architecture parameter: {0}")]
    InvalidParameter(String),
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Embedded plant library is malformed: {0}")]
    Library(#[from] toml::de::Error),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, PlantArchitectureError>;

fn validate_library(library: &PlantLibrary) -> Result<()> {
    for (name, model) in library {
        model
            .validate()
            .map_err(|message| PlantArchitectureError::InvalidParameter(format!("{name}: {message}")))?;
    }
    Ok(())
}

fn ensure_days(what: &str, days: f32) -> Result<()> {
    if days.is_finite() && days >= 0.0 {
        Ok(())
    } else {
        Err(PlantArchitectureError::InvalidParameter(format!(
            "{what} {days} must be a finite, non-negative number of days"
        )))
    }
}

#[derive(Debug)]
pub struct PlantArchitecture {
    library: PlantLibrary,
    current: Option<String>,
    plants: BTreeMap<u32, PlantInstance>,
    next_plant_id: u32,
}

impl PlantArchitecture {
    pub fn new() -> Result<Self> {
        let library: PlantLibrary = toml::from_str(EMBEDDED_LIBRARY)?;
        validate_library(&library)?;
        Ok(Self {
            library,
            current: None,
            plants: BTreeMap::new(),
            next_plant_id: 0,
        })
    }

    /// Selects the model used by subsequent `build_*` calls.
    pub fn load_plant_model_from_library(&mut self, name: &str) -> Result<()> {
        if !self.library.contains_key(name) {
            return Err(PlantArchitectureError::UnknownModel(name.to_string()));
        }
        self.current = Some(name.to_string());
        debug!(model = name, "Plant model loaded.");
        Ok(())
    }

    /// Adds the models of a TOML file to the library, replacing models of the same
    /// name, and returns the names read from the file.
    #[instrument(skip_all, name = "plant_library_load")]
    pub fn load_plant_models_from_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| PlantArchitectureError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let models: PlantLibrary = toml::from_str(&content).map_err(|e| PlantArchitectureError::Toml {
            path: path_str.clone(),
            source: e,
        })?;
        validate_library(&models)?;
        let names: Vec<String> = models.keys().cloned().collect();
        self.library.extend(models);
        info!(path = %path_str, models = names.len(), "Loaded plant models from file.");
        Ok(names)
    }

    pub fn available_plant_models(&self) -> Vec<String> {
        self.library.keys().cloned().collect()
    }

    pub fn current_model(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn current_model_entry(&self) -> Result<(&str, &PlantModel)> {
        let name = self.current.as_deref().ok_or(PlantArchitectureError::NoModelLoaded)?;
        let model = self
            .library
            .get(name)
            .ok_or_else(|| PlantArchitectureError::UnknownModel(name.to_string()))?;
        Ok((name, model))
    }

    /// Builds one plant of the loaded model at `base`, grown to `age` days.
    #[instrument(skip_all, name = "plant_build")]
    pub fn build_plant_instance_from_library(&mut self, context: &mut Context, base: Vec3, age: f32) -> Result<u32> {
        ensure_days("plant age", age)?;
        let (name, model) = self.current_model_entry()?;
        let mut plant = PlantInstance::new(name, model.clone(), base);
        plant.grow(age, &mut || context.randu());

        let id = self.next_plant_id;
        plant.update_geometry(context, id)?;
        debug!(plant = id, model = plant.model_name(), phytomers = plant.phytomer_count(), "Built plant instance.");
        self.next_plant_id += 1;
        self.plants.insert(id, plant);
        Ok(id)
    }

    /// Builds an `nx × ny` grid of plants centred on `center`.
    pub fn build_plant_canopy_from_library(
        &mut self,
        context: &mut Context,
        center: Vec3,
        spacing: Vec2,
        count: (u32, u32),
        age: f32,
    ) -> Result<Vec<u32>> {
        let (nx, ny) = count;
        if nx == 0 || ny == 0 {
            return Err(PlantArchitectureError::InvalidParameter(
                "canopy plant counts must be positive".to_string(),
            ));
        }
        ensure_days("plant age", age)?;
        self.current_model_entry()?;
        let mut ids = Vec::new();
        for j in 0..ny {
            for i in 0..nx {
                let offset = Vec3::new(
                    (i as f32 - 0.5 * (nx - 1) as f32) * spacing.x,
                    (j as f32 - 0.5 * (ny - 1) as f32) * spacing.y,
                    0.0,
                );
                ids.push(self.build_plant_instance_from_library(context, center + offset, age)?);
            }
        }
        info!(plants = ids.len(), "Built plant canopy.");
        Ok(ids)
    }

    /// Grows every plant by `dt` days and regenerates its geometry.
    #[instrument(skip_all, name = "plant_advance_time")]
    pub fn advance_time(&mut self, context: &mut Context, dt: f32) -> Result<()> {
        ensure_days("time step", dt)?;
        for (id, plant) in self.plants.iter_mut() {
            plant.grow(dt, &mut || context.randu());
            plant.update_geometry(context, *id)?;
        }
        debug!(plants = self.plants.len(), dt, "Advanced plant growth.");
        Ok(())
    }

    pub fn plant(&self, id: u32) -> Result<&PlantInstance> {
        self.plants.get(&id).ok_or(PlantArchitectureError::PlantNotFound(id))
    }

    pub fn plant_age(&self, id: u32) -> Result<f32> {
        Ok(self.plant(id)?.age())
    }

    pub fn plant_height(&self, id: u32) -> Result<f32> {
        Ok(self.plant(id)?.height())
    }

    pub fn all_plant_ids(&self) -> Vec<u32> {
        self.plants.keys().copied().collect()
    }

    pub fn plant_object_ids(&self, id: u32) -> Result<Vec<ObjectId>> {
        Ok(self.plant(id)?.object_ids())
    }

    pub fn all_plant_uuids(&self, context: &Context, id: u32) -> Result<Vec<Uuid>> {
        let plant = self.plant(id)?;
        Ok(PlantInstance::uuids_of(context, &plant.object_ids())?)
    }

    pub fn plant_leaf_uuids(&self, context: &Context, id: u32) -> Result<Vec<Uuid>> {
        Ok(PlantInstance::uuids_of(context, self.plant(id)?.leaf_objects())?)
    }

    pub fn plant_internode_uuids(&self, context: &Context, id: u32) -> Result<Vec<Uuid>> {
        Ok(PlantInstance::uuids_of(context, self.plant(id)?.internode_objects())?)
    }

    /// Removes a plant and all of its geometry from the context.
    pub fn delete_plant_instance(&mut self, context: &mut Context, id: u32) -> Result<()> {
        let mut plant = self
            .plants
            .remove(&id)
            .ok_or(PlantArchitectureError::PlantNotFound(id))?;
        plant.delete_geometry(context)?;
        debug!(plant = id, "Deleted plant instance.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn architecture(model: &str) -> PlantArchitecture {
        let mut pa = PlantArchitecture::new().unwrap();
        pa.load_plant_model_from_library(model).unwrap();
        pa
    }

    #[test]
    fn embedded_library_lists_every_model() {
        let pa = PlantArchitecture::new().unwrap();
        let models = pa.available_plant_models();
        for name in ["bean", "cowpea", "maize", "sorghum", "soybean", "sunflower", "tomato"] {
            assert!(models.iter().any(|m| m == name), "missing {name}");
        }
    }

    #[test]
    fn building_requires_a_known_loaded_model() {
        let mut ctx = Context::new();
        let mut pa = PlantArchitecture::new().unwrap();
        assert!(matches!(
            pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 10.0),
            Err(PlantArchitectureError::NoModelLoaded)
        ));
        assert!(matches!(
            pa.load_plant_model_from_library("baobab"),
            Err(PlantArchitectureError::UnknownModel(_))
        ));
        assert_eq!(ctx.primitive_count(), 0);
    }

    #[test]
    fn unbranched_plant_has_one_phytomer_per_phyllochron() {
        let mut ctx = Context::new();
        let mut pa = architecture("maize");
        let id = pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 35.0).unwrap();
        assert_eq!(id, 0);
        let plant = pa.plant(id).unwrap();
        assert_eq!(plant.phytomer_count(), 10);
        assert_eq!(plant.shoot_count(), 1);
        assert_eq!(plant.object_ids().len(), 20);
        assert!(pa.plant_height(id).unwrap() > 0.0);
        assert_eq!(pa.plant_age(id).unwrap(), 35.0);

        let leaves = pa.plant_leaf_uuids(&ctx, id).unwrap();
        let internodes = pa.plant_internode_uuids(&ctx, id).unwrap();
        assert!(!leaves.is_empty() && !internodes.is_empty());
        assert_eq!(pa.all_plant_uuids(&ctx, id).unwrap().len(), leaves.len() + internodes.len());
        assert_eq!(ctx.primitive_count(), leaves.len() + internodes.len());

        let object = pa.plant_object_ids(id).unwrap()[0];
        assert_eq!(ctx.get_object_data::<u32>(object, "plantID").unwrap(), id);
    }

    #[test]
    fn node_limit_stops_growth() {
        let mut ctx = Context::new();
        let mut pa = architecture("maize");
        let id = pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 1000.0).unwrap();
        assert_eq!(pa.plant(id).unwrap().phytomer_count(), 18);
    }

    #[test]
    fn very_long_time_steps_finish_once_growth_is_complete() {
        let mut ctx = Context::new();
        let mut pa = architecture("bean");
        let id = pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 1.0e9).unwrap();
        let phytomers = pa.plant(id).unwrap().phytomer_count();
        assert!(pa.plant_age(id).unwrap() > 0.99e9);

        pa.advance_time(&mut ctx, 1.0e9).unwrap();
        assert!(pa.plant_age(id).unwrap() > 1.99e9);
        assert_eq!(pa.plant(id).unwrap().phytomer_count(), phytomers);
    }

    #[test]
    fn non_finite_ages_and_time_steps_are_rejected() {
        let mut ctx = Context::new();
        let mut pa = architecture("maize");
        for age in [f32::INFINITY, f32::NAN, -1.0] {
            assert!(matches!(
                pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), age),
                Err(PlantArchitectureError::InvalidParameter(_))
            ));
        }
        assert!(matches!(
            pa.build_plant_canopy_from_library(&mut ctx, Vec3::zeros(), Vec2::new(1.0, 1.0), (2, 2), f32::INFINITY),
            Err(PlantArchitectureError::InvalidParameter(_))
        ));
        assert_eq!(ctx.primitive_count(), 0);

        pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 5.0).unwrap();
        assert!(matches!(
            pa.advance_time(&mut ctx, f32::INFINITY),
            Err(PlantArchitectureError::InvalidParameter(_))
        ));
        assert_eq!(pa.plant_age(0).unwrap(), 5.0);
    }

    #[test]
    fn advancing_time_grows_plants_and_replaces_geometry() {
        let mut ctx = Context::new();
        let mut pa = architecture("maize");
        let id = pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 7.0).unwrap();
        let height = pa.plant_height(id).unwrap();
        let before = pa.all_plant_uuids(&ctx, id).unwrap().len();

        pa.advance_time(&mut ctx, 14.0).unwrap();
        assert_eq!(pa.plant_age(id).unwrap(), 21.0);
        assert!(pa.plant_height(id).unwrap() > height);
        let after = pa.all_plant_uuids(&ctx, id).unwrap();
        assert!(after.len() > before);
        assert_eq!(ctx.primitive_count(), after.len());
        assert!(pa.advance_time(&mut ctx, -1.0).is_err());
    }

    #[test]
    fn branching_is_reproducible_for_a_seed() {
        let build = || {
            let mut ctx = Context::new();
            ctx.seed_random_generator(11);
            let mut pa = architecture("bean");
            let id = pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 30.0).unwrap();
            (pa.plant(id).unwrap().shoot_count(), ctx.primitive_count())
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn canopy_is_laid_out_on_a_grid() {
        let mut ctx = Context::new();
        let mut pa = architecture("sorghum");
        let ids = pa
            .build_plant_canopy_from_library(&mut ctx, Vec3::zeros(), Vec2::new(0.5, 0.75), (2, 3), 12.0)
            .unwrap();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(pa.all_plant_ids(), ids);
        assert!(
            pa.build_plant_canopy_from_library(&mut ctx, Vec3::zeros(), Vec2::new(1.0, 1.0), (0, 3), 1.0)
                .is_err()
        );
    }

    #[test]
    fn deleting_a_plant_removes_its_primitives() {
        let mut ctx = Context::new();
        let mut pa = architecture("tomato");
        let a = pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 20.0).unwrap();
        let b = pa.build_plant_instance_from_library(&mut ctx, Vec3::new(1.0, 0.0, 0.0), 20.0).unwrap();
        let remaining = pa.all_plant_uuids(&ctx, b).unwrap().len();
        pa.delete_plant_instance(&mut ctx, a).unwrap();
        assert_eq!(ctx.primitive_count(), remaining);
        assert!(matches!(pa.plant_age(a), Err(PlantArchitectureError::PlantNotFound(0))));
        assert!(pa.delete_plant_instance(&mut ctx, a).is_err());
    }

    #[test]
    fn models_can_be_loaded_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plants.toml");
        std::fs::write(&path, "[fern]\nphyllochron = 4.0\nmax_nodes = 3\nmax_shoot_rank = 0\n").unwrap();

        let mut pa = PlantArchitecture::new().unwrap();
        assert_eq!(pa.load_plant_models_from_file(&path).unwrap(), vec!["fern".to_string()]);
        pa.load_plant_model_from_library("fern").unwrap();
        let mut ctx = Context::new();
        let id = pa.build_plant_instance_from_library(&mut ctx, Vec3::zeros(), 100.0).unwrap();
        assert_eq!(pa.plant(id).unwrap().phytomer_count(), 3);

        assert!(matches!(
            pa.load_plant_models_from_file(dir.path().join("missing.toml")),
            Err(PlantArchitectureError::Io { .. })
        ));
        std::fs::write(&path, "[fern\n").unwrap();
        assert!(matches!(
            pa.load_plant_models_from_file(&path),
            Err(PlantArchitectureError::Toml { .. })
        ));
    }
}
