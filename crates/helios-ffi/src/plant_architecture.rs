//! Phytomer-based plant growth. Plants are built from the loaded library model
//! and identified by IDs counted from 0 per handle.

use helios::core::context::{Context, ObjectId, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "plantarchitecture")]
use {
    crate::buffer::{c_str, count_out, owned_array, owned_string_array, read, read_vec2, read_vec3},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut, handle_ref},
    helios::plugins::plant_architecture::PlantArchitecture,
};

plugin_handle!("plantarchitecture", PlantArchitectureHandle = PluginHandle<PlantArchitecture>);

#[cfg(feature = "plantarchitecture")]
fn architecture<'a>(handle: *mut PlantArchitectureHandle) -> Result<&'a mut PlantArchitectureHandle, FfiError> {
    handle_mut(handle, "PlantArchitecture")
}

#[cfg(feature = "plantarchitecture")]
fn architecture_ref<'a>(handle: *const PlantArchitectureHandle) -> Result<&'a PlantArchitectureHandle, FfiError> {
    handle_ref(handle, "PlantArchitecture")
}

plugin_exports! { "plantarchitecture";
    fn createPlantArchitecture(context: *mut Context) -> *mut PlantArchitectureHandle = ptr::null_mut() => {
        PluginHandle::create(context, PlantArchitecture::new()?)
    }

    fn destroyPlantArchitecture(architecture: *mut PlantArchitectureHandle) -> () = () => {
        destroy(architecture);
        Ok(())
    }

    /// Selects the model used by later build calls.
    fn loadPlantModelFromLibrary(architecture: *mut PlantArchitectureHandle, name: *const c_char) -> () = () => {
        let handle = self::architecture(architecture)?;
        handle.model().load_plant_model_from_library(c_str(name, "plant model")?)?;
        Ok(())
    }

    /// Adds the models of a TOML file to the library and returns their names.
    fn loadPlantModelsFromFile(
        architecture: *mut PlantArchitectureHandle,
        path: *const c_char,
        count: *mut usize,
    ) -> *mut *mut c_char = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = self::architecture(architecture)?;
        let names = handle.model().load_plant_models_from_file(c_str(path, "path")?)?;
        Ok(owned_string_array(names, count))
    }

    fn getAvailablePlantModels(architecture: *const PlantArchitectureHandle, count: *mut usize) -> *mut *mut c_char = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = architecture_ref(architecture)?;
        Ok(owned_string_array(handle.model_ref().available_plant_models(), count))
    }

    /// Builds one plant with its base at `base` (3 floats), grown to `age` days.
    fn buildPlantInstanceFromLibrary(architecture: *mut PlantArchitectureHandle, base: *const f32, age: f32) -> u32 = 0 => {
        let (model, context) = self::architecture(architecture)?.split();
        let base = read_vec3(base, "base")?;
        Ok(model.build_plant_instance_from_library(context, base, age)?)
    }

    /// Builds a grid of `plant_count[0] x plant_count[1]` plants centred on
    /// `center`, `spacing` apart, and returns their IDs.
    fn buildPlantCanopyFromLibrary(
        architecture: *mut PlantArchitectureHandle,
        center: *const f32,
        spacing: *const f32,
        plant_count: *const u32,
        age: f32,
        count: *mut usize,
    ) -> *mut u32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let (model, context) = self::architecture(architecture)?.split();
        let center = read_vec3(center, "center")?;
        let spacing = read_vec2(spacing, "spacing")?;
        let [nx, ny] = read::<2, u32>(plant_count, "plant count")?;
        let ids = model.build_plant_canopy_from_library(context, center, spacing, (nx, ny), age)?;
        Ok(owned_array(ids, count))
    }

    /// Grows every plant by `dt` days.
    fn advanceTime(architecture: *mut PlantArchitectureHandle, dt: f32) -> () = () => {
        let (model, context) = self::architecture(architecture)?.split();
        model.advance_time(context, dt)?;
        Ok(())
    }

    fn getPlantAge(architecture: *const PlantArchitectureHandle, plant_id: u32) -> f32 = 0.0 => {
        Ok(architecture_ref(architecture)?.model_ref().plant_age(plant_id)?)
    }

    fn getPlantHeight(architecture: *const PlantArchitectureHandle, plant_id: u32) -> f32 = 0.0 => {
        Ok(architecture_ref(architecture)?.model_ref().plant_height(plant_id)?)
    }

    fn getAllPlantIDs(architecture: *const PlantArchitectureHandle, count: *mut usize) -> *mut u32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = architecture_ref(architecture)?;
        Ok(owned_array(handle.model_ref().all_plant_ids(), count))
    }

    fn getAllPlantObjectIDs(
        architecture: *const PlantArchitectureHandle,
        plant_id: u32,
        count: *mut usize,
    ) -> *mut ObjectId = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = architecture_ref(architecture)?;
        Ok(owned_array(handle.model_ref().plant_object_ids(plant_id)?, count))
    }

    fn getAllPlantUUIDs(architecture: *const PlantArchitectureHandle, plant_id: u32, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = architecture_ref(architecture)?;
        Ok(owned_array(handle.model_ref().all_plant_uuids(handle.context(), plant_id)?, count))
    }

    fn getPlantLeafUUIDs(architecture: *const PlantArchitectureHandle, plant_id: u32, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = architecture_ref(architecture)?;
        Ok(owned_array(handle.model_ref().plant_leaf_uuids(handle.context(), plant_id)?, count))
    }

    fn getPlantInternodeUUIDs(
        architecture: *const PlantArchitectureHandle,
        plant_id: u32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let handle = architecture_ref(architecture)?;
        Ok(owned_array(handle.model_ref().plant_internode_uuids(handle.context(), plant_id)?, count))
    }

    /// Removes the plant and its geometry from the context.
    fn deletePlantInstance(architecture: *mut PlantArchitectureHandle, plant_id: u32) -> () = () => {
        let (model, context) = self::architecture(architecture)?.split();
        model.delete_plant_instance(context, plant_id)?;
        Ok(())
    }
}


#[cfg(all(test, not(feature = "plantarchitecture")))]
mod tests {
    use super::*;

    #[test]
    fn compiled_out_group_reports_unavailable() {
        assert!(createPlantArchitecture(ptr::null_mut()).is_null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
    }
}
