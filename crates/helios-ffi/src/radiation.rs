//! Radiation transport: bands, sources and per-band ray tracing over the
//! context geometry. Results land in the `radiation_flux_<band>` primitive data.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "radiation")]
use {
    crate::buffer::{c_str, c_str_array, count_out, non_empty_slice, owned_array, read_rotation, read_vec3, uuid_slice},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut, handle_ref},
    helios::plugins::radiation::RadiationModel,
};

plugin_handle!("radiation", RadiationModelHandle = PluginHandle<RadiationModel>);

#[cfg(feature = "radiation")]
fn radiation<'a>(handle: *mut RadiationModelHandle) -> Result<&'a mut RadiationModelHandle, FfiError> {
    handle_mut(handle, "RadiationModel")
}

plugin_exports! { "radiation";
    fn createRadiationModel(context: *mut Context) -> *mut RadiationModelHandle = ptr::null_mut() => {
        PluginHandle::create(context, RadiationModel::new())
    }

    fn destroyRadiationModel(model: *mut RadiationModelHandle) -> () = () => {
        destroy(model);
        Ok(())
    }

    fn enableRadiationMessages(model: *mut RadiationModelHandle) -> () = () => {
        radiation(model)?.model().enable_messages();
        Ok(())
    }

    fn disableRadiationMessages(model: *mut RadiationModelHandle) -> () = () => {
        radiation(model)?.model().disable_messages();
        Ok(())
    }

    fn addRadiationBand(model: *mut RadiationModelHandle, label: *const c_char) -> () = () => {
        let model = radiation(model)?;
        model.model().add_band(c_str(label, "band label")?)?;
        Ok(())
    }

    /// Adds a band restricted to `[min_wavelength, max_wavelength]` nanometres.
    fn addRadiationBandWithWavelengths(
        model: *mut RadiationModelHandle,
        label: *const c_char,
        min_wavelength: f32,
        max_wavelength: f32,
    ) -> () = () => {
        let model = radiation(model)?;
        let label = c_str(label, "band label")?;
        model.model().add_band_with_wavelengths(label, min_wavelength, max_wavelength)?;
        Ok(())
    }

    /// Copies a band's parameters and source fluxes to a new label.
    fn copyRadiationBand(model: *mut RadiationModelHandle, old_label: *const c_char, new_label: *const c_char) -> () = () => {
        let model = radiation(model)?;
        let old_label = c_str(old_label, "band label")?;
        let new_label = c_str(new_label, "new band label")?;
        model.model().copy_band(old_label, new_label)?;
        Ok(())
    }

    fn doesBandExist(model: *const RadiationModelHandle, label: *const c_char) -> bool = false => {
        let model = handle_ref(model, "RadiationModel")?;
        Ok(model.model_ref().does_band_exist(c_str(label, "band label")?))
    }

    /// Collimated source shining straight down. Returns the source ID.
    fn addCollimatedRadiationSourceDefault(model: *mut RadiationModelHandle) -> u32 = 0 => {
        Ok(radiation(model)?.model().add_collimated_source()?)
    }

    /// Collimated source; `direction` (3 floats) points toward the source.
    fn addCollimatedRadiationSourceVec(model: *mut RadiationModelHandle, direction: *const f32) -> u32 = 0 => {
        let model = radiation(model)?;
        let direction = read_vec3(direction, "direction")?;
        Ok(model.model().add_collimated_source_toward(&direction)?)
    }

    fn addCollimatedRadiationSourceSpherical(model: *mut RadiationModelHandle, direction: *const f32) -> u32 = 0 => {
        let model = radiation(model)?;
        let direction = read_rotation(direction)?;
        Ok(model.model().add_collimated_source_spherical(&direction)?)
    }

    fn addSphereRadiationSource(model: *mut RadiationModelHandle, position: *const f32, radius: f32) -> u32 = 0 => {
        let model = radiation(model)?;
        let position = read_vec3(position, "position")?;
        Ok(model.model().add_sphere_source(position, radius)?)
    }

    /// Sun-sized sphere source in the direction `(radius, elevation, azimuth)`.
    fn addSunSphereRadiationSource(model: *mut RadiationModelHandle, direction: *const f32) -> u32 = 0 => {
        let model = radiation(model)?;
        let direction = read_rotation(direction)?;
        Ok(model.model().add_sun_sphere_source(&direction)?)
    }

    fn setSourceFlux(model: *mut RadiationModelHandle, source_id: u32, label: *const c_char, flux: f32) -> () = () => {
        let model = radiation(model)?;
        model.model().set_source_flux(source_id, c_str(label, "band label")?, flux)?;
        Ok(())
    }

    fn setSourceFluxMultiple(
        model: *mut RadiationModelHandle,
        source_ids: *const u32,
        count: usize,
        label: *const c_char,
        flux: f32,
    ) -> () = () => {
        let model = radiation(model)?;
        let ids = non_empty_slice(source_ids, count, "source IDs")?;
        model.model().set_source_flux_multiple(ids, c_str(label, "band label")?, flux)?;
        Ok(())
    }

    fn getSourceFlux(model: *const RadiationModelHandle, source_id: u32, label: *const c_char) -> f32 = 0.0 => {
        let model = handle_ref(model, "RadiationModel")?;
        Ok(model.model_ref().source_flux(source_id, c_str(label, "band label")?)?)
    }

    fn setSourcePosition(model: *mut RadiationModelHandle, source_id: u32, position: *const f32) -> () = () => {
        let model = radiation(model)?;
        let position = read_vec3(position, "position")?;
        model.model().set_source_position(source_id, &position)?;
        Ok(())
    }

    fn setDiffuseRadiationFlux(model: *mut RadiationModelHandle, label: *const c_char, flux: f32) -> () = () => {
        let model = radiation(model)?;
        model.model().set_diffuse_flux(c_str(label, "band label")?, flux)?;
        Ok(())
    }

    fn setDirectRayCount(model: *mut RadiationModelHandle, label: *const c_char, count: u32) -> () = () => {
        let model = radiation(model)?;
        model.model().set_direct_ray_count(c_str(label, "band label")?, count)?;
        Ok(())
    }

    fn setDiffuseRayCount(model: *mut RadiationModelHandle, label: *const c_char, count: u32) -> () = () => {
        let model = radiation(model)?;
        model.model().set_diffuse_ray_count(c_str(label, "band label")?, count)?;
        Ok(())
    }

    fn setScatteringDepth(model: *mut RadiationModelHandle, label: *const c_char, depth: u32) -> () = () => {
        let model = radiation(model)?;
        model.model().set_scattering_depth(c_str(label, "band label")?, depth)?;
        Ok(())
    }

    fn setMinScatterEnergy(model: *mut RadiationModelHandle, label: *const c_char, energy: f32) -> () = () => {
        let model = radiation(model)?;
        model.model().set_min_scatter_energy(c_str(label, "band label")?, energy)?;
        Ok(())
    }

    fn enableEmission(model: *mut RadiationModelHandle, label: *const c_char) -> () = () => {
        let model = radiation(model)?;
        model.model().enable_emission(c_str(label, "band label")?)?;
        Ok(())
    }

    fn disableEmission(model: *mut RadiationModelHandle, label: *const c_char) -> () = () => {
        let model = radiation(model)?;
        model.model().disable_emission(c_str(label, "band label")?)?;
        Ok(())
    }

    /// Snapshots the current context geometry for ray tracing.
    fn updateGeometry(model: *mut RadiationModelHandle) -> () = () => {
        let (model, context) = radiation(model)?.split();
        model.update_geometry(context)?;
        Ok(())
    }

    fn updateGeometryUUIDs(model: *mut RadiationModelHandle, uuids: *const Uuid, count: usize) -> () = () => {
        let (model, context) = radiation(model)?.split();
        let uuids = uuid_slice(uuids, count)?;
        model.update_geometry_uuids(context, uuids)?;
        Ok(())
    }

    fn runBand(model: *mut RadiationModelHandle, label: *const c_char) -> () = () => {
        let (model, context) = radiation(model)?.split();
        model.run_band(context, c_str(label, "band label")?)?;
        Ok(())
    }

    /// Runs several bands; every label is checked before any band runs.
    fn runBandMultiple(model: *mut RadiationModelHandle, labels: *const *const c_char, count: usize) -> () = () => {
        let (model, context) = radiation(model)?.split();
        let labels = c_str_array(labels, count, "band labels")?;
        if labels.is_empty() {
            return Err(FfiError::invalid("at least one band label is required"));
        }
        model.run_bands(context, &labels)?;
        Ok(())
    }

    /// Absorbed flux summed over the bands run since the last geometry update,
    /// one value per primitive of the geometry snapshot.
    fn getTotalAbsorbedFlux(model: *const RadiationModelHandle, count: *mut usize) -> *mut f32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let model = handle_ref(model, "RadiationModel")?;
        Ok(owned_array(model.model_ref().total_absorbed_flux()?, count))
    }
}


#[cfg(all(test, not(feature = "radiation")))]
mod tests {
    use super::*;

    #[test]
    fn compiled_out_group_reports_unavailable() {
        assert!(createRadiationModel(ptr::null_mut()).is_null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
        runBand(ptr::null_mut(), ptr::null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
    }
}
