//! Sky view factors by ray casting, written to `sky_view_factor`.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "skyviewfactor")]
use {
    crate::buffer::{c_str, count_out, owned_array, owned_string, read_vec3, uuid_slice},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut, handle_ref},
    helios::plugins::sky_view_factor::SkyViewFactorModel,
};

plugin_handle!("skyviewfactor", SkyViewFactorModelHandle = PluginHandle<SkyViewFactorModel>);

#[cfg(feature = "skyviewfactor")]
fn sky_view<'a>(handle: *mut SkyViewFactorModelHandle) -> Result<&'a mut SkyViewFactorModelHandle, FfiError> {
    handle_mut(handle, "SkyViewFactorModel")
}

plugin_exports! { "skyviewfactor";
    fn createSkyViewFactorModel(context: *mut Context) -> *mut SkyViewFactorModelHandle = ptr::null_mut() => {
        PluginHandle::create(context, SkyViewFactorModel::new())
    }

    fn destroySkyViewFactorModel(model: *mut SkyViewFactorModelHandle) -> () = () => {
        destroy(model);
        Ok(())
    }

    fn setRayCount(model: *mut SkyViewFactorModelHandle, count: u32) -> () = () => {
        sky_view(model)?.model().set_ray_count(count)?;
        Ok(())
    }

    fn getRayCount(model: *const SkyViewFactorModelHandle) -> u32 = 0 => {
        Ok(handle_ref(model, "SkyViewFactorModel")?.model_ref().ray_count())
    }

    fn setMaxRayLength(model: *mut SkyViewFactorModelHandle, length: f32) -> () = () => {
        sky_view(model)?.model().set_max_ray_length(length)?;
        Ok(())
    }

    fn getMaxRayLength(model: *const SkyViewFactorModelHandle) -> f32 = 0.0 => {
        Ok(handle_ref(model, "SkyViewFactorModel")?.model_ref().max_ray_length())
    }

    fn enableSkyViewFactorMessages(model: *mut SkyViewFactorModelHandle) -> () = () => {
        sky_view(model)?.model().enable_messages();
        Ok(())
    }

    fn disableSkyViewFactorMessages(model: *mut SkyViewFactorModelHandle) -> () = () => {
        sky_view(model)?.model().disable_messages();
        Ok(())
    }

    /// Fraction of the upper hemisphere visible from `point` (3 floats).
    fn calculateSkyViewFactor(model: *const SkyViewFactorModelHandle, point: *const f32) -> f32 = 0.0 => {
        let handle = handle_ref(model, "SkyViewFactorModel")?;
        let point = read_vec3(point, "point")?;
        Ok(handle.model_ref().calculate_sky_view_factor(handle.context(), &point)?)
    }

    /// Computes the factor of every primitive and returns them in UUID order.
    fn calculateSkyViewFactors(model: *mut SkyViewFactorModelHandle, count: *mut usize) -> *mut f32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let (model, context) = sky_view(model)?.split();
        Ok(owned_array(model.calculate_sky_view_factors(context)?, count))
    }

    fn calculateSkyViewFactorsForUUIDs(
        model: *mut SkyViewFactorModelHandle,
        uuids: *const Uuid,
        uuid_count: usize,
        count: *mut usize,
    ) -> *mut f32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let (model, context) = sky_view(model)?.split();
        let uuids = uuid_slice(uuids, uuid_count)?;
        Ok(owned_array(model.calculate_sky_view_factors_for_uuids(context, uuids)?, count))
    }

    /// Factors of the last calculation.
    fn getSkyViewFactors(model: *const SkyViewFactorModelHandle, count: *mut usize) -> *mut f32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let model = handle_ref(model, "SkyViewFactorModel")?;
        Ok(owned_array(model.model_ref().sky_view_factors(), count))
    }

    fn getSkyViewFactorStatistics(model: *const SkyViewFactorModelHandle) -> *mut c_char = ptr::null_mut() => {
        let model = handle_ref(model, "SkyViewFactorModel")?;
        Ok(owned_string(&model.model_ref().statistics()?))
    }

    /// Writes `uuid,sky_view_factor` rows of the last calculation as CSV.
    fn exportSkyViewFactors(model: *const SkyViewFactorModelHandle, path: *const c_char) -> () = () => {
        let model = handle_ref(model, "SkyViewFactorModel")?;
        model.model_ref().export_sky_view_factors(c_str(path, "path")?)?;
        Ok(())
    }
}
