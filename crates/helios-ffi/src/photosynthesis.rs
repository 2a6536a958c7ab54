//! Leaf photosynthesis: Farquhar or empirical assimilation written to
//! `net_photosynthesis`.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "photosynthesis")]
use {
    crate::buffer::{c_str, count_out, owned_array, owned_string_array, read, uuid_slice},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut, handle_ref},
    helios::plugins::photosynthesis::{EmpiricalCoefficients, FarquharCoefficients, PhotosynthesisModel},
};

plugin_handle!("photosynthesis", PhotosynthesisModelHandle = PluginHandle<PhotosynthesisModel>);

#[cfg(feature = "photosynthesis")]
fn photosynthesis<'a>(handle: *mut PhotosynthesisModelHandle) -> Result<&'a mut PhotosynthesisModelHandle, FfiError> {
    handle_mut(handle, "PhotosynthesisModel")
}

/// Resolves a UUID subset against the model's context.
#[cfg(feature = "photosynthesis")]
fn checked_uuids<'a>(handle: &PhotosynthesisModelHandle, uuids: *const Uuid, count: usize) -> Result<&'a [Uuid], FfiError> {
    let uuids = uuid_slice(uuids, count)?;
    handle.context().validate_uuids(uuids)?;
    Ok(uuids)
}

plugin_exports! { "photosynthesis";
    fn createPhotosynthesisModel(context: *mut Context) -> *mut PhotosynthesisModelHandle = ptr::null_mut() => {
        PluginHandle::create(context, PhotosynthesisModel::new())
    }

    fn destroyPhotosynthesisModel(model: *mut PhotosynthesisModelHandle) -> () = () => {
        destroy(model);
        Ok(())
    }

    fn setModelTypeEmpirical(model: *mut PhotosynthesisModelHandle) -> () = () => {
        photosynthesis(model)?.model().set_model_type_empirical();
        Ok(())
    }

    fn setModelTypeFarquhar(model: *mut PhotosynthesisModelHandle) -> () = () => {
        photosynthesis(model)?.model().set_model_type_farquhar();
        Ok(())
    }

    /// `coefficients` holds 10 floats: Tref, Ci_ref, Asat, theta, Tmin, Topt,
    /// q, R, ER, kC.
    fn setEmpiricalModelCoefficients(model: *mut PhotosynthesisModelHandle, coefficients: *const f32) -> () = () => {
        let model = photosynthesis(model)?;
        let values = read::<{ EmpiricalCoefficients::LEN }, f32>(coefficients, "coefficients")?;
        model.model().set_empirical_coefficients(EmpiricalCoefficients::from_array(values));
        Ok(())
    }

    fn setEmpiricalModelCoefficientsForUUIDs(
        model: *mut PhotosynthesisModelHandle,
        coefficients: *const f32,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = photosynthesis(model)?;
        let values = read::<{ EmpiricalCoefficients::LEN }, f32>(coefficients, "coefficients")?;
        let uuids = checked_uuids(model, uuids, count)?;
        model
            .model()
            .set_empirical_coefficients_for_uuids(EmpiricalCoefficients::from_array(values), uuids);
        Ok(())
    }

    /// `coefficients` holds 8 floats: Vcmax, Jmax, Rd, alpha, theta, O2, TPU,
    /// and the Vcmax activation energy.
    fn setFarquharModelCoefficients(model: *mut PhotosynthesisModelHandle, coefficients: *const f32) -> () = () => {
        let model = photosynthesis(model)?;
        let values = read::<{ FarquharCoefficients::LEN }, f32>(coefficients, "coefficients")?;
        model.model().set_farquhar_coefficients(FarquharCoefficients::from_array(values));
        Ok(())
    }

    fn setFarquharModelCoefficientsForUUIDs(
        model: *mut PhotosynthesisModelHandle,
        coefficients: *const f32,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = photosynthesis(model)?;
        let values = read::<{ FarquharCoefficients::LEN }, f32>(coefficients, "coefficients")?;
        let uuids = checked_uuids(model, uuids, count)?;
        model
            .model()
            .set_farquhar_coefficients_for_uuids(FarquharCoefficients::from_array(values), uuids);
        Ok(())
    }

    fn setFarquharCoefficientsFromLibrary(model: *mut PhotosynthesisModelHandle, species: *const c_char) -> () = () => {
        let model = photosynthesis(model)?;
        model.model().set_farquhar_from_library(c_str(species, "species")?)?;
        Ok(())
    }

    fn setFarquharCoefficientsFromLibraryForUUIDs(
        model: *mut PhotosynthesisModelHandle,
        species: *const c_char,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = photosynthesis(model)?;
        let species = c_str(species, "species")?;
        let uuids = checked_uuids(model, uuids, count)?;
        model.model().set_farquhar_from_library_for_uuids(species, uuids)?;
        Ok(())
    }

    /// Returns the model-wide Farquhar coefficients as an owned array of 8 floats.
    fn getFarquharModelCoefficients(model: *const PhotosynthesisModelHandle, count: *mut usize) -> *mut f32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let model = handle_ref(model, "PhotosynthesisModel")?;
        let values = model.model_ref().farquhar_coefficients().to_array().to_vec();
        Ok(owned_array(values, count))
    }

    fn getAvailableSpecies(model: *const PhotosynthesisModelHandle, count: *mut usize) -> *mut *mut c_char = ptr::null_mut() => {
        let count = count_out(count)?;
        let model = handle_ref(model, "PhotosynthesisModel")?;
        Ok(owned_string_array(model.model_ref().available_species()?, count))
    }

    /// Enables one of the optional outputs `Ci`, `limitation_state` or `Gamma_CO2`.
    fn optionalOutputPhotosynthesisPrimitiveData(model: *mut PhotosynthesisModelHandle, label: *const c_char) -> () = () => {
        let model = photosynthesis(model)?;
        model.model().optional_output_primitive_data(c_str(label, "label")?)?;
        Ok(())
    }

    fn runPhotosynthesisModel(model: *mut PhotosynthesisModelHandle) -> () = () => {
        let (model, context) = photosynthesis(model)?.split();
        model.run(context)?;
        Ok(())
    }

    fn runPhotosynthesisModelForUUIDs(model: *mut PhotosynthesisModelHandle, uuids: *const Uuid, count: usize) -> () = () => {
        let (model, context) = photosynthesis(model)?.split();
        model.run_for_uuids(context, uuid_slice(uuids, count)?)?;
        Ok(())
    }

    fn enablePhotosynthesisMessages(model: *mut PhotosynthesisModelHandle) -> () = () => {
        photosynthesis(model)?.model().enable_messages();
        Ok(())
    }

    fn disablePhotosynthesisMessages(model: *mut PhotosynthesisModelHandle) -> () = () => {
        photosynthesis(model)?.model().disable_messages();
        Ok(())
    }
}


#[cfg(all(test, not(feature = "photosynthesis")))]
mod tests {
    use super::*;

    #[test]
    fn compiled_out_group_reports_unavailable() {
        assert!(createPhotosynthesisModel(ptr::null_mut()).is_null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
        let mut count = 9;
        assert!(getAvailableSpecies(ptr::null(), &mut count).is_null());
        assert_eq!(count, 9);
    }
}
