//! Stomatal conductance (BWB, BBL, MOPT, BMF) written to `moisture_conductance`.
//! Coefficients cross the boundary as float arrays in the order of each model's
//! parameters.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "stomatalconductance")]
use {
    crate::buffer::{c_str, read, uuid_slice},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut},
    helios::plugins::stomatal::{
        BblCoefficients, BmfCoefficients, BwbCoefficients, MoptCoefficients, StomatalConductanceModel,
    },
};

plugin_handle!(
    "stomatalconductance",
    StomatalConductanceModelHandle = PluginHandle<StomatalConductanceModel>
);

#[cfg(feature = "stomatalconductance")]
fn stomatal<'a>(handle: *mut StomatalConductanceModelHandle) -> Result<&'a mut StomatalConductanceModelHandle, FfiError> {
    handle_mut(handle, "StomatalConductanceModel")
}

#[cfg(feature = "stomatalconductance")]
fn checked_uuids<'a>(
    handle: &StomatalConductanceModelHandle,
    uuids: *const Uuid,
    count: usize,
) -> Result<&'a [Uuid], FfiError> {
    let uuids = uuid_slice(uuids, count)?;
    handle.context().validate_uuids(uuids)?;
    Ok(uuids)
}

#[cfg(feature = "stomatalconductance")]
fn bwb(values: *const f32) -> Result<BwbCoefficients, FfiError> {
    let [gs0, a1] = read::<2, f32>(values, "BWB coefficients")?;
    Ok(BwbCoefficients { gs0, a1 })
}

#[cfg(feature = "stomatalconductance")]
fn bbl(values: *const f32) -> Result<BblCoefficients, FfiError> {
    let [gs0, a1, d0] = read::<3, f32>(values, "BBL coefficients")?;
    if d0 <= 0.0 {
        return Err(FfiError::invalid(format!("BBL D0 must be positive, got {d0}")));
    }
    Ok(BblCoefficients { gs0, a1, d0 })
}

#[cfg(feature = "stomatalconductance")]
fn mopt(values: *const f32) -> Result<MoptCoefficients, FfiError> {
    let [gs0, g1] = read::<2, f32>(values, "MOPT coefficients")?;
    Ok(MoptCoefficients { gs0, g1 })
}

#[cfg(feature = "stomatalconductance")]
fn bmf(values: *const f32) -> Result<BmfCoefficients, FfiError> {
    let [em, i0, k, b] = read::<4, f32>(values, "BMF coefficients")?;
    Ok(BmfCoefficients { em, i0, k, b })
}

plugin_exports! { "stomatalconductance";
    fn createStomatalConductanceModel(context: *mut Context) -> *mut StomatalConductanceModelHandle = ptr::null_mut() => {
        PluginHandle::create(context, StomatalConductanceModel::new())
    }

    fn destroyStomatalConductanceModel(model: *mut StomatalConductanceModelHandle) -> () = () => {
        destroy(model);
        Ok(())
    }

    /// Ball-Woodrow-Berry: `[gs0, a1]`.
    fn setBWBCoefficients(model: *mut StomatalConductanceModelHandle, coefficients: *const f32) -> () = () => {
        let model = stomatal(model)?;
        model.model().set_bwb_coefficients(bwb(coefficients)?);
        Ok(())
    }

    fn setBWBCoefficientsForUUIDs(
        model: *mut StomatalConductanceModelHandle,
        coefficients: *const f32,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = stomatal(model)?;
        let coefficients = bwb(coefficients)?;
        let uuids = checked_uuids(model, uuids, count)?;
        model.model().set_bwb_coefficients_for_uuids(coefficients, uuids);
        Ok(())
    }

    /// Ball-Berry-Leuning: `[gs0, a1, D0]`.
    fn setBBLCoefficients(model: *mut StomatalConductanceModelHandle, coefficients: *const f32) -> () = () => {
        let model = stomatal(model)?;
        model.model().set_bbl_coefficients(bbl(coefficients)?);
        Ok(())
    }

    fn setBBLCoefficientsForUUIDs(
        model: *mut StomatalConductanceModelHandle,
        coefficients: *const f32,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = stomatal(model)?;
        let coefficients = bbl(coefficients)?;
        let uuids = checked_uuids(model, uuids, count)?;
        model.model().set_bbl_coefficients_for_uuids(coefficients, uuids);
        Ok(())
    }

    /// Medlyn optimal: `[gs0, g1]`.
    fn setMOPTCoefficients(model: *mut StomatalConductanceModelHandle, coefficients: *const f32) -> () = () => {
        let model = stomatal(model)?;
        model.model().set_mopt_coefficients(mopt(coefficients)?);
        Ok(())
    }

    fn setMOPTCoefficientsForUUIDs(
        model: *mut StomatalConductanceModelHandle,
        coefficients: *const f32,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = stomatal(model)?;
        let coefficients = mopt(coefficients)?;
        let uuids = checked_uuids(model, uuids, count)?;
        model.model().set_mopt_coefficients_for_uuids(coefficients, uuids);
        Ok(())
    }

    /// Buckley-Mott-Farquhar: `[Em, i0, k, b]`.
    fn setBMFCoefficients(model: *mut StomatalConductanceModelHandle, coefficients: *const f32) -> () = () => {
        let model = stomatal(model)?;
        model.model().set_bmf_coefficients(bmf(coefficients)?);
        Ok(())
    }

    fn setBMFCoefficientsForUUIDs(
        model: *mut StomatalConductanceModelHandle,
        coefficients: *const f32,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = stomatal(model)?;
        let coefficients = bmf(coefficients)?;
        let uuids = checked_uuids(model, uuids, count)?;
        model.model().set_bmf_coefficients_for_uuids(coefficients, uuids);
        Ok(())
    }

    fn setBMFCoefficientsFromLibrary(model: *mut StomatalConductanceModelHandle, species: *const c_char) -> () = () => {
        let model = stomatal(model)?;
        model.model().set_bmf_from_library(c_str(species, "species")?)?;
        Ok(())
    }

    fn setBMFCoefficientsFromLibraryForUUIDs(
        model: *mut StomatalConductanceModelHandle,
        species: *const c_char,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = stomatal(model)?;
        let species = c_str(species, "species")?;
        let uuids = checked_uuids(model, uuids, count)?;
        model.model().set_bmf_from_library_for_uuids(species, uuids)?;
        Ok(())
    }

    /// Opening and closing time constants, in seconds, of dynamic runs.
    fn setDynamicTimeConstants(model: *mut StomatalConductanceModelHandle, tau_open: f32, tau_close: f32) -> () = () => {
        stomatal(model)?.model().set_dynamic_time_constants(tau_open, tau_close)?;
        Ok(())
    }

    fn runStomatalConductanceModel(model: *mut StomatalConductanceModelHandle) -> () = () => {
        let (model, context) = stomatal(model)?.split();
        model.run(context)?;
        Ok(())
    }

    fn runStomatalConductanceModelForUUIDs(
        model: *mut StomatalConductanceModelHandle,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let (model, context) = stomatal(model)?.split();
        model.run_for_uuids(context, uuid_slice(uuids, count)?)?;
        Ok(())
    }

    /// Relaxes the previous conductance toward steady state over `dt` seconds.
    fn runStomatalConductanceModelDynamic(model: *mut StomatalConductanceModelHandle, dt: f32) -> () = () => {
        let (model, context) = stomatal(model)?.split();
        model.run_dynamic(context, dt)?;
        Ok(())
    }

    fn runStomatalConductanceModelDynamicForUUIDs(
        model: *mut StomatalConductanceModelHandle,
        uuids: *const Uuid,
        count: usize,
        dt: f32,
    ) -> () = () => {
        let (model, context) = stomatal(model)?.split();
        model.run_dynamic_for_uuids(context, uuid_slice(uuids, count)?, dt)?;
        Ok(())
    }

    fn enableStomatalConductanceMessages(model: *mut StomatalConductanceModelHandle) -> () = () => {
        stomatal(model)?.model().enable_messages();
        Ok(())
    }

    fn disableStomatalConductanceMessages(model: *mut StomatalConductanceModelHandle) -> () = () => {
        stomatal(model)?.model().disable_messages();
        Ok(())
    }
}
