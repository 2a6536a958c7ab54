//! Surface energy balance: solves each primitive's temperature from its
//! absorbed radiation, conductances and air state.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "energybalance")]
use {
    crate::buffer::{c_str, c_str_array, uuid_slice},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut},
    helios::plugins::energy_balance::EnergyBalanceModel,
};

plugin_handle!("energybalance", EnergyBalanceModelHandle = PluginHandle<EnergyBalanceModel>);

#[cfg(feature = "energybalance")]
fn energy_balance<'a>(handle: *mut EnergyBalanceModelHandle) -> Result<&'a mut EnergyBalanceModelHandle, FfiError> {
    handle_mut(handle, "EnergyBalanceModel")
}

plugin_exports! { "energybalance";
    fn createEnergyBalanceModel(context: *mut Context) -> *mut EnergyBalanceModelHandle = ptr::null_mut() => {
        PluginHandle::create(context, EnergyBalanceModel::new())
    }

    fn destroyEnergyBalanceModel(model: *mut EnergyBalanceModelHandle) -> () = () => {
        destroy(model);
        Ok(())
    }

    fn enableEnergyBalanceMessages(model: *mut EnergyBalanceModelHandle) -> () = () => {
        energy_balance(model)?.model().enable_messages();
        Ok(())
    }

    fn disableEnergyBalanceMessages(model: *mut EnergyBalanceModelHandle) -> () = () => {
        energy_balance(model)?.model().disable_messages();
        Ok(())
    }

    /// Adds `radiation_flux_<band>` to the absorbed radiation of every primitive.
    fn addEnergyBalanceRadiationBand(model: *mut EnergyBalanceModelHandle, band: *const c_char) -> () = () => {
        let model = energy_balance(model)?;
        model.model().add_radiation_band(c_str(band, "band label")?)?;
        Ok(())
    }

    fn addEnergyBalanceRadiationBands(
        model: *mut EnergyBalanceModelHandle,
        bands: *const *const c_char,
        count: usize,
    ) -> () = () => {
        let model = energy_balance(model)?;
        let bands = c_str_array(bands, count, "band labels")?;
        model.model().add_radiation_bands(&bands)?;
        Ok(())
    }

    /// Enables `net_radiation_flux` or `storage_flux` as an extra output.
    fn optionalOutputEnergyBalancePrimitiveData(model: *mut EnergyBalanceModelHandle, label: *const c_char) -> () = () => {
        let model = energy_balance(model)?;
        model.model().optional_output_primitive_data(c_str(label, "label")?)?;
        Ok(())
    }

    fn runEnergyBalanceModel(model: *mut EnergyBalanceModelHandle) -> () = () => {
        let (model, context) = energy_balance(model)?.split();
        model.run(context)?;
        Ok(())
    }

    /// Integrates the heat storage term over `dt` seconds from each primitive's
    /// previous `temperature`.
    fn runEnergyBalanceModelDynamic(model: *mut EnergyBalanceModelHandle, dt: f32) -> () = () => {
        let (model, context) = energy_balance(model)?.split();
        model.run_dynamic(context, dt)?;
        Ok(())
    }

    fn runEnergyBalanceModelForUUIDs(model: *mut EnergyBalanceModelHandle, uuids: *const Uuid, count: usize) -> () = () => {
        let (model, context) = energy_balance(model)?.split();
        model.run_for_uuids(context, uuid_slice(uuids, count)?)?;
        Ok(())
    }

    fn runEnergyBalanceModelForUUIDsDynamic(
        model: *mut EnergyBalanceModelHandle,
        uuids: *const Uuid,
        count: usize,
        dt: f32,
    ) -> () = () => {
        let (model, context) = energy_balance(model)?.split();
        model.run_for_uuids_dynamic(context, uuid_slice(uuids, count)?, dt)?;
        Ok(())
    }
}
