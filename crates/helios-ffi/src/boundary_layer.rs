//! Boundary-layer conductance written to `boundarylayer_conductance`.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "boundarylayer")]
use {
    crate::buffer::{c_str, uuid_slice},
    crate::error::FfiError,
    crate::handle::{PluginHandle, destroy, handle_mut},
    helios::plugins::boundary_layer::BlConductanceModel,
};

plugin_handle!(
    "boundarylayer",
    BoundaryLayerConductanceModelHandle = PluginHandle<BlConductanceModel>
);

#[cfg(feature = "boundarylayer")]
fn boundary_layer<'a>(
    handle: *mut BoundaryLayerConductanceModelHandle,
) -> Result<&'a mut BoundaryLayerConductanceModelHandle, FfiError> {
    handle_mut(handle, "BoundaryLayerConductanceModel")
}

plugin_exports! { "boundarylayer";
    fn createBoundaryLayerConductanceModel(context: *mut Context) -> *mut BoundaryLayerConductanceModelHandle = ptr::null_mut() => {
        PluginHandle::create(context, BlConductanceModel::new())
    }

    fn destroyBoundaryLayerConductanceModel(model: *mut BoundaryLayerConductanceModelHandle) -> () = () => {
        destroy(model);
        Ok(())
    }

    fn enableBoundaryLayerConductanceMessages(model: *mut BoundaryLayerConductanceModelHandle) -> () = () => {
        boundary_layer(model)?.model().enable_messages();
        Ok(())
    }

    fn disableBoundaryLayerConductanceMessages(model: *mut BoundaryLayerConductanceModelHandle) -> () = () => {
        boundary_layer(model)?.model().disable_messages();
        Ok(())
    }

    /// Selects `Pohlhausen`, `InclinedPlate`, `Sphere` or `Ground` for every primitive.
    fn setBoundaryLayerModel(model: *mut BoundaryLayerConductanceModelHandle, name: *const c_char) -> () = () => {
        let model = boundary_layer(model)?;
        model.model().set_boundary_layer_model(c_str(name, "model name")?)?;
        Ok(())
    }

    fn setBoundaryLayerModelForUUIDs(
        model: *mut BoundaryLayerConductanceModelHandle,
        name: *const c_char,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let model = boundary_layer(model)?;
        let name = c_str(name, "model name")?;
        let uuids = uuid_slice(uuids, count)?;
        model.context().validate_uuids(uuids)?;
        model.model().set_boundary_layer_model_for_uuids(name, uuids)?;
        Ok(())
    }

    fn runBoundaryLayerConductanceModel(model: *mut BoundaryLayerConductanceModelHandle) -> () = () => {
        let (model, context) = boundary_layer(model)?.split();
        model.run(context)?;
        Ok(())
    }

    fn runBoundaryLayerConductanceModelForUUIDs(
        model: *mut BoundaryLayerConductanceModelHandle,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let (model, context) = boundary_layer(model)?.split();
        model.run_for_uuids(context, uuid_slice(uuids, count)?)?;
        Ok(())
    }
}
