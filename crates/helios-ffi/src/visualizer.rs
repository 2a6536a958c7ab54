//! Off-screen rendering of context geometry. A visualizer is not bound to a
//! context; geometry is copied in by the `buildContextGeometry*` calls.

use helios::core::context::{Context, Uuid};
use std::ffi::c_char;
use std::ptr;

#[cfg(feature = "visualizer")]
use {
    crate::buffer::{c_str, count_out, out_array, owned_array, read_rgb, read_rotation, read_vec3, uuid_slice},
    crate::error::FfiError,
    crate::handle::{context_ref, destroy, handle_mut, handle_ref, into_handle},
    helios::plugins::visualizer::{Colormap, LightingModel, Visualizer, VisualizerConfigBuilder},
};

plugin_handle!("visualizer", VisualizerHandle = Visualizer);

#[cfg(feature = "visualizer")]
fn visualizer<'a>(handle: *mut VisualizerHandle) -> Result<&'a mut VisualizerHandle, FfiError> {
    handle_mut(handle, "Visualizer")
}

#[cfg(feature = "visualizer")]
fn create(width: u32, height: u32, samples: u32, headless: bool) -> Result<*mut VisualizerHandle, FfiError> {
    let config = VisualizerConfigBuilder::new()
        .width(width)
        .height(height)
        .antialiasing_samples(samples)
        .headless(headless)
        .build()?;
    Ok(into_handle(Visualizer::new(config)?))
}

plugin_exports! { "visualizer";
    /// Only headless visualizers exist; `headless = false` fails with code 5.
    fn createVisualizer(width: u32, height: u32, headless: bool) -> *mut VisualizerHandle = ptr::null_mut() => {
        create(width, height, 1, headless)
    }

    fn createVisualizerWithAntialiasing(
        width: u32,
        height: u32,
        antialiasing_samples: u32,
        headless: bool,
    ) -> *mut VisualizerHandle = ptr::null_mut() => {
        create(width, height, antialiasing_samples, headless)
    }

    fn destroyVisualizer(visualizer: *mut VisualizerHandle) -> () = () => {
        destroy(visualizer);
        Ok(())
    }

    fn buildContextGeometry(visualizer: *mut VisualizerHandle, context: *const Context) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        visualizer.build_context_geometry(context_ref(context)?)?;
        Ok(())
    }

    fn buildContextGeometryUUIDs(
        visualizer: *mut VisualizerHandle,
        context: *const Context,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        let context = context_ref(context)?;
        visualizer.build_context_geometry_uuids(context, uuid_slice(uuids, count)?)?;
        Ok(())
    }

    fn plotUpdate(visualizer: *mut VisualizerHandle) -> () = () => {
        self::visualizer(visualizer)?.plot_update()?;
        Ok(())
    }

    /// Renders a frame and saves it; the image format follows the extension.
    fn printWindow(visualizer: *mut VisualizerHandle, path: *const c_char) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        visualizer.print_window(c_str(path, "path")?)?;
        Ok(())
    }

    /// Packed RGB bytes of the last frame, top row first.
    fn getWindowPixelsRGB(visualizer: *const VisualizerHandle, count: *mut usize) -> *mut u8 = ptr::null_mut() => {
        let count = count_out(count)?;
        let visualizer = handle_ref(visualizer, "Visualizer")?;
        Ok(owned_array(visualizer.window_pixels_rgb().to_vec(), count))
    }

    /// Writes `[width, height]`.
    fn getFramebufferSize(visualizer: *const VisualizerHandle, size: *mut u32) -> () = () => {
        let out = out_array::<2, u32>(size, "size")?;
        let (width, height) = handle_ref(visualizer, "Visualizer")?.framebuffer_size();
        *out = [width, height];
        Ok(())
    }

    fn setCameraPosition(visualizer: *mut VisualizerHandle, position: *const f32, look_at: *const f32) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        let position = read_vec3(position, "camera position")?;
        let look_at = read_vec3(look_at, "look-at point")?;
        visualizer.set_camera_position(position, look_at)?;
        Ok(())
    }

    /// `position` is `(radius, elevation, azimuth)` relative to `look_at`.
    fn setCameraPositionSpherical(visualizer: *mut VisualizerHandle, position: *const f32, look_at: *const f32) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        let position = read_rotation(position)?;
        let look_at = read_vec3(look_at, "look-at point")?;
        visualizer.set_camera_position_spherical(position, look_at)?;
        Ok(())
    }

    fn setCameraFieldOfView(visualizer: *mut VisualizerHandle, degrees: f32) -> () = () => {
        self::visualizer(visualizer)?.set_camera_field_of_view(degrees)?;
        Ok(())
    }

    fn setBackgroundColor(visualizer: *mut VisualizerHandle, color: *const f32) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        visualizer.set_background_color(read_rgb(color)?);
        Ok(())
    }

    fn setLightDirection(visualizer: *mut VisualizerHandle, direction: *const f32) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        visualizer.set_light_direction(read_vec3(direction, "light direction")?)?;
        Ok(())
    }

    /// 0 none, 1 Phong, 2 Phong with shadows.
    fn setLightingModel(visualizer: *mut VisualizerHandle, model: u32) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        let model = LightingModel::from_index(model)
            .ok_or_else(|| FfiError::invalid(format!("unknown lighting model {model}")))?;
        visualizer.set_lighting_model(model);
        Ok(())
    }

    /// Colors primitives by scalar primitive data at the next geometry build.
    fn colorContextPrimitivesByData(visualizer: *mut VisualizerHandle, label: *const c_char) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        visualizer.color_context_primitives_by_data(c_str(label, "label")?);
        Ok(())
    }

    fn colorContextPrimitivesByDataForUUIDs(
        visualizer: *mut VisualizerHandle,
        label: *const c_char,
        uuids: *const Uuid,
        count: usize,
    ) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        let label = c_str(label, "label")?;
        visualizer.color_context_primitives_by_data_for_uuids(label, uuid_slice(uuids, count)?);
        Ok(())
    }

    /// 0 hot, 1 cool, 2 rainbow, 3 lava, 4 parula, 5 gray.
    fn setColormap(visualizer: *mut VisualizerHandle, colormap: u32) -> () = () => {
        let visualizer = self::visualizer(visualizer)?;
        visualizer.set_colormap(Colormap::from_index(colormap)?);
        Ok(())
    }

    fn setColorbarRange(visualizer: *mut VisualizerHandle, min: f32, max: f32) -> () = () => {
        self::visualizer(visualizer)?.set_colorbar_range(min, max)?;
        Ok(())
    }

    fn clearColor(visualizer: *mut VisualizerHandle) -> () = () => {
        self::visualizer(visualizer)?.clear_color();
        Ok(())
    }
}

#[cfg(all(test, feature = "visualizer"))]
mod tests {
    use super::*;
    use crate::buffer::take;
    use crate::context::addPatch;
    use crate::context::data::setPrimitiveDataFloat;
    use crate::context::fixtures::*;
    use std::ffi::CString;

    struct TestVisualizer(*mut VisualizerHandle);

    impl Drop for TestVisualizer {
        fn drop(&mut self) {
            destroyVisualizer(self.0);
        }
    }

    fn pixels(visualizer: &TestVisualizer) -> Vec<u8> {
        let mut count = 0;
        take::array(getWindowPixelsRGB(visualizer.0, &mut count), count)
    }

    #[test]
    fn windowed_visualizers_are_unavailable() {
        assert!(createVisualizer(64, 48, false).is_null());
        assert_eq!(last_code(), 5);
        assert!(createVisualizer(0, 48, true).is_null());
        assert_eq!(last_code(), 1);
    }

    #[test]
    fn oversized_framebuffers_are_allocation_errors() {
        assert!(createVisualizer(u32::MAX, u32::MAX, true).is_null());
        assert_eq!(last_code(), 4);
        assert!(createVisualizerWithAntialiasing(70_000, 1, u32::MAX, true).is_null());
        assert_eq!(last_code(), 4);
    }

    #[test]
    fn frame_shows_the_geometry_over_the_background() {
        let ctx = TestContext::new();
        addPatch(ctx.0);
        let visualizer = TestVisualizer(createVisualizerWithAntialiasing(64, 48, 4, true));
        assert_eq!(last_code(), 0);

        let mut size = [0u32; 2];
        getFramebufferSize(visualizer.0, size.as_mut_ptr());
        assert_eq!(size, [64, 48]);
        let blank = pixels(&visualizer);
        assert_eq!(blank.len(), 64 * 48 * 3);
        assert!(blank.iter().all(|&c| c == 255));

        buildContextGeometry(visualizer.0, ctx.0);
        setLightingModel(visualizer.0, 1);
        plotUpdate(visualizer.0);
        assert_eq!(last_code(), 0);
        assert!(pixels(&visualizer).iter().any(|&c| c != 255));
    }

    #[test]
    fn data_coloring_and_camera_settings_are_validated() {
        let ctx = TestContext::new();
        let uuid = addPatch(ctx.0);
        let label = CString::new("temperature").unwrap();
        setPrimitiveDataFloat(ctx.0, uuid, label.as_ptr(), 300.0);
        let visualizer = TestVisualizer(createVisualizer(32, 32, true));

        setColormap(visualizer.0, 2);
        assert_eq!(last_code(), 0);
        setColormap(visualizer.0, 6);
        assert_eq!(last_code(), 1);
        setLightingModel(visualizer.0, 3);
        assert_eq!(last_code(), 1);
        setColorbarRange(visualizer.0, 10.0, 5.0);
        assert_eq!(last_code(), 1);
        setCameraFieldOfView(visualizer.0, 180.0);
        assert_eq!(last_code(), 1);

        let eye = [0.0f32, 0.0, 1.0];
        setCameraPosition(visualizer.0, eye.as_ptr(), eye.as_ptr());
        assert_eq!(last_code(), 1);
        let spherical = [3.0f32, 0.8, 0.0];
        let origin = [0.0f32; 3];
        setCameraPositionSpherical(visualizer.0, spherical.as_ptr(), origin.as_ptr());
        assert_eq!(last_code(), 0);

        colorContextPrimitivesByDataForUUIDs(visualizer.0, label.as_ptr(), &uuid, 1);
        let missing = [uuid + 5];
        buildContextGeometryUUIDs(visualizer.0, ctx.0, missing.as_ptr(), 1);
        assert_eq!(last_code(), 2);
        buildContextGeometryUUIDs(visualizer.0, ctx.0, &uuid, 1);
        clearColor(visualizer.0);
        assert_eq!(last_code(), 0);
    }

    #[test]
    fn print_window_writes_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("frame.png");
        let path = CString::new(file.to_str().unwrap()).unwrap();

        let ctx = TestContext::new();
        addPatch(ctx.0);
        let visualizer = TestVisualizer(createVisualizer(40, 30, true));
        let background = [0.0f32, 0.0, 0.0];
        setBackgroundColor(visualizer.0, background.as_ptr());
        let light = [0.0f32, 0.0, 1.0];
        setLightDirection(visualizer.0, light.as_ptr());
        buildContextGeometry(visualizer.0, ctx.0);
        printWindow(visualizer.0, path.as_ptr());
        assert_eq!(last_code(), 0);
        assert!(file.exists());

        let bad = CString::new(dir.path().join("frame.unknown").to_str().unwrap()).unwrap();
        printWindow(visualizer.0, bad.as_ptr());
        assert_eq!(last_code(), 3);
    }
}

#[cfg(all(test, not(feature = "visualizer")))]
mod tests {
    use super::*;

    #[test]
    fn compiled_out_group_reports_unavailable() {
        assert!(createVisualizer(640, 480, true).is_null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
        buildContextGeometry(ptr::null_mut(), ptr::null());
        assert_eq!(crate::error::getLastErrorCode(), 6);
    }
}
