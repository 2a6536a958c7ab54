use crate::buffer::{c_str, c_str_array, count_out, owned_array, read_rgb, read_rotation, read_vec3, uuid_slice};
use crate::error::FfiError;
use crate::handle::{context_mut, context_ref};
use helios::core::context::{Context, Uuid};
use helios::core::io::timeseries::{DateFormat, TabularOptions};
use helios::core::io::{LoadOptions, UpAxis};
use std::ffi::c_char;
use std::ptr;

fn load_options(
    origin: *const f32,
    height: f32,
    rotation: *const f32,
    color: *const f32,
    up_axis: *const c_char,
) -> Result<LoadOptions, FfiError> {
    if height < 0.0 {
        return Err(FfiError::invalid(format!("height must be non-negative, got {height}")));
    }
    Ok(LoadOptions {
        origin: read_vec3(origin, "origin")?,
        height,
        rotation: read_rotation(rotation)?,
        color: read_rgb(color)?,
        up_axis: c_str(up_axis, "up axis")?.parse::<UpAxis>()?,
    })
}

fn delimiter_byte(delimiter: *const c_char) -> Result<u8, FfiError> {
    match c_str(delimiter, "delimiter")?.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        other => Err(FfiError::invalid(format!(
            "delimiter must be a single ASCII character, got {} bytes",
            other.len()
        ))),
    }
}

exports! {
    /// Writes every primitive as an ASCII Wavefront OBJ file.
    fn writeOBJ(context: *const Context, path: *const c_char) -> () = () => {
        let context = context_ref(context)?;
        context.write_obj(c_str(path, "path")?, None)?;
        Ok(())
    }

    fn writeOBJForUUIDs(context: *const Context, path: *const c_char, uuids: *const Uuid, count: usize) -> () = () => {
        let context = context_ref(context)?;
        let uuids = uuid_slice(uuids, count)?;
        context.write_obj(c_str(path, "path")?, Some(uuids))?;
        Ok(())
    }

    /// Loads an OBJ model unscaled at the origin, z-up, returning the new triangle UUIDs.
    fn loadOBJ(context: *mut Context, path: *const c_char, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.load_obj(c_str(path, "path")?, &LoadOptions::default())?;
        Ok(owned_array(uuids, count))
    }

    /// Loads an OBJ model scaled to `height` (0 keeps its size), rotated by
    /// `rotation`, moved to `origin`; `color` fills faces without a material
    /// and `up_axis` is `"YUP"` or `"ZUP"`.
    fn loadOBJWithOptions(
        context: *mut Context,
        path: *const c_char,
        origin: *const f32,
        height: f32,
        rotation: *const f32,
        color: *const f32,
        up_axis: *const c_char,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let options = load_options(origin, height, rotation, color, up_axis)?;
        let uuids = context.load_obj(c_str(path, "path")?, &options)?;
        Ok(owned_array(uuids, count))
    }

    fn writePLY(context: *const Context, path: *const c_char) -> () = () => {
        let context = context_ref(context)?;
        context.write_ply(c_str(path, "path")?, None)?;
        Ok(())
    }

    fn writePLYForUUIDs(context: *const Context, path: *const c_char, uuids: *const Uuid, count: usize) -> () = () => {
        let context = context_ref(context)?;
        let uuids = uuid_slice(uuids, count)?;
        context.write_ply(c_str(path, "path")?, Some(uuids))?;
        Ok(())
    }

    fn loadPLY(context: *mut Context, path: *const c_char, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.load_ply(c_str(path, "path")?, &LoadOptions::default())?;
        Ok(owned_array(uuids, count))
    }

    fn loadPLYWithOptions(
        context: *mut Context,
        path: *const c_char,
        origin: *const f32,
        height: f32,
        rotation: *const f32,
        color: *const f32,
        up_axis: *const c_char,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let options = load_options(origin, height, rotation, color, up_axis)?;
        let uuids = context.load_ply(c_str(path, "path")?, &options)?;
        Ok(owned_array(uuids, count))
    }

    /// Reads a delimited weather file into timeseries. `labels` names each
    /// column in order: `year`, `month`, `day`, `DOY`, `hour`, `minute`,
    /// `second`, `date`, `time` and `NULL` are timestamp keywords or skipped
    /// columns, any other label becomes a variable. Returns the rows loaded.
    fn loadTabularTimeseriesData(
        context: *mut Context,
        path: *const c_char,
        labels: *const *const c_char,
        label_count: usize,
        delimiter: *const c_char,
        date_format: *const c_char,
        header_lines: usize,
    ) -> usize = 0 => {
        let context = context_mut(context)?;
        let path = c_str(path, "path")?;
        let options = TabularOptions {
            labels: c_str_array(labels, label_count, "labels")?
                .into_iter()
                .map(str::to_string)
                .collect(),
            delimiter: delimiter_byte(delimiter)?,
            date_format: c_str(date_format, "date format")?.parse::<DateFormat>()?,
            header_lines,
        };
        Ok(context.load_tabular_timeseries(path, &options)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{addPatch, getPrimitiveCount};
    use super::*;
    use crate::buffer::take;
    use crate::context::time::{getTimeseriesLength, queryTimeseriesData};
    use std::ffi::CString;

    fn path_arg(path: &std::path::Path) -> CString {
        CString::new(path.to_str().unwrap()).unwrap()
    }

    #[test]
    fn obj_export_reloads_as_triangles() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_arg(&dir.path().join("patch.obj"));

        let source = TestContext::new();
        addPatch(source.0);
        writeOBJ(source.0, path.as_ptr());
        assert_eq!(last_code(), 0);

        let target = TestContext::new();
        let mut count = 0;
        let uuids = take::array(loadOBJ(target.0, path.as_ptr(), &mut count), count);
        assert_eq!(uuids.len(), 2);
        assert_eq!(getPrimitiveCount(target.0), 2);
    }

    #[test]
    fn ply_export_honors_selection_and_height() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_arg(&dir.path().join("patch.ply"));

        let source = TestContext::new();
        let kept = addPatch(source.0);
        addPatch(source.0);
        writePLYForUUIDs(source.0, path.as_ptr(), &kept, 1);
        assert_eq!(last_code(), 0);

        let target = TestContext::new();
        let origin = [1.0f32, 2.0, 0.0];
        let rotation = [1.0f32, 0.0, 0.0];
        let color = [0.2f32, 0.6, 0.2];
        let up = CString::new("YUP").unwrap();
        let mut count = 0;
        let uuids = take::array(
            loadPLYWithOptions(
                target.0,
                path.as_ptr(),
                origin.as_ptr(),
                0.0,
                rotation.as_ptr(),
                color.as_ptr(),
                up.as_ptr(),
                &mut count,
            ),
            count,
        );
        assert_eq!(uuids.len(), 2);
    }

    #[test]
    fn load_failures_are_io_or_parameter_errors() {
        let ctx = TestContext::new();
        let missing = CString::new("/nonexistent/model.obj").unwrap();
        let mut count = 7;
        assert!(loadOBJ(ctx.0, missing.as_ptr(), &mut count).is_null());
        assert_eq!(count, 0);
        assert_eq!(last_code(), 3);

        let origin = [0.0f32; 3];
        let rotation = [1.0f32, 0.0, 0.0];
        let color = [1.0f32; 3];
        let up = CString::new("XUP").unwrap();
        assert!(
            loadOBJWithOptions(
                ctx.0,
                missing.as_ptr(),
                origin.as_ptr(),
                1.0,
                rotation.as_ptr(),
                color.as_ptr(),
                up.as_ptr(),
                &mut count,
            )
            .is_null()
        );
        assert_eq!(last_code(), 1);
    }

    #[test]
    fn tabular_weather_file_becomes_timeseries() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("weather.csv");
        std::fs::write(
            &file,
            "date,hour,temperature,ignored\n2024-07-01,12,25.0,x\n2024-07-01,13,27.0,y\n",
        )
        .unwrap();

        let ctx = TestContext::new();
        let path = path_arg(&file);
        let labels: Vec<CString> = ["date", "hour", "temperature", "NULL"]
            .iter()
            .map(|l| CString::new(*l).unwrap())
            .collect();
        let label_ptrs: Vec<*const c_char> = labels.iter().map(|l| l.as_ptr()).collect();
        let delimiter = CString::new(",").unwrap();
        let format = CString::new("YYYYMMDD").unwrap();

        let rows = loadTabularTimeseriesData(
            ctx.0,
            path.as_ptr(),
            label_ptrs.as_ptr(),
            label_ptrs.len(),
            delimiter.as_ptr(),
            format.as_ptr(),
            1,
        );
        assert_eq!(rows, 2);
        assert_eq!(getTimeseriesLength(ctx.0, labels[2].as_ptr()), 2);
        let value = queryTimeseriesData(ctx.0, labels[2].as_ptr(), 1, 7, 2024, 12, 30, 0);
        assert!((value - 26.0).abs() < 1e-4);

        let bad = CString::new("::").unwrap();
        loadTabularTimeseriesData(ctx.0, path.as_ptr(), label_ptrs.as_ptr(), 4, bad.as_ptr(), format.as_ptr(), 1);
        assert_eq!(last_code(), 1);
    }
}
