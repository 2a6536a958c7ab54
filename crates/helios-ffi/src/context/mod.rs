//! Context and geometry entry points: context lifecycle, primitive creation,
//! queries and modification. Compound shapes, data, time and file I/O live in
//! the submodules.

pub mod compound;
pub mod data;
pub mod io;
pub mod time;

use crate::buffer::{
    c_str, count_out, out_array, owned_array, read_rgb, read_rgba, read_rotation, read_vec2, read_vec3,
    uuid_slice,
};
use crate::error::FfiError;
use crate::handle::{context_mut, context_ref, destroy, into_handle};
use helios::core::context::{Context, Uuid};
use helios::core::geometry::{Axis, RgbColor, RgbaColor, SphericalCoord, Vec2, Vec3};
use std::ffi::c_char;
use std::ptr;

fn parse_axis(axis: *const c_char) -> Result<Axis, FfiError> {
    c_str(axis, "axis")?
        .parse::<Axis>()
        .map_err(|e| FfiError::invalid(e.to_string()))
}

const DEFAULT_COLOR: RgbColor = RgbColor::RED;

exports! {
    fn createContext() -> *mut Context = ptr::null_mut() => {
        Ok(into_handle(Context::new()))
    }

    fn destroyContext(context: *mut Context) -> () = () => {
        destroy(context);
        Ok(())
    }

    fn markGeometryClean(context: *mut Context) -> () = () => {
        context_mut(context)?.mark_geometry_clean();
        Ok(())
    }

    fn markGeometryDirty(context: *mut Context) -> () = () => {
        context_mut(context)?.mark_geometry_dirty();
        Ok(())
    }

    fn isGeometryDirty(context: *const Context) -> bool = false => {
        Ok(context_ref(context)?.is_geometry_dirty())
    }

    /// Unit patch at the origin, facing +z, red.
    fn addPatch(context: *mut Context) -> Uuid = 0 => {
        let context = context_mut(context)?;
        Ok(context.add_patch(Vec3::zeros(), Vec2::new(1.0, 1.0), SphericalCoord::default(), DEFAULT_COLOR.into())?)
    }

    fn addPatchWithCenterAndSize(context: *mut Context, center: *const f32, size: *const f32) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let (center, size) = (read_vec3(center, "center")?, read_vec2(size, "size")?);
        Ok(context.add_patch(center, size, SphericalCoord::default(), DEFAULT_COLOR.into())?)
    }

    fn addPatchWithCenterSizeAndRotation(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
    ) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let (center, size) = (read_vec3(center, "center")?, read_vec2(size, "size")?);
        Ok(context.add_patch(center, size, read_rotation(rotation)?, DEFAULT_COLOR.into())?)
    }

    fn addPatchWithCenterSizeRotationAndColor(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
        color: *const f32,
    ) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let (center, size) = (read_vec3(center, "center")?, read_vec2(size, "size")?);
        Ok(context.add_patch(center, size, read_rotation(rotation)?, read_rgb(color)?.into())?)
    }

    fn addPatchWithCenterSizeRotationAndColorRGBA(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
        color: *const f32,
    ) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let (center, size) = (read_vec3(center, "center")?, read_vec2(size, "size")?);
        Ok(context.add_patch(center, size, read_rotation(rotation)?, read_rgba(color)?)?)
    }

    fn addTriangle(context: *mut Context, v0: *const f32, v1: *const f32, v2: *const f32) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let [a, b, c] = [read_vec3(v0, "v0")?, read_vec3(v1, "v1")?, read_vec3(v2, "v2")?];
        Ok(context.add_triangle(a, b, c, DEFAULT_COLOR.into())?)
    }

    fn addTriangleWithColor(
        context: *mut Context,
        v0: *const f32,
        v1: *const f32,
        v2: *const f32,
        color: *const f32,
    ) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let [a, b, c] = [read_vec3(v0, "v0")?, read_vec3(v1, "v1")?, read_vec3(v2, "v2")?];
        Ok(context.add_triangle(a, b, c, read_rgb(color)?.into())?)
    }

    fn addTriangleWithColorRGBA(
        context: *mut Context,
        v0: *const f32,
        v1: *const f32,
        v2: *const f32,
        color: *const f32,
    ) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let [a, b, c] = [read_vec3(v0, "v0")?, read_vec3(v1, "v1")?, read_vec3(v2, "v2")?];
        Ok(context.add_triangle(a, b, c, read_rgba(color)?)?)
    }

    fn addVoxel(context: *mut Context, center: *const f32, size: *const f32) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let (center, size) = (read_vec3(center, "center")?, read_vec3(size, "size")?);
        Ok(context.add_voxel(center, size, 0.0, DEFAULT_COLOR.into())?)
    }

    /// `rotation` is the angle about +z in radians.
    fn addVoxelWithRotationAndColor(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        rotation: f32,
        color: *const f32,
    ) -> Uuid = 0 => {
        let context = context_mut(context)?;
        let (center, size) = (read_vec3(center, "center")?, read_vec3(size, "size")?);
        Ok(context.add_voxel(center, size, rotation, read_rgb(color)?.into())?)
    }

    /// Patch 0, triangle 1, voxel 2.
    fn getPrimitiveType(context: *const Context, uuid: Uuid) -> u32 = 0 => {
        Ok(context_ref(context)?.primitive_type(uuid)? as u32)
    }

    fn getPrimitiveArea(context: *const Context, uuid: Uuid) -> f32 = 0.0 => {
        Ok(context_ref(context)?.primitive_area(uuid)?)
    }

    fn getPrimitiveNormal(context: *const Context, uuid: Uuid, normal: *mut f32) -> () = () => {
        let context = context_ref(context)?;
        let out = out_array::<3, f32>(normal, "normal")?;
        *out = context.primitive_normal(uuid)?.into();
        Ok(())
    }

    /// Vertex coordinates, three floats per vertex; `count` receives the float count.
    fn getPrimitiveVertices(context: *const Context, uuid: Uuid, count: *mut usize) -> *mut f32 = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_ref(context)?;
        let flat = context
            .primitive_vertices(uuid)?
            .iter()
            .flat_map(|v| [v.x, v.y, v.z])
            .collect();
        Ok(owned_array(flat, count))
    }

    fn getPrimitiveColor(context: *const Context, uuid: Uuid, color: *mut f32) -> () = () => {
        let context = context_ref(context)?;
        let out = out_array::<3, f32>(color, "color")?;
        *out = context.primitive_color(uuid)?.rgb().to_array();
        Ok(())
    }

    fn getPrimitiveColorRGBA(context: *const Context, uuid: Uuid, color: *mut f32) -> () = () => {
        let context = context_ref(context)?;
        let out = out_array::<4, f32>(color, "color")?;
        *out = context.primitive_color(uuid)?.to_array();
        Ok(())
    }

    fn getPrimitiveCount(context: *const Context) -> usize = 0 => {
        Ok(context_ref(context)?.primitive_count())
    }

    fn getAllUUIDs(context: *const Context, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_ref(context)?;
        Ok(owned_array(context.all_uuids(), count))
    }

    fn doesPrimitiveExist(context: *const Context, uuid: Uuid) -> bool = false => {
        Ok(context_ref(context)?.does_primitive_exist(uuid))
    }

    /// Zero when the primitive belongs to no object.
    fn getPrimitiveParentObjectID(context: *const Context, uuid: Uuid) -> u32 = 0 => {
        Ok(context_ref(context)?.primitive_parent_object(uuid)?)
    }

    fn getPatchCenter(context: *const Context, uuid: Uuid, center: *mut f32) -> () = () => {
        let context = context_ref(context)?;
        let out = out_array::<3, f32>(center, "center")?;
        *out = context.patch_center(uuid)?.into();
        Ok(())
    }

    fn getPatchSize(context: *const Context, uuid: Uuid, size: *mut f32) -> () = () => {
        let context = context_ref(context)?;
        let out = out_array::<2, f32>(size, "size")?;
        *out = context.patch_size(uuid)?.into();
        Ok(())
    }

    /// Writes `[xmin, xmax, ymin, ymax, zmin, zmax]`; all zero for an empty scene.
    fn getDomainBoundingBox(context: *const Context, bounds: *mut f32) -> () = () => {
        let context = context_ref(context)?;
        let out = out_array::<6, f32>(bounds, "bounds")?;
        let bbox = context.domain_bounding_box();
        *out = if bbox.is_empty() {
            [0.0; 6]
        } else {
            [bbox.min.x, bbox.max.x, bbox.min.y, bbox.max.y, bbox.min.z, bbox.max.z]
        };
        Ok(())
    }

    fn setPrimitiveColor(context: *mut Context, uuid: Uuid, color: *const f32) -> () = () => {
        let context = context_mut(context)?;
        Ok(context.set_primitive_color(uuid, read_rgb(color)?.into())?)
    }

    fn setPrimitiveColorForUUIDs(context: *mut Context, uuids: *const Uuid, count: usize, color: *const f32) -> () = () => {
        let context = context_mut(context)?;
        let (uuids, color): (_, RgbaColor) = (uuid_slice(uuids, count)?, read_rgb(color)?.into());
        context.validate_uuids(uuids)?;
        for &uuid in uuids {
            context.set_primitive_color(uuid, color)?;
        }
        Ok(())
    }

    fn deletePrimitive(context: *mut Context, uuid: Uuid) -> () = () => {
        Ok(context_mut(context)?.delete_primitive(uuid)?)
    }

    fn deletePrimitives(context: *mut Context, uuids: *const Uuid, count: usize) -> () = () => {
        let context = context_mut(context)?;
        let uuids = uuid_slice(uuids, count)?;
        context.validate_uuids(uuids)?;
        for &uuid in uuids {
            context.delete_primitive(uuid)?;
        }
        Ok(())
    }

    fn copyPrimitive(context: *mut Context, uuid: Uuid) -> Uuid = 0 => {
        Ok(context_mut(context)?.copy_primitive(uuid)?)
    }

    fn copyPrimitives(
        context: *mut Context,
        uuids: *const Uuid,
        count: usize,
        copy_count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let copy_count = count_out(copy_count)?;
        let context = context_mut(context)?;
        let uuids = uuid_slice(uuids, count)?;
        context.validate_uuids(uuids)?;
        let copies = uuids
            .iter()
            .map(|&uuid| context.copy_primitive(uuid))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(owned_array(copies, copy_count))
    }

    fn translatePrimitive(context: *mut Context, uuid: Uuid, shift: *const f32) -> () = () => {
        let context = context_mut(context)?;
        Ok(context.translate_primitive(uuid, read_vec3(shift, "shift")?)?)
    }

    fn translatePrimitives(context: *mut Context, uuids: *const Uuid, count: usize, shift: *const f32) -> () = () => {
        let context = context_mut(context)?;
        let (uuids, shift) = (uuid_slice(uuids, count)?, read_vec3(shift, "shift")?);
        context.validate_uuids(uuids)?;
        for &uuid in uuids {
            context.translate_primitive(uuid, shift)?;
        }
        Ok(())
    }

    /// Rotates by `angle` radians about the principal axis named `"x"`, `"y"` or `"z"`.
    fn rotatePrimitive(context: *mut Context, uuid: Uuid, angle: f32, axis: *const c_char) -> () = () => {
        let context = context_mut(context)?;
        Ok(context.rotate_primitive(uuid, angle, parse_axis(axis)?)?)
    }

    fn rotatePrimitiveAboutAxis(context: *mut Context, uuid: Uuid, angle: f32, axis: *const f32) -> () = () => {
        let context = context_mut(context)?;
        Ok(context.rotate_primitive_about_axis(uuid, angle, read_vec3(axis, "axis")?)?)
    }

    fn rotatePrimitives(
        context: *mut Context,
        uuids: *const Uuid,
        count: usize,
        angle: f32,
        axis: *const c_char,
    ) -> () = () => {
        let context = context_mut(context)?;
        let (uuids, axis) = (uuid_slice(uuids, count)?, parse_axis(axis)?);
        context.validate_uuids(uuids)?;
        for &uuid in uuids {
            context.rotate_primitive(uuid, angle, axis)?;
        }
        Ok(())
    }

    fn scalePrimitive(context: *mut Context, uuid: Uuid, scale: *const f32) -> () = () => {
        let context = context_mut(context)?;
        Ok(context.scale_primitive(uuid, read_vec3(scale, "scale")?)?)
    }
}
