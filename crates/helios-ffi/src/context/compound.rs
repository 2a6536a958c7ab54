//! Compound geometry generators and compound objects.

use super::DEFAULT_COLOR;
use crate::buffer::{
    count_out, non_empty_slice, owned_array, read, read_points, read_rgb, read_rotation, read_vec2,
    read_vec3,
};
use crate::error::FfiError;
use crate::handle::{context_mut, context_ref};
use helios::core::context::{Context, ObjectId, Uuid};
use helios::core::geometry::{RgbColor, RgbaColor, SphericalCoord};
use std::ptr;

/// One color per tube node, three floats each.
fn read_node_colors(colors: *const f32, node_count: usize) -> Result<Vec<RgbaColor>, FfiError> {
    Ok(non_empty_slice(colors, node_count * 3, "colors")?
        .chunks_exact(3)
        .map(|c| RgbColor::new(c[0], c[1], c[2]).into())
        .collect())
}

fn read_pair(values: *const u32, what: &str) -> Result<(u32, u32), FfiError> {
    let [a, b] = read::<2, u32>(values, what)?;
    Ok((a, b))
}

fn read_triple(values: *const u32, what: &str) -> Result<(u32, u32, u32), FfiError> {
    let [a, b, c] = read::<3, u32>(values, what)?;
    Ok((a, b, c))
}

exports! {
    /// `subdivisions` holds `(nx, ny)`; returns `nx · ny` patch UUIDs.
    fn addTile(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
        subdivisions: *const u32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_tile(
            read_vec3(center, "center")?,
            read_vec2(size, "size")?,
            read_rotation(rotation)?,
            read_pair(subdivisions, "subdivisions")?,
            DEFAULT_COLOR.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    fn addTileWithColor(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
        subdivisions: *const u32,
        color: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_tile(
            read_vec3(center, "center")?,
            read_vec2(size, "size")?,
            read_rotation(rotation)?,
            read_pair(subdivisions, "subdivisions")?,
            read_rgb(color)?.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    fn addSphere(
        context: *mut Context,
        divisions: u32,
        center: *const f32,
        radius: f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_sphere(divisions, read_vec3(center, "center")?, radius, DEFAULT_COLOR.into())?;
        Ok(owned_array(uuids, count))
    }

    fn addSphereWithColor(
        context: *mut Context,
        divisions: u32,
        center: *const f32,
        radius: f32,
        color: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_sphere(divisions, read_vec3(center, "center")?, radius, read_rgb(color)?.into())?;
        Ok(owned_array(uuids, count))
    }

    /// `nodes` holds `3 · node_count` floats and `radii` one radius per node.
    fn addTube(
        context: *mut Context,
        divisions: u32,
        nodes: *const f32,
        node_count: usize,
        radii: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let nodes = read_points(nodes, node_count, "nodes")?;
        let radii = non_empty_slice(radii, node_count, "radii")?;
        let uuids = context.add_tube(divisions, &nodes, radii, &[DEFAULT_COLOR.into()])?;
        Ok(owned_array(uuids, count))
    }

    /// As `addTube`, with `colors` holding one RGB triple per node.
    fn addTubeWithColor(
        context: *mut Context,
        divisions: u32,
        nodes: *const f32,
        node_count: usize,
        radii: *const f32,
        colors: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let nodes = read_points(nodes, node_count, "nodes")?;
        let radii = non_empty_slice(radii, node_count, "radii")?;
        let colors = read_node_colors(colors, node_count)?;
        let uuids = context.add_tube(divisions, &nodes, radii, &colors)?;
        Ok(owned_array(uuids, count))
    }

    /// `subdivisions` holds `(nx, ny, nz)`.
    fn addBox(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        subdivisions: *const u32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_box(
            read_vec3(center, "center")?,
            read_vec3(size, "size")?,
            read_triple(subdivisions, "subdivisions")?,
            DEFAULT_COLOR.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    fn addBoxWithColor(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        subdivisions: *const u32,
        color: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_box(
            read_vec3(center, "center")?,
            read_vec3(size, "size")?,
            read_triple(subdivisions, "subdivisions")?,
            read_rgb(color)?.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    /// Horizontal elliptical disk with semi-axes `size`.
    fn addDisk(
        context: *mut Context,
        divisions: u32,
        center: *const f32,
        size: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_disk(
            read_vec3(center, "center")?,
            read_vec2(size, "size")?,
            SphericalCoord::default(),
            divisions,
            DEFAULT_COLOR.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    fn addDiskWithRotationAndColor(
        context: *mut Context,
        divisions: u32,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
        color: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_disk(
            read_vec3(center, "center")?,
            read_vec2(size, "size")?,
            read_rotation(rotation)?,
            divisions,
            read_rgb(color)?.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    fn addCone(
        context: *mut Context,
        divisions: u32,
        node0: *const f32,
        node1: *const f32,
        radius0: f32,
        radius1: f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_cone(
            divisions,
            read_vec3(node0, "node0")?,
            read_vec3(node1, "node1")?,
            (radius0, radius1),
            DEFAULT_COLOR.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    fn addConeWithColor(
        context: *mut Context,
        divisions: u32,
        node0: *const f32,
        node1: *const f32,
        radius0: f32,
        radius1: f32,
        color: *const f32,
        count: *mut usize,
    ) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let context = context_mut(context)?;
        let uuids = context.add_cone(
            divisions,
            read_vec3(node0, "node0")?,
            read_vec3(node1, "node1")?,
            (radius0, radius1),
            read_rgb(color)?.into(),
        )?;
        Ok(owned_array(uuids, count))
    }

    fn addTileObject(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
        subdivisions: *const u32,
        color: *const f32,
    ) -> ObjectId = 0 => {
        let context = context_mut(context)?;
        Ok(context.add_tile_object(
            read_vec3(center, "center")?,
            read_vec2(size, "size")?,
            read_rotation(rotation)?,
            read_pair(subdivisions, "subdivisions")?,
            read_rgb(color)?.into(),
        )?)
    }

    fn addSphereObject(
        context: *mut Context,
        divisions: u32,
        center: *const f32,
        radius: f32,
        color: *const f32,
    ) -> ObjectId = 0 => {
        let context = context_mut(context)?;
        Ok(context.add_sphere_object(divisions, read_vec3(center, "center")?, radius, read_rgb(color)?.into())?)
    }

    fn addTubeObject(
        context: *mut Context,
        divisions: u32,
        nodes: *const f32,
        node_count: usize,
        radii: *const f32,
        colors: *const f32,
    ) -> ObjectId = 0 => {
        let context = context_mut(context)?;
        let nodes = read_points(nodes, node_count, "nodes")?;
        let radii = non_empty_slice(radii, node_count, "radii")?;
        let colors = read_node_colors(colors, node_count)?;
        Ok(context.add_tube_object(divisions, &nodes, radii, &colors)?)
    }

    fn addBoxObject(
        context: *mut Context,
        center: *const f32,
        size: *const f32,
        subdivisions: *const u32,
        color: *const f32,
    ) -> ObjectId = 0 => {
        let context = context_mut(context)?;
        Ok(context.add_box_object(
            read_vec3(center, "center")?,
            read_vec3(size, "size")?,
            read_triple(subdivisions, "subdivisions")?,
            read_rgb(color)?.into(),
        )?)
    }

    fn addDiskObject(
        context: *mut Context,
        divisions: u32,
        center: *const f32,
        size: *const f32,
        rotation: *const f32,
        color: *const f32,
    ) -> ObjectId = 0 => {
        let context = context_mut(context)?;
        Ok(context.add_disk_object(
            read_vec3(center, "center")?,
            read_vec2(size, "size")?,
            read_rotation(rotation)?,
            divisions,
            read_rgb(color)?.into(),
        )?)
    }

    fn addConeObject(
        context: *mut Context,
        divisions: u32,
        node0: *const f32,
        node1: *const f32,
        radius0: f32,
        radius1: f32,
        color: *const f32,
    ) -> ObjectId = 0 => {
        let context = context_mut(context)?;
        Ok(context.add_cone_object(
            divisions,
            read_vec3(node0, "node0")?,
            read_vec3(node1, "node1")?,
            (radius0, radius1),
            read_rgb(color)?.into(),
        )?)
    }

    fn getObjectCount(context: *const Context) -> usize = 0 => {
        Ok(context_ref(context)?.object_count())
    }

    fn getAllObjectIDs(context: *const Context, count: *mut usize) -> *mut ObjectId = ptr::null_mut() => {
        let count = count_out(count)?;
        Ok(owned_array(context_ref(context)?.all_object_ids(), count))
    }

    /// Tile 0, sphere 1, tube 2, box 3, disk 4, polymesh 5, cone 6.
    fn getObjectType(context: *const Context, object_id: ObjectId) -> u32 = 0 => {
        Ok(context_ref(context)?.object_type(object_id)? as u32)
    }

    fn getObjectPrimitiveUUIDs(context: *const Context, object_id: ObjectId, count: *mut usize) -> *mut Uuid = ptr::null_mut() => {
        let count = count_out(count)?;
        let uuids = context_ref(context)?.object_primitive_uuids(object_id)?;
        Ok(owned_array(uuids, count))
    }

    fn doesObjectExist(context: *const Context, object_id: ObjectId) -> bool = false => {
        Ok(context_ref(context)?.does_object_exist(object_id))
    }

    fn getObjectArea(context: *const Context, object_id: ObjectId) -> f32 = 0.0 => {
        Ok(context_ref(context)?.object_area(object_id)?)
    }

    fn deleteObject(context: *mut Context, object_id: ObjectId) -> () = () => {
        Ok(context_mut(context)?.delete_object(object_id)?)
    }

    fn translateObject(context: *mut Context, object_id: ObjectId, shift: *const f32) -> () = () => {
        let context = context_mut(context)?;
        Ok(context.translate_object(object_id, read_vec3(shift, "shift")?)?)
    }

    /// Rotates by `angle` radians about `axis` through the origin.
    fn rotateObject(context: *mut Context, object_id: ObjectId, angle: f32, axis: *const f32) -> () = () => {
        let context = context_mut(context)?;
        Ok(context.rotate_object(object_id, angle, read_vec3(axis, "axis")?)?)
    }

    fn copyObject(context: *mut Context, object_id: ObjectId) -> ObjectId = 0 => {
        Ok(context_mut(context)?.copy_object(object_id)?)
    }

    /// Groups existing primitives into a polymesh object.
    fn addPolymeshObject(context: *mut Context, uuids: *const Uuid, count: usize) -> ObjectId = 0 => {
        let context = context_mut(context)?;
        let uuids = crate::buffer::uuid_slice(uuids, count)?;
        Ok(context.add_polymesh_object(uuids)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::super::{getPrimitiveArea, getPrimitiveColor, getPrimitiveType, getPrimitiveVertices};
    use super::*;
    use crate::buffer::take;

    const ORIGIN: [f32; 3] = [0.0, 0.0, 0.0];
    const NO_ROTATION: [f32; 3] = [0.0, 0.0, 0.0];
    const BLUE: [f32; 3] = [0.0, 0.0, 1.0];

    fn color_of(ctx: &TestContext, uuid: Uuid) -> [f32; 3] {
        let mut color = [0.0; 3];
        getPrimitiveColor(ctx.0, uuid, color.as_mut_ptr());
        color
    }

    #[test]
    fn tile_returns_one_patch_per_subdivision() {
        let ctx = TestContext::new();
        let size = [2.0, 3.0];
        let subdivisions = [2u32, 3];
        let mut count = 0;
        let uuids = take::array(
            addTileWithColor(
                ctx.0,
                ORIGIN.as_ptr(),
                size.as_ptr(),
                NO_ROTATION.as_ptr(),
                subdivisions.as_ptr(),
                BLUE.as_ptr(),
                &mut count,
            ),
            count,
        );
        assert_eq!(last_code(), 0);
        assert_eq!(uuids.len(), 6);
        for uuid in uuids {
            assert_eq!(getPrimitiveType(ctx.0, uuid), 0);
            assert!((getPrimitiveArea(ctx.0, uuid) - 1.0).abs() < 1e-5);
            assert_eq!(color_of(&ctx, uuid), BLUE);
        }
    }

    #[test]
    fn compound_counts_follow_their_divisions() {
        let ctx = TestContext::new();
        let mut count = 0;

        let sphere = take::array(addSphere(ctx.0, 4, ORIGIN.as_ptr(), 1.0, &mut count), count);
        assert_eq!(sphere.len(), 2 * 4 * 3);

        let nodes = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 2.0];
        let radii = [0.2, 0.2, 0.1];
        let tube = take::array(addTube(ctx.0, 6, nodes.as_ptr(), 3, radii.as_ptr(), &mut count), count);
        assert_eq!(tube.len(), 2 * 6 * 2);
        assert!(tube.iter().all(|u| getPrimitiveType(ctx.0, *u) == 1));

        let size = [1.0, 1.0, 1.0];
        let subdivisions = [2u32, 1, 1];
        let cuboid = take::array(addBox(ctx.0, ORIGIN.as_ptr(), size.as_ptr(), subdivisions.as_ptr(), &mut count), count);
        assert_eq!(cuboid.len(), 2 * (2 + 1 + 2));

        let disk_size = [1.0, 0.5];
        let disk = take::array(addDisk(ctx.0, 8, ORIGIN.as_ptr(), disk_size.as_ptr(), &mut count), count);
        assert_eq!(disk.len(), 8);

        let apex = [0.0, 0.0, 1.0];
        let cone = take::array(addCone(ctx.0, 5, ORIGIN.as_ptr(), apex.as_ptr(), 0.5, 0.0, &mut count), count);
        assert_eq!(cone.len(), 10);
    }

    #[test]
    fn failed_compounds_report_zero() {
        let ctx = TestContext::new();
        let mut count = 42;
        let uuids = addSphere(ctx.0, 4, ORIGIN.as_ptr(), -1.0, &mut count);
        assert!(uuids.is_null());
        assert_eq!(count, 0);
        assert_eq!(last_code(), 1);

        let nodes = [0.0; 3];
        let radii = [1.0];
        assert!(addTube(ctx.0, 6, nodes.as_ptr(), 1, radii.as_ptr(), &mut count).is_null());
        assert_eq!(last_code(), 1);
    }

    #[test]
    fn oversized_tile_is_an_allocation_error() {
        let ctx = TestContext::new();
        let size = [1.0, 1.0];
        let subdivisions = [u32::MAX, u32::MAX];
        let mut count = 42;
        let uuids = addTile(
            ctx.0,
            ORIGIN.as_ptr(),
            size.as_ptr(),
            NO_ROTATION.as_ptr(),
            subdivisions.as_ptr(),
            &mut count,
        );
        assert!(uuids.is_null());
        assert_eq!(count, 0);
        assert_eq!(last_code(), 4);
        assert_eq!(super::super::getPrimitiveCount(ctx.0), 0);

        assert!(addSphere(ctx.0, u32::MAX, ORIGIN.as_ptr(), 1.0, &mut count).is_null());
        assert_eq!(last_code(), 4);
    }

    #[test]
    fn tube_colors_follow_their_nodes() {
        let ctx = TestContext::new();
        let nodes = [0.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let radii = [0.1, 0.1];
        let colors = [0.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let mut count = 0;
        let uuids = take::array(
            addTubeWithColor(ctx.0, 3, nodes.as_ptr(), 2, radii.as_ptr(), colors.as_ptr(), &mut count),
            count,
        );
        assert_eq!(uuids.len(), 6);
        assert_eq!(color_of(&ctx, uuids[0]), BLUE);

        let mut floats = 0;
        let vertices = take::array(getPrimitiveVertices(ctx.0, uuids[0], &mut floats), floats);
        assert_eq!(vertices.len(), 9);
        assert!(vertices.chunks(3).all(|v| (v[0].hypot(v[1]) - 0.1).abs() < 1e-4));
    }

    #[test]
    fn objects_group_their_primitives() {
        let ctx = TestContext::new();
        let size = [1.0, 1.0, 1.0];
        let subdivisions = [1u32, 1, 1];
        let id = addBoxObject(ctx.0, ORIGIN.as_ptr(), size.as_ptr(), subdivisions.as_ptr(), BLUE.as_ptr());
        assert_eq!(last_code(), 0);
        assert!(doesObjectExist(ctx.0, id));
        assert_eq!(getObjectType(ctx.0, id), 3);
        assert_eq!(getObjectCount(ctx.0), 1);
        assert!((getObjectArea(ctx.0, id) - 6.0).abs() < 1e-4);

        let mut count = 0;
        let members = take::array(getObjectPrimitiveUUIDs(ctx.0, id, &mut count), count);
        assert_eq!(members.len(), 6);
        assert!(members.iter().all(|u| ctx.get().primitive_parent_object(*u).unwrap() == id));

        let copy = copyObject(ctx.0, id);
        assert_ne!(copy, id);
        let shift = [0.0, 0.0, 5.0];
        translateObject(ctx.0, copy, shift.as_ptr());
        let ids = take::array(getAllObjectIDs(ctx.0, &mut count), count);
        assert_eq!(ids, vec![id, copy]);

        deleteObject(ctx.0, id);
        assert!(!doesObjectExist(ctx.0, id));
        assert_eq!(getObjectArea(ctx.0, id), 0.0);
        assert_eq!(last_code(), 2);
    }
}
