//! # Scene Context
//!
//! The [`Context`] owns every piece of scene state shared by the plugin models:
//!
//! - **Primitives** - patches, triangles and voxels, keyed by a [`Uuid`] that is
//!   allocated sequentially and never reused.
//! - **Compound objects** - groups of primitives produced by one generator call
//!   (tiles, spheres, tubes, boxes, disks, cones, loaded meshes), keyed by an
//!   [`ObjectId`] starting at 1. Object ID 0 means "no parent object".
//! - **Typed data** - label-keyed values ([`DataValue`]) at three levels: per
//!   primitive, per object and global. Plugins exchange results exclusively
//!   through primitive data.
//! - **Date, time, location and timeseries** - read by the solar position model and
//!   by callers that drive simulations through recorded weather data.
//! - **Random numbers** - a seedable generator shared by the procedural plugins.

mod compound;
pub mod data;
pub mod error;
pub mod object;
pub mod primitive;
pub mod time;

use crate::core::geometry::raytrace::{Bvh, SceneTriangle};
use crate::core::geometry::{
    Axis, BoundingBox, RgbaColor, SphericalCoord, Transform, Vec2, Vec3, patch_transform,
    rotation_about, rotation_about_axis,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::debug;

pub use data::{DataKind, DataLookupError, DataStore, DataType, DataValue};
pub use error::{ContextError, Result};
pub use object::{CompoundObject, ObjectType};
pub use primitive::{Primitive, PrimitiveType, Shape};
pub use time::{Date, Location, Time, Timeseries};

/// Identifier of a primitive.
pub type Uuid = u32;
/// Identifier of a compound object. Zero is reserved for "none".
pub type ObjectId = u32;

const DEFAULT_SEED: u64 = 5489;

#[derive(Debug)]
pub struct Context {
    primitives: BTreeMap<Uuid, Primitive>,
    objects: BTreeMap<ObjectId, CompoundObject>,
    next_uuid: Uuid,
    next_object_id: ObjectId,
    global_data: DataStore,
    geometry_dirty: bool,
    date: Date,
    time: Time,
    location: Location,
    timeseries: BTreeMap<String, Timeseries>,
    rng: StdRng,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            primitives: BTreeMap::new(),
            objects: BTreeMap::new(),
            next_uuid: 0,
            next_object_id: 1,
            global_data: DataStore::new(),
            geometry_dirty: false,
            date: Date::default(),
            time: Time {
                hour: 12,
                minute: 0,
                second: 0,
            },
            location: Location::default(),
            timeseries: BTreeMap::new(),
            rng: StdRng::seed_from_u64(DEFAULT_SEED),
        }
    }

    // ------------------------------------------------------------------
    // Geometry state
    // ------------------------------------------------------------------

    pub fn mark_geometry_clean(&mut self) {
        self.geometry_dirty = false;
    }

    pub fn mark_geometry_dirty(&mut self) {
        self.geometry_dirty = true;
    }

    pub fn is_geometry_dirty(&self) -> bool {
        self.geometry_dirty
    }

    // ------------------------------------------------------------------
    // Primitive creation
    // ------------------------------------------------------------------

    pub(crate) fn insert_primitive(&mut self, shape: Shape, color: RgbaColor) -> Uuid {
        let uuid = self.next_uuid;
        self.next_uuid += 1;
        self.primitives.insert(uuid, Primitive::new(shape, color));
        self.geometry_dirty = true;
        uuid
    }

    pub(crate) fn insert_primitives(
        &mut self,
        shapes: Vec<(Shape, RgbaColor)>,
    ) -> Result<Vec<Uuid>> {
        let mut uuids = Vec::new();
        uuids
            .try_reserve_exact(shapes.len())
            .map_err(|_| ContextError::Allocation(shapes.len()))?;
        for (shape, color) in shapes {
            uuids.push(self.insert_primitive(shape, color));
        }
        Ok(uuids)
    }

    /// Adds a rectangular patch centered at `center` with edge lengths `size`,
    /// tilted by `rotation` (elevation about x, then azimuth about z).
    pub fn add_patch(
        &mut self,
        center: Vec3,
        size: Vec2,
        rotation: SphericalCoord,
        color: RgbaColor,
    ) -> Result<Uuid> {
        if !(size.x > 0.0 && size.y > 0.0) {
            return Err(ContextError::invalid(format!(
                "patch size ({}, {}) must be positive",
                size.x, size.y
            )));
        }
        let transform = patch_transform(&center, &size, &rotation);
        Ok(self.insert_primitive(Shape::Patch { transform }, color))
    }

    pub fn add_triangle(&mut self, v0: Vec3, v1: Vec3, v2: Vec3, color: RgbaColor) -> Result<Uuid> {
        if [v0, v1, v2].iter().any(|v| !v.iter().all(|c| c.is_finite())) {
            return Err(ContextError::invalid("triangle vertices must be finite"));
        }
        Ok(self.insert_primitive(
            Shape::Triangle {
                vertices: [v0, v1, v2],
            },
            color,
        ))
    }

    /// Adds an axis-aligned box primitive rotated by `rotation` radians about z.
    pub fn add_voxel(
        &mut self,
        center: Vec3,
        size: Vec3,
        rotation: f32,
        color: RgbaColor,
    ) -> Result<Uuid> {
        if !(size.x > 0.0 && size.y > 0.0 && size.z > 0.0) {
            return Err(ContextError::invalid(format!(
                "voxel size ({}, {}, {}) must be positive",
                size.x, size.y, size.z
            )));
        }
        let transform = Transform::new_translation(&center)
            * rotation_about(Axis::Z, rotation)
            * Transform::new_nonuniform_scaling(&size);
        Ok(self.insert_primitive(Shape::Voxel { transform }, color))
    }

    // ------------------------------------------------------------------
    // Primitive queries
    // ------------------------------------------------------------------

    pub fn primitive(&self, uuid: Uuid) -> Result<&Primitive> {
        self.primitives
            .get(&uuid)
            .ok_or(ContextError::UuidNotFound(uuid))
    }

    fn primitive_mut(&mut self, uuid: Uuid) -> Result<&mut Primitive> {
        self.primitives
            .get_mut(&uuid)
            .ok_or(ContextError::UuidNotFound(uuid))
    }

    pub fn primitives(&self) -> impl Iterator<Item = (Uuid, &Primitive)> {
        self.primitives.iter().map(|(uuid, p)| (*uuid, p))
    }

    pub fn primitive_type(&self, uuid: Uuid) -> Result<PrimitiveType> {
        Ok(self.primitive(uuid)?.primitive_type())
    }

    pub fn primitive_area(&self, uuid: Uuid) -> Result<f32> {
        Ok(self.primitive(uuid)?.area())
    }

    pub fn primitive_normal(&self, uuid: Uuid) -> Result<Vec3> {
        Ok(self.primitive(uuid)?.normal())
    }

    pub fn primitive_vertices(&self, uuid: Uuid) -> Result<Vec<Vec3>> {
        Ok(self.primitive(uuid)?.vertices())
    }

    pub fn primitive_color(&self, uuid: Uuid) -> Result<RgbaColor> {
        Ok(self.primitive(uuid)?.color())
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// All primitive UUIDs in ascending order.
    pub fn all_uuids(&self) -> Vec<Uuid> {
        self.primitives.keys().copied().collect()
    }

    pub fn does_primitive_exist(&self, uuid: Uuid) -> bool {
        self.primitives.contains_key(&uuid)
    }

    pub fn primitive_parent_object(&self, uuid: Uuid) -> Result<ObjectId> {
        Ok(self.primitive(uuid)?.parent_object())
    }

    pub fn patch_center(&self, uuid: Uuid) -> Result<Vec3> {
        let primitive = self.primitive(uuid)?;
        match primitive.primitive_type() {
            PrimitiveType::Patch => Ok(primitive.centroid()),
            _ => Err(ContextError::WrongPrimitiveType {
                uuid,
                expected: "patch",
            }),
        }
    }

    pub fn patch_size(&self, uuid: Uuid) -> Result<Vec2> {
        self.primitive(uuid)?
            .patch_size()
            .ok_or(ContextError::WrongPrimitiveType {
                uuid,
                expected: "patch",
            })
    }

    /// Bounding box of every vertex in the scene; empty when there are no primitives.
    pub fn domain_bounding_box(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for p in self.primitives.values() {
            for v in p.vertices() {
                bounds.include(&v);
            }
        }
        bounds
    }

    /// Checks that every UUID exists, reporting the first one that does not.
    pub fn validate_uuids(&self, uuids: &[Uuid]) -> Result<()> {
        match uuids.iter().find(|u| !self.primitives.contains_key(u)) {
            Some(missing) => Err(ContextError::UuidNotFound(*missing)),
            None => Ok(()),
        }
    }

    /// Triangle soup for ray casting, restricted to `uuids` when given.
    pub fn scene_bvh(&self, uuids: Option<&[Uuid]>) -> Result<Bvh> {
        let mut triangles = Vec::new();
        let mut push = |uuid: Uuid, p: &Primitive| {
            triangles.extend(
                p.triangles()
                    .into_iter()
                    .map(|vertices| SceneTriangle::new(vertices, uuid)),
            );
        };
        match uuids {
            Some(uuids) => {
                for &uuid in uuids {
                    push(uuid, self.primitive(uuid)?);
                }
            }
            None => {
                for (uuid, p) in &self.primitives {
                    push(*uuid, p);
                }
            }
        }
        debug!(triangles = triangles.len(), "Building scene BVH.");
        Ok(Bvh::build(triangles))
    }

    // ------------------------------------------------------------------
    // Primitive modification
    // ------------------------------------------------------------------

    pub fn set_primitive_color(&mut self, uuid: Uuid, color: RgbaColor) -> Result<()> {
        self.primitive_mut(uuid)?.color = color;
        Ok(())
    }

    /// Removes a primitive. An object left without members is removed as well.
    pub fn delete_primitive(&mut self, uuid: Uuid) -> Result<()> {
        let primitive = self
            .primitives
            .remove(&uuid)
            .ok_or(ContextError::UuidNotFound(uuid))?;
        let parent = primitive.parent_object();
        if let Some(object) = self.objects.get_mut(&parent) {
            object.uuids.retain(|u| *u != uuid);
            if object.uuids.is_empty() {
                self.objects.remove(&parent);
            }
        }
        self.geometry_dirty = true;
        Ok(())
    }

    /// Duplicates a primitive with its data. The copy has no parent object.
    pub fn copy_primitive(&mut self, uuid: Uuid) -> Result<Uuid> {
        let mut copy = self.primitive(uuid)?.clone();
        copy.parent_object = 0;
        let new_uuid = self.next_uuid;
        self.next_uuid += 1;
        self.primitives.insert(new_uuid, copy);
        self.geometry_dirty = true;
        Ok(new_uuid)
    }

    pub fn transform_primitive(&mut self, uuid: Uuid, transform: &Transform) -> Result<()> {
        self.primitive_mut(uuid)?.apply_transform(transform);
        self.geometry_dirty = true;
        Ok(())
    }

    pub fn translate_primitive(&mut self, uuid: Uuid, shift: Vec3) -> Result<()> {
        self.transform_primitive(uuid, &Transform::new_translation(&shift))
    }

    /// Rotates about a principal axis through the origin.
    pub fn rotate_primitive(&mut self, uuid: Uuid, angle: f32, axis: Axis) -> Result<()> {
        self.transform_primitive(uuid, &rotation_about(axis, angle))
    }

    /// Rotates about an arbitrary axis through the origin.
    pub fn rotate_primitive_about_axis(&mut self, uuid: Uuid, angle: f32, axis: Vec3) -> Result<()> {
        if axis.norm() == 0.0 {
            return Err(ContextError::invalid("rotation axis must be non-zero"));
        }
        self.transform_primitive(uuid, &rotation_about_axis(&axis, angle))
    }

    /// Scales relative to the origin.
    pub fn scale_primitive(&mut self, uuid: Uuid, scale: Vec3) -> Result<()> {
        if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(ContextError::invalid("scale factors must be finite and non-zero"));
        }
        self.transform_primitive(uuid, &Transform::new_nonuniform_scaling(&scale))
    }

    // ------------------------------------------------------------------
    // Primitive data
    // ------------------------------------------------------------------

    pub fn set_primitive_data<T: DataKind>(&mut self, uuid: Uuid, label: &str, value: T) -> Result<()> {
        self.primitive_mut(uuid)?.data.set(label, value);
        Ok(())
    }

    pub fn get_primitive_data<T: DataKind>(&self, uuid: Uuid, label: &str) -> Result<T> {
        self.primitive(uuid)?
            .data
            .get(label)
            .map_err(|e| lookup_error(e, label, T::TYPE, || ContextError::PrimitiveDataNotFound {
                uuid,
                label: label.to_string(),
            }))
    }

    pub fn does_primitive_data_exist(&self, uuid: Uuid, label: &str) -> Result<bool> {
        Ok(self.primitive(uuid)?.data.contains(label))
    }

    pub fn primitive_data_type(&self, uuid: Uuid, label: &str) -> Result<DataType> {
        self.primitive(uuid)?
            .data
            .data_type(label)
            .ok_or_else(|| ContextError::PrimitiveDataNotFound {
                uuid,
                label: label.to_string(),
            })
    }

    pub fn clear_primitive_data(&mut self, uuid: Uuid, label: &str) -> Result<()> {
        self.primitive_mut(uuid)?.data.remove(label);
        Ok(())
    }

    pub fn list_primitive_data(&self, uuid: Uuid) -> Result<Vec<String>> {
        Ok(self.primitive(uuid)?.data.labels())
    }

    /// Numeric value of a scalar label of any numeric type, if present.
    pub fn primitive_scalar(&self, uuid: Uuid, label: &str) -> Option<f32> {
        self.primitives
            .get(&uuid)
            .and_then(|p| p.data.value(label))
            .and_then(DataValue::as_scalar)
    }

    /// [`primitive_scalar`](Self::primitive_scalar) with a fallback value.
    pub fn primitive_float_or(&self, uuid: Uuid, label: &str, default: f32) -> f32 {
        self.primitive_scalar(uuid, label).unwrap_or(default)
    }

    // ------------------------------------------------------------------
    // Object data
    // ------------------------------------------------------------------

    fn object_mut(&mut self, object_id: ObjectId) -> Result<&mut CompoundObject> {
        self.objects
            .get_mut(&object_id)
            .ok_or(ContextError::ObjectNotFound(object_id))
    }

    pub fn set_object_data<T: DataKind>(
        &mut self,
        object_id: ObjectId,
        label: &str,
        value: T,
    ) -> Result<()> {
        self.object_mut(object_id)?.data.set(label, value);
        Ok(())
    }

    pub fn get_object_data<T: DataKind>(&self, object_id: ObjectId, label: &str) -> Result<T> {
        self.object(object_id)?
            .data
            .get(label)
            .map_err(|e| lookup_error(e, label, T::TYPE, || ContextError::ObjectDataNotFound {
                object_id,
                label: label.to_string(),
            }))
    }

    pub fn does_object_data_exist(&self, object_id: ObjectId, label: &str) -> Result<bool> {
        Ok(self.object(object_id)?.data.contains(label))
    }

    pub fn object_data_type(&self, object_id: ObjectId, label: &str) -> Result<DataType> {
        self.object(object_id)?
            .data
            .data_type(label)
            .ok_or_else(|| ContextError::ObjectDataNotFound {
                object_id,
                label: label.to_string(),
            })
    }

    pub fn clear_object_data(&mut self, object_id: ObjectId, label: &str) -> Result<()> {
        self.object_mut(object_id)?.data.remove(label);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Global data
    // ------------------------------------------------------------------

    pub fn set_global_data<T: DataKind>(&mut self, label: &str, value: T) {
        self.global_data.set(label, value);
    }

    pub fn get_global_data<T: DataKind>(&self, label: &str) -> Result<T> {
        self.global_data
            .get(label)
            .map_err(|e| lookup_error(e, label, T::TYPE, || ContextError::GlobalDataNotFound {
                label: label.to_string(),
            }))
    }

    pub fn does_global_data_exist(&self, label: &str) -> bool {
        self.global_data.contains(label)
    }

    pub fn global_data_type(&self, label: &str) -> Result<DataType> {
        self.global_data
            .data_type(label)
            .ok_or_else(|| ContextError::GlobalDataNotFound {
                label: label.to_string(),
            })
    }

    pub fn clear_global_data(&mut self, label: &str) {
        self.global_data.remove(label);
    }

    pub fn list_global_data(&self) -> Vec<String> {
        self.global_data.labels()
    }

    // ------------------------------------------------------------------
    // Compound objects
    // ------------------------------------------------------------------

    pub(crate) fn create_object(&mut self, object_type: ObjectType, uuids: Vec<Uuid>) -> ObjectId {
        let object_id = self.next_object_id;
        self.next_object_id += 1;
        for uuid in &uuids {
            if let Some(p) = self.primitives.get_mut(uuid) {
                p.parent_object = object_id;
            }
        }
        self.objects
            .insert(object_id, CompoundObject::new(object_type, uuids));
        object_id
    }

    /// Groups existing primitives into a polymesh object. Primitives are moved
    /// out of any object they previously belonged to.
    pub fn add_polymesh_object(&mut self, uuids: &[Uuid]) -> Result<ObjectId> {
        if uuids.is_empty() {
            return Err(ContextError::invalid("a polymesh needs at least one primitive"));
        }
        self.validate_uuids(uuids)?;
        for uuid in uuids {
            let parent = self.primitives[uuid].parent_object();
            if let Some(object) = self.objects.get_mut(&parent) {
                object.uuids.retain(|u| u != uuid);
                if object.uuids.is_empty() {
                    self.objects.remove(&parent);
                }
            }
        }
        Ok(self.create_object(ObjectType::Polymesh, uuids.to_vec()))
    }

    pub fn object(&self, object_id: ObjectId) -> Result<&CompoundObject> {
        self.objects
            .get(&object_id)
            .ok_or(ContextError::ObjectNotFound(object_id))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn all_object_ids(&self) -> Vec<ObjectId> {
        self.objects.keys().copied().collect()
    }

    pub fn object_type(&self, object_id: ObjectId) -> Result<ObjectType> {
        Ok(self.object(object_id)?.object_type())
    }

    pub fn object_primitive_uuids(&self, object_id: ObjectId) -> Result<Vec<Uuid>> {
        Ok(self.object(object_id)?.uuids.clone())
    }

    pub fn does_object_exist(&self, object_id: ObjectId) -> bool {
        self.objects.contains_key(&object_id)
    }

    /// Sum of the member primitive areas.
    pub fn object_area(&self, object_id: ObjectId) -> Result<f32> {
        let object = self.object(object_id)?;
        Ok(object
            .uuids
            .iter()
            .filter_map(|u| self.primitives.get(u))
            .map(Primitive::area)
            .sum())
    }

    /// Removes an object together with its member primitives.
    pub fn delete_object(&mut self, object_id: ObjectId) -> Result<()> {
        let object = self
            .objects
            .remove(&object_id)
            .ok_or(ContextError::ObjectNotFound(object_id))?;
        for uuid in object.uuids {
            self.primitives.remove(&uuid);
        }
        self.geometry_dirty = true;
        Ok(())
    }

    pub fn transform_object(&mut self, object_id: ObjectId, transform: &Transform) -> Result<()> {
        let uuids = self.object(object_id)?.uuids.clone();
        for uuid in uuids {
            self.transform_primitive(uuid, transform)?;
        }
        Ok(())
    }

    pub fn translate_object(&mut self, object_id: ObjectId, shift: Vec3) -> Result<()> {
        self.transform_object(object_id, &Transform::new_translation(&shift))
    }

    /// Rotates about an arbitrary axis through the origin.
    pub fn rotate_object(&mut self, object_id: ObjectId, angle: f32, axis: Vec3) -> Result<()> {
        if axis.norm() == 0.0 {
            return Err(ContextError::invalid("rotation axis must be non-zero"));
        }
        self.transform_object(object_id, &rotation_about_axis(&axis, angle))
    }

    /// Duplicates an object, its primitives and all attached data.
    pub fn copy_object(&mut self, object_id: ObjectId) -> Result<ObjectId> {
        let source = self.object(object_id)?.clone();
        let mut uuids = Vec::with_capacity(source.uuids.len());
        for uuid in &source.uuids {
            uuids.push(self.copy_primitive(*uuid)?);
        }
        let new_id = self.create_object(source.object_type, uuids);
        if let Some(object) = self.objects.get_mut(&new_id) {
            object.data = source.data;
        }
        Ok(new_id)
    }

    // ------------------------------------------------------------------
    // Date, time and location
    // ------------------------------------------------------------------

    pub fn set_date(&mut self, date: Date) {
        self.date = date;
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn set_time(&mut self, time: Time) {
        self.time = time;
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn julian_day(&self) -> u32 {
        self.date.julian_day()
    }

    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    pub fn location(&self) -> Location {
        self.location
    }

    // ------------------------------------------------------------------
    // Timeseries
    // ------------------------------------------------------------------

    pub fn add_timeseries_data(&mut self, label: &str, value: f32, date: Date, time: Time) {
        self.timeseries
            .entry(label.to_string())
            .or_default()
            .insert(date, time, value);
    }

    fn timeseries(&self, label: &str) -> Result<&Timeseries> {
        self.timeseries
            .get(label)
            .ok_or_else(|| ContextError::TimeseriesNotFound(label.to_string()))
    }

    pub fn query_timeseries_data(&self, label: &str, date: &Date, time: &Time) -> Result<f32> {
        self.timeseries(label)?
            .query(date, time)
            .ok_or_else(|| ContextError::TimeseriesNotFound(label.to_string()))
    }

    /// Value of a timeseries at the context's current date and time.
    pub fn query_timeseries_data_current(&self, label: &str) -> Result<f32> {
        self.query_timeseries_data(label, &self.date, &self.time)
    }

    pub fn timeseries_length(&self, label: &str) -> Result<usize> {
        Ok(self.timeseries(label)?.len())
    }

    pub fn does_timeseries_variable_exist(&self, label: &str) -> bool {
        self.timeseries.contains_key(label)
    }

    pub fn timeseries_labels(&self) -> Vec<String> {
        self.timeseries.keys().cloned().collect()
    }

    /// Moves the context clock to the `index`-th recorded point of a variable.
    pub fn set_current_timeseries_point(&mut self, label: &str, index: usize) -> Result<()> {
        let series = self.timeseries(label)?;
        let (date, time, _) = series.point(index).ok_or_else(|| {
            ContextError::invalid(format!(
                "index {index} is beyond the {} points of timeseries '{label}'",
                series.len()
            ))
        })?;
        self.date = date;
        self.time = time;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Random numbers
    // ------------------------------------------------------------------

    pub fn seed_random_generator(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Uniform sample in `[0, 1)`.
    pub fn randu(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// Uniform sample in `[min, max)`; returns `min` for an empty range.
    pub fn randu_range(&mut self, min: f32, max: f32) -> f32 {
        if max > min {
            self.rng.random_range(min..max)
        } else {
            min
        }
    }

    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

fn lookup_error(
    error: DataLookupError,
    label: &str,
    requested: DataType,
    missing: impl FnOnce() -> ContextError,
) -> ContextError {
    match error {
        DataLookupError::Missing => missing(),
        DataLookupError::TypeMismatch { actual } => ContextError::DataTypeMismatch {
            label: label.to_string(),
            requested,
            actual,
        },
    }
}
