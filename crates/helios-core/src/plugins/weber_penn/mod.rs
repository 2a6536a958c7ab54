//! # Weber-Penn Trees
//!
//! Recursive stem model after Weber & Penn (1995). The trunk and each level of
//! branches are curved, tapered stems built as tube objects; the stems of the
//! deepest level carry leaves built as tiles. Per-tree shape parameters come from
//! an embedded TOML library (almond, apple, avocado, lemon, olive, orange, peach,
//! pistachio, walnut) that [`WeberPennTree::load_tree_library`] can extend.
//!
//! Random variation (`*_v` parameters, bend planes, leaf angles) is drawn from the
//! context's RNG, so a seeded context reproduces the same tree.

mod params;

pub use params::{StemLevel, TreeLibrary, WeberPennParameters};

use crate::core::context::{Context, ContextError, ObjectId, Uuid};
use crate::core::geometry::{
    RgbColor, RgbaColor, SphericalCoord, Vec2, Vec3, orientation_from_spherical, orthonormal_basis,
    rotation_about_axis, transform_point,
};
use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument};

const EMBEDDED_LIBRARY: &str = include_str!("trees.toml");

/// Tip radius never shrinks below this fraction of the base radius.
const MIN_TIP_RADIUS: f32 = 0.01;
const MIN_RELATIVE_LENGTH: f32 = 0.05;

#[derive(Debug, Error)]
pub enum WeberPennError {
    #[error("Tree '{0}' does not exist in the library")]
    UnknownTree(String),
    #[error("Tree ID {0} does not exist")]
    TreeNotFound(u32),
    #[error("Invalid Weber-Penn parameter: {0}")]
    InvalidParameter(String),
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Embedded tree library is malformed: {0}")]
    Library(#[from] toml::de::Error),
    #[error(transparent)]
    Context(#[from] ContextError),
}

pub type Result<T> = std::result::Result<T, WeberPennError>;

#[derive(Debug, Clone, Default)]
struct TreeObjects {
    trunk: Vec<ObjectId>,
    branches: Vec<ObjectId>,
    leaves: Vec<ObjectId>,
}

#[derive(Debug, Clone, Copy)]
struct Resolution {
    trunk: u32,
    branch: u32,
    leaf: (u32, u32),
}

fn rotate(v: &Vec3, axis: &Vec3, angle: f32) -> Vec3 {
    transform_point(&rotation_about_axis(axis, angle), v)
}

fn validate_library(library: &TreeLibrary) -> Result<()> {
    for (name, params) in library {
        params
            .validate()
            .map_err(|message| WeberPennError::InvalidParameter(format!("{name}: {message}")))?;
    }
    Ok(())
}

/// Position, axis and radius at fraction `t` of a stem polyline.
fn sample_stem(nodes: &[Vec3], radii: &[f32], t: f32) -> (Vec3, Vec3, f32) {
    let segments = nodes.len() - 1;
    let x = t.clamp(0.0, 1.0) * segments as f32;
    let k = (x.floor() as usize).min(segments - 1);
    let f = x - k as f32;
    let position = nodes[k].lerp(&nodes[k + 1], f);
    let axis = (nodes[k + 1] - nodes[k]).try_normalize(1e-12).unwrap_or_else(Vec3::z);
    let radius = radii[k] + (radii[k + 1] - radii[k]) * f;
    (position, axis, radius)
}

struct TreeBuilder<'a> {
    context: &'a mut Context,
    params: &'a WeberPennParameters,
    resolution: Resolution,
    max_level: usize,
    wood_color: RgbaColor,
    leaf_color: RgbaColor,
    scale: f32,
    objects: TreeObjects,
}

impl TreeBuilder<'_> {
    fn vary(&mut self, value: f32, variation: f32) -> f32 {
        value + self.context.randu_range(-variation, variation)
    }

    fn build_stem(&mut self, level: usize, base: Vec3, direction: Vec3, length: f32, radius: f32) -> Result<()> {
        let params = self.params;
        let stem = &params.levels[level];
        let segments = stem.segments;
        let (u, v) = orthonormal_basis(&direction);
        let phi = self.context.randu_range(0.0, TAU);
        let bend_axis = u * phi.cos() + v * phi.sin();
        let bend = self.vary(stem.curve, stem.curve_v).to_radians() / segments as f32;
        let segment_length = length / segments as f32;
        let tip_radius = (radius * (1.0 - stem.taper)).max(radius * MIN_TIP_RADIUS);

        let mut axis = direction.normalize();
        let mut nodes = vec![base];
        let mut radii = vec![radius];
        for k in 1..=segments {
            axis = rotate(&axis, &bend_axis, bend);
            nodes.push(nodes[k as usize - 1] + axis * segment_length);
            let t = k as f32 / segments as f32;
            radii.push(radius + (tip_radius - radius) * t);
        }

        let divisions = if level == 0 {
            self.resolution.trunk
        } else {
            self.resolution.branch
        };
        let object = self
            .context
            .add_tube_object(divisions, &nodes, &radii, &[self.wood_color])?;
        if level == 0 {
            self.objects.trunk.push(object);
        } else {
            self.objects.branches.push(object);
        }

        if level < self.max_level {
            self.build_children(level, &nodes, &radii, length, radius)
        } else {
            self.build_leaves(&nodes, &radii)
        }
    }

    fn build_children(&mut self, level: usize, nodes: &[Vec3], radii: &[f32], length: f32, radius: f32) -> Result<()> {
        let params = self.params;
        let child = &params.levels[level + 1];
        let (count, rotate_step) = (child.branches, child.rotate.to_radians());
        let start = if level == 0 { params.base_size } else { 0.0 };
        let mut azimuth = self.context.randu_range(0.0, TAU);
        for i in 0..count {
            let t = start + (1.0 - start) * (i as f32 + 0.5) / count as f32;
            let (position, axis, local_radius) = sample_stem(nodes, radii, t);
            let relative = self.vary(child.length, child.length_v).max(MIN_RELATIVE_LENGTH) * (1.0 - 0.5 * t);
            let child_length = length * relative;
            let child_radius = (radius * relative.powf(params.ratio_power)).min(0.9 * local_radius);

            azimuth += rotate_step;
            let (u, _) = orthonormal_basis(&axis);
            let outward = rotate(&u, &axis, azimuth);
            let down = self.vary(child.down_angle, child.down_angle_v).to_radians();
            let direction = rotate(&axis, &axis.cross(&outward), down);
            self.build_stem(level + 1, position, direction, child_length, child_radius)?;
        }
        Ok(())
    }

    fn build_leaves(&mut self, nodes: &[Vec3], radii: &[f32]) -> Result<()> {
        let count = self.params.leaves;
        let size = Vec2::new(self.params.leaf_width, self.params.leaf_length) * self.scale;
        for i in 0..count {
            let t = (i as f32 + 0.5) / count as f32;
            let (position, _, _) = sample_stem(nodes, radii, t);
            let pitch = self.context.randu_range(10.0, 60.0).to_radians();
            let rotation = SphericalCoord::new(1.0, -pitch, self.context.randu_range(0.0, TAU));
            let leaf_axis = transform_point(&orientation_from_spherical(&rotation), &Vec3::y());
            let object = self.context.add_tile_object(
                position + leaf_axis * (0.5 * size.y),
                size,
                rotation,
                self.resolution.leaf,
                self.leaf_color,
            )?;
            self.objects.leaves.push(object);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct WeberPennTree {
    library: TreeLibrary,
    trees: BTreeMap<u32, TreeObjects>,
    next_tree_id: u32,
    branch_recursion_level: u32,
    resolution: Resolution,
}

impl WeberPennTree {
    pub fn new() -> Result<Self> {
        let library: TreeLibrary = toml::from_str(EMBEDDED_LIBRARY)?;
        validate_library(&library)?;
        Ok(Self {
            library,
            trees: BTreeMap::new(),
            next_tree_id: 0,
            branch_recursion_level: 5,
            resolution: Resolution {
                trunk: 20,
                branch: 5,
                leaf: (1, 1),
            },
        })
    }

    pub fn available_tree_names(&self) -> Vec<String> {
        self.library.keys().cloned().collect()
    }

    pub fn tree_parameters(&self, name: &str) -> Result<&WeberPennParameters> {
        self.library
            .get(name)
            .ok_or_else(|| WeberPennError::UnknownTree(name.to_string()))
    }

    /// Adds the trees of a TOML file to the library, replacing trees of the same
    /// name, and returns the names read from the file.
    #[instrument(skip_all, name = "weber_penn_library_load")]
    pub fn load_tree_library(&mut self, path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| WeberPennError::Io {
            path: path_str.clone(),
            source: e,
        })?;
        let trees: TreeLibrary = toml::from_str(&content).map_err(|e| WeberPennError::Toml {
            path: path_str.clone(),
            source: e,
        })?;
        validate_library(&trees)?;
        let names: Vec<String> = trees.keys().cloned().collect();
        self.library.extend(trees);
        info!(path = %path_str, trees = names.len(), "Loaded Weber-Penn tree library.");
        Ok(names)
    }

    /// Levels deeper than the tree's parameters describe are ignored.
    pub fn set_branch_recursion_level(&mut self, level: u32) {
        self.branch_recursion_level = level;
    }

    pub fn set_trunk_segment_resolution(&mut self, divisions: u32) -> Result<()> {
        self.resolution.trunk = check_divisions(divisions)?;
        Ok(())
    }

    pub fn set_branch_segment_resolution(&mut self, divisions: u32) -> Result<()> {
        self.resolution.branch = check_divisions(divisions)?;
        Ok(())
    }

    pub fn set_leaf_subdivisions(&mut self, subdivisions: (u32, u32)) -> Result<()> {
        if subdivisions.0 == 0 || subdivisions.1 == 0 {
            return Err(WeberPennError::InvalidParameter(
                "leaf subdivisions must be positive".to_string(),
            ));
        }
        self.resolution.leaf = subdivisions;
        Ok(())
    }

    /// Builds a tree of the named type with its trunk base at `origin`, uniformly
    /// scaled by `scale`, and returns its tree ID.
    #[instrument(skip_all, name = "weber_penn_build", fields(tree = name))]
    pub fn build_tree(&mut self, context: &mut Context, name: &str, origin: Vec3, scale: f32) -> Result<u32> {
        if !(scale > 0.0) {
            return Err(WeberPennError::InvalidParameter(format!(
                "tree scale {scale} must be positive"
            )));
        }
        let params = self
            .library
            .get(name)
            .ok_or_else(|| WeberPennError::UnknownTree(name.to_string()))?;
        let max_level = params.max_level().min(self.branch_recursion_level as usize);
        let mut builder = TreeBuilder {
            context: &mut *context,
            params,
            resolution: self.resolution,
            max_level,
            wood_color: RgbColor::from_array(params.wood_color).into(),
            leaf_color: RgbColor::from_array(params.leaf_color).into(),
            scale,
            objects: TreeObjects::default(),
        };
        let trunk_length = builder.vary(params.scale, params.scale_v * params.scale).max(0.1 * params.scale) * scale;
        builder.build_stem(0, origin, Vec3::z(), trunk_length, params.ratio * trunk_length)?;
        let objects = builder.objects;

        let id = self.next_tree_id;
        for object in objects.trunk.iter().chain(&objects.branches).chain(&objects.leaves) {
            context.set_object_data(*object, "treeID", id)?;
        }
        debug!(
            tree_id = id,
            branches = objects.branches.len(),
            leaves = objects.leaves.len(),
            "Built Weber-Penn tree."
        );
        self.next_tree_id += 1;
        self.trees.insert(id, objects);
        Ok(id)
    }

    fn tree(&self, id: u32) -> Result<&TreeObjects> {
        self.trees.get(&id).ok_or(WeberPennError::TreeNotFound(id))
    }

    fn uuids(context: &Context, objects: &[ObjectId]) -> Result<Vec<Uuid>> {
        let mut uuids = Vec::new();
        for object in objects {
            uuids.extend(context.object_primitive_uuids(*object)?);
        }
        Ok(uuids)
    }

    pub fn trunk_uuids(&self, context: &Context, id: u32) -> Result<Vec<Uuid>> {
        Self::uuids(context, &self.tree(id)?.trunk)
    }

    pub fn branch_uuids(&self, context: &Context, id: u32) -> Result<Vec<Uuid>> {
        Self::uuids(context, &self.tree(id)?.branches)
    }

    pub fn leaf_uuids(&self, context: &Context, id: u32) -> Result<Vec<Uuid>> {
        Self::uuids(context, &self.tree(id)?.leaves)
    }

    pub fn all_uuids(&self, context: &Context, id: u32) -> Result<Vec<Uuid>> {
        let tree = self.tree(id)?;
        let mut uuids = Self::uuids(context, &tree.trunk)?;
        uuids.extend(Self::uuids(context, &tree.branches)?);
        uuids.extend(Self::uuids(context, &tree.leaves)?);
        Ok(uuids)
    }
}

fn check_divisions(divisions: u32) -> Result<u32> {
    if divisions < 3 {
        return Err(WeberPennError::InvalidParameter(format!(
            "segment resolution must be at least 3, got {divisions}"
        )));
    }
    Ok(divisions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn build(wpt: &mut WeberPennTree, name: &str) -> (Context, u32) {
        let mut ctx = Context::new();
        let id = wpt.build_tree(&mut ctx, name, Vec3::zeros(), 1.0).unwrap();
        (ctx, id)
    }

    #[test]
    fn library_contains_the_orchard_trees() {
        let wpt = WeberPennTree::new().unwrap();
        assert_eq!(
            wpt.available_tree_names(),
            ["almond", "apple", "avocado", "lemon", "olive", "orange", "peach", "pistachio", "walnut"]
        );
    }

    #[test]
    fn tree_has_trunk_branch_and_leaf_primitives() {
        let mut wpt = WeberPennTree::new().unwrap();
        let (ctx, id) = build(&mut wpt, "almond");
        let trunk = wpt.trunk_uuids(&ctx, id).unwrap();
        let branches = wpt.branch_uuids(&ctx, id).unwrap();
        let leaves = wpt.leaf_uuids(&ctx, id).unwrap();

        // One tube of 6 segments at 20 divisions, 8 first-order branches with 5
        // second-order branches each, 8 leaves per second-order branch.
        assert_eq!(trunk.len(), 2 * 20 * 6);
        assert_eq!(branches.len(), 8 * (2 * 5 * 4) + 40 * (2 * 5 * 2));
        assert_eq!(leaves.len(), 40 * 8);
        assert_eq!(wpt.all_uuids(&ctx, id).unwrap().len(), ctx.primitive_count());

        let top = trunk
            .iter()
            .flat_map(|u| ctx.primitive_vertices(*u).unwrap())
            .fold(f32::MIN, |z, v| z.max(v.z));
        assert!(top > 2.0, "trunk top {top}");
    }

    #[test]
    fn recursion_level_limits_branching() {
        let mut wpt = WeberPennTree::new().unwrap();
        wpt.set_branch_recursion_level(0);
        let (ctx, id) = build(&mut wpt, "olive");
        assert!(wpt.branch_uuids(&ctx, id).unwrap().is_empty());
        assert_eq!(wpt.leaf_uuids(&ctx, id).unwrap().len(), 10);

        wpt.set_branch_recursion_level(1);
        wpt.set_leaf_subdivisions((2, 2)).unwrap();
        wpt.set_trunk_segment_resolution(8).unwrap();
        let mut ctx = Context::new();
        let id = wpt.build_tree(&mut ctx, "olive", Vec3::zeros(), 0.5).unwrap();
        assert_eq!(id, 1);
        assert_eq!(wpt.trunk_uuids(&ctx, id).unwrap().len(), 2 * 8 * 6);
        assert_eq!(wpt.leaf_uuids(&ctx, id).unwrap().len(), 6 * 10 * 4);
    }

    #[test]
    fn seeded_contexts_build_identical_trees() {
        let mut wpt = WeberPennTree::new().unwrap();
        let vertices = |wpt: &mut WeberPennTree| {
            let mut ctx = Context::new();
            ctx.seed_random_generator(3);
            let id = wpt.build_tree(&mut ctx, "lemon", Vec3::zeros(), 1.0).unwrap();
            let last = *wpt.leaf_uuids(&ctx, id).unwrap().last().unwrap();
            ctx.primitive_vertices(last).unwrap()
        };
        assert_eq!(vertices(&mut wpt), vertices(&mut wpt));
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let mut wpt = WeberPennTree::new().unwrap();
        let mut ctx = Context::new();
        assert!(matches!(
            wpt.build_tree(&mut ctx, "baobab", Vec3::zeros(), 1.0),
            Err(WeberPennError::UnknownTree(_))
        ));
        assert!(wpt.build_tree(&mut ctx, "apple", Vec3::zeros(), 0.0).is_err());
        assert!(wpt.set_branch_segment_resolution(2).is_err());
        assert!(wpt.set_leaf_subdivisions((0, 1)).is_err());
        assert!(matches!(wpt.trunk_uuids(&ctx, 0), Err(WeberPennError::TreeNotFound(0))));
        assert_eq!(ctx.primitive_count(), 0);
    }

    #[test]
    fn library_can_be_extended_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trees.toml");
        std::fs::write(&path, "[shrub]\nscale = 1.0\nleaves = 4\nlevels = [ { segments = 2 } ]\n").unwrap();
        let mut wpt = WeberPennTree::new().unwrap();
        assert_eq!(wpt.load_tree_library(&path).unwrap(), vec!["shrub".to_string()]);
        let (ctx, id) = build(&mut wpt, "shrub");
        assert_eq!(wpt.leaf_uuids(&ctx, id).unwrap().len(), 4);

        assert!(matches!(
            wpt.load_tree_library(dir.path().join("none.toml")),
            Err(WeberPennError::Io { .. })
        ));
    }
}
