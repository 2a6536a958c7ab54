use super::model::PlantModel;
use crate::core::context::{Context, ObjectId, Result as ContextResult, Uuid};
use crate::core::geometry::{
    RgbColor, RgbaColor, SphericalCoord, Vec2, Vec3, orientation_from_spherical, transform_point,
};
use slotmap::{SlotMap, new_key_type};
use std::f32::consts::FRAC_PI_2;

new_key_type! {
    pub struct ShootId;
}

/// Smallest organ size, as a fraction of the mature size, given to a new phytomer.
const MIN_ORGAN_SCALE: f32 = 0.05;

#[derive(Debug, Clone)]
struct Phytomer {
    age: f32,
}

#[derive(Debug, Clone)]
struct Shoot {
    /// Parent shoot and the index of the phytomer carrying this shoot's bud.
    parent: Option<(ShootId, usize)>,
    rank: u32,
    elevation: f32,
    azimuth: f32,
    max_nodes: u32,
    clock: f32,
    phytomers: Vec<Phytomer>,
    children: Vec<ShootId>,
}

impl Shoot {
    fn new(parent: Option<(ShootId, usize)>, rank: u32, elevation: f32, azimuth: f32, max_nodes: u32) -> Self {
        Self {
            parent,
            rank,
            elevation,
            azimuth,
            max_nodes,
            clock: 0.0,
            phytomers: Vec::new(),
            children: Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.phytomers.len() as u32 >= self.max_nodes
    }
}

struct Bud {
    parent: ShootId,
    node: usize,
    rank: u32,
    elevation: f32,
    azimuth: f32,
}

/// One plant: a tree of shoots plus the context objects last generated from it.
#[derive(Debug, Clone)]
pub struct PlantInstance {
    model_name: String,
    model: PlantModel,
    base: Vec3,
    age: f32,
    shoots: SlotMap<ShootId, Shoot>,
    root: ShootId,
    internode_objects: Vec<ObjectId>,
    leaf_objects: Vec<ObjectId>,
    height: f32,
}

impl PlantInstance {
    pub(crate) fn new(model_name: &str, model: PlantModel, base: Vec3) -> Self {
        let mut shoots = SlotMap::with_key();
        let root = shoots.insert(Shoot::new(None, 0, FRAC_PI_2, 0.0, model.max_nodes));
        Self {
            model_name: model_name.to_string(),
            model,
            base,
            age: 0.0,
            shoots,
            root,
            internode_objects: Vec::new(),
            leaf_objects: Vec::new(),
            height: 0.0,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Age in days.
    pub fn age(&self) -> f32 {
        self.age
    }

    /// Height of the highest node above the plant base at the last geometry update.
    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn shoot_count(&self) -> usize {
        self.shoots.len()
    }

    pub fn phytomer_count(&self) -> usize {
        self.shoots.values().map(|s| s.phytomers.len()).sum()
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.internode_objects
            .iter()
            .chain(&self.leaf_objects)
            .copied()
            .collect()
    }

    pub(crate) fn internode_objects(&self) -> &[ObjectId] {
        &self.internode_objects
    }

    pub(crate) fn leaf_objects(&self) -> &[ObjectId] {
        &self.leaf_objects
    }

    /// Advances development by `dt` days. `draw` supplies uniform numbers in `[0, 1)`
    /// deciding whether axillary buds break.
    /// Once every shoot has reached its node limit the rest of `dt` only ages
    /// the plant, so the step count stays bounded for any finite `dt`.
    pub(crate) fn grow(&mut self, dt: f32, draw: &mut impl FnMut() -> f32) {
        let max_step = f64::from(0.5 * self.model.phyllochron);
        let total = f64::from(dt);
        let steps = (total / max_step).ceil() as u64;
        let mut elapsed = 0.0;
        for _ in 0..steps {
            let step = (total - elapsed).min(max_step);
            if step <= 0.0 || self.is_complete() {
                break;
            }
            self.grow_step(step as f32, draw);
            elapsed += step;
        }
        let rest = (total - elapsed) as f32;
        if rest > 0.0 {
            self.grow_step(rest, draw);
        }
    }

    fn is_complete(&self) -> bool {
        self.shoots.values().all(Shoot::is_complete)
    }

    fn grow_step(&mut self, dt: f32, draw: &mut impl FnMut() -> f32) {
        let model = &self.model;
        self.age += dt;
        let mut buds = Vec::new();
        for (key, shoot) in self.shoots.iter_mut() {
            for phytomer in &mut shoot.phytomers {
                phytomer.age += dt;
            }
            if shoot.is_complete() {
                continue;
            }
            shoot.clock += dt;
            while shoot.clock >= model.phyllochron && !shoot.is_complete() {
                shoot.clock -= model.phyllochron;
                shoot.phytomers.push(Phytomer { age: shoot.clock });
                let node = shoot.phytomers.len() - 1;
                let can_branch = shoot.rank < model.max_shoot_rank && model.lateral_max_nodes > 0;
                if can_branch && draw() < model.branch_probability {
                    buds.push(Bud {
                        parent: key,
                        node,
                        rank: shoot.rank + 1,
                        elevation: shoot.elevation - model.branch_angle.to_radians(),
                        azimuth: leaf_azimuth(shoot, node, model),
                    });
                }
            }
        }
        let lateral_nodes = self.model.lateral_max_nodes;
        for bud in buds {
            let child = self.shoots.insert(Shoot::new(
                Some((bud.parent, bud.node)),
                bud.rank,
                bud.elevation,
                bud.azimuth,
                lateral_nodes,
            ));
            if let Some(parent) = self.shoots.get_mut(bud.parent) {
                parent.children.push(child);
            }
        }
    }

    fn organ_scale(&self, phytomer: &Phytomer) -> f32 {
        (phytomer.age / self.model.maturity_days).clamp(MIN_ORGAN_SCALE, 1.0)
    }

    pub(crate) fn delete_geometry(&mut self, context: &mut Context) -> ContextResult<()> {
        for id in self.internode_objects.drain(..).chain(self.leaf_objects.drain(..)) {
            if context.does_object_exist(id) {
                context.delete_object(id)?;
            }
        }
        Ok(())
    }

    /// Replaces the plant's context objects with geometry for its current state.
    pub(crate) fn update_geometry(&mut self, context: &mut Context, plant_id: u32) -> ContextResult<()> {
        self.delete_geometry(context)?;
        let internode_color: RgbaColor = RgbColor::from_array(self.model.internode_color).into();
        let leaf_color: RgbaColor = RgbColor::from_array(self.model.leaf_color).into();
        let subdivisions = (self.model.leaf_subdivisions[0], self.model.leaf_subdivisions[1]);
        let mut internodes = Vec::new();
        let mut leaves = Vec::new();
        let mut height = 0.0f32;

        let mut stack = vec![(self.root, self.base)];
        while let Some((key, start)) = stack.pop() {
            let Some(shoot) = self.shoots.get(key) else {
                continue;
            };
            let axis = SphericalCoord::new(1.0, shoot.elevation, shoot.azimuth).to_cartesian();
            let mut nodes = vec![start];
            for (i, phytomer) in shoot.phytomers.iter().enumerate() {
                let scale = self.organ_scale(phytomer);
                let bottom = nodes[i];
                let top = bottom + axis * (self.model.internode_length * scale);
                let radius = self.model.internode_radius * scale;
                internodes.push(context.add_tube_object(
                    self.model.tube_divisions,
                    &[bottom, top],
                    &[radius, radius],
                    &[internode_color],
                )?);

                let rotation = SphericalCoord::new(
                    1.0,
                    -self.model.leaf_pitch.to_radians(),
                    leaf_azimuth(shoot, i, &self.model),
                );
                let leaf_axis = transform_point(&orientation_from_spherical(&rotation), &Vec3::y());
                let size = Vec2::new(self.model.leaf_width * scale, self.model.leaf_length * scale);
                leaves.push(context.add_tile_object(
                    top + leaf_axis * (0.5 * size.y),
                    size,
                    rotation,
                    subdivisions,
                    leaf_color,
                )?);
                height = height.max(top.z - self.base.z);
                nodes.push(top);
            }
            for child in &shoot.children {
                if let Some((_, node)) = self.shoots.get(*child).and_then(|c| c.parent) {
                    stack.push((*child, nodes[(node + 1).min(nodes.len() - 1)]));
                }
            }
        }

        for id in internodes.iter().chain(&leaves) {
            context.set_object_data(*id, "plantID", plant_id)?;
        }
        self.internode_objects = internodes;
        self.leaf_objects = leaves;
        self.height = height;
        Ok(())
    }

    pub(crate) fn uuids_of(context: &Context, objects: &[ObjectId]) -> ContextResult<Vec<Uuid>> {
        let mut uuids = Vec::new();
        for id in objects {
            uuids.extend(context.object_primitive_uuids(*id)?);
        }
        Ok(uuids)
    }
}

fn leaf_azimuth(shoot: &Shoot, node: usize, model: &PlantModel) -> f32 {
    shoot.azimuth + (node as f32 * model.phyllotaxy).to_radians()
}
