use serde::Deserialize;
use std::collections::BTreeMap;

/// Growth and shape parameters of one plant type.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlantModel {
    /// Days between successive phytomers on a shoot.
    pub phyllochron: f32,
    /// Phytomer limit of the main shoot.
    pub max_nodes: u32,
    /// Phytomer limit of lateral shoots.
    pub lateral_max_nodes: u32,
    /// Highest branching order; 0 disables lateral shoots.
    pub max_shoot_rank: u32,
    /// Days for an organ to reach full size.
    pub maturity_days: f32,
    pub internode_length: f32,
    pub internode_radius: f32,
    pub leaf_length: f32,
    pub leaf_width: f32,
    /// Leaf inclination above the horizontal, degrees.
    pub leaf_pitch: f32,
    /// Azimuthal rotation between successive phytomers, degrees.
    pub phyllotaxy: f32,
    /// Probability that the axillary bud of a new phytomer grows into a shoot.
    pub branch_probability: f32,
    /// Angle between a lateral shoot and its parent axis, degrees.
    pub branch_angle: f32,
    pub tube_divisions: u32,
    pub leaf_subdivisions: [u32; 2],
    pub internode_color: [f32; 3],
    pub leaf_color: [f32; 3],
}

impl Default for PlantModel {
    fn default() -> Self {
        Self {
            phyllochron: 2.0,
            max_nodes: 10,
            lateral_max_nodes: 4,
            max_shoot_rank: 1,
            maturity_days: 6.0,
            internode_length: 0.04,
            internode_radius: 0.003,
            leaf_length: 0.08,
            leaf_width: 0.05,
            leaf_pitch: 30.0,
            phyllotaxy: 137.5,
            branch_probability: 0.2,
            branch_angle: 45.0,
            tube_divisions: 5,
            leaf_subdivisions: [1, 1],
            internode_color: [0.38, 0.48, 0.1],
            leaf_color: [0.2, 0.55, 0.12],
        }
    }
}

impl PlantModel {
    /// Checks the parameters that would make growth or geometry ill-defined.
    pub fn validate(&self) -> Result<(), String> {
        let positive = [
            ("phyllochron", self.phyllochron),
            ("maturity_days", self.maturity_days),
            ("internode_length", self.internode_length),
            ("internode_radius", self.internode_radius),
            ("leaf_length", self.leaf_length),
            ("leaf_width", self.leaf_width),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(*v > 0.0)) {
            return Err(format!("{name} must be positive, got {value}"));
        }
        if self.max_nodes == 0 {
            return Err("max_nodes must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.branch_probability) {
            return Err(format!(
                "branch_probability must be in [0, 1], got {}",
                self.branch_probability
            ));
        }
        if self.tube_divisions < 3 {
            return Err("tube_divisions must be at least 3".to_string());
        }
        if self.leaf_subdivisions.contains(&0) {
            return Err("leaf_subdivisions must be positive".to_string());
        }
        Ok(())
    }
}

pub type PlantLibrary = BTreeMap<String, PlantModel>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_fall_back_to_defaults() {
        let library: PlantLibrary = toml::from_str("[fern]\nmax_nodes = 3\n").unwrap();
        let fern = &library["fern"];
        assert_eq!(fern.max_nodes, 3);
        assert_eq!(fern.tube_divisions, PlantModel::default().tube_divisions);
        assert!(fern.validate().is_ok());
    }

    #[test]
    fn invalid_parameters_are_reported() {
        let model = PlantModel {
            phyllochron: 0.0,
            ..PlantModel::default()
        };
        assert!(model.validate().unwrap_err().contains("phyllochron"));
        let model = PlantModel {
            branch_probability: 1.5,
            ..PlantModel::default()
        };
        assert!(model.validate().is_err());
    }
}
