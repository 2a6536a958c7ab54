use serde::Deserialize;
use std::collections::BTreeMap;

/// Shape parameters of one recursion level of stems.
///
/// Level 0 is the trunk; for deeper levels `branches` is the number of child stems
/// each parent stem carries and `length` is their length relative to the parent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StemLevel {
    pub length: f32,
    pub length_v: f32,
    /// Fractional reduction of radius from base to tip, in `[0, 1]`.
    pub taper: f32,
    /// Total bend along the stem, degrees.
    pub curve: f32,
    pub curve_v: f32,
    pub segments: u32,
    /// Angle between a child stem and its parent, degrees.
    pub down_angle: f32,
    pub down_angle_v: f32,
    /// Azimuthal rotation between successive child stems, degrees.
    pub rotate: f32,
    pub branches: u32,
}

impl Default for StemLevel {
    fn default() -> Self {
        Self {
            length: 1.0,
            length_v: 0.0,
            taper: 0.8,
            curve: 0.0,
            curve_v: 0.0,
            segments: 3,
            down_angle: 45.0,
            down_angle_v: 0.0,
            rotate: 137.5,
            branches: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeberPennParameters {
    /// Trunk length, metres.
    pub scale: f32,
    pub scale_v: f32,
    /// Fraction of the trunk below the first branch.
    pub base_size: f32,
    /// Trunk base radius over trunk length.
    pub ratio: f32,
    /// Exponent relating child radius to relative child length.
    pub ratio_power: f32,
    /// Leaves on each stem of the deepest level.
    pub leaves: u32,
    pub leaf_length: f32,
    pub leaf_width: f32,
    pub wood_color: [f32; 3],
    pub leaf_color: [f32; 3],
    pub levels: Vec<StemLevel>,
}

impl Default for WeberPennParameters {
    fn default() -> Self {
        Self {
            scale: 3.0,
            scale_v: 0.0,
            base_size: 0.3,
            ratio: 0.03,
            ratio_power: 1.3,
            leaves: 6,
            leaf_length: 0.08,
            leaf_width: 0.04,
            wood_color: [0.4, 0.3, 0.2],
            leaf_color: [0.2, 0.5, 0.15],
            levels: vec![StemLevel::default()],
        }
    }
}

impl WeberPennParameters {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.scale > 0.0) || !(self.ratio > 0.0) {
            return Err("scale and ratio must be positive".to_string());
        }
        if !(self.leaf_length > 0.0 && self.leaf_width > 0.0) {
            return Err("leaf dimensions must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.base_size) {
            return Err(format!("base_size must be in [0, 1), got {}", self.base_size));
        }
        if self.levels.is_empty() {
            return Err("at least the trunk level is required".to_string());
        }
        for (i, level) in self.levels.iter().enumerate() {
            if level.segments == 0 {
                return Err(format!("level {i}: segments must be at least 1"));
            }
            if !(0.0..=1.0).contains(&level.taper) {
                return Err(format!("level {i}: taper must be in [0, 1], got {}", level.taper));
            }
            if !(level.length > 0.0) {
                return Err(format!("level {i}: length must be positive"));
            }
        }
        Ok(())
    }

    /// Deepest branch level described by the parameters.
    pub fn max_level(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

pub type TreeLibrary = BTreeMap<String, WeberPennParameters>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_read_from_inline_tables() {
        let library: TreeLibrary = toml::from_str(
            "[shrub]\nscale = 1.5\nlevels = [\n  { segments = 4 },\n  { length = 0.5, branches = 3 },\n]\n",
        )
        .unwrap();
        let shrub = &library["shrub"];
        assert_eq!(shrub.levels.len(), 2);
        assert_eq!(shrub.levels[1].branches, 3);
        assert_eq!(shrub.levels[1].segments, StemLevel::default().segments);
        assert_eq!(shrub.max_level(), 1);
        assert!(shrub.validate().is_ok());
    }

    #[test]
    fn degenerate_levels_are_rejected() {
        let mut params = WeberPennParameters::default();
        params.levels[0].segments = 0;
        assert!(params.validate().unwrap_err().contains("segments"));
        params.levels.clear();
        assert!(params.validate().is_err());
    }
}
