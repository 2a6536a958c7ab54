use super::{Result, VisualizerError};
use crate::core::geometry::RgbColor;
use phf::{Map, phf_map};

static COLORMAPS: Map<&'static str, &'static [[f32; 3]]> = phf_map! {
    "hot" => &[[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [1.0, 0.5, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0]],
    "cool" => &[[0.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
    "rainbow" => &[[0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
    "lava" => &[[0.0, 0.05, 0.2], [0.3, 0.1, 0.5], [0.7, 0.1, 0.2], [1.0, 0.5, 0.0], [1.0, 1.0, 0.2]],
    "parula" => &[[0.21, 0.17, 0.53], [0.01, 0.49, 0.88], [0.08, 0.69, 0.72], [0.65, 0.75, 0.38], [0.98, 0.98, 0.08]],
    "gray" => &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]],
};

/// Colormap names in the order of their numeric identifiers.
pub const COLORMAP_NAMES: [&str; 6] = ["hot", "cool", "rainbow", "lava", "parula", "gray"];

/// A piecewise-linear map from `[0, 1]` to colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Colormap {
    name: &'static str,
    stops: &'static [[f32; 3]],
}

impl Default for Colormap {
    fn default() -> Self {
        Self {
            name: "hot",
            stops: COLORMAPS["hot"],
        }
    }
}

impl Colormap {
    pub fn from_name(name: &str) -> Result<Self> {
        COLORMAPS
            .get_entry(name)
            .map(|(name, stops)| Colormap {
                name: *name,
                stops: *stops,
            })
            .ok_or_else(|| VisualizerError::UnknownColormap(name.to_string()))
    }

    pub fn from_index(index: u32) -> Result<Self> {
        COLORMAP_NAMES
            .get(index as usize)
            .ok_or_else(|| VisualizerError::UnknownColormap(index.to_string()))
            .and_then(|name| Self::from_name(name))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn sample(&self, t: f32) -> RgbColor {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let last = self.stops.len() - 1;
        let x = t * last as f32;
        let k = (x.floor() as usize).min(last.saturating_sub(1));
        let a = RgbColor::from_array(self.stops[k]);
        let b = RgbColor::from_array(self.stops[(k + 1).min(last)]);
        a.lerp(&b, x - k as f32)
    }
}
