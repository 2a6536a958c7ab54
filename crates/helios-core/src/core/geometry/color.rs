/// An RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: RgbColor = RgbColor { r: 1.0, g: 1.0, b: 1.0 };
    pub const RED: RgbColor = RgbColor { r: 1.0, g: 0.0, b: 0.0 };
    pub const GREEN: RgbColor = RgbColor { r: 0.0, g: 0.6, b: 0.0 };
    pub const BLUE: RgbColor = RgbColor { r: 0.0, g: 0.0, b: 1.0 };

    /// Creates a color, clamping each component into `[0, 1]`.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
        }
    }

    pub fn from_array(values: [f32; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn with_alpha(&self, a: f32) -> RgbaColor {
        RgbaColor::new(self.r, self.g, self.b, a)
    }

    /// Linear interpolation toward `other` by `t` in `[0, 1]`.
    pub fn lerp(&self, other: &RgbColor, t: f32) -> RgbColor {
        let t = clamp_unit(t);
        RgbColor::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    pub fn scaled(&self, factor: f32) -> RgbColor {
        RgbColor::new(self.r * factor, self.g * factor, self.b * factor)
    }
}

/// An RGBA color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RgbaColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl RgbaColor {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self {
            r: clamp_unit(r),
            g: clamp_unit(g),
            b: clamp_unit(b),
            a: clamp_unit(a),
        }
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn rgb(&self) -> RgbColor {
        RgbColor {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

impl From<RgbColor> for RgbaColor {
    fn from(c: RgbColor) -> Self {
        c.with_alpha(1.0)
    }
}

fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
