use serde::Deserialize;

/// Linear RGBA colour, used for sprite tints and canvas clear colours.
///
/// Deserializes from a plain `[r, g, b, a]` array.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize)]
pub struct Color(pub [f32; 4]);

impl Color {
    pub const WHITE: Self = Self([1.0, 1.0, 1.0, 1.0]);
    pub const BLACK: Self = Self([0.0, 0.0, 0.0, 1.0]);
    /// Default canvas background behind the map.
    pub const CANVAS: Self = Self([0.25, 0.25, 0.5, 1.0]);

    pub fn to_wgpu(self) -> wgpu::Color {
        let [r, g, b, a] = self.0;
        wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: a as f64 }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}
