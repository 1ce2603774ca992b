/// 8-bit sRGB color, the way colors are written in config (`0x999933`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as u8,
            g: ((hex >> 8) & 0xff) as u8,
            b: (hex & 0xff) as u8,
        }
    }

    pub fn to_hex(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Linear interpolation per channel in RGB space. `t` is clamped to [0, 1].
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }

    /// Linear-light RGBA for shaders writing to an sRGB surface
    pub fn to_linear(self, alpha: f32) -> [f32; 4] {
        fn channel(c: u8) -> f32 {
            let c = c as f32 / 255.0;
            if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
        }
        [channel(self.r), channel(self.g), channel(self.b), alpha]
    }

    pub fn to_egui(self, alpha: f32) -> egui::Color32 {
        egui::Color32::from_rgba_unmultiplied(self.r, self.g, self.b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_components() {
        let c = Rgb::from_hex(0xccff33);
        assert_eq!(c, Rgb::new(0xcc, 0xff, 0x33));
        assert_eq!(c.to_hex(), 0xccff33);
    }

    #[test]
    fn test_lerp_endpoints_and_clamp() {
        let a = Rgb::from_hex(0x999933);
        let b = Rgb::from_hex(0xccff33);
        assert_eq!(a.lerp(b, 0.0), a);
        assert_eq!(a.lerp(b, 1.0), b);
        assert_eq!(a.lerp(b, 7.5), b);
        assert_eq!(a.lerp(b, -2.0), a);
        // halfway: 0x99 + 0x33/2, 0x99 + 0x66/2
        assert_eq!(a.lerp(b, 0.5), Rgb::new(0xb3, 0xcc, 0x33));
    }

    #[test]
    fn test_linear_black_and_white() {
        assert_eq!(Rgb::from_hex(0x000000).to_linear(1.0), [0.0, 0.0, 0.0, 1.0]);
        let white = Rgb::from_hex(0xffffff).to_linear(0.5);
        assert!((white[0] - 1.0).abs() < 1e-6);
        assert_eq!(white[3], 0.5);
    }
}
