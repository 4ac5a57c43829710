use glam::Vec4;

/// Packed 8-bit color. In memory (little-endian) the bytes are B, G, R, A,
/// so the `u32` value reads `0xAARRGGBB`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color(0xFF000000);
    pub const WHITE: Color = Color(0xFFFFFFFF);
    pub const TRANSPARENT: Color = Color(0);

    pub const fn from_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    pub const fn from_u32(argb: u32) -> Self {
        Self(argb)
    }

    pub fn from_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::from_vec4(Vec4::new(r, g, b, a))
    }

    pub fn from_vec4(rgba: Vec4) -> Self {
        let scaled = rgba.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
        Self::from_u8(scaled.x as u8, scaled.y as u8, scaled.z as u8, scaled.w as u8)
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    pub fn get_vec(self) -> Vec4 {
        Vec4::new(self.r() as f32, self.g() as f32, self.b() as f32, self.a() as f32) / 255.0
    }

    #[inline]
    pub const fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn b(self) -> u8 {
        self.0 as u8
    }

    /// Per-channel linear blend, truncating toward zero.
    #[inline]
    pub fn lerp(self, other: Color, rate: f32) -> Color {
        #[inline(always)]
        fn channel(lhs: u8, rhs: u8, rate: f32) -> u8 {
            (lhs as f32 + (rhs as f32 - lhs as f32) * rate) as u8
        }

        Color::from_u8(
            channel(self.r(), other.r(), rate),
            channel(self.g(), other.g(), rate),
            channel(self.b(), other.b(), rate),
            channel(self.a(), other.a(), rate),
        )
    }

    /// Bilinear blend of a 2x2 texel quad: first along x on both rows, then along y.
    #[inline]
    pub fn lerp_quad(x0y0: Color, x1y0: Color, x0y1: Color, x1y1: Color, rate_x: f32, rate_y: f32) -> Color {
        let y0 = x0y0.lerp(x1y0, rate_x);
        let y1 = x0y1.lerp(x1y1, rate_x);
        y0.lerp(y1, rate_y)
    }

    pub const fn with_alpha(self, a: u8) -> Color {
        Color((self.0 & 0x00FF_FFFF) | ((a as u32) << 24))
    }

    /// Fixed-point RGB scale: `brightness` is in 1/128 units, so 128 leaves the
    /// color unchanged. Alpha passes through.
    #[inline]
    pub fn scale_rgb(self, brightness: u32) -> Color {
        let r = (self.r() as u32 * brightness) >> 7;
        let g = (self.g() as u32 * brightness) >> 7;
        let b = (self.b() as u32 * brightness) >> 7;
        Color::from_u8(r.min(255) as u8, g.min(255) as u8, b.min(255) as u8, self.a())
    }
}

impl From<u32> for Color {
    fn from(value: u32) -> Self {
        Color(value)
    }
}

impl From<Color> for u32 {
    fn from(value: Color) -> Self {
        value.0
    }
}
