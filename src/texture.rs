use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::color::Color;
use crate::error::{TextureError, TextureResult};

pub const MAX_SURFACES: usize = 16;

/// Largest accepted width or height.
pub const MAX_TEXTURE_SIZE: usize = 16384;

/// "DDS " read as a little-endian u32.
const DDS_MAGIC: u32 = 0x2053_4444;
const DDS_HEADER_SIZE: usize = 124;

/// Added to texture coordinates before truncation so small negative values wrap
/// like positive ones.
const WRAP_OFFSET: f32 = 256.0;

/// One mip level. Dimensions are powers of two so wrapping is a mask.
#[derive(Debug, Clone)]
struct Surface {
    texels: Vec<Color>,
    width: usize,
    height: usize,
    width_f: f32,
    height_f: f32,
    u_mask: i32,
    v_mask: i32,
    v_shift: u32,
}

impl Surface {
    fn new(width: usize, height: usize, texels: Vec<Color>) -> Surface {
        debug_assert!(width.is_power_of_two() && height.is_power_of_two());
        debug_assert_eq!(texels.len(), width * height);
        Surface {
            texels,
            width,
            height,
            width_f: width as f32,
            height_f: height as f32,
            u_mask: width as i32 - 1,
            v_mask: height as i32 - 1,
            v_shift: width.trailing_zeros(),
        }
    }

    #[inline]
    fn texel(&self, u: i32, v: i32) -> Color {
        self.texels[((u & self.u_mask) + ((v & self.v_mask) << self.v_shift)) as usize]
    }

    /// Coordinates must already carry the wrap offset.
    #[inline]
    fn bilinear(&self, u: f32, v: f32) -> Color {
        let uf = u * self.width_f;
        let vf = v * self.height_f;
        let u0 = uf as i32;
        let v0 = vf as i32;

        Color::lerp_quad(
            self.texel(u0, v0),
            self.texel(u0 + 1, v0),
            self.texel(u0, v0 + 1),
            self.texel(u0 + 1, v0 + 1),
            uf - u0 as f32,
            vf - v0 as f32,
        )
    }

    /// 2x2 box filter, collapsing to 1 along an axis that is already 1 wide.
    fn downsample(&self) -> Surface {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut texels = Vec::with_capacity(width * height);

        for y in 0..height {
            let y0 = (y * 2).min(self.height - 1);
            let y1 = (y * 2 + 1).min(self.height - 1);
            for x in 0..width {
                let x0 = (x * 2).min(self.width - 1);
                let x1 = (x * 2 + 1).min(self.width - 1);

                let quad = [
                    self.texels[x0 + y0 * self.width],
                    self.texels[x1 + y0 * self.width],
                    self.texels[x0 + y1 * self.width],
                    self.texels[x1 + y1 * self.width],
                ];
                let average = |channel: fn(Color) -> u8| {
                    let sum: u32 = quad.iter().map(|&c| channel(c) as u32).sum();
                    ((sum + 2) / 4) as u8
                };
                texels.push(Color::from_u8(average(Color::r), average(Color::g), average(Color::b), average(Color::a)));
            }
        }

        Surface::new(width, height, texels)
    }
}

/// Mip-mapped 32-bit texture. An empty texture has no surfaces.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    surfaces: Vec<Surface>,
}

fn check_dimensions(width: usize, height: usize) -> TextureResult<()> {
    let valid = |size: usize| size.is_power_of_two() && size <= MAX_TEXTURE_SIZE;
    if !valid(width) || !valid(height) {
        return Err(TextureError::BadDimensions {
            width: width as u32,
            height: height as u32,
        });
    }
    Ok(())
}

impl Texture {
    pub fn empty() -> Texture {
        Texture::default()
    }

    /// Single-level texture over row-major `texels`.
    pub fn from_pixels(width: usize, height: usize, texels: Vec<Color>) -> TextureResult<Texture> {
        check_dimensions(width, height)?;
        if texels.len() != width * height {
            return Err(TextureError::TexelCount {
                expected: width * height,
                actual: texels.len(),
            });
        }

        Ok(Texture {
            surfaces: vec![Surface::new(width, height, texels)],
        })
    }

    /// Like `from_pixels`, then box-filters a full chain down to 1x1.
    pub fn with_mipmaps(width: usize, height: usize, texels: Vec<Color>) -> TextureResult<Texture> {
        let mut texture = Texture::from_pixels(width, height, texels)?;

        while texture.surfaces.len() < MAX_SURFACES {
            let last = &texture.surfaces[texture.surfaces.len() - 1];
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            texture.surfaces.push(next);
        }

        Ok(texture)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> TextureResult<Texture> {
        let file = File::open(path)?;
        Texture::read_dds(&mut BufReader::new(file))
    }

    /// Loads a texture, logging and returning an empty texture on failure.
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Texture {
        let path = path.as_ref();
        match Texture::load(path) {
            Ok(texture) => {
                log::info!(
                    "loaded texture {} ({}x{}, {} levels)",
                    path.display(),
                    texture.get_width(0),
                    texture.get_height(0),
                    texture.surface_count()
                );
                texture
            }
            Err(err) => {
                log::warn!("failed to load texture {}: {}", path.display(), err);
                Texture::empty()
            }
        }
    }

    /// Parses an uncompressed 32-bit A8R8G8B8 DDS stream.
    pub fn read_dds<R: Read>(reader: &mut R) -> TextureResult<Texture> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != DDS_MAGIC {
            return Err(TextureError::BadMagic(magic));
        }

        let mut header = [0u32; DDS_HEADER_SIZE / 4];
        reader.read_u32_into::<LittleEndian>(&mut header)?;

        let height = header[2] as usize;
        let width = header[3] as usize;
        let mip_count = header[6] as usize;

        // pixel format block starts after 18 words
        let bit_count = header[21];
        let r_mask = header[22];
        let g_mask = header[23];
        let b_mask = header[24];
        let a_mask = header[25];

        if bit_count != 32 || a_mask != 0xFF00_0000 || r_mask != 0x00FF_0000 || g_mask != 0x0000_FF00 || b_mask != 0x0000_00FF {
            return Err(TextureError::UnsupportedFormat {
                bit_count,
                r_mask,
                g_mask,
                b_mask,
                a_mask,
            });
        }

        check_dimensions(width, height)?;

        // the two smallest levels of the chain are skipped
        let surface_count = mip_count.saturating_sub(2).clamp(1, MAX_SURFACES);
        let mut surfaces = Vec::with_capacity(surface_count);
        for level in 0..surface_count {
            let w = (width >> level).max(1);
            let h = (height >> level).max(1);

            // grow with the data actually present, not with what the header claims
            let bytes = w * h * 4;
            let mut payload = Vec::new();
            reader.by_ref().take(bytes as u64).read_to_end(&mut payload)?;
            if payload.len() != bytes {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated mip level").into());
            }

            let mut raw = vec![0u32; w * h];
            LittleEndian::read_u32_into(&payload, &mut raw);
            surfaces.push(Surface::new(w, h, raw.into_iter().map(Color::from_u32).collect()));
        }

        Ok(Texture { surfaces })
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn get_width(&self, level: usize) -> usize {
        self.surfaces.get(level).map_or(0, |s| s.width)
    }

    pub fn get_height(&self, level: usize) -> usize {
        self.surfaces.get(level).map_or(0, |s| s.height)
    }

    pub fn texels(&self, level: usize) -> &[Color] {
        match self.surfaces.get(level) {
            Some(surface) => &surface.texels,
            None => &[],
        }
    }

    /// Bilinear sample of the top level with wrap-around addressing.
    /// Texel `i` of a `W`-wide texture sits at `u = i / W`.
    pub fn sample(&self, u: f32, v: f32) -> Color {
        match self.surfaces.first() {
            Some(surface) => surface.bilinear(u + WRAP_OFFSET, v + WRAP_OFFSET),
            None => Color::TRANSPARENT,
        }
    }

    /// Trilinear sample. `du`/`dv` are the texture coordinate change across one
    /// screen pixel and pick the mip level.
    pub fn sample_with_derivatives(&self, u: f32, v: f32, du: f32, dv: f32) -> Color {
        let Some(top) = self.surfaces.first() else {
            return Color::TRANSPARENT;
        };

        let u = u + WRAP_OFFSET;
        let v = v + WRAP_OFFSET;

        let footprint = (du * top.width_f).abs().max((dv * top.height_f).abs());
        // f32::max discards NaN, and log2(0) is -inf
        let level = footprint.log2().max(0.0);
        let rate = level - level.floor();

        let max_level = self.surfaces.len() - 1;
        let level_a = (level as usize).min(max_level);
        let level_b = (level_a + 1).min(max_level);

        let a = self.surfaces[level_a].bilinear(u, v);
        let b = self.surfaces[level_b].bilinear(u, v);
        a.lerp(b, rate)
    }
}
