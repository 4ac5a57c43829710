use glam::Vec3;

use crate::backbuffer::GBufferTexel;
use crate::color::Color;
use crate::texture::Texture;

/// Fixed-point brightness in 1/128 units: `0.75 + 0.25 * N.L`, so a surface
/// facing the light gets 128 and one facing away gets 64.
#[inline]
pub fn brightness(normal: Vec3, light: Vec3) -> u32 {
    let n_dot_l = normal.normalize_or_zero().dot(light) * 0.25 + 0.75;
    (n_dot_l * 128.0) as u32
}

/// Resolves a band of whole G-buffer rows into `color`.
///
/// `light` is the unit vector pointing towards the light. Texels with no
/// surface keep their color and alpha in `color` is never modified. Returns the
/// number of pixels shaded.
pub fn shade_rows(gbuffer: &[GBufferTexel], color: &mut [Color], width: usize, textures: &[&Texture], light: Vec3) -> usize {
    debug_assert_eq!(gbuffer.len(), color.len());
    if width == 0 {
        return 0;
    }

    let mut shaded = 0;
    for (src_row, dst_row) in gbuffer.chunks_exact(width).zip(color.chunks_exact_mut(width)) {
        // derivatives only make sense between neighbours on the same triangle
        let mut previous: Option<(u32, f32, f32)> = None;

        for (texel, dst) in src_row.iter().zip(dst_row.iter_mut()) {
            if texel.is_empty() {
                previous = None;
                continue;
            }

            debug_assert!(
                (texel.texture_id as usize) < textures.len(),
                "texture id {} was never registered",
                texel.texture_id
            );
            let Some(texture) = textures.get(texel.texture_id as usize) else {
                previous = None;
                continue;
            };

            let (u, v) = (texel.uv.x, texel.uv.y);
            let sampled = match previous {
                Some((triangle_id, last_u, last_v)) if triangle_id == texel.triangle_id => {
                    texture.sample_with_derivatives(u, v, last_u - u, last_v - v)
                }
                _ => texture.sample(u, v),
            };
            previous = Some((texel.triangle_id, u, v));

            *dst = sampled.scale_rgb(brightness(texel.normal, light)).with_alpha(dst.a());
            shaded += 1;
        }
    }

    shaded
}
