use glam::{vec3, Mat4, Quat, Vec3};
use rand::Rng;
use tiled_rasterizer::{Color, Frame, Mesh, Texture};

const GROUND_HALF_EXTENT: f32 = 40.0;
const SPAWN_RADIUS: f32 = 30.0;

struct Prop {
    position: Vec3,
    scale: f32,
    spin: f32,
}

/// Ground plane plus a field of spinning cubes.
pub struct Scene {
    ground: Mesh,
    cube: Mesh,
    ground_texture: Texture,
    cube_texture: Texture,
    props: Vec<Prop>,
}

fn checkerboard(size: usize, cell: usize, a: Color, b: Color) -> Texture {
    let texels = (0..size * size)
        .map(|i| {
            let (x, y) = (i % size, i / size);
            if (x / cell + y / cell) % 2 == 0 {
                a
            } else {
                b
            }
        })
        .collect();

    Texture::with_mipmaps(size, size, texels).unwrap_or_default()
}

impl Scene {
    pub fn new(cube_count: usize, texture_path: Option<&str>) -> Scene {
        let mut rng = rand::rng();

        let props = (0..cube_count)
            .map(|_| {
                let scale = rng.random_range(0.5..2.5);
                Prop {
                    position: vec3(
                        rng.random_range(-SPAWN_RADIUS..SPAWN_RADIUS),
                        scale,
                        rng.random_range(-SPAWN_RADIUS..SPAWN_RADIUS),
                    ),
                    scale,
                    spin: rng.random_range(-1.5..1.5),
                }
            })
            .collect();

        let cube_texture = match texture_path {
            Some(path) => Texture::load_or_empty(path),
            None => checkerboard(64, 8, Color::from_u8(230, 120, 40, 255), Color::from_u8(250, 220, 160, 255)),
        };

        Scene {
            ground: Mesh::ground(GROUND_HALF_EXTENT, 16.0),
            cube: Mesh::cube(1.0),
            ground_texture: checkerboard(256, 32, Color::from_u8(90, 90, 96, 255), Color::from_u8(200, 200, 200, 255)),
            cube_texture,
            props,
        }
    }

    /// Records every mesh of the scene at `time` seconds.
    pub fn draw<'a>(&'a self, frame: &mut Frame<'_, 'a>, time: f32) {
        frame.set_texture(&self.ground_texture);
        frame.draw_indexed(&self.ground, Mat4::IDENTITY);

        // an empty texture falls back to the renderer's grey
        frame.set_texture(&self.cube_texture);
        for prop in &self.props {
            let world = Mat4::from_scale_rotation_translation(
                Vec3::splat(prop.scale),
                Quat::from_rotation_y(prop.spin * time),
                prop.position,
            );
            frame.draw_indexed(&self.cube, world);
        }
    }
}
