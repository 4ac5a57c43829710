mod camera;
mod scene;

use std::sync::Arc;
use std::time::Instant;

use camera::OrbitCamera;
use glam::vec3;
use minifb::{Key, Scale, Window, WindowOptions};
use minifb_fonts::font6x8;
use scene::Scene;
use tiled_rasterizer::screenshot::save_bmp;
use tiled_rasterizer::{
    Color, ColorBuffer, DepthBuffer, GBuffer, GBufferTexel, RenderTargets, Renderer, RendererSettings, TaskSystem,
    DEPTH_FAR,
};

const SCREEN_WIDTH: usize = 1920 / 2;
const SCREEN_HEIGHT: usize = 1080 / 2;
const CUBE_COUNT: usize = 64;
const CLEAR_COLOR: Color = Color::from_u8(40, 44, 52, 255);

struct DemoSettings {
    pub camera_zoom_speed: f32,
    pub camera_rotation_speed: f32,
    pub draw_depth: bool,
    pub show_stats: bool,
}

fn float_to_u32_color(value: f32) -> u32 {
    let intensity = (value.clamp(0.0, 1.0) * 255.0).round() as u32;
    0xFF000000 | (intensity << 16) | (intensity << 8) | intensity
}

fn process_input(window: &Window, elapsed_seconds: f32, settings: &mut DemoSettings, camera: &mut OrbitCamera) {
    if window.is_key_down(Key::W) {
        camera.distance -= settings.camera_zoom_speed * elapsed_seconds;
    }
    if window.is_key_down(Key::S) {
        camera.distance += settings.camera_zoom_speed * elapsed_seconds;
    }
    if window.is_key_down(Key::Left) {
        camera.yaw += settings.camera_rotation_speed * elapsed_seconds;
    }
    if window.is_key_down(Key::Right) {
        camera.yaw -= settings.camera_rotation_speed * elapsed_seconds;
    }
    if window.is_key_down(Key::Up) {
        camera.pitch += settings.camera_rotation_speed * elapsed_seconds;
    }
    if window.is_key_down(Key::Down) {
        camera.pitch -= settings.camera_rotation_speed * elapsed_seconds;
    }
    if window.is_key_released(Key::Tab) {
        settings.draw_depth = !settings.draw_depth;
    }
    if window.is_key_released(Key::F1) {
        settings.show_stats = !settings.show_stats;
    }

    camera.clamp();
}

fn main() {
    env_logger::init();

    let texture_path = std::env::args().nth(1);

    let tasks = match TaskSystem::with_default_workers() {
        Ok(tasks) => Arc::new(tasks),
        Err(err) => {
            log::error!("failed to start task pipelines: {}", err);
            return;
        }
    };
    log::info!("rendering with {} task participants", tasks.participant_count());

    // create a text renderer
    let text = font6x8::new_renderer(SCREEN_WIDTH, SCREEN_HEIGHT, Color::WHITE.to_u32());

    // create a window and buffer
    let mut window = match Window::new(
        "tiled-rasterizer",
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        WindowOptions {
            scale: Scale::X2,
            ..WindowOptions::default()
        },
    ) {
        Ok(window) => window,
        Err(err) => {
            log::error!("failed to open window: {}", err);
            return;
        }
    };

    let mut renderer = Renderer::new(tasks, RendererSettings::default());
    let scene = Scene::new(CUBE_COUNT, texture_path.as_deref());

    let mut color = ColorBuffer::new(SCREEN_WIDTH, SCREEN_HEIGHT, CLEAR_COLOR);
    let mut depth = DepthBuffer::new(SCREEN_WIDTH, SCREEN_HEIGHT, DEPTH_FAR);
    let mut gbuffer = GBuffer::new(SCREEN_WIDTH, SCREEN_HEIGHT, GBufferTexel::EMPTY);

    let mut settings = DemoSettings {
        camera_zoom_speed: 20.0,
        camera_rotation_speed: 1.5,
        draw_depth: false,
        show_stats: true,
    };

    let mut camera = OrbitCamera::new(SCREEN_WIDTH as f32 / SCREEN_HEIGHT as f32);

    let start = Instant::now();
    let mut instant = Instant::now();
    let mut buffer: Vec<u32> = vec![0; SCREEN_WIDTH * SCREEN_HEIGHT];

    // run the main-loop
    while window.is_open() && !window.is_key_down(Key::Escape) {
        // fps counter
        let elapsed_seconds = instant.elapsed().as_secs_f32();
        instant = Instant::now();

        process_input(&window, elapsed_seconds, &mut settings, &mut camera);

        color.clear(CLEAR_COLOR);

        let mut frame = renderer.begin_draw(
            RenderTargets {
                color: &mut color,
                depth: &mut depth,
                gbuffer: &mut gbuffer,
            },
            camera.get_view_mat(),
            camera.get_projection_mat(),
        );
        frame.set_directional_light(vec3(-0.4, -1.0, 0.3));
        scene.draw(&mut frame, start.elapsed().as_secs_f32());
        let stats = frame.end_draw();

        if window.is_key_released(Key::F12) {
            if let Err(err) = save_bmp("screenshot.bmp", &color) {
                log::error!("failed to save screenshot: {}", err);
            }
        }

        if settings.draw_depth {
            // perspective depth crowds towards 1, stretch the near range
            for (dst, &d) in buffer.iter_mut().zip(depth.as_slice()) {
                *dst = float_to_u32_color((1.0 - d) * 16.0);
            }
        } else {
            for (dst, &c) in buffer.iter_mut().zip(color.as_slice()) {
                *dst = c.to_u32();
            }
        }

        // draw some informative text
        let text_frame_time = format!("frame: {}ms", (elapsed_seconds * 1000.0) as u32);
        text.draw_text(&mut buffer, 10, 20, text_frame_time.as_str());
        let text_camera_position = format!("camera: {:.1}", camera.position());
        text.draw_text(&mut buffer, 10, 40, text_camera_position.as_str());

        if settings.show_stats {
            let mut y_offset = 80;
            for (key, value) in stats.debug_values() {
                let str = format!("{}: {}", key, value);
                text.draw_text(&mut buffer, 10, y_offset, str.as_str());
                y_offset += 12;
            }
        }

        if let Err(err) = window.update_with_buffer(buffer.as_slice(), SCREEN_WIDTH, SCREEN_HEIGHT) {
            log::error!("failed to present frame: {}", err);
            break;
        }
    }
}
