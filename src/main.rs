// Frame loop glue: owns the window/event loop, model loading, and demo
// geometry/animation. Out of the core pipeline's scope (spec.md §1); this
// binary just drives `renderer::Device` with a stream of triangles.

extern crate minifb;
extern crate nalgebra as na;
extern crate obj;
extern crate renderer;

use minifb::{Key, KeyRepeat, Window, WindowOptions};
use na::Vector4;
use obj::*;
use renderer::vertex::Vertex;
use renderer::{Color, Device, Texcoord, CCW_CULLING, COLOR, TEXTURE, WIREFRAME};
use std::env;
use std::fs::File;
use std::io::BufReader;

const FPS: usize = 60;
const WIN_WIDTH: usize = 800;
const WIN_HEIGHT: usize = 600;

/// A triangle of device-ready vertices in local model space (`pos.w = 1`);
/// the world transform is applied once per frame by `Device::draw_primitive`.
struct Triangle {
    v0: Vertex,
    v1: Vertex,
    v2: Vertex,
}

fn load_model_from_file(file_name: &str) -> Vec<Triangle> {
    let f = match File::open(file_name) {
        Ok(v) => v,
        Err(_) => {
            println!("Error: Could not open file {}", file_name);
            return Vec::new();
        }
    };

    let input = BufReader::new(f);
    let obj: Obj = load_obj(input).unwrap();
    let white = Color::new(1.0, 1.0, 1.0);

    let to_vertex = |idx: usize| {
        let p = obj.vertices[idx].position;
        Vertex::new(
            Vector4::new(p[0], p[1], p[2], 1.0),
            Texcoord::new(0.0, 0.0),
            white,
        )
    };

    let mut triangles = Vec::new();
    let mut f = 0;
    while f + 2 < obj.indices.len() {
        let i = obj.indices[f] as usize;
        let j = obj.indices[f + 1] as usize;
        let k = obj.indices[f + 2] as usize;
        triangles.push(Triangle {
            v0: to_vertex(i),
            v1: to_vertex(j),
            v2: to_vertex(k),
        });
        f += 3;
    }

    triangles
}

/// A small default mesh (a unit cube) used when no model file is given,
/// echoing the teacher's cube demo geometry; each face gets its own solid
/// color and unit-square texture coordinates so `TEXTURE` mode has
/// something to sample.
fn default_cube() -> Vec<Triangle> {
    let corners = [
        Vector4::new(-1.0, -1.0, -1.0, 1.0),
        Vector4::new(1.0, -1.0, -1.0, 1.0),
        Vector4::new(1.0, 1.0, -1.0, 1.0),
        Vector4::new(-1.0, 1.0, -1.0, 1.0),
        Vector4::new(-1.0, -1.0, 1.0, 1.0),
        Vector4::new(1.0, -1.0, 1.0, 1.0),
        Vector4::new(1.0, 1.0, 1.0, 1.0),
        Vector4::new(-1.0, 1.0, 1.0, 1.0),
    ];

    let faces: [(usize, usize, usize, usize, Color); 6] = [
        (0, 1, 2, 3, Color::new(1.0, 0.0, 0.0)),
        (5, 4, 7, 6, Color::new(0.0, 1.0, 0.0)),
        (4, 0, 3, 7, Color::new(0.0, 0.0, 1.0)),
        (1, 5, 6, 2, Color::new(1.0, 1.0, 0.0)),
        (3, 2, 6, 7, Color::new(1.0, 0.0, 1.0)),
        (4, 5, 1, 0, Color::new(0.0, 1.0, 1.0)),
    ];

    let tc = [
        Texcoord::new(0.0, 0.0),
        Texcoord::new(1.0, 0.0),
        Texcoord::new(1.0, 1.0),
        Texcoord::new(0.0, 1.0),
    ];

    let mut triangles = Vec::new();
    for (a, b, c, d, color) in faces {
        let va = Vertex::new(corners[a], tc[0], color);
        let vb = Vertex::new(corners[b], tc[1], color);
        let vc = Vertex::new(corners[c], tc[2], color);
        let vd = Vertex::new(corners[d], tc[3], color);
        triangles.push(Triangle {
            v0: va,
            v1: vb,
            v2: vc,
        });
        triangles.push(Triangle {
            v0: va,
            v1: vc,
            v2: vd,
        });
    }
    triangles
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let triangles = if args.len() == 2 {
        load_model_from_file(&args[1])
    } else {
        println!("Usage: gfx_test_app [FILE]");
        println!("No model file given. Loading default cube");
        default_cube()
    };

    let mut device = Device::new(WIN_WIDTH as i32, WIN_HEIGHT as i32)
        .expect("failed to allocate framebuffer/z-buffer storage");
    device.render_state = COLOR;
    device.transform.world = renderer::math::translate(0.0, 0.0, -4.0);
    device.transform.update();

    let mut window = Window::new(
        "gfx_test_app - ESC to exit, 1=wireframe 2=color 3=texture 4=cull",
        WIN_WIDTH,
        WIN_HEIGHT,
        WindowOptions::default(),
    )
    .unwrap_or_else(|e| {
        panic!("{}", e);
    });
    window.set_target_fps(FPS);

    let mut buffer: Vec<u32> = vec![0; WIN_WIDTH * WIN_HEIGHT];
    let mut theta: f32 = 0.0;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if window.is_key_pressed(Key::Key1, KeyRepeat::No) {
            device.render_state ^= WIREFRAME;
        }
        if window.is_key_pressed(Key::Key2, KeyRepeat::No) {
            device.render_state ^= COLOR;
        }
        if window.is_key_pressed(Key::Key3, KeyRepeat::No) {
            device.render_state ^= TEXTURE;
        }
        if window.is_key_pressed(Key::Key4, KeyRepeat::No) {
            device.render_state ^= CCW_CULLING;
        }

        device.clear(0);

        theta += 0.01;
        let rotate = renderer::math::rotate(0.0, 1.0, 0.3, theta);
        let translate = renderer::math::translate(0.0, 0.0, -4.0);
        device.transform.world = renderer::math::mul(&rotate, &translate);
        device.transform.update();

        for tri in &triangles {
            device.draw_primitive(&tri.v0, &tri.v1, &tri.v2);
        }

        for y in 0..WIN_HEIGHT {
            for x in 0..WIN_WIDTH {
                if let Some(c) = device.get_pixel(x as i32, y as i32) {
                    buffer[x + y * WIN_WIDTH] = c;
                }
            }
        }

        window
            .update_with_buffer(&buffer, WIN_WIDTH, WIN_HEIGHT)
            .unwrap();
    }
}
