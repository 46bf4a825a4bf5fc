// Device: owns the framebuffer and z-buffer (row-pointer tables), the
// current texture (row-pointer table), and renders primitives under a
// render-state mask.

use crate::transform::{self, Transform};
use crate::vertex::{self, Color, Scanline, Texcoord, Trapezoid, Vertex};
use std::fmt;
use std::os::raw::c_void;

/// Draw triangle edges only.
pub const WIREFRAME: u32 = 1;
/// Sample the current texture.
pub const TEXTURE: u32 = 2;
/// Shade with the interpolated vertex color.
pub const COLOR: u32 = 4;
/// Cull triangles whose screen-space winding is clockwise.
pub const CCW_CULLING: u32 = 8;

/// Allocation failure at device construction time. The core has no other
/// user-visible error path (spec §7).
#[derive(Debug)]
pub struct DeviceError;

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device: failed to allocate framebuffer/z-buffer storage")
    }
}

impl std::error::Error for DeviceError {}

/// Default checkerboard background/foreground and the starting render
/// state, packed `0x00RRGGBB`.
const DEFAULT_BACKGROUND: u32 = 0x00_30_30_30;
const DEFAULT_FOREGROUND: u32 = 0x00_FF_FF_FF;

/// A device owning (or referencing) a framebuffer, owning a z-buffer, and
/// optionally referencing a texture, addressed throughout by row-pointer
/// tables rather than flat `y * stride + x` arithmetic.
pub struct Device {
    pub transform: Transform,
    pub width: i32,
    pub height: i32,
    pub render_state: u32,
    pub background: u32,
    pub foreground: u32,

    framebuffer: Vec<*mut u32>,
    zbuffer: Vec<*mut f32>,
    texture: Vec<*mut u32>,
    tex_width: i32,
    tex_height: i32,
    max_u: f32,
    max_v: f32,

    // Single backing allocation holding the z-buffer, the default texture,
    // and (unless an external framebuffer was supplied) the framebuffer
    // itself, malloc'd directly per the manual-memory-layout design note.
    // Never includes externally supplied framebuffer storage, so freeing it
    // unconditionally in `Drop` is always correct.
    owned_block: *mut c_void,
}

fn row_pointers<T>(base: *mut T, width: i32, height: i32) -> Vec<*mut T> {
    (0..height)
        .map(|row| unsafe { base.add((row * width) as usize) })
        .collect()
}

impl Device {
    /// Allocates an owned framebuffer and z-buffer, wires up the default
    /// 2x2 checkerboard texture, sets background/foreground/render-state
    /// defaults, and initializes the transform stage.
    pub fn new(width: i32, height: i32) -> Result<Device, DeviceError> {
        Device::build(width, height, None)
    }

    /// As `new`, but the framebuffer storage is supplied by the caller
    /// (`fb` must point to `width * height` contiguous `u32` pixels and
    /// outlive the device). The device still owns the z-buffer.
    ///
    /// # Safety
    /// `fb` must be valid for reads and writes for `width * height` `u32`s
    /// for the lifetime of the returned `Device`.
    pub unsafe fn with_framebuffer(
        width: i32,
        height: i32,
        fb: *mut u32,
    ) -> Result<Device, DeviceError> {
        Device::build(width, height, Some(fb))
    }

    fn build(width: i32, height: i32, external_fb: Option<*mut u32>) -> Result<Device, DeviceError> {
        let pixel_count = (width as usize) * (height as usize);
        let fb_words = if external_fb.is_some() { 0 } else { pixel_count };
        // default texture: 2x2 checkerboard, 4 u32 pixels.
        let tex_words = 4usize;
        let zbuf_words = pixel_count;

        let total_bytes = (fb_words + tex_words) * std::mem::size_of::<u32>()
            + zbuf_words * std::mem::size_of::<f32>();

        let owned_block = if total_bytes == 0 {
            std::ptr::null_mut()
        } else {
            unsafe { libc::malloc(total_bytes) }
        };
        if total_bytes != 0 && owned_block.is_null() {
            return Err(DeviceError);
        }
        if total_bytes != 0 {
            unsafe { libc::memset(owned_block, 0, total_bytes) };
        }

        let mut cursor = owned_block as *mut u8;

        let fb_base = if let Some(fb) = external_fb {
            fb
        } else {
            let p = cursor as *mut u32;
            cursor = unsafe { cursor.add(fb_words * std::mem::size_of::<u32>()) };
            p
        };

        let tex_base = cursor as *mut u32;
        cursor = unsafe { cursor.add(tex_words * std::mem::size_of::<u32>()) };
        let zb_base = cursor as *mut f32;

        let framebuffer = row_pointers(fb_base, width, height);
        let zbuffer = row_pointers(zb_base, width, height);

        // Default 2x2 black/white checkerboard.
        unsafe {
            *tex_base.add(0) = 0x00_00_00_00;
            *tex_base.add(1) = 0x00_FF_FF_FF;
            *tex_base.add(2) = 0x00_FF_FF_FF;
            *tex_base.add(3) = 0x00_00_00_00;
        }
        let texture = row_pointers(tex_base, 2, 2);

        Ok(Device {
            transform: Transform::new(width as f32, height as f32),
            width,
            height,
            render_state: WIREFRAME,
            background: DEFAULT_BACKGROUND,
            foreground: DEFAULT_FOREGROUND,
            framebuffer,
            zbuffer,
            texture,
            tex_width: 2,
            tex_height: 2,
            max_u: 1.0,
            max_v: 1.0,
            owned_block,
        })
    }

    /// Rebuilds the texture row-pointer table by stepping `bits` in
    /// `pitch`-byte increments. The texture is referenced, not owned/copied;
    /// `bits` must outlive the next `set_texture` call or device
    /// destruction.
    ///
    /// # Safety
    /// `bits` must be valid for `h` rows of `pitch` bytes each, with each
    /// row holding at least `w` `u32` pixels.
    pub unsafe fn set_texture(&mut self, bits: *mut u8, pitch: usize, w: i32, h: i32) {
        self.texture = (0..h)
            .map(|row| bits.add(row as usize * pitch) as *mut u32)
            .collect();
        self.tex_width = w;
        self.tex_height = h;
        self.max_u = (w - 1) as f32;
        self.max_v = (h - 1) as f32;
    }

    /// Fills the framebuffer with `background` (a vertical gradient when
    /// `mode != 0`, an aesthetic, non-contractual option) and the z-buffer
    /// with 0.0 (smallest rhw, farthest).
    pub fn clear(&mut self, mode: u32) {
        for y in 0..self.height {
            let color = if mode != 0 {
                let t = y as f32 / (self.height.max(1) as f32);
                let base = self.background;
                let r = (((base >> 16) & 0xFF) as f32 * (1.0 - t)) as u32;
                let g = (((base >> 8) & 0xFF) as f32 * (1.0 - t)) as u32;
                let b = ((base & 0xFF) as f32 * (1.0 - t)) as u32;
                (r << 16) | (g << 8) | b
            } else {
                self.background
            };
            let row = self.framebuffer[y as usize];
            for x in 0..self.width {
                unsafe { *row.add(x as usize) = color };
            }
            let zrow = self.zbuffer[y as usize];
            for x in 0..self.width {
                unsafe { *zrow.add(x as usize) = 0.0 };
            }
        }
    }

    /// Bounds-checked pixel write; out-of-range coordinates are dropped
    /// silently (negative values reject via unsigned wraparound).
    pub fn pixel(&mut self, x: i32, y: i32, color: u32) {
        if (x as u32) < (self.width as u32) && (y as u32) < (self.height as u32) {
            unsafe { *self.framebuffer[y as usize].add(x as usize) = color };
        }
    }

    fn pixel_ref(&self, x: i32, y: i32) -> Option<u32> {
        if (x as u32) < (self.width as u32) && (y as u32) < (self.height as u32) {
            Some(unsafe { *self.framebuffer[y as usize].add(x as usize) })
        } else {
            None
        }
    }

    /// Integer Bresenham line, clipped pointwise by `pixel` (no depth test,
    /// overwrites).
    pub fn draw_line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32, color: u32) {
        let (mut x, mut y) = (x1, y1);
        let dx = (x2 - x1).abs();
        let dy = (y2 - y1).abs();
        let sx = if x2 >= x1 { 1 } else { -1 };
        let sy = if y2 >= y1 { 1 } else { -1 };

        if dx >= dy {
            let mut rem = dx / 2;
            loop {
                self.pixel(x, y, color);
                if x == x2 {
                    break;
                }
                x += sx;
                rem += dy;
                if rem >= dx {
                    rem -= dx;
                    y += sy;
                }
            }
        } else {
            let mut rem = dy / 2;
            loop {
                self.pixel(x, y, color);
                if y == y2 {
                    break;
                }
                y += sy;
                rem += dx;
                if rem >= dy {
                    rem -= dy;
                    x += sx;
                }
            }
        }
    }

    /// Nearest-neighbor texture sample: `u, v` nominally in `[0, 1]`,
    /// scaled to texel space and clamped to `[0, max_u]` / `[0, max_v]`,
    /// then truncated to integer texel coordinates.
    pub fn texture_read(&self, u: f32, v: f32) -> u32 {
        let u = (u * self.max_u).clamp(0.0, self.max_u);
        let v = (v * self.max_v).clamp(0.0, self.max_v);
        let (ui, vi) = (u as i32, v as i32);
        unsafe { *self.texture[vi as usize].add(ui as usize) }
    }

    /// For each pixel of `scan`, depth-test against the z-buffer (stored
    /// value is `rhw`; larger is closer), recover perspective-correct
    /// attributes, shade, and write.
    pub fn draw_scanline(&mut self, scan: &mut Scanline) {
        let y = scan.y;
        if y < 0 || y >= self.height {
            return;
        }
        let mut x = scan.x;
        let mut remaining = scan.w;
        let render_state = self.render_state;

        while remaining > 0 && x < self.width {
            if x >= 0 {
                let rhw = scan.v.rhw;
                let zrow = self.zbuffer[y as usize];
                let stored = unsafe { *zrow.add(x as usize) };
                if rhw > stored {
                    unsafe { *zrow.add(x as usize) = rhw };
                    let w = 1.0 / rhw;

                    let packed = if render_state & TEXTURE != 0 {
                        self.texture_read(scan.v.tc.u * w, scan.v.tc.v * w)
                    } else if render_state & COLOR != 0 {
                        Color::new(scan.v.color.r * w, scan.v.color.g * w, scan.v.color.b * w).pack()
                    } else {
                        self.foreground
                    };

                    self.pixel(x, y, packed);
                }
            }
            vertex::vertex_add(&mut scan.v, &scan.step);
            x += 1;
            remaining -= 1;
        }
        scan.x = x;
    }

    /// Integer scanlines `y` from `max(ceil(top), 0)` to `min(floor(bottom)
    /// - 1, height - 1)` inclusive; edge-interps and draws each.
    pub fn render_trap(&mut self, trap: &mut Trapezoid) {
        let y0 = (trap.top.ceil() as i32).max(0);
        let y1 = ((trap.bottom.floor() as i32) - 1).min(self.height - 1);
        for y in y0..=y1 {
            vertex::trapezoid_edge_interp(trap, y as f32);
            let mut scan = vertex::trapezoid_init_scan_line(trap, y);
            self.draw_scanline(&mut scan);
        }
    }

    /// Transforms, clip-tests, culls, shades, and wireframes a triangle.
    pub fn draw_primitive(&mut self, v1: &Vertex, v2: &Vertex, v3: &Vertex) {
        // Transform into clip space; pos.w is still the true clip w here.
        let mut clip: Vec<Vertex> = [v1, v2, v3]
            .iter()
            .map(|v| {
                let mut out = **v;
                out.pos = self.transform.apply(&v.pos);
                out
            })
            .collect();

        for v in &clip {
            if transform::check_cvv(&v.pos) != 0 {
                return;
            }
        }

        // rhw_init must run while pos.w still holds the true clip w: it
        // reads 1/pos.w to pre-multiply tc/color, and homogenize below will
        // overwrite pos.w with that same reciprocal afterwards.
        if self.render_state & (COLOR | TEXTURE) != 0 {
            for v in clip.iter_mut() {
                v.rhw_init();
            }
        }

        let screen_w = self.transform.w;
        let screen_h = self.transform.h;
        let mut screen: Vec<Vertex> = clip
            .iter()
            .map(|v| {
                let mut out = *v;
                out.pos = transform::transform_homogenize(&v.pos, screen_w, screen_h);
                out
            })
            .collect();

        if self.render_state & CCW_CULLING != 0
            && transform::check_ccw_culling(&screen[0].pos, &screen[1].pos, &screen[2].pos)
        {
            return;
        }

        if self.render_state & (COLOR | TEXTURE) != 0 {
            let (count, mut traps) = vertex::trapezoid_init_triangle(screen[0], screen[1], screen[2]);
            for trap in traps.iter_mut().take(count) {
                self.render_trap(trap);
            }
        }

        if self.render_state & WIREFRAME != 0 {
            let fg = self.foreground;
            let p = |v: &Vertex| (v.pos.x as i32, v.pos.y as i32);
            let (x0, y0) = p(&screen[0]);
            let (x1, y1) = p(&screen[1]);
            let (x2, y2) = p(&screen[2]);
            self.draw_line(x0, y0, x1, y1, fg);
            self.draw_line(x1, y1, x2, y2, fg);
            self.draw_line(x2, y2, x0, y0, fg);
        }
    }

    /// Reads back a framebuffer pixel (used by the demo binary and tests);
    /// out-of-range coordinates return `None`.
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<u32> {
        self.pixel_ref(x, y)
    }

    /// Width/height of the active texture.
    pub fn texture_dimensions(&self) -> (i32, i32) {
        (self.tex_width, self.tex_height)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if !self.owned_block.is_null() {
            unsafe { libc::free(self.owned_block) };
            self.owned_block = std::ptr::null_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::Vertex;
    use na::Vector4;

    fn solid_vertex(x: f32, y: f32, rhw: f32, color: Color) -> Vertex {
        Vertex {
            pos: Vector4::new(x, y, 0.0, rhw),
            tc: Texcoord::new(0.0, 0.0),
            color,
            rhw,
        }
    }

    #[test]
    fn clear_then_read_returns_background() {
        let mut dev = Device::new(4, 4).unwrap();
        dev.background = 0x00_11_22_33;
        dev.clear(0);
        assert_eq!(dev.get_pixel(1, 1), Some(0x00_11_22_33));
    }

    #[test]
    fn pixel_never_writes_out_of_bounds() {
        let mut dev = Device::new(4, 4).unwrap();
        dev.pixel(-1, 0, 0xFFFFFF);
        dev.pixel(0, -1, 0xFFFFFF);
        dev.pixel(4, 0, 0xFFFFFF);
        dev.pixel(0, 4, 0xFFFFFF);
        assert_eq!(dev.get_pixel(-1, 0), None);
        assert_eq!(dev.get_pixel(4, 0), None);
    }

    #[test]
    fn depth_test_nearer_wins() {
        let mut dev = Device::new(4, 4).unwrap();
        dev.render_state = COLOR;
        dev.clear(0);

        let blue = Color::new(0.0, 0.0, 1.0);
        let red = Color::new(1.0, 0.0, 0.0);

        // A screen-space scanline directly, bypassing the transform stage,
        // to pin down the depth-test contract precisely.
        let mut scan_far = Scanline {
            v: solid_vertex(2.0, 2.0, 0.5, blue),
            step: solid_vertex(0.0, 0.0, 0.0, Color::new(0.0, 0.0, 0.0)),
            x: 2,
            y: 2,
            w: 1,
        };
        dev.draw_scanline(&mut scan_far);
        assert_eq!(dev.get_pixel(2, 2), Some(blue.pack()));

        let mut scan_near = Scanline {
            v: solid_vertex(2.0, 2.0, 1.0, red),
            step: solid_vertex(0.0, 0.0, 0.0, Color::new(0.0, 0.0, 0.0)),
            x: 2,
            y: 2,
            w: 1,
        };
        dev.draw_scanline(&mut scan_near);
        assert_eq!(dev.get_pixel(2, 2), Some(red.pack()));

        // And a second far write must not overwrite the nearer pixel.
        let mut scan_far_again = Scanline {
            v: solid_vertex(2.0, 2.0, 0.5, blue),
            step: solid_vertex(0.0, 0.0, 0.0, Color::new(0.0, 0.0, 0.0)),
            x: 2,
            y: 2,
            w: 1,
        };
        dev.draw_scanline(&mut scan_far_again);
        assert_eq!(dev.get_pixel(2, 2), Some(red.pack()));
    }

    #[test]
    fn wireframe_draws_only_edges() {
        let mut dev = Device::new(4, 4).unwrap();
        dev.render_state = WIREFRAME;
        dev.clear(0);
        dev.draw_line(0, 0, 3, 0, dev.foreground);
        dev.draw_line(3, 0, 0, 3, dev.foreground);
        dev.draw_line(0, 3, 0, 0, dev.foreground);
        assert_eq!(dev.get_pixel(0, 0), Some(dev.foreground));
        assert_eq!(dev.get_pixel(3, 0), Some(dev.foreground));
        assert_eq!(dev.get_pixel(0, 3), Some(dev.foreground));
    }

    #[test]
    fn texture_read_clamps_and_samples_nearest() {
        let dev = Device::new(2, 2).unwrap();
        // default checkerboard: (0,0)=black, (1,0)=white, (0,1)=white, (1,1)=black
        assert_eq!(dev.texture_read(0.0, 0.0), 0x00_00_00_00);
        assert_eq!(dev.texture_read(10.0, 10.0), dev.texture_read(1.0, 1.0));
    }

    #[test]
    fn backface_cull_leaves_framebuffer_untouched() {
        let mut dev = Device::new(4, 4).unwrap();
        dev.render_state = COLOR | CCW_CULLING;
        dev.clear(0);
        let bg = dev.get_pixel(1, 1);

        // Clockwise in screen space: should be culled.
        let v1 = solid_vertex(0.0, 0.0, 1.0, Color::new(1.0, 0.0, 0.0));
        let v2 = solid_vertex(0.0, 2.0, 1.0, Color::new(1.0, 0.0, 0.0));
        let v3 = solid_vertex(2.0, 0.0, 1.0, Color::new(1.0, 0.0, 0.0));

        // draw_primitive expects clip-space input; feed screen-space
        // coordinates through an identity transform so homogenize is a
        // no-op scale (w=1 on input maps predictably).
        dev.transform.world = crate::math::identity();
        dev.transform.view = crate::math::identity();
        dev.transform.projection = crate::math::identity();
        dev.transform.update();

        dev.draw_primitive(&v1, &v2, &v3);
        assert_eq!(dev.get_pixel(1, 1), bg);
    }

    /// Builds a triangle whose clip-space vertices sit at `(+-w_val, ...,
    /// w_val)`: the `rhw = 1/w_val` homogenize factor cancels the `w_val`
    /// scale on x/y, so every such triangle homogenizes to the same screen
    /// footprint regardless of `w_val`, letting depth/color comparisons
    /// isolate the effect of a non-unit clip w.
    fn perspective_triangle(w_val: f32, color: Color) -> (Vertex, Vertex, Vertex) {
        let z = w_val * 0.5;
        let tc = Texcoord::new(0.0, 0.0);
        (
            Vertex::new(Vector4::new(-w_val, -w_val, z, w_val), tc, color),
            Vertex::new(Vector4::new(w_val, -w_val, z, w_val), tc, color),
            Vertex::new(Vector4::new(0.0, w_val, z, w_val), tc, color),
        )
    }

    fn identity_transform(dev: &mut Device) {
        dev.transform.world = crate::math::identity();
        dev.transform.view = crate::math::identity();
        dev.transform.projection = crate::math::identity();
        dev.transform.update();
    }

    #[test]
    fn draw_primitive_recovers_perspective_correct_color_for_non_unit_w() {
        let mut dev = Device::new(4, 4).unwrap();
        dev.render_state = COLOR;
        identity_transform(&mut dev);
        dev.clear(0);

        let green = Color::new(0.0, 1.0, 0.0);
        let (v1, v2, v3) = perspective_triangle(2.0, green);
        dev.draw_primitive(&v1, &v2, &v3);

        // A uniformly colored triangle must recover exactly its own color
        // no matter the clip w; a stray second `rhw_init` after homogenize
        // divides the recovered color by an extra factor of clip w instead.
        assert_eq!(dev.get_pixel(2, 2), Some(green.pack()));
    }

    #[test]
    fn draw_primitive_depth_test_orders_by_reciprocal_w() {
        let mut dev = Device::new(4, 4).unwrap();
        dev.render_state = COLOR;
        identity_transform(&mut dev);
        dev.clear(0);

        let blue = Color::new(0.0, 0.0, 1.0);
        let red = Color::new(1.0, 0.0, 0.0);

        // Far (large clip w => small rhw) blue triangle first.
        let (f1, f2, f3) = perspective_triangle(4.0, blue);
        dev.draw_primitive(&f1, &f2, &f3);
        assert_eq!(dev.get_pixel(2, 2), Some(blue.pack()));

        // Near (small clip w => large rhw) red triangle passes the depth
        // test and overwrites it.
        let (n1, n2, n3) = perspective_triangle(1.0, red);
        dev.draw_primitive(&n1, &n2, &n3);
        assert_eq!(dev.get_pixel(2, 2), Some(red.pack()));

        // A second far write must not overwrite the nearer pixel. Storing
        // clip w instead of rhw in the z-buffer would invert this ordering.
        let (f1, f2, f3) = perspective_triangle(4.0, blue);
        dev.draw_primitive(&f1, &f2, &f3);
        assert_eq!(dev.get_pixel(2, 2), Some(red.pack()));
    }
}
