// Primitive assembly: vertex attribute prep (reciprocal-w), triangle to
// trapezoid decomposition, edge interpolation, and scanline setup.

use crate::math;
use na::Vector4;

/// Color in `[0, 1]` per channel while interpolating; packed to 24-bit
/// `0x00RRGGBB` for framebuffer storage.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub fn new(r: f32, g: f32, b: f32) -> Color {
        Color { r, g, b }
    }

    /// Clamp to `[0, 1]`, scale to 0-255, pack as `0x00RRGGBB`.
    pub fn pack(&self) -> u32 {
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0) as u32;
        (to_byte(self.r) << 16) | (to_byte(self.g) << 8) | to_byte(self.b)
    }
}

/// Texture coordinate, nominally in `[0, 1]`; clamped at sample time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Texcoord {
    pub u: f32,
    pub v: f32,
}

impl Texcoord {
    pub fn new(u: f32, v: f32) -> Texcoord {
        Texcoord { u, v }
    }
}

/// A vertex carried through the pipeline. `rhw` is the reciprocal of the
/// clip-space `w` and gates perspective correction: after `rhw_init`, `tc`
/// and `color` are pre-multiplied by `rhw`; interpolation is linear in
/// screen space on every field including `rhw`; attributes are divided back
/// out by `rhw` at sample time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    pub pos: Vector4<f32>,
    pub tc: Texcoord,
    pub color: Color,
    pub rhw: f32,
}

impl Vertex {
    pub fn new(pos: Vector4<f32>, tc: Texcoord, color: Color) -> Vertex {
        Vertex {
            pos,
            tc,
            color,
            rhw: 1.0,
        }
    }

    /// Sets `rhw = 1 / pos.w`, then pre-multiplies `tc` and `color` by it.
    pub fn rhw_init(&mut self) {
        let rhw = 1.0 / self.pos.w;
        self.rhw = rhw;
        self.tc.u *= rhw;
        self.tc.v *= rhw;
        self.color.r *= rhw;
        self.color.g *= rhw;
        self.color.b *= rhw;
    }
}

/// Linear interpolation of pos (xyz), tc, color, and rhw between `a` and
/// `b`, `t` in `[0, 1]`.
pub fn vertex_interp(a: &Vertex, b: &Vertex, t: f32) -> Vertex {
    Vertex {
        pos: math::interp(&a.pos, &b.pos, t),
        tc: Texcoord::new(a.tc.u + (b.tc.u - a.tc.u) * t, a.tc.v + (b.tc.v - a.tc.v) * t),
        color: Color::new(
            a.color.r + (b.color.r - a.color.r) * t,
            a.color.g + (b.color.g - a.color.g) * t,
            a.color.b + (b.color.b - a.color.b) * t,
        ),
        rhw: a.rhw + (b.rhw - a.rhw) * t,
    }
}

/// Per-pixel step for a scanline of pixel width `width`: `(b - a) / width`
/// on every interpolated field. Caller must ensure `width > 0`.
pub fn vertex_division(a: &Vertex, b: &Vertex, width: f32) -> Vertex {
    debug_assert!(width > 0.0);
    let inv = 1.0 / width;
    Vertex {
        pos: Vector4::new(
            (b.pos.x - a.pos.x) * inv,
            (b.pos.y - a.pos.y) * inv,
            (b.pos.z - a.pos.z) * inv,
            (b.pos.w - a.pos.w) * inv,
        ),
        tc: Texcoord::new((b.tc.u - a.tc.u) * inv, (b.tc.v - a.tc.v) * inv),
        color: Color::new(
            (b.color.r - a.color.r) * inv,
            (b.color.g - a.color.g) * inv,
            (b.color.b - a.color.b) * inv,
        ),
        rhw: (b.rhw - a.rhw) * inv,
    }
}

/// Accumulator step: `y += x` on every interpolated field.
pub fn vertex_add(y: &mut Vertex, x: &Vertex) {
    y.pos.x += x.pos.x;
    y.pos.y += x.pos.y;
    y.pos.z += x.pos.z;
    y.pos.w += x.pos.w;
    y.tc.u += x.tc.u;
    y.tc.v += x.tc.v;
    y.color.r += x.color.r;
    y.color.g += x.color.g;
    y.color.b += x.color.b;
    y.rhw += x.rhw;
}

/// `{ v: interpolated scratch, v1: top endpoint, v2: bottom endpoint }`,
/// `v1.pos.y <= v2.pos.y`.
#[derive(Copy, Clone, Debug)]
pub struct Edge {
    pub v: Vertex,
    pub v1: Vertex,
    pub v2: Vertex,
}

/// A screen-space region bounded by two horizontal lines (`top < bottom`)
/// and two linearly interpolated edges sharing those y endpoints.
#[derive(Copy, Clone, Debug)]
pub struct Trapezoid {
    pub top: f32,
    pub bottom: f32,
    pub left: Edge,
    pub right: Edge,
}

/// `{ v: start vertex, step: per-pixel delta, x, y, w }`; `w` is a pixel
/// count, not homogeneous w.
#[derive(Copy, Clone, Debug)]
pub struct Scanline {
    pub v: Vertex,
    pub step: Vertex,
    pub x: i32,
    pub y: i32,
    pub w: i32,
}

fn make_edge(top: Vertex, bottom: Vertex) -> Edge {
    Edge {
        v: top,
        v1: top,
        v2: bottom,
    }
}

/// Splits a screen-space triangle into 0, 1, or 2 trapezoids. Vertices are
/// sorted by ascending y first; a triangle with all three y's (or all three
/// x's) equal is degenerate and yields 0. Two vertices sharing a y value
/// (flat top or flat bottom) yields 1; the general case yields 2.
pub fn trapezoid_init_triangle(p1: Vertex, p2: Vertex, p3: Vertex) -> (usize, [Trapezoid; 2]) {
    let mut pts = [p1, p2, p3];
    pts.sort_by(|a, b| a.pos.y.partial_cmp(&b.pos.y).unwrap());
    let (t, m, b) = (pts[0], pts[1], pts[2]);

    let empty = Trapezoid {
        top: 0.0,
        bottom: 0.0,
        left: make_edge(t, b),
        right: make_edge(t, b),
    };

    if t.pos.y == m.pos.y && m.pos.y == b.pos.y {
        return (0, [empty, empty]);
    }
    if t.pos.x == m.pos.x && m.pos.x == b.pos.x {
        return (0, [empty, empty]);
    }

    if t.pos.y == m.pos.y {
        // Flat top.
        let (left, right) = if t.pos.x > m.pos.x { (m, t) } else { (t, m) };
        let trap = Trapezoid {
            top: t.pos.y,
            bottom: b.pos.y,
            left: make_edge(left, b),
            right: make_edge(right, b),
        };
        return (1, [trap, empty]);
    }

    if m.pos.y == b.pos.y {
        // Flat bottom.
        let (left, right) = if m.pos.x > b.pos.x { (b, m) } else { (m, b) };
        let trap = Trapezoid {
            top: t.pos.y,
            bottom: b.pos.y,
            left: make_edge(t, left),
            right: make_edge(t, right),
        };
        return (1, [trap, empty]);
    }

    // General case: split the long edge t->b at height m.y.
    let split_t = (m.pos.y - t.pos.y) / (b.pos.y - t.pos.y);
    let split = vertex_interp(&t, &b, split_t);

    let (upper, lower) = if split.pos.x < m.pos.x {
        let upper = Trapezoid {
            top: t.pos.y,
            bottom: m.pos.y,
            left: make_edge(t, split),
            right: make_edge(t, m),
        };
        let lower = Trapezoid {
            top: m.pos.y,
            bottom: b.pos.y,
            left: make_edge(split, b),
            right: make_edge(m, b),
        };
        (upper, lower)
    } else {
        let upper = Trapezoid {
            top: t.pos.y,
            bottom: m.pos.y,
            left: make_edge(t, m),
            right: make_edge(t, split),
        };
        let lower = Trapezoid {
            top: m.pos.y,
            bottom: b.pos.y,
            left: make_edge(m, b),
            right: make_edge(split, b),
        };
        (upper, lower)
    };

    (2, [upper, lower])
}

/// Refreshes `left.v` and `right.v` to the vertex interpolated at screen
/// row `y`.
pub fn trapezoid_edge_interp(trap: &mut Trapezoid, y: f32) {
    let left_t = (y - trap.left.v1.pos.y) / (trap.left.v2.pos.y - trap.left.v1.pos.y);
    trap.left.v = vertex_interp(&trap.left.v1, &trap.left.v2, left_t);

    let right_t = (y - trap.right.v1.pos.y) / (trap.right.v2.pos.y - trap.right.v1.pos.y);
    trap.right.v = vertex_interp(&trap.right.v1, &trap.right.v2, right_t);
}

/// Builds the start vertex and per-pixel step for row `y` of `trap`. The
/// trapezoid's edges must already be refreshed for this row via
/// `trapezoid_edge_interp`.
pub fn trapezoid_init_scan_line(trap: &Trapezoid, y: i32) -> Scanline {
    let left_x = (trap.left.v.pos.x + 0.5) as i32;
    let right_x = (trap.right.v.pos.x + 0.5) as i32;
    let width = right_x - left_x;

    let step = if width > 0 {
        vertex_division(&trap.left.v, &trap.right.v, width as f32)
    } else {
        trap.left.v
    };

    Scanline {
        v: trap.left.v,
        step,
        x: left_x,
        y,
        w: width.max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> Vertex {
        Vertex::new(
            Vector4::new(x, y, 0.0, 1.0),
            Texcoord::new(0.0, 0.0),
            Color::new(1.0, 1.0, 1.0),
        )
    }

    #[test]
    fn color_pack_matches_layout() {
        let c = Color::new(1.0, 0.0, 0.0);
        assert_eq!(c.pack(), 0x00FF0000);
    }

    #[test]
    fn vertex_interp_endpoints() {
        let a = v(0.0, 0.0);
        let b = v(10.0, 10.0);
        assert_eq!(vertex_interp(&a, &b, 0.0), a);
        assert_eq!(vertex_interp(&a, &b, 1.0), b);
    }

    #[test]
    fn degenerate_all_y_equal_returns_zero() {
        let (count, _) = trapezoid_init_triangle(v(0.0, 1.0), v(1.0, 1.0), v(2.0, 1.0));
        assert_eq!(count, 0);
    }

    #[test]
    fn degenerate_all_x_equal_returns_zero() {
        let (count, _) = trapezoid_init_triangle(v(3.0, 0.0), v(3.0, 1.0), v(3.0, 2.0));
        assert_eq!(count, 0);
    }

    #[test]
    fn flat_top_returns_one() {
        let (count, traps) = trapezoid_init_triangle(v(0.0, 0.0), v(2.0, 0.0), v(1.0, 2.0));
        assert_eq!(count, 1);
        assert!(traps[0].top < traps[0].bottom);
    }

    #[test]
    fn general_case_returns_two() {
        let (count, traps) = trapezoid_init_triangle(v(0.0, 0.0), v(2.0, 1.0), v(1.0, 2.0));
        assert_eq!(count, 2);
        for t in &traps[..count] {
            assert!(t.top < t.bottom);
            assert_eq!(t.left.v1.pos.y, t.right.v1.pos.y);
            assert_eq!(t.left.v2.pos.y, t.right.v2.pos.y);
            assert!(t.left.v1.pos.x <= t.right.v1.pos.x + 1e-5);
            assert!(t.left.v2.pos.x <= t.right.v2.pos.x + 1e-5);
        }
    }

    #[test]
    fn scan_line_width_matches_endpoints() {
        let mut trap = Trapezoid {
            top: 0.0,
            bottom: 4.0,
            left: make_edge(v(0.0, 0.0), v(0.0, 4.0)),
            right: make_edge(v(4.0, 0.0), v(4.0, 4.0)),
        };
        trapezoid_edge_interp(&mut trap, 2.0);
        let scan = trapezoid_init_scan_line(&trap, 2);
        assert_eq!(scan.x, 0);
        assert_eq!(scan.w, 4);
    }
}
