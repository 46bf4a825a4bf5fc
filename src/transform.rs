// Transform stage: world * view * projection, clip-volume acceptance test,
// and homogenization into screen coordinates.

use crate::math;
use na::Vector4;
use std::f32::consts::PI;

/// Bit set by `check_cvv` when the x coordinate is below `-w`.
pub const CVV_X_LT: u32 = 1 << 0;
/// Bit set by `check_cvv` when the x coordinate is above `w`.
pub const CVV_X_GT: u32 = 1 << 1;
/// Bit set by `check_cvv` when the y coordinate is below `-w`.
pub const CVV_Y_LT: u32 = 1 << 2;
/// Bit set by `check_cvv` when the y coordinate is above `w`.
pub const CVV_Y_GT: u32 = 1 << 3;
/// Bit set by `check_cvv` when the z coordinate is below `0`.
pub const CVV_Z_LT: u32 = 1 << 4;
/// Bit set by `check_cvv` when the z coordinate is above `w`.
pub const CVV_Z_GT: u32 = 1 << 5;

/// `{ world, view, projection, transform, w, h }`. `transform = world *
/// view * projection`; `transform_update` must be called after world, view,
/// or projection change (the constructor and `set_*` helpers do this for
/// you).
#[derive(Copy, Clone, Debug)]
pub struct Transform {
    pub world: na::Matrix4<f32>,
    pub view: na::Matrix4<f32>,
    pub projection: na::Matrix4<f32>,
    pub transform: na::Matrix4<f32>,
    pub w: f32,
    pub h: f32,
}

impl Transform {
    /// World and view start as identity; projection is perspective with
    /// `fovy = pi/2`, `aspect = width/height`, `zn = 1.0`, `zf = 500.0`.
    pub fn new(width: f32, height: f32) -> Transform {
        let mut t = Transform {
            world: math::identity(),
            view: math::identity(),
            projection: math::perspective(PI / 2.0, width / height, 1.0, 500.0),
            transform: math::identity(),
            w: width,
            h: height,
        };
        t.update();
        t
    }

    /// `transform = world * view * projection`.
    pub fn update(&mut self) {
        self.transform = math::mul(&math::mul(&self.world, &self.view), &self.projection);
    }

    /// `y = x * transform`. Output is homogeneous clip space; `y.w` is the
    /// projective divisor.
    pub fn apply(&self, x: &Vector4<f32>) -> Vector4<f32> {
        math::apply(x, &self.transform)
    }
}

/// Returns 0 iff `v` lies in the clip cube `-w <= x,y <= w`, `0 <= z <= w`;
/// otherwise the bits above indicate which half-space(s) were violated.
pub fn check_cvv(v: &Vector4<f32>) -> u32 {
    let w = v.w;
    let mut mask = 0;
    if v.x < -w {
        mask |= CVV_X_LT;
    }
    if v.x > w {
        mask |= CVV_X_GT;
    }
    if v.y < -w {
        mask |= CVV_Y_LT;
    }
    if v.y > w {
        mask |= CVV_Y_GT;
    }
    if v.z < 0.0 {
        mask |= CVV_Z_LT;
    }
    if v.z > w {
        mask |= CVV_Z_GT;
    }
    mask
}

/// Projects a clip-space vertex to screen space: `rhw = 1/x.w`; `y.x = (x.x
/// * rhw + 1) * w/2`; `y.y = (1 - x.y * rhw) * h/2` (Y flipped so clip +Y
/// maps to screen -Y, origin top-left); `y.z = x.z * rhw`; `y.w = rhw`.
pub fn transform_homogenize(x: &Vector4<f32>, screen_w: f32, screen_h: f32) -> Vector4<f32> {
    let rhw = 1.0 / x.w;
    Vector4::new(
        (x.x * rhw + 1.0) * screen_w * 0.5,
        (1.0 - x.y * rhw) * screen_h * 0.5,
        x.z * rhw,
        rhw,
    )
}

/// Nonzero (cull) when the 2D signed area of the screen-space triangle is
/// `<= 0` under a counter-clockwise-front convention.
pub fn check_ccw_culling(p1: &Vector4<f32>, p2: &Vector4<f32>, p3: &Vector4<f32>) -> bool {
    let area = (p2.x - p1.x) * (p3.y - p1.y) - (p2.y - p1.y) * (p3.x - p1.x);
    area <= 0.0
}
