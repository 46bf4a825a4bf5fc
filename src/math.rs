// Math kernel: 4-wide vectors and 4x4 matrices, row-major, post-multiplied
// (a vertex is a row vector on the left: v' = v * m).

use na::{Matrix4, RowVector4, Vector3, Vector4};

/// `sqrt(x^2 + y^2 + z^2)`; w is ignored.
pub fn length(v: &Vector4<f32>) -> f32 {
    v.xyz().norm()
}

/// Componentwise add on x,y,z; result w is always 1 (a point).
pub fn add(x: &Vector4<f32>, y: &Vector4<f32>) -> Vector4<f32> {
    Vector4::new(x.x + y.x, x.y + y.y, x.z + y.z, 1.0)
}

/// Componentwise sub on x,y,z; result w is always 1 (a point).
pub fn sub(x: &Vector4<f32>, y: &Vector4<f32>) -> Vector4<f32> {
    Vector4::new(x.x - y.x, x.y - y.y, x.z - y.z, 1.0)
}

/// Dot product over xyz only.
pub fn dot(x: &Vector4<f32>, y: &Vector4<f32>) -> f32 {
    x.xyz().dot(&y.xyz())
}

/// Right-handed cross product; result w is always 1 (a point).
pub fn cross(x: &Vector4<f32>, y: &Vector4<f32>) -> Vector4<f32> {
    let c = x.xyz().cross(&y.xyz());
    Vector4::new(c.x, c.y, c.z, 1.0)
}

/// Componentwise linear interpolation on xyz, `t` in `[0, 1]`; result w is 1.
pub fn interp(a: &Vector4<f32>, b: &Vector4<f32>, t: f32) -> Vector4<f32> {
    Vector4::new(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
        1.0,
    )
}

/// Scale xyz to unit length if `|v| > 0`; a zero-length vector is left
/// unchanged (no panic, no division by zero). w is never touched.
pub fn normalize(v: &Vector4<f32>) -> Vector4<f32> {
    let len = length(v);
    if len > 0.0 {
        let inv = 1.0 / len;
        Vector4::new(v.x * inv, v.y * inv, v.z * inv, v.w)
    } else {
        *v
    }
}

/// Standard 4x4 product, `c = a * b`. `nalgebra`'s `Mul` always produces a
/// fresh matrix, so this tolerates the caller aliasing `c` with `a` or `b`.
pub fn mul(a: &Matrix4<f32>, b: &Matrix4<f32>) -> Matrix4<f32> {
    a * b
}

/// `y = x * m` under the row-vector convention: `x` is treated as a 1x4 row
/// and multiplied on the left. The resulting `w` is the value clipping and
/// the rasterizer key off of.
pub fn apply(x: &Vector4<f32>, m: &Matrix4<f32>) -> Vector4<f32> {
    let row = RowVector4::new(x.x, x.y, x.z, x.w) * m;
    Vector4::new(row[0], row[1], row[2], row[3])
}

pub fn identity() -> Matrix4<f32> {
    Matrix4::identity()
}

pub fn zero() -> Matrix4<f32> {
    Matrix4::zeros()
}

pub fn translate(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Matrix4::from_rows(&[
        RowVector4::new(1.0, 0.0, 0.0, 0.0),
        RowVector4::new(0.0, 1.0, 0.0, 0.0),
        RowVector4::new(0.0, 0.0, 1.0, 0.0),
        RowVector4::new(x, y, z, 1.0),
    ])
}

pub fn scale(x: f32, y: f32, z: f32) -> Matrix4<f32> {
    Matrix4::from_rows(&[
        RowVector4::new(x, 0.0, 0.0, 0.0),
        RowVector4::new(0.0, y, 0.0, 0.0),
        RowVector4::new(0.0, 0.0, z, 0.0),
        RowVector4::new(0.0, 0.0, 0.0, 1.0),
    ])
}

/// Rotation of `theta` radians about the axis `(x, y, z)` (axis-angle,
/// Rodrigues form). The axis is taken as given, not normalized here — the
/// caller normalizes if needed, per spec.
pub fn rotate(x: f32, y: f32, z: f32, theta: f32) -> Matrix4<f32> {
    let axis = Vector3::new(x, y, z);
    let len = axis.norm();
    let (nx, ny, nz) = if len > 0.0 {
        (x / len, y / len, z / len)
    } else {
        (x, y, z)
    };

    let c = theta.cos();
    let s = theta.sin();
    let one_minus_c = 1.0 - c;

    Matrix4::from_rows(&[
        RowVector4::new(
            nx * nx * one_minus_c + c,
            nx * ny * one_minus_c + nz * s,
            nx * nz * one_minus_c - ny * s,
            0.0,
        ),
        RowVector4::new(
            nx * ny * one_minus_c - nz * s,
            ny * ny * one_minus_c + c,
            ny * nz * one_minus_c + nx * s,
            0.0,
        ),
        RowVector4::new(
            nx * nz * one_minus_c + ny * s,
            ny * nz * one_minus_c - nx * s,
            nz * nz * one_minus_c + c,
            0.0,
        ),
        RowVector4::new(0.0, 0.0, 0.0, 1.0),
    ])
}

/// Right-handed view transform: translate world by `-eye`, then rotate into
/// the `{right, up, forward}` basis built from `forward = normalize(at -
/// eye)`, `right = normalize(up x forward)`, `upN = forward x right`.
pub fn look_at(eye: &Vector3<f32>, at: &Vector3<f32>, up: &Vector3<f32>) -> Matrix4<f32> {
    let forward = (at - eye).normalize();
    let right = up.cross(&forward).normalize();
    let up_n = forward.cross(&right);

    let rotation = Matrix4::from_rows(&[
        RowVector4::new(right.x, up_n.x, forward.x, 0.0),
        RowVector4::new(right.y, up_n.y, forward.y, 0.0),
        RowVector4::new(right.z, up_n.z, forward.z, 0.0),
        RowVector4::new(0.0, 0.0, 0.0, 1.0),
    ]);

    let translation = translate(-eye.x, -eye.y, -eye.z);
    mul(&translation, &rotation)
}

/// Left-handed perspective projection into the clip cube `x,y in [-w,w]`,
/// `z in [0,w]` (row-vector convention, `m[2][3] = 1`, `m[3][3] = 0`).
pub fn perspective(fovy: f32, aspect: f32, zn: f32, zf: f32) -> Matrix4<f32> {
    let cot = 1.0 / (fovy * 0.5).tan();
    Matrix4::from_rows(&[
        RowVector4::new(cot / aspect, 0.0, 0.0, 0.0),
        RowVector4::new(0.0, cot, 0.0, 0.0),
        RowVector4::new(0.0, 0.0, zf / (zf - zn), 1.0),
        RowVector4::new(0.0, 0.0, -zn * zf / (zf - zn), 0.0),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn close(a: f32, b: f32, eps: f32) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn length_ignores_w() {
        let v = Vector4::new(3.0, 4.0, 0.0, 99.0);
        assert!(close(length(&v), 5.0, 1e-6));
    }

    #[test]
    fn normalize_zero_is_noop() {
        let v = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let n = normalize(&v);
        assert_eq!(n.x, 0.0);
        assert_eq!(n.y, 0.0);
        assert_eq!(n.z, 0.0);
    }

    #[test]
    fn normalize_unit_length() {
        let v = Vector4::new(3.0, 0.0, 4.0, 1.0);
        let n = normalize(&v);
        assert!(close(length(&n), 1.0, 1e-6));
    }

    #[test]
    fn apply_identity_is_noop() {
        let x = Vector4::new(1.0, 2.0, 3.0, 4.0);
        let y = apply(&x, &identity());
        assert_eq!(y, x);
    }

    #[test]
    fn mul_associative() {
        let a = translate(1.0, 2.0, 3.0);
        let b = scale(2.0, 2.0, 2.0);
        let c = rotate(0.0, 1.0, 0.0, 0.4);
        let lhs = mul(&mul(&a, &b), &c);
        let rhs = mul(&a, &mul(&b, &c));
        for i in 0..4 {
            for j in 0..4 {
                assert!(close(lhs[(i, j)], rhs[(i, j)], 1e-4));
            }
        }
    }

    #[test]
    fn mul_tolerates_aliasing() {
        let a = rotate(1.0, 0.0, 0.0, 0.7);
        let b = translate(1.0, 0.0, 0.0);
        let mut c = a;
        c = mul(&c, &b);
        let expected = mul(&a, &b);
        assert_eq!(c, expected);
    }

    #[test]
    fn interp_endpoints() {
        let a = Vector4::new(0.0, 0.0, 0.0, 1.0);
        let b = Vector4::new(10.0, 20.0, 30.0, 1.0);
        assert_eq!(interp(&a, &b, 0.0), a);
        assert_eq!(interp(&a, &b, 1.0), b);
    }

    #[test]
    fn perspective_has_expected_entries() {
        let fovy = PI / 2.0;
        let (zn, zf) = (1.0, 500.0);
        let m = perspective(fovy, 1.0, zn, zf);
        let cot = 1.0 / (fovy * 0.5).tan();
        assert!(close(m[(0, 0)], cot, 1e-5));
        assert!(close(m[(1, 1)], cot, 1e-5));
        assert!(close(m[(2, 2)], zf / (zf - zn), 1e-5));
        assert!(close(m[(3, 2)], -zn * zf / (zf - zn), 1e-5));
        assert_eq!(m[(2, 3)], 1.0);
        assert_eq!(m[(3, 3)], 0.0);
    }
}
