//! Software 3D rasterizer: transform stack, homogeneous clipping, triangle
//! to trapezoid decomposition, perspective-correct scanline shading, and a
//! device owning the framebuffer/z-buffer/texture.

extern crate nalgebra as na;

pub mod device;
pub mod math;
pub mod transform;
pub mod vertex;

pub use device::{Device, DeviceError, CCW_CULLING, COLOR, TEXTURE, WIREFRAME};
pub use transform::Transform;
pub use vertex::{Color, Texcoord, Vertex};
