//! Geometry and per-draw data shared between the scene and the renderer.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use std::mem::{offset_of, size_of};

/// A colored 2D vertex as laid out in the vertex buffer.
///
/// Matches the vertex shader inputs: location 0 is the position,
/// location 1 is the color.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Clip-space position (x, y)
    pub position: [f32; 2],
    /// Linear RGB color
    pub color: [f32; 3],
}

impl Vertex {
    /// Size of one vertex in bytes.
    pub const STRIDE: u32 = size_of::<Self>() as u32;
    /// Byte offset of the position attribute.
    pub const POSITION_OFFSET: u32 = offset_of!(Self, position) as u32;
    /// Byte offset of the color attribute.
    pub const COLOR_OFFSET: u32 = offset_of!(Self, color) as u32;

    /// Create a new vertex.
    #[inline]
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self { position, color }
    }
}

/// One draw call worth of per-object data.
///
/// Supplied fresh every frame by the scene; the renderer pushes the
/// transform as a push constant before each draw.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct DrawItem {
    /// Object-to-world transform consumed by the vertex stage
    pub transform: Mat4,
}

impl DrawItem {
    /// Size of the push-constant block in bytes.
    pub const PUSH_CONSTANT_SIZE: u32 = size_of::<Mat4>() as u32;

    /// Create a draw item from a full transform.
    #[inline]
    pub const fn new(transform: Mat4) -> Self {
        Self { transform }
    }

    /// Create a draw item that only translates.
    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(Mat4::from_translation(translation))
    }

    /// Raw bytes uploaded through the push-constant range.
    #[inline]
    pub fn push_constant_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.transform)
    }
}

impl Default for DrawItem {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        assert_eq!(Vertex::STRIDE, 20);
        assert_eq!(Vertex::POSITION_OFFSET, 0);
        assert_eq!(Vertex::COLOR_OFFSET, 8);
    }

    #[test]
    fn push_constant_block_is_one_matrix() {
        let item = DrawItem::from_translation(Vec3::new(0.2, -0.4, 0.0));
        assert_eq!(DrawItem::PUSH_CONSTANT_SIZE, 64);
        assert_eq!(item.push_constant_bytes().len(), 64);
    }

    #[test]
    fn translation_lands_in_last_column() {
        let item = DrawItem::from_translation(Vec3::new(0.2, -0.4, 0.0));
        let column = item.transform.w_axis;
        approx::assert_relative_eq!(column.x, 0.2);
        approx::assert_relative_eq!(column.y, -0.4);
        approx::assert_relative_eq!(column.w, 1.0);
    }
}
