//! The triangle every draw item instances.

use ash::vk;
use gpu_allocator::MemoryLocation;
use prism_core::Vertex;
use prism_gpu::{GpuBuffer, GpuContext, Result};

/// A small triangle centred on the origin in clip space.
pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex::new([0.0, -0.05], [1.0, 0.0, 0.0]),
    Vertex::new([0.05, 0.05], [0.0, 1.0, 0.0]),
    Vertex::new([-0.05, 0.05], [0.0, 0.0, 1.0]),
];

/// Host-visible vertex buffer holding one mesh.
pub struct TriangleMesh {
    pub buffer: GpuBuffer,
    pub vertex_count: u32,
}

impl TriangleMesh {
    /// Upload the standard triangle.
    pub fn triangle(gpu: &GpuContext) -> Result<Self> {
        Self::upload(gpu, &TRIANGLE_VERTICES)
    }

    /// Copy vertices into a new vertex buffer.
    pub fn upload(gpu: &GpuContext, vertices: &[Vertex]) -> Result<Self> {
        let size = std::mem::size_of_val(vertices) as u64;
        let mut allocator = gpu.allocator().lock();

        let mut buffer = allocator.create_buffer(
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
            "triangle vertices",
        )?;

        if let Err(e) = buffer.write(vertices) {
            // Best effort, the write error is the one worth reporting
            let _ = allocator.free_buffer(&mut buffer);
            return Err(e);
        }

        Ok(Self {
            buffer,
            vertex_count: vertices.len() as u32,
        })
    }

    /// Release the vertex buffer.
    pub fn destroy(&mut self, gpu: &GpuContext) -> Result<()> {
        gpu.allocator().lock().free_buffer(&mut self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangle_has_one_primary_color_per_corner() {
        let colors: Vec<[f32; 3]> = TRIANGLE_VERTICES.iter().map(|v| v.color).collect();
        assert_eq!(
            colors,
            vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
        );
    }

    #[test]
    fn triangle_winds_clockwise_on_screen() {
        // Framebuffer y points down, so a positive signed area is clockwise
        let [a, b, c] = TRIANGLE_VERTICES.map(|v| v.position);
        let area = (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1]);
        assert!(area > 0.0);
    }

    #[test]
    fn triangle_fits_between_grid_points() {
        assert!(TRIANGLE_VERTICES
            .iter()
            .all(|v| v.position[0].abs() <= 0.1 && v.position[1].abs() <= 0.1));
    }
}
