//! Render pass and graphics pipeline.
//!
//! The pipeline draws [`Vertex`] triangle lists into a single colour
//! attachment, with one [`DrawItem`] transform per draw supplied as a
//! vertex-stage push constant. Viewport and scissor are dynamic so the
//! pipeline survives a resize; only a change of swapchain format requires
//! building a new [`PipelineState`].

use crate::error::{GpuError, Result};
use crate::shader::load_shader_module;
use ash::vk;
use prism_core::{DrawItem, Vertex};
use std::path::PathBuf;

/// Directory the build script compiles `shaders/*.{vert,frag}` into.
pub const COMPILED_SHADER_DIR: &str = env!("PRISM_SPIRV_DIR");

/// Shader paths for the graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphicsPipelineConfig {
    /// Compiled SPIR-V vertex shader.
    pub vertex_shader: PathBuf,
    /// Compiled SPIR-V fragment shader.
    pub fragment_shader: PathBuf,
}

impl GraphicsPipelineConfig {
    /// Use `triangle.vert.spv` and `triangle.frag.spv` from a directory.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            vertex_shader: dir.join("triangle.vert.spv"),
            fragment_shader: dir.join("triangle.frag.spv"),
        }
    }
}

impl Default for GraphicsPipelineConfig {
    fn default() -> Self {
        Self::from_dir(COMPILED_SHADER_DIR)
    }
}

/// Vertex buffer binding for [`Vertex`].
pub fn vertex_binding_description() -> vk::VertexInputBindingDescription {
    vk::VertexInputBindingDescription {
        binding: 0,
        stride: Vertex::STRIDE,
        input_rate: vk::VertexInputRate::VERTEX,
    }
}

/// Position and colour attributes of [`Vertex`].
pub fn vertex_attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: Vertex::POSITION_OFFSET,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: Vertex::COLOR_OFFSET,
        },
    ]
}

/// Per-draw transform, visible to the vertex stage.
pub fn push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX,
        offset: 0,
        size: DrawItem::PUSH_CONSTANT_SIZE,
    }
}

/// The single colour attachment: cleared on load, stored, then presented.
pub fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription {
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
        ..Default::default()
    }
}

/// Orders the first colour write after the presentation engine has
/// released the image.
pub fn subpass_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ..Default::default()
    }
}

/// Create the render pass for a swapchain format.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_render_pass(device: &ash::Device, format: vk::Format) -> Result<vk::RenderPass> {
    let attachments = [color_attachment(format)];
    let color_refs = [vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    }];
    let subpasses = [vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs)];
    let dependencies = [subpass_dependency()];

    let create_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    unsafe { device.create_render_pass(&create_info, None) }
        .map_err(|e| GpuError::PipelineCreation(format!("render pass: {e}")))
}

/// Render pass, layout and pipeline for one swapchain format.
pub struct PipelineState {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    pub format: vk::Format,
}

impl PipelineState {
    /// Build the render pass and graphics pipeline.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(
        device: &ash::Device,
        config: &GraphicsPipelineConfig,
        format: vk::Format,
    ) -> Result<Self> {
        let vert_module = unsafe { load_shader_module(device, &config.vertex_shader)? };
        let frag_module = match unsafe { load_shader_module(device, &config.fragment_shader) } {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.destroy_shader_module(vert_module, None) };
                return Err(e);
            }
        };

        let result = unsafe { Self::build(device, vert_module, frag_module, format) };

        // Modules are only needed during pipeline creation
        unsafe {
            device.destroy_shader_module(vert_module, None);
            device.destroy_shader_module(frag_module, None);
        }

        if result.is_ok() {
            tracing::debug!("Graphics pipeline created for {format:?}");
        }
        result
    }

    unsafe fn build(
        device: &ash::Device,
        vert_module: vk::ShaderModule,
        frag_module: vk::ShaderModule,
        format: vk::Format,
    ) -> Result<Self> {
        let push_constants = [push_constant_range()];
        let layout_info = vk::PipelineLayoutCreateInfo::default().push_constant_ranges(&push_constants);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| GpuError::PipelineCreation(format!("layout: {e}")))?;

        let render_pass = match unsafe { create_render_pass(device, format) } {
            Ok(render_pass) => render_pass,
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(e);
            }
        };

        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(vert_module)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(frag_module)
                .name(c"main"),
        ];

        let bindings = [vertex_binding_description()];
        let attributes = vertex_attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport (dynamic)
        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false)
            .line_width(1.0);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1)
            .sample_shading_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };

        match pipelines {
            Ok(pipelines) => Ok(Self {
                layout,
                render_pass,
                pipeline: pipelines[0],
                format,
            }),
            Err((_, e)) => {
                unsafe {
                    device.destroy_render_pass(render_pass, None);
                    device.destroy_pipeline_layout(layout, None);
                }
                Err(GpuError::PipelineCreation(e.to_string()))
            }
        }
    }

    /// Destroy the pipeline, render pass and layout.
    ///
    /// # Safety
    /// The device must be valid and no command buffer may still reference
    /// the pipeline or render pass.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_pipeline(self.pipeline, None);
            device.destroy_render_pass(self.render_pass, None);
            device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn vertex_layout_matches_vertex_type() {
        let binding = vertex_binding_description();
        assert_eq!(binding.stride, 20);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);

        let [position, color] = vertex_attribute_descriptions();
        assert_eq!((position.location, position.offset), (0, 0));
        assert_eq!(position.format, vk::Format::R32G32_SFLOAT);
        assert_eq!((color.location, color.offset), (1, 8));
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn push_constant_holds_one_matrix() {
        let range = push_constant_range();
        assert_eq!(range.size, 64);
        assert_eq!(range.offset, 0);
        assert_eq!(range.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn attachment_ends_ready_for_present() {
        let attachment = color_attachment(vk::Format::B8G8R8A8_UNORM);
        assert_eq!(attachment.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn dependency_waits_on_external_color_output() {
        let dependency = subpass_dependency();
        assert_eq!(dependency.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dependency.dst_subpass, 0);
        assert_eq!(
            dependency.dst_stage_mask,
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );
        assert_eq!(dependency.dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn config_from_dir() {
        let config = GraphicsPipelineConfig::from_dir("assets/spv");
        assert_eq!(config.vertex_shader, Path::new("assets/spv/triangle.vert.spv"));
        assert_eq!(config.fragment_shader, Path::new("assets/spv/triangle.frag.spv"));
        assert_eq!(
            GraphicsPipelineConfig::default(),
            GraphicsPipelineConfig::from_dir(COMPILED_SHADER_DIR)
        );
    }

    #[test]
    fn default_shaders_are_built_spirv() {
        let config = GraphicsPipelineConfig::default();
        for path in [&config.vertex_shader, &config.fragment_shader] {
            assert!(path.is_file(), "{} missing", path.display());
            let words = crate::shader::read_spirv(path).unwrap();
            assert!(words.len() > 5);
        }
    }
}
