//! Display pipeline: draws a typed pixel texture through the grading shader.
//!
//! Each view owns one `DisplayPipeline` per [`GpuContext`]. It holds the
//! per-view uniforms plus one render pipeline per texture sample class
//! (unsigned integer, float), since WGSL binds those as different types.

use wgpu::util::DeviceExt;

use super::{LayoutBuilder, QuadPipelineBuilder};
use crate::bindings::display::*;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::texture::{SampleKind, Texture};
use crate::uniform::{DisplayUniform, TransformUniform};
use crate::vertex::{Vertex, QUAD_INDICES, QUAD_VERTICES};

const DISPLAY_UINT_WGSL: &str = concat!(
    include_str!("../shaders/display_common.wgsl"),
    include_str!("../shaders/display_uint.wgsl")
);

const DISPLAY_FLOAT_WGSL: &str = concat!(
    include_str!("../shaders/display_common.wgsl"),
    include_str!("../shaders/display_float.wgsl")
);

/// Region of the render target a view draws into, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ViewRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Clip to a `target_w` x `target_h` surface. `None` when nothing is left.
    pub fn clipped(&self, target_w: u32, target_h: u32) -> Option<Self> {
        let x = self.x.min(target_w);
        let y = self.y.min(target_h);
        let width = self.width.min(target_w - x);
        let height = self.height.min(target_h - y);
        (width > 0 && height > 0).then_some(Self { x, y, width, height })
    }
}

/// Render pipeline and texture layout for one sample class.
struct DisplayVariant {
    render_pipeline: wgpu::RenderPipeline,
    texture_bind_group_layout: wgpu::BindGroupLayout,
}

impl DisplayVariant {
    fn new(
        ctx: &GpuContext,
        label: &str,
        source: &str,
        kind: SampleKind,
        uniform_layout: &wgpu::BindGroupLayout,
    ) -> Result<Self> {
        let texture_bind_group_layout = LayoutBuilder::new(&ctx.device, "Display Texture Layout")
            .pixel_texture(TEXTURE_BINDING, kind)
            .build();

        let render_pipeline = QuadPipelineBuilder::new(&ctx.device, label, ctx.surface_config.format)
            .with_layouts(&[uniform_layout, &texture_bind_group_layout])
            .build(source)?;

        Ok(Self {
            render_pipeline,
            texture_bind_group_layout,
        })
    }
}

/// Grading pipeline plus the uniforms of the view that owns it.
pub struct DisplayPipeline {
    uint: DisplayVariant,
    float: DisplayVariant,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_indices: u32,
    transform_buffer: wgpu::Buffer,
    display_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    context_id: u64,
}

impl DisplayPipeline {
    /// Compile shaders and create buffers for `ctx`.
    ///
    /// Shader or pipeline validation errors are caught with an error scope and
    /// returned as [`GpuError::ShaderCompilation`], which is fatal for the
    /// context.
    pub fn new(ctx: &GpuContext) -> Result<Self> {
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = Self::build(ctx);
        let scope_error = pollster::block_on(ctx.device.pop_error_scope());

        if let Some(err) = scope_error {
            log::error!("Display pipeline failed validation: {}", err);
            return Err(GpuError::ShaderCompilation(err.to_string()));
        }
        let pipeline = built?;
        log::debug!("Display pipeline created for GPU context {}", ctx.id);
        Ok(pipeline)
    }

    fn build(ctx: &GpuContext) -> Result<Self> {
        let transform_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Display Transform Buffer"),
            contents: bytemuck::cast_slice(&[TransformUniform::new()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let display_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Display Parameters Buffer"),
            contents: bytemuck::cast_slice(&[DisplayUniform::identity()]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_layout = LayoutBuilder::new(&ctx.device, "Display Uniform Layout")
            .uniform(UNIFORM_TRANSFORM_BINDING, wgpu::ShaderStages::VERTEX)
            .uniform(UNIFORM_DISPLAY_BINDING, wgpu::ShaderStages::FRAGMENT)
            .build();

        let uniform_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Display Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: UNIFORM_TRANSFORM_BINDING,
                    resource: transform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: UNIFORM_DISPLAY_BINDING,
                    resource: display_buffer.as_entire_binding(),
                },
            ],
        });

        let uint = DisplayVariant::new(
            ctx,
            "Display Pipeline (uint)",
            DISPLAY_UINT_WGSL,
            SampleKind::U8,
            &uniform_layout,
        )?;
        let float = DisplayVariant::new(
            ctx,
            "Display Pipeline (float)",
            DISPLAY_FLOAT_WGSL,
            SampleKind::F32,
            &uniform_layout,
        )?;

        let vertex_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Display Vertex Buffer"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Display Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Ok(Self {
            uint,
            float,
            vertex_buffer,
            index_buffer,
            num_indices: QUAD_INDICES.len() as u32,
            transform_buffer,
            display_buffer,
            uniform_bind_group,
            context_id: ctx.id,
        })
    }

    /// Id of the context these resources belong to.
    pub fn context_id(&self) -> u64 {
        self.context_id
    }

    fn variant(&self, kind: SampleKind) -> &DisplayVariant {
        if kind.is_float() {
            &self.float
        } else {
            &self.uint
        }
    }

    /// Create bind group for a texture
    pub fn create_texture_bind_group(&self, ctx: &GpuContext, texture: &Texture) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Display Texture Bind Group"),
            layout: &self.variant(texture.kind).texture_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: TEXTURE_BINDING,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            }],
        })
    }

    /// Update transform uniform
    pub fn update_transform(&self, ctx: &GpuContext, transform: TransformUniform) {
        ctx.queue
            .write_buffer(&self.transform_buffer, 0, bytemuck::cast_slice(&[transform]));
    }

    /// Update exposure/gamma/channel parameters
    pub fn update_display(&self, ctx: &GpuContext, display: DisplayUniform) {
        ctx.queue
            .write_buffer(&self.display_buffer, 0, bytemuck::cast_slice(&[display]));
    }

    /// Draw the textured quad into `rect` of the current pass.
    pub fn draw(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        kind: SampleKind,
        texture_bind_group: &wgpu::BindGroup,
        rect: ViewRect,
    ) {
        render_pass.set_viewport(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
            0.0,
            1.0,
        );
        render_pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
        render_pass.set_pipeline(&self.variant(kind).render_pipeline);
        render_pass.set_bind_group(UNIFORM_GROUP, &self.uniform_bind_group, &[]);
        render_pass.set_bind_group(TEXTURE_GROUP, texture_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
        render_pass.draw_indexed(0..self.num_indices, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::builder::{check_entry_points, FS_ENTRY, VS_ENTRY};

    #[test]
    fn test_shader_variants_share_entry_points() {
        for (label, src) in [("uint", DISPLAY_UINT_WGSL), ("float", DISPLAY_FLOAT_WGSL)] {
            assert!(check_entry_points(label, src).is_ok());
            assert!(src.contains("fn load_texel"));
        }
        assert!(DISPLAY_UINT_WGSL.contains("texture_2d<u32>"));
        assert!(DISPLAY_FLOAT_WGSL.contains("texture_2d<f32>"));
    }

    #[test]
    fn test_shaders_validate() {
        use naga::valid::{Capabilities, ValidationFlags, Validator};

        for (label, src) in [("uint", DISPLAY_UINT_WGSL), ("float", DISPLAY_FLOAT_WGSL)] {
            let module = naga::front::wgsl::parse_str(src)
                .unwrap_or_else(|e| panic!("{} shader: {}", label, e.emit_to_string(src)));
            Validator::new(ValidationFlags::all(), Capabilities::default())
                .validate(&module)
                .unwrap_or_else(|e| panic!("{} shader invalid: {:?}", label, e));

            let mut entries: Vec<_> = module.entry_points.iter().map(|e| e.name.as_str()).collect();
            entries.sort_unstable();
            assert_eq!(entries, [FS_ENTRY, VS_ENTRY], "{}", label);
        }
    }

    #[test]
    fn test_view_rect_clipping() {
        let r = ViewRect::new(700, 10, 160, 160);
        assert_eq!(r.clipped(800, 600), Some(ViewRect::new(700, 10, 100, 160)));
        assert_eq!(r.clipped(600, 600), None);
        assert_eq!(ViewRect::new(0, 0, 10, 10).clipped(5, 20), Some(ViewRect::new(0, 0, 5, 10)));
    }
}
