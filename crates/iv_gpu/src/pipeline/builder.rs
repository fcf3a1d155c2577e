//! Builders for textured-quad pipelines and their bind group layouts.
//!
//! Every iv pipeline draws [`QUAD_VERTICES`](crate::vertex::QUAD_VERTICES)
//! with one colour target, so the vertex layout, topology and entry points
//! are fixed here and only the shader source and layouts vary.

use crate::error::{GpuError, Result};
use crate::texture::SampleKind;
use crate::vertex::Vertex;

/// Vertex entry point every quad shader defines.
pub const VS_ENTRY: &str = "vs_main";
/// Fragment entry point every quad shader defines.
pub const FS_ENTRY: &str = "fs_main";

/// WGSL binding type for a pixel texture of `kind`.
///
/// Integer textures bind as `texture_2d<u32>`; 32-bit floats are not
/// filterable without an extra feature, so all lanes are read with
/// `textureLoad`.
pub fn texture_sample_type(kind: SampleKind) -> wgpu::TextureSampleType {
    if kind.is_float() {
        wgpu::TextureSampleType::Float { filterable: false }
    } else {
        wgpu::TextureSampleType::Uint
    }
}

/// Check that `source` declares both quad entry points.
///
/// wgpu only reports a missing entry point as a validation error at pipeline
/// creation, which is harder to attribute.
pub fn check_entry_points(label: &str, source: &str) -> Result<()> {
    for entry in [VS_ENTRY, FS_ENTRY] {
        if !source.contains(&format!("fn {}", entry)) {
            return Err(GpuError::ShaderCompilation(format!(
                "{}: missing entry point `{}`",
                label, entry
            )));
        }
    }
    Ok(())
}

/// Builds a render pipeline that draws the unit quad into one colour target.
///
/// ```ignore
/// let pipeline = QuadPipelineBuilder::new(&device, "Display", format)
///     .with_layouts(&[&uniform_layout, &texture_layout])
///     .build(DISPLAY_UINT_WGSL)?;
/// ```
pub struct QuadPipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: &'a str,
    format: wgpu::TextureFormat,
    layouts: Vec<&'a wgpu::BindGroupLayout>,
}

impl<'a> QuadPipelineBuilder<'a> {
    /// Opaque pipeline writing to `format`.
    pub fn new(device: &'a wgpu::Device, label: &'a str, format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            label,
            format,
            layouts: Vec::new(),
        }
    }

    /// Bind group layouts in group order.
    pub fn with_layouts(mut self, layouts: &[&'a wgpu::BindGroupLayout]) -> Self {
        self.layouts = layouts.to_vec();
        self
    }

    /// Compile `source` and create the pipeline.
    pub fn build(self, source: &str) -> Result<wgpu::RenderPipeline> {
        check_entry_points(self.label, source)?;

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(self.label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let layout_label = format!("{} Layout", self.label);
        let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&layout_label),
            bind_group_layouts: &self.layouts,
            push_constant_ranges: &[],
        });

        let targets = [Some(wgpu::ColorTargetState {
            format: self.format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(self.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(VS_ENTRY),
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(FS_ENTRY),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            // Triangle list, no culling: the quad may be mirrored by the transform
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        log::trace!("Created pipeline '{}' for {:?}", self.label, self.format);
        Ok(pipeline)
    }
}

/// Collects bind group layout entries for uniforms and pixel textures.
pub struct LayoutBuilder<'a> {
    device: &'a wgpu::Device,
    label: &'a str,
    entries: Vec<wgpu::BindGroupLayoutEntry>,
}

impl<'a> LayoutBuilder<'a> {
    pub fn new(device: &'a wgpu::Device, label: &'a str) -> Self {
        Self {
            device,
            label,
            entries: Vec::new(),
        }
    }

    /// Uniform buffer at `binding`.
    pub fn uniform(mut self, binding: u32, visibility: wgpu::ShaderStages) -> Self {
        self.entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
        self
    }

    /// Fragment-stage pixel texture of `kind` at `binding`. No sampler.
    pub fn pixel_texture(mut self, binding: u32, kind: SampleKind) -> Self {
        self.entries.push(wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: texture_sample_type(kind),
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        self
    }

    pub fn build(self) -> wgpu::BindGroupLayout {
        self.device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(self.label),
                entries: &self.entries,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_types() {
        assert_eq!(
            texture_sample_type(SampleKind::U8),
            wgpu::TextureSampleType::Uint
        );
        assert_eq!(
            texture_sample_type(SampleKind::U16),
            wgpu::TextureSampleType::Uint
        );
        assert_eq!(
            texture_sample_type(SampleKind::F32),
            wgpu::TextureSampleType::Float { filterable: false }
        );
    }

    #[test]
    fn test_entry_point_check() {
        assert!(check_entry_points("ok", "fn vs_main() {} fn fs_main() {}").is_ok());
        let err = check_entry_points("half", "fn vs_main() {}").unwrap_err();
        assert!(matches!(err, GpuError::ShaderCompilation(msg) if msg.contains("fs_main")));
    }
}
