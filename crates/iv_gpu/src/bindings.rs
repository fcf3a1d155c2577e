//! Shader binding constants.
//!
//! Binding numbers shared between Rust code and the WGSL display shaders.
//! The shaders hardcode the same numbers:
//!
//! ```wgsl
//! @group(0) @binding(0)  // UNIFORM_GROUP, UNIFORM_TRANSFORM_BINDING
//! var<uniform> transform: Transform;
//! @group(1) @binding(0)  // TEXTURE_GROUP, TEXTURE_BINDING
//! var image: texture_2d<u32>;
//! ```

/// Binding constants for the display pipeline.
pub mod display {
    /// Group 0: Uniforms
    pub const UNIFORM_GROUP: u32 = 0;
    /// Binding 0 in group 0: Transform matrix uniform
    pub const UNIFORM_TRANSFORM_BINDING: u32 = 0;
    /// Binding 1 in group 0: Display (exposure/gamma/channel) uniform
    pub const UNIFORM_DISPLAY_BINDING: u32 = 1;

    /// Group 1: Texture resources
    pub const TEXTURE_GROUP: u32 = 1;
    /// Binding 0 in group 1: pixel texture, read with `textureLoad`
    pub const TEXTURE_BINDING: u32 = 0;
}
