//! Pipeline state descriptor types.

use serde::{Deserialize, Serialize};

use super::render_pass::TextureFormat;

/// The five pipeline kinds.
///
/// Graphics and Mesh pipelines share one descriptor shape and are
/// distinguished only by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineType {
    Graphics,
    Mesh,
    Compute,
    Tile,
    RayTracing,
}

impl PipelineType {
    /// Probe order used when a lookup does not specify a pipeline type:
    /// the first kind that has an entry under the requested name wins.
    pub const PROBE_ORDER: [PipelineType; 5] = [
        PipelineType::Graphics,
        PipelineType::Mesh,
        PipelineType::Compute,
        PipelineType::RayTracing,
        PipelineType::Tile,
    ];

    /// Lowercase name, used as the directory name in bytecode dumps.
    pub fn name(self) -> &'static str {
        match self {
            PipelineType::Graphics => "graphics",
            PipelineType::Mesh => "mesh",
            PipelineType::Compute => "compute",
            PipelineType::Tile => "tile",
            PipelineType::RayTracing => "ray_tracing",
        }
    }
}

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

impl Default for PrimitiveTopology {
    fn default() -> Self {
        PrimitiveTopology::TriangleList
    }
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CullMode {
    None,
    Front,
    Back,
}

impl Default for CullMode {
    fn default() -> Self {
        CullMode::Back
    }
}

/// Depth/stencil comparison function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonFunc {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl Default for ComparisonFunc {
    fn default() -> Self {
        ComparisonFunc::Less
    }
}

/// Blend factor for source/destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
}

/// Depth/stencil state of a graphics pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DepthStencilDesc {
    pub depth_enable: bool,
    pub depth_write_enable: bool,
    pub depth_func: ComparisonFunc,
}

impl Default for DepthStencilDesc {
    fn default() -> Self {
        Self {
            depth_enable: true,
            depth_write_enable: true,
            depth_func: ComparisonFunc::default(),
        }
    }
}

/// Blend state of a graphics pipeline (single render-target blend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BlendDesc {
    pub blend_enable: bool,
    pub src_blend: BlendFactor,
    pub dest_blend: BlendFactor,
}

impl Default for BlendDesc {
    fn default() -> Self {
        Self {
            blend_enable: false,
            src_blend: BlendFactor::One,
            dest_blend: BlendFactor::Zero,
        }
    }
}

/// Fixed-function state of a graphics or mesh pipeline.
///
/// This is the mutable part of a live pipeline: hot reload patches this
/// descriptor in place on an existing pipeline object without changing
/// the object's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GraphicsPipelineDesc {
    pub primitive_topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub front_counter_clockwise: bool,
    pub depth_stencil: DepthStencilDesc,
    pub blend: BlendDesc,
    pub num_render_targets: u8,
    pub rtv_formats: Vec<TextureFormat>,
    pub dsv_format: Option<TextureFormat>,
    pub sample_count: u32,
}

impl Default for GraphicsPipelineDesc {
    fn default() -> Self {
        Self {
            primitive_topology: PrimitiveTopology::default(),
            cull_mode: CullMode::default(),
            front_counter_clockwise: false,
            depth_stencil: DepthStencilDesc::default(),
            blend: BlendDesc::default(),
            num_render_targets: 0,
            rtv_formats: Vec::new(),
            dsv_format: None,
            sample_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_order_covers_every_type() {
        assert_eq!(PipelineType::PROBE_ORDER.len(), 5);
        assert_eq!(PipelineType::PROBE_ORDER[0], PipelineType::Graphics);
        assert_eq!(PipelineType::PROBE_ORDER[4], PipelineType::Tile);
    }

    #[test]
    fn graphics_desc_partial_json() {
        let desc: GraphicsPipelineDesc = serde_json::from_str(
            r#"{
                "PrimitiveTopology": "TRIANGLE_STRIP",
                "CullMode": "NONE",
                "NumRenderTargets": 2,
                "RtvFormats": ["RGBA8_UNORM", "RGBA16_FLOAT"],
                "DepthStencil": { "DepthFunc": "LESS_EQUAL" }
            }"#,
        )
        .unwrap();
        assert_eq!(desc.primitive_topology, PrimitiveTopology::TriangleStrip);
        assert_eq!(desc.cull_mode, CullMode::None);
        assert_eq!(desc.num_render_targets, 2);
        assert_eq!(desc.depth_stencil.depth_func, ComparisonFunc::LessEqual);
        // Untouched fields keep their defaults.
        assert!(desc.depth_stencil.depth_enable);
        assert_eq!(desc.sample_count, 1);
    }
}
