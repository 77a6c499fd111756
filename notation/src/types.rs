//! The notation document schema.
//!
//! Shader and render-pass notations reuse the device descriptor types
//! directly. Signatures wrap the descriptor with an `Ignored` flag, and
//! pipelines form a tag-dispatched enum keyed on the `Type` field, so a
//! notation file reads:
//!
//! ```json
//! {
//!     "Shaders": [{ "Name": "VS", "Stage": "VERTEX", "Path": "vs.hlsl" }],
//!     "Pipelines": [{
//!         "Type": "GRAPHICS",
//!         "Name": "Opaque",
//!         "VertexShader": "VS",
//!         "PixelShader": "PS"
//!     }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use vermilion_device::types::{
    GraphicsPipelineDesc, PipelineType, RenderPassDesc, ResourceSignatureDesc, ShaderCreateInfo,
};

/// A resource signature declaration.
///
/// `Ignored` excludes the signature from one archive's packed output; the
/// signature is still built (pipelines referencing it must link), but it is
/// expected to ship in a separately distributed archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureNotation {
    #[serde(flatten)]
    pub desc: ResourceSignatureDesc,
    #[serde(rename = "Ignored", default)]
    pub ignored: bool,
}

/// Declaration shared by graphics and mesh pipelines.
///
/// A graphics pipeline uses the vertex/geometry/hull/domain slots, a mesh
/// pipeline the amplification/mesh slots; the enclosing enum variant
/// carries the distinction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GraphicsPipelineNotation {
    pub name: String,
    #[serde(rename = "GraphicsPipeline")]
    pub graphics: GraphicsPipelineDesc,
    pub vertex_shader: Option<String>,
    pub pixel_shader: Option<String>,
    pub geometry_shader: Option<String>,
    pub hull_shader: Option<String>,
    pub domain_shader: Option<String>,
    pub amplification_shader: Option<String>,
    pub mesh_shader: Option<String>,
    pub render_pass: Option<String>,
    pub resource_signatures: Vec<String>,
}

/// Declaration of a compute pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComputePipelineNotation {
    pub name: String,
    pub compute_shader: String,
    #[serde(default)]
    pub resource_signatures: Vec<String>,
}

/// Declaration of a tile pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TilePipelineNotation {
    pub name: String,
    pub tile_shader: String,
    #[serde(default)]
    pub resource_signatures: Vec<String>,
}

/// A named general shader group entry (ray generation, miss or callable).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GeneralShaderGroupNotation {
    pub name: String,
    pub shader: String,
}

/// A named triangle hit group entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TriangleHitShaderGroupNotation {
    pub name: String,
    pub closest_hit_shader: String,
    #[serde(default)]
    pub any_hit_shader: Option<String>,
}

/// A named procedural hit group entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProceduralHitShaderGroupNotation {
    pub name: String,
    pub intersection_shader: String,
    #[serde(default)]
    pub closest_hit_shader: Option<String>,
    #[serde(default)]
    pub any_hit_shader: Option<String>,
}

/// Declaration of a ray-tracing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RayTracingPipelineNotation {
    pub name: String,
    #[serde(default)]
    pub general_shaders: Vec<GeneralShaderGroupNotation>,
    #[serde(default)]
    pub triangle_hit_shaders: Vec<TriangleHitShaderGroupNotation>,
    #[serde(default)]
    pub procedural_hit_shaders: Vec<ProceduralHitShaderGroupNotation>,
    #[serde(default)]
    pub max_recursion_depth: u32,
    #[serde(default)]
    pub resource_signatures: Vec<String>,
}

/// A pipeline declaration of any kind, dispatched on the `Type` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineNotation {
    Graphics(GraphicsPipelineNotation),
    Mesh(GraphicsPipelineNotation),
    Compute(ComputePipelineNotation),
    Tile(TilePipelineNotation),
    RayTracing(RayTracingPipelineNotation),
}

impl PipelineNotation {
    pub fn name(&self) -> &str {
        match self {
            PipelineNotation::Graphics(n) | PipelineNotation::Mesh(n) => &n.name,
            PipelineNotation::Compute(n) => &n.name,
            PipelineNotation::Tile(n) => &n.name,
            PipelineNotation::RayTracing(n) => &n.name,
        }
    }

    pub fn pipeline_type(&self) -> PipelineType {
        match self {
            PipelineNotation::Graphics(_) => PipelineType::Graphics,
            PipelineNotation::Mesh(_) => PipelineType::Mesh,
            PipelineNotation::Compute(_) => PipelineType::Compute,
            PipelineNotation::Tile(_) => PipelineType::Tile,
            PipelineNotation::RayTracing(_) => PipelineType::RayTracing,
        }
    }

    /// Names of the resource signatures this pipeline references.
    pub fn resource_signatures(&self) -> &[String] {
        match self {
            PipelineNotation::Graphics(n) | PipelineNotation::Mesh(n) => &n.resource_signatures,
            PipelineNotation::Compute(n) => &n.resource_signatures,
            PipelineNotation::Tile(n) => &n.resource_signatures,
            PipelineNotation::RayTracing(n) => &n.resource_signatures,
        }
    }
}

/// One parsed notation file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NotationDocument {
    pub imports: Vec<String>,
    pub shaders: Vec<ShaderCreateInfo>,
    pub render_passes: Vec<RenderPassDesc>,
    pub resource_signatures: Vec<SignatureNotation>,
    pub pipelines: Vec<PipelineNotation>,
}
