//! Pipeline state creation descriptors.
//!
//! Unlike the plain descriptor structs, create infos reference already
//! constructed engine objects (`Arc<Shader>`, `Arc<RenderPass>` and so on),
//! so they are not serializable. The notation layer builds them from the
//! JSON declarations after resolving every dependency by name.

use std::sync::Arc;

use crate::objects::{RenderPass, ResourceSignature, Shader};
use crate::types::pipeline::{GraphicsPipelineDesc, PipelineType};

/// Creation descriptor for graphics and mesh pipelines.
///
/// The two kinds share a shape: a graphics pipeline uses the
/// vertex/geometry/hull/domain stages, a mesh pipeline the
/// amplification/mesh stages. Both use the pixel stage.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineCreateInfo {
    pub name: String,
    pub pipeline_type: PipelineType,
    pub graphics: GraphicsPipelineDesc,
    pub vertex_shader: Option<Arc<Shader>>,
    pub pixel_shader: Option<Arc<Shader>>,
    pub geometry_shader: Option<Arc<Shader>>,
    pub hull_shader: Option<Arc<Shader>>,
    pub domain_shader: Option<Arc<Shader>>,
    pub amplification_shader: Option<Arc<Shader>>,
    pub mesh_shader: Option<Arc<Shader>>,
    pub render_pass: Option<Arc<RenderPass>>,
    pub resource_signatures: Vec<Arc<ResourceSignature>>,
}

impl GraphicsPipelineCreateInfo {
    /// Every attached shader, in stage order, skipping unset slots.
    pub fn shaders(&self) -> Vec<Arc<Shader>> {
        [
            &self.vertex_shader,
            &self.pixel_shader,
            &self.geometry_shader,
            &self.hull_shader,
            &self.domain_shader,
            &self.amplification_shader,
            &self.mesh_shader,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

/// Creation descriptor for compute pipelines.
#[derive(Debug, Clone)]
pub struct ComputePipelineCreateInfo {
    pub name: String,
    pub compute_shader: Arc<Shader>,
    pub resource_signatures: Vec<Arc<ResourceSignature>>,
}

/// Creation descriptor for tile pipelines.
#[derive(Debug, Clone)]
pub struct TilePipelineCreateInfo {
    pub name: String,
    pub tile_shader: Arc<Shader>,
    pub resource_signatures: Vec<Arc<ResourceSignature>>,
}

/// A named general shader group (ray generation, miss or callable).
#[derive(Debug, Clone)]
pub struct GeneralShaderGroup {
    pub name: String,
    pub shader: Arc<Shader>,
}

/// A named hit group for triangle geometry.
#[derive(Debug, Clone)]
pub struct TriangleHitShaderGroup {
    pub name: String,
    pub closest_hit_shader: Arc<Shader>,
    pub any_hit_shader: Option<Arc<Shader>>,
}

/// A named hit group for procedural geometry.
#[derive(Debug, Clone)]
pub struct ProceduralHitShaderGroup {
    pub name: String,
    pub intersection_shader: Arc<Shader>,
    pub closest_hit_shader: Option<Arc<Shader>>,
    pub any_hit_shader: Option<Arc<Shader>>,
}

/// Creation descriptor for ray-tracing pipelines.
#[derive(Debug, Clone)]
pub struct RayTracingPipelineCreateInfo {
    pub name: String,
    pub general_shaders: Vec<GeneralShaderGroup>,
    pub triangle_hit_shaders: Vec<TriangleHitShaderGroup>,
    pub procedural_hit_shaders: Vec<ProceduralHitShaderGroup>,
    pub max_recursion_depth: u32,
    pub resource_signatures: Vec<Arc<ResourceSignature>>,
}

impl RayTracingPipelineCreateInfo {
    /// Every shader referenced by any group, in group order.
    pub fn shaders(&self) -> Vec<Arc<Shader>> {
        let mut shaders = Vec::new();
        for group in &self.general_shaders {
            shaders.push(group.shader.clone());
        }
        for group in &self.triangle_hit_shaders {
            shaders.push(group.closest_hit_shader.clone());
            if let Some(any_hit) = &group.any_hit_shader {
                shaders.push(any_hit.clone());
            }
        }
        for group in &self.procedural_hit_shaders {
            shaders.push(group.intersection_shader.clone());
            if let Some(closest_hit) = &group.closest_hit_shader {
                shaders.push(closest_hit.clone());
            }
            if let Some(any_hit) = &group.any_hit_shader {
                shaders.push(any_hit.clone());
            }
        }
        shaders
    }
}

/// Creation descriptor for any pipeline kind.
#[derive(Debug, Clone)]
pub enum PipelineStateCreateInfo {
    /// Covers both graphics and mesh pipelines; the embedded
    /// `pipeline_type` distinguishes them.
    Graphics(GraphicsPipelineCreateInfo),
    Compute(ComputePipelineCreateInfo),
    Tile(TilePipelineCreateInfo),
    RayTracing(RayTracingPipelineCreateInfo),
}

impl PipelineStateCreateInfo {
    pub fn name(&self) -> &str {
        match self {
            PipelineStateCreateInfo::Graphics(ci) => &ci.name,
            PipelineStateCreateInfo::Compute(ci) => &ci.name,
            PipelineStateCreateInfo::Tile(ci) => &ci.name,
            PipelineStateCreateInfo::RayTracing(ci) => &ci.name,
        }
    }

    pub fn pipeline_type(&self) -> PipelineType {
        match self {
            PipelineStateCreateInfo::Graphics(ci) => ci.pipeline_type,
            PipelineStateCreateInfo::Compute(_) => PipelineType::Compute,
            PipelineStateCreateInfo::Tile(_) => PipelineType::Tile,
            PipelineStateCreateInfo::RayTracing(_) => PipelineType::RayTracing,
        }
    }

    pub fn resource_signatures(&self) -> &[Arc<ResourceSignature>] {
        match self {
            PipelineStateCreateInfo::Graphics(ci) => &ci.resource_signatures,
            PipelineStateCreateInfo::Compute(ci) => &ci.resource_signatures,
            PipelineStateCreateInfo::Tile(ci) => &ci.resource_signatures,
            PipelineStateCreateInfo::RayTracing(ci) => &ci.resource_signatures,
        }
    }

    pub fn resource_signatures_mut(&mut self) -> &mut Vec<Arc<ResourceSignature>> {
        match self {
            PipelineStateCreateInfo::Graphics(ci) => &mut ci.resource_signatures,
            PipelineStateCreateInfo::Compute(ci) => &mut ci.resource_signatures,
            PipelineStateCreateInfo::Tile(ci) => &mut ci.resource_signatures,
            PipelineStateCreateInfo::RayTracing(ci) => &mut ci.resource_signatures,
        }
    }

    /// Every shader the pipeline references, in stage/group order.
    pub fn shaders(&self) -> Vec<Arc<Shader>> {
        match self {
            PipelineStateCreateInfo::Graphics(ci) => ci.shaders(),
            PipelineStateCreateInfo::Compute(ci) => vec![ci.compute_shader.clone()],
            PipelineStateCreateInfo::Tile(ci) => vec![ci.tile_shader.clone()],
            PipelineStateCreateInfo::RayTracing(ci) => ci.shaders(),
        }
    }
}
