//! Engine objects handed out by a [`RenderDevice`](crate::RenderDevice).
//!
//! Every object is shared behind an `Arc`; the pointer itself is the
//! object's identity. Hot reload relies on this: a reloaded graphics
//! pipeline keeps its `Arc<PipelineState>` and only its fixed-function
//! descriptor changes.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::flags::Backend;
use crate::types::{
    GraphicsPipelineDesc, PipelineStateCreateInfo, PipelineType, RenderPassDesc,
    ResourceSignatureDesc, ShaderCreateInfo, ShaderStage,
};

/// Compiled output of one shader for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderArtifact {
    pub bytes: Vec<u8>,
    /// True when `bytes` holds backend bytecode, false when it holds
    /// source text the driver compiles at pipeline creation (GL family).
    pub bytecode: bool,
}

/// A shader object with one artifact per targeted backend.
#[derive(Debug)]
pub struct Shader {
    desc: ShaderCreateInfo,
    artifacts: HashMap<Backend, ShaderArtifact>,
}

impl Shader {
    pub fn new(desc: ShaderCreateInfo, artifacts: HashMap<Backend, ShaderArtifact>) -> Self {
        Self { desc, artifacts }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.desc.stage
    }

    pub fn desc(&self) -> &ShaderCreateInfo {
        &self.desc
    }

    pub fn artifact(&self, backend: Backend) -> Option<&ShaderArtifact> {
        self.artifacts.get(&backend)
    }

    pub fn artifacts(&self) -> &HashMap<Backend, ShaderArtifact> {
        &self.artifacts
    }
}

/// A render pass object.
#[derive(Debug)]
pub struct RenderPass {
    desc: RenderPassDesc,
}

impl RenderPass {
    pub fn new(desc: RenderPassDesc) -> Self {
        Self { desc }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

/// A pipeline resource signature object.
#[derive(Debug)]
pub struct ResourceSignature {
    desc: ResourceSignatureDesc,
}

impl ResourceSignature {
    pub fn new(desc: ResourceSignatureDesc) -> Self {
        Self { desc }
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn desc(&self) -> &ResourceSignatureDesc {
        &self.desc
    }
}

/// A pipeline state object.
///
/// Graphics and mesh pipelines carry their fixed-function descriptor
/// behind an `RwLock` so hot reload can patch it on the live object.
#[derive(Debug)]
pub struct PipelineState {
    name: String,
    pipeline_type: PipelineType,
    graphics: Option<RwLock<GraphicsPipelineDesc>>,
    shaders: Vec<Arc<Shader>>,
    render_pass: Option<Arc<RenderPass>>,
    resource_signatures: Vec<Arc<ResourceSignature>>,
}

impl PipelineState {
    pub fn new(create_info: &PipelineStateCreateInfo) -> Self {
        let graphics = match create_info {
            PipelineStateCreateInfo::Graphics(ci) => Some(RwLock::new(ci.graphics.clone())),
            _ => None,
        };
        let render_pass = match create_info {
            PipelineStateCreateInfo::Graphics(ci) => ci.render_pass.clone(),
            _ => None,
        };
        Self {
            name: create_info.name().to_owned(),
            pipeline_type: create_info.pipeline_type(),
            graphics,
            shaders: create_info.shaders(),
            render_pass,
            resource_signatures: create_info.resource_signatures().to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    /// Snapshot of the fixed-function descriptor. `None` for compute,
    /// tile and ray-tracing pipelines.
    pub fn graphics_desc(&self) -> Option<GraphicsPipelineDesc> {
        self.graphics.as_ref().map(|lock| lock.read().clone())
    }

    /// Replaces the fixed-function descriptor in place, keeping the
    /// object's identity. Returns false for pipeline kinds that have no
    /// such descriptor.
    pub fn patch_graphics_desc(&self, desc: GraphicsPipelineDesc) -> bool {
        match &self.graphics {
            Some(lock) => {
                *lock.write() = desc;
                true
            }
            None => false,
        }
    }

    pub fn shaders(&self) -> &[Arc<Shader>] {
        &self.shaders
    }

    pub fn render_pass(&self) -> Option<&Arc<RenderPass>> {
        self.render_pass.as_ref()
    }

    pub fn resource_signatures(&self) -> &[Arc<ResourceSignature>] {
        &self.resource_signatures
    }

    pub fn resource_signature_count(&self) -> usize {
        self.resource_signatures.len()
    }
}
