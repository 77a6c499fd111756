//! The multi-backend archive format.
//!
//! An archive is a bincode-encoded [`ArchiveData`] record: a format
//! version, a caller-supplied content version, the resource signature
//! descriptions, and one record per pipeline with the full shader
//! artifacts for every targeted backend inline. The [`Archiver`]
//! accumulates live objects and serializes them; the [`Dearchiver`]
//! accumulates one or more archive blobs and reconstructs engine objects,
//! resolving signature names across every loaded archive. Splitting
//! signatures and pipelines into separate archives lets shared signatures
//! ship once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flags::Backend;
use crate::objects::{PipelineState, RenderPass, ResourceSignature, Shader, ShaderArtifact};
use crate::types::{
    GraphicsPipelineDesc, PipelineType, RenderPassDesc, ResourceSignatureDesc, ShaderCreateInfo,
};

/// Version of the on-disk record layout. Bumped when the record structs
/// change incompatibly.
pub const ARCHIVE_FORMAT_VERSION: u32 = 1;

/// Errors produced while building or loading archives.
#[derive(Debug)]
pub enum ArchiveError {
    /// Two different objects were added under the same name.
    Redefinition { kind: &'static str, name: String },
    /// The blob could not be encoded.
    Encode(String),
    /// The blob could not be decoded.
    Decode(String),
    /// The blob was written by an incompatible format version.
    FormatVersion { found: u32 },
    /// A requested object is not present in any loaded archive.
    NotFound { kind: &'static str, name: String },
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::Redefinition { kind, name } => {
                write!(f, "{kind} '{name}' added twice with different contents")
            }
            ArchiveError::Encode(err) => write!(f, "failed to encode archive: {err}"),
            ArchiveError::Decode(err) => write!(f, "failed to decode archive: {err}"),
            ArchiveError::FormatVersion { found } => write!(
                f,
                "unsupported archive format version {found} (expected {ARCHIVE_FORMAT_VERSION})"
            ),
            ArchiveError::NotFound { kind, name } => {
                write!(f, "{kind} '{name}' is not present in any loaded archive")
            }
        }
    }
}

impl std::error::Error for ArchiveError {}

// ===== Records =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ShaderRecord {
    desc: ShaderCreateInfo,
    artifacts: Vec<(Backend, ShaderArtifact)>,
}

impl ShaderRecord {
    fn from_shader(shader: &Shader) -> Self {
        let mut artifacts: Vec<(Backend, ShaderArtifact)> = shader
            .artifacts()
            .iter()
            .map(|(&backend, artifact)| (backend, artifact.clone()))
            .collect();
        artifacts.sort_by_key(|(backend, _)| *backend);
        Self {
            desc: shader.desc().clone(),
            artifacts,
        }
    }

    fn into_shader(self) -> Shader {
        let artifacts: HashMap<Backend, ShaderArtifact> = self.artifacts.into_iter().collect();
        Shader::new(self.desc, artifacts)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PipelineRecord {
    name: String,
    pipeline_type: PipelineType,
    graphics: Option<GraphicsPipelineDesc>,
    shaders: Vec<ShaderRecord>,
    render_pass: Option<RenderPassDesc>,
    /// Signature references stay by name so a pipeline archive can link
    /// against signatures shipped in a different archive.
    signature_names: Vec<String>,
}

impl PipelineRecord {
    fn from_pipeline(pipeline: &PipelineState) -> Self {
        Self {
            name: pipeline.name().to_owned(),
            pipeline_type: pipeline.pipeline_type(),
            graphics: pipeline.graphics_desc(),
            shaders: pipeline
                .shaders()
                .iter()
                .map(|shader| ShaderRecord::from_shader(shader))
                .collect(),
            render_pass: pipeline.render_pass().map(|rp| rp.desc().clone()),
            signature_names: pipeline
                .resource_signatures()
                .iter()
                .map(|sig| sig.name().to_owned())
                .collect(),
        }
    }
}

/// The full serialized payload of one archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArchiveData {
    format_version: u32,
    content_version: u32,
    reflection_stripped: bool,
    signatures: Vec<ResourceSignatureDesc>,
    pipelines: Vec<PipelineRecord>,
}

// ===== Archiver =====

/// Accumulates engine objects and serializes them into one archive blob.
///
/// Adding the same object twice is idempotent; adding a different object
/// under an existing name is an error.
#[derive(Default)]
pub struct Archiver {
    signatures: Vec<ResourceSignatureDesc>,
    pipelines: Vec<PipelineRecord>,
    strip_reflection: bool,
}

impl Archiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the produced archive as reflection-stripped. Recorded in the
    /// archive header only; artifact contents are unaffected.
    pub fn set_strip_reflection(&mut self, strip: bool) {
        self.strip_reflection = strip;
    }

    pub fn add_resource_signature(
        &mut self,
        signature: &ResourceSignature,
    ) -> Result<(), ArchiveError> {
        let desc = signature.desc();
        if let Some(existing) = self.signatures.iter().find(|s| s.name == desc.name) {
            if existing == desc {
                return Ok(());
            }
            return Err(ArchiveError::Redefinition {
                kind: "resource signature",
                name: desc.name.clone(),
            });
        }
        self.signatures.push(desc.clone());
        Ok(())
    }

    pub fn add_pipeline_state(&mut self, pipeline: &PipelineState) -> Result<(), ArchiveError> {
        let record = PipelineRecord::from_pipeline(pipeline);
        if let Some(existing) = self
            .pipelines
            .iter()
            .find(|p| p.name == record.name && p.pipeline_type == record.pipeline_type)
        {
            if *existing == record {
                return Ok(());
            }
            return Err(ArchiveError::Redefinition {
                kind: "pipeline state",
                name: record.name,
            });
        }
        log::debug!(
            "archiving {} pipeline '{}'",
            record.pipeline_type.name(),
            record.name
        );
        self.pipelines.push(record);
        Ok(())
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Serializes everything added so far into one archive blob.
    pub fn serialize_to_blob(&self, content_version: u32) -> Result<Vec<u8>, ArchiveError> {
        let data = ArchiveData {
            format_version: ARCHIVE_FORMAT_VERSION,
            content_version,
            reflection_stripped: self.strip_reflection,
            signatures: self.signatures.clone(),
            pipelines: self.pipelines.clone(),
        };
        bincode::serialize(&data).map_err(|e| ArchiveError::Encode(e.to_string()))
    }
}

// ===== Dearchiver =====

/// Loads archive blobs and reconstructs engine objects from them.
///
/// Multiple archives can be loaded into one dearchiver; pipeline
/// signature references are resolved across all of them, in load order.
#[derive(Default)]
pub struct Dearchiver {
    archives: Vec<ArchiveData>,
}

impl Dearchiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_archive(&mut self, blob: &[u8]) -> Result<(), ArchiveError> {
        let data: ArchiveData =
            bincode::deserialize(blob).map_err(|e| ArchiveError::Decode(e.to_string()))?;
        if data.format_version != ARCHIVE_FORMAT_VERSION {
            return Err(ArchiveError::FormatVersion {
                found: data.format_version,
            });
        }
        log::debug!(
            "loaded archive: content version {}, {} signatures, {} pipelines",
            data.content_version,
            data.signatures.len(),
            data.pipelines.len()
        );
        self.archives.push(data);
        Ok(())
    }

    /// Content version of the most recently loaded archive.
    pub fn content_version(&self) -> Option<u32> {
        self.archives.last().map(|a| a.content_version)
    }

    fn find_signature(&self, name: &str) -> Option<&ResourceSignatureDesc> {
        self.archives
            .iter()
            .flat_map(|a| a.signatures.iter())
            .find(|s| s.name == name)
    }

    fn find_typed_pipeline(&self, name: &str, pipeline_type: PipelineType) -> Option<&PipelineRecord> {
        self.archives
            .iter()
            .flat_map(|a| a.pipelines.iter())
            .find(|p| p.name == name && p.pipeline_type == pipeline_type)
    }

    fn find_pipeline(
        &self,
        name: &str,
        pipeline_type: Option<PipelineType>,
    ) -> Option<&PipelineRecord> {
        match pipeline_type {
            Some(ty) => self.find_typed_pipeline(name, ty),
            // Untyped lookups probe the same fixed type order as the
            // parser and the loader caches.
            None => PipelineType::PROBE_ORDER
                .iter()
                .find_map(|&ty| self.find_typed_pipeline(name, ty)),
        }
    }

    pub fn unpack_resource_signature(
        &self,
        name: &str,
    ) -> Result<Arc<ResourceSignature>, ArchiveError> {
        let desc = self
            .find_signature(name)
            .ok_or_else(|| ArchiveError::NotFound {
                kind: "resource signature",
                name: name.to_owned(),
            })?;
        Ok(Arc::new(ResourceSignature::new(desc.clone())))
    }

    pub fn unpack_render_pass(&self, name: &str) -> Result<Arc<RenderPass>, ArchiveError> {
        let desc = self
            .archives
            .iter()
            .flat_map(|a| a.pipelines.iter())
            .filter_map(|p| p.render_pass.as_ref())
            .find(|rp| rp.name == name)
            .ok_or_else(|| ArchiveError::NotFound {
                kind: "render pass",
                name: name.to_owned(),
            })?;
        Ok(Arc::new(RenderPass::new(desc.clone())))
    }

    /// Reconstructs a pipeline together with its shaders, render pass and
    /// resource signatures. Signatures referenced by name are looked up in
    /// every loaded archive.
    pub fn unpack_pipeline_state(
        &self,
        name: &str,
        pipeline_type: Option<PipelineType>,
    ) -> Result<UnpackedPipeline, ArchiveError> {
        let record = self
            .find_pipeline(name, pipeline_type)
            .ok_or_else(|| ArchiveError::NotFound {
                kind: "pipeline state",
                name: name.to_owned(),
            })?;

        let mut signatures = Vec::with_capacity(record.signature_names.len());
        for sig_name in &record.signature_names {
            signatures.push(self.unpack_resource_signature(sig_name)?);
        }

        Ok(UnpackedPipeline {
            name: record.name.clone(),
            pipeline_type: record.pipeline_type,
            graphics: record.graphics.clone(),
            shaders: record
                .shaders
                .iter()
                .map(|rec| Arc::new(rec.clone().into_shader()))
                .collect(),
            render_pass: record
                .render_pass
                .as_ref()
                .map(|desc| Arc::new(RenderPass::new(desc.clone()))),
            resource_signatures: signatures,
        })
    }

    /// Human-readable listing of everything in the loaded archives.
    pub fn describe(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        for (index, archive) in self.archives.iter().enumerate() {
            let _ = writeln!(
                out,
                "archive #{index}: content version {}, reflection stripped: {}",
                archive.content_version, archive.reflection_stripped
            );
            for signature in &archive.signatures {
                let _ = writeln!(
                    out,
                    "  resource signature '{}' ({} resources)",
                    signature.name,
                    signature.resources.len()
                );
            }
            for pipeline in &archive.pipelines {
                let _ = writeln!(
                    out,
                    "  {} pipeline '{}' ({} shaders, {} signatures)",
                    pipeline.pipeline_type.name(),
                    pipeline.name,
                    pipeline.shaders.len(),
                    pipeline.signature_names.len()
                );
                for shader in &pipeline.shaders {
                    let backends: Vec<&str> = shader
                        .artifacts
                        .iter()
                        .map(|(backend, _)| backend.name())
                        .collect();
                    let _ = writeln!(
                        out,
                        "    shader '{}' [{}]",
                        shader.desc.name,
                        backends.join(", ")
                    );
                }
            }
        }
        out
    }
}

/// The contents of one archived pipeline, reconstructed as engine objects.
#[derive(Debug)]
pub struct UnpackedPipeline {
    pub name: String,
    pub pipeline_type: PipelineType,
    pub graphics: Option<GraphicsPipelineDesc>,
    pub shaders: Vec<Arc<Shader>>,
    pub render_pass: Option<Arc<RenderPass>>,
    pub resource_signatures: Vec<Arc<ResourceSignature>>,
}
