//! The [`RenderDevice`] trait and its backend-free implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use vermilion_core::streams::SourceStreamFactory;

use crate::flags::{Backend, DeviceFlags};
use crate::objects::{PipelineState, RenderPass, ResourceSignature, Shader, ShaderArtifact};
use crate::types::{
    PipelineStateCreateInfo, PipelineType, RenderPassDesc, ResourceSignatureDesc,
    ShaderCreateInfo, ShaderStage,
};

/// Errors a device can report while constructing engine objects.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to create shader '{name}': {reason}")]
    ShaderCreationFailed { name: String, reason: String },
    #[error("failed to create render pass '{name}': {reason}")]
    RenderPassCreationFailed { name: String, reason: String },
    #[error("failed to create resource signature '{name}': {reason}")]
    SignatureCreationFailed { name: String, reason: String },
    #[error("failed to create pipeline state '{name}': {reason}")]
    PipelineCreationFailed { name: String, reason: String },
}

/// Metal-specific compilation settings, read from the packager config
/// file. All fields are optional; the defaults produce a plain `.air`
/// artifact with no extra toolchain flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MetalDeviceConfig {
    pub msl_version: Option<String>,
    pub compile_options: String,
    pub link_options: String,
}

/// Everything needed to construct a serialization device.
#[derive(Debug, Clone, Default)]
pub struct SerializationDeviceCreateInfo {
    /// Backends the device synthesizes artifacts for.
    pub device_flags: DeviceFlags,
    pub metal_macos: MetalDeviceConfig,
    pub metal_ios: MetalDeviceConfig,
}

/// The surface the tools layer consumes from a graphics engine.
///
/// Implementations must be safe to share across the packager's worker
/// threads.
pub trait RenderDevice: Send + Sync {
    fn create_shader(
        &self,
        create_info: &ShaderCreateInfo,
        flags: DeviceFlags,
    ) -> Result<Arc<Shader>, DeviceError>;

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<RenderPass>, DeviceError>;

    fn create_resource_signature(
        &self,
        desc: &ResourceSignatureDesc,
    ) -> Result<Arc<ResourceSignature>, DeviceError>;

    fn create_pipeline_state(
        &self,
        create_info: &PipelineStateCreateInfo,
        flags: DeviceFlags,
    ) -> Result<Arc<PipelineState>, DeviceError>;
}

/// Snapshot of how many objects a [`NullDevice`] has created so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreationCounts {
    pub shaders: usize,
    pub render_passes: usize,
    pub resource_signatures: usize,
    pub pipelines: usize,
}

/// A device that performs no GPU work.
///
/// Shader "compilation" resolves the source text (inline or through the
/// stream factory) and synthesizes one artifact per flagged backend. Used
/// by the offline packager and by every test in the tools layer.
pub struct NullDevice {
    streams: SourceStreamFactory,
    device_flags: DeviceFlags,
    metal_macos: MetalDeviceConfig,
    metal_ios: MetalDeviceConfig,
    shaders_created: AtomicUsize,
    render_passes_created: AtomicUsize,
    signatures_created: AtomicUsize,
    pipelines_created: AtomicUsize,
}

impl NullDevice {
    pub fn new(create_info: SerializationDeviceCreateInfo, streams: SourceStreamFactory) -> Self {
        Self {
            streams,
            device_flags: create_info.device_flags,
            metal_macos: create_info.metal_macos,
            metal_ios: create_info.metal_ios,
            shaders_created: AtomicUsize::new(0),
            render_passes_created: AtomicUsize::new(0),
            signatures_created: AtomicUsize::new(0),
            pipelines_created: AtomicUsize::new(0),
        }
    }

    /// Backends this device was constructed for.
    pub fn device_flags(&self) -> DeviceFlags {
        self.device_flags
    }

    /// Compilation settings for one of the Metal backends, `None` for all
    /// others.
    pub fn metal_config(&self, backend: Backend) -> Option<&MetalDeviceConfig> {
        match backend {
            Backend::MetalMacos => Some(&self.metal_macos),
            Backend::MetalIos => Some(&self.metal_ios),
            _ => None,
        }
    }

    /// How many objects of each kind have been created. Used by tests to
    /// verify that caching avoids duplicate creation.
    pub fn creation_counts(&self) -> CreationCounts {
        CreationCounts {
            shaders: self.shaders_created.load(Ordering::Relaxed),
            render_passes: self.render_passes_created.load(Ordering::Relaxed),
            resource_signatures: self.signatures_created.load(Ordering::Relaxed),
            pipelines: self.pipelines_created.load(Ordering::Relaxed),
        }
    }

    fn resolve_source(&self, create_info: &ShaderCreateInfo) -> Result<String, DeviceError> {
        match (&create_info.source, &create_info.path) {
            (Some(source), _) => Ok(source.clone()),
            (None, Some(path)) => {
                self.streams
                    .read_to_string(path)
                    .map_err(|e| DeviceError::ShaderCreationFailed {
                        name: create_info.name.clone(),
                        reason: e.to_string(),
                    })
            }
            (None, None) => Err(DeviceError::ShaderCreationFailed {
                name: create_info.name.clone(),
                reason: "neither Source nor Path is set".to_owned(),
            }),
        }
    }

    fn synthesize_artifact(
        &self,
        backend: Backend,
        create_info: &ShaderCreateInfo,
        source: &str,
    ) -> ShaderArtifact {
        let mut header = format!(
            "// {} {:?} entry={}\n",
            backend.name(),
            create_info.stage,
            create_info.entry_point
        );
        if let Some(config) = self.metal_config(backend) {
            if let Some(version) = &config.msl_version {
                header.push_str(&format!("// msl_version={version}\n"));
            }
            if !config.compile_options.is_empty() {
                header.push_str(&format!("// compile_options={}\n", config.compile_options));
            }
            if !config.link_options.is_empty() {
                header.push_str(&format!("// link_options={}\n", config.link_options));
            }
        }
        let mut bytes = header.into_bytes();
        bytes.extend_from_slice(source.as_bytes());
        ShaderArtifact {
            bytes,
            bytecode: backend.stores_bytecode(),
        }
    }

    fn check_stage(
        ci_name: &str,
        slot: &Option<Arc<Shader>>,
        expected: ShaderStage,
    ) -> Result<(), DeviceError> {
        if let Some(shader) = slot {
            if shader.stage() != expected {
                return Err(DeviceError::PipelineCreationFailed {
                    name: ci_name.to_owned(),
                    reason: format!(
                        "shader '{}' has stage {:?}, expected {:?}",
                        shader.name(),
                        shader.stage(),
                        expected
                    ),
                });
            }
        }
        Ok(())
    }

    fn validate_pipeline(create_info: &PipelineStateCreateInfo) -> Result<(), DeviceError> {
        let name = create_info.name();
        match create_info {
            PipelineStateCreateInfo::Graphics(ci) => {
                if ci.graphics.rtv_formats.len() != ci.graphics.num_render_targets as usize {
                    return Err(DeviceError::PipelineCreationFailed {
                        name: name.to_owned(),
                        reason: format!(
                            "NumRenderTargets is {} but {} RTV formats are given",
                            ci.graphics.num_render_targets,
                            ci.graphics.rtv_formats.len()
                        ),
                    });
                }
                match ci.pipeline_type {
                    PipelineType::Graphics => {
                        if ci.vertex_shader.is_none() || ci.pixel_shader.is_none() {
                            return Err(DeviceError::PipelineCreationFailed {
                                name: name.to_owned(),
                                reason: "graphics pipeline requires vertex and pixel shaders"
                                    .to_owned(),
                            });
                        }
                        if ci.mesh_shader.is_some() || ci.amplification_shader.is_some() {
                            return Err(DeviceError::PipelineCreationFailed {
                                name: name.to_owned(),
                                reason: "mesh stages are not valid in a graphics pipeline"
                                    .to_owned(),
                            });
                        }
                    }
                    PipelineType::Mesh => {
                        if ci.mesh_shader.is_none() {
                            return Err(DeviceError::PipelineCreationFailed {
                                name: name.to_owned(),
                                reason: "mesh pipeline requires a mesh shader".to_owned(),
                            });
                        }
                        if ci.vertex_shader.is_some()
                            || ci.geometry_shader.is_some()
                            || ci.hull_shader.is_some()
                            || ci.domain_shader.is_some()
                        {
                            return Err(DeviceError::PipelineCreationFailed {
                                name: name.to_owned(),
                                reason: "vertex stages are not valid in a mesh pipeline"
                                    .to_owned(),
                            });
                        }
                    }
                    other => {
                        return Err(DeviceError::PipelineCreationFailed {
                            name: name.to_owned(),
                            reason: format!(
                                "graphics create info cannot describe a {:?} pipeline",
                                other
                            ),
                        });
                    }
                }
                Self::check_stage(name, &ci.vertex_shader, ShaderStage::Vertex)?;
                Self::check_stage(name, &ci.pixel_shader, ShaderStage::Pixel)?;
                Self::check_stage(name, &ci.geometry_shader, ShaderStage::Geometry)?;
                Self::check_stage(name, &ci.hull_shader, ShaderStage::Hull)?;
                Self::check_stage(name, &ci.domain_shader, ShaderStage::Domain)?;
                Self::check_stage(name, &ci.amplification_shader, ShaderStage::Amplification)?;
                Self::check_stage(name, &ci.mesh_shader, ShaderStage::Mesh)?;
            }
            PipelineStateCreateInfo::Compute(ci) => {
                if ci.compute_shader.stage() != ShaderStage::Compute {
                    return Err(DeviceError::PipelineCreationFailed {
                        name: name.to_owned(),
                        reason: format!(
                            "shader '{}' is not a compute shader",
                            ci.compute_shader.name()
                        ),
                    });
                }
            }
            PipelineStateCreateInfo::Tile(ci) => {
                if ci.tile_shader.stage() != ShaderStage::Tile {
                    return Err(DeviceError::PipelineCreationFailed {
                        name: name.to_owned(),
                        reason: format!("shader '{}' is not a tile shader", ci.tile_shader.name()),
                    });
                }
            }
            PipelineStateCreateInfo::RayTracing(ci) => {
                if ci.general_shaders.is_empty() {
                    return Err(DeviceError::PipelineCreationFailed {
                        name: name.to_owned(),
                        reason: "ray-tracing pipeline requires at least one general shader group"
                            .to_owned(),
                    });
                }
                for shader in ci.shaders() {
                    if !shader.stage().is_ray_tracing() {
                        return Err(DeviceError::PipelineCreationFailed {
                            name: name.to_owned(),
                            reason: format!(
                                "shader '{}' is not a ray-tracing shader",
                                shader.name()
                            ),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl RenderDevice for NullDevice {
    fn create_shader(
        &self,
        create_info: &ShaderCreateInfo,
        flags: DeviceFlags,
    ) -> Result<Arc<Shader>, DeviceError> {
        log::trace!("NullDevice: create_shader '{}'", create_info.name);
        let flags = if flags.is_empty() {
            self.device_flags
        } else {
            flags
        };
        let source = self.resolve_source(create_info)?;
        let mut artifacts = HashMap::new();
        for backend in flags.backends() {
            artifacts.insert(
                backend,
                self.synthesize_artifact(backend, create_info, &source),
            );
        }
        self.shaders_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(Shader::new(create_info.clone(), artifacts)))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<RenderPass>, DeviceError> {
        log::trace!("NullDevice: create_render_pass '{}'", desc.name);
        for subpass in &desc.subpasses {
            let out_of_range = subpass
                .render_targets
                .iter()
                .chain(subpass.depth_stencil.iter())
                .any(|&index| index as usize >= desc.attachments.len());
            if out_of_range {
                return Err(DeviceError::RenderPassCreationFailed {
                    name: desc.name.clone(),
                    reason: "subpass references an attachment index out of range".to_owned(),
                });
            }
        }
        self.render_passes_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(RenderPass::new(desc.clone())))
    }

    fn create_resource_signature(
        &self,
        desc: &ResourceSignatureDesc,
    ) -> Result<Arc<ResourceSignature>, DeviceError> {
        log::trace!("NullDevice: create_resource_signature '{}'", desc.name);
        for resource in &desc.resources {
            if resource.count == 0 {
                return Err(DeviceError::SignatureCreationFailed {
                    name: desc.name.clone(),
                    reason: format!("resource '{}' has a count of zero", resource.name),
                });
            }
        }
        self.signatures_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(ResourceSignature::new(desc.clone())))
    }

    fn create_pipeline_state(
        &self,
        create_info: &PipelineStateCreateInfo,
        _flags: DeviceFlags,
    ) -> Result<Arc<PipelineState>, DeviceError> {
        log::trace!("NullDevice: create_pipeline_state '{}'", create_info.name());
        Self::validate_pipeline(create_info)?;
        self.pipelines_created.fetch_add(1, Ordering::Relaxed);
        Ok(Arc::new(PipelineState::new(create_info)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GraphicsPipelineCreateInfo, GraphicsPipelineDesc, TextureFormat};

    fn device(flags: DeviceFlags) -> NullDevice {
        NullDevice::new(
            SerializationDeviceCreateInfo {
                device_flags: flags,
                ..Default::default()
            },
            SourceStreamFactory::in_memory(),
        )
    }

    fn shader(device: &NullDevice, name: &str, stage: ShaderStage) -> Arc<Shader> {
        device
            .create_shader(
                &ShaderCreateInfo::from_source(name, stage, "void main() {}"),
                DeviceFlags::empty(),
            )
            .unwrap()
    }

    #[test]
    fn synthesizes_one_artifact_per_backend() {
        let device = device(DeviceFlags::VULKAN | DeviceFlags::GL);
        let shader = shader(&device, "VS", ShaderStage::Vertex);

        let vulkan = shader.artifact(Backend::Vulkan).unwrap();
        assert!(vulkan.bytecode);
        let gl = shader.artifact(Backend::Gl).unwrap();
        assert!(!gl.bytecode);
        assert!(shader.artifact(Backend::Dx12).is_none());
        assert_eq!(device.creation_counts().shaders, 1);
    }

    #[test]
    fn shader_path_resolves_through_streams() {
        let streams = SourceStreamFactory::in_memory();
        streams.insert("vs.hlsl", b"float4 main() : SV_Position { return 0; }".to_vec());
        let device = NullDevice::new(
            SerializationDeviceCreateInfo {
                device_flags: DeviceFlags::VULKAN,
                ..Default::default()
            },
            streams,
        );

        let shader = device
            .create_shader(
                &ShaderCreateInfo::from_path("VS", ShaderStage::Vertex, "vs.hlsl"),
                DeviceFlags::empty(),
            )
            .unwrap();
        let artifact = shader.artifact(Backend::Vulkan).unwrap();
        assert!(String::from_utf8_lossy(&artifact.bytes).contains("SV_Position"));

        let missing = device.create_shader(
            &ShaderCreateInfo::from_path("PS", ShaderStage::Pixel, "missing.hlsl"),
            DeviceFlags::empty(),
        );
        assert!(missing.is_err());
    }

    #[test]
    fn metal_config_flows_into_artifacts() {
        let device = NullDevice::new(
            SerializationDeviceCreateInfo {
                device_flags: DeviceFlags::METAL_MACOS | DeviceFlags::VULKAN,
                metal_macos: MetalDeviceConfig {
                    msl_version: Some("2.3".to_owned()),
                    compile_options: "-O2".to_owned(),
                    link_options: String::new(),
                },
                ..Default::default()
            },
            SourceStreamFactory::in_memory(),
        );
        let shader = shader(&device, "VS", ShaderStage::Vertex);

        let metal = String::from_utf8_lossy(&shader.artifact(Backend::MetalMacos).unwrap().bytes)
            .into_owned();
        assert!(metal.contains("msl_version=2.3"));
        assert!(metal.contains("compile_options=-O2"));
        assert!(!metal.contains("link_options"));
        // Non-Metal backends are unaffected by the Metal settings.
        let vulkan = String::from_utf8_lossy(&shader.artifact(Backend::Vulkan).unwrap().bytes)
            .into_owned();
        assert!(!vulkan.contains("msl_version"));

        assert_eq!(
            device.metal_config(Backend::MetalMacos).unwrap().msl_version,
            Some("2.3".to_owned())
        );
        assert!(device.metal_config(Backend::Vulkan).is_none());
    }

    #[test]
    fn graphics_pipeline_requires_vertex_and_pixel() {
        let device = device(DeviceFlags::VULKAN);
        let vs = shader(&device, "VS", ShaderStage::Vertex);

        let mut graphics = GraphicsPipelineDesc::default();
        graphics.num_render_targets = 1;
        graphics.rtv_formats = vec![TextureFormat::Rgba8Unorm];
        let ci = PipelineStateCreateInfo::Graphics(GraphicsPipelineCreateInfo {
            name: "Opaque".to_owned(),
            pipeline_type: PipelineType::Graphics,
            graphics,
            vertex_shader: Some(vs),
            pixel_shader: None,
            geometry_shader: None,
            hull_shader: None,
            domain_shader: None,
            amplification_shader: None,
            mesh_shader: None,
            render_pass: None,
            resource_signatures: Vec::new(),
        });
        let err = device
            .create_pipeline_state(&ci, DeviceFlags::empty())
            .unwrap_err();
        assert!(err.to_string().contains("vertex and pixel"));
    }

    #[test]
    fn render_target_count_must_match_formats() {
        let device = device(DeviceFlags::VULKAN);
        let vs = shader(&device, "VS", ShaderStage::Vertex);
        let ps = shader(&device, "PS", ShaderStage::Pixel);

        let mut graphics = GraphicsPipelineDesc::default();
        graphics.num_render_targets = 2;
        graphics.rtv_formats = vec![TextureFormat::Rgba8Unorm];
        let ci = PipelineStateCreateInfo::Graphics(GraphicsPipelineCreateInfo {
            name: "Opaque".to_owned(),
            pipeline_type: PipelineType::Graphics,
            graphics,
            vertex_shader: Some(vs),
            pixel_shader: Some(ps),
            geometry_shader: None,
            hull_shader: None,
            domain_shader: None,
            amplification_shader: None,
            mesh_shader: None,
            render_pass: None,
            resource_signatures: Vec::new(),
        });
        assert!(device.create_pipeline_state(&ci, DeviceFlags::empty()).is_err());
    }

    #[test]
    fn compute_pipeline_checks_stage() {
        use crate::types::ComputePipelineCreateInfo;
        let device = device(DeviceFlags::D3D12);
        let vs = shader(&device, "VS", ShaderStage::Vertex);
        let ci = PipelineStateCreateInfo::Compute(ComputePipelineCreateInfo {
            name: "Cull".to_owned(),
            compute_shader: vs,
            resource_signatures: Vec::new(),
        });
        assert!(device.create_pipeline_state(&ci, DeviceFlags::empty()).is_err());
    }
}
