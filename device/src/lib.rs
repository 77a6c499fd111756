//! Device abstraction layer for the Vermilion render-state tools.
//!
//! This crate models the surface the tools layer consumes from a native
//! graphics engine:
//!
//! - descriptor types for shaders, render passes, resource signatures and
//!   pipeline states ([`types`]),
//! - the [`DeviceFlags`] bitset selecting which backends a construct /
//!   archive / dump operation targets simultaneously,
//! - reference-counted engine objects ([`objects`]) whose identity is the
//!   `Arc` pointer handed to callers,
//! - the [`RenderDevice`] trait plus [`NullDevice`], a backend-free
//!   implementation used for offline serialization and testing,
//! - the [`Archiver`]/[`Dearchiver`] pair producing and consuming the
//!   versioned multi-backend archive blob.
//!
//! # Architecture
//!
//! Engine objects are plain data: the "compilation" performed by
//! [`NullDevice`] synthesizes one artifact per flagged backend instead of
//! invoking a real shader compiler. Everything above this crate (the
//! notation parser, the loader, the packager) treats the device strictly
//! through [`RenderDevice`], so a real GPU-backed implementation can be
//! substituted without touching the tools.

pub mod archive;
pub mod device;
pub mod flags;
pub mod objects;
pub mod types;

pub use archive::{ArchiveError, Archiver, Dearchiver, UnpackedPipeline, ARCHIVE_FORMAT_VERSION};
pub use device::{
    CreationCounts, DeviceError, MetalDeviceConfig, NullDevice, RenderDevice,
    SerializationDeviceCreateInfo,
};
pub use flags::{Backend, DeviceFlags};
pub use objects::{PipelineState, RenderPass, ResourceSignature, Shader, ShaderArtifact};
pub use types::{
    AttachmentDesc, BlendDesc, BlendFactor, ComparisonFunc, ComputePipelineCreateInfo, CullMode,
    DepthStencilDesc, GeneralShaderGroup, GraphicsPipelineCreateInfo, GraphicsPipelineDesc,
    LoadOp, PipelineStateCreateInfo, PipelineType, PrimitiveTopology, ProceduralHitShaderGroup,
    RayTracingPipelineCreateInfo, RenderPassDesc, ResourceDesc, ResourceSignatureDesc,
    ResourceType, ShaderCreateInfo, ShaderStage, StoreOp, SubpassDesc, TextureFormat,
    TilePipelineCreateInfo, TriangleHitShaderGroup,
};
