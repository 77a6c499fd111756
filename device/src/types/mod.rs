//! Descriptor types shared between notation files, engine objects and the
//! archive format.
//!
//! Every descriptor derives `Serialize`/`Deserialize` with PascalCase field
//! names and SCREAMING_SNAKE_CASE enum values, so the same structs back the
//! JSON notation schema and the binary archive records. `PartialEq` backs
//! the parser's redefinition detection.

mod create_info;
mod pipeline;
mod render_pass;
mod shader;
mod signature;

pub use create_info::{
    ComputePipelineCreateInfo, GeneralShaderGroup, GraphicsPipelineCreateInfo,
    PipelineStateCreateInfo, ProceduralHitShaderGroup, RayTracingPipelineCreateInfo,
    TilePipelineCreateInfo, TriangleHitShaderGroup,
};
pub use pipeline::{
    BlendDesc, BlendFactor, ComparisonFunc, CullMode, DepthStencilDesc, GraphicsPipelineDesc,
    PipelineType, PrimitiveTopology,
};
pub use render_pass::{AttachmentDesc, LoadOp, RenderPassDesc, StoreOp, SubpassDesc, TextureFormat};
pub use shader::{ShaderCreateInfo, ShaderStage};
pub use signature::{ResourceDesc, ResourceSignatureDesc, ResourceType};
