//! Render-state notation: declarative JSON descriptions of shaders, render
//! passes, resource signatures and pipeline states, addressable by name.
//!
//! A notation references its dependencies *by name* (a pipeline names its
//! shaders, render pass and signatures); the loader and packager resolve
//! those names into engine objects. The [`NotationParser`] accumulates any
//! number of notation files, resolves `Imports` recursively, rejects
//! conflicting redefinitions, and supports hot reload from a secondary
//! stream factory while keeping name and index lookups stable.

pub mod parser;
pub mod types;

pub use parser::{NotationParser, ParseError, ParserInfo};
pub use types::{
    ComputePipelineNotation, GeneralShaderGroupNotation, GraphicsPipelineNotation,
    NotationDocument, PipelineNotation, ProceduralHitShaderGroupNotation,
    RayTracingPipelineNotation, SignatureNotation, TilePipelineNotation,
    TriangleHitShaderGroupNotation,
};
