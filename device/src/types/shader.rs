//! Shader descriptor types.

use serde::{Deserialize, Serialize};

/// Pipeline stage a shader is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
    Amplification,
    Mesh,
    Tile,
    RayGen,
    Miss,
    Callable,
    ClosestHit,
    AnyHit,
    Intersection,
}

impl ShaderStage {
    /// Whether this stage belongs to the ray-tracing shader family.
    pub fn is_ray_tracing(self) -> bool {
        matches!(
            self,
            ShaderStage::RayGen
                | ShaderStage::Miss
                | ShaderStage::Callable
                | ShaderStage::ClosestHit
                | ShaderStage::AnyHit
                | ShaderStage::Intersection
        )
    }
}

/// Everything needed to construct a shader object.
///
/// Exactly one of `path` and `source` should be set: `path` is resolved
/// through the shader source-stream factory, `source` embeds the text
/// directly (used by tests and generated shaders).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShaderCreateInfo {
    pub name: String,
    pub stage: ShaderStage,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
}

fn default_entry_point() -> String {
    "main".to_owned()
}

impl ShaderCreateInfo {
    /// Creates a descriptor with an inline source and the default entry
    /// point.
    pub fn from_source(
        name: impl Into<String>,
        stage: ShaderStage,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            stage,
            path: None,
            source: Some(source.into()),
            entry_point: default_entry_point(),
        }
    }

    /// Creates a descriptor that resolves its source from a file path.
    pub fn from_path(
        name: impl Into<String>,
        stage: ShaderStage,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            stage,
            path: Some(path.into()),
            source: None,
            entry_point: default_entry_point(),
        }
    }
}
