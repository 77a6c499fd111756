//! Render pass descriptor types.

use serde::{Deserialize, Serialize};

/// Texture formats the tools layer understands.
///
/// This is deliberately the small subset render-state notation files use;
/// a real device exposes far more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextureFormat {
    Unknown,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Rgba16Float,
    Rgba32Float,
    Rg16Float,
    R32Float,
    D32Float,
    D24UnormS8Uint,
}

impl Default for TextureFormat {
    fn default() -> Self {
        TextureFormat::Unknown
    }
}

/// What happens to an attachment's contents at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadOp {
    Load,
    Clear,
    Discard,
}

impl Default for LoadOp {
    fn default() -> Self {
        LoadOp::Load
    }
}

/// What happens to an attachment's contents at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreOp {
    Store,
    Discard,
}

impl Default for StoreOp {
    fn default() -> Self {
        StoreOp::Store
    }
}

/// One attachment of a render pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AttachmentDesc {
    pub format: TextureFormat,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
    pub sample_count: u32,
}

impl Default for AttachmentDesc {
    fn default() -> Self {
        Self {
            format: TextureFormat::Unknown,
            load_op: LoadOp::default(),
            store_op: StoreOp::default(),
            sample_count: 1,
        }
    }
}

/// One subpass, referencing attachments by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SubpassDesc {
    pub render_targets: Vec<u32>,
    pub depth_stencil: Option<u32>,
}

/// A named render pass description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RenderPassDesc {
    pub name: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentDesc>,
    #[serde(default)]
    pub subpasses: Vec<SubpassDesc>,
}
