//! Pipeline resource signature descriptor types.

use serde::{Deserialize, Serialize};

use super::shader::ShaderStage;

/// Kind of resource a signature entry binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    ConstantBuffer,
    TextureSrv,
    BufferSrv,
    TextureUav,
    BufferUav,
    Sampler,
    InputAttachment,
    AccelStruct,
}

/// One resource binding of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceDesc {
    pub name: String,
    #[serde(rename = "Type")]
    pub resource_type: ResourceType,
    #[serde(default = "default_count")]
    pub count: u32,
    /// Shader stages the resource is visible to. Empty means all stages.
    #[serde(default)]
    pub stages: Vec<ShaderStage>,
}

fn default_count() -> u32 {
    1
}

/// A named pipeline resource signature description.
///
/// Signatures describe the resource interface shared between pipelines;
/// a pipeline references zero or more signatures by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceSignatureDesc {
    pub name: String,
    #[serde(default)]
    pub binding_index: u8,
    #[serde(default)]
    pub resources: Vec<ResourceDesc>,
    #[serde(default)]
    pub use_combined_samplers: bool,
    #[serde(default)]
    pub combined_sampler_suffix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_resources() {
        let desc: ResourceSignatureDesc = serde_json::from_str(
            r#"{
                "Name": "Common",
                "BindingIndex": 1,
                "Resources": [
                    { "Name": "Constants", "Type": "CONSTANT_BUFFER" },
                    { "Name": "Albedo", "Type": "TEXTURE_SRV", "Count": 4, "Stages": ["PIXEL"] }
                ],
                "UseCombinedSamplers": true
            }"#,
        )
        .unwrap();
        assert_eq!(desc.binding_index, 1);
        assert_eq!(desc.resources.len(), 2);
        assert_eq!(desc.resources[0].count, 1);
        assert_eq!(desc.resources[1].resource_type, ResourceType::TextureSrv);
        assert_eq!(desc.resources[1].stages, vec![ShaderStage::Pixel]);
        assert!(desc.use_combined_samplers);
    }
}
