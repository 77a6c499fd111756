//! The notation parser.

use std::collections::{HashMap, HashSet};
use std::fmt;

use vermilion_core::streams::{SourceStreamFactory, StreamError};
use vermilion_device::types::{
    PipelineType, RenderPassDesc, ResourceSignatureDesc, ShaderCreateInfo,
};

use crate::types::{NotationDocument, PipelineNotation, SignatureNotation};

/// Errors produced while parsing notation files.
#[derive(Debug)]
pub enum ParseError {
    /// A notation or import file could not be resolved or read.
    Stream(StreamError),
    /// A file is not valid notation JSON.
    Json {
        file: String,
        error: serde_json::Error,
    },
    /// The same name was declared twice with different contents.
    Redefinition { kind: &'static str, name: String },
    /// `reload` was called but no secondary stream factory was supplied.
    ReloadUnsupported,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Stream(err) => write!(f, "failed to read notation file: {err}"),
            ParseError::Json { file, error } => {
                write!(f, "failed to parse notation file '{file}': {error}")
            }
            ParseError::Redefinition { kind, name } => {
                write!(f, "{kind} '{name}' is declared twice with different contents")
            }
            ParseError::ReloadUnsupported => {
                write!(f, "the parser was created without a reload stream factory")
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Stream(err) => Some(err),
            ParseError::Json { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<StreamError> for ParseError {
    fn from(err: StreamError) -> Self {
        ParseError::Stream(err)
    }
}

/// Counts of everything a parser has accumulated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserInfo {
    pub shaders: usize,
    pub render_passes: usize,
    pub resource_signatures: usize,
    pub pipelines: usize,
}

/// Accumulates notation documents and indexes their declarations by name
/// and by insertion index.
///
/// Multiple files may be parsed into one parser; later files may reference
/// names declared by earlier ones. `Imports` lists are resolved recursively
/// through the stream factory, each file at most once per parse call.
///
/// # Reload
///
/// When a secondary stream factory is supplied, [`reload`](Self::reload)
/// re-parses every previously parsed file, preferring the secondary factory
/// and falling back to the primary. Redeclarations replace the stored
/// contents in place, so existing names keep their indices; new names
/// append. Documents fed through [`parse_string`](Self::parse_string) have
/// no backing file and are not re-parsed.
pub struct NotationParser {
    streams: SourceStreamFactory,
    reload_streams: Option<SourceStreamFactory>,
    parsed_files: Vec<String>,

    shaders: Vec<ShaderCreateInfo>,
    shader_index: HashMap<String, usize>,
    render_passes: Vec<RenderPassDesc>,
    render_pass_index: HashMap<String, usize>,
    signatures: Vec<SignatureNotation>,
    signature_index: HashMap<String, usize>,
    pipelines: Vec<PipelineNotation>,
    pipeline_index: HashMap<(String, PipelineType), usize>,
}

impl NotationParser {
    pub fn new(streams: SourceStreamFactory, reload_streams: Option<SourceStreamFactory>) -> Self {
        Self {
            streams,
            reload_streams,
            parsed_files: Vec::new(),
            shaders: Vec::new(),
            shader_index: HashMap::new(),
            render_passes: Vec::new(),
            render_pass_index: HashMap::new(),
            signatures: Vec::new(),
            signature_index: HashMap::new(),
            pipelines: Vec::new(),
            pipeline_index: HashMap::new(),
        }
    }

    /// Parses one notation file resolved through the primary stream
    /// factory, including its imports.
    pub fn parse_file(&mut self, name: &str) -> Result<(), ParseError> {
        log::debug!("parsing notation file '{name}'");
        let text = self.streams.read_to_string(name)?;
        let mut visited = HashSet::new();
        visited.insert(name.to_owned());
        self.add_document(name, &text, false, &mut visited, false)?;
        if !self.parsed_files.iter().any(|f| f == name) {
            self.parsed_files.push(name.to_owned());
        }
        Ok(())
    }

    /// Parses an in-memory notation document. Imports are still resolved
    /// through the primary stream factory.
    pub fn parse_string(&mut self, text: &str) -> Result<(), ParseError> {
        let mut visited = HashSet::new();
        self.add_document("<string>", text, false, &mut visited, false)
    }

    fn add_document(
        &mut self,
        file: &str,
        text: &str,
        replace: bool,
        visited: &mut HashSet<String>,
        prefer_reload: bool,
    ) -> Result<(), ParseError> {
        let doc: NotationDocument =
            serde_json::from_str(text).map_err(|error| ParseError::Json {
                file: file.to_owned(),
                error,
            })?;

        for import in &doc.imports {
            if !visited.insert(import.clone()) {
                continue;
            }
            log::trace!("importing notation file '{import}' from '{file}'");
            let text = self.read_source(import, prefer_reload)?;
            self.add_document(import, &text, replace, visited, prefer_reload)?;
        }

        for shader in doc.shaders {
            self.add_shader(shader, replace)?;
        }
        for render_pass in doc.render_passes {
            self.add_render_pass(render_pass, replace)?;
        }
        for signature in doc.resource_signatures {
            self.add_signature(signature, replace)?;
        }
        for pipeline in doc.pipelines {
            self.add_pipeline(pipeline, replace)?;
        }
        Ok(())
    }

    fn read_source(&self, name: &str, prefer_reload: bool) -> Result<String, ParseError> {
        if prefer_reload {
            if let Some(reload) = &self.reload_streams {
                match reload.read_to_string(name) {
                    Ok(text) => return Ok(text),
                    Err(StreamError::NotFound(_)) => {}
                    Err(err) => return Err(ParseError::Stream(err)),
                }
            }
        }
        Ok(self.streams.read_to_string(name)?)
    }

    fn add_shader(&mut self, desc: ShaderCreateInfo, replace: bool) -> Result<(), ParseError> {
        if let Some(&index) = self.shader_index.get(&desc.name) {
            if replace || self.shaders[index] == desc {
                self.shaders[index] = desc;
                return Ok(());
            }
            return Err(ParseError::Redefinition {
                kind: "shader",
                name: desc.name,
            });
        }
        self.shader_index.insert(desc.name.clone(), self.shaders.len());
        self.shaders.push(desc);
        Ok(())
    }

    fn add_render_pass(&mut self, desc: RenderPassDesc, replace: bool) -> Result<(), ParseError> {
        if let Some(&index) = self.render_pass_index.get(&desc.name) {
            if replace || self.render_passes[index] == desc {
                self.render_passes[index] = desc;
                return Ok(());
            }
            return Err(ParseError::Redefinition {
                kind: "render pass",
                name: desc.name,
            });
        }
        self.render_pass_index
            .insert(desc.name.clone(), self.render_passes.len());
        self.render_passes.push(desc);
        Ok(())
    }

    fn add_signature(
        &mut self,
        notation: SignatureNotation,
        replace: bool,
    ) -> Result<(), ParseError> {
        if let Some(&index) = self.signature_index.get(&notation.desc.name) {
            let existing = &mut self.signatures[index];
            if notation.ignored {
                // An ignored redeclaration only marks the existing entry;
                // it does not need to repeat the signature contents.
                existing.ignored = true;
                return Ok(());
            }
            if replace || existing.desc == notation.desc {
                existing.desc = notation.desc;
                return Ok(());
            }
            return Err(ParseError::Redefinition {
                kind: "resource signature",
                name: notation.desc.name,
            });
        }
        self.signature_index
            .insert(notation.desc.name.clone(), self.signatures.len());
        self.signatures.push(notation);
        Ok(())
    }

    fn add_pipeline(
        &mut self,
        notation: PipelineNotation,
        replace: bool,
    ) -> Result<(), ParseError> {
        let key = (notation.name().to_owned(), notation.pipeline_type());
        if let Some(&index) = self.pipeline_index.get(&key) {
            if replace || self.pipelines[index] == notation {
                self.pipelines[index] = notation;
                return Ok(());
            }
            return Err(ParseError::Redefinition {
                kind: "pipeline",
                name: key.0,
            });
        }
        self.pipeline_index.insert(key, self.pipelines.len());
        self.pipelines.push(notation);
        Ok(())
    }

    // ===== Lookups =====

    pub fn shader(&self, name: &str) -> Option<&ShaderCreateInfo> {
        self.shader_index.get(name).map(|&i| &self.shaders[i])
    }

    pub fn shader_by_index(&self, index: usize) -> Option<&ShaderCreateInfo> {
        self.shaders.get(index)
    }

    pub fn render_pass(&self, name: &str) -> Option<&RenderPassDesc> {
        self.render_pass_index
            .get(name)
            .map(|&i| &self.render_passes[i])
    }

    pub fn render_pass_by_index(&self, index: usize) -> Option<&RenderPassDesc> {
        self.render_passes.get(index)
    }

    pub fn resource_signature(&self, name: &str) -> Option<&SignatureNotation> {
        self.signature_index.get(name).map(|&i| &self.signatures[i])
    }

    pub fn resource_signature_by_index(&self, index: usize) -> Option<&SignatureNotation> {
        self.signatures.get(index)
    }

    /// Looks up a pipeline by name. Without an explicit type, every
    /// pipeline type is probed in [`PipelineType::PROBE_ORDER`] and the
    /// first match wins.
    pub fn pipeline(
        &self,
        name: &str,
        pipeline_type: Option<PipelineType>,
    ) -> Option<&PipelineNotation> {
        match pipeline_type {
            Some(ty) => self
                .pipeline_index
                .get(&(name.to_owned(), ty))
                .map(|&i| &self.pipelines[i]),
            None => PipelineType::PROBE_ORDER
                .iter()
                .find_map(|&ty| self.pipeline(name, Some(ty))),
        }
    }

    pub fn pipeline_by_index(&self, index: usize) -> Option<&PipelineNotation> {
        self.pipelines.get(index)
    }

    /// Convenience accessor used by the loader when resolving signature
    /// names: the plain descriptor without the `Ignored` flag.
    pub fn resource_signature_desc(&self, name: &str) -> Option<&ResourceSignatureDesc> {
        self.resource_signature(name).map(|n| &n.desc)
    }

    pub fn info(&self) -> ParserInfo {
        ParserInfo {
            shaders: self.shaders.len(),
            render_passes: self.render_passes.len(),
            resource_signatures: self.signatures.len(),
            pipelines: self.pipelines.len(),
        }
    }

    /// Whether a secondary stream factory is available for hot reload.
    pub fn can_reload(&self) -> bool {
        self.reload_streams.is_some()
    }

    /// Re-parses every previously parsed file, preferring the secondary
    /// stream factory. Existing names keep their indices, new names append.
    pub fn reload(&mut self) -> Result<(), ParseError> {
        if self.reload_streams.is_none() {
            return Err(ParseError::ReloadUnsupported);
        }
        let files = self.parsed_files.clone();
        for file in files {
            log::debug!("reloading notation file '{file}'");
            let text = self.read_source(&file, true)?;
            let mut visited = HashSet::new();
            visited.insert(file.clone());
            self.add_document(&file, &text, true, &mut visited, true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser_with(files: &[(&str, &str)]) -> NotationParser {
        let streams = SourceStreamFactory::in_memory();
        for (name, text) in files {
            streams.insert(*name, text.as_bytes().to_vec());
        }
        NotationParser::new(streams, None)
    }

    #[test]
    fn imports_resolve_recursively() {
        let mut parser = parser_with(&[
            (
                "main.json",
                r#"{
                    "Imports": ["common.json"],
                    "Pipelines": [{
                        "Type": "COMPUTE", "Name": "Cull", "ComputeShader": "CS"
                    }]
                }"#,
            ),
            (
                "common.json",
                r#"{ "Shaders": [{ "Name": "CS", "Stage": "COMPUTE", "Path": "cs.hlsl" }] }"#,
            ),
        ]);
        parser.parse_file("main.json").unwrap();
        assert!(parser.shader("CS").is_some());
        assert!(parser.pipeline("Cull", None).is_some());
        assert_eq!(parser.info().shaders, 1);
    }

    #[test]
    fn diamond_imports_parse_once() {
        let mut parser = parser_with(&[
            (
                "main.json",
                r#"{ "Imports": ["a.json", "b.json"] }"#,
            ),
            ("a.json", r#"{ "Imports": ["base.json"] }"#),
            ("b.json", r#"{ "Imports": ["base.json"] }"#),
            (
                "base.json",
                r#"{ "Shaders": [{ "Name": "VS", "Stage": "VERTEX", "Path": "vs.hlsl" }] }"#,
            ),
        ]);
        parser.parse_file("main.json").unwrap();
        assert_eq!(parser.info().shaders, 1);
    }

    #[test]
    fn conflicting_redefinition_is_an_error() {
        let mut parser = parser_with(&[]);
        parser
            .parse_string(r#"{ "Shaders": [{ "Name": "VS", "Stage": "VERTEX", "Path": "a.hlsl" }] }"#)
            .unwrap();
        // Byte-identical redeclaration is idempotent.
        parser
            .parse_string(r#"{ "Shaders": [{ "Name": "VS", "Stage": "VERTEX", "Path": "a.hlsl" }] }"#)
            .unwrap();
        assert_eq!(parser.info().shaders, 1);

        let err = parser
            .parse_string(r#"{ "Shaders": [{ "Name": "VS", "Stage": "VERTEX", "Path": "b.hlsl" }] }"#)
            .unwrap_err();
        assert!(matches!(err, ParseError::Redefinition { kind: "shader", .. }));
    }

    #[test]
    fn ignored_redeclaration_marks_existing_signature() {
        let mut parser = parser_with(&[]);
        parser
            .parse_string(
                r#"{ "ResourceSignatures": [{
                    "Name": "Common",
                    "Resources": [{ "Name": "Constants", "Type": "CONSTANT_BUFFER" }]
                }] }"#,
            )
            .unwrap();
        assert!(!parser.resource_signature("Common").unwrap().ignored);

        parser
            .parse_string(r#"{ "ResourceSignatures": [{ "Name": "Common", "Ignored": true }] }"#)
            .unwrap();
        let signature = parser.resource_signature("Common").unwrap();
        assert!(signature.ignored);
        // The contents survive the ignored marking.
        assert_eq!(signature.desc.resources.len(), 1);
    }

    #[test]
    fn same_name_is_allowed_across_pipeline_types() {
        let mut parser = parser_with(&[]);
        parser
            .parse_string(
                r#"{ "Pipelines": [
                    { "Type": "COMPUTE", "Name": "Blur", "ComputeShader": "CS" },
                    { "Type": "GRAPHICS", "Name": "Blur", "VertexShader": "VS", "PixelShader": "PS" }
                ] }"#,
            )
            .unwrap();
        assert_eq!(parser.info().pipelines, 2);
        // Untyped lookup probes graphics before compute.
        let found = parser.pipeline("Blur", None).unwrap();
        assert_eq!(found.pipeline_type(), PipelineType::Graphics);
        let compute = parser.pipeline("Blur", Some(PipelineType::Compute)).unwrap();
        assert_eq!(compute.pipeline_type(), PipelineType::Compute);
    }

    #[test]
    fn reload_replaces_in_place_and_keeps_indices() {
        let streams = SourceStreamFactory::in_memory();
        streams.insert(
            "states.json",
            br#"{ "Pipelines": [{
                "Type": "GRAPHICS", "Name": "Opaque",
                "VertexShader": "VS", "PixelShader": "PS",
                "GraphicsPipeline": { "CullMode": "BACK" }
            }] }"#
                .to_vec(),
        );
        let reload = SourceStreamFactory::in_memory();
        reload.insert(
            "states.json",
            br#"{ "Pipelines": [{
                "Type": "GRAPHICS", "Name": "Opaque",
                "VertexShader": "VS", "PixelShader": "PS",
                "GraphicsPipeline": { "CullMode": "NONE" }
            }] }"#
                .to_vec(),
        );
        let mut parser = NotationParser::new(streams, Some(reload));
        parser.parse_file("states.json").unwrap();

        parser.reload().unwrap();
        assert_eq!(parser.info().pipelines, 1);
        match parser.pipeline_by_index(0).unwrap() {
            PipelineNotation::Graphics(n) => {
                assert_eq!(n.graphics.cull_mode, vermilion_device::types::CullMode::None);
            }
            other => panic!("unexpected notation: {other:?}"),
        }
    }

    #[test]
    fn reload_without_secondary_factory_fails() {
        let mut parser = parser_with(&[]);
        assert!(!parser.can_reload());
        assert!(matches!(parser.reload(), Err(ParseError::ReloadUnsupported)));
    }
}
