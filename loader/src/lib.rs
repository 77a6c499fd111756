//! Live, cached, on-demand render-state loading.
//!
//! The [`RenderStateLoader`] resolves one named object at a time for
//! runtime use: given a name it looks up the notation, recursively
//! resolves every dependency the notation names, lets the caller modify
//! each descriptor before construction, creates the engine object through
//! a [`RenderDevice`], and memoizes the result in per-kind caches so that
//! repeated loads return the same `Arc` without touching the device again.
//!
//! The loader is not internally synchronized: the whole API takes
//! `&mut self`, so concurrent use requires external locking by design.

use std::collections::HashMap;
use std::sync::Arc;

use vermilion_device::device::{DeviceError, RenderDevice};
use vermilion_device::flags::DeviceFlags;
use vermilion_device::objects::{PipelineState, RenderPass, ResourceSignature, Shader};
use vermilion_device::types::{
    ComputePipelineCreateInfo, GeneralShaderGroup, GraphicsPipelineCreateInfo,
    PipelineStateCreateInfo, PipelineType, ProceduralHitShaderGroup, RayTracingPipelineCreateInfo,
    RenderPassDesc, ResourceSignatureDesc, ShaderCreateInfo, TilePipelineCreateInfo,
    TriangleHitShaderGroup,
};
use vermilion_notation::{
    GraphicsPipelineNotation, NotationParser, PipelineNotation, RayTracingPipelineNotation,
};

mod error;

pub use error::LoaderError;

/// Callback modifying a dependency descriptor before construction. The
/// `bool` decides whether the dependency enters its cache; it starts out
/// equal to the parent pipeline's `add_to_cache` flag.
pub type ModifyDependency<'a, T> = &'a mut dyn FnMut(&mut T, &mut bool);

/// Options for [`RenderStateLoader::load_pipeline_state`].
pub struct PipelineLoadOptions<'a> {
    /// Pipeline type to look up. `None` probes every type in
    /// [`PipelineType::PROBE_ORDER`] and accepts the first match.
    pub pipeline_type: Option<PipelineType>,
    /// Whether the resulting pipeline (and, by default, its dependencies)
    /// enter the caches.
    pub add_to_cache: bool,
    pub modify_resource_signature: Option<ModifyDependency<'a, ResourceSignatureDesc>>,
    pub modify_render_pass: Option<ModifyDependency<'a, RenderPassDesc>>,
    pub modify_shader: Option<ModifyDependency<'a, ShaderCreateInfo>>,
    /// Runs on the fully assembled create info, after every dependency has
    /// been resolved and immediately before device creation.
    pub modify_pipeline: Option<&'a mut dyn FnMut(&mut PipelineStateCreateInfo)>,
}

impl Default for PipelineLoadOptions<'_> {
    fn default() -> Self {
        Self {
            pipeline_type: None,
            add_to_cache: true,
            modify_resource_signature: None,
            modify_render_pass: None,
            modify_shader: None,
            modify_pipeline: None,
        }
    }
}

/// Resolves named render-state objects against a [`NotationParser`] with
/// per-kind memoization caches.
pub struct RenderStateLoader {
    parser: NotationParser,
    device: Arc<dyn RenderDevice>,
    device_flags: DeviceFlags,
    shaders: HashMap<String, Arc<Shader>>,
    render_passes: HashMap<String, Arc<RenderPass>>,
    signatures: HashMap<String, Arc<ResourceSignature>>,
    pipelines: HashMap<(String, PipelineType), Arc<PipelineState>>,
}

impl RenderStateLoader {
    pub fn new(
        parser: NotationParser,
        device: Arc<dyn RenderDevice>,
        device_flags: DeviceFlags,
    ) -> Self {
        Self {
            parser,
            device,
            device_flags,
            shaders: HashMap::new(),
            render_passes: HashMap::new(),
            signatures: HashMap::new(),
            pipelines: HashMap::new(),
        }
    }

    pub fn parser(&self) -> &NotationParser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut NotationParser {
        &mut self.parser
    }

    // ===== Single-object loads =====

    pub fn load_shader(
        &mut self,
        name: &str,
        add_to_cache: bool,
        mut modify: Option<&mut dyn FnMut(&mut ShaderCreateInfo)>,
    ) -> Result<Arc<Shader>, LoaderError> {
        debug_assert!(!name.is_empty(), "shader name must not be empty");
        if add_to_cache {
            if let Some(cached) = self.shaders.get(name) {
                return Ok(cached.clone());
            }
        }
        let mut desc = self
            .parser
            .shader(name)
            .ok_or_else(|| LoaderError::not_found("shader", name))?
            .clone();
        if let Some(modify) = modify.as_mut() {
            modify(&mut desc);
        }
        let shader = self.create_shader(&desc)?;
        if add_to_cache {
            self.shaders.insert(desc.name.clone(), shader.clone());
        }
        Ok(shader)
    }

    pub fn load_render_pass(
        &mut self,
        name: &str,
        add_to_cache: bool,
        mut modify: Option<&mut dyn FnMut(&mut RenderPassDesc)>,
    ) -> Result<Arc<RenderPass>, LoaderError> {
        debug_assert!(!name.is_empty(), "render pass name must not be empty");
        if add_to_cache {
            if let Some(cached) = self.render_passes.get(name) {
                return Ok(cached.clone());
            }
        }
        let mut desc = self
            .parser
            .render_pass(name)
            .ok_or_else(|| LoaderError::not_found("render pass", name))?
            .clone();
        if let Some(modify) = modify.as_mut() {
            modify(&mut desc);
        }
        let render_pass = self.device.create_render_pass(&desc)?;
        if add_to_cache {
            self.render_passes.insert(desc.name.clone(), render_pass.clone());
        }
        Ok(render_pass)
    }

    pub fn load_resource_signature(
        &mut self,
        name: &str,
        add_to_cache: bool,
        mut modify: Option<&mut dyn FnMut(&mut ResourceSignatureDesc)>,
    ) -> Result<Arc<ResourceSignature>, LoaderError> {
        debug_assert!(!name.is_empty(), "resource signature name must not be empty");
        if add_to_cache {
            if let Some(cached) = self.signatures.get(name) {
                return Ok(cached.clone());
            }
        }
        let mut desc = self
            .parser
            .resource_signature_desc(name)
            .ok_or_else(|| LoaderError::not_found("resource signature", name))?
            .clone();
        if let Some(modify) = modify.as_mut() {
            modify(&mut desc);
        }
        let signature = self.device.create_resource_signature(&desc)?;
        if add_to_cache {
            self.signatures.insert(desc.name.clone(), signature.clone());
        }
        Ok(signature)
    }

    // ===== Pipeline load =====

    /// Loads a pipeline state and, recursively, everything it references.
    ///
    /// Dependencies resolve in the contract order resource signatures →
    /// render pass → shaders, each through the corresponding modify
    /// callback; `modify_pipeline` then sees the assembled create info.
    /// Any dependency failure aborts the whole load.
    pub fn load_pipeline_state(
        &mut self,
        name: &str,
        mut options: PipelineLoadOptions<'_>,
    ) -> Result<Arc<PipelineState>, LoaderError> {
        debug_assert!(!name.is_empty(), "pipeline name must not be empty");
        if options.add_to_cache {
            if let Some(cached) = self.cached_pipeline(name, options.pipeline_type) {
                return Ok(cached);
            }
        }
        let notation = self
            .parser
            .pipeline(name, options.pipeline_type)
            .ok_or_else(|| LoaderError::not_found("pipeline", name))?
            .clone();

        let mut create_info = match &notation {
            PipelineNotation::Graphics(n) => {
                self.assemble_graphics(n, PipelineType::Graphics, &mut options)?
            }
            PipelineNotation::Mesh(n) => {
                self.assemble_graphics(n, PipelineType::Mesh, &mut options)?
            }
            PipelineNotation::Compute(n) => {
                let resource_signatures =
                    self.resolve_signatures(&n.resource_signatures, &mut options)?;
                let compute_shader = self.resolve_shader(&n.compute_shader, &mut options)?;
                PipelineStateCreateInfo::Compute(ComputePipelineCreateInfo {
                    name: n.name.clone(),
                    compute_shader,
                    resource_signatures,
                })
            }
            PipelineNotation::Tile(n) => {
                let resource_signatures =
                    self.resolve_signatures(&n.resource_signatures, &mut options)?;
                let tile_shader = self.resolve_shader(&n.tile_shader, &mut options)?;
                PipelineStateCreateInfo::Tile(TilePipelineCreateInfo {
                    name: n.name.clone(),
                    tile_shader,
                    resource_signatures,
                })
            }
            PipelineNotation::RayTracing(n) => self.assemble_ray_tracing(n, &mut options)?,
        };

        if let Some(modify) = options.modify_pipeline.as_mut() {
            modify(&mut create_info);
        }
        let pipeline = self
            .device
            .create_pipeline_state(&create_info, self.device_flags)?;
        if options.add_to_cache {
            self.pipelines.insert(
                (pipeline.name().to_owned(), pipeline.pipeline_type()),
                pipeline.clone(),
            );
        }
        Ok(pipeline)
    }

    /// Re-parses the notation from its secondary source and patches the
    /// fixed-function descriptor of every cached graphics and mesh
    /// pipeline in place, preserving object identity.
    ///
    /// A pipeline missing after the re-parse is logged and skipped; shader
    /// and signature identity never changes across a reload.
    pub fn reload(&mut self) -> Result<(), LoaderError> {
        self.parser.reload()?;
        for ((name, pipeline_type), pipeline) in &self.pipelines {
            if !matches!(pipeline_type, PipelineType::Graphics | PipelineType::Mesh) {
                continue;
            }
            match self.parser.pipeline(name, Some(*pipeline_type)) {
                Some(PipelineNotation::Graphics(n)) | Some(PipelineNotation::Mesh(n)) => {
                    log::debug!("reloading pipeline '{name}'");
                    pipeline.patch_graphics_desc(n.graphics.clone());
                }
                _ => {
                    log::warn!(
                        "pipeline '{name}' is missing after reload; keeping its previous state"
                    );
                }
            }
        }
        Ok(())
    }

    // ===== Cache accessors =====

    pub fn cached_pipeline(
        &self,
        name: &str,
        pipeline_type: Option<PipelineType>,
    ) -> Option<Arc<PipelineState>> {
        match pipeline_type {
            Some(ty) => self.pipelines.get(&(name.to_owned(), ty)).cloned(),
            None => PipelineType::PROBE_ORDER
                .iter()
                .find_map(|&ty| self.pipelines.get(&(name.to_owned(), ty)).cloned()),
        }
    }

    pub fn cached_shader_count(&self) -> usize {
        self.shaders.len()
    }

    pub fn cached_render_pass_count(&self) -> usize {
        self.render_passes.len()
    }

    pub fn cached_signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn cached_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    // ===== Dependency resolution =====

    fn create_shader(&self, desc: &ShaderCreateInfo) -> Result<Arc<Shader>, DeviceError> {
        self.device.create_shader(desc, self.device_flags)
    }

    fn resolve_signatures(
        &mut self,
        names: &[String],
        options: &mut PipelineLoadOptions<'_>,
    ) -> Result<Vec<Arc<ResourceSignature>>, LoaderError> {
        names
            .iter()
            .map(|name| self.resolve_signature(name, options))
            .collect()
    }

    fn resolve_signature(
        &mut self,
        name: &str,
        options: &mut PipelineLoadOptions<'_>,
    ) -> Result<Arc<ResourceSignature>, LoaderError> {
        let mut add_to_cache = options.add_to_cache;
        if add_to_cache {
            if let Some(cached) = self.signatures.get(name) {
                return Ok(cached.clone());
            }
        }
        let mut desc = self
            .parser
            .resource_signature_desc(name)
            .ok_or_else(|| LoaderError::not_found("resource signature", name))?
            .clone();
        if let Some(modify) = options.modify_resource_signature.as_mut() {
            modify(&mut desc, &mut add_to_cache);
        }
        let signature = self.device.create_resource_signature(&desc)?;
        if add_to_cache {
            self.signatures.insert(desc.name.clone(), signature.clone());
        }
        Ok(signature)
    }

    fn resolve_render_pass(
        &mut self,
        name: &str,
        options: &mut PipelineLoadOptions<'_>,
    ) -> Result<Arc<RenderPass>, LoaderError> {
        let mut add_to_cache = options.add_to_cache;
        if add_to_cache {
            if let Some(cached) = self.render_passes.get(name) {
                return Ok(cached.clone());
            }
        }
        let mut desc = self
            .parser
            .render_pass(name)
            .ok_or_else(|| LoaderError::not_found("render pass", name))?
            .clone();
        if let Some(modify) = options.modify_render_pass.as_mut() {
            modify(&mut desc, &mut add_to_cache);
        }
        let render_pass = self.device.create_render_pass(&desc)?;
        if add_to_cache {
            self.render_passes.insert(desc.name.clone(), render_pass.clone());
        }
        Ok(render_pass)
    }

    fn resolve_shader(
        &mut self,
        name: &str,
        options: &mut PipelineLoadOptions<'_>,
    ) -> Result<Arc<Shader>, LoaderError> {
        let mut add_to_cache = options.add_to_cache;
        if add_to_cache {
            if let Some(cached) = self.shaders.get(name) {
                return Ok(cached.clone());
            }
        }
        let mut desc = self
            .parser
            .shader(name)
            .ok_or_else(|| LoaderError::not_found("shader", name))?
            .clone();
        if let Some(modify) = options.modify_shader.as_mut() {
            modify(&mut desc, &mut add_to_cache);
        }
        let shader = self.create_shader(&desc)?;
        if add_to_cache {
            self.shaders.insert(desc.name.clone(), shader.clone());
        }
        Ok(shader)
    }

    fn resolve_shader_slot(
        &mut self,
        name: &Option<String>,
        options: &mut PipelineLoadOptions<'_>,
    ) -> Result<Option<Arc<Shader>>, LoaderError> {
        match name {
            Some(name) => Ok(Some(self.resolve_shader(name, options)?)),
            None => Ok(None),
        }
    }

    fn assemble_graphics(
        &mut self,
        notation: &GraphicsPipelineNotation,
        pipeline_type: PipelineType,
        options: &mut PipelineLoadOptions<'_>,
    ) -> Result<PipelineStateCreateInfo, LoaderError> {
        let resource_signatures =
            self.resolve_signatures(&notation.resource_signatures, options)?;
        let render_pass = match &notation.render_pass {
            Some(name) => Some(self.resolve_render_pass(name, options)?),
            None => None,
        };
        Ok(PipelineStateCreateInfo::Graphics(GraphicsPipelineCreateInfo {
            name: notation.name.clone(),
            pipeline_type,
            graphics: notation.graphics.clone(),
            vertex_shader: self.resolve_shader_slot(&notation.vertex_shader, options)?,
            pixel_shader: self.resolve_shader_slot(&notation.pixel_shader, options)?,
            geometry_shader: self.resolve_shader_slot(&notation.geometry_shader, options)?,
            hull_shader: self.resolve_shader_slot(&notation.hull_shader, options)?,
            domain_shader: self.resolve_shader_slot(&notation.domain_shader, options)?,
            amplification_shader: self
                .resolve_shader_slot(&notation.amplification_shader, options)?,
            mesh_shader: self.resolve_shader_slot(&notation.mesh_shader, options)?,
            render_pass,
            resource_signatures,
        }))
    }

    fn assemble_ray_tracing(
        &mut self,
        notation: &RayTracingPipelineNotation,
        options: &mut PipelineLoadOptions<'_>,
    ) -> Result<PipelineStateCreateInfo, LoaderError> {
        let resource_signatures =
            self.resolve_signatures(&notation.resource_signatures, options)?;
        let mut general_shaders = Vec::with_capacity(notation.general_shaders.len());
        for group in &notation.general_shaders {
            general_shaders.push(GeneralShaderGroup {
                name: group.name.clone(),
                shader: self.resolve_shader(&group.shader, options)?,
            });
        }
        let mut triangle_hit_shaders = Vec::with_capacity(notation.triangle_hit_shaders.len());
        for group in &notation.triangle_hit_shaders {
            triangle_hit_shaders.push(TriangleHitShaderGroup {
                name: group.name.clone(),
                closest_hit_shader: self.resolve_shader(&group.closest_hit_shader, options)?,
                any_hit_shader: self.resolve_shader_slot(&group.any_hit_shader, options)?,
            });
        }
        let mut procedural_hit_shaders =
            Vec::with_capacity(notation.procedural_hit_shaders.len());
        for group in &notation.procedural_hit_shaders {
            procedural_hit_shaders.push(ProceduralHitShaderGroup {
                name: group.name.clone(),
                intersection_shader: self.resolve_shader(&group.intersection_shader, options)?,
                closest_hit_shader: self
                    .resolve_shader_slot(&group.closest_hit_shader, options)?,
                any_hit_shader: self.resolve_shader_slot(&group.any_hit_shader, options)?,
            });
        }
        Ok(PipelineStateCreateInfo::RayTracing(RayTracingPipelineCreateInfo {
            name: notation.name.clone(),
            general_shaders,
            triangle_hit_shaders,
            procedural_hit_shaders,
            max_recursion_depth: notation.max_recursion_depth,
            resource_signatures,
        }))
    }
}
