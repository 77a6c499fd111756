//! The two-phase batch packager.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::{mpsc, Arc};

use vermilion_core::streams::SourceStreamFactory;
use vermilion_core::ThreadPool;
use vermilion_device::archive::{ArchiveError, Archiver};
use vermilion_device::device::RenderDevice;
use vermilion_device::flags::DeviceFlags;
use vermilion_device::objects::{PipelineState, RenderPass, ResourceSignature, Shader};
use vermilion_device::types::{
    ComputePipelineCreateInfo, GeneralShaderGroup, GraphicsPipelineCreateInfo,
    PipelineStateCreateInfo, PipelineType, ProceduralHitShaderGroup, RayTracingPipelineCreateInfo,
    TilePipelineCreateInfo, TriangleHitShaderGroup,
};
use vermilion_notation::{
    GraphicsPipelineNotation, NotationParser, ParseError, PipelineNotation,
    RayTracingPipelineNotation,
};

use crate::dump::{dump_bytecode, DumpError};

/// Errors produced by [`RenderStatePackager`].
#[derive(Debug)]
pub enum PackageError {
    /// A notation file failed to parse.
    Parse(ParseError),
    /// `execute` was called with no parsed files.
    NoFilesParsed,
    /// One or more construction tasks failed.
    Creation { errors: Vec<String> },
    /// The archiver rejected an object.
    Archive(ArchiveError),
    /// The bytecode dump failed after archiving succeeded.
    Dump(DumpError),
}

impl fmt::Display for PackageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageError::Parse(err) => write!(f, "{err}"),
            PackageError::NoFilesParsed => write!(f, "no notation files have been parsed"),
            PackageError::Creation { errors } => {
                write!(f, "Failed to create state objects: {}", errors.join("; "))
            }
            PackageError::Archive(err) => write!(f, "{err}"),
            PackageError::Dump(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PackageError {}

impl From<ParseError> for PackageError {
    fn from(err: ParseError) -> Self {
        PackageError::Parse(err)
    }
}

impl From<ArchiveError> for PackageError {
    fn from(err: ArchiveError) -> Self {
        PackageError::Archive(err)
    }
}

/// One Phase-1 result traveling back over the result channel.
enum Built {
    Shader(Arc<Shader>),
    RenderPass(Arc<RenderPass>),
    Signature(Arc<ResourceSignature>),
    Failed(String),
}

/// Bulk-builds every object a set of notation files declares.
///
/// State machine: `parse_files` → `execute` → `reset`, repeatable. The
/// device, stream factory and thread pool are shared and survive `reset`.
pub struct RenderStatePackager {
    device: Arc<dyn RenderDevice>,
    device_flags: DeviceFlags,
    streams: SourceStreamFactory,
    pool: Arc<ThreadPool>,
    parser: Option<Arc<NotationParser>>,
    shaders: HashMap<String, Arc<Shader>>,
    render_passes: HashMap<String, Arc<RenderPass>>,
    signatures: HashMap<String, Arc<ResourceSignature>>,
    ignored_signatures: HashSet<String>,
    pipelines: Vec<Arc<PipelineState>>,
}

impl RenderStatePackager {
    pub fn new(
        device: Arc<dyn RenderDevice>,
        device_flags: DeviceFlags,
        streams: SourceStreamFactory,
        pool: Arc<ThreadPool>,
    ) -> Self {
        Self {
            device,
            device_flags,
            streams,
            pool,
            parser: None,
            shaders: HashMap::new(),
            render_passes: HashMap::new(),
            signatures: HashMap::new(),
            ignored_signatures: HashSet::new(),
            pipelines: Vec::new(),
        }
    }

    /// Parses every path, in order, into one fresh parser. Later files may
    /// reference names declared by earlier ones, and may redeclare
    /// signatures as ignored to exclude them from this archive.
    pub fn parse_files<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<(), PackageError> {
        let mut parser = NotationParser::new(self.streams.clone(), None);
        for path in paths {
            parser.parse_file(path.as_ref())?;
        }
        let info = parser.info();
        log::info!(
            "parsed {} file(s): {} shaders, {} render passes, {} signatures, {} pipelines",
            paths.len(),
            info.shaders,
            info.render_passes,
            info.resource_signatures,
            info.pipelines
        );
        self.parser = Some(Arc::new(parser));
        Ok(())
    }

    /// Builds everything, hands signatures and pipelines to the archiver,
    /// and optionally dumps shader artifacts under `dump_dir`.
    ///
    /// On any construction failure no object reaches the archiver; the
    /// caller must not serialize. A dump failure occurs after archiving
    /// and leaves the archiver contents valid.
    pub fn execute(
        &mut self,
        archiver: &mut Archiver,
        dump_dir: Option<&Path>,
    ) -> Result<(), PackageError> {
        debug_assert!(self.parser.is_some(), "execute called before parse_files");
        let parser = self.parser.clone().ok_or(PackageError::NoFilesParsed)?;

        self.run_phase1(&parser)?;
        self.run_phase2(&parser)?;

        for signature in self.signatures.values() {
            if self.ignored_signatures.contains(signature.name()) {
                log::debug!("skipping ignored signature '{}'", signature.name());
                continue;
            }
            archiver.add_resource_signature(signature)?;
        }
        for pipeline in &self.pipelines {
            archiver.add_pipeline_state(pipeline)?;
        }

        if let Some(dir) = dump_dir {
            dump_bytecode(dir, &self.pipelines, self.device_flags)
                .map_err(PackageError::Dump)?;
        }
        Ok(())
    }

    /// Drops the parser and every built object, returning to the initial
    /// state for a new file set.
    pub fn reset(&mut self) {
        self.parser = None;
        self.shaders.clear();
        self.render_passes.clear();
        self.signatures.clear();
        self.ignored_signatures.clear();
        self.pipelines.clear();
    }

    /// The pipelines built by the last successful `execute`.
    pub fn pipelines(&self) -> &[Arc<PipelineState>] {
        &self.pipelines
    }

    /// Phase 1: shaders, render passes and signatures have no
    /// inter-dependencies and build fully concurrently. All tasks are
    /// enqueued before the single barrier; a failed task does not stop its
    /// siblings but fails the phase as a whole.
    fn run_phase1(&mut self, parser: &Arc<NotationParser>) -> Result<(), PackageError> {
        let info = parser.info();
        let (tx, rx) = mpsc::channel::<Built>();

        for index in 0..info.shaders {
            let Some(desc) = parser.shader_by_index(index).cloned() else {
                continue;
            };
            let device = self.device.clone();
            let flags = self.device_flags;
            let tx = tx.clone();
            self.pool.spawn(move || {
                let result = match device.create_shader(&desc, flags) {
                    Ok(shader) => Built::Shader(shader),
                    Err(err) => {
                        log::error!("{err}");
                        Built::Failed(err.to_string())
                    }
                };
                tx.send(result).ok();
            });
        }
        for index in 0..info.render_passes {
            let Some(desc) = parser.render_pass_by_index(index).cloned() else {
                continue;
            };
            let device = self.device.clone();
            let tx = tx.clone();
            self.pool.spawn(move || {
                let result = match device.create_render_pass(&desc) {
                    Ok(render_pass) => Built::RenderPass(render_pass),
                    Err(err) => {
                        log::error!("{err}");
                        Built::Failed(err.to_string())
                    }
                };
                tx.send(result).ok();
            });
        }
        for index in 0..info.resource_signatures {
            let Some(notation) = parser.resource_signature_by_index(index).cloned() else {
                continue;
            };
            if notation.ignored {
                self.ignored_signatures.insert(notation.desc.name.clone());
            }
            let device = self.device.clone();
            let tx = tx.clone();
            self.pool.spawn(move || {
                let result = match device.create_resource_signature(&notation.desc) {
                    Ok(signature) => Built::Signature(signature),
                    Err(err) => {
                        log::error!("{err}");
                        Built::Failed(err.to_string())
                    }
                };
                tx.send(result).ok();
            });
        }

        drop(tx);
        self.pool.wait_for_all();

        let mut errors = Vec::new();
        for built in rx.try_iter() {
            match built {
                Built::Shader(shader) => {
                    self.shaders.insert(shader.name().to_owned(), shader);
                }
                Built::RenderPass(render_pass) => {
                    self.render_passes
                        .insert(render_pass.name().to_owned(), render_pass);
                }
                Built::Signature(signature) => {
                    self.signatures
                        .insert(signature.name().to_owned(), signature);
                }
                Built::Failed(message) => errors.push(message),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PackageError::Creation { errors })
        }
    }

    /// Phase 2: one task per pipeline, resolving names against the
    /// read-only Phase-1 caches. Each task writes its own indexed result
    /// slot through the channel.
    fn run_phase2(&mut self, parser: &Arc<NotationParser>) -> Result<(), PackageError> {
        let info = parser.info();
        let shaders = Arc::new(self.shaders.clone());
        let render_passes = Arc::new(self.render_passes.clone());
        let signatures = Arc::new(self.signatures.clone());
        let (tx, rx) = mpsc::channel::<(usize, Result<Arc<PipelineState>, String>)>();

        for index in 0..info.pipelines {
            let Some(notation) = parser.pipeline_by_index(index).cloned() else {
                continue;
            };
            let device = self.device.clone();
            let flags = self.device_flags;
            let shaders = shaders.clone();
            let render_passes = render_passes.clone();
            let signatures = signatures.clone();
            let tx = tx.clone();
            self.pool.spawn(move || {
                let result = build_create_info(&notation, &shaders, &render_passes, &signatures)
                    .and_then(|create_info| {
                        device
                            .create_pipeline_state(&create_info, flags)
                            .map_err(|err| err.to_string())
                    });
                if let Err(message) = &result {
                    log::error!("{message}");
                }
                tx.send((index, result)).ok();
            });
        }

        drop(tx);
        self.pool.wait_for_all();

        let mut slots: Vec<Option<Arc<PipelineState>>> = vec![None; info.pipelines];
        let mut errors = Vec::new();
        for (index, result) in rx.try_iter() {
            match result {
                Ok(pipeline) => slots[index] = Some(pipeline),
                Err(message) => errors.push(message),
            }
        }
        if !errors.is_empty() {
            return Err(PackageError::Creation { errors });
        }
        self.pipelines = slots.into_iter().flatten().collect();
        Ok(())
    }
}

fn find_shader(shaders: &HashMap<String, Arc<Shader>>, name: &str) -> Result<Arc<Shader>, String> {
    shaders
        .get(name)
        .cloned()
        .ok_or_else(|| format!("Unable to find shader '{name}'"))
}

fn find_shader_slot(
    shaders: &HashMap<String, Arc<Shader>>,
    name: &Option<String>,
) -> Result<Option<Arc<Shader>>, String> {
    match name {
        Some(name) => Ok(Some(find_shader(shaders, name)?)),
        None => Ok(None),
    }
}

fn find_signatures(
    signatures: &HashMap<String, Arc<ResourceSignature>>,
    names: &[String],
) -> Result<Vec<Arc<ResourceSignature>>, String> {
    names
        .iter()
        .map(|name| {
            signatures
                .get(name)
                .cloned()
                .ok_or_else(|| format!("Unable to find resource signature '{name}'"))
        })
        .collect()
}

fn build_graphics_create_info(
    notation: &GraphicsPipelineNotation,
    pipeline_type: PipelineType,
    shaders: &HashMap<String, Arc<Shader>>,
    render_passes: &HashMap<String, Arc<RenderPass>>,
    signatures: &HashMap<String, Arc<ResourceSignature>>,
) -> Result<PipelineStateCreateInfo, String> {
    let render_pass = match &notation.render_pass {
        Some(name) => Some(
            render_passes
                .get(name)
                .cloned()
                .ok_or_else(|| format!("Unable to find render pass '{name}'"))?,
        ),
        None => None,
    };
    Ok(PipelineStateCreateInfo::Graphics(GraphicsPipelineCreateInfo {
        name: notation.name.clone(),
        pipeline_type,
        graphics: notation.graphics.clone(),
        vertex_shader: find_shader_slot(shaders, &notation.vertex_shader)?,
        pixel_shader: find_shader_slot(shaders, &notation.pixel_shader)?,
        geometry_shader: find_shader_slot(shaders, &notation.geometry_shader)?,
        hull_shader: find_shader_slot(shaders, &notation.hull_shader)?,
        domain_shader: find_shader_slot(shaders, &notation.domain_shader)?,
        amplification_shader: find_shader_slot(shaders, &notation.amplification_shader)?,
        mesh_shader: find_shader_slot(shaders, &notation.mesh_shader)?,
        render_pass,
        resource_signatures: find_signatures(signatures, &notation.resource_signatures)?,
    }))
}

fn build_ray_tracing_create_info(
    notation: &RayTracingPipelineNotation,
    shaders: &HashMap<String, Arc<Shader>>,
    signatures: &HashMap<String, Arc<ResourceSignature>>,
) -> Result<PipelineStateCreateInfo, String> {
    let mut general_shaders = Vec::with_capacity(notation.general_shaders.len());
    for group in &notation.general_shaders {
        general_shaders.push(GeneralShaderGroup {
            name: group.name.clone(),
            shader: find_shader(shaders, &group.shader)?,
        });
    }
    let mut triangle_hit_shaders = Vec::with_capacity(notation.triangle_hit_shaders.len());
    for group in &notation.triangle_hit_shaders {
        triangle_hit_shaders.push(TriangleHitShaderGroup {
            name: group.name.clone(),
            closest_hit_shader: find_shader(shaders, &group.closest_hit_shader)?,
            any_hit_shader: find_shader_slot(shaders, &group.any_hit_shader)?,
        });
    }
    let mut procedural_hit_shaders = Vec::with_capacity(notation.procedural_hit_shaders.len());
    for group in &notation.procedural_hit_shaders {
        procedural_hit_shaders.push(ProceduralHitShaderGroup {
            name: group.name.clone(),
            intersection_shader: find_shader(shaders, &group.intersection_shader)?,
            closest_hit_shader: find_shader_slot(shaders, &group.closest_hit_shader)?,
            any_hit_shader: find_shader_slot(shaders, &group.any_hit_shader)?,
        });
    }
    Ok(PipelineStateCreateInfo::RayTracing(RayTracingPipelineCreateInfo {
        name: notation.name.clone(),
        general_shaders,
        triangle_hit_shaders,
        procedural_hit_shaders,
        max_recursion_depth: notation.max_recursion_depth,
        resource_signatures: find_signatures(signatures, &notation.resource_signatures)?,
    }))
}

fn build_create_info(
    notation: &PipelineNotation,
    shaders: &HashMap<String, Arc<Shader>>,
    render_passes: &HashMap<String, Arc<RenderPass>>,
    signatures: &HashMap<String, Arc<ResourceSignature>>,
) -> Result<PipelineStateCreateInfo, String> {
    match notation {
        PipelineNotation::Graphics(n) => build_graphics_create_info(
            n,
            PipelineType::Graphics,
            shaders,
            render_passes,
            signatures,
        ),
        PipelineNotation::Mesh(n) => {
            build_graphics_create_info(n, PipelineType::Mesh, shaders, render_passes, signatures)
        }
        PipelineNotation::Compute(n) => {
            Ok(PipelineStateCreateInfo::Compute(ComputePipelineCreateInfo {
                name: n.name.clone(),
                compute_shader: find_shader(shaders, &n.compute_shader)?,
                resource_signatures: find_signatures(signatures, &n.resource_signatures)?,
            }))
        }
        PipelineNotation::Tile(n) => Ok(PipelineStateCreateInfo::Tile(TilePipelineCreateInfo {
            name: n.name.clone(),
            tile_shader: find_shader(shaders, &n.tile_shader)?,
            resource_signatures: find_signatures(signatures, &n.resource_signatures)?,
        })),
        PipelineNotation::RayTracing(n) => {
            build_ray_tracing_create_info(n, shaders, signatures)
        }
    }
}
