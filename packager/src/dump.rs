//! Bytecode dumping.
//!
//! Writes every backend artifact the packager retained to a directory
//! tree keyed `<root>/<BackendName>/<PipelineType>/<PipelineName>/
//! <ShaderName><ext>`, with Metal backends additionally emitting a
//! sibling `.metal`/`.metallib` pair.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vermilion_device::flags::DeviceFlags;
use vermilion_device::objects::PipelineState;

/// A failed write or directory creation during a dump.
#[derive(Debug)]
pub struct DumpError {
    path: PathBuf,
    error: std::io::Error,
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bytecode dump failed at '{}': {}",
            self.path.display(),
            self.error
        )
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A push/pop path stack with idempotent directory creation.
///
/// `with_dir` descends into a subdirectory for the duration of the
/// closure and pops back out afterwards, on success and on error alike.
struct DirStack {
    path: PathBuf,
}

impl DirStack {
    fn new(root: &Path) -> Result<Self, DumpError> {
        fs::create_dir_all(root).map_err(|error| DumpError {
            path: root.to_path_buf(),
            error,
        })?;
        Ok(Self {
            path: root.to_path_buf(),
        })
    }

    fn with_dir<R>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut Self) -> Result<R, DumpError>,
    ) -> Result<R, DumpError> {
        self.path.push(name);
        let created = if self.path.is_dir() {
            Ok(())
        } else {
            fs::create_dir(&self.path)
        };
        let result = match created {
            Ok(()) => f(self),
            Err(error) => Err(DumpError {
                path: self.path.clone(),
                error,
            }),
        };
        self.path.pop();
        result
    }

    fn write_file(&self, name: &str, bytes: &[u8]) -> Result<(), DumpError> {
        let path = self.path.join(name);
        fs::write(&path, bytes).map_err(|error| DumpError { path, error })
    }
}

/// Dumps every retained shader artifact of `pipelines` for every backend
/// in `flags`. Any failure aborts the whole dump; the archive produced
/// before the dump stays valid.
pub fn dump_bytecode(
    root: &Path,
    pipelines: &[Arc<PipelineState>],
    flags: DeviceFlags,
) -> Result<(), DumpError> {
    let mut stack = DirStack::new(root)?;
    for backend in flags.backends() {
        stack.with_dir(backend.name(), |dir| {
            for pipeline in pipelines {
                dir.with_dir(pipeline.pipeline_type().name(), |dir| {
                    dir.with_dir(pipeline.name(), |dir| {
                        for shader in pipeline.shaders() {
                            let Some(artifact) = shader.artifact(backend) else {
                                continue;
                            };
                            log::trace!(
                                "dumping '{}' for {} ({} bytes)",
                                shader.name(),
                                backend.name(),
                                artifact.bytes.len()
                            );
                            let file =
                                format!("{}{}", shader.name(), backend.artifact_extension());
                            dir.write_file(&file, &artifact.bytes)?;
                            if backend.is_metal() {
                                // Metal always ships the source and library
                                // pair next to the primary artifact.
                                dir.write_file(
                                    &format!("{}.metal", shader.name()),
                                    &artifact.bytes,
                                )?;
                                dir.write_file(
                                    &format!("{}.metallib", shader.name()),
                                    &artifact.bytes,
                                )?;
                            }
                        }
                        Ok(())
                    })
                })?;
            }
            Ok(())
        })?;
    }
    Ok(())
}
