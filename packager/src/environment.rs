//! The packaging composition root.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use vermilion_core::streams::SourceStreamFactory;
use vermilion_core::ThreadPool;
use vermilion_device::device::{
    MetalDeviceConfig, NullDevice, RenderDevice, SerializationDeviceCreateInfo,
};
use vermilion_device::flags::DeviceFlags;

use crate::packager::RenderStatePackager;

/// Errors produced while setting up a [`ParsingEnvironment`].
#[derive(Debug)]
pub enum EnvironmentError {
    /// The device-flag set selects no backend at all.
    NoBackends,
    /// The device-configuration file could not be read or parsed.
    Config { path: PathBuf, message: String },
}

impl fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvironmentError::NoBackends => {
                write!(f, "at least one target backend must be selected")
            }
            EnvironmentError::Config { path, message } => {
                write!(f, "failed to load device config '{}': {message}", path.display())
            }
        }
    }
}

impl std::error::Error for EnvironmentError {}

/// Everything needed to set up a [`ParsingEnvironment`].
#[derive(Debug, Clone, Default)]
pub struct EnvironmentCreateInfo {
    pub device_flags: DeviceFlags,
    /// Worker thread count; zero means hardware concurrency.
    pub thread_count: usize,
    /// Search directories for shader source files.
    pub shader_dirs: Vec<PathBuf>,
    /// Search directories for notation and import files.
    pub render_state_dirs: Vec<PathBuf>,
    /// Optional device-configuration JSON file.
    pub config_path: Option<PathBuf>,
    /// Optional bytecode dump root.
    pub dump_dir: Option<PathBuf>,
}

/// The optional device-configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct DeviceConfig {
    metal_macos: MetalDeviceConfig,
    metal_ios: MetalDeviceConfig,
}

/// Owns the serialization device, the two stream factories, the thread
/// pool, and the packager built on top of them.
pub struct ParsingEnvironment {
    device: Arc<NullDevice>,
    shader_streams: SourceStreamFactory,
    state_streams: SourceStreamFactory,
    pool: Arc<ThreadPool>,
    packager: RenderStatePackager,
    dump_dir: Option<PathBuf>,
}

impl std::fmt::Debug for ParsingEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsingEnvironment")
            .field("dump_dir", &self.dump_dir)
            .finish_non_exhaustive()
    }
}

impl ParsingEnvironment {
    /// Builds the whole environment. Fails when no backend is selected or
    /// when the device-configuration file is broken.
    pub fn initialize(create_info: EnvironmentCreateInfo) -> Result<Self, EnvironmentError> {
        if create_info.device_flags.is_empty() {
            return Err(EnvironmentError::NoBackends);
        }

        let mut device_ci = SerializationDeviceCreateInfo {
            device_flags: create_info.device_flags,
            ..Default::default()
        };
        if let Some(path) = &create_info.config_path {
            let config = load_device_config(path)?;
            device_ci.metal_macos = config.metal_macos;
            device_ci.metal_ios = config.metal_ios;
        }

        let shader_streams = SourceStreamFactory::new(create_info.shader_dirs.clone());
        let state_streams = SourceStreamFactory::new(create_info.render_state_dirs.clone());
        let device = Arc::new(NullDevice::new(device_ci, shader_streams.clone()));
        let pool = Arc::new(if create_info.thread_count == 0 {
            ThreadPool::default_threads()
        } else {
            ThreadPool::new(create_info.thread_count)
        });
        log::info!(
            "parsing environment: {} backend(s), {} worker thread(s)",
            create_info.device_flags.backends().count(),
            pool.num_threads()
        );

        let dyn_device: Arc<dyn RenderDevice> = device.clone();
        let packager = RenderStatePackager::new(
            dyn_device,
            create_info.device_flags,
            state_streams.clone(),
            pool.clone(),
        );
        Ok(Self {
            device,
            shader_streams,
            state_streams,
            pool,
            packager,
            dump_dir: create_info.dump_dir,
        })
    }

    pub fn device(&self) -> &Arc<NullDevice> {
        &self.device
    }

    pub fn shader_streams(&self) -> &SourceStreamFactory {
        &self.shader_streams
    }

    pub fn state_streams(&self) -> &SourceStreamFactory {
        &self.state_streams
    }

    pub fn thread_pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    pub fn packager_mut(&mut self) -> &mut RenderStatePackager {
        &mut self.packager
    }

    pub fn dump_dir(&self) -> Option<&Path> {
        self.dump_dir.as_deref()
    }
}

fn load_device_config(path: &Path) -> Result<DeviceConfig, EnvironmentError> {
    let text = std::fs::read_to_string(path).map_err(|e| EnvironmentError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| EnvironmentError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use vermilion_device::flags::Backend;

    #[test]
    fn rejects_empty_backend_set() {
        let err = ParsingEnvironment::initialize(EnvironmentCreateInfo::default()).unwrap_err();
        assert!(matches!(err, EnvironmentError::NoBackends));
    }

    #[test]
    fn parses_device_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "MetalMacos": {{ "MslVersion": "2.3", "CompileOptions": "-O2" }} }}"#
        )
        .unwrap();

        let env = ParsingEnvironment::initialize(EnvironmentCreateInfo {
            device_flags: DeviceFlags::METAL_MACOS,
            thread_count: 2,
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(env.thread_pool().num_threads(), 2);
        assert_eq!(env.device().device_flags(), DeviceFlags::METAL_MACOS);
        let metal = env.device().metal_config(Backend::MetalMacos).unwrap();
        assert_eq!(metal.msl_version, Some("2.3".to_owned()));
        assert_eq!(metal.compile_options, "-O2");
    }

    #[test]
    fn broken_config_fails_initialize() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = ParsingEnvironment::initialize(EnvironmentCreateInfo {
            device_flags: DeviceFlags::VULKAN,
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, EnvironmentError::Config { .. }));
    }
}
