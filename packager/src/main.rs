//! `vermilion-pack`: offline render-state packaging CLI.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use vermilion_device::archive::{Archiver, Dearchiver};
use vermilion_device::flags::DeviceFlags;
use vermilion_packager::{EnvironmentCreateInfo, ParsingEnvironment};

#[derive(Debug, Parser)]
#[command(
    name = "vermilion-pack",
    about = "Builds a multi-backend render-state archive from notation files"
)]
struct Args {
    /// Shader source search directory (repeatable)
    #[arg(short = 's', long = "shader_dir")]
    shader_dir: Vec<PathBuf>,

    /// Notation/import search directory (repeatable)
    #[arg(short = 'r', long = "render_state_dir")]
    render_state_dir: Vec<PathBuf>,

    /// Input notation file (repeatable, at least one required)
    #[arg(short = 'i', long = "input", required = true)]
    input: Vec<String>,

    /// Device configuration JSON file
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Output archive path
    #[arg(short = 'o', long = "output", default_value = "Archive.bin")]
    output: PathBuf,

    /// Dump compiled shader artifacts under this directory
    #[arg(short = 'd', long = "dump_dir")]
    dump_dir: Option<PathBuf>,

    /// Worker thread count (0 = hardware concurrency)
    #[arg(short = 't', long = "thread", default_value_t = 0)]
    thread: usize,

    /// Content version recorded in the archive
    #[arg(short = 'v', long = "content_version", default_value_t = 0)]
    content_version: u32,

    /// Target Direct3D 11
    #[arg(long)]
    dx11: bool,
    /// Target Direct3D 12
    #[arg(long)]
    dx12: bool,
    /// Target Vulkan
    #[arg(long)]
    vulkan: bool,
    /// Target OpenGL
    #[arg(long)]
    opengl: bool,
    /// Target OpenGL ES
    #[arg(long)]
    opengles: bool,
    /// Target Metal on macOS
    #[arg(long = "metal_macos")]
    metal_macos: bool,
    /// Target Metal on iOS
    #[arg(long = "metal_ios")]
    metal_ios: bool,

    /// Mark the archive as reflection-stripped
    #[arg(long = "strip_reflection")]
    strip_reflection: bool,

    /// Print the archive contents after packaging
    #[arg(long = "print_contents")]
    print_contents: bool,
}

impl Args {
    fn device_flags(&self) -> DeviceFlags {
        let mut flags = DeviceFlags::empty();
        if self.dx11 {
            flags |= DeviceFlags::D3D11;
        }
        if self.dx12 {
            flags |= DeviceFlags::D3D12;
        }
        if self.vulkan {
            flags |= DeviceFlags::VULKAN;
        }
        if self.opengl {
            flags |= DeviceFlags::GL;
        }
        if self.opengles {
            flags |= DeviceFlags::GLES;
        }
        if self.metal_macos {
            flags |= DeviceFlags::METAL_MACOS;
        }
        if self.metal_ios {
            flags |= DeviceFlags::METAL_IOS;
        }
        flags
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut env = ParsingEnvironment::initialize(EnvironmentCreateInfo {
        device_flags: args.device_flags(),
        thread_count: args.thread,
        shader_dirs: args.shader_dir.clone(),
        render_state_dirs: args.render_state_dir.clone(),
        config_path: args.config.clone(),
        dump_dir: args.dump_dir.clone(),
    })?;

    let mut archiver = Archiver::new();
    archiver.set_strip_reflection(args.strip_reflection);

    let dump_dir = env.dump_dir().map(PathBuf::from);
    let packager = env.packager_mut();
    packager.parse_files(&args.input)?;
    packager.execute(&mut archiver, dump_dir.as_deref())?;

    let blob = archiver.serialize_to_blob(args.content_version)?;
    std::fs::write(&args.output, &blob)?;
    log::info!(
        "wrote {} ({} bytes, {} signatures, {} pipelines)",
        args.output.display(),
        blob.len(),
        archiver.signature_count(),
        archiver.pipeline_count()
    );

    if args.print_contents {
        let mut dearchiver = Dearchiver::new();
        dearchiver.load_archive(&blob)?;
        print!("{}", dearchiver.describe());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("vermilion-pack: {err}");
            ExitCode::FAILURE
        }
    }
}
