//! End-to-end packaging tests against the backend-free device.

use std::sync::Arc;

use vermilion_core::streams::SourceStreamFactory;
use vermilion_core::ThreadPool;
use vermilion_device::archive::{Archiver, Dearchiver};
use vermilion_device::device::{NullDevice, RenderDevice, SerializationDeviceCreateInfo};
use vermilion_device::flags::DeviceFlags;
use vermilion_device::types::PipelineType;
use vermilion_packager::{PackageError, RenderStatePackager};

fn make_packager(flags: DeviceFlags, files: &[(&str, &str)]) -> RenderStatePackager {
    let _ = env_logger::builder().is_test(true).try_init();

    let streams = SourceStreamFactory::in_memory();
    for (name, text) in files {
        streams.insert(*name, text.as_bytes().to_vec());
    }
    let device: Arc<dyn RenderDevice> = Arc::new(NullDevice::new(
        SerializationDeviceCreateInfo {
            device_flags: flags,
            ..Default::default()
        },
        SourceStreamFactory::in_memory(),
    ));
    RenderStatePackager::new(device, flags, streams, Arc::new(ThreadPool::new(4)))
}

const SIGNATURE_JSON: &str = r#"{
    "ResourceSignatures": [{
        "Name": "Common",
        "Resources": [{ "Name": "Constants", "Type": "CONSTANT_BUFFER" }]
    }]
}"#;

const PSO_JSON: &str = r#"{
    "Shaders": [{ "Name": "CS", "Stage": "COMPUTE", "Source": "void cs() {}" }],
    "Pipelines": [{
        "Type": "COMPUTE",
        "Name": "Cull",
        "ComputeShader": "CS",
        "ResourceSignatures": ["Common"]
    }]
}"#;

const IGNORE_SIGNATURE_JSON: &str = r#"{
    "ResourceSignatures": [{ "Name": "Common", "Ignored": true }]
}"#;

#[test]
fn packages_and_round_trips_through_the_archive() {
    let mut packager = make_packager(
        DeviceFlags::VULKAN | DeviceFlags::D3D12,
        &[("signature.json", SIGNATURE_JSON), ("pso.json", PSO_JSON)],
    );
    packager
        .parse_files(&["signature.json", "pso.json"])
        .unwrap();

    let mut archiver = Archiver::new();
    packager.execute(&mut archiver, None).unwrap();
    assert_eq!(archiver.signature_count(), 1);
    assert_eq!(archiver.pipeline_count(), 1);

    let blob = archiver.serialize_to_blob(7).unwrap();
    let mut dearchiver = Dearchiver::new();
    dearchiver.load_archive(&blob).unwrap();
    assert_eq!(dearchiver.content_version(), Some(7));

    let pipeline = dearchiver
        .unpack_pipeline_state("Cull", Some(PipelineType::Compute))
        .unwrap();
    assert_eq!(pipeline.resource_signatures.len(), 1);
    assert_eq!(pipeline.shaders.len(), 1);
    // The shader carries one artifact per flagged backend.
    assert_eq!(pipeline.shaders[0].artifacts().len(), 2);
}

#[test]
fn ignored_signatures_split_across_two_archives() {
    // First archive: the signature alone.
    let mut packager = make_packager(
        DeviceFlags::VULKAN,
        &[
            ("signature.json", SIGNATURE_JSON),
            ("pso.json", PSO_JSON),
            ("ignore.json", IGNORE_SIGNATURE_JSON),
        ],
    );
    packager.parse_files(&["signature.json"]).unwrap();
    let mut sig_archiver = Archiver::new();
    packager.execute(&mut sig_archiver, None).unwrap();
    let sig_blob = sig_archiver.serialize_to_blob(1).unwrap();

    // Second archive: the pipeline, with the signature marked ignored so
    // it is built for linking but not packed.
    packager.reset();
    packager
        .parse_files(&["signature.json", "pso.json", "ignore.json"])
        .unwrap();
    let mut pso_archiver = Archiver::new();
    packager.execute(&mut pso_archiver, None).unwrap();
    assert_eq!(pso_archiver.signature_count(), 0);
    assert_eq!(pso_archiver.pipeline_count(), 1);
    let pso_blob = pso_archiver.serialize_to_blob(1).unwrap();

    let mut dearchiver = Dearchiver::new();
    dearchiver.load_archive(&sig_blob).unwrap();
    dearchiver.load_archive(&pso_blob).unwrap();

    let pipeline = dearchiver.unpack_pipeline_state("Cull", None).unwrap();
    assert_eq!(pipeline.resource_signatures.len(), 1);
    assert_eq!(pipeline.resource_signatures[0].name(), "Common");
    let standalone = dearchiver.unpack_resource_signature("Common").unwrap();
    assert_eq!(
        standalone.desc(),
        pipeline.resource_signatures[0].desc()
    );
}

#[test]
fn phase1_failure_prevents_phase2() {
    // The broken render pass is referenced by no pipeline, but a Phase-1
    // failure must still fail the whole execute.
    let broken = r#"{
        "RenderPasses": [{
            "Name": "Broken",
            "Attachments": [{ "Format": "RGBA8_UNORM" }],
            "Subpasses": [{ "RenderTargets": [5] }]
        }]
    }"#;
    let mut packager = make_packager(
        DeviceFlags::VULKAN,
        &[
            ("signature.json", SIGNATURE_JSON),
            ("pso.json", PSO_JSON),
            ("broken.json", broken),
        ],
    );
    packager
        .parse_files(&["signature.json", "pso.json", "broken.json"])
        .unwrap();

    let mut archiver = Archiver::new();
    let err = packager.execute(&mut archiver, None).unwrap_err();
    assert!(matches!(err, PackageError::Creation { .. }));
    assert!(err.to_string().starts_with("Failed to create state objects"));
    // Nothing reached the archiver.
    assert_eq!(archiver.pipeline_count(), 0);
}

#[test]
fn missing_dependency_is_reported_by_name() {
    let dangling = r#"{
        "Pipelines": [{ "Type": "COMPUTE", "Name": "Cull", "ComputeShader": "Nope" }]
    }"#;
    let mut packager = make_packager(DeviceFlags::VULKAN, &[("pso.json", dangling)]);
    packager.parse_files(&["pso.json"]).unwrap();

    let mut archiver = Archiver::new();
    let err = packager.execute(&mut archiver, None).unwrap_err();
    assert!(err.to_string().contains("Unable to find shader 'Nope'"));
}

#[test]
fn dump_writes_backend_trees() {
    let mut packager = make_packager(
        DeviceFlags::VULKAN | DeviceFlags::METAL_MACOS,
        &[("pso.json", PSO_JSON), ("signature.json", SIGNATURE_JSON)],
    );
    packager
        .parse_files(&["signature.json", "pso.json"])
        .unwrap();

    let dump = tempfile::tempdir().unwrap();
    let mut archiver = Archiver::new();
    packager.execute(&mut archiver, Some(dump.path())).unwrap();

    let vulkan = dump.path().join("Vulkan/compute/Cull/CS.spv");
    assert!(vulkan.is_file(), "missing {}", vulkan.display());

    let metal_dir = dump.path().join("Metal_macOS/compute/Cull");
    for name in ["CS.air", "CS.metal", "CS.metallib"] {
        assert!(
            metal_dir.join(name).is_file(),
            "missing {}",
            metal_dir.join(name).display()
        );
    }
}

#[test]
fn reset_allows_reuse_with_a_new_file_set() {
    let other = r#"{
        "Shaders": [{ "Name": "TS", "Stage": "TILE", "Source": "void ts() {}" }],
        "Pipelines": [{ "Type": "TILE", "Name": "Shade", "TileShader": "TS" }]
    }"#;
    let mut packager = make_packager(
        DeviceFlags::VULKAN,
        &[
            ("signature.json", SIGNATURE_JSON),
            ("pso.json", PSO_JSON),
            ("tile.json", other),
        ],
    );

    packager
        .parse_files(&["signature.json", "pso.json"])
        .unwrap();
    let mut first = Archiver::new();
    packager.execute(&mut first, None).unwrap();
    assert_eq!(packager.pipelines().len(), 1);

    packager.reset();
    packager.parse_files(&["tile.json"]).unwrap();
    let mut second = Archiver::new();
    packager.execute(&mut second, None).unwrap();
    assert_eq!(second.pipeline_count(), 1);
    assert_eq!(packager.pipelines()[0].pipeline_type(), PipelineType::Tile);
}

#[test]
fn graphics_mesh_and_ray_tracing_pipelines_package() {
    let states = r#"{
        "Shaders": [
            { "Name": "VS", "Stage": "VERTEX", "Source": "void vs() {}" },
            { "Name": "PS", "Stage": "PIXEL", "Source": "void ps() {}" },
            { "Name": "MS", "Stage": "MESH", "Source": "void ms() {}" },
            { "Name": "RayGen", "Stage": "RAY_GEN", "Source": "void rg() {}" },
            { "Name": "Hit", "Stage": "CLOSEST_HIT", "Source": "void ch() {}" }
        ],
        "RenderPasses": [{
            "Name": "Main",
            "Attachments": [{ "Format": "RGBA8_UNORM" }],
            "Subpasses": [{ "RenderTargets": [0] }]
        }],
        "Pipelines": [
            {
                "Type": "GRAPHICS", "Name": "Opaque",
                "VertexShader": "VS", "PixelShader": "PS",
                "RenderPass": "Main",
                "GraphicsPipeline": {
                    "NumRenderTargets": 1, "RtvFormats": ["RGBA8_UNORM"]
                }
            },
            {
                "Type": "MESH", "Name": "Meshlets",
                "MeshShader": "MS", "PixelShader": "PS"
            },
            {
                "Type": "RAY_TRACING", "Name": "PathTrace",
                "GeneralShaders": [{ "Name": "Main", "Shader": "RayGen" }],
                "TriangleHitShaders": [{ "Name": "HitGroup", "ClosestHitShader": "Hit" }],
                "MaxRecursionDepth": 2
            }
        ]
    }"#;
    let mut packager = make_packager(DeviceFlags::VULKAN, &[("states.json", states)]);
    packager.parse_files(&["states.json"]).unwrap();

    let mut archiver = Archiver::new();
    packager.execute(&mut archiver, None).unwrap();
    assert_eq!(archiver.pipeline_count(), 3);

    let blob = archiver.serialize_to_blob(1).unwrap();
    let mut dearchiver = Dearchiver::new();
    dearchiver.load_archive(&blob).unwrap();

    let mesh = dearchiver
        .unpack_pipeline_state("Meshlets", Some(PipelineType::Mesh))
        .unwrap();
    assert!(mesh.graphics.is_some());
    let rt = dearchiver
        .unpack_pipeline_state("PathTrace", Some(PipelineType::RayTracing))
        .unwrap();
    assert_eq!(rt.shaders.len(), 2);
    assert!(dearchiver.unpack_render_pass("Main").is_ok());
}
