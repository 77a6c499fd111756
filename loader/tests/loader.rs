//! Loader behavior tests against the backend-free device.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use vermilion_core::streams::SourceStreamFactory;
use vermilion_device::device::{NullDevice, RenderDevice, SerializationDeviceCreateInfo};
use vermilion_device::flags::DeviceFlags;
use vermilion_device::types::{
    ComparisonFunc, CullMode, PipelineStateCreateInfo, PipelineType, PrimitiveTopology,
    RenderPassDesc, ResourceSignatureDesc, ShaderCreateInfo,
};
use vermilion_loader::{LoaderError, PipelineLoadOptions, RenderStateLoader};
use vermilion_notation::NotationParser;

const STATES: &str = r#"{
    "Shaders": [
        { "Name": "VS", "Stage": "VERTEX", "Source": "void vs() {}" },
        { "Name": "PS", "Stage": "PIXEL", "Source": "void ps() {}" },
        { "Name": "CS", "Stage": "COMPUTE", "Source": "void cs() {}" }
    ],
    "RenderPasses": [
        {
            "Name": "Main",
            "Attachments": [{ "Format": "RGBA8_UNORM" }],
            "Subpasses": [{ "RenderTargets": [0] }]
        }
    ],
    "ResourceSignatures": [
        {
            "Name": "Common",
            "Resources": [{ "Name": "Constants", "Type": "CONSTANT_BUFFER" }]
        }
    ],
    "Pipelines": [
        {
            "Type": "GRAPHICS",
            "Name": "Opaque",
            "VertexShader": "VS",
            "PixelShader": "PS",
            "RenderPass": "Main",
            "ResourceSignatures": ["Common"],
            "GraphicsPipeline": {
                "NumRenderTargets": 1,
                "RtvFormats": ["RGBA8_UNORM"]
            }
        },
        { "Type": "COMPUTE", "Name": "Cull", "ComputeShader": "CS" }
    ]
}"#;

fn make_loader(reload_states: Option<&str>) -> (RenderStateLoader, Arc<NullDevice>) {
    let _ = env_logger::builder().is_test(true).try_init();

    let streams = SourceStreamFactory::in_memory();
    streams.insert("states.json", STATES.as_bytes().to_vec());
    let reload = reload_states.map(|text| {
        let factory = SourceStreamFactory::in_memory();
        factory.insert("states.json", text.as_bytes().to_vec());
        factory
    });

    let mut parser = NotationParser::new(streams, reload);
    parser.parse_file("states.json").unwrap();

    let device = Arc::new(NullDevice::new(
        SerializationDeviceCreateInfo {
            device_flags: DeviceFlags::VULKAN,
            ..Default::default()
        },
        SourceStreamFactory::in_memory(),
    ));
    let dyn_device: Arc<dyn RenderDevice> = device.clone();
    (
        RenderStateLoader::new(parser, dyn_device, DeviceFlags::VULKAN),
        device,
    )
}

#[test]
fn repeated_loads_are_memoized() {
    let (mut loader, device) = make_loader(None);

    let first = loader.load_shader("VS", true, None).unwrap();
    let second = loader.load_shader("VS", true, None).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(device.creation_counts().shaders, 1);

    // Without caching, every load constructs a fresh object.
    let third = loader.load_shader("VS", false, None).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(device.creation_counts().shaders, 2);
}

#[test]
fn single_object_loads_are_memoized() {
    let (mut loader, device) = make_loader(None);

    let pass = loader.load_render_pass("Main", true, None).unwrap();
    let pass_again = loader.load_render_pass("Main", true, None).unwrap();
    assert!(Arc::ptr_eq(&pass, &pass_again));

    let signature = loader.load_resource_signature("Common", true, None).unwrap();
    let signature_again = loader.load_resource_signature("Common", true, None).unwrap();
    assert!(Arc::ptr_eq(&signature, &signature_again));

    let counts = device.creation_counts();
    assert_eq!(counts.render_passes, 1);
    assert_eq!(counts.resource_signatures, 1);

    // A later pipeline load reuses both cached objects.
    loader
        .load_pipeline_state("Opaque", PipelineLoadOptions::default())
        .unwrap();
    let counts = device.creation_counts();
    assert_eq!(counts.render_passes, 1);
    assert_eq!(counts.resource_signatures, 1);
}

#[test]
fn pipeline_cache_holds_one_entry_per_key() {
    let (mut loader, device) = make_loader(None);

    let first = loader
        .load_pipeline_state("Opaque", PipelineLoadOptions::default())
        .unwrap();
    let second = loader
        .load_pipeline_state("Opaque", PipelineLoadOptions::default())
        .unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(loader.cached_pipeline_count(), 1);

    let counts = device.creation_counts();
    assert_eq!(counts.pipelines, 1);
    assert_eq!(counts.shaders, 2);
    assert_eq!(counts.render_passes, 1);
    assert_eq!(counts.resource_signatures, 1);
}

#[test]
fn dependencies_resolve_in_contract_order() {
    let (mut loader, _device) = make_loader(None);

    let order = Rc::new(RefCell::new(Vec::new()));
    let (sig_log, rp_log, shader_log, pso_log) =
        (order.clone(), order.clone(), order.clone(), order.clone());

    let mut on_signature = move |_: &mut ResourceSignatureDesc, _: &mut bool| {
        sig_log.borrow_mut().push("signature")
    };
    let mut on_render_pass = move |_: &mut RenderPassDesc, _: &mut bool| {
        rp_log.borrow_mut().push("render pass")
    };
    let mut on_shader =
        move |_: &mut ShaderCreateInfo, _: &mut bool| shader_log.borrow_mut().push("shader");
    let mut on_pipeline =
        move |_: &mut PipelineStateCreateInfo| pso_log.borrow_mut().push("pipeline");

    loader
        .load_pipeline_state(
            "Opaque",
            PipelineLoadOptions {
                modify_resource_signature: Some(&mut on_signature),
                modify_render_pass: Some(&mut on_render_pass),
                modify_shader: Some(&mut on_shader),
                modify_pipeline: Some(&mut on_pipeline),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(
        *order.borrow(),
        vec!["signature", "render pass", "shader", "shader", "pipeline"]
    );
}

#[test]
fn untyped_lookup_probes_pipeline_types() {
    let (mut loader, _device) = make_loader(None);

    // "Cull" exists only as a compute pipeline.
    let pipeline = loader
        .load_pipeline_state("Cull", PipelineLoadOptions::default())
        .unwrap();
    assert_eq!(pipeline.pipeline_type(), PipelineType::Compute);

    let err = loader
        .load_pipeline_state(
            "Cull",
            PipelineLoadOptions {
                pipeline_type: Some(PipelineType::Graphics),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, LoaderError::NotFound { .. }));
}

#[test]
fn dependency_callback_can_opt_out_of_caching() {
    let (mut loader, device) = make_loader(None);

    let mut keep_shaders_uncached = |_: &mut ShaderCreateInfo, add_to_cache: &mut bool| {
        // The flag arrives initialized to the parent's add_to_cache.
        assert!(*add_to_cache);
        *add_to_cache = false;
    };
    loader
        .load_pipeline_state(
            "Opaque",
            PipelineLoadOptions {
                modify_shader: Some(&mut keep_shaders_uncached),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(loader.cached_shader_count(), 0);
    assert_eq!(loader.cached_render_pass_count(), 1);
    assert_eq!(loader.cached_pipeline_count(), 1);

    // The shaders were still constructed once for the pipeline.
    assert_eq!(device.creation_counts().shaders, 2);
}

#[test]
fn missing_name_fails_without_side_effects() {
    let (mut loader, device) = make_loader(None);
    let err = loader
        .load_pipeline_state("DoesNotExist", PipelineLoadOptions::default())
        .unwrap_err();
    assert!(matches!(err, LoaderError::NotFound { kind: "pipeline", .. }));
    assert_eq!(device.creation_counts().pipelines, 0);
    assert_eq!(loader.cached_pipeline_count(), 0);
}

#[test]
fn reload_patches_descriptor_in_place() {
    let reloaded = STATES
        .replace(r#""NumRenderTargets": 1"#, r#""NumRenderTargets": 2"#)
        .replace(
            r#""RtvFormats": ["RGBA8_UNORM"]"#,
            r#""RtvFormats": ["RGBA8_UNORM", "RGBA16_FLOAT"],
               "PrimitiveTopology": "TRIANGLE_STRIP",
               "CullMode": "NONE",
               "DepthStencil": { "DepthFunc": "LESS_EQUAL" }"#,
        );
    let (mut loader, _device) = make_loader(Some(&reloaded));

    let pipeline = loader
        .load_pipeline_state("Opaque", PipelineLoadOptions::default())
        .unwrap();
    let before = pipeline.graphics_desc().unwrap();
    assert_eq!(before.depth_stencil.depth_func, ComparisonFunc::Less);
    assert_eq!(before.cull_mode, CullMode::Back);
    assert_eq!(before.num_render_targets, 1);
    assert_eq!(before.primitive_topology, PrimitiveTopology::TriangleList);

    loader.reload().unwrap();

    // Identity is preserved: the same Arc now reads the new descriptor.
    let same = loader
        .cached_pipeline("Opaque", Some(PipelineType::Graphics))
        .unwrap();
    assert!(Arc::ptr_eq(&pipeline, &same));
    let after = pipeline.graphics_desc().unwrap();
    assert_eq!(after.depth_stencil.depth_func, ComparisonFunc::LessEqual);
    assert_eq!(after.cull_mode, CullMode::None);
    assert_eq!(after.num_render_targets, 2);
    assert_eq!(after.primitive_topology, PrimitiveTopology::TriangleStrip);
}

#[test]
fn reload_without_secondary_source_fails() {
    let (mut loader, _device) = make_loader(None);
    assert!(matches!(
        loader.reload(),
        Err(LoaderError::Parse(
            vermilion_notation::ParseError::ReloadUnsupported
        ))
    ));
}
