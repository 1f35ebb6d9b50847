//! Progressive Pass Tests
//!
//! Tests for:
//! - SSR: trace input selection, history blending, sample offsets, convergence
//! - SSR: lazily built normal distribution table, SSAO attenuation, cubemap fallback
//! - SSAO: frame-indexed kernels, quality changes, neutral clear
//! - Temporal super sampling: jitter, blend weights, history, convergence
//! - Shadow PCF kernel rotation

use glam::{Mat4, Vec2, Vec3};

use viewer_compositor::backend::recording::{Command, RecordingBackend};
use viewer_compositor::backend::{PassId, RenderTarget, ShaderStage, UniformValue};
use viewer_compositor::renderer::passes::shadow::PCF_KERNEL_BINDING;
use viewer_compositor::renderer::passes::ssao::SSAO_KERNEL_FRAMES;
use viewer_compositor::renderer::passes::{
    history_blend_weights, BlendWeights, GBuffer, ShadowMapPass, SsaoPass, SsrPass,
    TemporalSuperSampling,
};
use viewer_compositor::scene::{RenderItem, Scene};
use viewer_compositor::{Camera, TextureId, Viewport};

const SOURCE: TextureId = TextureId(9999);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ssr_setup() -> (RecordingBackend, GBuffer, SsrPass) {
    init_logger();
    let mut backend = RecordingBackend::new();
    let gbuffer = GBuffer::new(&mut backend, 64, 64);
    let ssr = SsrPass::new(&mut backend, 64, 64);
    (backend, gbuffer, ssr)
}

fn pass(backend: &RecordingBackend, label: &str) -> PassId {
    backend
        .pass_by_label(label)
        .unwrap_or_else(|| panic!("no pass labelled {label}"))
}

fn uniform<'a>(backend: &'a RecordingBackend, label: &str, name: &str) -> Option<&'a UniformValue> {
    backend.pass_uniform(pass(backend, label), name)
}

// ============================================================================
// SSR
// ============================================================================

#[test]
fn ssr_first_frame_traces_source_and_ignores_history() {
    let (mut backend, gbuffer, mut ssr) = ssr_setup();
    let camera = Camera::default();

    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 0);

    assert_eq!(uniform(&backend, "ssr.trace", "colorTex"), Some(&UniformValue::Texture(SOURCE)));
    assert_eq!(uniform(&backend, "ssr.blend", "weight1"), Some(&UniformValue::Float(2.0)));
    assert_eq!(uniform(&backend, "ssr.blend", "weight2"), Some(&UniformValue::Float(0.0)));
    assert_eq!(uniform(&backend, "ssr.trace", "sampleOffset"), Some(&UniformValue::Int(0)));
}

#[test]
fn ssr_later_frames_trace_previous_history() {
    let (mut backend, gbuffer, mut ssr) = ssr_setup();
    let camera = Camera::default();
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 0);

    for frame in 1..5 {
        let previous = ssr.history().previous();
        ssr.update(&mut backend, &camera, &gbuffer, SOURCE, frame);
        assert_eq!(
            uniform(&backend, "ssr.trace", "colorTex"),
            Some(&UniformValue::Texture(previous)),
            "frame {frame}"
        );
        assert_eq!(uniform(&backend, "ssr.blend", "weight2"), Some(&UniformValue::Float(1.0)));
        assert_eq!(
            uniform(&backend, "ssr.trace", "sampleOffset"),
            Some(&UniformValue::Int(frame as i32 * 10))
        );
    }
}

#[test]
fn ssr_history_swaps_once_per_update() {
    let (mut backend, gbuffer, mut ssr) = ssr_setup();
    let camera = Camera::default();

    let first = ssr.history().current();
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 0);
    // The blended frame becomes the next frame's history.
    assert_eq!(ssr.history().previous(), first);
    assert_eq!(backend.last_draw_target("ssr.blend"), Some(&RenderTarget::texture(first)));

    let second = ssr.history().current();
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 1);
    assert_eq!(ssr.history().previous(), second);
    assert_eq!(ssr.history().current(), first);
    assert_eq!(
        backend.last_draw_target("ssr.blur"),
        Some(&RenderTarget::texture(ssr.target_texture()))
    );
}

#[test]
fn ssr_blend_weights() {
    assert_eq!(history_blend_weights(0), BlendWeights { new: 2.0, history: 0.0 });
    assert_eq!(history_blend_weights(1), BlendWeights { new: 2.0, history: 1.0 });
    assert_eq!(history_blend_weights(500), BlendWeights { new: 2.0, history: 1.0 });
}

#[test]
fn ssr_sample_offset_wraps_table() {
    let (_backend, _gbuffer, ssr) = ssr_setup();
    assert_eq!(ssr.sample_offset(0), 0);
    assert_eq!(ssr.sample_offset(3), 30);
    assert_eq!(ssr.sample_offset(204), 2040);
    assert_eq!(ssr.sample_offset(205), 2);
}

#[test]
fn ssr_converges_after_every_sample_is_traced() {
    let (mut backend, _gbuffer, ssr) = ssr_setup();
    assert_eq!(ssr.total_samples(), 2048);
    assert_eq!(ssr.sample_per_frame(), 10);
    assert!(!ssr.is_finished(0));
    assert!(!ssr.is_finished(204));
    assert!(ssr.is_finished(205));

    let small = SsrPass::with_sampling(&mut backend, 8, 8, 100, 10);
    assert!(!small.is_finished(10));
    assert!(small.is_finished(11));

    let clamped = SsrPass::with_sampling(&mut backend, 8, 8, 8, 20);
    assert_eq!(clamped.sample_per_frame(), 8);
}

#[test]
fn ssr_normal_table_is_built_once() {
    let (mut backend, gbuffer, mut ssr) = ssr_setup();
    let camera = Camera::default();
    assert!(ssr.normal_distribution_texture().is_none());

    let allocations = backend.texture_allocations();
    ssr.set_physically_correct(&mut backend, true);
    let table = ssr.normal_distribution_texture().unwrap();
    assert_eq!(backend.texture_allocations(), allocations + 1);
    assert!(backend.texture_written(table));
    let desc = backend.texture_desc(table).unwrap();
    assert_eq!((desc.width, desc.height), (2048, 1));
    assert_eq!(desc.format, wgpu::TextureFormat::Rgba32Float);

    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 0);
    let trace = pass(&backend, "ssr.trace");
    assert_eq!(backend.pass_define(trace, ShaderStage::Fragment, "PHYSICALLY_CORRECT"), Some(None));
    assert_eq!(backend.pass_uniform(trace, "normalDistribution"), Some(&UniformValue::Texture(table)));

    ssr.set_physically_correct(&mut backend, false);
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 1);
    assert_eq!(backend.pass_define(trace, ShaderStage::Fragment, "PHYSICALLY_CORRECT"), None);

    ssr.set_physically_correct(&mut backend, true);
    assert_eq!(ssr.normal_distribution_texture(), Some(table));
    assert_eq!(backend.texture_allocations(), allocations + 1);
}

#[test]
fn ssr_ssao_attenuates_vertical_blur() {
    let (mut backend, gbuffer, mut ssr) = ssr_setup();
    let camera = Camera::default();
    let ao = TextureId(555);

    ssr.set_ssao_texture(Some(ao));
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 0);
    let blur = pass(&backend, "ssr.blur");
    assert_eq!(backend.pass_define(blur, ShaderStage::Fragment, "SSAO_ATTENUATION"), Some(None));
    assert_eq!(backend.pass_uniform(blur, "ssaoTex"), Some(&UniformValue::Texture(ao)));
    assert_eq!(backend.pass_uniform(blur, "blurDir"), Some(&UniformValue::Int(1)));

    ssr.set_ssao_texture(None);
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 1);
    assert_eq!(backend.pass_define(blur, ShaderStage::Fragment, "SSAO_ATTENUATION"), None);
    assert_eq!(backend.pass_uniform(blur, "ssaoTex"), None);
}

#[test]
fn ssr_falls_back_to_ambient_cubemap() {
    let (mut backend, mut gbuffer, mut ssr) = ssr_setup();
    let camera = Camera::default();

    ssr.set_ambient_cubemap(Some(TextureId(77)), 0.5);
    gbuffer.set_albedo_enabled(&mut backend, true);
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 0);
    let trace = pass(&backend, "ssr.trace");
    assert_eq!(backend.pass_define(trace, ShaderStage::Fragment, "SPECULAR_CUBEMAP"), Some(None));
    assert_eq!(backend.pass_uniform(trace, "specularCubemap"), Some(&UniformValue::Texture(TextureId(77))));
    assert_eq!(backend.pass_uniform(trace, "specularIntensity"), Some(&UniformValue::Float(0.5)));
    assert_eq!(
        backend.pass_uniform(trace, "gBufferTexture3"),
        gbuffer.albedo_texture().map(UniformValue::Texture).as_ref()
    );

    ssr.set_ambient_cubemap(None, 0.0);
    ssr.update(&mut backend, &camera, &gbuffer, SOURCE, 1);
    assert_eq!(backend.pass_define(trace, ShaderStage::Fragment, "SPECULAR_CUBEMAP"), None);
    assert_eq!(backend.pass_uniform(trace, "specularCubemap"), None);
}

#[test]
fn ssr_dispose_releases_history_and_table() {
    let (mut backend, gbuffer, mut ssr) = ssr_setup();
    ssr.set_physically_correct(&mut backend, true);
    ssr.resize(&mut backend, 32, 16);
    assert_eq!(backend.texture_size(ssr.history().previous()), Some((32, 16)));

    ssr.dispose(&mut backend);
    gbuffer.dispose(&mut backend);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_pass_count(), 0);
}

// ============================================================================
// SSAO
// ============================================================================

#[test]
fn ssao_uses_a_kernel_per_frame() {
    let mut backend = RecordingBackend::new();
    let mut ssao = SsaoPass::new(&mut backend, 64, 64);
    assert_eq!(ssao.kernel_size(), 12);
    assert_eq!(ssao.kernel(0).len(), 12 * 3);
    assert_ne!(ssao.kernel(0), ssao.kernel(1));
    assert_eq!(ssao.kernel(0), ssao.kernel(SSAO_KERNEL_FRAMES as u32));

    ssao.set_kernel_size(32);
    assert_eq!(ssao.kernel(5).len(), 32 * 3);
    assert!(!ssao.is_finished(SSAO_KERNEL_FRAMES as u32));
    assert!(ssao.is_finished(SSAO_KERNEL_FRAMES as u32 + 1));
}

#[test]
fn ssao_update_renders_estimate_then_two_blurs() {
    let mut backend = RecordingBackend::new();
    let gbuffer = GBuffer::new(&mut backend, 64, 64);
    let mut ssao = SsaoPass::new(&mut backend, 64, 64);

    ssao.update(&mut backend, &Camera::default(), &gbuffer, 4);
    assert_eq!(backend.drawn_labels(), vec!["ssao.estimate", "ssao.blur", "ssao.blur"]);
    assert_eq!(
        backend.last_draw_target("ssao.blur"),
        Some(&RenderTarget::texture(ssao.target_texture()))
    );

    let estimate = pass(&backend, "ssao.estimate");
    assert_eq!(
        backend.pass_uniform(estimate, "kernel"),
        Some(&UniformValue::FloatArray(ssao.kernel(4).to_vec()))
    );
    assert_eq!(
        backend.pass_define(estimate, ShaderStage::Fragment, "KERNEL_SIZE"),
        Some(Some("12"))
    );
}

#[test]
fn ssao_estimate_runs_at_half_resolution() {
    let mut backend = RecordingBackend::new();
    let gbuffer = GBuffer::new(&mut backend, 64, 48);
    let mut ssao = SsaoPass::new(&mut backend, 64, 48);
    ssao.update(&mut backend, &Camera::default(), &gbuffer, 0);

    let Some(RenderTarget::Textures(raw)) = backend.last_draw_target("ssao.estimate") else {
        panic!("estimate did not render into a texture");
    };
    assert_eq!(backend.texture_size(raw[0]), Some((32, 24)));
    assert_eq!(backend.texture_size(ssao.target_texture()), Some((64, 48)));
}

#[test]
fn ssao_clear_writes_white_once() {
    let mut backend = RecordingBackend::new();
    let gbuffer = GBuffer::new(&mut backend, 16, 16);
    let mut ssao = SsaoPass::new(&mut backend, 16, 16);
    let clears = |b: &RecordingBackend| b.count(|c| matches!(c, Command::Clear { .. }));

    ssao.clear(&mut backend);
    ssao.clear(&mut backend);
    assert_eq!(clears(&backend), 1);

    ssao.update(&mut backend, &Camera::default(), &gbuffer, 0);
    ssao.clear(&mut backend);
    assert_eq!(clears(&backend), 2);
}

// ============================================================================
// Temporal super sampling
// ============================================================================

#[test]
fn tss_jitter_is_a_subpixel_translation() {
    let mut backend = RecordingBackend::new();
    let tss = TemporalSuperSampling::new(&mut backend, 100, 50);
    let viewport = Viewport::new(100, 50, 1.0);

    let mut camera = Camera::default();
    let clean = camera.projection();
    tss.jitter_projection(&mut camera, &viewport);

    // Frame 0 uses Halton (0, 0), the lower-left pixel corner.
    let expected = Mat4::from_translation(Vec3::new(-1.0 / 100.0, -1.0 / 50.0, 0.0)) * clean;
    assert_eq!(camera.projection(), expected);

    camera.update();
    assert_eq!(camera.projection(), clean);
}

#[test]
fn tss_jitter_stays_within_one_pixel() {
    let mut backend = RecordingBackend::new();
    let mut tss = TemporalSuperSampling::new(&mut backend, 200, 100);
    let viewport = Viewport::new(100, 50, 2.0);

    for _ in 0..tss.jitter_count() {
        let mut camera = Camera::default();
        let clean = camera.projection();
        tss.jitter_projection(&mut camera, &viewport);
        let shift = camera.projection() * clean.inverse();
        let offset = Vec2::new(shift.w_axis.x, shift.w_axis.y);
        assert!(offset.x.abs() <= 1.0 / 200.0 + 1e-5, "{offset}");
        assert!(offset.y.abs() <= 1.0 / 100.0 + 1e-5, "{offset}");
        tss.next_frame();
    }
}

#[test]
fn tss_blend_weights_and_history() {
    let mut backend = RecordingBackend::new();
    let mut tss = TemporalSuperSampling::new(&mut backend, 32, 32);
    let viewport = Viewport::new(32, 32, 1.0);
    let source = tss.source_texture();

    tss.render(&mut backend, &viewport, source);
    assert_eq!(uniform(&backend, "tss.blend", "weight1"), Some(&UniformValue::Float(1.0)));
    assert_eq!(uniform(&backend, "tss.blend", "weight2"), Some(&UniformValue::Float(0.0)));
    assert_eq!(uniform(&backend, "tss.blend", "texture1"), Some(&UniformValue::Texture(source)));
    assert_eq!(
        uniform(&backend, "tss.output", "texture"),
        Some(&UniformValue::Texture(tss.output_texture()))
    );
    assert_eq!(backend.last_draw_target("tss.output"), Some(&RenderTarget::Screen));

    let history = tss.output_texture();
    tss.render(&mut backend, &viewport, source);
    assert_eq!(uniform(&backend, "tss.blend", "weight1"), Some(&UniformValue::Float(0.1)));
    assert_eq!(uniform(&backend, "tss.blend", "weight2"), Some(&UniformValue::Float(0.9)));
    assert_eq!(uniform(&backend, "tss.blend", "texture2"), Some(&UniformValue::Texture(history)));
    assert_ne!(tss.output_texture(), history);
}

#[test]
fn tss_finishes_after_every_jitter() {
    let mut backend = RecordingBackend::new();
    let mut tss = TemporalSuperSampling::with_frames(&mut backend, 16, 16, 4);
    let viewport = Viewport::new(16, 16, 1.0);
    let source = tss.source_texture();

    for _ in 0..3 {
        tss.render(&mut backend, &viewport, source);
    }
    assert!(!tss.is_finished());
    tss.render(&mut backend, &viewport, source);
    assert!(tss.is_finished());
    assert_eq!(tss.frame(), 4);

    tss.reset_frame();
    assert!(!tss.is_finished());
    assert_eq!(tss.frame(), 0);
}

#[test]
fn tss_source_framebuffer_and_dispose() {
    let mut backend = RecordingBackend::new();
    let mut tss = TemporalSuperSampling::new(&mut backend, 16, 16);
    let attachments = backend.framebuffer_attachments(tss.source_framebuffer()).unwrap();
    assert_eq!(attachments.len(), 2);
    assert_eq!(attachments[0], tss.source_texture());

    tss.resize(&mut backend, 40, 30);
    assert_eq!(backend.texture_size(tss.source_texture()), Some((40, 30)));
    assert_eq!(backend.texture_size(tss.output_texture()), Some((40, 30)));

    tss.dispose(&mut backend);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_framebuffer_count(), 0);
    assert_eq!(backend.live_pass_count(), 0);
}

// ============================================================================
// Shadow kernels
// ============================================================================

#[test]
fn shadow_kernel_rotates_per_frame() {
    let mut shadow = ShadowMapPass::default();
    assert_eq!(shadow.kernel_count(), 30);
    assert_eq!(shadow.kernel(0).len(), 6);

    let mut scene = Scene::new();
    scene.opaque.push(RenderItem::default());
    scene.opaque.push(RenderItem {
        receive_shadow: false,
        ..Default::default()
    });

    shadow.set_kernel_for_frame(&mut scene, 31);
    assert_eq!(shadow.kernel_index(), 1);
    let expected: Vec<f32> = shadow.kernel(1).iter().flat_map(|p| [p.x, p.y]).collect();
    assert_eq!(
        scene.opaque[0].material.get(PCF_KERNEL_BINDING),
        Some(&UniformValue::FloatArray(expected))
    );
    assert_eq!(scene.opaque[1].material.get(PCF_KERNEL_BINDING), None);
}

#[test]
fn shadow_map_renders_with_first_kernel() {
    let mut backend = RecordingBackend::new();
    let mut shadow = ShadowMapPass::new(4, 9);
    let mut scene = Scene::new();

    shadow.set_kernel_for_frame(&mut scene, 3);
    shadow.render(&mut backend, &scene, &Camera::default());
    assert_eq!(shadow.kernel_index(), 0);
    assert_eq!(backend.commands(), &[Command::RenderShadowMap { kernel_len: 9 }]);
}
