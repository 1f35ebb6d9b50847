//! Render Loop Tests
//!
//! Tests for:
//! - Fresh vs accumulation frames (shadow map reuse, frame counter)
//! - Color pass routing with post effects and temporal supersampling on/off
//! - Accumulation policy and convergence
//! - Partial option documents
//! - Scene-side bindings: SSAO map, PCF kernel, cubemap visibility, sorting
//! - Resize and dispose

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec3;

use viewer_compositor::backend::recording::{Command, RecordingBackend};
use viewer_compositor::backend::{RenderTarget, UniformValue};
use viewer_compositor::renderer::passes::shadow::PCF_KERNEL_BINDING;
use viewer_compositor::renderer::render_main::SSAO_MAP_BINDING;
use viewer_compositor::scene::{RenderItem, SceneLight, SortableGeometry};
use viewer_compositor::{
    PostEffectConfig, RenderMain, RenderMainSettings, Scene, TemporalSuperSamplingMode, TextureId,
    Viewport,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup(settings: RenderMainSettings) -> (RecordingBackend, RenderMain) {
    init_logger();
    let mut backend = RecordingBackend::new();
    let render_main = RenderMain::new(&mut backend, Viewport::new(400, 300, 1.0), settings).unwrap();
    (backend, render_main)
}

fn options(json: &str) -> PostEffectConfig {
    PostEffectConfig::from_json(json).unwrap()
}

fn scene_with_items() -> Scene {
    let mut scene = Scene::new();
    scene.opaque.push(RenderItem::default());
    scene.opaque.push(RenderItem::default());
    scene.transparent.push(RenderItem::default());
    scene
}

fn shadow_renders(backend: &RecordingBackend) -> usize {
    backend.count(|c| matches!(c, Command::RenderShadowMap { .. }))
}

fn scene_targets(backend: &RecordingBackend) -> Vec<RenderTarget> {
    backend
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::RenderScene { target } => Some(target.clone()),
            _ => None,
        })
        .collect()
}

/// Geometry recording which sort it was asked for.
#[derive(Debug, Default)]
struct SortRecorder {
    progressive: bool,
    triangles: bool,
    progressive_triangles: bool,
    progressive_calls: Rc<Cell<u32>>,
    triangle_calls: Rc<Cell<u32>>,
    progressive_triangle_calls: Rc<Cell<u32>>,
    last_frame: Rc<Cell<u32>>,
}

impl SortableGeometry for SortRecorder {
    fn needs_sort_triangles(&self) -> bool {
        self.triangles
    }

    fn sort_triangles(&mut self, _camera_position: Vec3, frame: u32) {
        self.triangle_calls.set(self.triangle_calls.get() + 1);
        self.last_frame.set(frame);
    }

    fn needs_sort_vertices_progressively(&self) -> bool {
        self.progressive
    }

    fn sort_vertices_progressively(&mut self, _camera_position: Vec3, frame: u32) {
        self.progressive_calls.set(self.progressive_calls.get() + 1);
        self.last_frame.set(frame);
    }

    fn needs_sort_triangles_progressively(&self) -> bool {
        self.progressive_triangles
    }

    fn sort_triangles_progressively(&mut self, _camera_position: Vec3, frame: u32) {
        self.progressive_triangle_calls
            .set(self.progressive_triangle_calls.get() + 1);
        self.last_frame.set(frame);
    }
}

// ============================================================================
// Defaults
// ============================================================================

#[test]
fn starts_without_post_effects() {
    let (_backend, render_main) = setup(RenderMainSettings::default());
    assert!(!render_main.is_post_effect_enabled());
    assert!(!render_main.is_linear_space());
    assert_eq!(render_main.temporal_super_sampling(), TemporalSuperSamplingMode::Auto);
    assert!(!render_main.needs_temporal_ss());
    assert!(!render_main.needs_accumulate());
    assert!(render_main.compositor().enabled_effects().is_empty());
    assert_eq!(render_main.frame(), 0);
}

#[test]
fn settings_reach_the_passes() {
    let settings = RenderMainSettings {
        pcf_kernel_count: 5,
        pcf_kernel_size: 4,
        temporal_frames: 12,
        ..Default::default()
    };
    let (_backend, render_main) = setup(settings);
    assert_eq!(render_main.shadow().kernel_count(), 5);
    assert_eq!(render_main.shadow().kernel(0).len(), 4);
    assert_eq!(render_main.temporal().jitter_count(), 12);
}

// ============================================================================
// Frames
// ============================================================================

#[test]
fn shadow_map_renders_only_on_fresh_frames() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    let mut scene = scene_with_items();

    render_main.prepare_render(&mut backend, &mut scene);
    render_main.render(&mut backend, &mut scene, false);
    render_main.render(&mut backend, &mut scene, true);
    render_main.render(&mut backend, &mut scene, true);
    assert_eq!(shadow_renders(&backend), 1);

    // Receivers still get a fresh kernel on accumulation frames.
    let expected: Vec<f32> = render_main
        .shadow()
        .kernel(2)
        .iter()
        .flat_map(|p| [p.x, p.y])
        .collect();
    assert_eq!(
        scene.opaque[0].material.get(PCF_KERNEL_BINDING),
        Some(&UniformValue::FloatArray(expected))
    );

    render_main.prepare_render(&mut backend, &mut scene);
    render_main.render(&mut backend, &mut scene, false);
    assert_eq!(shadow_renders(&backend), 2);
}

#[test]
fn shadow_can_be_switched_off() {
    let settings = RenderMainSettings {
        shadow: false,
        ..Default::default()
    };
    let (mut backend, mut render_main) = setup(settings);
    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    render_main.render(&mut backend, &mut scene, false);
    assert_eq!(shadow_renders(&backend), 0);
    assert!(scene.opaque[0].material.get(PCF_KERNEL_BINDING).is_none());
}

#[test]
fn prepare_render_resets_frame_counters() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_temporal_super_sampling(TemporalSuperSamplingMode::Forced(true));
    let mut scene = scene_with_items();

    render_main.prepare_render(&mut backend, &mut scene);
    for accumulating in [false, true, true] {
        render_main.render(&mut backend, &mut scene, accumulating);
    }
    assert_eq!(render_main.frame(), 3);
    assert_eq!(render_main.temporal().frame(), 3);

    render_main.prepare_render(&mut backend, &mut scene);
    assert_eq!(render_main.frame(), 0);
    assert_eq!(render_main.temporal().frame(), 0);
}

#[test]
fn plain_frames_render_straight_to_screen() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    render_main.render(&mut backend, &mut scene, false);

    assert_eq!(scene_targets(&backend), vec![RenderTarget::Screen]);
    assert!(backend
        .commands()
        .contains(&Command::SetViewport { width: 400, height: 300 }));
    assert!(backend.drawn_labels().iter().all(|l| !l.starts_with("tss.")));
    assert_eq!(backend.drawn_labels().iter().filter(|l| **l == "composite").count(), 0);
}

#[test]
fn forced_tss_accumulates_without_post_effects() {
    let settings = RenderMainSettings {
        temporal_frames: 4,
        ..Default::default()
    };
    let (mut backend, mut render_main) = setup(settings);
    render_main.set_temporal_super_sampling(TemporalSuperSamplingMode::Forced(true));
    assert!(render_main.needs_accumulate());

    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    let clean = render_main.camera().projection();
    render_main.render(&mut backend, &mut scene, false);

    let tss_target = RenderTarget::Framebuffer(render_main.temporal().source_framebuffer());
    assert_eq!(scene_targets(&backend), vec![tss_target]);
    assert_eq!(backend.last_draw_target("tss.output"), Some(&RenderTarget::Screen));
    assert_ne!(render_main.camera().projection(), clean);

    for _ in 0..2 {
        render_main.render(&mut backend, &mut scene, true);
    }
    assert!(!render_main.is_accumulate_finished());
    render_main.render(&mut backend, &mut scene, true);
    assert!(render_main.is_accumulate_finished());
}

#[test]
fn post_effects_with_tss_composite_into_tss_source() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_post_effect(&mut backend, &options(r#"{ "enable": true }"#));
    assert!(render_main.needs_temporal_ss());
    assert!(render_main.is_linear_space());

    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    render_main.render(&mut backend, &mut scene, false);

    let compositor_source = RenderTarget::Framebuffer(render_main.compositor().source_framebuffer());
    assert_eq!(scene_targets(&backend), vec![compositor_source]);
    assert_eq!(
        backend.last_draw_target("composite"),
        Some(&RenderTarget::Framebuffer(render_main.temporal().source_framebuffer()))
    );

    let labels = backend.drawn_labels();
    let composite = labels.iter().position(|l| *l == "composite").unwrap();
    let blend = labels.iter().position(|l| *l == "tss.blend").unwrap();
    let output = labels.iter().position(|l| *l == "tss.output").unwrap();
    assert!(composite < blend && blend < output);
}

#[test]
fn post_effects_without_tss_composite_to_screen() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_post_effect(
        &mut backend,
        &options(r#"{ "enable": true, "temporalSuperSampling": { "enable": false } }"#),
    );
    assert_eq!(
        render_main.temporal_super_sampling(),
        TemporalSuperSamplingMode::Forced(false)
    );

    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    let clean = render_main.camera().projection();
    render_main.render(&mut backend, &mut scene, false);

    assert_eq!(backend.last_draw_target("composite"), Some(&RenderTarget::Screen));
    assert!(backend.last_draw_target("tss.output").is_none());
    assert_eq!(render_main.camera().projection(), clean);
}

#[test]
fn accumulation_cap_applies_without_tss() {
    let settings = RenderMainSettings {
        accumulation_cap: 3,
        ..Default::default()
    };
    let (mut backend, mut render_main) = setup(settings);
    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);

    for frame in 0..4 {
        assert!(!render_main.is_accumulate_finished(), "frame {frame}");
        render_main.render(&mut backend, &mut scene, frame > 0);
    }
    assert!(render_main.is_accumulate_finished());
}

// ============================================================================
// Options
// ============================================================================

#[test]
fn partial_options_leave_other_settings_alone() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_post_effect(
        &mut backend,
        &options(
            r#"{
                "enable": true,
                "bloom": { "enable": true, "intensity": 0.5 },
                "screenSpaceAmbientOcclusion": { "enable": true, "radius": 1.5, "quality": "high" },
                "FXAA": { "enable": true }
            }"#,
        ),
    );
    render_main.set_post_effect(&mut backend, &options(r#"{ "bloom": { "intensity": 0.3 } }"#));

    assert!(render_main.is_post_effect_enabled());
    let compositor = render_main.compositor();
    assert!(compositor.is_bloom_enabled());
    assert!(compositor.is_ssao_enabled());
    assert!(compositor.is_fxaa_enabled());
    assert_eq!(compositor.ssao_pass().kernel_size(), 32);
    assert!((compositor.ssao_pass().radius() - 1.5).abs() < 1e-6);

    let composite = compositor.graph().node_id("composite").unwrap();
    assert_eq!(
        compositor.graph().parameter(composite, "bloomIntensity"),
        Some(&UniformValue::Float(0.3))
    );

    render_main.set_post_effect(&mut backend, &options(r#"{ "enable": false }"#));
    assert!(!render_main.is_post_effect_enabled());
    assert!(render_main.compositor().is_bloom_enabled());
}

#[test]
fn option_document_drives_every_effect() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_post_effect(
        &mut backend,
        &options(
            r#"{
                "enable": true,
                "depthOfField": { "enable": true, "fstop": 4.0, "quality": "low" },
                "screenSpaceReflection": { "enable": true, "maxRoughness": 0.6, "quality": "ultra", "physical": true },
                "colorCorrection": { "enable": true, "exposure": 1, "lookupTexture": 12 },
                "edge": { "enable": true, "color": [1.0, 0.0, 0.0, 1.0] }
            }"#,
        ),
    );

    let compositor = render_main.compositor();
    assert!(compositor.is_dof_enabled());
    assert!(compositor.is_ssr_enabled());
    assert!(compositor.is_color_correction_enabled());
    assert!(compositor.is_edge_enabled());
    assert_eq!(compositor.dof_kernel_size(), 4);
    assert_eq!(compositor.ssr_pass().max_iteration(), 80);
    assert!((compositor.ssr_pass().min_glossiness() - 0.4).abs() < 1e-6);
    assert!(compositor.ssr_pass().is_physically_correct());

    let graph = compositor.graph();
    let coc = graph.node_id("coc").unwrap();
    let composite = graph.node_id("composite").unwrap();
    let edge = graph.node_id("edge").unwrap();
    assert_eq!(graph.parameter(coc, "fstop"), Some(&UniformValue::Float(4.0)));
    assert_eq!(graph.parameter(composite, "exposure"), Some(&UniformValue::Float(2.0)));
    assert_eq!(
        graph.parameter(composite, "lookupTexture"),
        Some(&UniformValue::Texture(TextureId(12)))
    );
    assert_eq!(
        graph.parameter(edge, "edgeColor"),
        Some(&UniformValue::Vec4(glam::Vec4::new(1.0, 0.0, 0.0, 1.0)))
    );
    assert_eq!(graph.tail(), edge);
}

// ============================================================================
// Scene bindings
// ============================================================================

#[test]
fn ssao_map_is_bound_on_opaque_items_only_while_active() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_post_effect(
        &mut backend,
        &options(r#"{ "enable": true, "screenSpaceAmbientOcclusion": { "enable": true } }"#),
    );
    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    render_main.render(&mut backend, &mut scene, false);

    let ssao = render_main.compositor().ssao_texture();
    for item in &scene.opaque {
        assert_eq!(item.material.texture(SSAO_MAP_BINDING), Some(ssao));
    }
    assert!(scene.transparent[0].material.get(SSAO_MAP_BINDING).is_none());

    render_main.set_post_effect(
        &mut backend,
        &options(r#"{ "screenSpaceAmbientOcclusion": { "enable": false } }"#),
    );
    render_main.render(&mut backend, &mut scene, true);
    assert!(scene.opaque.iter().all(|i| i.material.get(SSAO_MAP_BINDING).is_none()));
}

#[test]
fn ssao_waits_for_post_effects() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_post_effect(
        &mut backend,
        &options(r#"{ "enable": false, "screenSpaceAmbientOcclusion": { "enable": true } }"#),
    );
    assert!(render_main.compositor().is_ssao_enabled());

    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    backend.clear_commands();
    render_main.render(&mut backend, &mut scene, false);

    let gbuffer_renders = |b: &RecordingBackend| b.count(|c| matches!(c, Command::RenderGBuffer { .. }));
    assert_eq!(gbuffer_renders(&backend), 0);
    assert!(!backend.drawn_labels().iter().any(|l| l.starts_with("ssao")));

    render_main.set_post_effect(&mut backend, &options(r#"{ "enable": true }"#));
    render_main.prepare_render(&mut backend, &mut scene);
    backend.clear_commands();
    render_main.render(&mut backend, &mut scene, false);

    assert_eq!(gbuffer_renders(&backend), 1);
    let labels = backend.drawn_labels();
    assert_eq!(labels.iter().filter(|l| **l == "ssao.estimate").count(), 1);
    let gbuffer_at = backend
        .commands()
        .iter()
        .position(|c| matches!(c, Command::RenderGBuffer { .. }));
    let estimate_at = backend
        .commands()
        .iter()
        .position(|c| matches!(c, Command::DrawPass { label, .. } if label == "ssao.estimate"));
    assert!(gbuffer_at < estimate_at);
}

#[test]
fn ssr_hides_ambient_cubemaps() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    let mut scene = scene_with_items();
    scene.lights.push(SceneLight::ambient_cubemap(TextureId(300), 1.0));
    scene.lights.push(SceneLight::default());

    render_main.set_post_effect(
        &mut backend,
        &options(r#"{ "enable": true, "screenSpaceReflection": { "enable": true } }"#),
    );
    render_main.prepare_render(&mut backend, &mut scene);
    assert!(scene.lights[0].invisible);
    assert!(!scene.lights[1].invisible);

    render_main.set_post_effect(&mut backend, &options(r#"{ "enable": false }"#));
    render_main.prepare_render(&mut backend, &mut scene);
    assert!(!scene.lights[0].invisible);
}

#[test]
fn dof_focus_requires_post_effects_and_camera_range() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    assert!(!render_main.set_dof_focus_on_point(5.0));

    render_main.set_post_effect(&mut backend, &options(r#"{ "enable": true }"#));
    let (near, far) = (render_main.camera().near, render_main.camera().far);
    assert!(!render_main.set_dof_focus_on_point(near * 0.5));
    assert!(!render_main.set_dof_focus_on_point(far * 2.0));
    assert!(render_main.set_dof_focus_on_point(5.0));

    let graph = render_main.compositor().graph();
    let coc = graph.node_id("coc").unwrap();
    assert_eq!(graph.parameter(coc, "focalDistance"), Some(&UniformValue::Float(5.0)));
}

#[test]
fn progressive_sort_forces_accumulation() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    let progressive = SortRecorder {
        progressive: true,
        ..Default::default()
    };
    let progressive_calls = Rc::clone(&progressive.progressive_calls);
    let last_frame = Rc::clone(&progressive.last_frame);
    let triangles = SortRecorder {
        triangles: true,
        ..Default::default()
    };
    let triangle_calls = Rc::clone(&triangles.triangle_calls);

    let mut scene = Scene::new();
    scene.transparent.push(RenderItem::default().with_geometry(progressive));
    scene.transparent.push(RenderItem::default().with_geometry(triangles));

    render_main.prepare_render(&mut backend, &mut scene);
    assert!(render_main.needs_accumulate());
    assert!(!render_main.needs_temporal_ss());

    render_main.render(&mut backend, &mut scene, false);
    render_main.render(&mut backend, &mut scene, true);
    assert_eq!(progressive_calls.get(), 2);
    assert_eq!(last_frame.get(), 1);
    assert_eq!(triangle_calls.get(), 2);

    // Accumulating without TSS still goes through the TSS resolve.
    let tss_target = RenderTarget::Framebuffer(render_main.temporal().source_framebuffer());
    assert!(scene_targets(&backend).iter().all(|t| *t == tss_target));

    scene.transparent.remove(0);
    render_main.prepare_render(&mut backend, &mut scene);
    assert!(!render_main.needs_accumulate());
}

#[test]
fn progressive_triangle_sort_forces_accumulation() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    let geometry = SortRecorder {
        triangles: true,
        progressive_triangles: true,
        ..Default::default()
    };
    let progressive_triangle_calls = Rc::clone(&geometry.progressive_triangle_calls);
    let triangle_calls = Rc::clone(&geometry.triangle_calls);
    let last_frame = Rc::clone(&geometry.last_frame);

    let mut scene = Scene::new();
    scene.transparent.push(RenderItem::default().with_geometry(geometry));

    render_main.prepare_render(&mut backend, &mut scene);
    assert!(render_main.needs_accumulate());

    for frame in 0..3 {
        render_main.render(&mut backend, &mut scene, frame > 0);
    }
    assert_eq!(progressive_triangle_calls.get(), 3);
    assert_eq!(last_frame.get(), 2);
    // The progressive sort replaces the one-shot triangle sort.
    assert_eq!(triangle_calls.get(), 0);
}

#[test]
fn vertex_and_triangle_sorts_run_together() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    let geometry = SortRecorder {
        progressive: true,
        triangles: true,
        ..Default::default()
    };
    let progressive_calls = Rc::clone(&geometry.progressive_calls);
    let triangle_calls = Rc::clone(&geometry.triangle_calls);

    let mut scene = Scene::new();
    scene.transparent.push(RenderItem::default().with_geometry(geometry));
    render_main.prepare_render(&mut backend, &mut scene);
    render_main.render(&mut backend, &mut scene, false);

    assert_eq!(progressive_calls.get(), 1);
    assert_eq!(triangle_calls.get(), 1);
}

#[test]
fn one_shot_triangle_sort_does_not_accumulate() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    let mut scene = Scene::new();
    scene.transparent.push(RenderItem::default().with_geometry(SortRecorder {
        triangles: true,
        ..Default::default()
    }));
    render_main.prepare_render(&mut backend, &mut scene);
    assert!(!render_main.needs_accumulate());
}

// ============================================================================
// Resize & dispose
// ============================================================================

#[test]
fn resize_updates_camera_and_targets() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.resize(&mut backend, Viewport::new(300, 100, 2.0));

    assert!((render_main.camera().aspect - 3.0).abs() < 1e-6);
    assert_eq!(
        backend.texture_size(render_main.compositor().source_texture()),
        Some((600, 200))
    );
    assert_eq!(
        backend.texture_size(render_main.temporal().source_texture()),
        Some((600, 200))
    );
}

#[test]
fn dispose_releases_everything() {
    let (mut backend, mut render_main) = setup(RenderMainSettings::default());
    render_main.set_post_effect(
        &mut backend,
        &options(
            r#"{
                "enable": true,
                "bloom": { "enable": true },
                "depthOfField": { "enable": true },
                "screenSpaceAmbientOcclusion": { "enable": true },
                "screenSpaceReflection": { "enable": true, "physical": true },
                "edge": { "enable": true },
                "FXAA": { "enable": true }
            }"#,
        ),
    );
    let mut scene = scene_with_items();
    render_main.prepare_render(&mut backend, &mut scene);
    for accumulating in [false, true, true] {
        render_main.render(&mut backend, &mut scene, accumulating);
    }

    render_main.dispose(&mut backend);
    assert_eq!(backend.live_texture_count(), 0);
    assert_eq!(backend.live_framebuffer_count(), 0);
    assert_eq!(backend.live_pass_count(), 0);
}
