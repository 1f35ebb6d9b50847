//! Effect Compositor
//!
//! Owns the effect graph, the G-buffer and the SSAO/SSR passes, and turns
//! "which effects are on, with what parameters" into the right passes.
//!
//! # Frame Flow
//!
//! ```text
//!  update_normal ──► GBuffer            (only if SSAO ∨ SSR ∨ edge)
//!  update_ssao   ──► SSAO target        (every frame; neutral when off)
//!  ... engine renders the scene into source_framebuffer() ...
//!  composite:
//!     1. SSR (if on): source ──► SSR target, which becomes the source
//!     2. source node ◄── source
//!     3. DOF blur nodes ◄── Poisson window for this frame, percent
//!     4. CoC node ◄── camera near / far
//!     5. graph.render(target)
//! ```
//!
//! The order inside `composite` is fixed: the graph runs its nodes
//! synchronously, so everything it reads must be in place before step 5.
//!
//! # Parameters
//!
//! Setters take `Option<ParamValue>`. `None` leaves the current value as it
//! is. Quality strings go through [`QualityTier`] with a medium fallback.

use std::fmt;

use bitflags::bitflags;

use super::graph::{EffectGraph, ExternalTextures, GraphTemplate, InputSource, NodeId};
use super::passes::{GBuffer, SsaoPass, SsrPass};
use super::sampling::PoissonKernelProvider;
use crate::backend::{
    FramebufferId, RenderBackend, RenderTarget, ShaderStage, TextureDesc, TextureId, UniformValue,
};
use crate::errors::Result;
use crate::resources::{
    BloomParam, ColorCorrectionParam, DofParam, EdgeParam, ParamValue, QualityTier, SsaoParam,
    SsrParam,
};
use crate::scene::{Camera, Scene, Viewport};

/// Frames over which the DOF blur fades in.
const DOF_PERCENT_FRAMES: f32 = 30.0;

const SOURCE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

bitflags! {
    /// Effects currently enabled on a compositor.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct EffectFlags: u32 {
        const SSAO             = 1 << 0;
        const SSR              = 1 << 1;
        const BLOOM            = 1 << 2;
        const DOF              = 1 << 3;
        const COLOR_CORRECTION = 1 << 4;
        const EDGE             = 1 << 5;
        const FXAA             = 1 << 6;

        /// Effects that read the G-buffer.
        const NEEDS_NORMAL = Self::SSAO.bits() | Self::SSR.bits() | Self::EDGE.bits();
    }
}

/// Graph nodes the compositor drives directly.
#[derive(Debug, Clone, Copy)]
struct CompositorNodes {
    source: NodeId,
    coc: NodeId,
    dof_blurs: [NodeId; 3],
    dof_composite: NodeId,
    bloom_composite: NodeId,
    composite: NodeId,
    edge: NodeId,
    fxaa: NodeId,
}

impl CompositorNodes {
    fn lookup(graph: &EffectGraph) -> Result<Self> {
        Ok(Self {
            source: graph.require("source")?,
            coc: graph.require("coc")?,
            dof_blurs: [
                graph.require("dof_far_blur")?,
                graph.require("dof_near_blur")?,
                graph.require("dof_coc_blur")?,
            ],
            dof_composite: graph.require("dof_composite")?,
            bloom_composite: graph.require("bloom_composite")?,
            composite: graph.require("composite")?,
            edge: graph.require("edge")?,
            fxaa: graph.require("FXAA")?,
        })
    }
}

#[derive(Debug)]
pub struct EffectCompositor {
    graph: EffectGraph,
    nodes: CompositorNodes,

    gbuffer: GBuffer,
    ssao: SsaoPass,
    ssr: SsrPass,

    source_color: TextureId,
    source_depth: TextureId,
    source_framebuffer: FramebufferId,
    viewport: Viewport,

    enabled: EffectFlags,

    dof_kernels: PoissonKernelProvider,
    dof_kernel_size: u32,
    dof_kernel: Vec<f32>,
}

impl EffectCompositor {
    /// Builds a compositor on the embedded graph template.
    pub fn new(backend: &mut dyn RenderBackend) -> Result<Self> {
        Self::with_template(backend, &GraphTemplate::default_template()?)
    }

    pub fn with_template(backend: &mut dyn RenderBackend, template: &GraphTemplate) -> Result<Self> {
        let mut graph = EffectGraph::from_template(backend, template)?;
        let nodes = match CompositorNodes::lookup(&graph) {
            Ok(nodes) => nodes,
            Err(err) => {
                graph.dispose(backend);
                return Err(err);
            }
        };

        let viewport = Viewport::default();
        let (width, height) = viewport.physical_size();
        let source_color =
            backend.create_texture(&TextureDesc::color("compositor_source", width, height, SOURCE_FORMAT));
        let source_depth = backend.create_texture(&TextureDesc::depth("compositor_depth", width, height));
        let source_framebuffer = backend.create_framebuffer(&[source_color], Some(source_depth));

        graph.set_node_texture(nodes.source, Some(source_color));

        let mut compositor = Self {
            graph,
            nodes,
            gbuffer: GBuffer::new(backend, width, height),
            ssao: SsaoPass::new(backend, width, height),
            ssr: SsrPass::new(backend, width, height),
            source_color,
            source_depth,
            source_framebuffer,
            viewport,
            enabled: EffectFlags::empty(),
            dof_kernels: PoissonKernelProvider::new(),
            dof_kernel_size: 0,
            dof_kernel: Vec::new(),
        };
        compositor.set_dof_kernel_size(QualityTier::default().dof_kernel_size());
        Ok(compositor)
    }

    /// Resizes the source, G-buffer and SSAO/SSR targets to `width·dpr × height·dpr`.
    pub fn resize(&mut self, backend: &mut dyn RenderBackend, width: u32, height: u32, dpr: f32) {
        let viewport = Viewport::new(width, height, dpr);
        let (w, h) = viewport.physical_size();
        if (w, h) != self.viewport.physical_size() {
            backend.resize_texture(self.source_color, w, h);
            backend.resize_texture(self.source_depth, w, h);
            log::debug!("compositor resized to {w}x{h}");
        }
        self.viewport = viewport;
        self.gbuffer.resize(backend, w, h);
        self.ssao.resize(backend, w, h);
        self.ssr.resize(backend, w, h);
    }

    // ========================================================================
    // Toggles
    // ========================================================================

    pub fn enable_ssao(&mut self) {
        self.enabled.insert(EffectFlags::SSAO);
    }

    pub fn disable_ssao(&mut self) {
        self.enabled.remove(EffectFlags::SSAO);
    }

    pub fn enable_ssr(&mut self) {
        self.enabled.insert(EffectFlags::SSR);
    }

    pub fn disable_ssr(&mut self) {
        self.enabled.remove(EffectFlags::SSR);
    }

    /// Feeds the bloom branch into the composite node.
    pub fn enable_bloom(&mut self) {
        self.enabled.insert(EffectFlags::BLOOM);
        let bloom = InputSource::node(self.nodes.bloom_composite);
        self.graph.set_input(self.nodes.composite, "bloom", Some(bloom));
        self.graph
            .define(self.nodes.composite, ShaderStage::Fragment, "BLOOM", None);
    }

    pub fn disable_bloom(&mut self) {
        self.enabled.remove(EffectFlags::BLOOM);
        self.graph.set_input(self.nodes.composite, "bloom", None);
        self.graph
            .undefine(self.nodes.composite, ShaderStage::Fragment, "BLOOM");
    }

    /// Routes the composite node through the DOF branch.
    pub fn enable_dof(&mut self) {
        self.enabled.insert(EffectFlags::DOF);
        let dof = InputSource::node(self.nodes.dof_composite);
        self.graph.set_input(self.nodes.composite, "texture", Some(dof));
    }

    pub fn disable_dof(&mut self) {
        self.enabled.remove(EffectFlags::DOF);
        let source = InputSource::node(self.nodes.source);
        self.graph.set_input(self.nodes.composite, "texture", Some(source));
    }

    pub fn enable_color_correction(&mut self) {
        self.enabled.insert(EffectFlags::COLOR_CORRECTION);
        self.graph
            .define(self.nodes.composite, ShaderStage::Fragment, "COLOR_CORRECTION", None);
    }

    pub fn disable_color_correction(&mut self) {
        self.enabled.remove(EffectFlags::COLOR_CORRECTION);
        self.graph
            .undefine(self.nodes.composite, ShaderStage::Fragment, "COLOR_CORRECTION");
    }

    pub fn enable_edge(&mut self) {
        if self.graph.insert_chain_node(self.nodes.edge) || self.graph.is_chain_node_live(self.nodes.edge) {
            self.enabled.insert(EffectFlags::EDGE);
        }
    }

    pub fn disable_edge(&mut self) {
        self.graph.remove_chain_node(self.nodes.edge);
        self.enabled.remove(EffectFlags::EDGE);
    }

    pub fn enable_fxaa(&mut self) {
        if self.graph.insert_chain_node(self.nodes.fxaa) || self.graph.is_chain_node_live(self.nodes.fxaa) {
            self.enabled.insert(EffectFlags::FXAA);
        }
    }

    pub fn disable_fxaa(&mut self) {
        self.graph.remove_chain_node(self.nodes.fxaa);
        self.enabled.remove(EffectFlags::FXAA);
    }

    #[inline]
    #[must_use]
    pub fn enabled_effects(&self) -> EffectFlags {
        self.enabled
    }

    #[must_use]
    pub fn is_ssao_enabled(&self) -> bool {
        self.enabled.contains(EffectFlags::SSAO)
    }

    #[must_use]
    pub fn is_ssr_enabled(&self) -> bool {
        self.enabled.contains(EffectFlags::SSR)
    }

    #[must_use]
    pub fn is_bloom_enabled(&self) -> bool {
        self.enabled.contains(EffectFlags::BLOOM)
    }

    #[must_use]
    pub fn is_dof_enabled(&self) -> bool {
        self.enabled.contains(EffectFlags::DOF)
    }

    #[must_use]
    pub fn is_color_correction_enabled(&self) -> bool {
        self.enabled.contains(EffectFlags::COLOR_CORRECTION)
    }

    #[must_use]
    pub fn is_edge_enabled(&self) -> bool {
        self.enabled.contains(EffectFlags::EDGE)
    }

    #[must_use]
    pub fn is_fxaa_enabled(&self) -> bool {
        self.enabled.contains(EffectFlags::FXAA)
    }

    /// Whether this frame needs the G-buffer.
    #[must_use]
    pub fn if_render_normal_pass(&self) -> bool {
        self.enabled.intersects(EffectFlags::NEEDS_NORMAL)
    }

    // ========================================================================
    // Parameters
    // ========================================================================

    pub fn set_ssao_parameter(&mut self, param: SsaoParam, value: Option<ParamValue>) {
        let Some(value) = value else { return };
        match param {
            SsaoParam::Radius => {
                if let Some(radius) = extract(param, &value, ParamValue::as_number) {
                    self.ssao.set_radius(radius);
                }
            }
            SsaoParam::Quality => {
                if let Some(tier) = expect_tier(param, &value) {
                    self.ssao.set_kernel_size(tier.ssao_kernel_size());
                }
            }
            SsaoParam::Intensity => {
                if let Some(intensity) = extract(param, &value, ParamValue::as_number) {
                    self.ssao.set_intensity(intensity);
                }
            }
        }
    }

    /// `Physical` may build the SSR normal table, hence the backend.
    pub fn set_ssr_parameter(&mut self, backend: &mut dyn RenderBackend, param: SsrParam, value: Option<ParamValue>) {
        let Some(value) = value else { return };
        match param {
            SsrParam::Quality => {
                if let Some(tier) = expect_tier(param, &value) {
                    self.ssr.set_max_iteration(tier.ssr_max_iteration());
                    self.ssr.set_pixel_stride(tier.ssr_pixel_stride());
                }
            }
            SsrParam::MaxRoughness => {
                if let Some(roughness) = extract(param, &value, ParamValue::as_number) {
                    self.ssr.set_min_glossiness((1.0 - roughness).clamp(0.0, 1.0));
                }
            }
            SsrParam::Physical => {
                if let Some(physical) = extract(param, &value, ParamValue::as_flag) {
                    self.ssr.set_physically_correct(backend, physical);
                }
            }
        }
    }

    pub fn set_dof_parameter(&mut self, param: DofParam, value: Option<ParamValue>) {
        let Some(value) = value else { return };
        let uniform = match param {
            DofParam::Quality => {
                if let Some(tier) = expect_tier(param, &value) {
                    self.set_dof_kernel_size(tier.dof_kernel_size());
                }
                return;
            }
            DofParam::FocalDistance => "focalDistance",
            DofParam::FocalRange => "focalRange",
            DofParam::Fstop => "fstop",
            DofParam::BlurRadius => "blurRadius",
        };
        let Some(number) = extract(param, &value, ParamValue::as_number) else {
            return;
        };
        if param == DofParam::BlurRadius {
            for blur in self.nodes.dof_blurs {
                self.graph.set_parameter(blur, uniform, number);
            }
        } else {
            self.graph.set_parameter(self.nodes.coc, uniform, number);
        }
    }

    pub fn set_bloom_parameter(&mut self, param: BloomParam, value: Option<ParamValue>) {
        let Some(value) = value else { return };
        match param {
            BloomParam::Intensity => {
                if let Some(intensity) = extract(param, &value, ParamValue::as_number) {
                    self.graph
                        .set_parameter(self.nodes.composite, "bloomIntensity", intensity);
                }
            }
        }
    }

    pub fn set_color_correction_parameter(&mut self, param: ColorCorrectionParam, value: Option<ParamValue>) {
        let Some(value) = value else { return };
        let composite = self.nodes.composite;
        match param {
            ColorCorrectionParam::LookupTexture => {
                if let Some(lut) = extract(param, &value, ParamValue::as_texture) {
                    self.graph.set_parameter(composite, "lookupTexture", lut);
                    self.graph.define(composite, ShaderStage::Fragment, "LUT", None);
                }
            }
            ColorCorrectionParam::Exposure => {
                if let Some(stops) = extract(param, &value, ParamValue::as_number) {
                    self.graph.set_parameter(composite, "exposure", stops.exp2());
                }
            }
            ColorCorrectionParam::Brightness
            | ColorCorrectionParam::Contrast
            | ColorCorrectionParam::Saturation => {
                let uniform = match param {
                    ColorCorrectionParam::Brightness => "brightness",
                    ColorCorrectionParam::Contrast => "contrast",
                    _ => "saturation",
                };
                if let Some(number) = extract(param, &value, ParamValue::as_number) {
                    self.graph.set_parameter(composite, uniform, number);
                }
            }
        }
    }

    pub fn set_edge_parameter(&mut self, param: EdgeParam, value: Option<ParamValue>) {
        let Some(value) = value else { return };
        match param {
            EdgeParam::Color => {
                if let Some(color) = extract(param, &value, ParamValue::as_color) {
                    self.graph.set_parameter(self.nodes.edge, "edgeColor", color);
                }
            }
        }
    }

    fn set_dof_kernel_size(&mut self, size: u32) {
        if size == self.dof_kernel_size {
            return;
        }
        self.dof_kernel_size = size;
        let value = size.to_string();
        for blur in self.nodes.dof_blurs {
            self.graph
                .define(blur, ShaderStage::Fragment, "POISSON_KERNEL_SIZE", Some(&value));
        }
        log::debug!("DOF kernel size set to {size}");
    }

    // ========================================================================
    // Per-frame
    // ========================================================================

    /// Renders the G-buffer if any enabled effect reads it.
    pub fn update_normal(&mut self, backend: &mut dyn RenderBackend, scene: &Scene, camera: &Camera, frame: u32) {
        if !self.if_render_normal_pass() {
            return;
        }
        let albedo = self.is_ssr_enabled();
        self.gbuffer.set_albedo_enabled(backend, albedo);
        log::trace!("G-buffer update, frame {frame}");
        self.gbuffer.update(backend, scene, camera);
    }

    /// Runs SSAO, or keeps its texture at "no occlusion" while disabled.
    ///
    /// `active` is false when the G-buffer was not refreshed this frame
    /// (post effects off); the estimate is skipped and the target cleared.
    pub fn update_ssao(&mut self, backend: &mut dyn RenderBackend, camera: &Camera, frame: u32, active: bool) {
        if active && self.is_ssao_enabled() {
            self.ssao.update(backend, camera, &self.gbuffer, frame);
        } else {
            self.ssao.clear(backend);
        }
    }

    /// Composites the current source into `target`.
    pub fn composite(
        &mut self,
        backend: &mut dyn RenderBackend,
        scene: &Scene,
        camera: &Camera,
        target: &RenderTarget,
        frame: u32,
    ) {
        let mut source = self.source_color;
        if self.is_ssr_enabled() {
            let cubemap = scene
                .ambient_cubemap_light()
                .and_then(|light| light.cubemap.map(|c| (c, light.intensity)));
            self.ssr
                .set_ambient_cubemap(cubemap.map(|(c, _)| c), cubemap.map_or(0.0, |(_, i)| i));
            let ssao = self.is_ssao_enabled().then(|| self.ssao.target_texture());
            self.ssr.set_ssao_texture(ssao);
            self.ssr
                .update(backend, camera, &self.gbuffer, source, frame);
            source = self.ssr.target_texture();
        }

        self.graph.set_node_texture(self.nodes.source, Some(source));

        self.dof_kernels
            .window_into(frame, self.dof_kernel_size as usize, &mut self.dof_kernel);
        let percent = frame as f32 / DOF_PERCENT_FRAMES;
        for blur in self.nodes.dof_blurs {
            self.graph
                .set_parameter(blur, "poissonKernel", UniformValue::FloatArray(self.dof_kernel.clone()));
            self.graph.set_parameter(blur, "percent", percent);
        }

        self.graph.set_parameter(self.nodes.coc, "zNear", camera.near);
        self.graph.set_parameter(self.nodes.coc, "zFar", camera.far);

        let (gbuffer_normal, gbuffer_depth) = if self.if_render_normal_pass() {
            (Some(self.gbuffer.normal_texture()), Some(self.gbuffer.depth_texture()))
        } else {
            (None, None)
        };
        let externals = ExternalTextures {
            scene_depth: Some(self.source_depth),
            gbuffer_normal,
            gbuffer_depth,
        };
        log::trace!("composite frame {frame} into {target:?}");
        self.graph.render(backend, &self.viewport, &externals, target);
    }

    /// Converged, or SSR is off.
    #[must_use]
    pub fn is_ssr_finished(&self, frame: u32) -> bool {
        !self.is_ssr_enabled() || self.ssr.is_finished(frame)
    }

    /// Converged, or SSAO is off.
    #[must_use]
    pub fn is_ssao_finished(&self, frame: u32) -> bool {
        !self.is_ssao_enabled() || self.ssao.is_finished(frame)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Framebuffer the engine renders the scene into before `composite`.
    #[inline]
    #[must_use]
    pub fn source_framebuffer(&self) -> FramebufferId {
        self.source_framebuffer
    }

    #[inline]
    #[must_use]
    pub fn source_texture(&self) -> TextureId {
        self.source_color
    }

    #[inline]
    #[must_use]
    pub fn depth_texture(&self) -> TextureId {
        self.source_depth
    }

    #[inline]
    #[must_use]
    pub fn ssao_texture(&self) -> TextureId {
        self.ssao.target_texture()
    }

    #[must_use]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[must_use]
    pub fn graph(&self) -> &EffectGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut EffectGraph {
        &mut self.graph
    }

    #[must_use]
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    #[must_use]
    pub fn ssao_pass(&self) -> &SsaoPass {
        &self.ssao
    }

    #[must_use]
    pub fn ssr_pass(&self) -> &SsrPass {
        &self.ssr
    }

    /// Points per DOF blur window.
    #[must_use]
    pub fn dof_kernel_size(&self) -> u32 {
        self.dof_kernel_size
    }

    /// The DOF window pushed by the last `composite`, as `[x, y, …]`.
    #[must_use]
    pub fn dof_kernel(&self) -> &[f32] {
        &self.dof_kernel
    }

    /// Releases every texture, framebuffer and pass.
    pub fn dispose(self, backend: &mut dyn RenderBackend) {
        self.graph.dispose(backend);
        self.gbuffer.dispose(backend);
        self.ssao.dispose(backend);
        self.ssr.dispose(backend);
        backend.destroy_framebuffer(self.source_framebuffer);
        backend.destroy_texture(self.source_color);
        backend.destroy_texture(self.source_depth);
    }
}

/// Extracts the expected kind, warning when the value has another.
fn extract<'a, T>(
    param: impl fmt::Debug,
    value: &'a ParamValue,
    get: impl FnOnce(&'a ParamValue) -> Option<T>,
) -> Option<T> {
    let out = get(value);
    if out.is_none() {
        log::warn!("{param:?}: unexpected {} value ignored", value.kind());
    }
    out
}

fn expect_tier(param: impl fmt::Debug, value: &ParamValue) -> Option<QualityTier> {
    extract(param, value, ParamValue::as_text).map(QualityTier::parse_or_default)
}
