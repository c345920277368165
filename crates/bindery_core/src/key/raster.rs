//! Raster State
//!
//! Rasterization, blending, depth/stencil and multisample state packed into a
//! 24-byte `Pod` record. Fields are private raw bytes; the typed accessors are
//! the only way to write them, so every stored byte is a valid discriminant.

use bytemuck::{Pod, Zeroable};

use super::enums::{
    BlendFactor, BlendOperation, ColorWrites, CompareFunction, CullMode, FrontFace, PolygonMode,
    StencilOperation,
};

// ─── Typed Views ──────────────────────────────────────────────────────────────

/// One half (color or alpha) of a blend equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendComponent {
    pub src_factor: BlendFactor,
    pub dst_factor: BlendFactor,
    pub operation: BlendOperation,
}

impl BlendComponent {
    pub const REPLACE: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::Zero,
        operation: BlendOperation::Add,
    };

    pub const OVER: Self = Self {
        src_factor: BlendFactor::One,
        dst_factor: BlendFactor::OneMinusSrcAlpha,
        operation: BlendOperation::Add,
    };
}

/// Blend equation for the color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub color: BlendComponent,
    pub alpha: BlendComponent,
}

impl BlendState {
    pub const REPLACE: Self = Self {
        color: BlendComponent::REPLACE,
        alpha: BlendComponent::REPLACE,
    };

    pub const ALPHA_BLENDING: Self = Self {
        color: BlendComponent {
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            operation: BlendOperation::Add,
        },
        alpha: BlendComponent::OVER,
    };

    pub const PREMULTIPLIED_ALPHA_BLENDING: Self = Self {
        color: BlendComponent::OVER,
        alpha: BlendComponent::OVER,
    };
}

/// Stencil test and operations for one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFaceState {
    pub compare: CompareFunction,
    pub fail_op: StencilOperation,
    pub depth_fail_op: StencilOperation,
    pub pass_op: StencilOperation,
}

impl StencilFaceState {
    /// Always passes and never writes; the stencil test is effectively off.
    pub const IGNORE: Self = Self {
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
}

// ─── Packed Record ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
struct PackedStencilFace {
    compare: u8,
    fail_op: u8,
    depth_fail_op: u8,
    pass_op: u8,
}

impl PackedStencilFace {
    fn pack(face: StencilFaceState) -> Self {
        Self {
            compare: face.compare.to_raw(),
            fail_op: face.fail_op.to_raw(),
            depth_fail_op: face.depth_fail_op.to_raw(),
            pass_op: face.pass_op.to_raw(),
        }
    }

    fn unpack(self) -> StencilFaceState {
        let op = |raw| StencilOperation::from_raw(raw).unwrap_or(StencilOperation::Keep);
        StencilFaceState {
            compare: CompareFunction::from_raw(self.compare).unwrap_or(CompareFunction::Always),
            fail_op: op(self.fail_op),
            depth_fail_op: op(self.depth_fail_op),
            pass_op: op(self.pass_op),
        }
    }
}

/// Fixed-function state baked into a pipeline object.
///
/// Start from [`RasterState::default()`] and adjust with the `with_*` builders:
///
/// ```
/// use bindery_core::{BlendState, CullMode, RasterState};
///
/// let transparent = RasterState::default()
///     .with_cull_mode(CullMode::None)
///     .with_blend(Some(BlendState::ALPHA_BLENDING))
///     .with_depth_write(false);
/// assert_eq!(transparent.blend(), Some(BlendState::ALPHA_BLENDING));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct RasterState {
    cull_mode: u8,
    polygon_mode: u8,
    front_face: u8,
    depth_clamp: u8,
    blend_enable: u8,
    src_color_factor: u8,
    dst_color_factor: u8,
    color_blend_op: u8,
    src_alpha_factor: u8,
    dst_alpha_factor: u8,
    alpha_blend_op: u8,
    color_write_mask: u8,
    depth_write: u8,
    depth_compare: u8,
    sample_count: u8,
    alpha_to_coverage: u8,
    stencil_front: PackedStencilFace,
    stencil_back: PackedStencilFace,
}

const _: () = assert!(
    size_of::<RasterState>() == 16 * size_of::<u8>() + 2 * size_of::<PackedStencilFace>(),
    "implicit padding is not allowed in RasterState"
);

impl Default for RasterState {
    fn default() -> Self {
        Self::zeroed()
            .with_cull_mode(CullMode::Back)
            .with_polygon_mode(PolygonMode::Fill)
            .with_front_face(FrontFace::Ccw)
            .with_blend(None)
            .with_color_writes(ColorWrites::ALL)
            .with_depth_write(true)
            .with_depth_compare(CompareFunction::Less)
            .with_sample_count(1)
            .with_stencil(StencilFaceState::IGNORE, StencilFaceState::IGNORE)
    }
}

impl RasterState {
    // ── Rasterization ────────────────────────────────────────────────────────

    #[must_use]
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode.to_raw();
        self
    }

    #[must_use]
    pub fn with_polygon_mode(mut self, polygon_mode: PolygonMode) -> Self {
        self.polygon_mode = polygon_mode.to_raw();
        self
    }

    #[must_use]
    pub fn with_front_face(mut self, front_face: FrontFace) -> Self {
        self.front_face = front_face.to_raw();
        self
    }

    /// Clamp fragment depth instead of clipping against the near/far planes.
    #[must_use]
    pub fn with_depth_clamp(mut self, enabled: bool) -> Self {
        self.depth_clamp = u8::from(enabled);
        self
    }

    #[must_use]
    pub fn cull_mode(&self) -> CullMode {
        CullMode::from_raw(self.cull_mode).unwrap_or(CullMode::None)
    }

    #[must_use]
    pub fn polygon_mode(&self) -> PolygonMode {
        PolygonMode::from_raw(self.polygon_mode).unwrap_or(PolygonMode::Fill)
    }

    #[must_use]
    pub fn front_face(&self) -> FrontFace {
        FrontFace::from_raw(self.front_face).unwrap_or(FrontFace::Ccw)
    }

    #[must_use]
    pub fn depth_clamp(&self) -> bool {
        self.depth_clamp != 0
    }

    // ── Blending ─────────────────────────────────────────────────────────────

    /// `None` disables blending. The factor bytes are reset to the replace
    /// equation so that two "blending off" states always compare equal.
    #[must_use]
    pub fn with_blend(mut self, blend: Option<BlendState>) -> Self {
        let state = blend.unwrap_or(BlendState::REPLACE);
        self.blend_enable = u8::from(blend.is_some());
        self.src_color_factor = state.color.src_factor.to_raw();
        self.dst_color_factor = state.color.dst_factor.to_raw();
        self.color_blend_op = state.color.operation.to_raw();
        self.src_alpha_factor = state.alpha.src_factor.to_raw();
        self.dst_alpha_factor = state.alpha.dst_factor.to_raw();
        self.alpha_blend_op = state.alpha.operation.to_raw();
        self
    }

    #[must_use]
    pub fn with_color_writes(mut self, mask: ColorWrites) -> Self {
        self.color_write_mask = mask.bits();
        self
    }

    #[must_use]
    pub fn blend(&self) -> Option<BlendState> {
        if self.blend_enable == 0 {
            return None;
        }
        let factor = |raw| BlendFactor::from_raw(raw).unwrap_or(BlendFactor::One);
        let op = |raw| BlendOperation::from_raw(raw).unwrap_or(BlendOperation::Add);
        Some(BlendState {
            color: BlendComponent {
                src_factor: factor(self.src_color_factor),
                dst_factor: factor(self.dst_color_factor),
                operation: op(self.color_blend_op),
            },
            alpha: BlendComponent {
                src_factor: factor(self.src_alpha_factor),
                dst_factor: factor(self.dst_alpha_factor),
                operation: op(self.alpha_blend_op),
            },
        })
    }

    #[must_use]
    pub fn color_writes(&self) -> ColorWrites {
        ColorWrites::from_bits_truncate(self.color_write_mask)
    }

    // ── Depth / Stencil ──────────────────────────────────────────────────────

    #[must_use]
    pub fn with_depth_write(mut self, enabled: bool) -> Self {
        self.depth_write = u8::from(enabled);
        self
    }

    /// `CompareFunction::Always` together with depth writes off disables the
    /// depth test.
    #[must_use]
    pub fn with_depth_compare(mut self, compare: CompareFunction) -> Self {
        self.depth_compare = compare.to_raw();
        self
    }

    #[must_use]
    pub fn with_stencil(mut self, front: StencilFaceState, back: StencilFaceState) -> Self {
        self.stencil_front = PackedStencilFace::pack(front);
        self.stencil_back = PackedStencilFace::pack(back);
        self
    }

    #[must_use]
    pub fn depth_write(&self) -> bool {
        self.depth_write != 0
    }

    #[must_use]
    pub fn depth_compare(&self) -> CompareFunction {
        CompareFunction::from_raw(self.depth_compare).unwrap_or(CompareFunction::Always)
    }

    #[must_use]
    pub fn stencil_front(&self) -> StencilFaceState {
        self.stencil_front.unpack()
    }

    #[must_use]
    pub fn stencil_back(&self) -> StencilFaceState {
        self.stencil_back.unpack()
    }

    /// `true` unless both faces are [`StencilFaceState::IGNORE`].
    #[must_use]
    pub fn stencil_enabled(&self) -> bool {
        self.stencil_front() != StencilFaceState::IGNORE
            || self.stencil_back() != StencilFaceState::IGNORE
    }

    // ── Multisample ──────────────────────────────────────────────────────────

    /// # Panics
    /// If `count` is zero or larger than 64.
    #[must_use]
    pub fn with_sample_count(mut self, count: u8) -> Self {
        assert!((1..=64).contains(&count), "invalid sample count {count}");
        self.sample_count = count;
        self
    }

    #[must_use]
    pub fn with_alpha_to_coverage(mut self, enabled: bool) -> Self {
        self.alpha_to_coverage = u8::from(enabled);
        self
    }

    #[must_use]
    pub fn sample_count(&self) -> u32 {
        u32::from(self.sample_count.max(1))
    }

    #[must_use]
    pub fn alpha_to_coverage(&self) -> bool {
        self.alpha_to_coverage != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_state_is_24_bytes() {
        assert_eq!(size_of::<RasterState>(), 24);
    }

    #[test]
    fn disabled_blend_normalizes_factors() {
        let a = RasterState::default().with_blend(Some(BlendState::ALPHA_BLENDING)).with_blend(None);
        let b = RasterState::default();
        assert_eq!(bytemuck::bytes_of(&a), bytemuck::bytes_of(&b));
        assert_eq!(a.blend(), None);
    }

    #[test]
    fn accessors_read_back_what_was_written() {
        let state = RasterState::default()
            .with_cull_mode(CullMode::Front)
            .with_front_face(FrontFace::Cw)
            .with_depth_compare(CompareFunction::GreaterEqual)
            .with_sample_count(4)
            .with_alpha_to_coverage(true)
            .with_color_writes(ColorWrites::COLOR);

        assert_eq!(state.cull_mode(), CullMode::Front);
        assert_eq!(state.front_face(), FrontFace::Cw);
        assert_eq!(state.depth_compare(), CompareFunction::GreaterEqual);
        assert_eq!(state.sample_count(), 4);
        assert!(state.alpha_to_coverage());
        assert_eq!(state.color_writes(), ColorWrites::COLOR);
        assert!(!state.stencil_enabled());
    }

    #[test]
    fn stencil_faces_round_trip() {
        let front = StencilFaceState {
            compare: CompareFunction::Equal,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Zero,
            pass_op: StencilOperation::Replace,
        };
        let state = RasterState::default().with_stencil(front, StencilFaceState::IGNORE);
        assert_eq!(state.stencil_front(), front);
        assert_eq!(state.stencil_back(), StencilFaceState::IGNORE);
        assert!(state.stencil_enabled());
    }
}
