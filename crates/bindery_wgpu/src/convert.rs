//! Key → wgpu conversions.
//!
//! Every function is a plain `match`; nothing here allocates.

use bindery_core::{
    BlendComponent, BlendFactor, BlendOperation, BlendState, ColorWrites, CompareFunction,
    CullMode, FrontFace, PolygonMode, PrimitiveTopology, StencilFaceState, StencilOperation,
    VertexFormat, VertexStepMode,
};

#[must_use]
pub fn topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
        PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
        PrimitiveTopology::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// `None` for [`CullMode::FrontAndBack`], which wgpu cannot express.
#[must_use]
pub fn cull_mode(mode: CullMode) -> Option<Option<wgpu::Face>> {
    match mode {
        CullMode::None => Some(None),
        CullMode::Front => Some(Some(wgpu::Face::Front)),
        CullMode::Back => Some(Some(wgpu::Face::Back)),
        CullMode::FrontAndBack => None,
    }
}

#[must_use]
pub fn front_face(face: FrontFace) -> wgpu::FrontFace {
    match face {
        FrontFace::Ccw => wgpu::FrontFace::Ccw,
        FrontFace::Cw => wgpu::FrontFace::Cw,
    }
}

#[must_use]
pub fn polygon_mode(mode: PolygonMode) -> wgpu::PolygonMode {
    match mode {
        PolygonMode::Fill => wgpu::PolygonMode::Fill,
        PolygonMode::Line => wgpu::PolygonMode::Line,
        PolygonMode::Point => wgpu::PolygonMode::Point,
    }
}

#[must_use]
pub fn compare(function: CompareFunction) -> wgpu::CompareFunction {
    match function {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

#[must_use]
pub fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::Src => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrc => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::Dst => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDst => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
        BlendFactor::Constant => wgpu::BlendFactor::Constant,
        BlendFactor::OneMinusConstant => wgpu::BlendFactor::OneMinusConstant,
    }
}

#[must_use]
pub fn blend_operation(operation: BlendOperation) -> wgpu::BlendOperation {
    match operation {
        BlendOperation::Add => wgpu::BlendOperation::Add,
        BlendOperation::Subtract => wgpu::BlendOperation::Subtract,
        BlendOperation::ReverseSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOperation::Min => wgpu::BlendOperation::Min,
        BlendOperation::Max => wgpu::BlendOperation::Max,
    }
}

fn blend_component(component: BlendComponent) -> wgpu::BlendComponent {
    wgpu::BlendComponent {
        src_factor: blend_factor(component.src_factor),
        dst_factor: blend_factor(component.dst_factor),
        operation: blend_operation(component.operation),
    }
}

#[must_use]
pub fn blend_state(state: BlendState) -> wgpu::BlendState {
    wgpu::BlendState {
        color: blend_component(state.color),
        alpha: blend_component(state.alpha),
    }
}

#[must_use]
pub fn color_writes(mask: ColorWrites) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    for (ours, theirs) in [
        (ColorWrites::RED, wgpu::ColorWrites::RED),
        (ColorWrites::GREEN, wgpu::ColorWrites::GREEN),
        (ColorWrites::BLUE, wgpu::ColorWrites::BLUE),
        (ColorWrites::ALPHA, wgpu::ColorWrites::ALPHA),
    ] {
        if mask.contains(ours) {
            writes |= theirs;
        }
    }
    writes
}

#[must_use]
pub fn stencil_operation(operation: StencilOperation) -> wgpu::StencilOperation {
    match operation {
        StencilOperation::Keep => wgpu::StencilOperation::Keep,
        StencilOperation::Zero => wgpu::StencilOperation::Zero,
        StencilOperation::Replace => wgpu::StencilOperation::Replace,
        StencilOperation::Invert => wgpu::StencilOperation::Invert,
        StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
        StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
        StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
        StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
    }
}

#[must_use]
pub fn stencil_face(face: StencilFaceState) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: compare(face.compare),
        fail_op: stencil_operation(face.fail_op),
        depth_fail_op: stencil_operation(face.depth_fail_op),
        pass_op: stencil_operation(face.pass_op),
    }
}

#[must_use]
pub fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32 => wgpu::VertexFormat::Float32,
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
        VertexFormat::Uint32x2 => wgpu::VertexFormat::Uint32x2,
        VertexFormat::Uint32x3 => wgpu::VertexFormat::Uint32x3,
        VertexFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        VertexFormat::Sint32 => wgpu::VertexFormat::Sint32,
        VertexFormat::Sint32x2 => wgpu::VertexFormat::Sint32x2,
        VertexFormat::Sint32x3 => wgpu::VertexFormat::Sint32x3,
        VertexFormat::Sint32x4 => wgpu::VertexFormat::Sint32x4,
        VertexFormat::Float16x2 => wgpu::VertexFormat::Float16x2,
        VertexFormat::Float16x4 => wgpu::VertexFormat::Float16x4,
        VertexFormat::Uint16x2 => wgpu::VertexFormat::Uint16x2,
        VertexFormat::Uint16x4 => wgpu::VertexFormat::Uint16x4,
        VertexFormat::Unorm16x2 => wgpu::VertexFormat::Unorm16x2,
        VertexFormat::Unorm16x4 => wgpu::VertexFormat::Unorm16x4,
        VertexFormat::Uint8x4 => wgpu::VertexFormat::Uint8x4,
        VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
        VertexFormat::Snorm8x4 => wgpu::VertexFormat::Snorm8x4,
    }
}

#[must_use]
pub fn step_mode(mode: VertexStepMode) -> wgpu::VertexStepMode {
    match mode {
        VertexStepMode::Vertex => wgpu::VertexStepMode::Vertex,
        VertexStepMode::Instance => wgpu::VertexStepMode::Instance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_format_sizes_agree() {
        for raw in 1..=21 {
            let ours = VertexFormat::from_raw(raw).unwrap();
            assert_eq!(u64::from(ours.size()), vertex_format(ours).size(), "{ours:?}");
        }
    }

    #[test]
    fn color_mask_maps_channel_by_channel() {
        assert_eq!(color_writes(ColorWrites::ALL), wgpu::ColorWrites::ALL);
        assert_eq!(color_writes(ColorWrites::COLOR), wgpu::ColorWrites::COLOR);
        assert_eq!(color_writes(ColorWrites::empty()), wgpu::ColorWrites::empty());
    }

    #[test]
    fn alpha_blending_matches_wgpu_preset() {
        assert_eq!(
            blend_state(BlendState::ALPHA_BLENDING),
            wgpu::BlendState::ALPHA_BLENDING
        );
        assert_eq!(blend_state(BlendState::REPLACE), wgpu::BlendState::REPLACE);
    }

    #[test]
    fn front_and_back_culling_is_unsupported() {
        assert_eq!(cull_mode(CullMode::FrontAndBack), None);
        assert_eq!(cull_mode(CullMode::Back), Some(Some(wgpu::Face::Back)));
    }
}
