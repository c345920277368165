//! Fixed-width state enums.
//!
//! Keys store every enum as its raw discriminant so that the key stays
//! `Pod`. Each enum here therefore has an explicit `repr` and a lossless
//! `to_raw` / `from_raw` pair.

use bitflags::bitflags;

macro_rules! raw_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr($repr)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant = $value ),+
        }

        impl $name {
            /// Raw discriminant as stored inside a key.
            #[inline]
            #[must_use]
            pub const fn to_raw(self) -> $repr {
                self as $repr
            }

            /// Decodes a raw discriminant; `None` for unknown values.
            #[inline]
            #[must_use]
            pub const fn from_raw(raw: $repr) -> Option<Self> {
                match raw {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }
    };
}

raw_enum! {
    /// Which faces are culled.
    pub enum CullMode: u8 {
        None = 0,
        Front = 1,
        Back = 2,
        FrontAndBack = 3,
    }
}

raw_enum! {
    /// How polygons are rasterized.
    pub enum PolygonMode: u8 {
        Fill = 0,
        Line = 1,
        Point = 2,
    }
}

raw_enum! {
    /// Winding order of front-facing triangles.
    pub enum FrontFace: u8 {
        Ccw = 0,
        Cw = 1,
    }
}

raw_enum! {
    /// Depth / stencil comparison.
    pub enum CompareFunction: u8 {
        Never = 0,
        Less = 1,
        Equal = 2,
        LessEqual = 3,
        Greater = 4,
        NotEqual = 5,
        GreaterEqual = 6,
        Always = 7,
    }
}

raw_enum! {
    pub enum BlendFactor: u8 {
        Zero = 0,
        One = 1,
        Src = 2,
        OneMinusSrc = 3,
        SrcAlpha = 4,
        OneMinusSrcAlpha = 5,
        Dst = 6,
        OneMinusDst = 7,
        DstAlpha = 8,
        OneMinusDstAlpha = 9,
        SrcAlphaSaturated = 10,
        Constant = 11,
        OneMinusConstant = 12,
    }
}

raw_enum! {
    pub enum BlendOperation: u8 {
        Add = 0,
        Subtract = 1,
        ReverseSubtract = 2,
        Min = 3,
        Max = 4,
    }
}

raw_enum! {
    pub enum StencilOperation: u8 {
        Keep = 0,
        Zero = 1,
        Replace = 2,
        Invert = 3,
        IncrementClamp = 4,
        DecrementClamp = 5,
        IncrementWrap = 6,
        DecrementWrap = 7,
    }
}

raw_enum! {
    pub enum PrimitiveTopology: u32 {
        PointList = 0,
        LineList = 1,
        LineStrip = 2,
        TriangleList = 3,
        TriangleStrip = 4,
    }
}

raw_enum! {
    /// Vertex attribute format. `0` is reserved for "attribute unused".
    pub enum VertexFormat: u32 {
        Float32 = 1,
        Float32x2 = 2,
        Float32x3 = 3,
        Float32x4 = 4,
        Uint32 = 5,
        Uint32x2 = 6,
        Uint32x3 = 7,
        Uint32x4 = 8,
        Sint32 = 9,
        Sint32x2 = 10,
        Sint32x3 = 11,
        Sint32x4 = 12,
        Float16x2 = 13,
        Float16x4 = 14,
        Uint16x2 = 15,
        Uint16x4 = 16,
        Unorm16x2 = 17,
        Unorm16x4 = 18,
        Uint8x4 = 19,
        Unorm8x4 = 20,
        Snorm8x4 = 21,
    }
}

impl VertexFormat {
    /// Size of one attribute of this format, in bytes.
    #[must_use]
    pub const fn size(self) -> u32 {
        match self {
            Self::Float32
            | Self::Uint32
            | Self::Sint32
            | Self::Float16x2
            | Self::Uint16x2
            | Self::Unorm16x2
            | Self::Uint8x4
            | Self::Unorm8x4
            | Self::Snorm8x4 => 4,
            Self::Float32x2
            | Self::Uint32x2
            | Self::Sint32x2
            | Self::Float16x4
            | Self::Uint16x4
            | Self::Unorm16x4 => 8,
            Self::Float32x3 | Self::Uint32x3 | Self::Sint32x3 => 12,
            Self::Float32x4 | Self::Uint32x4 | Self::Sint32x4 => 16,
        }
    }
}

raw_enum! {
    /// Advance rate of a vertex buffer slot. `0` is reserved for "slot unused".
    pub enum VertexStepMode: u32 {
        Vertex = 1,
        Instance = 2,
    }
}

raw_enum! {
    /// Layout an image is in while sampled.
    pub enum ImageLayout: u32 {
        Undefined = 0,
        General = 1,
        ShaderReadOnly = 2,
        DepthStencilReadOnly = 3,
    }
}

bitflags! {
    /// Color channels written by the fragment stage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWrites: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const COLOR = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const ALL = Self::COLOR.bits() | Self::ALPHA.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_round_trip_rejects_unknown_values() {
        assert_eq!(CompareFunction::from_raw(3), Some(CompareFunction::LessEqual));
        assert_eq!(CompareFunction::from_raw(8), None);
        assert_eq!(VertexFormat::from_raw(0), None);
        assert_eq!(VertexStepMode::from_raw(0), None);
        assert_eq!(PrimitiveTopology::TriangleList.to_raw(), 3);
    }

    #[test]
    fn vertex_format_sizes() {
        assert_eq!(VertexFormat::Float32x3.size(), 12);
        assert_eq!(VertexFormat::Unorm8x4.size(), 4);
        assert_eq!(VertexFormat::Float16x4.size(), 8);
    }
}
