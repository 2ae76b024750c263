//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

/// Runtime descriptor of an output pixel type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl PixelType {
    /// Size in bytes of one pixel
    pub fn size_of(self) -> usize {
        match self {
            PixelType::Int8 | PixelType::UInt8 => 1,
            PixelType::Int16 | PixelType::UInt16 => 2,
            PixelType::Int32 | PixelType::UInt32 | PixelType::Float32 => 4,
            PixelType::Int64 | PixelType::UInt64 | PixelType::Float64 => 8,
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelType::Int8 => "Int8",
            PixelType::Int16 => "Int16",
            PixelType::Int32 => "Int32",
            PixelType::Int64 => "Int64",
            PixelType::UInt8 => "Byte",
            PixelType::UInt16 => "UInt16",
            PixelType::UInt32 => "UInt32",
            PixelType::UInt64 => "UInt64",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
        };
        f.write_str(name)
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// Besides bounding the numeric types usable as cell values, this carries the
/// conversion from the double precision values every interpolator produces
/// into the caller's pixel type.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Runtime pixel type tag
    const PIXEL_TYPE: PixelType;

    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert an interpolated value into this type.
    ///
    /// Integer types round to nearest and saturate at their range, with NaN
    /// mapping to zero. Float types cast.
    fn from_f64(value: f64) -> Self;

    /// Bulk conversion of a scanline into an output row.
    fn copy_from_f64(src: &[f64], dst: &mut [Self]) {
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = Self::from_f64(s);
        }
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $tag:ident) => {
        impl RasterElement for $t {
            const PIXEL_TYPE: PixelType = PixelType::$tag;

            fn default_nodata() -> Self {
                <$t>::MIN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                match nodata {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                // `as` saturates and maps NaN to 0
                value.round() as $t
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $tag:ident) => {
        impl RasterElement for $t {
            const PIXEL_TYPE: PixelType = PixelType::$tag;

            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }

            #[inline]
            fn from_f64(value: f64) -> Self {
                value as $t
            }
        }
    };
}

impl_raster_element_int!(i8, Int8);
impl_raster_element_int!(i16, Int16);
impl_raster_element_int!(i32, Int32);
impl_raster_element_int!(i64, Int64);
impl_raster_element_int!(u8, UInt8);
impl_raster_element_int!(u16, UInt16);
impl_raster_element_int!(u32, UInt32);
impl_raster_element_int!(u64, UInt64);
impl_raster_element_float!(f32, Float32);
impl_raster_element_float!(f64, Float64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_conversion_saturates() {
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(u8::from_f64(-4.0), 0);
        assert_eq!(i16::from_f64(12.5), 13);
        assert_eq!(i16::from_f64(-12.4), -12);
        assert_eq!(i32::from_f64(f64::NAN), 0);
    }

    #[test]
    fn test_float_conversion() {
        assert_eq!(f32::from_f64(1.5), 1.5f32);
        assert!(f64::from_f64(f64::NAN).is_nan());
    }

    #[test]
    fn test_copy_scanline() {
        let src = [0.4, 1.6, 254.9, 1000.0];
        let mut dst = [0u8; 4];
        u8::copy_from_f64(&src, &mut dst);
        assert_eq!(dst, [0, 2, 255, 255]);
    }

    #[test]
    fn test_pixel_type_tags() {
        assert_eq!(<u16 as RasterElement>::PIXEL_TYPE, PixelType::UInt16);
        assert_eq!(PixelType::Float64.size_of(), 8);
        assert_eq!(PixelType::UInt8.to_string(), "Byte");
    }
}
