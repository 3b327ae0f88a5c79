//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Elevation and metric grids are `f64` with NaN as the in-memory no-data.
/// Categorical grids (classification, masks) are `u8` with an explicit
/// sentinel.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::MAX
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                nodata == Some(*self)
            }

            fn is_float() -> bool {
                false
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) if !nd.is_nan() => (self - nd).abs() <= <$t>::EPSILON * nd.abs().max(1.0),
                    _ => false,
                }
            }

            fn is_float() -> bool {
                true
            }
        }
    };
}

impl_raster_element_int!(u8);
impl_raster_element_int!(u16);
impl_raster_element_int!(i16);
impl_raster_element_int!(i32);
impl_raster_element_float!(f32);
impl_raster_element_float!(f64);
