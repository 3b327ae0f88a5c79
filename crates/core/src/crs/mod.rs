//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system of a surface.
///
/// Only carried through the pipeline; no reprojection is ever done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    wkt: Option<String>,
    epsg: Option<u32>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            wkt: None,
            epsg: Some(code),
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            wkt: Some(wkt.into()),
            epsg: None,
        }
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether the EPSG code falls in a geographic (degree-based) range
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(4000..=4999))
    }

    /// Short identifier for logs and reports
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            let head: String = wkt.chars().take(50).collect();
            return format!("WKT:{}", head);
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
