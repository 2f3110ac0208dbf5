//! Geolocation collaborators
//!
//! Two seams the recognition pipeline consults before visual search:
//! - [`GpsExtractor`] pulls coordinates out of image metadata
//! - [`ReverseGeocoder`] turns coordinates into a place name

mod exif;
mod nominatim;

pub use exif::{parse_gps, ExifGpsExtractor};
pub use nominatim::{place_name_from_response, NominatimGeocoder};

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A WGS84 coordinate pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lon)
    }
}

/// Coordinates to place name
pub trait ReverseGeocoder: Send + Sync {
    /// `Ok(None)` when the provider knows no name for the point.
    /// Transport and provider errors are `Error::GeocodingFailure`.
    fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>>;
}

/// Image bytes to embedded coordinates
pub trait GpsExtractor: Send + Sync {
    /// Unreadable or absent metadata is `None`, never an error
    fn extract_gps(&self, image: &[u8]) -> Option<GeoPoint>;
}
