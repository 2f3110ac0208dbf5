//! OpenStreetMap Nominatim reverse geocoding client

use super::{GeoPoint, ReverseGeocoder};
use crate::config::GeocoderSection;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

/// Address fields tried in order before falling back to `display_name`
const ADDRESS_FIELDS: [&str; 5] = ["tourism", "historic", "attraction", "name", "building"];

/// Blocking Nominatim client
///
/// Requests are serialized and spaced at least `min_interval` apart.
pub struct NominatimGeocoder {
    base_url: String,
    http: HttpClient,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderSection) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::GeocodingFailure(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.base_url.clone(),
            http,
            min_interval: Duration::from_millis(config.min_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    fn fetch(&self, point: GeoPoint) -> Result<Value> {
        let lat = point.lat.to_string();
        let lon = point.lon.to_string();
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "json"),
                ("addressdetails", "1"),
            ])
            .send()
            .map_err(|e| {
                Error::GeocodingFailure(format!("Failed to reach {}: {e}", self.base_url))
            })?;

        if !response.status().is_success() {
            return Err(Error::GeocodingFailure(format!(
                "Nominatim returned status: {}",
                response.status()
            )));
        }

        response
            .json::<Value>()
            .map_err(|e| Error::GeocodingFailure(format!("Failed to parse response: {e}")))
    }
}

impl ReverseGeocoder for NominatimGeocoder {
    fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>> {
        // Held across the request so concurrent callers queue behind the rate limit
        let mut last = self.last_request.lock();
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }

        let body = self.fetch(point);
        *last = Some(Instant::now());

        let name = place_name_from_response(&body?);
        debug!(%point, name = ?name, "Reverse geocoded");
        Ok(name)
    }
}

/// Pick the most landmark-like name out of a Nominatim `format=json` response
///
/// Empty strings are skipped. Error bodies (`{"error": ...}`) yield `None`.
pub fn place_name_from_response(body: &Value) -> Option<String> {
    let address = body.get("address");
    let from_address = ADDRESS_FIELDS.iter().find_map(|field| {
        address
            .and_then(|a| a.get(field))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    });

    from_address
        .or_else(|| {
            body.get("display_name")
                .and_then(Value::as_str)
                .and_then(|d| d.split(',').next())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
}
