//! RecognitionPipeline - GPS first, visual similarity as fallback
//!
//! ```text
//! Start -> coordinates (explicit, else EXIF, else none)
//!   coordinates? -> GeoLookup -> name? -> Done(gps, 0.95)
//!   otherwise    -> VisualSearch -> match? -> Done(visual, match confidence)
//!                                 no match -> Done(visual, 0.0, "Unknown")
//! ```
//!
//! Geocoding failures degrade to visual search. Embedding failures fail the
//! request: there is nothing left to fall back to.

use crate::embeddings::ImageEmbedder;
use crate::engine::SimilarityEngine;
use crate::error::Result;
use crate::geo::{GeoPoint, GpsExtractor, ReverseGeocoder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence reported for any geocoded name, whatever the provider says
pub const GPS_CONFIDENCE: f32 = 0.95;

/// Place name reported when nothing matched
pub const UNKNOWN_PLACE: &str = "Unknown";

/// Which evidence decided the outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Gps,
    Visual,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Gps => write!(f, "gps"),
            Source::Visual => write!(f, "visual"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionOutcome {
    pub place_name: String,
    pub confidence: f32,
    pub source: Source,
    /// Coordinates resolved at the start of the request, if any
    pub coordinates: Option<GeoPoint>,
}

impl RecognitionOutcome {
    pub fn is_unknown(&self) -> bool {
        self.source == Source::Visual && self.place_name == UNKNOWN_PLACE && self.confidence == 0.0
    }
}

/// Stateless per request; all shared state lives behind the collaborators
pub struct RecognitionPipeline {
    engine: Arc<SimilarityEngine>,
    embedder: Arc<dyn ImageEmbedder>,
    geocoder: Arc<dyn ReverseGeocoder>,
    gps: Arc<dyn GpsExtractor>,
    threshold: f32,
}

impl RecognitionPipeline {
    pub fn new(
        engine: Arc<SimilarityEngine>,
        embedder: Arc<dyn ImageEmbedder>,
        geocoder: Arc<dyn ReverseGeocoder>,
        gps: Arc<dyn GpsExtractor>,
        threshold: f32,
    ) -> Self {
        Self {
            engine,
            embedder,
            geocoder,
            gps,
            threshold,
        }
    }

    /// Replace the visual match threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Recognize the place in `image`
    ///
    /// Caller-supplied coordinates always win over EXIF, including `(0.0, 0.0)`.
    pub fn recognize(&self, image: &[u8], coordinates: Option<GeoPoint>) -> Result<RecognitionOutcome> {
        let coordinates = coordinates.or_else(|| {
            let from_exif = self.gps.extract_gps(image);
            if let Some(point) = from_exif {
                debug!(%point, "Using EXIF coordinates");
            }
            from_exif
        });

        if let Some(point) = coordinates {
            if let Some(place_name) = self.geo_lookup(point) {
                let outcome = RecognitionOutcome {
                    place_name,
                    confidence: GPS_CONFIDENCE,
                    source: Source::Gps,
                    coordinates,
                };
                info!(source = %outcome.source, place = %outcome.place_name, confidence = outcome.confidence, "Recognized");
                return Ok(outcome);
            }
        }

        let embedding = self.embedder.embed(image)?;
        let outcome = match self.engine.best_match(&embedding, self.threshold)? {
            Some(m) => RecognitionOutcome {
                place_name: m.place_name,
                confidence: m.confidence,
                source: Source::Visual,
                coordinates,
            },
            None => RecognitionOutcome {
                place_name: UNKNOWN_PLACE.to_string(),
                confidence: 0.0,
                source: Source::Visual,
                coordinates,
            },
        };
        info!(source = %outcome.source, place = %outcome.place_name, confidence = outcome.confidence, "Recognized");
        Ok(outcome)
    }

    fn geo_lookup(&self, point: GeoPoint) -> Option<String> {
        match self.geocoder.reverse_geocode(point) {
            Ok(Some(name)) if !name.trim().is_empty() => Some(name),
            Ok(_) => {
                debug!(%point, "No place name for coordinates, falling back to visual search");
                None
            }
            Err(e) => {
                warn!(%point, "Geocoding failed, falling back to visual search: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::index::IndexStore;
    use approx::assert_relative_eq;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; DIM];
        v[i] = 1.0;
        v
    }

    /// Returns a fixed vector, or fails
    struct FixedEmbedder(Option<Vec<f32>>);

    impl ImageEmbedder for FixedEmbedder {
        fn embed(&self, _image: &[u8]) -> Result<Vec<f32>> {
            self.0
                .clone()
                .ok_or_else(|| Error::EmbeddingFailure("model unavailable".to_string()))
        }
        fn dimension(&self) -> usize {
            DIM
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    enum GeoReply {
        Name(&'static str),
        Nothing,
        Fail,
    }

    /// Records every point it was asked about
    struct FakeGeocoder {
        reply: GeoReply,
        calls: Mutex<Vec<GeoPoint>>,
    }

    impl FakeGeocoder {
        fn new(reply: GeoReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl ReverseGeocoder for FakeGeocoder {
        fn reverse_geocode(&self, point: GeoPoint) -> Result<Option<String>> {
            self.calls.lock().push(point);
            match self.reply {
                GeoReply::Name(name) => Ok(Some(name.to_string())),
                GeoReply::Nothing => Ok(None),
                GeoReply::Fail => Err(Error::GeocodingFailure("HTTP 503".to_string())),
            }
        }
    }

    struct FakeGps(Option<GeoPoint>);

    impl GpsExtractor for FakeGps {
        fn extract_gps(&self, _image: &[u8]) -> Option<GeoPoint> {
            self.0
        }
    }

    struct Fixture {
        _temp: TempDir,
        engine: Arc<SimilarityEngine>,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let engine = SimilarityEngine::open(IndexStore::new(temp.path(), DIM)).unwrap();
        engine.add(&axis(0), "Taj_Mahal", "taj.jpg").unwrap();
        engine.add(&axis(1), "Colosseum", "colosseum.jpg").unwrap();
        Fixture {
            _temp: temp,
            engine: Arc::new(engine),
        }
    }

    fn pipeline(
        fx: &Fixture,
        embedding: Option<Vec<f32>>,
        geocoder: Arc<FakeGeocoder>,
        exif: Option<GeoPoint>,
    ) -> RecognitionPipeline {
        RecognitionPipeline::new(
            fx.engine.clone(),
            Arc::new(FixedEmbedder(embedding)),
            geocoder,
            Arc::new(FakeGps(exif)),
            0.6,
        )
    }

    /// Unit vector at cosine 0.82 from axis 0: squared distance 0.36, confidence 0.82
    fn near_taj() -> Vec<f32> {
        vec![0.82, (1.0f32 - 0.82 * 0.82).sqrt(), 0.0, 0.0]
    }

    #[test]
    fn test_geocoded_name_wins_regardless_of_visual_content() -> Result<()> {
        let fx = fixture();
        let eiffel = GeoPoint::new(48.8584, 2.2945);
        let p = pipeline(&fx, Some(axis(0)), FakeGeocoder::new(GeoReply::Name("Eiffel_Tower")), None);

        let outcome = p.recognize(b"jpeg", Some(eiffel))?;
        assert_eq!(outcome.place_name, "Eiffel_Tower");
        assert_relative_eq!(outcome.confidence, 0.95);
        assert_eq!(outcome.source, Source::Gps);
        assert_eq!(outcome.coordinates, Some(eiffel));
        Ok(())
    }

    #[test]
    fn test_visual_match_above_threshold() -> Result<()> {
        let fx = fixture();
        let p = pipeline(&fx, Some(near_taj()), FakeGeocoder::new(GeoReply::Nothing), None);

        let outcome = p.recognize(b"jpeg", None)?;
        assert_eq!(outcome.place_name, "Taj_Mahal");
        assert_relative_eq!(outcome.confidence, 0.82, epsilon = 1e-4);
        assert_eq!(outcome.source, Source::Visual);
        assert_eq!(outcome.coordinates, None);
        Ok(())
    }

    #[test]
    fn test_nothing_within_threshold_is_unknown() -> Result<()> {
        let fx = fixture();
        let p = pipeline(&fx, Some(axis(3)), FakeGeocoder::new(GeoReply::Nothing), None);

        let outcome = p.recognize(b"jpeg", None)?;
        assert_eq!(outcome.place_name, UNKNOWN_PLACE);
        assert_eq!(outcome.confidence, 0.0);
        assert_eq!(outcome.source, Source::Visual);
        assert!(outcome.is_unknown());
        Ok(())
    }

    #[test]
    fn test_geocoding_failure_falls_back_to_visual() -> Result<()> {
        let fx = fixture();
        let point = GeoPoint::new(41.8902, 12.4922);
        let geocoder = FakeGeocoder::new(GeoReply::Fail);
        let p = pipeline(&fx, Some(axis(1)), geocoder.clone(), None);

        let outcome = p.recognize(b"jpeg", Some(point))?;
        assert_eq!(outcome.place_name, "Colosseum");
        assert_eq!(outcome.source, Source::Visual);
        assert_eq!(outcome.coordinates, Some(point));
        assert_eq!(geocoder.calls.lock().len(), 1);
        Ok(())
    }

    #[test]
    fn test_empty_geocoded_name_falls_back_to_visual() -> Result<()> {
        let fx = fixture();
        let p = pipeline(&fx, Some(axis(3)), FakeGeocoder::new(GeoReply::Name("  ")), None);

        let outcome = p.recognize(b"jpeg", Some(GeoPoint::new(1.0, 1.0)))?;
        assert!(outcome.is_unknown());
        assert_eq!(outcome.coordinates, Some(GeoPoint::new(1.0, 1.0)));
        Ok(())
    }

    #[test]
    fn test_embedding_failure_fails_the_request() {
        let fx = fixture();
        let p = pipeline(&fx, None, FakeGeocoder::new(GeoReply::Nothing), None);

        let err = p.recognize(b"jpeg", None).unwrap_err();
        assert!(matches!(err, Error::EmbeddingFailure(_)));
    }

    #[test]
    fn test_explicit_coordinates_take_precedence_over_exif() -> Result<()> {
        let fx = fixture();
        let explicit = GeoPoint::new(27.1751, 78.0421);
        let exif = GeoPoint::new(48.8584, 2.2945);
        let geocoder = FakeGeocoder::new(GeoReply::Name("Taj Mahal"));
        let p = pipeline(&fx, Some(axis(0)), geocoder.clone(), Some(exif));

        let outcome = p.recognize(b"jpeg", Some(explicit))?;
        assert_eq!(outcome.coordinates, Some(explicit));
        assert_eq!(*geocoder.calls.lock(), vec![explicit]);
        Ok(())
    }

    #[test]
    fn test_exif_used_when_no_explicit_coordinates() -> Result<()> {
        let fx = fixture();
        let exif = GeoPoint::new(48.8584, 2.2945);
        let geocoder = FakeGeocoder::new(GeoReply::Name("Tour Eiffel"));
        let p = pipeline(&fx, Some(axis(0)), geocoder.clone(), Some(exif));

        let outcome = p.recognize(b"jpeg", None)?;
        assert_eq!(outcome.source, Source::Gps);
        assert_eq!(outcome.place_name, "Tour Eiffel");
        assert_eq!(*geocoder.calls.lock(), vec![exif]);
        Ok(())
    }

    #[test]
    fn test_zero_coordinates_count_as_present() -> Result<()> {
        let fx = fixture();
        let null_island = GeoPoint::new(0.0, 0.0);
        let geocoder = FakeGeocoder::new(GeoReply::Nothing);
        let p = pipeline(&fx, Some(axis(0)), geocoder.clone(), Some(GeoPoint::new(10.0, 10.0)));

        let outcome = p.recognize(b"jpeg", Some(null_island))?;
        assert_eq!(outcome.coordinates, Some(null_island));
        assert_eq!(*geocoder.calls.lock(), vec![null_island]);
        Ok(())
    }

    #[test]
    fn test_no_coordinates_skips_geocoder() -> Result<()> {
        let fx = fixture();
        let geocoder = FakeGeocoder::new(GeoReply::Name("Should_Not_Be_Used"));
        let p = pipeline(&fx, Some(axis(0)), geocoder.clone(), None);

        let outcome = p.recognize(b"jpeg", None)?;
        assert_eq!(outcome.source, Source::Visual);
        assert!(geocoder.calls.lock().is_empty());
        Ok(())
    }

    #[test]
    fn test_threshold_override() -> Result<()> {
        let fx = fixture();
        let p = pipeline(&fx, Some(near_taj()), FakeGeocoder::new(GeoReply::Nothing), None)
            .with_threshold(0.9);

        assert!(p.recognize(b"jpeg", None)?.is_unknown());
        Ok(())
    }

    #[test]
    fn test_outcome_serializes_lowercase_source() {
        let outcome = RecognitionOutcome {
            place_name: "Eiffel_Tower".to_string(),
            confidence: 0.95,
            source: Source::Gps,
            coordinates: Some(GeoPoint::new(48.8584, 2.2945)),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["source"], "gps");
        assert_eq!(json["coordinates"]["lat"], 48.8584);
    }
}
