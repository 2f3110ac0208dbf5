//! GPS coordinates from EXIF metadata
//!
//! The `image` crate hands back the raw EXIF block (a TIFF structure). Only the
//! GPS IFD is read: LatitudeRef, Latitude, LongitudeRef, Longitude.

use super::{GeoPoint, GpsExtractor};
use image::{ImageDecoder, ImageReader};
use std::io::Cursor;
use tracing::debug;

const EXIF_PREAMBLE: &[u8] = b"Exif\0\0";
const TIFF_MAGIC: u16 = 42;
const GPS_IFD_POINTER: u16 = 0x8825;

const GPS_LATITUDE_REF: u16 = 1;
const GPS_LATITUDE: u16 = 2;
const GPS_LONGITUDE_REF: u16 = 3;
const GPS_LONGITUDE: u16 = 4;

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

/// Reads GPS tags from JPEG/PNG/TIFF/WebP metadata
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifGpsExtractor;

impl GpsExtractor for ExifGpsExtractor {
    fn extract_gps(&self, image: &[u8]) -> Option<GeoPoint> {
        let reader = ImageReader::new(Cursor::new(image))
            .with_guessed_format()
            .ok()?;
        let mut decoder = reader.into_decoder().ok()?;
        let exif = match decoder.exif_metadata() {
            Ok(Some(exif)) => exif,
            Ok(None) => return None,
            Err(e) => {
                debug!("Unreadable EXIF block: {}", e);
                return None;
            }
        };
        parse_gps(&exif)
    }
}

/// Parse GPS coordinates out of a raw EXIF block
///
/// Accepts the block with or without the `Exif\0\0` preamble.
pub fn parse_gps(exif: &[u8]) -> Option<GeoPoint> {
    let data = exif.strip_prefix(EXIF_PREAMBLE).unwrap_or(exif);
    let tiff = Tiff::new(data)?;

    let ifd0 = tiff.u32_at(4)? as usize;
    let pointer = tiff.entries(ifd0)?.into_iter().find(|e| e.tag == GPS_IFD_POINTER)?;
    if pointer.kind != TYPE_LONG {
        return None;
    }
    let gps = tiff.entries(tiff.u32_at(pointer.value_at)? as usize)?;
    let find = |tag: u16| gps.iter().find(|e| e.tag == tag);

    let lat_ref = tiff.reference(find(GPS_LATITUDE_REF)?)?;
    let lon_ref = tiff.reference(find(GPS_LONGITUDE_REF)?)?;
    let lat = tiff.degrees(find(GPS_LATITUDE)?)?;
    let lon = tiff.degrees(find(GPS_LONGITUDE)?)?;

    let lat = if lat_ref == b'S' { -lat } else { lat };
    let lon = if lon_ref == b'W' { -lon } else { lon };

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(GeoPoint::new(lat, lon))
}

struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    /// Offset of the 4-byte value/offset field
    value_at: usize,
}

struct Tiff<'a> {
    data: &'a [u8],
    little_endian: bool,
}

impl<'a> Tiff<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let little_endian = match data.get(0..2)? {
            b"II" => true,
            b"MM" => false,
            _ => return None,
        };
        let tiff = Self {
            data,
            little_endian,
        };
        (tiff.u16_at(2)? == TIFF_MAGIC).then_some(tiff)
    }

    fn u16_at(&self, at: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(at..at.checked_add(2)?)?.try_into().ok()?;
        Some(if self.little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    fn u32_at(&self, at: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(at..at.checked_add(4)?)?.try_into().ok()?;
        Some(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn entries(&self, ifd: usize) -> Option<Vec<Entry>> {
        let count = self.u16_at(ifd)? as usize;
        (0..count)
            .map(|i| {
                let at = ifd + 2 + i * 12;
                Some(Entry {
                    tag: self.u16_at(at)?,
                    kind: self.u16_at(at + 2)?,
                    count: self.u32_at(at + 4)?,
                    value_at: at + 8,
                })
            })
            .collect()
    }

    /// First character of an ASCII ref tag ("N", "S", "E", "W")
    fn reference(&self, entry: &Entry) -> Option<u8> {
        if entry.kind != TYPE_ASCII || entry.count == 0 {
            return None;
        }
        // Short ASCII values live inline in the value field
        let at = if entry.count <= 4 {
            entry.value_at
        } else {
            self.u32_at(entry.value_at)? as usize
        };
        self.data.get(at).copied()
    }

    /// Degrees/minutes/seconds rationals to decimal degrees
    fn degrees(&self, entry: &Entry) -> Option<f64> {
        if entry.kind != TYPE_RATIONAL || entry.count < 2 {
            return None;
        }
        let base = self.u32_at(entry.value_at)? as usize;
        let rational = |i: usize| -> Option<f64> {
            let numerator = self.u32_at(base + i * 8)?;
            let denominator = self.u32_at(base + i * 8 + 4)?;
            (denominator != 0).then(|| numerator as f64 / denominator as f64)
        };

        let d = rational(0)?;
        let m = rational(1)?;
        let s = if entry.count > 2 { rational(2)? } else { 0.0 };
        Some(d + m / 60.0 + s / 3600.0)
    }
}
