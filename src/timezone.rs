//! Presumed timezone of a track from a color-coded world raster.
//!
//! The raster is an equirectangular map of the whole Earth where every
//! timezone is painted in its own color. A JSON table maps `#rrggbb`
//! colors to IANA timezone ids. Both are loaded once and shared.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use crate::coordinates::Coordinates;
use crate::error::TimezoneError;
use crate::store::TrackStore;

pub const IMAGE_FILE: &str = "timezones.png";
pub const TABLE_FILE: &str = "timezones.json";

/// Ids renamed in the timezone database after the raster was generated,
/// mapped back to the names older systems know.
const RENAMED_TIMEZONES: &[(&str, &str)] = &[
    ("Europe/Kyiv", "Europe/Kiev"),
    ("America/Ciudad_Juarez", "America/Ojinaga"),
    ("Pacific/Kanton", "Pacific/Enderbury"),
];

type Rgb = [u8; 3];

#[derive(Debug)]
struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

/// The lookup raster and color table. Empty when loading failed.
#[derive(Debug, Default)]
pub struct TimezoneData {
    raster: Option<Raster>,
    table: HashMap<Rgb, String>,
}

impl TimezoneData {
    /// Data that never resolves a timezone.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Load `timezones.png` and `timezones.json` from `dir`. Failures are
    /// logged and yield [`TimezoneData::unavailable`].
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self::load(dir.join(IMAGE_FILE), dir.join(TABLE_FILE))
    }

    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(image: P, table: Q) -> Self {
        match Self::try_load(image, table) {
            Ok(data) => data,
            Err(e) => {
                warn!("timezone detection unavailable: {e}");
                Self::unavailable()
            }
        }
    }

    pub fn try_load<P: AsRef<Path>, Q: AsRef<Path>>(
        image: P,
        table: Q,
    ) -> Result<Self, TimezoneError> {
        let raster = read_raster(image.as_ref())?;
        let json = std::fs::read_to_string(table)?;
        let table = parse_table(&json)?;
        debug!(
            "timezone raster {}x{} with {} colors",
            raster.width,
            raster.height,
            table.len()
        );
        Ok(Self {
            raster: Some(raster),
            table,
        })
    }

    /// Build from an RGB8 pixel buffer (row-major) and a JSON color table.
    pub fn from_parts(
        width: u32,
        height: u32,
        rgb: &[u8],
        table_json: &str,
    ) -> Result<Self, TimezoneError> {
        Ok(Self {
            raster: Some(raster_from_samples(width, height, rgb, 3)?),
            table: parse_table(table_json)?,
        })
    }

    pub fn is_available(&self) -> bool {
        self.raster.is_some() && !self.table.is_empty()
    }

    fn pixel_at(&self, coordinates: &Coordinates) -> Option<Rgb> {
        let raster = self.raster.as_ref()?;
        let x = ((coordinates.lon + 180.0) / 360.0 * f64::from(raster.width)).floor();
        let y = ((90.0 - coordinates.lat) / 180.0 * f64::from(raster.height)).floor();
        let x = (x.max(0.0) as u32).min(raster.width - 1);
        let y = (y.max(0.0) as u32).min(raster.height - 1);
        raster
            .pixels
            .get((y as usize) * (raster.width as usize) + x as usize)
            .copied()
    }
}

/// Maps positions to timezone ids using shared [`TimezoneData`].
#[derive(Debug, Clone)]
pub struct TimezoneLocator {
    data: Arc<TimezoneData>,
}

impl TimezoneLocator {
    pub fn new(data: Arc<TimezoneData>) -> Self {
        Self { data }
    }

    /// Timezone id at `coordinates`, or `None` if it can't be determined.
    pub fn locate(&self, coordinates: &Coordinates) -> Option<String> {
        let color = self.data.pixel_at(coordinates)?;
        let id = self.data.table.get(&color).cloned();
        if id.is_none() {
            debug!(
                "no timezone for color #{:02x}{:02x}{:02x}",
                color[0], color[1], color[2]
            );
        }
        id
    }

    /// Timezone at the bounding box center of the loaded track at `path`.
    pub fn locate_track<P: AsRef<Path>>(&self, store: &TrackStore, path: P) -> Option<String> {
        let center = store.bounding_box_center(path)?;
        self.locate(&center)
    }
}

fn read_raster(path: &Path) -> Result<Raster, TimezoneError> {
    let mut decoder = png::Decoder::new(BufReader::new(File::open(path)?));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let mut reader = decoder.read_info()?;
    let mut buf = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buf)?;
    let samples = match frame.color_type {
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => return Err(TimezoneError::UnsupportedColorType(other)),
    };
    raster_from_samples(
        frame.width,
        frame.height,
        &buf[..frame.buffer_size()],
        samples,
    )
}

fn raster_from_samples(
    width: u32,
    height: u32,
    data: &[u8],
    samples: usize,
) -> Result<Raster, TimezoneError> {
    let expected = width as usize * height as usize * samples;
    if width == 0 || height == 0 || data.len() < expected {
        return Err(TimezoneError::InvalidRaster { width, height });
    }
    let pixels = data[..expected]
        .chunks_exact(samples)
        .map(|px| [px[0], px[1], px[2]])
        .collect();
    Ok(Raster {
        width,
        height,
        pixels,
    })
}

fn parse_table(json: &str) -> Result<HashMap<Rgb, String>, TimezoneError> {
    let raw: HashMap<String, String> = serde_json::from_str(json)?;
    raw.into_iter()
        .map(|(color, id)| {
            let id = RENAMED_TIMEZONES
                .iter()
                .find(|(new, _)| *new == id)
                .map_or(id, |(_, old)| old.to_string());
            Ok((parse_color(&color)?, id))
        })
        .collect()
}

/// Parse `#rrggbb` (case-insensitive).
fn parse_color(s: &str) -> Result<Rgb, TimezoneError> {
    let invalid = || TimezoneError::InvalidColor(s.to_string());
    let hex = s.strip_prefix('#').ok_or_else(invalid)?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4x2 world: west half red, east half green, bottom-right white.
    fn world() -> TimezoneData {
        let r = [255, 0, 0];
        let g = [0, 255, 0];
        let w = [255, 255, 255];
        let rows: Vec<u8> = [r, r, g, g, r, r, g, w].concat();
        TimezoneData::from_parts(
            4,
            2,
            &rows,
            r##"{"#FF0000": "America/New_York", "#00ff00": "Europe/Kyiv"}"##,
        )
        .unwrap()
    }

    #[test]
    fn test_locate() {
        let locator = TimezoneLocator::new(Arc::new(world()));
        assert_eq!(
            locator.locate(&Coordinates::new(-74.0, 40.7, 0.0)).as_deref(),
            Some("America/New_York")
        );
        // Renamed id is mapped back.
        assert_eq!(
            locator.locate(&Coordinates::new(30.5, 50.4, 0.0)).as_deref(),
            Some("Europe/Kiev")
        );
        // White has no entry.
        assert_eq!(locator.locate(&Coordinates::new(170.0, -45.0, 0.0)), None);
    }

    #[test]
    fn test_edges_clamped() {
        let locator = TimezoneLocator::new(Arc::new(world()));
        assert_eq!(
            locator.locate(&Coordinates::new(-180.0, 90.0, 0.0)).as_deref(),
            Some("America/New_York")
        );
        assert_eq!(locator.locate(&Coordinates::new(180.0, -90.0, 0.0)), None);
        assert_eq!(
            locator.locate(&Coordinates::new(180.0, 90.0, 0.0)).as_deref(),
            Some("Europe/Kiev")
        );
    }

    #[test]
    fn test_unavailable() {
        let data = TimezoneData::load("does/not/exist.png", "does/not/exist.json");
        assert!(!data.is_available());
        let locator = TimezoneLocator::new(Arc::new(data));
        assert_eq!(locator.locate(&Coordinates::new(0.0, 0.0, 0.0)), None);
    }

    #[test]
    fn test_invalid_table() {
        assert!(matches!(
            parse_color("red"),
            Err(TimezoneError::InvalidColor(_))
        ));
        assert!(matches!(
            TimezoneData::from_parts(1, 1, &[0, 0, 0], "[]"),
            Err(TimezoneError::Json(_))
        ));
        assert!(TimezoneData::from_parts(2, 2, &[0, 0, 0], "{}").is_err());
    }
}
