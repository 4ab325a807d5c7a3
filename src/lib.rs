//! Assign geographic positions to photos by matching their capture times
//! against GPX track logs.
//!
//! GPX files are loaded into a [`TrackStore`] with [`load_file`]. A
//! [`MatchEngine`] then looks up positions for capture times, either as
//! exact matches within a tolerance or interpolated between two recorded
//! points. [`TimezoneLocator`] guesses the timezone a track was recorded in.

pub mod converter;
pub mod coordinates;
pub mod error;
pub mod gpx_types;
pub mod matcher;
pub mod options;
pub mod parser;
pub mod store;
pub mod timezone;

pub use crate::coordinates::{BoundingBox, Coordinates, EARTH_RADIUS};
pub use crate::error::{LoadError, OptionsError, TimezoneError};
pub use crate::gpx_types::{LoadInfo, Segment, TrackPoint};
pub use crate::matcher::{Match, MatchEngine, MatchReport, MatchType, SearchType};
pub use crate::options::{ExportOptions, MatchOptions};
pub use crate::parser::{load_file, parse_gpx};
pub use crate::store::{Track, TrackStore};
pub use crate::timezone::{TimezoneData, TimezoneLocator};
