use std::borrow::Cow;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use log::{debug, info, warn};
use quick_xml::errors::IllFormedError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::coordinates::Coordinates;
use crate::error::LoadError;
use crate::gpx_types::*;
use crate::store::{canonical_path, TrackStore};

type Result<T> = std::result::Result<T, LoadError>;

/// Read the GPX file at `path` and add it to `store`.
///
/// Nothing is added unless the whole file parsed and contained at least one
/// trackpoint. A path already present in the store is rejected before the
/// file is opened.
pub fn load_file<P: AsRef<Path>>(store: &mut TrackStore, path: P) -> Result<LoadInfo> {
    let path = path.as_ref();
    if store.contains(path) {
        return Err(LoadError::AlreadyLoaded(canonical_path(path)));
    }

    let bytes = std::fs::read(path).map_err(|source| LoadError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    let xml = decode_document(&bytes)?;
    let parsed = parse_gpx(&xml)?;

    let track = store.add_track(path, parsed.segments);
    let info = LoadInfo {
        path: track.path().to_path_buf(),
        tracks: parsed.tracks,
        segments: track.segments().len(),
        points: track.segments().iter().map(|s| s.points.len()).sum(),
    };
    info!(
        "loaded {} points in {} segments from {}",
        info.points,
        info.segments,
        info.path.display()
    );
    Ok(info)
}

/// Decode a GPX file to UTF-8. Files that are not valid UTF-8 are decoded
/// with the encoding named in their XML declaration.
pub(crate) fn decode_document(bytes: &[u8]) -> Result<Cow<'_, str>> {
    let utf8_error = match std::str::from_utf8(bytes) {
        Ok(xml) => return Ok(Cow::Borrowed(xml)),
        Err(e) => e,
    };

    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let encoding = match reader.read_event_into(&mut buf) {
        Ok(Event::Decl(decl)) => decl.encoder(),
        _ => None,
    };
    let Some(encoding) = encoding else {
        return Err(utf8_error.into());
    };

    debug!("decoding GPX file as {}", encoding.name());
    quick_xml::encoding::decode(bytes, encoding)
        .map_err(|e| LoadError::XmlError(quick_xml::Error::Encoding(e)))
}

/// Parse a GPX document into its track segments.
///
/// Only `<trkpt>`s inside `<trk>` inside the `<gpx>` root are collected.
/// Routes and waypoints are ignored.
pub fn parse_gpx(xml: &str) -> Result<ParsedGpx> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);
    let mut data = ParsedGpx::default();
    let mut root_found = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"gpx" => root_found = true,
                b"trk" if root_found => {
                    parse_track(&mut reader, &mut data)?;
                    data.tracks += 1;
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"gpx" {
                    root_found = true;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LoadError::XmlError(e)),
            _ => {}
        }
    }

    if !root_found {
        return Err(LoadError::NoGpxElement);
    }
    if data.segments.is_empty() {
        return Err(LoadError::NoGpxData);
    }

    debug!(
        "parsed {} tracks, {} segments, {} points",
        data.tracks,
        data.segments.len(),
        data.points()
    );
    Ok(data)
}

/// Parse a <trk> element, appending its non-empty segments.
fn parse_track<'a>(reader: &mut Reader<&'a [u8]>, data: &mut ParsedGpx) -> Result<()> {
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkseg" => {
                    let seg = parse_segment(reader)?;
                    if !seg.points.is_empty() {
                        data.segments.push(seg);
                    }
                }
                _ => {
                    reader.read_to_end(e.name()).map_err(LoadError::XmlError)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trk" => break,
            Ok(Event::Eof) => return Err(missing_end_tag("trk")),
            Err(e) => return Err(LoadError::XmlError(e)),
            _ => {}
        }
    }

    Ok(())
}

/// Parse a <trkseg> element.
fn parse_segment<'a>(reader: &mut Reader<&'a [u8]>) -> Result<Segment> {
    let mut segment = Segment::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"trkpt" => {
                    if let Some(pt) = parse_point(&e, reader)? {
                        segment.points.push(pt);
                    }
                }
                _ => {
                    reader.read_to_end(e.name()).map_err(LoadError::XmlError)?;
                }
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"trkpt" {
                    if let Some((lon, lat)) = parse_lon_lat(&e)? {
                        segment
                            .points
                            .push(TrackPoint::new(None, Coordinates::new(lon, lat, 0.0)));
                    }
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkseg" => break,
            Ok(Event::Eof) => return Err(missing_end_tag("trkseg")),
            Err(e) => return Err(LoadError::XmlError(e)),
            _ => {}
        }
    }

    Ok(segment)
}

/// Parse a <trkpt> and its <ele>/<time> children.
/// Called after receiving Event::Start for the point element.
fn parse_point<'a>(
    start: &BytesStart<'a>,
    reader: &mut Reader<&'a [u8]>,
) -> Result<Option<TrackPoint>> {
    let Some((lon, lat)) = parse_lon_lat(start)? else {
        reader.read_to_end(start.name()).map_err(LoadError::XmlError)?;
        return Ok(None);
    };

    let mut alt = 0.0;
    let mut time = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"ele" => {
                    let text = read_text_owned(reader, &e)?;
                    alt = text.trim().parse::<f64>().unwrap_or(0.0);
                }
                b"time" => {
                    let text = read_text_owned(reader, &e)?;
                    time = parse_time(&text);
                    if time.is_none() {
                        debug!("ignoring unparsable trackpoint time '{text}'");
                    }
                }
                _ => {
                    // Skip name, extensions etc.
                    reader.read_to_end(e.name()).map_err(LoadError::XmlError)?;
                }
            },
            Ok(Event::End(e)) if e.local_name().as_ref() == b"trkpt" => break,
            Ok(Event::Eof) => return Err(missing_end_tag("trkpt")),
            Err(e) => return Err(LoadError::XmlError(e)),
            _ => {}
        }
    }

    Ok(Some(TrackPoint::new(time, Coordinates::new(lon, lat, alt))))
}

/// Read lon/lat from a trackpoint's start tag. A point with missing or
/// non-numeric coordinates yields `None` and is skipped by the caller.
fn parse_lon_lat(e: &BytesStart<'_>) -> Result<Option<(f64, f64)>> {
    let mut lat: Option<f64> = None;
    let mut lon: Option<f64> = None;

    for attr_result in e.attributes() {
        let attr = attr_result?;
        let val = std::str::from_utf8(&attr.value)?;
        match attr.key.local_name().as_ref() {
            b"lat" => lat = val.trim().parse::<f64>().ok(),
            b"lon" => lon = val.trim().parse::<f64>().ok(),
            _ => {}
        }
    }

    match (lon, lat) {
        (Some(lon), Some(lat)) => Ok(Some((lon, lat))),
        _ => {
            warn!("skipping trackpoint without valid lat/lon");
            Ok(None)
        }
    }
}

/// Parse an ISO 8601 timestamp, truncated to whole seconds.
/// Values without a UTC offset are taken as UTC.
pub(crate) fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let time = DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc())
        })
        .ok()?;
    Some(time.trunc_subsecs(0))
}

/// Read text content of an element as an owned String.
fn read_text_owned<'a>(reader: &mut Reader<&'a [u8]>, start: &BytesStart<'_>) -> Result<String> {
    let end_name = start.name().0.to_vec();
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Text(e)) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Ok(Event::CData(e)) => text.push_str(std::str::from_utf8(e.as_ref())?),
            Ok(Event::End(e)) if e.name().0 == end_name.as_slice() => break,
            Ok(Event::Eof) => {
                return Err(missing_end_tag(&String::from_utf8_lossy(&end_name)));
            }
            Err(e) => return Err(LoadError::XmlError(e)),
            _ => {}
        }
    }

    Ok(text)
}

fn missing_end_tag(name: &str) -> LoadError {
    LoadError::XmlError(quick_xml::Error::IllFormed(IllFormedError::MissingEndTag(
        name.to_string(),
    )))
}
