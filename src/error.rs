use std::path::PathBuf;

use thiserror::Error;

/// Why a GPX file could not be added to the track store.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("could not open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("XML parse error: {0}")]
    XmlError(#[from] quick_xml::Error),
    #[error("no <gpx> root element found")]
    NoGpxElement,
    #[error("no trackpoints found")]
    NoGpxData,
    #[error("{0} is already loaded")]
    AlreadyLoaded(PathBuf),
}

impl From<quick_xml::events::attributes::AttrError> for LoadError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlError(e.into())
    }
}

impl From<std::str::Utf8Error> for LoadError {
    fn from(e: std::str::Utf8Error) -> Self {
        Self::XmlError(quick_xml::Error::Encoding(e.into()))
    }
}

#[derive(Error, Debug)]
pub enum TimezoneError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PNG decode error: {0}")]
    Png(#[from] png::DecodingError),
    #[error("invalid timezone table: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid color key '{0}'")]
    InvalidColor(String),
    #[error("raster data does not cover {width}x{height} pixels")]
    InvalidRaster { width: u32, height: u32 },
    #[error("unsupported raster color type {0:?}")]
    UnsupportedColorType(png::ColorType),
}

#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid options: {0}")]
    Json(#[from] serde_json::Error),
}
