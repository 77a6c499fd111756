//! Loader error type.

use std::fmt;

use vermilion_device::device::DeviceError;
use vermilion_notation::ParseError;

/// Errors produced by [`RenderStateLoader`](crate::RenderStateLoader).
#[derive(Debug)]
pub enum LoaderError {
    /// The requested name (or one of its dependencies) is not declared in
    /// the parsed notation.
    NotFound { kind: &'static str, name: String },
    /// The device rejected a create info.
    Device(DeviceError),
    /// The notation parser failed, typically during reload.
    Parse(ParseError),
}

impl LoaderError {
    pub(crate) fn not_found(kind: &'static str, name: &str) -> Self {
        log::error!("unable to find {kind} '{name}'");
        LoaderError::NotFound {
            kind,
            name: name.to_owned(),
        }
    }
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::NotFound { kind, name } => {
                write!(f, "unable to find {kind} '{name}'")
            }
            LoaderError::Device(err) => write!(f, "{err}"),
            LoaderError::Parse(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LoaderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoaderError::Device(err) => Some(err),
            LoaderError::Parse(err) => Some(err),
            LoaderError::NotFound { .. } => None,
        }
    }
}

impl From<DeviceError> for LoaderError {
    fn from(err: DeviceError) -> Self {
        LoaderError::Device(err)
    }
}

impl From<ParseError> for LoaderError {
    fn from(err: ParseError) -> Self {
        LoaderError::Parse(err)
    }
}
