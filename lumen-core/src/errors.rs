// Lumen
// Copyright (c) 2026 The Project Lumen Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `errors` module defines the common error type.

use std::error;
use std::fmt;
use std::io;
use std::result;

/// `Error` provides an enumeration of all possible errors reported by Lumen.
#[derive(Debug)]
pub enum Error {
    /// An IO error occurred while reading, writing, or seeking a stream.
    IoError(io::Error),
    /// The stream contained malformed data and could not be decoded.
    DecodeError(&'static str),
    /// The decoder was configured with invalid or inconsistent parameters. Configuration errors
    /// are fatal and are reported before any processing starts.
    ConfigError(String),
    /// An unsupported feature of the source material was encountered.
    Unsupported(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::IoError(err) => fmt::Display::fmt(err, f),
            Error::DecodeError(msg) => {
                f.write_str("malformed stream: ")?;
                f.write_str(msg)
            }
            Error::ConfigError(msg) => {
                f.write_str("invalid configuration: ")?;
                f.write_str(msg)
            }
            Error::Unsupported(feature) => {
                f.write_str("unsupported feature: ")?;
                f.write_str(feature)
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Convenience function to create a decode error.
pub fn decode_error<T>(msg: &'static str) -> Result<T> {
    Err(Error::DecodeError(msg))
}

/// Convenience function to create a configuration error.
pub fn config_error<T, S: Into<String>>(msg: S) -> Result<T> {
    Err(Error::ConfigError(msg.into()))
}

/// Convenience function to create an unsupported feature error.
pub fn unsupported_error<T>(feature: &'static str) -> Result<T> {
    Err(Error::Unsupported(feature))
}
