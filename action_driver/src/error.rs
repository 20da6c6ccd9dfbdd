// Copyright 2026 action-engine contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use action_cache::CacheError;
use action_model::{DigestError, ExportIndexOutOfRange};
use dispatch::DispatchError;
use source_deps::SourceDependencyParseError;

/// The action failed to produce one of its declared outputs.
#[derive(Debug)]
pub struct MissingOutput {
    pub path: String,
}

impl fmt::Display for MissingOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "action did not produce declared output {}", self.path)
    }
}

impl std::error::Error for MissingOutput {}

/// Top-level error for one `Build` invocation, aggregating every per-crate error kind this
/// workspace can produce. `CacheMiss` is handled internally by the driver and never reaches
/// here; everything else propagates as one of these variants.
#[derive(Debug)]
pub enum Error {
    Dispatch(DispatchError),
    MissingOutput(MissingOutput),
    SourceDependencyParse(SourceDependencyParseError),
    InvalidAction(ExportIndexOutOfRange),
    Cache(CacheError),
    Digest(DigestError),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Dispatch(e) => write!(f, "{e}"),
            Error::MissingOutput(e) => write!(f, "{e}"),
            Error::SourceDependencyParse(e) => write!(f, "{e}"),
            Error::InvalidAction(e) => write!(f, "{e}"),
            Error::Cache(e) => write!(f, "{e}"),
            Error::Digest(e) => write!(f, "{e}"),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Dispatch(e) => Some(e),
            Error::MissingOutput(e) => Some(e),
            Error::SourceDependencyParse(e) => Some(e),
            Error::InvalidAction(e) => Some(e),
            Error::Cache(e) => Some(e),
            Error::Digest(e) => Some(e),
            Error::Io(e) => Some(e),
        }
    }
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Error {
        Error::Dispatch(e)
    }
}

impl From<SourceDependencyParseError> for Error {
    fn from(e: SourceDependencyParseError) -> Error {
        Error::SourceDependencyParse(e)
    }
}

impl From<ExportIndexOutOfRange> for Error {
    fn from(e: ExportIndexOutOfRange) -> Error {
        Error::InvalidAction(e)
    }
}

impl From<CacheError> for Error {
    fn from(e: CacheError) -> Error {
        Error::Cache(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::Io(e)
    }
}

impl From<DigestError> for Error {
    fn from(e: DigestError) -> Error {
        Error::Digest(e)
    }
}
