use std::{fmt, io};

use thiserror::Error;

use crate::cache::CacheError;
use crate::class_data::ParseError;
use crate::codegen::GenerationError;

/// Failure of a whole translation run. Output written before the error
/// must be discarded.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("{resource}: {source}")]
    Parse {
        resource: String,
        #[source]
        source: ParseError,
    },
    #[error("can't find class {0}")]
    ClassNotFound(String),
    #[error("can't find resource {0}")]
    ResourceNotFound(String),
    #[error("can't generate {class}: {source}; output ends with {tail:?}")]
    Generation {
        class: String,
        /// Generated text after the last opening brace.
        tail: String,
        #[source]
        source: GenerationError,
    },
    #[error("library translation exports no symbols")]
    NoExports,
    #[error("can't read {resource}: {source}")]
    Io {
        resource: String,
        #[source]
        source: io::Error,
    },
    #[error("can't write output")]
    Fmt(#[from] fmt::Error),
}

impl From<CacheError> for TranslateError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::ClassNotFound(name) => TranslateError::ClassNotFound(name),
            CacheError::Parse { resource, source } => TranslateError::Parse { resource, source },
            CacheError::Io { resource, source } => TranslateError::Io { resource, source },
        }
    }
}
