//! Translates [Java class files](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html)
//! into a single self-contained JavaScript program.
//!
//! ```no_run
//! use jvm2js::{translate_to_string, DirResources, TranslateOptions};
//!
//! let classes = DirResources::new("target/classes");
//! let options = TranslateOptions::new(["org/example/Main"]);
//! let (script, report) = translate_to_string(&classes, &options).unwrap();
//! println!("{} classes, {} bytes", report.compiled.len(), script.len());
//! ```

use std::fs::File;
use std::io::{prelude::*, BufReader};
use std::path::Path;

pub mod attribute_info;
pub mod constant_info;
pub mod field_info;
pub mod method_info;

pub mod code_attribute;

pub mod cache;
pub mod class_data;
pub mod codegen;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod resources;
pub mod types;
pub mod vm;

pub use cache::{CacheError, ClassDataCache};
pub use class_data::{ClassData, FieldData, MethodData, ParseError};
pub use config::{LinkMode, ObfuscationLevel, TranslateOptions};
pub use error::TranslateError;
pub use resources::{ClassPath, DirResources, JarResources, MemoryResources, Resources};
pub use types::*;
pub use vm::{translate, translate_to_string, Translation};

/// Parses the class file at `path`.
///
/// ```rust
/// let result = jvm2js::parse_class("./no/such/Class.class");
/// assert!(result.is_err());
/// ```
pub fn parse_class(path: impl AsRef<Path>) -> Result<ClassData, TranslateError> {
    let path = path.as_ref();
    let io_error = |source| TranslateError::Io {
        resource: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    let mut reader = BufReader::new(file);
    parse_class_from_reader(&mut reader).map_err(|e| match e {
        TranslateError::Parse { source, .. } => TranslateError::Parse {
            resource: path.display().to_string(),
            source,
        },
        other => other,
    })
}

/// Parses one class file from `reader`.
///
/// ```rust
/// let mut reader = "this_will_be_parsed_as_classfile".as_bytes();
/// let result = jvm2js::parse_class_from_reader(&mut reader);
/// assert!(result.is_err());
/// ```
pub fn parse_class_from_reader<T: Read>(reader: &mut T) -> Result<ClassData, TranslateError> {
    let mut class_bytes = Vec::new();
    reader
        .read_to_end(&mut class_bytes)
        .map_err(|source| TranslateError::Io {
            resource: "<reader>".to_string(),
            source,
        })?;
    ClassData::parse(&class_bytes).map_err(|source| TranslateError::Parse {
        resource: "<reader>".to_string(),
        source,
    })
}
