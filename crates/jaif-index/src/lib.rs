//! Reading and writing annotation index files.
//!
//! An index file lists annotation definitions followed by the annotations
//! they describe, keyed by package, class and member:
//!
//! ```text
//! package p:
//! annotation visible @A:
//!     int value
//!
//! package p:
//! class Foo:
//!     field x: @p.A(value=5)
//! ```
//!
//! Parsing merges into an existing [`AScene`]; writing renders the whole
//! scene or nothing.

#![forbid(unsafe_code)]

mod error;
mod lexer;
mod parser;
mod writer;

use std::fs;
use std::io;
use std::path::Path;

use jaif_scene::AScene;

pub use crate::error::{IndexFileError, ParseError, WriteError};
pub use crate::writer::{
    render, write, write_file, write_with_options, IndentStyle, WriteOptions,
};

/// Name reported for input that did not come from a file.
const STREAM_NAME: &str = "<stream>";

/// Parses `text` and merges its annotations into `scene`.
///
/// Definitions are scoped to `text`: every annotation type used must be
/// defined earlier in the same input. On error `scene` may hold part of the
/// input and should be discarded.
pub fn parse(text: &str, scene: &mut AScene) -> Result<(), ParseError> {
    parser::parse_into(text, scene)
}

/// Parses `text` into a new scene.
pub fn parse_str(text: &str) -> Result<AScene, ParseError> {
    parser::parse_str(text)
}

/// Reads `reader` to the end and merges the parsed contents into `scene`.
pub fn parse_reader<R: io::Read>(mut reader: R, scene: &mut AScene) -> Result<(), IndexFileError> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|source| IndexFileError::Io {
            path: STREAM_NAME.to_string(),
            source,
        })?;
    parse(&text, scene).map_err(|source| IndexFileError::Parse {
        path: STREAM_NAME.to_string(),
        source,
    })
}

/// Reads the index file at `path` and merges it into `scene`.
pub fn parse_file(path: impl AsRef<Path>, scene: &mut AScene) -> Result<(), IndexFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| IndexFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let classes_before = scene.classes.len();
    parse(&text, scene).map_err(|source| IndexFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    tracing::debug!(
        target = "jaif.index",
        path = %path.display(),
        new_classes = scene.classes.len() - classes_before,
        "parsed index file"
    );
    Ok(())
}
