//! Error types for this crate.
use std::path::PathBuf;

use thiserror::Error;

/// Any kind of error that can happen when parsing a single typed cell, see [crate::Flag].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Error)]
pub enum ParseError {
    #[error("invalid boolean flag '{0}'")]
    InvalidFlag(String),
}

/// Fatal errors raised while locating or reading the dataset. None of them are recoverable within
/// a session: the host is expected to report them and stop.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("folder not found: {}", .0.display())]
    MissingDirectory(PathBuf),
    #[error(
        "no CSV files found in {}; folder contents: {}",
        .dir.display(),
        display_contents(.contents)
    )]
    NoSource { dir: PathBuf, contents: Vec<String> },
    #[error("invalid source pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("error while reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error during CSV processing: {0}")]
    Csv(#[from] csv::Error),
}

fn display_contents(contents: &[String]) -> String {
    if contents.is_empty() {
        "<empty>".to_owned()
    } else {
        contents.join(", ")
    }
}
