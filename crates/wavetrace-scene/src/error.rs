use std::fmt;
use std::path::{Path, PathBuf};

/// A parse error in a scene description.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// 1-based source line number where the error occurred.
    pub line: usize,
    /// 1-based source column number where the error occurred.
    pub col: usize,
}

impl ParseError {
    pub(crate) fn new(msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self { message: msg.into(), line, col }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene parse error at {}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for ParseError {}

/// What went wrong while loading a scene file.
#[derive(Debug)]
pub enum LoadErrorKind {
    /// The file could not be opened or read.
    Io(std::io::Error),
    /// The file was read but its contents are malformed.
    Parse(ParseError),
}

/// A scene file could not be loaded. Always names the offending file.
#[derive(Debug)]
pub struct LoadError {
    pub path: PathBuf,
    pub kind: LoadErrorKind,
}

impl LoadError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        Self { path: path.to_path_buf(), kind: LoadErrorKind::Io(err) }
    }

    pub(crate) fn parse(path: &Path, err: ParseError) -> Self {
        Self { path: path.to_path_buf(), kind: LoadErrorKind::Parse(err) }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoadErrorKind::Io(err) => {
                write!(f, "could not open scene file {}: {}", self.path.display(), err)
            }
            LoadErrorKind::Parse(err) => write!(f, "{}: {}", self.path.display(), err),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            LoadErrorKind::Io(err) => Some(err),
            LoadErrorKind::Parse(err) => Some(err),
        }
    }
}
