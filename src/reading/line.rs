use std::fmt;
use std::path::{Path, PathBuf};

/// One physical line of a script file, immutable once read.
///
/// Carries its source position so that every error raised while parsing or
/// running the directive built from it can name the exact file and line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub path: PathBuf,
    pub number: usize,
    pub content: String,
}

impl Line {
    pub fn new(path: impl Into<PathBuf>, number: usize, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            number,
            content: content.into(),
        }
    }

    /// True when the line holds nothing but whitespace.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// Directory of the file this line came from. Relative paths in file
    /// embeds and includes resolve against this, not the working directory.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.number)
    }
}
