use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use crate::errors::Error;

use super::Line;

/// Streaming reader over a script file with one-line pushback.
///
/// Opens its file at construction and fails with [`Error::File`] when the
/// path is unreadable. The handle is released on drop.
pub struct LineReader {
    path: PathBuf,
    file: BufReader<File>,
    line_num: usize,
    returned: Option<Line>,
}

impl LineReader {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let file = File::open(&path).map_err(|e| {
            Error::File(format!("file {} not found or not readable: {e}", path.display()))
        })?;
        Ok(Self {
            path,
            file: BufReader::new(file),
            line_num: 0,
            returned: None,
        })
    }

    /// Next physical line, or `None` at end of file.
    pub fn next(&mut self) -> Option<Line> {
        if let Some(line) = self.returned.take() {
            return Some(line);
        }

        let mut buf = String::new();
        match self.file.read_line(&mut buf) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                self.line_num += 1;
                Some(Line::new(self.path.clone(), self.line_num, buf))
            }
        }
    }

    /// Next non-blank line, or `None` at end of file.
    pub fn next_token(&mut self) -> Option<Line> {
        while let Some(l) = self.next() {
            if !l.is_empty() {
                return Some(l);
            }
        }
        None
    }

    /// Push one line back for re-reading. The buffer holds a single line;
    /// a second `back` without an intervening read overwrites it.
    pub fn back(&mut self, line: Line) {
        self.returned = Some(line);
    }
}
