//! Append-only log of finished matches.

use crate::game::MatchResult;
use std::fs::OpenOptions;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Player1 | Score: 4 | (P1=4, P2=2)`. A draw reports slot 0's score.
    pub fn format_line(result: &MatchResult) -> String {
        let [first, second] = result.scores;
        let shown = match result.winner.slot() {
            Some(slot) => result.scores[slot],
            None => first,
        };
        format!(
            "{} | Score: {} | (P1={}, P2={})",
            result.winner.label(),
            shown,
            first,
            second
        )
    }

    /// Blocking write; call from `spawn_blocking` when on the runtime.
    pub fn append(&self, result: &MatchResult) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", Self::format_line(result))
    }

    /// Every recorded line, oldest first. A missing file is an empty log.
    pub fn load(&self) -> io::Result<Vec<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_owned)
                .collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}
