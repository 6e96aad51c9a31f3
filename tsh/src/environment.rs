use anyhow::{Context as _, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories searched, in order, for a command that is not found as given.
/// Read once at startup and never changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// Builds the search path from `$PATH`. An unset `PATH` searches nothing
    /// beyond the command as typed.
    pub fn from_env() -> Result<Self> {
        let Some(path) = env::var_os("PATH") else {
            debug!("PATH is unset, search path is empty");
            return Ok(SearchPath::default());
        };
        let cwd = env::current_dir().context("getcwd error")?;
        Ok(Self::parse(&path.to_string_lossy(), &cwd))
    }

    /// Splits a colon-separated list. Empty components stand for the working
    /// directory and are replaced by `cwd` here, once.
    pub fn parse(path: &str, cwd: &Path) -> Self {
        let dirs: Vec<PathBuf> = path
            .split(':')
            .map(|entry| {
                if entry.is_empty() {
                    cwd.to_path_buf()
                } else {
                    PathBuf::from(entry)
                }
            })
            .collect();
        debug!("search path {:?}", dirs);
        SearchPath { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Every path worth handing to exec for `name`: the name exactly as
    /// typed, then `<dir>/<name>` for each directory in order.
    pub fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(self.dirs.len() + 1);
        candidates.push(PathBuf::from(name));
        candidates.extend(self.dirs.iter().map(|dir| {
            let mut joined = dir.clone().into_os_string();
            joined.push("/");
            joined.push(name);
            PathBuf::from(joined)
        }));
        candidates
    }
}
