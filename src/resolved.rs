//! Explicit record of tool directories discovered during a run.

use crate::Dependency;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Directories resolved for freshly discovered or installed tools.
///
/// When a probe finds an executable in a well-known directory that is not
/// on PATH (typical right after a silent install, before the user opens a
/// new shell), the directory is recorded here instead of mutating the
/// process-wide environment. Every subprocess the pipeline spawns
/// afterwards gets a PATH built by [`ResolvedPaths::path_env`], so later
/// steps see the tool without a restart and without hidden global state.
///
/// The pipeline's single execution task is the only writer; the map is
/// carried through steps by value inside the step context.
///
/// # Example
///
/// ```rust
/// use claude_provision::{Dependency, ResolvedPaths};
/// use std::path::PathBuf;
///
/// let mut resolved = ResolvedPaths::default();
/// resolved.record(Dependency::NodeJs, PathBuf::from("/opt/homebrew/bin"));
/// assert!(resolved.dir_for(Dependency::NodeJs).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResolvedPaths {
    dirs: Vec<PathBuf>,
    by_dependency: HashMap<Dependency, PathBuf>,
}

impl ResolvedPaths {
    /// Record the directory a dependency was discovered in.
    ///
    /// Repeated directories are kept once, in first-seen order.
    pub fn record(&mut self, dependency: Dependency, dir: PathBuf) {
        if !self.dirs.contains(&dir) {
            self.dirs.push(dir.clone());
        }
        self.by_dependency.insert(dependency, dir);
    }

    /// Directory recorded for a dependency, if any.
    pub fn dir_for(&self, dependency: Dependency) -> Option<&Path> {
        self.by_dependency.get(&dependency).map(PathBuf::as_path)
    }

    /// All recorded directories, in first-seen order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// True when no directory has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Build a PATH value with the resolved directories ahead of the
    /// inherited one.
    ///
    /// Entries already present in the inherited PATH are not repeated.
    /// Falls back to the inherited PATH unchanged if a recorded directory
    /// cannot be joined (embedded separator).
    pub fn path_env(&self) -> OsString {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        if self.dirs.is_empty() {
            return inherited;
        }

        let existing: Vec<PathBuf> = std::env::split_paths(&inherited).collect();
        let fresh = self.dirs.iter().filter(|d| !existing.contains(d)).cloned();

        match std::env::join_paths(fresh.chain(existing.iter().cloned())) {
            Ok(joined) => joined,
            Err(_) => inherited,
        }
    }
}
