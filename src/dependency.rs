//! Dependency enum identifying the tools this crate provisions.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// A tool the provisioning pipeline ensures is present.
///
/// The pipeline installs the Claude Code CLI on top of its two external
/// dependencies: the Node.js runtime it runs on and the Git client it
/// expects to find. Install steps have real ordering constraints (the CLI
/// cannot be installed before its runtime exists), so callers should treat
/// the [`Dependency::all`] order as significant.
///
/// # Example
///
/// ```rust
/// use claude_provision::Dependency;
///
/// for dep in Dependency::all() {
///     println!("{}: {}", dep.display_name(), dep.executable_name());
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[non_exhaustive]
pub enum Dependency {
    /// Node.js runtime (node CLI)
    NodeJs,
    /// Git version control client (git CLI)
    Git,
    /// The Claude Code CLI itself (claude CLI)
    ClaudeCli,
}

impl Dependency {
    /// The executable name to search for in PATH.
    ///
    /// # Example
    ///
    /// ```rust
    /// use claude_provision::Dependency;
    ///
    /// assert_eq!(Dependency::NodeJs.executable_name(), "node");
    /// assert_eq!(Dependency::Git.executable_name(), "git");
    /// ```
    pub fn executable_name(&self) -> &'static str {
        match self {
            Self::NodeJs => "node",
            Self::Git => "git",
            Self::ClaudeCli => "claude",
        }
    }

    /// Human-readable display name, suitable for log lines and UI labels.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::NodeJs => "Node.js",
            Self::Git => "Git",
            Self::ClaudeCli => "Claude Code",
        }
    }

    /// Arguments that make the tool print its version.
    ///
    /// All three tools follow the `--version` convention.
    pub fn version_args(&self) -> &'static [&'static str] {
        &["--version"]
    }

    /// Minimum accepted major version, if the pipeline enforces one.
    ///
    /// The Claude Code CLI requires Node.js 16 or newer; a probe that finds
    /// an older runtime reports it as unusable rather than absent. Git and
    /// the CLI itself are accepted at any version.
    pub fn minimum_major(&self) -> Option<u64> {
        match self {
            Self::NodeJs => Some(16),
            Self::Git | Self::ClaudeCli => None,
        }
    }

    /// Iterator over all dependencies in install order.
    ///
    /// # Example
    ///
    /// ```rust
    /// use claude_provision::Dependency;
    ///
    /// let deps: Vec<_> = Dependency::all().collect();
    /// assert_eq!(deps.len(), 3);
    /// ```
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
