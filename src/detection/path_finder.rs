//! PATH-based executable lookup and well-known install directories.

use crate::Dependency;
use std::path::{Path, PathBuf};

/// Locate an executable through the system PATH.
///
/// This handles symlinks, relative entries, and the platform's executable
/// extensions via the `which` crate. The result is diagnostic: the first
/// probe stage logs it, but only a successful version invocation confirms
/// the tool is usable.
pub(crate) fn locate_on_path(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Executable file name for a dependency on the given OS.
pub(crate) fn executable_file_name(dep: Dependency, os: &str) -> String {
    let name = dep.executable_name();
    if os == "windows" {
        // npm installs the CLI entry point as a .cmd shim, native tools as .exe
        match dep {
            Dependency::ClaudeCli => format!("{name}.cmd"),
            _ => format!("{name}.exe"),
        }
    } else {
        name.to_string()
    }
}

/// Well-known install directories to scan when PATH lookup fails.
///
/// These are the locations the stock installers use; right after a silent
/// install the directory is often not yet on PATH in this process, so the
/// probe checks them directly.
pub(crate) fn fallback_dirs(dep: Dependency, os: &str, home: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = match os {
        "windows" => match dep {
            Dependency::NodeJs => vec![
                PathBuf::from(r"C:\Program Files\nodejs"),
                PathBuf::from(r"C:\Program Files (x86)\nodejs"),
            ],
            Dependency::Git => vec![
                PathBuf::from(r"C:\Program Files\Git\bin"),
                PathBuf::from(r"C:\Program Files (x86)\Git\bin"),
            ],
            Dependency::ClaudeCli => Vec::new(),
        },
        "macos" => vec![
            PathBuf::from("/opt/homebrew/bin"),
            PathBuf::from("/usr/local/bin"),
            PathBuf::from("/usr/bin"),
        ],
        _ => vec![PathBuf::from("/usr/local/bin"), PathBuf::from("/usr/bin")],
    };

    if let Some(home) = home {
        match os {
            "windows" => {
                if dep == Dependency::ClaudeCli {
                    dirs.push(home.join(r"AppData\Roaming\npm"));
                }
            }
            "macos" => {}
            _ => {
                dirs.push(home.join(".local/bin"));
                dirs.push(home.join("bin"));
            }
        }
    }

    dirs
}
