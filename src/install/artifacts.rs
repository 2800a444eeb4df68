//! Installer artifact catalog: pinned versions, mirror lists, package names.
//!
//! Mirrors are ordered by expected reachability; the fetcher walks them in
//! order and the upstream source is the last resort.

/// Node.js release installed when no usable runtime is found.
pub(crate) const NODE_VERSION: &str = "20.10.0";

/// Node.js MSI mirrors for Windows.
pub(crate) const NODE_MSI_MIRRORS: &[&str] = &[
    "https://mirrors.aliyun.com/nodejs-release/v20.10.0/node-v20.10.0-x64.msi",
    "https://cdn.npmmirror.com/binaries/node/v20.10.0/node-v20.10.0-x64.msi",
    "https://nodejs.org/dist/v20.10.0/node-v20.10.0-x64.msi",
];

/// Node.js .pkg mirrors for macOS, used when Homebrew is unavailable.
pub(crate) const NODE_PKG_MIRRORS: &[&str] = &[
    "https://cdn.npmmirror.com/binaries/node/v20.10.0/node-v20.10.0.pkg",
    "https://nodejs.org/dist/v20.10.0/node-v20.10.0.pkg",
];

/// Git for Windows installer mirrors.
pub(crate) const GIT_WINDOWS_MIRRORS: &[&str] = &[
    "https://cdn.npmmirror.com/binaries/git-for-windows/v2.50.1.windows.1/Git-2.50.1-64-bit.exe",
    "https://github.com/git-for-windows/git/releases/download/v2.50.1.windows.1/Git-2.50.1-64-bit.exe",
    "https://mirrors.tuna.tsinghua.edu.cn/github-release/git-for-windows/git/v2.50.1.windows.1/Git-2.50.1-64-bit.exe",
];

/// npm package name of the CLI this pipeline provisions.
pub(crate) const CLI_PACKAGE: &str = "@anthropic-ai/claude-code";

/// Default npm registry mirror for the CLI install.
pub(crate) const DEFAULT_NPM_REGISTRY: &str = "https://registry.npmmirror.com";

/// Bootstrap script for Homebrew when it is absent on macOS.
pub(crate) const HOMEBREW_INSTALL_URL: &str =
    "https://gitee.com/cunkai/HomebrewCN/raw/master/Homebrew.sh";

/// Homebrew mirror configuration, applied only when the user has not
/// configured their own bottle domain.
pub(crate) const HOMEBREW_MIRROR_ENVS: &[(&str, &str)] = &[
    (
        "HOMEBREW_BREW_GIT_REMOTE",
        "https://mirrors.ustc.edu.cn/brew.git",
    ),
    (
        "HOMEBREW_CORE_GIT_REMOTE",
        "https://mirrors.ustc.edu.cn/homebrew-core.git",
    ),
    (
        "HOMEBREW_BOTTLE_DOMAIN",
        "https://mirrors.ustc.edu.cn/homebrew-bottles",
    ),
];
