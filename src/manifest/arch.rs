// src/manifest/arch.rs

//! Host architecture detection for architecture-qualified download URLs

use std::collections::BTreeMap;

/// Key in a `url-arch` table used when no architecture-specific entry matches
pub const DEFAULT_ARCH_KEY: &str = "default";

/// CPU architectures that may appear as `url-arch` keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostArch {
    /// x86_64 / AMD64
    X86_64,
    /// AArch64 / ARM64
    Aarch64,
}

impl HostArch {
    /// Architecture of the machine running this process
    pub fn detect() -> Option<Self> {
        Self::parse(std::env::consts::ARCH)
    }

    /// Parse an architecture name, accepting the common vendor spellings
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" | "x64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }
}

impl std::fmt::Display for HostArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pick the URL for `host` out of a `url-arch` table
///
/// An entry whose key names the host architecture wins; otherwise the
/// `default` entry is used. Returns `None` when neither exists.
pub fn select_arch_url<'a>(
    table: &'a BTreeMap<String, String>,
    host: Option<HostArch>,
) -> Option<&'a str> {
    if let Some(host) = host {
        let matched = table
            .iter()
            .find(|(key, _)| HostArch::parse(key) == Some(host));
        if let Some((_, url)) = matched {
            return Some(url.as_str());
        }
    }
    table.get(DEFAULT_ARCH_KEY).map(String::as_str)
}
