use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown operating system `{0}` (expected linux, darwin or windows)")]
pub struct UnknownOs(pub String);

/// Host operating systems a build can run on or compile for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
  Linux,
  MacOs,
  Windows,
}

impl Os {
  pub fn current() -> Option<Self> {
    std::env::consts::OS.parse().ok()
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Linux => "linux",
      Self::MacOs => "darwin",
      Self::Windows => "windows",
    }
  }

  /// Vendor, system and ABI parts of a Rust target triple.
  pub fn target_suffix(&self) -> &'static str {
    match self {
      Self::Linux => "unknown-linux-gnu",
      Self::MacOs => "apple-darwin",
      Self::Windows => "pc-windows-msvc",
    }
  }
}

impl FromStr for Os {
  type Err = UnknownOs;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "linux" => Ok(Self::Linux),
      "macos" | "darwin" => Ok(Self::MacOs),
      "windows" => Ok(Self::Windows),
      _ => Err(UnknownOs(s.to_string())),
    }
  }
}

impl fmt::Display for Os {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
