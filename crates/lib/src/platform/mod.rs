//! Host and target platform resolution for build steps.

pub mod arch;
pub mod os;

pub use arch::Arch;
pub use os::{Os, UnknownOs};

use std::fmt;

/// Platform identifier combining architecture and OS (e.g., "aarch64-linux")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
  pub arch: Arch,
  pub os: Os,
}

impl Platform {
  pub fn new(arch: Arch, os: Os) -> Self {
    Self { arch, os }
  }

  /// Detect the current platform at runtime
  ///
  /// Returns `None` if the OS or architecture is not supported
  pub fn current() -> Option<Self> {
    Some(Self {
      arch: Arch::current()?,
      os: Os::current()?,
    })
  }

  /// Returns the platform triple string (e.g., "aarch64-darwin")
  pub fn triple(&self) -> String {
    format!("{}-{}", self.arch, self.os)
  }

  /// Platform string for `docker build --platform` (e.g., "linux/arm64").
  ///
  /// Containers always target Linux regardless of the host OS.
  pub fn container_platform(&self) -> String {
    format!("linux/{}", self.arch.container_name())
  }

  /// Rust target triple for native compilation on this platform.
  pub fn rust_target(&self) -> String {
    format!("{}-{}", self.arch, self.os.target_suffix())
  }
}

impl fmt::Display for Platform {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.triple())
  }
}
