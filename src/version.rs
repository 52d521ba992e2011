//! Build information embedded by `build.rs`

use std::fmt;

use crate::protocol::{BROADCAST_PORT, UNICAST_PORT};

/// Compile-time facts about this binary
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Package name
    pub name: &'static str,
    /// Package version from Cargo.toml
    pub version: &'static str,
    /// Short git commit hash, or "unknown" outside a checkout
    pub git_hash: &'static str,
    git_dirty: &'static str,
    /// UTC build time
    pub build_timestamp: &'static str,
    /// Target triple
    pub target: &'static str,
    /// Cargo profile
    pub profile: &'static str,
}

impl BuildInfo {
    /// Information about the running binary
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            git_hash: env!("PELOTARI_GIT_HASH"),
            git_dirty: env!("PELOTARI_GIT_DIRTY"),
            build_timestamp: env!("PELOTARI_BUILD_TIMESTAMP"),
            target: env!("PELOTARI_TARGET"),
            profile: env!("PELOTARI_PROFILE"),
        }
    }

    /// Whether the tree had uncommitted changes at build time
    pub fn git_dirty(&self) -> bool {
        self.git_dirty == "true"
    }

    /// e.g. "0.1.0-abc1234" or "0.1.0-abc1234-dirty"
    pub fn full_version(&self) -> String {
        if self.git_dirty() {
            format!("{}-{}-dirty", self.version, self.git_hash)
        } else {
            format!("{}-{}", self.version, self.git_hash)
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.name, self.full_version())?;
        writeln!(f)?;
        writeln!(f, "Build:")?;
        writeln!(f, "  Git Hash:   {}{}", self.git_hash, if self.git_dirty() { " (dirty)" } else { "" })?;
        writeln!(f, "  Built:      {}", self.build_timestamp)?;
        writeln!(f, "  Profile:    {}", self.profile)?;
        writeln!(f, "  Target:     {}", self.target)?;
        writeln!(f)?;
        writeln!(f, "Protocol:")?;
        writeln!(f, "  Broadcast:  udp/{}", BROADCAST_PORT)?;
        writeln!(f, "  Unicast:    udp/{}", UNICAST_PORT)?;
        Ok(())
    }
}

/// Print version information to stdout
pub fn print_version() {
    print!("{}", BuildInfo::current());
}
