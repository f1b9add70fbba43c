use std::process::Command;

use strum_macros::IntoStaticStr;

/// Enum of the external binaries bosun shells out to.
#[derive(Debug, Clone, Copy, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    Dig,
    Talosctl,
}

impl Dependency {
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Build a `Command` for the dependency.
    pub fn cmd(self) -> Command {
        Command::new(self.name())
    }

    /// Whether the binary can be found on PATH.
    pub fn exists(self) -> bool {
        which::which(self.name()).is_ok()
    }
}
