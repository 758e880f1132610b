//! External collaborators of the bridge
//!
//! - `qmd` - search index subprocess
//! - `obsidian` - Obsidian CLI subprocess
//! - `process` - spawn, capture and exit-code handling shared by both
//! - `vault_fs` - direct reads and writes under the vault root

pub mod obsidian;
pub mod process;
pub mod qmd;
pub mod vault_fs;

pub use obsidian::{HostApp, ObsidianCli};
pub use qmd::QmdClient;
pub use vault_fs::{Note, VaultStats};
