//! # DotBot Core Kernel
//!
//! Process-wide pieces shared by every subsystem:
//!
//! - [`Host`](host::Host): the explicit context object handed to every plugin. It owns the
//!   command registry, the dispatcher and the settings loader, so no subsystem relies on
//!   global mutable state.
//! - [`constants`]: names, file names and platform limits.
//! - [`error`]: the kernel [`Error`](error::Error) wrapping each subsystem error, and the
//!   `Result` alias.
pub mod constants;
pub mod error;
pub mod host;

pub use error::{Error, Result};
pub use host::Host;
