//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                           |
//! |-----------------|--------------------------------------------|
//! | `manifest`      | `List`, `Current`, `Upload`, `Activate`    |
//! | `config`        | `Config`                                   |

pub mod config;
pub mod manifest;

pub use config::cmd_config;
pub use manifest::{cmd_activate, cmd_current, cmd_list, cmd_upload};
