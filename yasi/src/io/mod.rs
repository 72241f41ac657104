//! I/O helpers for yasi commands.

pub mod batch_list;
pub mod batch_state;
pub mod clock;
pub mod config;
pub mod idle_state;
pub mod init;
pub mod inventory;
pub mod presence;
pub mod process;
pub mod progress;
pub mod signal;
pub mod store;
