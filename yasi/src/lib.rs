//! Steam trading-card idler.
//!
//! Idles games until a card target is met (`yasi idle`) and works through
//! resumable lists of games (`yasi batch`). The architecture keeps a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (target parsing, list lines,
//!   time budgets, outcome classification). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (Steam HTTP, the presence helper,
//!   config and state files, signals). Isolated behind traits so sessions can
//!   be driven by fakes in tests.
//!
//! Orchestration modules ([`session`], [`idle`], [`batch`]) coordinate core
//! logic with I/O to implement CLI commands.

pub mod batch;
pub mod core;
pub mod exit_codes;
pub mod idle;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
