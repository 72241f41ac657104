//! Stable exit codes for yasi CLI commands.

/// Session completed, or every batch entry was visited.
pub const OK: i32 = 0;
/// The session failed, or the command hit invalid config/input.
pub const FAILED: i32 = 1;
/// The idling environment (Steam client, presence helper, network) is not
/// available. A batch stops here and leaves the current entry pending.
pub const ENVIRONMENT_UNAVAILABLE: i32 = 2;
/// The session hit its idle time ceiling before the card target was met.
pub const TIMED_OUT: i32 = 3;
/// The operator interrupted the run (Ctrl-C).
pub const INTERRUPTED: i32 = 130;
