//! Process exit codes

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - missing passkey, bad durations, unreadable file
pub const CONFIG_ERROR: i32 = 2;

/// Broker error - connection or channel failure
pub const BROKER_ERROR: i32 = 3;

/// Store error - repository database unavailable
pub const STORE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
