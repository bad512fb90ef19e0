//! Standard exit codes for CLI operations
//!
//! One code per failure kind so scripts can tell a bad flag from a failed
//! `helm upgrade`.

/// Success - render, inject and upgrade all completed
pub const SUCCESS: i32 = 0;

/// Configuration error - invalid flags, detected before any command ran
pub const CONFIG_ERROR: i32 = 2;

/// Resolution error - the chart could not be copied, unpacked or fetched
pub const RESOLUTION_ERROR: i32 = 3;

/// Discovery error - walking the staged chart failed
pub const DISCOVERY_ERROR: i32 = 4;

/// External tool error - helm or the injector failed or wrote to stderr
pub const EXTERNAL_TOOL_ERROR: i32 = 5;

/// IO error - writing or renaming manifests failed
pub const IO_ERROR: i32 = 6;
