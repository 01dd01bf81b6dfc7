//! Process exit codes

/// Success - bundle written or check passed
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure, failed verification
pub const ERROR: i32 = 1;

/// Usage error - invalid arguments, request or configuration
pub const USAGE_ERROR: i32 = 2;

/// Template error - the chart could not be rendered
pub const TEMPLATE_ERROR: i32 = 3;

/// Image error - a pull or the image export failed
pub const IMAGE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
