use std::time::Duration;

/// Port the server listens on when none is given.
pub const DEFAULT_PORT: u16 = 4455;

/// Highest RPC version this implementation speaks.
pub const RPC_VERSION: u32 = 1;

/// Wait between a lost connection and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);
