use std::time::Duration;

pub(crate) const DEFAULT_API_PORT: u16 = 8728;
pub(crate) const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(1);
pub(crate) const PROBE_COUNT: u32 = 1;
/// Reported for a positive probe whose reply carried no round-trip time.
pub(crate) const NOMINAL_LATENCY: &str = "1ms";

pub(crate) const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Upper bound for a single word, anything longer is treated as a corrupt stream.
pub(crate) const MAX_WORD_LEN: usize = 16 * 1024 * 1024;
