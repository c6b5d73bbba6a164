//! Integration constants

use std::time::Duration;

pub const DOMAIN: &str = "sony_sdcp_projector";

pub const MANUFACTURER: &str = "Sony";
pub const MODEL: &str = "SDCP Projector";
pub const DEFAULT_NAME: &str = "Sony SDCP Projector";

/// Entry data key holding the projector address
pub const CONF_HOST: &str = "host";

/// Platform the integration forwards entries to
pub const PLATFORM: &str = "remote";

/// Pause before each power query; the projector answers stale state right
/// after a power change.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

pub const DEFAULT_NUM_REPEATS: u32 = 1;
