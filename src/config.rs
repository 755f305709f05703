use std::time::Duration;

/// Delay between startup and the shortcut refresh, so it runs after initial sync traffic.
pub const DEFAULT_SHORTCUT_REFRESH_DELAY: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct PushConfig {
    pub shortcut_refresh_delay: Duration,
    /// Lower cap on published shortcuts. The publisher's own maximum always applies.
    pub max_shortcuts: Option<usize>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            shortcut_refresh_delay: DEFAULT_SHORTCUT_REFRESH_DELAY,
            max_shortcuts: None,
        }
    }
}
