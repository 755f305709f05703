/// First API level that exposes dynamic launcher shortcuts.
pub const SHORTCUTS_MIN_API_LEVEL: u32 = 25;
/// First API level where work that must outlive backgrounding needs a foreground service.
pub const FOREGROUND_TASKS_MIN_API_LEVEL: u32 = 26;

/// Capabilities of the host platform, probed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformInfo {
    pub api_level: u32,
    /// Running under a test or headless harness with no launcher to publish to.
    pub headless: bool,
}

impl PlatformInfo {
    pub fn new(api_level: u32) -> Self {
        Self {
            api_level,
            headless: false,
        }
    }

    pub fn headless(api_level: u32) -> Self {
        Self {
            api_level,
            headless: true,
        }
    }

    pub fn supports_shortcuts(&self) -> bool {
        self.api_level >= SHORTCUTS_MIN_API_LEVEL
    }

    pub fn supports_foreground_tasks(&self) -> bool {
        self.api_level >= FOREGROUND_TASKS_MIN_API_LEVEL
    }
}

/// Per-launch facts the application knows once it has started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupState {
    /// Very first launch after install; there is no conversation history yet.
    pub first_start: bool,
}
