//! Configuration types for the engine and bridge.

use std::time::Duration;

/// Configuration for engine and bridge behavior.
///
/// Use [`EngineConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use page_audio::EngineConfig;
/// use std::time::Duration;
///
/// let config = EngineConfig {
///     state_refresh_delay: Duration::from_millis(300),
///     ..Default::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed prefix namespacing the channel's event names.
    ///
    /// The per-page token is appended, so unrelated scripts cannot address
    /// the channel without it.
    /// Default: `"page-audio"`
    pub channel_prefix: String,

    /// Coalescing delay before native volume is re-applied to media.
    ///
    /// Bursts of DOM insertions collapse into one re-application.
    /// Default: 50ms
    pub reapply_delay: Duration,

    /// Coalescing delay before the state snapshot is recomputed and,
    /// if changed, broadcast.
    ///
    /// Default: 150ms
    pub state_refresh_delay: Duration,

    /// Upper bound on how long the bridge waits for a fresh snapshot.
    ///
    /// After this, [`Bridge::query_state`](crate::Bridge::query_state)
    /// returns whatever snapshot it already has.
    /// Default: 500ms
    pub state_query_timeout: Duration,

    /// Commands the bridge buffers while the engine is not yet ready.
    ///
    /// When full, the oldest buffered command is dropped.
    /// Default: 32
    pub pending_command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_prefix: "page-audio".to_string(),
            reapply_delay: Duration::from_millis(50),
            state_refresh_delay: Duration::from_millis(150),
            state_query_timeout: Duration::from_millis(500),
            pending_command_capacity: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.channel_prefix, "page-audio");
        assert_eq!(config.reapply_delay, Duration::from_millis(50));
        assert_eq!(config.state_refresh_delay, Duration::from_millis(150));
        assert_eq!(config.state_query_timeout, Duration::from_millis(500));
        assert_eq!(config.pending_command_capacity, 32);
    }

    #[test]
    fn test_engine_config_override() {
        let config = EngineConfig {
            channel_prefix: "boost".to_string(),
            ..Default::default()
        };
        assert_eq!(config.channel_prefix, "boost");
        assert_eq!(config.reapply_delay, Duration::from_millis(50));
    }
}
