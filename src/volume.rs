//! Volume setting and the per-element routing policy.
//!
//! Native element volume is capped at unity, so anything louder needs the
//! element routed through the shared boost graph. [`decide`] picks, per
//! element, which control carries the level.

use serde::{Deserialize, Serialize};

/// Unity gain (100%).
pub const UNITY: f64 = 1.0;

/// Which control carries the requested level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VolumeMethod {
    /// Only audio-graph gain. Media elements are routed into the boost graph.
    #[serde(rename = "graph", alias = "webaudio")]
    GraphOnly,
    /// Only the element's native volume. Boost above 100% is unavailable.
    #[serde(rename = "native")]
    NativeOnly,
    /// Native volume up to 100%, graph gain beyond.
    #[default]
    #[serde(rename = "both")]
    Both,
}

impl VolumeMethod {
    /// Returns `true` if newly discovered media need native handling.
    pub fn touches_native(self) -> bool {
        matches!(self, Self::NativeOnly | Self::Both)
    }
}

/// The single authoritative volume setting of an engine.
///
/// `level` is on a unity scale: `1.0` is 100%, `3.0` is 300%.
///
/// # Example
///
/// ```
/// use page_audio::{VolumeMethod, VolumeSetting};
///
/// let setting = VolumeSetting::from_percent(250.0, VolumeMethod::Both);
/// assert_eq!(setting.level, 2.5);
/// assert_eq!(setting.native_level(), 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeSetting {
    /// Requested loudness, `0.0..`, unbounded above.
    pub level: f64,
    /// How the level is applied.
    pub method: VolumeMethod,
}

impl Default for VolumeSetting {
    fn default() -> Self {
        Self {
            level: UNITY,
            method: VolumeMethod::Both,
        }
    }
}

impl VolumeSetting {
    /// Converts a percentage (100 = unity). Negative values clamp to 0.
    pub fn from_percent(percent: f64, method: VolumeMethod) -> Self {
        Self {
            level: (percent / 100.0).max(0.0),
            method,
        }
    }

    /// The level as a percentage.
    pub fn percent(&self) -> f64 {
        self.level * 100.0
    }

    /// The level clamped to what native volume can express.
    pub fn native_level(&self) -> f64 {
        self.level.clamp(0.0, UNITY)
    }

    /// The value every engine-owned gain stage carries.
    ///
    /// Under `NativeOnly` gains are neutralized to unity so a previous boost
    /// no longer colors loudness.
    pub fn graph_level(&self) -> f64 {
        match self.method {
            VolumeMethod::NativeOnly => UNITY,
            VolumeMethod::GraphOnly | VolumeMethod::Both => self.level,
        }
    }
}

/// What to do with one media element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Set native volume directly; no routing.
    Native {
        /// Native volume to write, within `0.0..=1.0`.
        volume: f64,
        /// The element was routed earlier and its gain must be neutralized.
        neutralize: bool,
    },
    /// Already routed: native volume to unity, the boost gain carries the level.
    Routed,
    /// Route the element into the boost graph.
    TryRoute {
        /// Native volume to fall back to if routing fails.
        fallback: f64,
    },
}

/// The routing policy.
///
/// | method     | routed | level     | decision                          |
/// |------------|--------|-----------|-----------------------------------|
/// | NativeOnly | any    | any       | native = clamp, neutralize if routed |
/// | GraphOnly  | yes    | any       | routed                            |
/// | GraphOnly  | no     | any       | try route, fallback clamp         |
/// | Both       | yes    | any       | routed                            |
/// | Both       | no     | > unity   | try route, fallback unity         |
/// | Both       | no     | <= unity  | native = clamp                    |
pub fn decide(setting: VolumeSetting, routed: bool) -> Decision {
    let clamped = setting.native_level();
    match (setting.method, routed) {
        (VolumeMethod::NativeOnly, _) => Decision::Native {
            volume: clamped,
            neutralize: routed,
        },
        (VolumeMethod::GraphOnly | VolumeMethod::Both, true) => Decision::Routed,
        (VolumeMethod::GraphOnly, false) => Decision::TryRoute { fallback: clamped },
        (VolumeMethod::Both, false) if setting.level > UNITY => {
            Decision::TryRoute { fallback: UNITY }
        }
        (VolumeMethod::Both, false) => Decision::Native {
            volume: clamped,
            neutralize: false,
        },
    }
}
