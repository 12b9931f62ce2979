use std::{fmt, ops};

use serde::{Deserialize, Serialize};

/// Event categories a client asks the server to push.
///
/// Carried on the wire as a plain integer bitmask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventSubscription(u32);

impl EventSubscription {
    pub const NONE: Self = Self(0);
    pub const GENERAL: Self = Self(1 << 0);
    pub const CONFIG: Self = Self(1 << 1);
    pub const SCENES: Self = Self(1 << 2);
    pub const INPUTS: Self = Self(1 << 3);
    pub const TRANSITIONS: Self = Self(1 << 4);
    pub const FILTERS: Self = Self(1 << 5);
    pub const OUTPUTS: Self = Self(1 << 6);
    pub const SCENE_ITEMS: Self = Self(1 << 7);
    pub const MEDIA_INPUTS: Self = Self(1 << 8);
    pub const VENDORS: Self = Self(1 << 9);
    pub const UI: Self = Self(1 << 10);

    /// Every category that is not high-volume.
    pub const ALL: Self = Self(
        Self::GENERAL.0
            | Self::CONFIG.0
            | Self::SCENES.0
            | Self::INPUTS.0
            | Self::TRANSITIONS.0
            | Self::FILTERS.0
            | Self::OUTPUTS.0
            | Self::SCENE_ITEMS.0
            | Self::MEDIA_INPUTS.0
            | Self::VENDORS.0
            | Self::UI.0,
    );

    // High-volume events are never part of `ALL` and must be requested explicitly.
    pub const INPUT_VOLUME_METERS: Self = Self(1 << 16);
    pub const INPUT_ACTIVE_STATE_CHANGED: Self = Self(1 << 17);
    pub const INPUT_SHOW_STATE_CHANGED: Self = Self(1 << 18);
    pub const SCENE_ITEM_TRANSFORM_CHANGED: Self = Self(1 << 19);

    pub const HIGH_VOLUME: Self = Self(
        Self::INPUT_VOLUME_METERS.0
            | Self::INPUT_ACTIVE_STATE_CHANGED.0
            | Self::INPUT_SHOW_STATE_CHANGED.0
            | Self::SCENE_ITEM_TRANSFORM_CHANGED.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl ops::BitOr for EventSubscription {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl ops::BitOrAssign for EventSubscription {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventSubscription({:#x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::EventSubscription;

    #[test]
    fn all_covers_the_eleven_standard_categories() {
        assert_eq!(EventSubscription::ALL.bits(), 0x7ff);
        assert!(EventSubscription::ALL.contains(EventSubscription::UI));
    }

    #[test]
    fn high_volume_is_opt_in() {
        assert!(!EventSubscription::ALL.intersects(EventSubscription::HIGH_VOLUME));
        let mask = EventSubscription::ALL | EventSubscription::INPUT_VOLUME_METERS;
        assert!(mask.contains(EventSubscription::INPUT_VOLUME_METERS));
        assert!(!mask.contains(EventSubscription::SCENE_ITEM_TRANSFORM_CHANGED));
    }

    #[test]
    fn round_trips_as_integer() {
        let mask = EventSubscription::SCENES | EventSubscription::INPUTS;
        assert_eq!(serde_json::to_string(&mask).expect("serialize"), "12");
        let parsed: EventSubscription = serde_json::from_str("12").expect("deserialize");
        assert_eq!(parsed, mask);
        assert_eq!(EventSubscription::from_bits(12), mask);
    }
}
