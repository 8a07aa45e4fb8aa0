// ============================================================================
// Delivery Tags
// ============================================================================
//
// On a channel in confirm mode the broker numbers every publish, starting at
// 1 and incrementing by one per publish. Confirms (ack/nack) reference these
// numbers, optionally with a "multiple" flag meaning "every tag up to and
// including this one".
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier correlating one publish with its broker confirm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryTag(u64);

impl DeliveryTag {
    /// Tag of the first publish on a freshly confirm-selected channel
    pub const FIRST: DeliveryTag = DeliveryTag(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Tag the broker will assign to the publish after this one
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Whether a confirm for `confirmed` (with the given `multiple` flag)
    /// covers this tag
    pub fn is_covered_by(self, confirmed: DeliveryTag, multiple: bool) -> bool {
        if multiple {
            self <= confirmed
        } else {
            self == confirmed
        }
    }
}

impl From<u64> for DeliveryTag {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for DeliveryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
