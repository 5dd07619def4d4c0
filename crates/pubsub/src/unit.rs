//! The "no payload" marker.

use std::fmt;

/// A value carrying no information.
///
/// Notifications are keys whose payload type is `Unit`, which lets them share
/// the typed key machinery with payload-bearing packets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unit;

impl Unit {
    /// The single value of this type.
    pub const VALUE: Self = Self;
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("()")
    }
}

impl From<()> for Unit {
    fn from((): ()) -> Self {
        Self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_values_are_equal() {
        assert_eq!(Unit::VALUE, Unit::default());
        assert_eq!(Unit::from(()), Unit);
        assert_eq!(std::mem::size_of::<Unit>(), 0);
    }
}
