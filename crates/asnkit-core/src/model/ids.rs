//! Index types for model storage.
//!
//! Arena slots and interned strings are addressed by 1-based `NonZeroU32`
//! handles, so `Option<TypeId>` costs nothing extra and recursive type
//! edges stay plain indices. Each id renders with a short prefix (`ty7`,
//! `str12`) for diagnostics and instantiation-signature keys.

use core::fmt;
use core::num::NonZeroU32;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Handle for the 0-based slot `index`; `None` once the arena
            /// outgrows `u32`.
            #[must_use]
            pub fn from_index(index: usize) -> Option<Self> {
                let raw = u32::try_from(index).ok()?.checked_add(1)?;
                NonZeroU32::new(raw).map(Self)
            }

            /// The 0-based slot this handle addresses.
            #[must_use]
            pub const fn index(self) -> usize {
                (self.0.get() - 1) as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

arena_id!(
    /// Interned string handle.
    StrId,
    "str"
);

arena_id!(
    /// Type arena handle. Recursive types hold these indices instead of
    /// owning their referents.
    TypeId,
    "ty"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_round_trip() {
        let id = TypeId::from_index(0).unwrap();
        assert_eq!(id.index(), 0);
        let id = TypeId::from_index(99).unwrap();
        assert_eq!(id.index(), 99);
    }

    #[test]
    fn test_overflow_is_none() {
        assert!(TypeId::from_index(u32::MAX as usize).is_none());
    }

    #[test]
    fn test_display_prefix() {
        let id = StrId::from_index(6).unwrap();
        assert_eq!(alloc::format!("{id}"), "str7");
    }

    #[test]
    fn test_option_size() {
        // The NonZeroU32 niche keeps Option<TypeId> pointer-free and flat.
        assert_eq!(
            core::mem::size_of::<Option<TypeId>>(),
            core::mem::size_of::<TypeId>()
        );
    }
}
