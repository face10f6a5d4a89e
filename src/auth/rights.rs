//! Rights bitmask: each set bit is one granted capability. Purely additive.

use serde::{Deserialize, Serialize};
use std::ops::BitOr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rights(pub u32);

impl Rights {
    /// No rights required: the route is public.
    pub const NONE: Rights = Rights(0);

    /// Right number `n`, for `n` in `0..32`.
    ///
    /// Panics on a larger `n`; in a `const` that is a compile error.
    pub const fn bit(n: u32) -> Rights {
        match Rights::checked_bit(n) {
            Some(r) => r,
            None => panic!("rights bit index out of range (0..32)"),
        }
    }

    /// Like [`Rights::bit`], `None` when `n >= 32`.
    pub const fn checked_bit(n: u32) -> Option<Rights> {
        match 1u32.checked_shl(n) {
            Some(b) => Some(Rights(b)),
            None => None,
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True when every bit of `required` is granted here.
    pub const fn contains(self, required: Rights) -> bool {
        self.0 & required.0 == required.0
    }
}

impl BitOr for Rights {
    type Output = Rights;

    fn bitor(self, rhs: Rights) -> Rights {
        Rights(self.0 | rhs.0)
    }
}

impl From<u32> for Rights {
    fn from(bits: u32) -> Self {
        Rights(bits)
    }
}
