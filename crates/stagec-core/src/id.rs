//! Typed identifiers for elements, blocks, fragments and shuffle ports.
//!
//! `Display` prints the type name, e.g. `PortId(0)`, so diagnostics stay
//! unambiguous when several id kinds appear in one message.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident) => {
        new_id!($name, u64);
    };
    ($name:ident, $repr:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(v: $repr) -> Self {
                Self(v)
            }
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// Flow-graph side.
new_id!(NodeId);
new_id!(BlockId);
new_id!(FragmentId);

// Shuffle side. Both travel on the wire as 4-byte ints.
new_id!(ElementId, u32);
new_id!(PortId, u32);
