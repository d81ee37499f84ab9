use core::fmt;

/// Index of a node in the network's node arena.
///
/// Plain `u32` index; nodes are never removed, so indices stay stable for
/// the lifetime of a network.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

/// Index of an element in the network's element arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElemId(u32);

macro_rules! impl_arena_id {
    ($name:ident, $label:literal) => {
        impl $name {
            /// Create an id from a 0-based arena index.
            pub fn from_index(index: usize) -> Self {
                Self(u32::try_from(index).expect("arena index fits in u32"))
            }

            /// Recover the 0-based arena index.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_arena_id!(NodeId, "NodeId");
impl_arena_id!(ElemId, "ElemId");
