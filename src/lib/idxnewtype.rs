// This macro generates a struct which exposes a u32 API (but which may, internally, use a smaller
// storage size).

use std::mem::size_of;

use num_traits::{self, PrimInt, Unsigned};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! IdxNewtype {
    ($(#[$attr:meta])* $n: ident) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
        #[cfg_attr(feature="serde", derive(Serialize, Deserialize))]
        pub struct $n<T>(pub T);

        impl<T: PrimInt + Unsigned> From<$n<T>> for usize {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<usize>() >= size_of::<T>());
                num_traits::cast(st.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> From<$n<T>> for u32 {
            fn from(st: $n<T>) -> Self {
                debug_assert!(size_of::<u32>() >= size_of::<T>());
                num_traits::cast(st.0).unwrap()
            }
        }

        impl<T: PrimInt + Unsigned> $n<T> {
            pub fn as_storaget(&self) -> T {
                self.0
            }
        }
    }
}

IdxNewtype!(
    /// A type specifically for grammar value indices: every distinct value in the input grammar
    /// (rule name or terminal output) is assigned one, and temporary rules synthesized during the
    /// transformation draw their left-hand-side ids from the same space.
    ///
    /// It is guaranteed that `VIdx` can be converted, without loss of precision, to `usize` with
    /// the idiom `usize::from(x_vidx)`.
    VIdx);
IdxNewtype!(
    /// A type specifically for parse forest node indices within a [`ParseForests`](
    /// crate::ParseForests) arena.
    ///
    /// It is guaranteed that `FIdx` can be converted, without loss of precision, to `usize` with
    /// the idiom `usize::from(x_fidx)`.
    FIdx);
IdxNewtype!(
    /// A type specifically for parse tree indices within a [`ParseForests`](crate::ParseForests)
    /// arena.
    ///
    /// It is guaranteed that `TrIdx` can be converted, without loss of precision, to `usize` with
    /// the idiom `usize::from(x_tridx)`.
    TrIdx);
