#![doc = include_str!("../README.md")]
//!
//! # How it works
//!
//! The backing vector is kept as two sorted runs: a large, settled **left
//! run** and a small, recently-touched **right run**. Every operation is a
//! composition of four pieces:
//!
//! - binary search over both runs ([`SquareMap::get`], [`SquareMap::find`]);
//! - cheap positional insertion into the right run, falling back to a full
//!   merge once the right run outgrows ~√n ([`SquareMap::insert`]);
//! - erasure by *mirroring* a key into the right run, so that a key present
//!   in both runs at once reads as deleted ([`SquareMap::remove`]);
//! - a stable binary-search merge plus duplicate-run removal that folds
//!   everything back into one run ([`SquareMap::merge`], with the
//!   underlying slice algorithms exposed in [`algorithms`]).
//!
//! Iteration ([`SquareMap::iter`]) fuses the two runs back into one
//! key-ordered sequence on the fly, skipping deleted pairs.
//!
//! The backing sequence is any [`Storage`] implementation; `Vec` by
//! default, or `smallvec::SmallVec` via [`SmallSquareMap`] when small maps
//! should live on the stack.

pub mod algorithms;
mod entry;
mod iter;
mod map;
mod storage;

#[cfg(test)]
mod proptests;

pub use entry::Entry;
pub use iter::{IntoIter, Iter, IterMut, Keys, Values, ValuesMut};
#[cfg(feature = "smallvec")]
pub use map::SmallSquareMap;
pub use map::{KeyNotFound, SquareMap};
pub use storage::Storage;
