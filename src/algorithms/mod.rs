//! In-place run algorithms backing the map's merge step.
//!
//! Both functions operate on plain slices with a caller-supplied comparator,
//! so they are usable on their own as well as through
//! [`SquareMap::merge`](crate::SquareMap::merge).

mod dedup;
mod merge;

pub use dedup::remove_duplicates;
pub use merge::binary_search_merge;
