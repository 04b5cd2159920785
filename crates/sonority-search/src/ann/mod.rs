//! Approximate nearest-neighbour index over angular distance.
//!
//! A forest of random-projection trees: each internal node splits its
//! points by a hyperplane through the origin, so points with a similar
//! direction tend to share leaves. A query walks all trees best-first by
//! margin until it has gathered enough candidates, then scores them exactly.

pub mod distance;
pub mod forest;

pub use distance::angular_distance;
pub use forest::{AnnIndex, DEFAULT_LEAF_SIZE};
