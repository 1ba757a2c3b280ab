//! threadgrab: core library for pulling downloadable media out of rendered post pages.
//!
//! Everything in this crate is pure: the page-facing machinery (rendering,
//! polling, job lifecycle) lives in `threadgrab-runtime`.

pub mod match_spec;
pub mod matcher;
pub mod normalize;
pub mod types;

pub use match_spec::{MatchSpec, ValuePredicate};
pub use matcher::{find, locate, Located, MAX_DEPTH};
pub use normalize::normalize;
pub use types::*;
