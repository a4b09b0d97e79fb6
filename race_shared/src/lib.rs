//! `race_shared`
//!
//! Shared libraries used by both client and server.
//!
//! Design goals:
//! - Clear separation of concerns (net, math, config).
//! - Explicit, versionable serialization.
//! - No `unsafe`.

pub mod config;
pub mod math;
pub mod net;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
}
