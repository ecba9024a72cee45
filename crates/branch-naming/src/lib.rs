//! Name encoding for discovered branches and repositories
//!
//! Remote names are arbitrary strings: they may contain path separators,
//! reserved characters, or non-ASCII text. Local items need a short,
//! filesystem-safe key that is stable across restarts, while the original
//! name stays available for display and reverse lookup.
//!
//! - [`NameEncoder`] derives the safe form of a single name.
//! - [`NameRegistry`] keeps the bidirectional mapping for one container and
//!   disambiguates collisions.

pub mod encoder;
pub mod error;
pub mod registry;

pub use encoder::{DEFAULT_MAX_SAFE_LENGTH, NameEncoder, encode};
pub use error::{Error, Result};
pub use registry::NameRegistry;
