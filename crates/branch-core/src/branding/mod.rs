//! Branding: provenance decorations attached to items
//!
//! Providers describe the objects they expose (links, descriptions, display
//! names, icons). Each indexing pass recomputes an item's decorations from
//! the provider's current answer: present values replace the old ones
//! wholesale, absent values remove them.

mod decoration;
mod metadata;
mod propagator;

pub use decoration::{Decoration, DecorationKind, Decorations, Icon, Link, ObjectMetadata};
pub use metadata::{DecorationFailure, Metadata};
pub use propagator::{DecorationReport, apply_decorations, merge_decorations, scope};
