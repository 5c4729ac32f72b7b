//! Diff / Equality Engine
//!
//! Structural comparison for dynamic record-like values, independent of
//! the dependency graph. Higher layers use [`diff`] to compute minimal
//! add/change/remove deltas for reconciliation and [`is_equal`] as the
//! equality function for dynamic-value signals.
//!
//! Both operations detect self-referencing structures and raise the
//! circular-dependency error instead of recursing forever.

mod delta;
mod equal;
mod value;

pub use delta::{diff, Delta};
pub use equal::is_equal;
pub use value::Value;
