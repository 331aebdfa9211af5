//! Operational transformation over rich-text deltas.
//!
//! A [`Delta`] is an ordered sequence of insert, retain, and delete
//! operations, compatible with the Quill Delta format: a document is an
//! insert-only sequence, a change is any mix. The crate provides the
//! algebra collaborative editors need to converge replicas:
//! [`compose`](Delta::compose) folds two sequential changes into one,
//! [`transform`](Delta::transform) rebases a change against a concurrent
//! one, and [`slice`](Delta::slice), [`split`](Delta::split), and
//! [`compact`](Delta::compact) manipulate sequences while keeping them
//! canonical.
//!
//! Text is measured in extended grapheme clusters, so splits never tear
//! a user-perceived character apart. Non-text content is carried as
//! single-key embed maps and participates in the algebra through
//! registered [`EmbedHandler`]s; the built-in `"delta"` handler lets a
//! nested document compose and transform recursively.
//!
//! ```
//! use delta_ot::Delta;
//!
//! let document = Delta::new().insert("Hello", None);
//! let change = Delta::new().retain(5, None).insert(" world", None);
//!
//! let updated = document.compose(&change)?;
//! assert_eq!(updated, Delta::new().insert("Hello world", None));
//! # Ok::<(), delta_ot::DeltaError>(())
//! ```

pub mod attributes;
mod delta;
mod embed;
mod error;
pub mod grapheme;
mod operation;

pub use attributes::Attributes;
pub use delta::Delta;
pub use embed::{EmbedHandler, register_embed_handler};
pub use error::{DeltaError, Result};
pub use operation::{Action, Embed, InsertValue, Op, RetainValue, ValueKind};
