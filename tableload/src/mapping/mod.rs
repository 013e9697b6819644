//! Declarative mapping values.
//!
//! - `spec`: loosely shaped configuration values ([`Spec`])
//! - `field`: column reads with a default, compiled into transformers
//!
//! ## Accepted mapping shapes
//!
//! ```text
//! ["name", "email"]                                   identity list
//! {"user_name": "name"}                               rename
//! {"avatar": ["image_url", <callable>]}               rename + transform
//! {"slug": <callable>}                                computed, same name
//! ```
//!
//! In JSON definitions a callable is written as a [`FieldTransform`] object,
//! `{"source": .., "default": .., "required": ..}`. Richer transforms are
//! closures built in code.

pub mod field;
pub mod spec;

pub use field::FieldTransform;
pub use spec::Spec;
