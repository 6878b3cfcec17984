//! Compilers turning a [`FormDefinition`](crate::domain::FormDefinition) into
//! a runnable form: a flat namespaced schema for validation and a grouped
//! layout for presentation. Both walks share one key derivation so a layout
//! leaf always resolves to a live schema entry.

pub mod field;
pub mod key;
pub mod layout;
pub mod schema;

pub use field::CompiledField;
pub use layout::{FormLayout, LayoutNode};
pub use schema::{CompileError, FormSchema, ValidationErrors};

/// Options influencing how fields are constructed.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Pass help text through verbatim instead of HTML-escaping it.
    pub help_text_allow_html: bool,
}
