//! Core domain types: the field-block model a form is authored from.

pub mod blocks;
pub mod webhook;

pub use blocks::{
    BlockError, Choice, DefinitionError, FieldBlock, FieldKind, FieldRow, FieldSet,
    FormDefinition, FormNode, Scalar,
};
pub use webhook::{HttpMethod, WebhookConfig, WebhookConfigError, WebhookHeader};
