//! Field blocks: the typed, recursively nestable definitions a form is built
//! from. A stored definition is a stream of tagged nodes, each either a leaf
//! field, a horizontal field row, or a fieldset grouping fields and rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The closed set of field kinds.
///
/// The string tag of each kind is a stable wire identifier: stored form
/// definitions reference fields by tag, so a tag must never be renamed
/// without a data migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Singleline,
    Multiline,
    Email,
    Url,
    Number,
    Date,
    Datetime,
    Dropdown,
    Radio,
    Checkbox,
    Checkboxes,
    Multiselect,
    Hidden,
    File,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Singleline => "singleline",
            Self::Multiline => "multiline",
            Self::Email => "email",
            Self::Url => "url",
            Self::Number => "number",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::Dropdown => "dropdown",
            Self::Radio => "radio",
            Self::Checkbox => "checkbox",
            Self::Checkboxes => "checkboxes",
            Self::Multiselect => "multiselect",
            Self::Hidden => "hidden",
            Self::File => "file",
        }
    }

    /// Look up a kind by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == tag)
    }

    pub fn all() -> &'static [FieldKind] {
        &[
            Self::Singleline,
            Self::Multiline,
            Self::Email,
            Self::Url,
            Self::Number,
            Self::Date,
            Self::Datetime,
            Self::Dropdown,
            Self::Radio,
            Self::Checkbox,
            Self::Checkboxes,
            Self::Multiselect,
            Self::Hidden,
            Self::File,
        ]
    }

    /// Kinds that carry an ordered choice list.
    pub fn has_choices(&self) -> bool {
        matches!(
            self,
            Self::Dropdown | Self::Radio | Self::Checkboxes | Self::Multiselect
        )
    }

    /// Kinds whose cleaned value is a list rather than a scalar.
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Self::Checkboxes | Self::Multiselect)
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| format!("Invalid field kind: {}", s))
    }
}

/// A typed scalar used for default values and placeholder hints.
///
/// Dates and datetimes travel as ISO strings and are coerced by the compiler
/// according to the owning field's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl Scalar {
    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// One entry of a choice-bearing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub value: String,
    /// Whether this choice is pre-selected when the form is first rendered.
    #[serde(default)]
    pub default_selected: bool,
}

/// A leaf field definition: a kind plus its authored attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldBlock {
    pub kind: FieldKind,
    /// Display text, and the source of the field's compiled key.
    pub label: String,
    pub help_text: String,
    pub required: bool,
    pub default_value: Option<Scalar>,
    /// Widget hint, never part of validation.
    pub placeholder: Option<Scalar>,
    pub choices: Vec<Choice>,
}

impl FieldBlock {
    pub fn new(kind: FieldKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            help_text: String::new(),
            required: true,
            default_value: None,
            placeholder: None,
            choices: Vec::new(),
        }
    }
}

/// An ordered run of leaf fields rendered as one horizontal row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub form_fields: Vec<FormNode>,
}

/// A titled grouping of fields and rows. The legend establishes the
/// namespace for the compiled keys of everything nested inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSet {
    pub legend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub form_fields: Vec<FormNode>,
}

pub const FIELDSET_TAG: &str = "fieldset";
pub const FIELDROW_TAG: &str = "fieldrow";

/// One node of a form's field tree, stored as `{"type": tag, "value": {...}}`.
///
/// Decoding is the constructor registry: a tag with no registered kind fails
/// with [`BlockError::UnknownFieldType`], which aborts the compile of the
/// whole form. This should never happen for well-formed content and exists to
/// guard against stale stored data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub enum FormNode {
    Field(FieldBlock),
    Row(FieldRow),
    Set(FieldSet),
}

#[derive(Serialize, Deserialize)]
struct RawNode {
    #[serde(rename = "type")]
    tag: String,
    value: Value,
}

/// Serde mirror of a leaf field's value object; the kind lives in the tag.
#[derive(Serialize, Deserialize)]
struct FieldBody {
    label: String,
    #[serde(default)]
    help_text: String,
    #[serde(default = "default_true")]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    placeholder: Option<Scalar>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    choices: Vec<Choice>,
}

fn default_true() -> bool {
    true
}

/// Errors decoding stored block content.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("unknown field type tag '{tag}'")]
    UnknownFieldType { tag: String },
    #[error("malformed block value: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl TryFrom<RawNode> for FormNode {
    type Error = BlockError;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        match raw.tag.as_str() {
            FIELDSET_TAG => Ok(FormNode::Set(serde_json::from_value(raw.value)?)),
            FIELDROW_TAG => Ok(FormNode::Row(serde_json::from_value(raw.value)?)),
            tag => {
                let kind = FieldKind::from_tag(tag).ok_or_else(|| BlockError::UnknownFieldType {
                    tag: tag.to_string(),
                })?;
                let body: FieldBody = serde_json::from_value(raw.value)?;
                Ok(FormNode::Field(FieldBlock {
                    kind,
                    label: body.label,
                    help_text: body.help_text,
                    required: body.required,
                    default_value: body.default_value,
                    placeholder: body.placeholder,
                    choices: body.choices,
                }))
            }
        }
    }
}

impl From<FormNode> for RawNode {
    fn from(node: FormNode) -> Self {
        match node {
            FormNode::Set(set) => RawNode {
                tag: FIELDSET_TAG.to_string(),
                value: serde_json::to_value(set).expect("fieldset serializes to JSON"),
            },
            FormNode::Row(row) => RawNode {
                tag: FIELDROW_TAG.to_string(),
                value: serde_json::to_value(row).expect("fieldrow serializes to JSON"),
            },
            FormNode::Field(field) => {
                let body = FieldBody {
                    label: field.label,
                    help_text: field.help_text,
                    required: field.required,
                    default_value: field.default_value,
                    placeholder: field.placeholder,
                    choices: field.choices,
                };
                RawNode {
                    tag: field.kind.as_str().to_string(),
                    value: serde_json::to_value(body).expect("field body serializes to JSON"),
                }
            }
        }
    }
}

/// Structural problems found when an editor saves a definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("field label must not be empty")]
    EmptyLabel,
    #[error("fieldset legend must not be empty")]
    EmptyLegend,
    #[error("'{label}': choice fields must declare at least one choice")]
    EmptyChoices { label: String },
    #[error("a fieldset cannot contain another fieldset")]
    NestedFieldset,
    #[error("a field row can only contain leaf fields")]
    RowWithGroup,
}

/// An editor-authored form: a title plus the ordered field tree.
///
/// This is the single source of truth; the schema and layout are compiled
/// from it on every use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    pub title: String,
    #[serde(default)]
    pub form_fields: Vec<FormNode>,
}

impl FormDefinition {
    pub fn new(title: impl Into<String>, form_fields: Vec<FormNode>) -> Self {
        Self {
            title: title.into(),
            form_fields,
        }
    }

    /// Structural save-time validation: nesting rules, non-empty labels and
    /// legends, choice kinds with at least one choice. Key uniqueness is
    /// checked separately by the schema compiler.
    pub fn validate(&self) -> Result<(), Vec<DefinitionError>> {
        let mut errors = Vec::new();
        for node in &self.form_fields {
            validate_node(node, 0, false, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_node(node: &FormNode, set_depth: u8, in_row: bool, errors: &mut Vec<DefinitionError>) {
    match node {
        FormNode::Field(field) => {
            if field.label.trim().is_empty() {
                errors.push(DefinitionError::EmptyLabel);
            }
            if field.kind.has_choices() && field.choices.is_empty() {
                errors.push(DefinitionError::EmptyChoices {
                    label: field.label.clone(),
                });
            }
        }
        FormNode::Row(row) => {
            if in_row {
                errors.push(DefinitionError::RowWithGroup);
            }
            for child in &row.form_fields {
                if !matches!(child, FormNode::Field(_)) {
                    errors.push(DefinitionError::RowWithGroup);
                }
                validate_node(child, set_depth, true, errors);
            }
        }
        FormNode::Set(set) => {
            if set_depth > 0 || in_row {
                errors.push(DefinitionError::NestedFieldset);
            }
            if set.legend.trim().is_empty() {
                errors.push(DefinitionError::EmptyLegend);
            }
            for child in &set.form_fields {
                validate_node(child, set_depth + 1, false, errors);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_tags_round_trip() {
        for kind in FieldKind::all() {
            assert_eq!(FieldKind::from_tag(kind.as_str()), Some(*kind));
        }
    }

    #[test]
    fn decode_tagged_field() {
        let node: FormNode = serde_json::from_value(json!({
            "type": "singleline",
            "value": {"label": "Your name", "help_text": "", "required": true}
        }))
        .unwrap();
        match node {
            FormNode::Field(field) => {
                assert_eq!(field.kind, FieldKind::Singleline);
                assert_eq!(field.label, "Your name");
                assert!(field.required);
            }
            other => panic!("expected leaf field, got {:?}", other),
        }
    }

    #[test]
    fn decode_defaults_required_to_true() {
        let node: FormNode = serde_json::from_value(json!({
            "type": "email",
            "value": {"label": "Email"}
        }))
        .unwrap();
        match node {
            FormNode::Field(field) => assert!(field.required),
            other => panic!("expected leaf field, got {:?}", other),
        }
    }

    #[test]
    fn decode_unknown_tag_fails() {
        let result: Result<FormNode, _> = serde_json::from_value(json!({
            "type": "telepathy",
            "value": {"label": "Thoughts"}
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field type tag 'telepathy'"), "{err}");
    }

    #[test]
    fn encode_decode_fieldset_round_trip() {
        let definition = FormDefinition::new(
            "Contact",
            vec![FormNode::Set(FieldSet {
                legend: "Details".to_string(),
                label: None,
                form_fields: vec![
                    FormNode::Field(FieldBlock::new(FieldKind::Singleline, "Name")),
                    FormNode::Row(FieldRow {
                        label: None,
                        form_fields: vec![FormNode::Field(FieldBlock::new(
                            FieldKind::Email,
                            "Email",
                        ))],
                    }),
                ],
            })],
        );
        let encoded = serde_json::to_value(&definition).unwrap();
        assert_eq!(encoded["form_fields"][0]["type"], "fieldset");
        let decoded: FormDefinition = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, definition);
    }

    #[test]
    fn validate_rejects_nested_fieldset() {
        let definition = FormDefinition::new(
            "Bad",
            vec![FormNode::Set(FieldSet {
                legend: "Outer".to_string(),
                label: None,
                form_fields: vec![FormNode::Set(FieldSet {
                    legend: "Inner".to_string(),
                    label: None,
                    form_fields: vec![],
                })],
            })],
        );
        let errors = definition.validate().unwrap_err();
        assert!(errors.contains(&DefinitionError::NestedFieldset));
    }

    #[test]
    fn validate_rejects_choice_field_without_choices() {
        let definition = FormDefinition::new(
            "Bad",
            vec![FormNode::Field(FieldBlock::new(
                FieldKind::Dropdown,
                "Pick one",
            ))],
        );
        let errors = definition.validate().unwrap_err();
        assert!(matches!(errors[0], DefinitionError::EmptyChoices { .. }));
    }

    #[test]
    fn validate_rejects_row_inside_row() {
        let definition = FormDefinition::new(
            "Bad",
            vec![FormNode::Row(FieldRow {
                label: None,
                form_fields: vec![FormNode::Row(FieldRow {
                    label: None,
                    form_fields: vec![],
                })],
            })],
        );
        assert!(definition.validate().is_err());
    }
}
