//! The form schema compiler: a depth-first walk of the field tree producing
//! an ordered mapping from compiled key to runtime field.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::compiler::field::CompiledField;
use crate::compiler::key::{field_key, slugify};
use crate::compiler::CompileOptions;
use crate::domain::{FormDefinition, FormNode};

/// Compile-time schema problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("duplicate compiled field key '{key}'")]
    DuplicateKey { key: String },
    #[error("label '{label}' slugifies to an empty field key")]
    EmptyKey { label: String },
    #[error("legend '{legend}' slugifies to an empty namespace")]
    EmptyNamespace { legend: String },
}

/// Per-field validation messages for one submission attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, key: String, message: String) {
        self.0.entry(key).or_default().push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "validation failed for: {}", keys.join(", "))
    }
}

/// The authoritative runtime schema: compiled fields in document order
/// (depth-first, namespace-qualified), indexed by key.
#[derive(Debug, Clone)]
pub struct FormSchema {
    fields: Vec<CompiledField>,
    index: HashMap<String, usize>,
}

impl FormSchema {
    /// Walk the definition and construct every runtime field. Deterministic:
    /// the same definition always yields the same key order and rules.
    /// A colliding key overwrites the earlier field while keeping its
    /// position; [`FormSchema::verify_unique_keys`] is the save-time guard.
    pub fn compile(definition: &FormDefinition, options: &CompileOptions) -> Self {
        let mut schema = Self {
            fields: Vec::new(),
            index: HashMap::new(),
        };
        for node in &definition.form_fields {
            schema.push_node(node, "", options);
        }
        schema
    }

    fn push_node(&mut self, node: &FormNode, namespace: &str, options: &CompileOptions) {
        match node {
            FormNode::Field(block) => {
                let key = field_key(namespace, &block.label);
                self.insert(CompiledField::build(key, block, options));
            }
            FormNode::Row(row) => {
                // Rows group presentation only; the namespace passes through.
                for child in &row.form_fields {
                    self.push_node(child, namespace, options);
                }
            }
            FormNode::Set(set) => {
                let namespace = slugify(&set.legend);
                for child in &set.form_fields {
                    self.push_node(child, &namespace, options);
                }
            }
        }
    }

    fn insert(&mut self, field: CompiledField) {
        match self.index.get(&field.key) {
            Some(&position) => self.fields[position] = field,
            None => {
                self.index.insert(field.key.clone(), self.fields.len());
                self.fields.push(field);
            }
        }
    }

    /// Reject a definition whose tree compiles two fields to the same key,
    /// instead of letting the later one silently shadow the earlier. Also
    /// rejects labels and legends whose slug is empty, which would otherwise
    /// compile to an unaddressable key or a silently dropped namespace.
    pub fn verify_unique_keys(definition: &FormDefinition) -> Result<(), CompileError> {
        fn walk(
            node: &FormNode,
            namespace: &str,
            seen: &mut std::collections::HashSet<String>,
        ) -> Result<(), CompileError> {
            match node {
                FormNode::Field(block) => {
                    if slugify(&block.label).is_empty() {
                        return Err(CompileError::EmptyKey {
                            label: block.label.clone(),
                        });
                    }
                    let key = field_key(namespace, &block.label);
                    if !seen.insert(key.clone()) {
                        return Err(CompileError::DuplicateKey { key });
                    }
                    Ok(())
                }
                FormNode::Row(row) => {
                    for child in &row.form_fields {
                        walk(child, namespace, seen)?;
                    }
                    Ok(())
                }
                FormNode::Set(set) => {
                    let namespace = slugify(&set.legend);
                    if namespace.is_empty() {
                        return Err(CompileError::EmptyNamespace {
                            legend: set.legend.clone(),
                        });
                    }
                    for child in &set.form_fields {
                        walk(child, &namespace, seen)?;
                    }
                    Ok(())
                }
            }
        }
        let mut seen = std::collections::HashSet::new();
        for node in &definition.form_fields {
            walk(node, "", &mut seen)?;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&CompiledField> {
        self.index.get(key).map(|&i| &self.fields[i])
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a full submission: every field cleans its value, and either
    /// the cleaned map or the collected per-field errors come back.
    pub fn validate(&self, data: &Map<String, Value>) -> Result<Map<String, Value>, ValidationErrors> {
        let mut cleaned = Map::new();
        let mut errors = ValidationErrors::default();
        for field in &self.fields {
            match field.clean(data.get(&field.key)) {
                Ok(Some(value)) => {
                    cleaned.insert(field.key.clone(), value);
                }
                Ok(None) => {}
                Err(message) => errors.add(field.key.clone(), message),
            }
        }
        if errors.is_empty() {
            Ok(cleaned)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Choice, FieldBlock, FieldKind, FieldRow, FieldSet};
    use serde_json::json;

    fn contact_definition() -> FormDefinition {
        FormDefinition::new(
            "Contact",
            vec![
                FormNode::Field(FieldBlock::new(FieldKind::Singleline, "Name")),
                FormNode::Set(FieldSet {
                    legend: "Contact Details".to_string(),
                    label: None,
                    form_fields: vec![
                        FormNode::Field(FieldBlock::new(FieldKind::Email, "Email")),
                        FormNode::Row(FieldRow {
                            label: None,
                            form_fields: vec![
                                FormNode::Field(FieldBlock::new(FieldKind::Singleline, "City")),
                                FormNode::Field(FieldBlock::new(FieldKind::Singleline, "Zip")),
                            ],
                        }),
                    ],
                }),
                FormNode::Row(FieldRow {
                    label: None,
                    form_fields: vec![FormNode::Field(FieldBlock::new(
                        FieldKind::Checkbox,
                        "Subscribe",
                    ))],
                }),
            ],
        )
    }

    #[test]
    fn keys_follow_document_order_with_namespaces() {
        let schema = FormSchema::compile(&contact_definition(), &CompileOptions::default());
        let keys: Vec<&str> = schema.keys().collect();
        assert_eq!(
            keys,
            vec![
                "name",
                "contact-details.email",
                "contact-details.city",
                "contact-details.zip",
                "subscribe",
            ]
        );
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let definition = contact_definition();
        let options = CompileOptions::default();
        let first = FormSchema::compile(&definition, &options);
        let second = FormSchema::compile(&definition, &options);
        assert_eq!(first.fields(), second.fields());
    }

    #[test]
    fn later_field_with_colliding_key_overwrites_earlier() {
        let definition = FormDefinition::new(
            "Collide",
            vec![
                FormNode::Field(FieldBlock::new(FieldKind::Singleline, "Name")),
                FormNode::Field(FieldBlock::new(FieldKind::Email, "Name")),
            ],
        );
        let schema = FormSchema::compile(&definition, &CompileOptions::default());
        assert_eq!(schema.len(), 1);
        assert_eq!(schema.get("name").unwrap().kind, FieldKind::Email);
    }

    #[test]
    fn verify_unique_keys_rejects_collisions() {
        let definition = FormDefinition::new(
            "Collide",
            vec![
                FormNode::Field(FieldBlock::new(FieldKind::Singleline, "Name")),
                FormNode::Field(FieldBlock::new(FieldKind::Email, "Name")),
            ],
        );
        assert_eq!(
            FormSchema::verify_unique_keys(&definition),
            Err(CompileError::DuplicateKey {
                key: "name".to_string()
            })
        );
        assert!(FormSchema::verify_unique_keys(&contact_definition()).is_ok());
    }

    #[test]
    fn verify_unique_keys_rejects_empty_slugs() {
        let definition = FormDefinition::new(
            "Bad",
            vec![FormNode::Field(FieldBlock::new(FieldKind::Singleline, "!!!"))],
        );
        assert_eq!(
            FormSchema::verify_unique_keys(&definition),
            Err(CompileError::EmptyKey {
                label: "!!!".to_string()
            })
        );

        let definition = FormDefinition::new(
            "Bad",
            vec![FormNode::Set(FieldSet {
                legend: "???".to_string(),
                label: None,
                form_fields: vec![FormNode::Field(FieldBlock::new(
                    FieldKind::Singleline,
                    "Name",
                ))],
            })],
        );
        assert_eq!(
            FormSchema::verify_unique_keys(&definition),
            Err(CompileError::EmptyNamespace {
                legend: "???".to_string()
            })
        );
    }

    #[test]
    fn validate_returns_cleaned_data() {
        let definition = FormDefinition::new(
            "Simple",
            vec![
                FormNode::Field(FieldBlock::new(FieldKind::Singleline, "Name")),
                FormNode::Field(FieldBlock::new(FieldKind::Email, "Email")),
            ],
        );
        let schema = FormSchema::compile(&definition, &CompileOptions::default());
        let data = json!({"name": "Ann", "email": "ann@example.com"});
        let cleaned = schema.validate(data.as_object().unwrap()).unwrap();
        assert_eq!(
            Value::Object(cleaned),
            json!({"name": "Ann", "email": "ann@example.com"})
        );
    }

    #[test]
    fn validate_collects_errors_per_field() {
        let definition = FormDefinition::new(
            "Simple",
            vec![
                FormNode::Field(FieldBlock::new(FieldKind::Singleline, "Name")),
                FormNode::Field(FieldBlock::new(FieldKind::Email, "Email")),
            ],
        );
        let schema = FormSchema::compile(&definition, &CompileOptions::default());
        let data = json!({"email": "not-an-email"});
        let errors = schema.validate(data.as_object().unwrap()).unwrap_err();
        assert_eq!(errors.get("name").unwrap(), ["This field is required."]);
        assert_eq!(errors.get("email").unwrap(), ["Enter a valid email address."]);
    }

    #[test]
    fn choice_initials_compile_per_kind() {
        let choices = vec![
            Choice {
                value: "a".to_string(),
                default_selected: true,
            },
            Choice {
                value: "b".to_string(),
                default_selected: false,
            },
        ];
        let mut dropdown = FieldBlock::new(FieldKind::Dropdown, "Single");
        dropdown.choices = choices.clone();
        let mut multi = FieldBlock::new(FieldKind::Multiselect, "Multi");
        multi.choices = choices;
        let definition = FormDefinition::new(
            "Choices",
            vec![FormNode::Field(dropdown), FormNode::Field(multi)],
        );
        let schema = FormSchema::compile(&definition, &CompileOptions::default());
        assert_eq!(schema.get("single").unwrap().initial, Some(json!("a")));
        assert_eq!(schema.get("multi").unwrap().initial, Some(json!(["a"])));
    }
}
