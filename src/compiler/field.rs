//! Per-kind construction and cleaning of runtime form fields.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use validator::{ValidateEmail, ValidateUrl};

use crate::compiler::CompileOptions;
use crate::domain::{FieldBlock, FieldKind, Scalar};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A runtime form field: the compiled key, the validation rules derived from
/// the authored block, and the widget hints a renderer needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledField {
    pub key: String,
    pub kind: FieldKind,
    pub label: String,
    /// HTML-escaped unless the compile options allow raw HTML.
    pub help_text: String,
    pub required: bool,
    /// Pre-filled value: a scalar for single-value kinds, a list of the
    /// default-selected choices for multi-valued kinds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<Value>,
    /// Widget hint, kept separate from validation options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// `(value, value)` pairs for choice-bearing kinds.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<(String, String)>,
}

impl CompiledField {
    /// Construct the runtime field for an authored block at a compiled key.
    pub fn build(key: String, block: &FieldBlock, options: &CompileOptions) -> Self {
        let help_text = if options.help_text_allow_html {
            block.help_text.clone()
        } else {
            tera::escape_html(&block.help_text)
        };
        Self {
            key,
            kind: block.kind,
            label: block.label.clone(),
            help_text,
            required: block.required,
            initial: initial_for(block),
            placeholder: block.placeholder.as_ref().map(Scalar::as_text),
            choices: block
                .choices
                .iter()
                .map(|c| (c.value.clone(), c.value.clone()))
                .collect(),
        }
    }

    /// Coerce and validate one submitted value. `Ok(None)` means the optional
    /// field was left blank; errors are end-user messages.
    pub fn clean(&self, submitted: Option<&Value>) -> Result<Option<Value>, String> {
        let value = match submitted {
            Some(v) if !v.is_null() => v,
            _ => return self.missing(),
        };
        match self.kind {
            FieldKind::Singleline | FieldKind::Multiline | FieldKind::Hidden | FieldKind::File => {
                self.clean_text(value)
            }
            FieldKind::Email => {
                let text = match self.clean_text(value)? {
                    Some(Value::String(s)) => s,
                    other => return Ok(other),
                };
                if !text.validate_email() {
                    return Err("Enter a valid email address.".to_string());
                }
                Ok(Some(Value::String(text)))
            }
            FieldKind::Url => {
                let text = match self.clean_text(value)? {
                    Some(Value::String(s)) => s,
                    other => return Ok(other),
                };
                if !text.validate_url() {
                    return Err("Enter a valid URL.".to_string());
                }
                Ok(Some(Value::String(text)))
            }
            FieldKind::Number => self.clean_number(value),
            FieldKind::Date => self.clean_date(value),
            FieldKind::Datetime => self.clean_datetime(value),
            FieldKind::Checkbox => self.clean_checkbox(value),
            FieldKind::Dropdown | FieldKind::Radio => self.clean_choice(value),
            FieldKind::Checkboxes | FieldKind::Multiselect => self.clean_multi_choice(value),
        }
    }

    fn missing(&self) -> Result<Option<Value>, String> {
        if self.required {
            Err("This field is required.".to_string())
        } else {
            Ok(None)
        }
    }

    fn clean_text(&self, value: &Value) -> Result<Option<Value>, String> {
        let text = coerce_text(value)?;
        let text = text.trim();
        if text.is_empty() {
            self.missing()
        } else {
            Ok(Some(Value::String(text.to_string())))
        }
    }

    fn clean_number(&self, value: &Value) -> Result<Option<Value>, String> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .map(|i| Some(Value::from(i)))
                .ok_or_else(|| "Enter a whole number.".to_string()),
            Value::String(s) if s.trim().is_empty() => self.missing(),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(|i| Some(Value::from(i)))
                .map_err(|_| "Enter a whole number.".to_string()),
            _ => Err("Enter a whole number.".to_string()),
        }
    }

    fn clean_date(&self, value: &Value) -> Result<Option<Value>, String> {
        let text = coerce_text(value)?;
        let text = text.trim();
        if text.is_empty() {
            return self.missing();
        }
        let date = NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map_err(|_| "Enter a valid date.".to_string())?;
        Ok(Some(Value::String(date.format(DATE_FORMAT).to_string())))
    }

    fn clean_datetime(&self, value: &Value) -> Result<Option<Value>, String> {
        let text = coerce_text(value)?;
        let text = text.trim();
        if text.is_empty() {
            return self.missing();
        }
        let parsed = DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
            .ok_or_else(|| "Enter a valid date and time.".to_string())?;
        Ok(Some(Value::String(
            parsed.format("%Y-%m-%dT%H:%M:%S").to_string(),
        )))
    }

    fn clean_checkbox(&self, value: &Value) -> Result<Option<Value>, String> {
        let checked = match value {
            Value::Bool(b) => *b,
            Value::String(s) => matches!(s.as_str(), "true" | "on" | "1"),
            _ => return Err("Enter a valid value.".to_string()),
        };
        if self.required && !checked {
            return Err("This field is required.".to_string());
        }
        Ok(Some(Value::Bool(checked)))
    }

    fn clean_choice(&self, value: &Value) -> Result<Option<Value>, String> {
        let text = coerce_text(value)?;
        if text.is_empty() {
            return self.missing();
        }
        if !self.in_choice_domain(&text) {
            return Err(format!(
                "Select a valid choice. '{}' is not one of the available choices.",
                text
            ));
        }
        Ok(Some(Value::String(text)))
    }

    fn clean_multi_choice(&self, value: &Value) -> Result<Option<Value>, String> {
        // HTML forms post a lone value for a single selection.
        let selected: Vec<String> = match value {
            Value::Array(items) => items
                .iter()
                .map(coerce_text)
                .collect::<Result<Vec<_>, _>>()?,
            Value::String(s) if s.is_empty() => Vec::new(),
            Value::String(s) => vec![s.clone()],
            _ => return Err("Enter a list of values.".to_string()),
        };
        if selected.is_empty() {
            return self.missing();
        }
        for choice in &selected {
            if !self.in_choice_domain(choice) {
                return Err(format!(
                    "Select a valid choice. '{}' is not one of the available choices.",
                    choice
                ));
            }
        }
        Ok(Some(Value::Array(
            selected.into_iter().map(Value::String).collect(),
        )))
    }

    fn in_choice_domain(&self, value: &str) -> bool {
        self.choices.iter().any(|(v, _)| v == value)
    }
}

fn coerce_text(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err("Enter a valid value.".to_string()),
    }
}

fn initial_for(block: &FieldBlock) -> Option<Value> {
    if block.kind.has_choices() {
        let selected: Vec<&str> = block
            .choices
            .iter()
            .filter(|c| c.default_selected)
            .map(|c| c.value.as_str())
            .collect();
        if block.kind.is_multi_valued() {
            if selected.is_empty() {
                None
            } else {
                Some(Value::Array(
                    selected.into_iter().map(Value::from).collect(),
                ))
            }
        } else {
            // Single-select kinds take exactly the first default-selected choice.
            selected.first().map(|v| Value::String(v.to_string()))
        }
    } else {
        block.default_value.as_ref().map(|scalar| match scalar {
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Integer(i) => Value::from(*i),
            Scalar::Text(s) => Value::String(s.clone()),
        })
    }
}
