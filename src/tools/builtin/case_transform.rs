//! Case transformation tool
//!
//! Parameters:
//! - `inputText` (required): text to transform
//! - `transformationType` (optional, default `uppercase`): one of
//!   `uppercase`, `lowercase`, `titlecase`, case-insensitive

use crate::error::ToolError;
use crate::tools::capability::{optional_str, required_str, Parameters, Tool};
use crate::tools::loader::ExportedType;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

pub const ID: &str = "case-transform";

const VARIANTS: [&str; 3] = ["uppercase", "lowercase", "titlecase"];

/// Supported transformations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    Uppercase,
    Lowercase,
    Titlecase,
}

impl Transformation {
    fn parse(value: &str) -> Result<Self, ToolError> {
        match value.to_lowercase().as_str() {
            "uppercase" => Ok(Transformation::Uppercase),
            "lowercase" => Ok(Transformation::Lowercase),
            "titlecase" => Ok(Transformation::Titlecase),
            _ => Err(ToolError::InvalidParameterValue {
                name: "transformationType".to_string(),
                value: value.to_string(),
                expected: VARIANTS.iter().map(|v| v.to_string()).collect(),
            }),
        }
    }

    pub fn apply(self, text: &str) -> String {
        match self {
            Transformation::Uppercase => text.to_uppercase(),
            Transformation::Lowercase => text.to_lowercase(),
            Transformation::Titlecase => title_case(text),
        }
    }
}

/// Transforms text to upper, lower or title case
#[derive(Debug, Default)]
pub struct CaseTransform;

#[async_trait]
impl Tool for CaseTransform {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Case Transform"
    }

    fn description(&self) -> &str {
        "Transforms text to different cases (uppercase, lowercase, title case)"
    }

    async fn execute(&self, parameters: &Parameters) -> Result<Value, ToolError> {
        let input = required_str(parameters, "inputText")?;

        let transformation = match optional_str(parameters, "transformationType")? {
            Some(value) => Transformation::parse(value)?,
            None => {
                debug!("transformationType missing, defaulting to uppercase");
                Transformation::Uppercase
            }
        };

        Ok(json!({ "transformedText": transformation.apply(input) }))
    }
}

/// Export list used by the static unit table
pub fn exports() -> Vec<ExportedType> {
    vec![ExportedType::capability::<CaseTransform>()]
}

/// Lowercase everything, then capitalize the first letter of each word
fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut at_word_start = true;

    for c in text.chars() {
        if c.is_alphanumeric() || c == '\'' {
            if at_word_start {
                result.extend(c.to_uppercase());
            } else {
                result.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            result.push(c);
            at_word_start = true;
        }
    }

    result
}
