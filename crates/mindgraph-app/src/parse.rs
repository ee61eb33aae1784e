use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Input is empty")]
    EmptyInput,
    #[error("Input is neither valid JSON ({json}) nor valid YAML ({yaml})")]
    Invalid { json: String, yaml: String },
    #[error("YAML value {0} has no JSON equivalent")]
    NonFinite(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInput {
    pub value: Value,
    pub format: InputFormat,
}

/// Decode source text. JSON is tried first; YAML is the fallback.
pub fn parse_input(text: &str) -> Result<ParsedInput, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let json_error = match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            return Ok(ParsedInput {
                value,
                format: InputFormat::Json,
            });
        }
        Err(err) => err,
    };

    let invalid = |yaml_error: String| ParseError::Invalid {
        json: json_error.to_string(),
        yaml: yaml_error,
    };
    let yaml = serde_yaml::from_str::<serde_yaml::Value>(text)
        .map_err(|yaml_error| invalid(yaml_error.to_string()))?;
    if let Some(number) = find_non_finite(&yaml) {
        return Err(ParseError::NonFinite(number.to_string()));
    }
    let value =
        serde_json::to_value(&yaml).map_err(|convert_error| invalid(convert_error.to_string()))?;
    tracing::debug!("Input parsed as YAML");
    Ok(ParsedInput {
        value,
        format: InputFormat::Yaml,
    })
}

/// `.inf` and `.nan` are valid YAML floats but would silently become `null` in JSON.
fn find_non_finite(value: &serde_yaml::Value) -> Option<f64> {
    match value {
        serde_yaml::Value::Number(number) => number.as_f64().filter(|f| !f.is_finite()),
        serde_yaml::Value::Sequence(items) => items.iter().find_map(find_non_finite),
        serde_yaml::Value::Mapping(fields) => fields
            .iter()
            .find_map(|(key, item)| find_non_finite(key).or_else(|| find_non_finite(item))),
        serde_yaml::Value::Tagged(tagged) => find_non_finite(&tagged.value),
        _ => None,
    }
}

/// Pretty-print the decoded input as JSON with two-space indentation.
pub fn format_input(text: &str) -> Result<String, ParseError> {
    let parsed = parse_input(text)?;
    serde_json::to_string_pretty(&parsed.value).map_err(|err| ParseError::Invalid {
        json: err.to_string(),
        yaml: String::new(),
    })
}
