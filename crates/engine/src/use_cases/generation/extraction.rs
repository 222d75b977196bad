//! Structured extraction: model text in, validated records out.
//!
//! The model answers in JSON Lines. Every line is parsed and validated on its
//! own; a bad line is logged and skipped, never fatal to the batch. An empty
//! result is a legitimate outcome that callers must handle.

use std::sync::Arc;

use roguegen_domain::Validate;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::schema::RecordSchema;
use crate::infrastructure::fixtures::FewShotExample;
use crate::infrastructure::ports::{LlmError, LlmPort, LlmRequest};

/// Separator between prompt sections. Doubles as the model's stop marker.
const SECTION_SEPARATOR: &str = "--";

/// A line of model output that did not become a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRejection {
    /// 1-based line number within the response
    pub line_number: usize,
    pub line: String,
    pub reason: String,
}

impl std::fmt::Display for LineRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line_number, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<T> {
    /// Accepted records, in response order
    pub records: Vec<T>,
    pub rejections: Vec<LineRejection>,
}

impl<T> Extracted<T> {
    pub fn last_error(&self) -> Option<String> {
        self.rejections.last().map(ToString::to_string)
    }
}

impl<T> Default for Extracted<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejections: Vec::new(),
        }
    }
}

/// Lines that carry no record: blanks, markdown fences and echoed separators.
fn is_filler(line: &str) -> bool {
    line.is_empty() || line.starts_with("```") || line == SECTION_SEPARATOR
}

/// Parse and validate one line.
///
/// Returns `Ok(None)` for filler lines, `Err(reason)` for lines that are not
/// a valid `T`.
pub fn parse_line<T>(line: &str) -> Result<Option<T>, String>
where
    T: DeserializeOwned + Validate,
{
    let line = line.trim();
    if is_filler(line) {
        return Ok(None);
    }
    let record: T = serde_json::from_str(line).map_err(|e| e.to_string())?;
    record.validate().map_err(|e| e.to_string())?;
    Ok(Some(record))
}

/// Split `text` into lines and keep every line that is a valid `T`.
///
/// When no line qualifies, the whole response (fences removed) is tried as a
/// single object or an array of objects, for models that pretty-print.
pub fn parse_json_lines<T>(text: &str) -> Extracted<T>
where
    T: DeserializeOwned + Validate,
{
    let mut extracted = Extracted::default();

    for (index, line) in text.lines().enumerate() {
        match parse_line::<T>(line) {
            Ok(Some(record)) => extracted.records.push(record),
            Ok(None) => {}
            Err(reason) => {
                tracing::warn!(line_number = index + 1, %reason, line, "Dropping malformed line");
                extracted.rejections.push(LineRejection {
                    line_number: index + 1,
                    line: line.to_string(),
                    reason,
                });
            }
        }
    }

    if extracted.records.is_empty() {
        let records = parse_whole_response::<T>(text);
        if !records.is_empty() {
            tracing::debug!(count = records.len(), "Recovered records from whole response");
            extracted.records = records;
        }
    }

    extracted
}

pub(super) fn parse_whole_response<T>(text: &str) -> Vec<T>
where
    T: DeserializeOwned + Validate,
{
    let body: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let candidates = match serde_json::from_str::<Value>(&body) {
        Ok(Value::Array(values)) => values,
        Ok(value @ Value::Object(_)) => vec![value],
        _ => return Vec::new(),
    };

    candidates
        .into_iter()
        .filter_map(|value| serde_json::from_value::<T>(value).ok())
        .filter(|record| record.validate().is_ok())
        .collect()
}

fn with_output_count(input: &Value, count: usize) -> Value {
    let mut input = input.clone();
    if let Value::Object(map) = &mut input {
        map.insert("num_outputs".to_string(), json!(count));
    }
    input
}

/// Assemble the few-shot prompt: instructions, record schema, each example
/// as an input line followed by its output lines, then the real input.
pub fn build_extraction_prompt(
    instructions: &str,
    schema: &Value,
    examples: &[FewShotExample],
    input: &Value,
    expected_count: usize,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(instructions);
    prompt.push_str(SECTION_SEPARATOR);
    prompt.push_str("Expected JSON schema of each output line: ");
    prompt.push_str(&schema.to_string());
    prompt.push_str(SECTION_SEPARATOR);

    for example in examples {
        prompt.push_str(&with_output_count(&example.input, example.outputs.len()).to_string());
        prompt.push('\n');
        for output in &example.outputs {
            prompt.push_str(&output.to_string());
            prompt.push('\n');
        }
        prompt.push_str(SECTION_SEPARATOR);
    }

    prompt.push_str(&with_output_count(input, expected_count).to_string());
    prompt.push('\n');
    prompt
}

pub struct ExtractionRequest<'a> {
    pub instructions: &'a str,
    pub examples: &'a [FewShotExample],
    pub input: Value,
    pub expected_count: usize,
}

pub struct StructuredExtractor {
    llm: Arc<dyn LlmPort>,
    temperature: f32,
}

impl StructuredExtractor {
    pub fn new(llm: Arc<dyn LlmPort>) -> Self {
        Self {
            llm,
            temperature: 0.9,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Ask the model for `expected_count` records of type `T`.
    ///
    /// Gateway failures propagate; malformed lines do not.
    pub async fn extract<T>(&self, request: ExtractionRequest<'_>) -> Result<Extracted<T>, LlmError>
    where
        T: RecordSchema + DeserializeOwned + Validate,
    {
        let prompt = build_extraction_prompt(
            request.instructions,
            &T::json_schema(),
            request.examples,
            &request.input,
            request.expected_count,
        );
        tracing::debug!(record = T::NAME, prompt = %prompt, "Extraction prompt");

        let response = self
            .llm
            .generate(LlmRequest::prompt(prompt).with_temperature(self.temperature))
            .await?;

        let extracted = parse_json_lines::<T>(&response.content);
        tracing::info!(
            record = T::NAME,
            expected = request.expected_count,
            accepted = extracted.records.len(),
            rejected = extracted.rejections.len(),
            "Extracted records"
        );
        Ok(extracted)
    }
}
