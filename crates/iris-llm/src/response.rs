//! Adapters from backend-native response shapes into [`Answer`].

use serde_json::Value;

use crate::error::LlmError;
use crate::provider::Answer;

const TEXT_KEYS: [&str; 5] = ["generated_text", "answer", "caption", "text", "summary_text"];

/// Extract the generated text from an inference API payload.
///
/// Accepts a bare string, an object carrying one of the known text keys, or an
/// array whose first element is either of those. An `{"error": ...}` object is
/// reported as an upstream failure.
///
/// # Errors
///
/// Returns [`LlmError::UpstreamUnavailable`] for error payloads and
/// [`LlmError::EmptyResponse`] when no text can be found.
pub fn answer_from_value(provider: &str, value: &Value) -> Result<Answer, LlmError> {
    if let Some(err) = value.get("error").and_then(Value::as_str) {
        return Err(LlmError::UpstreamUnavailable(format!("{provider}: {err}")));
    }
    extract_text(value)
        .map(Answer::new)
        .ok_or_else(|| LlmError::EmptyResponse {
            provider: provider.to_owned(),
        })
}

fn extract_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.first().and_then(extract_text),
        Value::Object(map) => TEXT_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .map(str::to_owned),
        _ => None,
    }
}

/// Collapse a feature-extraction payload into a single sentence vector.
///
/// Sentence-level models return `[f32; d]` (or `[[f32; d]]` for batched input);
/// token-level models return `[[f32; d]; n]`, which is mean-pooled.
///
/// # Errors
///
/// Returns [`LlmError::EmptyResponse`] if the payload holds no numbers.
pub fn embedding_from_value(provider: &str, value: &Value) -> Result<Vec<f32>, LlmError> {
    let empty = || LlmError::EmptyResponse {
        provider: provider.to_owned(),
    };
    if let Some(err) = value.get("error").and_then(Value::as_str) {
        return Err(LlmError::UpstreamUnavailable(format!("{provider}: {err}")));
    }
    let rows = value.as_array().ok_or_else(empty)?;
    if rows.iter().all(Value::is_number) {
        return to_vector(rows).ok_or_else(empty);
    }

    let mut rows: Vec<&Value> = rows.iter().collect();
    // [[[f32]]] from batched token-level models: take the single input's rows.
    if rows.len() == 1
        && let Some(inner) = rows[0].as_array()
        && inner.iter().all(Value::is_array)
    {
        rows = inner.iter().collect();
    }

    let vectors: Vec<Vec<f32>> = rows
        .into_iter()
        .filter_map(|r| r.as_array().and_then(|a| to_vector(a)))
        .collect();
    let first = vectors.first().ok_or_else(empty)?;
    let dims = first.len();
    if vectors.iter().any(|v| v.len() != dims) {
        return Err(LlmError::Inference(format!(
            "{provider}: ragged token embeddings"
        )));
    }
    if vectors.len() == 1 {
        return Ok(vectors.into_iter().next().unwrap_or_default());
    }

    let mut pooled = vec![0.0f32; dims];
    for v in &vectors {
        for (acc, x) in pooled.iter_mut().zip(v) {
            *acc += x;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let n = vectors.len() as f32;
    for acc in &mut pooled {
        *acc /= n;
    }
    Ok(pooled)
}

#[allow(clippy::cast_possible_truncation)]
fn to_vector(values: &[Value]) -> Option<Vec<f32>> {
    if values.is_empty() {
        return None;
    }
    values
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}
