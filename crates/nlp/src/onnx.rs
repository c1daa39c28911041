//! ONNX token-classification recognizer.
//!
//! Runs a BIO-tagged NER model (BERT style inputs `input_ids` and
//! `attention_mask`) line by line and merges tagged tokens into spans.

use blindfold_core::{EntityLabel, EntityRecognizer, EntitySpan, RecognizerError};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

use crate::error::NlpError;
use crate::threading::apply_session_threads;

const MAX_TOKENS: usize = 512;

/// NER model recognizer
pub struct OnnxRecognizer {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
}

impl OnnxRecognizer {
    /// Loads the model, its tokenizer and the label list (one tag per line).
    pub fn new(model_path: &Path, tokenizer_path: &Path, labels_path: &Path) -> Result<Self, NlpError> {
        let builder = Session::builder()
            .map_err(|e: ort::Error| NlpError::ModelLoad(e.to_string()))?;
        let builder = apply_session_threads(builder)
            .map_err(|e| NlpError::ModelLoad(e.to_string()))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| NlpError::ModelLoad(format!("{}: {}", model_path.display(), e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| NlpError::Tokenizer(e.to_string()))?;

        let labels: Vec<String> = std::fs::read_to_string(labels_path)?
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            return Err(NlpError::ModelLoad(format!(
                "no labels in {}",
                labels_path.display()
            )));
        }
        log::info!("[NLP] model loaded with {} labels", labels.len());

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
        })
    }

    fn recognize_line(&self, line: &str, base: usize) -> Result<Vec<EntitySpan>, NlpError> {
        let encoding = self
            .tokenizer
            .encode(line, true)
            .map_err(|e| NlpError::Tokenizer(e.to_string()))?;
        let n = encoding.get_ids().len().min(MAX_TOKENS);
        if n == 0 {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = encoding.get_ids()[..n].iter().map(|&v| v as i64).collect();
        let mask: Vec<i64> = encoding.get_attention_mask()[..n]
            .iter()
            .map(|&v| v as i64)
            .collect();
        let ids = Array2::from_shape_vec((1, n), ids)
            .map_err(|e| NlpError::Inference(e.to_string()))?;
        let mask = Array2::from_shape_vec((1, n), mask)
            .map_err(|e| NlpError::Inference(e.to_string()))?;
        let ids = Tensor::from_array(ids).map_err(|e| NlpError::Inference(e.to_string()))?;
        let mask = Tensor::from_array(mask).map_err(|e| NlpError::Inference(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| NlpError::Inference("session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs!["input_ids" => ids, "attention_mask" => mask])
            .map_err(|e| NlpError::Inference(e.to_string()))?;
        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| NlpError::Inference(e.to_string()))?
            .to_owned();
        drop(outputs);
        drop(session);

        let shape = logits.shape().to_vec();
        if shape.len() != 3 {
            return Err(NlpError::Inference(format!("unexpected output shape {:?}", shape)));
        }

        let tags: Vec<&str> = (0..shape[1].min(n))
            .map(|t| {
                let mut best = 0;
                let mut best_score = f32::NEG_INFINITY;
                for c in 0..shape[2] {
                    let score = logits[[0, t, c]];
                    if score > best_score {
                        best_score = score;
                        best = c;
                    }
                }
                self.labels.get(best).map(String::as_str).unwrap_or("O")
            })
            .collect();

        Ok(aggregate_bio(
            line,
            base,
            &tags,
            &encoding.get_offsets()[..n],
            encoding.get_special_tokens_mask(),
        ))
    }
}

impl EntityRecognizer for OnnxRecognizer {
    fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, RecognizerError> {
        let mut spans = Vec::new();
        let mut base = 0;
        for line in text.split('\n') {
            if !line.trim().is_empty() {
                spans.extend(self.recognize_line(line, base)?);
            }
            base += line.len() + 1;
        }
        log::debug!("[NLP] {} spans", spans.len());
        Ok(spans)
    }
}

struct OpenSpan<'t> {
    kind: &'t str,
    start: usize,
    end: usize,
}

fn label_for(kind: &str) -> EntityLabel {
    match kind {
        "PER" | "PERSON" => EntityLabel::Person,
        "ORG" | "ORGANIZATION" => EntityLabel::Organization,
        _ => EntityLabel::Other,
    }
}

/// Merges `B-X`/`I-X` tagged tokens into spans; a token that directly
/// continues an open span of the same type joins it even when tagged `B-`.
fn aggregate_bio(
    line: &str,
    base: usize,
    tags: &[&str],
    offsets: &[(usize, usize)],
    special: &[u32],
) -> Vec<EntitySpan> {
    let mut spans = Vec::new();
    let mut open: Option<OpenSpan> = None;

    let mut close = |open: Option<OpenSpan>, spans: &mut Vec<EntitySpan>| {
        if let Some(s) = open {
            if let Some(text) = line.get(s.start..s.end) {
                spans.push(EntitySpan {
                    label: label_for(s.kind),
                    text: text.to_string(),
                    start: base + s.start,
                    end: base + s.end,
                });
            }
        }
    };

    for (i, tag) in tags.iter().enumerate() {
        let (start, end) = offsets[i];
        if special.get(i) == Some(&1) || start == end {
            continue;
        }
        let (prefix, kind) = tag.split_once('-').unwrap_or((tag, ""));

        let continues = matches!(&open, Some(s) if s.kind == kind
            && (prefix == "I" || (prefix == "B" && start == s.end)));
        if continues {
            if let Some(s) = open.as_mut() {
                s.end = end;
            }
        } else if prefix == "B" || prefix == "I" {
            close(open.take(), &mut spans);
            open = Some(OpenSpan { kind, start, end });
        } else {
            close(open.take(), &mut spans);
        }
    }
    close(open.take(), &mut spans);

    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_bio() {
        let line = "John Smith at Example University";
        let tags = ["O", "B-PER", "I-PER", "O", "B-ORG", "I-ORG", "O"];
        let offsets = [(0, 0), (0, 4), (5, 10), (11, 13), (14, 21), (22, 32), (0, 0)];
        let special = [1, 0, 0, 0, 0, 0, 1];
        let spans = aggregate_bio(line, 100, &tags, &offsets, &special);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].label, EntityLabel::Person);
        assert_eq!(spans[0].text, "John Smith");
        assert_eq!(spans[0].start, 100);
        assert_eq!(spans[1].label, EntityLabel::Organization);
        assert_eq!(spans[1].text, "Example University");
    }

    #[test]
    fn test_subword_tagged_b_joins() {
        let line = "Lovelace";
        let tags = ["B-PER", "B-PER"];
        let offsets = [(0, 4), (4, 8)];
        let spans = aggregate_bio(line, 0, &tags, &offsets, &[0, 0]);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "Lovelace");
    }
}
