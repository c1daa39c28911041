//! Named-entity recognizers for paper front matter.
//!
//! Two backends implement [`EntityRecognizer`]:
//! - [`PatternRecognizer`]: capitalization and keyword heuristics, always available.
//! - `OnnxRecognizer`: a token-classification model (feature `onnx`).

mod error;
mod patterns;

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
mod threading;

pub use error::NlpError;
pub use patterns::PatternRecognizer;

#[cfg(feature = "onnx")]
pub use onnx::OnnxRecognizer;

use blindfold_core::EntityRecognizer;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Recognizer selection, as stored in the engine config.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecognizerConfig {
    #[default]
    Patterns,
    #[serde(rename_all = "camelCase")]
    Onnx {
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        labels_path: PathBuf,
    },
}

/// Builds the configured recognizer.
pub fn build_recognizer(config: &RecognizerConfig) -> Result<Box<dyn EntityRecognizer>, NlpError> {
    match config {
        RecognizerConfig::Patterns => {
            log::info!("[NLP] using pattern recognizer");
            Ok(Box::new(PatternRecognizer::new()))
        }
        #[cfg(feature = "onnx")]
        RecognizerConfig::Onnx {
            model_path,
            tokenizer_path,
            labels_path,
        } => {
            log::info!("[NLP] loading model {}", model_path.display());
            Ok(Box::new(OnnxRecognizer::new(
                model_path,
                tokenizer_path,
                labels_path,
            )?))
        }
        #[cfg(not(feature = "onnx"))]
        RecognizerConfig::Onnx { model_path, .. } => Err(NlpError::Unavailable(format!(
            "built without the onnx feature, cannot load {}",
            model_path.display()
        ))),
    }
}
