//! Recognizer backend errors

use blindfold_core::RecognizerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NlpError {
    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("tokenizer failed: {0}")]
    Tokenizer(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<NlpError> for RecognizerError {
    fn from(err: NlpError) -> Self {
        match err {
            NlpError::ModelLoad(_) | NlpError::Unavailable(_) | NlpError::Io(_) => {
                RecognizerError::Unavailable(err.to_string())
            }
            NlpError::Tokenizer(_) | NlpError::Inference(_) => {
                RecognizerError::Failed(err.to_string())
            }
        }
    }
}
