use blindfold_core::{Bands, Options, RecoveryChannel};
use blindfold_nlp::RecognizerConfig;
use blindfold_pdf::{RedactSettings, DEFAULT_BLUR_SIGMA, DEFAULT_TOKEN_FONT_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    // ============ Redaction ============
    /// Categories redacted by `anonymize`.
    pub options: Options,
    pub recognizer: RecognizerConfig,
    /// Size of the recovery token printed in each box.
    pub token_font_size: f32,
    pub blur_sigma: f32,
    /// Remove author-identifying document metadata.
    pub scrub_metadata: bool,
    /// Re-extract the output and fail if redacted text is still readable.
    pub verify_output: bool,

    // ============ Heuristic bands ============
    pub title_band: f32,
    pub skip_band: f32,
    pub fallback_band: f32,

    // ============ Ledger ============
    /// Passphrase the ledger key is derived from. Per deployment.
    pub ledger_passphrase: Option<String>,
    pub recovery_channel: RecoveryChannel,

    /// Resolve spans through pdfium (feature `pdfium`).
    pub pdfium_search: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let bands = Bands::default();
        Self {
            options: Options::default(),
            recognizer: RecognizerConfig::default(),
            token_font_size: DEFAULT_TOKEN_FONT_SIZE,
            blur_sigma: DEFAULT_BLUR_SIGMA,
            scrub_metadata: true,
            verify_output: true,
            title_band: bands.title,
            skip_band: bands.skip,
            fallback_band: bands.fallback,
            ledger_passphrase: None,
            recovery_channel: RecoveryChannel::default(),
            pdfium_search: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse::<T>().ok()
}

fn band(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{} is not a page fraction", value),
        })
    }
}

impl EngineConfig {
    pub fn bands(&self) -> Bands {
        Bands {
            title: self.title_band,
            skip: self.skip_band,
            fallback: self.fallback_band,
        }
    }

    pub fn redact_settings(&self) -> RedactSettings {
        RedactSettings {
            token_font_size: self.token_font_size,
            blur_sigma: self.blur_sigma,
        }
    }

    /// Applies `BLINDFOLD_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Some(size) = parse_env("BLINDFOLD_TOKEN_FONT_SIZE") {
            self.token_font_size = size;
        }
        if let Some(sigma) = parse_env("BLINDFOLD_BLUR_SIGMA") {
            self.blur_sigma = sigma;
        }
        if let Ok(passphrase) = std::env::var("BLINDFOLD_LEDGER_PASSPHRASE") {
            if !passphrase.is_empty() {
                self.ledger_passphrase = Some(passphrase);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.token_font_size.is_finite() && self.token_font_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "tokenFontSize",
                reason: format!("{} must be positive", self.token_font_size),
            });
        }
        if !(self.blur_sigma.is_finite() && self.blur_sigma > 0.0) {
            return Err(ConfigError::Invalid {
                field: "blurSigma",
                reason: format!("{} must be positive", self.blur_sigma),
            });
        }
        band("titleBand", self.title_band)?;
        band("skipBand", self.skip_band)?;
        band("fallbackBand", self.fallback_band)
    }
}

/// Reads the config at `path`; a missing file yields the defaults.
/// Environment overrides are applied either way.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig, ConfigError> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)?
    } else {
        log::info!("[Config] {} not found, using defaults", path.display());
        EngineConfig::default()
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

pub fn save_config(path: impl AsRef<Path>, config: &EngineConfig) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}
