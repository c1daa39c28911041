//! Sealed ledger transport.
//!
//! A sealed ledger is `base64(IV || AES-256-CBC-PKCS7(json))` with a random
//! 16-byte IV. There is no MAC; integrity comes from the JSON parse.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blindfold_core::RegionLedger;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

const IV_LEN: usize = 16;
const BLOCK_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("sealed ledger is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("sealed ledger too short or not block aligned ({0} bytes)")]
    Length(usize),

    #[error("decryption failed (wrong key or corrupted ledger)")]
    Decrypt,

    #[error("ledger json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no ledger key configured")]
    MissingKey,
}

/// 256-bit AES key.
#[derive(Clone)]
pub struct LedgerKey([u8; 32]);

impl LedgerKey {
    /// SHA-256 of the passphrase.
    pub fn from_passphrase(passphrase: &str) -> Result<Self, LedgerError> {
        if passphrase.is_empty() {
            return Err(LedgerError::MissingKey);
        }
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Ok(Self(key))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Short hex id of the key for logs; never the key itself.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0);
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LedgerKey({})", self.fingerprint())
    }
}

pub fn seal(ledger: &RegionLedger, key: &LedgerKey) -> Result<String, LedgerError> {
    let json = ledger.to_json()?;

    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(&key.0.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(json.as_bytes());

    let mut payload = Vec::with_capacity(IV_LEN + ciphertext.len());
    payload.extend_from_slice(&iv);
    payload.extend_from_slice(&ciphertext);

    log::info!(
        "[Ledger] sealed {} regions with key {}",
        ledger.len(),
        key.fingerprint()
    );
    Ok(STANDARD.encode(payload))
}

pub fn open(sealed: &str, key: &LedgerKey) -> Result<RegionLedger, LedgerError> {
    let payload = STANDARD.decode(sealed.trim())?;
    if payload.len() < IV_LEN + BLOCK_LEN || (payload.len() - IV_LEN) % BLOCK_LEN != 0 {
        return Err(LedgerError::Length(payload.len()));
    }

    let (iv, ciphertext) = payload.split_at(IV_LEN);
    let mut iv_block = [0u8; IV_LEN];
    iv_block.copy_from_slice(iv);

    let plaintext = Aes256CbcDec::new(&key.0.into(), &iv_block.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| LedgerError::Decrypt)?;

    let json = String::from_utf8(plaintext).map_err(|_| LedgerError::Decrypt)?;
    let ledger = RegionLedger::from_json(&json)?;
    log::info!(
        "[Ledger] opened {} regions with key {}",
        ledger.len(),
        key.fingerprint()
    );
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blindfold_core::{encipher, Category, Rect, Region};

    fn ledger() -> RegionLedger {
        let mut ledger = RegionLedger::new();
        ledger.push(Region::text(
            Category::Name,
            0,
            Rect::new(72.0, 80.0, 140.0, 92.0),
            "John Smith".into(),
            encipher("John Smith"),
        ));
        ledger.push(Region::image(3, Rect::new(100.0, 100.0, 300.0, 250.0)));
        ledger
    }

    #[test]
    fn test_seal_open() {
        let key = LedgerKey::from_passphrase("deployment secret").unwrap();
        let sealed = seal(&ledger(), &key).unwrap();
        assert!(!sealed.contains("John"));
        let opened = open(&sealed, &key).unwrap();
        assert_eq!(opened.regions(), ledger().regions());
    }

    #[test]
    fn test_random_iv() {
        let key = LedgerKey::from_bytes([7u8; 32]);
        assert_ne!(seal(&ledger(), &key).unwrap(), seal(&ledger(), &key).unwrap());
    }

    #[test]
    fn test_open_failures() {
        let key = LedgerKey::from_passphrase("a").unwrap();
        let other = LedgerKey::from_passphrase("b").unwrap();
        let sealed = seal(&ledger(), &key).unwrap();

        assert!(matches!(open("%%%", &key), Err(LedgerError::Base64(_))));
        assert!(matches!(
            open(&STANDARD.encode([0u8; 20]), &key),
            Err(LedgerError::Length(20))
        ));
        // A wrong key almost always breaks the padding; when it does not,
        // the garbage fails to parse.
        assert!(matches!(
            open(&sealed, &other),
            Err(LedgerError::Decrypt) | Err(LedgerError::Json(_))
        ));
    }

    #[test]
    fn test_empty_passphrase() {
        assert!(matches!(
            LedgerKey::from_passphrase(""),
            Err(LedgerError::MissingKey)
        ));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = LedgerKey::from_passphrase("x").unwrap();
        let b = LedgerKey::from_passphrase("x").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 8);
    }
}
