//! Single-use token generation
//!
//! Tokens are 32 bytes from the operating system CSPRNG, encoded as URL-safe
//! base64 without padding (43 characters, 256 bits of entropy).

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use super::types::UniqueToken;
use crate::error::{Result, VerifyError};

const TOKEN_BYTES: usize = 32;

/// Source of single-use tokens
pub trait TokenSource: Send + Sync {
    fn generate(&self) -> Result<UniqueToken>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngTokenSource;

impl TokenSource for OsRngTokenSource {
    fn generate(&self) -> Result<UniqueToken> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|source| VerifyError::TokenGeneration { source })?;
        Ok(UniqueToken::new(URL_SAFE_NO_PAD.encode(bytes)))
    }
}
