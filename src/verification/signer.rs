//! RS256 service assertions
//!
//! Assertions are compact JWS strings (`header.claims.signature`, base64url
//! without padding) proving the bridge's identity to the RDS backend.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::Serialize;
use sha2::Sha256;

use super::types::{AssertionClaims, SignedAssertion};
use crate::error::{Result, VerifyError};

/// How long a freshly signed assertion stays valid
pub const ASSERTION_VALIDITY_SECS: i64 = 15;

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

const HEADER: Header = Header {
    alg: "RS256",
    typ: "JWT",
};

pub struct ServiceSigner {
    key: SigningKey<Sha256>,
    issuer: String,
}

impl ServiceSigner {
    /// Parse a PKCS#1 or PKCS#8 PEM private key
    pub fn from_pem(pem: &str, issuer: impl Into<String>) -> Result<Self> {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|pkcs1_err| {
                RsaPrivateKey::from_pkcs8_pem(pem).map_err(|pkcs8_err| VerifyError::KeyParse {
                    message: format!("not PKCS#1 ({}) nor PKCS#8 ({})", pkcs1_err, pkcs8_err),
                })
            })?;

        Ok(Self {
            key: SigningKey::<Sha256>::new(key),
            issuer: issuer.into(),
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn sign(&self, claims: &AssertionClaims) -> Result<SignedAssertion> {
        let header = encode_segment(&HEADER)?;
        let payload = encode_segment(claims)?;
        let signing_input = format!("{header}.{payload}");

        let signature = self
            .key
            .try_sign(signing_input.as_bytes())
            .map_err(|e| VerifyError::Signing {
                message: e.to_string(),
            })?;

        Ok(SignedAssertion::new(
            claims.clone(),
            format!(
                "{signing_input}.{}",
                URL_SAFE_NO_PAD.encode(signature.to_bytes())
            ),
        ))
    }

    /// Sign fresh claims expiring [`ASSERTION_VALIDITY_SECS`] from now
    pub fn sign_service_assertion(&self) -> Result<SignedAssertion> {
        self.sign(&AssertionClaims {
            expiry: chrono::Utc::now().timestamp() + ASSERTION_VALIDITY_SECS,
            issuer: self.issuer.clone(),
        })
    }
}

/// Parse `private_key_pem` and sign `claims` with it
pub fn sign(claims: &AssertionClaims, private_key_pem: &str) -> Result<SignedAssertion> {
    ServiceSigner::from_pem(private_key_pem, claims.issuer.clone())?.sign(claims)
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map(|json| URL_SAFE_NO_PAD.encode(json))
        .map_err(|e| VerifyError::Signing {
            message: e.to_string(),
        })
}
