//! Stateless one-time codes for password reset.
//!
//! A reset request produces a 6 digit code and an opaque token. The token is
//! the base32 text of a JSON payload carrying the user id and a fresh random
//! secret; the code is the RFC 6238 TOTP of that secret with the code life
//! span as the time step. Nothing is stored server side: verification
//! rebuilds the code from the secret found in the token and the wall clock.

use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};

use base32::Alphabet;
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;
use totp_rs::{Algorithm, TOTP};

/// Default validity window of a code, in seconds.
pub const DEFAULT_LIFE_SPAN: u64 = 600;
/// Adjacent time steps accepted on either side of the current one.
pub const DEFAULT_SKEW_STEPS: u8 = 1;
pub const MAX_SKEW_STEPS: u8 = 10;
pub const CODE_DIGITS: usize = 6;

// 160 bits, 32 base32 characters
const SECRET_BYTES: usize = 20;
// RFC 4226 floor
const MIN_SECRET_BYTES: usize = 16;

const PADDED: Alphabet = Alphabet::RFC4648 { padding: true };
const UNPADDED: Alphabet = Alphabet::RFC4648 { padding: false };

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("code life span must be at least one second")]
    InvalidLifeSpan,

    #[error("skew of {0} steps exceeds the allowed maximum")]
    ExcessiveSkew(u8),

    #[error("secret is not valid base32 or is shorter than 128 bits")]
    InvalidSecret,

    #[error("TOTP setup failed: {0}")]
    Totp(String),

    #[error("payload cannot be serialized: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Payload carried by a password reset token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpPayload {
    pub user_id: String,
    pub secret: String,
}

#[derive(Debug, Clone, Copy)]
pub struct OtpService {
    life_span: u64,
    skew: u8,
}

impl Default for OtpService {
    fn default() -> Self {
        Self {
            life_span: DEFAULT_LIFE_SPAN,
            skew: DEFAULT_SKEW_STEPS,
        }
    }
}

impl OtpService {
    pub fn new(life_span: u64, skew: u8) -> Result<Self, OtpError> {
        if life_span == 0 {
            return Err(OtpError::InvalidLifeSpan);
        }
        if skew > MAX_SKEW_STEPS {
            return Err(OtpError::ExcessiveSkew(skew));
        }
        Ok(Self { life_span, skew })
    }

    pub fn life_span(&self) -> u64 {
        self.life_span
    }

    pub fn skew(&self) -> u8 {
        self.skew
    }

    /// Issues a `(code, token)` pair for `user_id` at the current time.
    pub fn generate_otp(&self, user_id: impl Display) -> Result<(String, String), OtpError> {
        self.generate_otp_at(user_id, unix_now())
    }

    pub fn generate_otp_at(
        &self,
        user_id: impl Display,
        time: u64,
    ) -> Result<(String, String), OtpError> {
        let payload = OtpPayload {
            user_id: user_id.to_string(),
            secret: generate_secret(),
        };

        let code = self.code_at(&payload.secret, time)?;
        let token = generate_token(&payload)?;

        Ok((code, token))
    }

    /// Derives the code of `secret` for the time step containing `time`.
    pub fn code_at(&self, secret: &str, time: u64) -> Result<String, OtpError> {
        Ok(build_totp(secret, self.life_span)?.generate(time))
    }

    /// Checks `code` against `secret` at the current time.
    pub fn verify_otp(&self, code: &str, secret: &str) -> bool {
        self.verify_otp_at(code, secret, unix_now())
    }

    pub fn verify_otp_at(&self, code: &str, secret: &str, time: u64) -> bool {
        let totp = match build_totp(secret, self.life_span) {
            Ok(totp) => totp,
            Err(e) => {
                tracing::warn!("Rejecting code for unusable secret: {}", e);
                return false;
            }
        };

        let step = time / self.life_span;
        let lower_bound = step.saturating_sub(u64::from(self.skew));
        let upper_bound = step.saturating_add(u64::from(self.skew));

        // every candidate step is compared so timing does not reveal which one matched
        let mut matched = Choice::from(0u8);
        for candidate in lower_bound..=upper_bound {
            let expected = totp.generate(candidate.saturating_mul(self.life_span));
            matched |= expected.as_bytes().ct_eq(code.as_bytes());
        }

        matched.into()
    }
}

/// Random 160 bit secret in base32.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    base32::encode(PADDED, &bytes)
}

/// Serializes `payload` to JSON and base32 encodes the bytes.
pub fn generate_token<T: Serialize + ?Sized>(payload: &T) -> Result<String, OtpError> {
    let json = serde_json::to_vec(payload)?;
    Ok(base32::encode(PADDED, &json))
}

/// Reverses [`generate_token`].
///
/// Any failure (bad alphabet or padding, a non canonical encoding, invalid
/// UTF-8, invalid JSON, or JSON not shaped like `T`) is logged and yields
/// `None`.
pub fn decode_token<T: DeserializeOwned>(token: &str) -> Option<T> {
    let bytes = match base32::decode(UNPADDED, token.trim_end_matches('=')) {
        Some(bytes) => bytes,
        None => {
            tracing::warn!("Token is not valid base32");
            return None;
        }
    };

    if base32::encode(PADDED, &bytes) != token {
        tracing::warn!("Token is not canonical base32");
        return None;
    }

    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Token payload is not UTF-8: {}", e);
            return None;
        }
    };

    match serde_json::from_str(&text) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!("Token payload rejected: {}", e);
            None
        }
    }
}

fn build_totp(secret: &str, life_span: u64) -> Result<TOTP, OtpError> {
    if life_span == 0 {
        return Err(OtpError::InvalidLifeSpan);
    }

    let key = base32::decode(UNPADDED, secret.trim_end_matches('=')).ok_or(OtpError::InvalidSecret)?;
    if key.len() < MIN_SECRET_BYTES {
        return Err(OtpError::InvalidSecret);
    }

    TOTP::new(Algorithm::SHA1, CODE_DIGITS, 0, life_span, key).map_err(|e| OtpError::Totp(e.to_string()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
