//! Rolling login token shared between the web front-end and the hub.
//!
//! The token is `hex(HMAC-SHA512/256(secret, stored_hash || slice))` where
//! `slice` is the current time rounded down to a multiple of the validity
//! period. Both sides derive it independently; nothing secret crosses the
//! wire except the token itself.

use hmac::{Hmac, Mac};
use sha2::Sha512_256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha512_256 = Hmac<Sha512_256>;

/// Default validity window of a token, in seconds.
pub const TOKEN_VALID_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token validity period must be non-zero")]
    ZeroPeriod,

    #[error("invalid hmac key: {0}")]
    InvalidKey(String),
}

/// Start of the time slice that contains `now_secs`.
pub fn timeslice(period_secs: u64, now_secs: u64) -> Result<u64, TokenError> {
    if period_secs == 0 {
        return Err(TokenError::ZeroPeriod);
    }
    Ok(now_secs - now_secs % period_secs)
}

fn token_for_slice(secret: &str, stored_hash: &str, slice: u64) -> Result<String, TokenError> {
    let mut mac = HmacSha512_256::new_from_slice(secret.as_bytes())
        .map_err(|e| TokenError::InvalidKey(e.to_string()))?;
    mac.update(stored_hash.as_bytes());
    mac.update(slice.to_string().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compute the token valid at `now_secs`.
pub fn make_token(
    secret: &str,
    stored_hash: &str,
    now_secs: u64,
    valid_secs: u64,
) -> Result<String, TokenError> {
    let slice = timeslice(valid_secs, now_secs)?;
    token_for_slice(secret, stored_hash, slice)
}

/// Check a client-submitted token.
///
/// Accepts the current slice and the one immediately before it, so a token
/// minted just before a slice boundary still verifies. Comparison is
/// constant time.
pub fn verify_token(
    secret: &str,
    stored_hash: &str,
    submitted: &str,
    now_secs: u64,
    valid_secs: u64,
) -> Result<bool, TokenError> {
    let current = timeslice(valid_secs, now_secs)?;
    let mut candidates = vec![current];
    if let Some(previous) = current.checked_sub(valid_secs) {
        candidates.push(previous);
    }

    let submitted = submitted.as_bytes();
    let mut matched = 0u8;
    for slice in candidates {
        let expected = token_for_slice(secret, stored_hash, slice)?;
        matched |= expected.as_bytes().ct_eq(submitted).unwrap_u8();
    }
    Ok(matched == 1)
}
