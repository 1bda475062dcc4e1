//! TOTP enrollment and code checking, plus single-use backup codes.

use anyhow::anyhow;
use rand::{rngs::OsRng, Rng};
use sha2::{Digest, Sha256};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::AppError;

pub const ISSUER: &str = "Folio";
pub const CODE_DIGITS: usize = 6;
pub const STEP_SECS: u64 = 30;
/// Steps accepted on either side of the current one.
pub const SKEW: u8 = 1;
pub const BACKUP_CODE_COUNT: usize = 10;
const BACKUP_CODE_LEN: usize = 8;
const BACKUP_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Material handed to the user when 2FA setup starts.
#[derive(Debug, Clone)]
pub struct Enrollment {
    /// Base32, stored until verification
    pub secret: String,
    pub otpauth_url: String,
    /// `data:image/png;base64,...`
    pub qr_code: String,
}

fn build_totp(secret: Vec<u8>, account: &str) -> Result<TOTP, AppError> {
    // otpauth labels cannot contain ':'
    let account = account.replace(':', "_");
    TOTP::new(
        Algorithm::SHA1,
        CODE_DIGITS,
        SKEW,
        STEP_SECS,
        secret,
        Some(ISSUER.to_string()),
        account,
    )
    .map_err(|e| AppError::Internal(anyhow!("build totp: {e}")))
}

fn totp_from_base32(secret: &str, account: &str) -> Result<TOTP, AppError> {
    let bytes = Secret::Encoded(secret.to_string())
        .to_bytes()
        .map_err(|e| AppError::Internal(anyhow!("stored totp secret is invalid: {e:?}")))?;
    build_totp(bytes, account)
}

pub fn generate_enrollment(account: &str) -> Result<Enrollment, AppError> {
    let bytes = Secret::generate_secret()
        .to_bytes()
        .map_err(|e| AppError::Internal(anyhow!("generate totp secret: {e:?}")))?;
    let totp = build_totp(bytes, account)?;
    let png = totp
        .get_qr_base64()
        .map_err(|e| AppError::Internal(anyhow!("render qr code: {e}")))?;

    Ok(Enrollment {
        secret: totp.get_secret_base32(),
        otpauth_url: totp.get_url(),
        qr_code: format!("data:image/png;base64,{png}"),
    })
}

/// Shape check only: exactly six ASCII digits.
pub fn is_totp_code(code: &str) -> bool {
    code.len() == CODE_DIGITS && code.bytes().all(|b| b.is_ascii_digit())
}

/// Validates presence and shape of a submitted code before any secret is read.
pub fn validate_code_format(code: Option<&str>) -> Result<&str, AppError> {
    let code = code
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Token is required".to_string()))?;
    if !is_totp_code(code) {
        return Err(AppError::BadRequest("Token must be 6 digits".to_string()));
    }
    Ok(code)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Time step whose code equals `code`, searching `SKEW` steps around `now_secs`.
pub fn matching_step(
    secret: &str,
    account: &str,
    code: &str,
    now_secs: u64,
) -> Result<Option<u64>, AppError> {
    let totp = totp_from_base32(secret, account)?;
    let current = now_secs / STEP_SECS;
    let first = current.saturating_sub(SKEW as u64);
    let last = current + SKEW as u64;

    Ok((first..=last).find(|step| {
        let expected = totp.generate(step * STEP_SECS);
        constant_time_eq(expected.as_bytes(), code.as_bytes())
    }))
}

pub fn unix_now() -> u64 {
    time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
}

pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = OsRng;
    (0..BACKUP_CODE_COUNT)
        .map(|_| {
            (0..BACKUP_CODE_LEN)
                .map(|_| BACKUP_ALPHABET[rng.gen_range(0..BACKUP_ALPHABET.len())] as char)
                .collect()
        })
        .collect()
}

/// Uppercases and strips separators so "abcd-2345" matches "ABCD2345".
pub fn normalize_backup_code(code: &str) -> String {
    code.chars()
        .filter(|c| !matches!(c, '-' | ' '))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

pub fn is_backup_code(code: &str) -> bool {
    let code = normalize_backup_code(code);
    code.len() == BACKUP_CODE_LEN && code.bytes().all(|b| BACKUP_ALPHABET.contains(&b))
}

pub fn hash_backup_code(code: &str) -> String {
    hex::encode(Sha256::digest(normalize_backup_code(code).as_bytes()))
}
