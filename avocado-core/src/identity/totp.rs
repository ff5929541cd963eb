use base32::Alphabet;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use constant_time_eq::constant_time_eq;
use qrcode::{render::svg, QrCode};
use rand::Rng;
use totp_lite::{totp_custom, Sha1};

use crate::{CoreError, CoreResult};

const TOTP_DIGITS: u32 = 6;
const TOTP_STEP: u64 = 30;
const SECRET_BYTES: usize = 20;
const ALPHABET: Alphabet = Alphabet::Rfc4648 { padding: false };

/// Random 160-bit secret, base32 without padding.
pub fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..SECRET_BYTES).map(|_| rng.gen()).collect();
    base32::encode(ALPHABET, &bytes)
}

fn decode_secret(secret: &str) -> CoreResult<Vec<u8>> {
    base32::decode(ALPHABET, secret)
        .ok_or_else(|| CoreError::IdentityError("invalid two-factor secret".to_string()))
}

fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

fn code_at(secret_bytes: &[u8], time: u64) -> String {
    totp_custom::<Sha1>(TOTP_STEP, TOTP_DIGITS, secret_bytes, time)
}

pub fn generate_totp(secret: &str) -> CoreResult<String> {
    generate_totp_at(secret, unix_now())
}

pub fn generate_totp_at(secret: &str, time: u64) -> CoreResult<String> {
    Ok(code_at(&decode_secret(secret)?, time))
}

/// Accepts the code for the current step or one step either side.
pub fn verify_totp(secret: &str, code: &str) -> CoreResult<bool> {
    verify_totp_at(secret, code, unix_now())
}

pub fn verify_totp_at(secret: &str, code: &str, time: u64) -> CoreResult<bool> {
    let bytes = decode_secret(secret)?;
    let code = code.trim();
    for offset in [-1i64, 0, 1] {
        let check_time = (time as i64 + offset * TOTP_STEP as i64).max(0) as u64;
        if constant_time_eq(code_at(&bytes, check_time).as_bytes(), code.as_bytes()) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `otpauth://` URI understood by authenticator apps.
pub fn totp_uri(secret: &str, account_name: &str, issuer: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        urlencoding::encode(issuer),
        urlencoding::encode(account_name),
        secret,
        urlencoding::encode(issuer),
        TOTP_DIGITS,
        TOTP_STEP
    )
}

/// Renders `uri` as an SVG QR code wrapped in a `data:` URL.
pub fn qr_code_data_url(uri: &str) -> CoreResult<String> {
    let code = QrCode::new(uri.as_bytes())
        .map_err(|e| CoreError::InternalError(format!("QR code generation failed: {}", e)))?;
    let image = code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .build();
    Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(image)))
}
