//! Service-to-service authentication.
//!
//! Callers send `Authorization: Bearer <base64(iv:tag:ciphertext)>`, where each
//! part is itself base64 and the ciphertext is the shared service token
//! encrypted with AES-256-GCM (16-byte IV) under
//! `scrypt(passphrase, "salt", N=16384, r=8, p=1)`.

use crate::services::app::log_codes::{log_event, LogCode};
use crate::services::config::ServiceAuthConfig;
use crate::types::errors::ApiError;
use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;

type TokenCipher = AesGcm<Aes256, U16>;

const KEY_SALT: &[u8] = b"salt";
const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Why a request failed service authentication. Never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    NotConfigured,
    MissingHeader,
    NotBearer,
    BadEncoding,
    BadFormat,
    DecryptFailed,
    TokenMismatch,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NotConfigured => "not_configured",
            Self::MissingHeader => "missing_header",
            Self::NotBearer => "not_bearer",
            Self::BadEncoding => "bad_encoding",
            Self::BadFormat => "bad_format",
            Self::DecryptFailed => "decrypt_failed",
            Self::TokenMismatch => "token_mismatch",
        };
        f.write_str(reason)
    }
}

struct Credentials {
    token: SecretString,
    cipher: TokenCipher,
}

/// Checks the service bearer credential. Without both a token and a
/// passphrase configured, every request is refused.
pub struct ServiceAuthenticator {
    credentials: Option<Credentials>,
}

impl ServiceAuthenticator {
    pub fn new(config: &ServiceAuthConfig) -> Self {
        let credentials = match (&config.token, &config.encryption_key) {
            (Some(token), Some(passphrase)) => match derive_cipher(passphrase) {
                Ok(cipher) => Some(Credentials {
                    token: token.clone(),
                    cipher,
                }),
                Err(e) => {
                    log::error!("Service auth key derivation failed: {e}");
                    None
                }
            },
            _ => {
                log::warn!("Service auth token or encryption key not configured; all requests will be rejected");
                None
            }
        };
        Self { credentials }
    }

    /// Validate an `Authorization` header value.
    pub fn authenticate(&self, header: Option<&str>) -> Result<(), AuthFailure> {
        let credentials = self.credentials.as_ref().ok_or(AuthFailure::NotConfigured)?;
        let header = header.ok_or(AuthFailure::MissingHeader)?;
        let encoded = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AuthFailure::NotBearer)?;

        let envelope = STANDARD
            .decode(encoded)
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .ok_or(AuthFailure::BadEncoding)?;

        let plaintext = decrypt_envelope(&credentials.cipher, &envelope)?;

        let matches: bool = plaintext
            .as_bytes()
            .ct_eq(credentials.token.expose_secret().as_bytes())
            .into();
        if matches {
            Ok(())
        } else {
            Err(AuthFailure::TokenMismatch)
        }
    }
}

/// Produce the `iv:tag:ciphertext` envelope for `token`, base64 encoded as a
/// whole, i.e. the value that follows `Bearer `.
pub fn encrypt_service_token(token: &str, passphrase: &SecretString) -> Result<String, String> {
    let cipher = derive_cipher(passphrase)?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);

    let mut sealed = cipher
        .encrypt(GenericArray::from_slice(&iv), token.as_bytes())
        .map_err(|_| "encryption failed".to_string())?;
    let tag = sealed.split_off(sealed.len() - TAG_LEN);

    let envelope = format!(
        "{}:{}:{}",
        STANDARD.encode(iv),
        STANDARD.encode(tag),
        STANDARD.encode(sealed)
    );
    Ok(STANDARD.encode(envelope))
}

fn derive_cipher(passphrase: &SecretString) -> Result<TokenCipher, String> {
    let params = scrypt::Params::new(14, 8, 1, 32).map_err(|e| e.to_string())?;
    let mut key = [0u8; 32];
    scrypt::scrypt(passphrase.expose_secret().as_bytes(), KEY_SALT, &params, &mut key)
        .map_err(|e| e.to_string())?;
    TokenCipher::new_from_slice(&key).map_err(|e| e.to_string())
}

fn decrypt_envelope(cipher: &TokenCipher, envelope: &str) -> Result<String, AuthFailure> {
    let mut parts = envelope.splitn(3, ':');
    let (Some(iv), Some(tag), Some(data)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthFailure::BadFormat);
    };

    let decode = |part: &str| STANDARD.decode(part).map_err(|_| AuthFailure::BadFormat);
    let iv = decode(iv)?;
    let tag = decode(tag)?;
    let mut sealed = decode(data)?;

    if iv.len() != IV_LEN || tag.len() != TAG_LEN {
        return Err(AuthFailure::BadFormat);
    }

    sealed.extend_from_slice(&tag);
    let plaintext = cipher
        .decrypt(GenericArray::from_slice(&iv), sealed.as_ref())
        .map_err(|_| AuthFailure::DecryptFailed)?;

    String::from_utf8(plaintext).map_err(|_| AuthFailure::DecryptFailed)
}

/// Axum middleware: reject requests without a valid service credential.
pub async fn require_service_auth(
    State(auth): State<Arc<ServiceAuthenticator>>,
    request: Request,
    next: Next,
) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth.authenticate(header) {
        Ok(()) => next.run(request).await,
        Err(reason) => {
            log_event(
                LogCode::ServiceAuthFailed,
                &[
                    ("reason", &reason),
                    ("method", request.method()),
                    ("path", &request.uri().path()),
                ],
            );
            ApiError::Unauthorized("Invalid authentication credentials").into_response()
        }
    }
}

#[cfg(test)]
#[path = "tests/service_auth_tests.rs"]
mod tests;
