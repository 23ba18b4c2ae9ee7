//! Print request headers for exercising the service by hand.
//!
//! ```text
//! lock-header owner     # x-application-lock-owner (USER_ID, SBI, GRANT_CODE, GRANT_VERSION)
//! lock-header release   # x-application-lock-release (USER_ID)
//! lock-header auth      # Authorization (GRANTS_UI_BACKEND_AUTH_TOKEN, GRANTS_UI_BACKEND_ENCRYPTION_KEY)
//! ```
//!
//! Lock tokens are signed with `APPLICATION_LOCK_TOKEN_SECRET`. Variables may
//! come from a `.env` file.

use anyhow::{bail, Context};
use grants_backend_lib::services::auth::encrypt_service_token;
use grants_backend_lib::services::lock::token::{LOCK_OWNER_HEADER, LOCK_RELEASE_HEADER};
use grants_backend_lib::services::lock::LockTokenCodec;
use secrecy::SecretString;

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("missing environment variable {key}"))
}

fn codec() -> anyhow::Result<LockTokenCodec> {
    Ok(LockTokenCodec::new(SecretString::from(required(
        "APPLICATION_LOCK_TOKEN_SECRET",
    )?)))
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let mode = std::env::args().nth(1).unwrap_or_else(|| "owner".to_string());

    match mode.as_str() {
        "owner" => {
            let grant_version = match std::env::var("GRANT_VERSION") {
                Ok(raw) => raw.trim().parse().context("GRANT_VERSION must be an integer")?,
                Err(_) => 1,
            };
            let token = codec()?.issue_owner_token(
                &required("USER_ID")?,
                &required("SBI")?,
                &required("GRANT_CODE")?,
                grant_version,
            )?;
            println!("{LOCK_OWNER_HEADER}: {token}");
        }
        "release" => {
            let token = codec()?.issue_release_token(&required("USER_ID")?)?;
            println!("{LOCK_RELEASE_HEADER}: {token}");
        }
        "auth" => {
            let token = required("GRANTS_UI_BACKEND_AUTH_TOKEN")?;
            let passphrase = SecretString::from(required("GRANTS_UI_BACKEND_ENCRYPTION_KEY")?);
            let encoded = encrypt_service_token(&token, &passphrase).map_err(anyhow::Error::msg)?;
            println!("Authorization: Bearer {encoded}");
        }
        other => bail!("unknown mode '{other}', expected owner, release or auth"),
    }
    Ok(())
}
