pub mod service_auth;

pub use service_auth::{encrypt_service_token, require_service_auth, AuthFailure, ServiceAuthenticator};
