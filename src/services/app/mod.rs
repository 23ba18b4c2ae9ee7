pub mod log_codes;
pub mod logging;
