//! HTTP middleware.

pub mod ip_extractor;
pub mod session_auth;

pub use ip_extractor::{extract_client_ip, ClientIp};
pub use session_auth::populate_session;
