use super::id::{Id, V4};

/// Marker type for a submitted search's `requestId`.
pub struct Request;
/// Marker type for the caller's opaque session identity.
pub struct Session;

pub type RequestId = Id<Request>;
/// Session ids are caller-supplied (the authentication layer is an external
/// collaborator), so they use the `V4` variant rather than the server-minted
/// `V7` default.
pub type SessionId = Id<Session, V4>;
