//! Password-protected secret store for symmetric key material.

mod store;

pub use store::SecretStore;

/// Alias of the singular server-wide at-rest key.
pub const AT_REST_ALIAS: &str = "at-rest";

/// Alias of the JWT signing key held for the auth layer.
pub const JWT_SIGNING_ALIAS: &str = "jwt-signing";
