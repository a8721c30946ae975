//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod gitlab_platform;
mod http_response;
mod policy_file;
mod vault_token_issuer;

pub use gitlab_platform::GitLabPlatform;
pub use policy_file::{load_policy_file, parse_policy_document};
pub use vault_token_issuer::VaultTokenIssuer;
