// crates/engine/src/adapters/auth.rs

use crate::domain::types::config::Identity;

/// OAuth2 challenge the application must answer with a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenChallenge {
  pub authority: String,
  pub resource: String,
  pub scope: String,
}

/// Application-supplied token acquisition.
///
/// Returning `None` surfaces as `EngineError::NoAuthToken` on the calling
/// operation.
pub trait AuthDelegate: Send + Sync {
  fn acquire_token(&self, identity: &Identity, challenge: &TokenChallenge) -> Option<String>;
}
