// crates/engine/src/lib.rs

//! Public facade for the Seal engine.
//! Exposes a stable API and re-exports types for consumers (hosts, FFI).
//!
//! The engine has two cooperating halves: the policy decision engine
//! (label catalogs + the `compute_actions` contract) and the protection
//! handler (block-oriented content crypto under a negotiated cipher mode).

pub mod adapters;
pub mod crypto;
pub mod domain;

use std::sync::Arc;

use domain::error::EngineResult;

/// High-level helpers for the common paths. Hosts with richer needs use the
/// engine and handler types directly.

/// Load a tenant policy engine from a serialized policy document.
pub fn load_policy_engine(
  settings: PolicyEngineSettings,
  policy_json: &[u8],
) -> EngineResult<Arc<PolicyEngine>> {
  PolicyEngine::from_policy_json(settings, policy_json)
}

/// Protect a whole in-memory buffer. Returns the ciphertext and the handler
/// (for the publishing license and further block operations).
pub fn protect_bytes(
  settings: crypto::PublishingSettings,
  config: &domain::types::ProtectionConfig,
  store: &crypto::LicenseStore,
  plaintext: &[u8],
) -> EngineResult<(Vec<u8>, crypto::ProtectionHandler)> {
  let handler = crypto::ProtectionHandler::create_publishing(settings, config, store)?;
  let ciphertext = handler.encrypt_buffer(0, plaintext, true)?;
  Ok((ciphertext, handler))
}

/// Consume a whole in-memory buffer previously produced by `protect_bytes`.
pub fn unprotect_bytes(
  settings: crypto::ConsumptionSettings,
  config: &domain::types::ProtectionConfig,
  store: &crypto::LicenseStore,
  ctx: &crypto::ConsumptionContext,
  ciphertext: &[u8],
) -> EngineResult<Vec<u8>> {
  let handler = crypto::ProtectionHandler::create_consumption(settings, config, store, ctx)?;
  handler.decrypt_buffer(0, ciphertext, true)
}

// Re-exports for convenience
pub use adapters::auth::{AuthDelegate, TokenChallenge};
pub use adapters::dispatch::{TaskDispatcher, TaskId, TokioTaskDispatcher};
pub use adapters::http::{HttpDelegate, HttpRequest, HttpResponse, RequestId, RequestTracker};
pub use adapters::logging::{LogLevel, LoggerDelegate, TracingLogger};
pub use adapters::stream::ContentStream;
pub use crypto::{
  CipherMode, ConsumptionContext, ConsumptionSettings, CustomerKeyProvider, LicenseStore,
  PreLicense, ProtectionHandler, PublishingLicense, PublishingSettings,
};
pub use domain::error::{EngineError, NetworkCategory, ServiceDisabledExtent};
pub use domain::policy::{PolicyDocument, PolicyEngine, PolicyHandler, SensitivityType};
pub use domain::types::{
  Action, ActionKinds, ActionResult, ApplicationActionState, AssignmentMethod, ContentFormat,
  ContentId, ContentLabel, DecisionPhase, DocumentState, EngineDefaults, Identity, Label,
  LabelId, LabelIntent, MetadataVersion, MetadataVersionFormat, PolicyEngineSettings,
  ProtectionConfig, ProtectionDescriptor, Right, Role, TemplateId, UserRights, UserRoles,
};
