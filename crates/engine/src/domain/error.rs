// crates/engine/src/domain/error.rs
use thiserror::Error;

use super::types::document::ContentFormat;
use super::types::label::LabelId;
use super::types::protection::TemplateId;

/// Sub-category attached to `EngineError::Network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkCategory {
  /// Offline-only operation and no usable cached license.
  Offline,
  /// Endpoint could not be reached.
  Unreachable,
  /// No response within the configured timeout.
  Timeout,
  /// Service asked us to back off.
  Throttled,
  /// Service answered with a failure status.
  FailureResponse,
}

/// Scope at which a service has been disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceDisabledExtent {
  User,
  Device,
  Platform,
  Tenant,
}

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("unknown: {0}")]
  Unknown(String),

  #[error("bad input: {0}")]
  BadInput(String),

  #[error(transparent)]
  Io(#[from] std::io::Error),

  #[error(transparent)]
  Json(#[from] serde_json::Error),

  // Recoverable by caller-driven backoff; never retried internally.
  #[error("network error: {category:?}, http status {http_status:?}")]
  Network {
    category: NetworkCategory,
    http_status: Option<u16>,
  },

  #[error("internal: {0}")]
  Internal(String),

  #[error("downgrade justification required")]
  JustificationRequired,

  #[error("operation not supported: {0}")]
  NotSupported(String),

  #[error("privileged assignment cannot be overridden by standard method")]
  PrivilegedRequired,

  #[error("access denied: {0}")]
  AccessDenied(String),

  #[error("consent denied")]
  ConsentDenied,

  #[error("no permissions for content (owner: {owner:?})")]
  NoPermissions {
    owner: Option<String>,
    referrer: Option<String>,
  },

  #[error("auth delegate produced no token")]
  NoAuthToken,

  #[error("service disabled ({extent:?})")]
  ServiceDisabled { extent: ServiceDisabledExtent },

  #[error("proxy authentication failed")]
  ProxyAuth,

  #[error("no policy configured for tenant")]
  NoPolicy,

  #[error("operation cancelled")]
  Cancelled,

  #[error("ad-hoc protection must be set to complete the action")]
  AdhocProtectionRequired,

  #[error("deprecated api")]
  DeprecatedApi,

  #[error("template not recognized: {0}")]
  TemplateNotFound(TemplateId),

  #[error("label not recognized: {0}")]
  LabelNotFound(LabelId),

  #[error("label is disabled: {0}")]
  LabelDisabled(LabelId),

  #[error("double key protection is not enabled")]
  DoubleKeyDisabled,

  #[error("license not registered for tracking")]
  LicenseNotRegistered,

  #[error("content format not supported: {0:?}")]
  ContentFormatNotSupported(ContentFormat),

  #[error("template archived: {0}")]
  TemplateArchived(TemplateId),

  #[error("customer key unavailable: {0}")]
  CustomerKeyUnavailable(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
