// crates/engine/src/domain/types/config.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::action::{ContentAlignment, WatermarkLayout};
use super::document::{ContentFormat, MetadataVersionFormat};
use crate::crypto::cipher::CipherMode;
use crate::crypto::handler::CustomerKeyProvider;

/// Centralized defaults for the Seal engine.
/// All opinionated defaults should be defined here for consistency.
pub struct EngineDefaults;

impl EngineDefaults {
  // Security defaults
  pub const CIPHER_MODE: CipherMode = CipherMode::Cbc4k; // ECB requires explicit opt-in
  pub const DOUBLE_KEY_ENABLED: bool = false; // Customer-held keys are opt-in
  pub const OFFLINE_ONLY: bool = false;
  pub const AUDITED_EXTRACTION_ALLOWED: bool = false;

  // Policy defaults
  pub const METADATA_VERSION: u32 = 1;
  pub const METADATA_VERSION_FORMAT: MetadataVersionFormat = MetadataVersionFormat::Default;
  pub const SUPPORTED_FORMATS: [ContentFormat; 2] = [ContentFormat::File, ContentFormat::Email];

  // Marking defaults
  pub const FONT_NAME: &'static str = "Calibri";
  pub const FONT_SIZE: u32 = 12;
  pub const FONT_COLOR: &'static str = "#000000";
  pub const ALIGNMENT: ContentAlignment = ContentAlignment::Centered;
  pub const WATERMARK_LAYOUT: WatermarkLayout = WatermarkLayout::Diagonal;

  // Licensing defaults
  pub const LICENSE_VALIDITY_SECS: u64 = 30 * 24 * 60 * 60; // 30 days
  pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Identity of the user (or service principal) operating the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub email: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
}

impl Identity {
  pub fn new(email: impl Into<String>) -> Self {
    Self {
      email: email.into(),
      name: None,
    }
  }
}

/// Settings used to load a tenant policy engine.
#[derive(Debug, Clone)]
pub struct PolicyEngineSettings {
  /// Caller-chosen id; reused across sessions to share cached state.
  pub engine_id: String,
  pub identity: Identity,
  pub locale: String,
  /// Tenant id stamped into document metadata.
  pub tenant_id: String,
  pub custom_settings: BTreeMap<String, String>,
}

impl PolicyEngineSettings {
  pub fn new(engine_id: impl Into<String>, identity: Identity, tenant_id: impl Into<String>) -> Self {
    Self {
      engine_id: engine_id.into(),
      identity,
      locale: "en-US".to_string(),
      tenant_id: tenant_id.into(),
      custom_settings: BTreeMap::new(),
    }
  }
}

/// Settings shared by every protection handler the application creates.
#[derive(Clone, Default)]
pub struct ProtectionConfig {
  pub double_key_enabled: bool,
  pub customer_key_provider: Option<Arc<dyn CustomerKeyProvider>>,
  /// How long freshly issued licenses stay valid, unless the descriptor
  /// carries an earlier expiration.
  pub license_validity: Option<Duration>,
  pub http_timeout: Option<Duration>,
}

impl ProtectionConfig {
  /// Secure opinionated defaults.
  pub fn secure_default() -> Self {
    Self {
      double_key_enabled: EngineDefaults::DOUBLE_KEY_ENABLED,
      customer_key_provider: None,
      license_validity: Some(Duration::from_secs(EngineDefaults::LICENSE_VALIDITY_SECS)),
      http_timeout: Some(EngineDefaults::HTTP_TIMEOUT),
    }
  }

  pub fn license_validity(&self) -> Duration {
    self
      .license_validity
      .unwrap_or(Duration::from_secs(EngineDefaults::LICENSE_VALIDITY_SECS))
  }

  pub fn http_timeout(&self) -> Duration {
    self.http_timeout.unwrap_or(EngineDefaults::HTTP_TIMEOUT)
  }
}

impl std::fmt::Debug for ProtectionConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProtectionConfig")
      .field("double_key_enabled", &self.double_key_enabled)
      .field("has_customer_key_provider", &self.customer_key_provider.is_some())
      .field("license_validity", &self.license_validity)
      .field("http_timeout", &self.http_timeout)
      .finish()
  }
}
