// crates/engine/src/crypto/license.rs

//! Serialized rights-grant artifacts and the local license cache.
//!
//! A publishing license travels with the protected content and names the
//! grants under which it may be consumed. A pre-license is a use license
//! issued ahead of time to one user so consumption can happen fully offline.

use std::collections::HashMap;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::cipher::{CipherMode, ContentKey, KEY_LEN};
use crate::domain::error::{EngineError, EngineResult};
use crate::domain::types::document::ContentId;
use crate::domain::types::protection::{ProtectionDescriptor, Right};

pub(crate) fn unix_now() -> i64 {
  std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.as_secs() as i64)
    .unwrap_or(0)
}

/// The rights-grant artifact published alongside protected content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingLicense {
  pub descriptor: ProtectionDescriptor,
  pub cipher_mode: CipherMode,
  /// Base64 of the raw content key. The service-side key wrapping protocol
  /// is out of scope; licenses are trusted at this boundary.
  pub content_key: String,
  pub issued_at: i64,
  pub valid_until: i64,
  pub is_audited_extraction_allowed: bool,
}

impl PublishingLicense {
  pub fn content_id(&self) -> ContentId {
    self.descriptor.content_id
  }

  pub fn serialize(&self) -> EngineResult<Vec<u8>> {
    Ok(serde_json::to_vec(self)?)
  }

  pub fn parse(bytes: &[u8]) -> EngineResult<Self> {
    let license: Self = serde_json::from_slice(bytes)
      .map_err(|e| EngineError::BadInput(format!("malformed publishing license: {e}")))?;
    Ok(license)
  }

  pub fn is_expired(&self, now: i64) -> bool {
    now >= self.valid_until
  }

  pub(crate) fn content_key(&self) -> EngineResult<ContentKey> {
    let raw = BASE64
      .decode(&self.content_key)
      .map_err(|e| EngineError::BadInput(format!("malformed content key: {e}")))?;
    let bytes: [u8; KEY_LEN] = raw
      .try_into()
      .map_err(|_| EngineError::BadInput("content key must be 32 bytes".to_string()))?;
    Ok(ContentKey::from_bytes(bytes))
  }

  pub(crate) fn encode_key(key: &ContentKey) -> String {
    BASE64.encode(key.as_bytes())
  }
}

/// A use license issued to one user, enabling offline consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreLicense {
  pub issued_to: String,
  pub rights: Vec<Right>,
  pub license: PublishingLicense,
}

impl PreLicense {
  pub fn serialize(&self) -> EngineResult<Vec<u8>> {
    Ok(serde_json::to_vec(self)?)
  }

  pub fn parse(bytes: &[u8]) -> EngineResult<Self> {
    let pre: Self = serde_json::from_slice(bytes)
      .map_err(|e| EngineError::BadInput(format!("malformed pre-license: {e}")))?;
    Ok(pre)
  }
}

/// In-memory cache of licenses this client has published or consumed.
///
/// Offline-only consumption is served exclusively from here.
#[derive(Debug, Default)]
pub struct LicenseStore {
  inner: Mutex<HashMap<ContentId, PublishingLicense>>,
}

impl LicenseStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, license: PublishingLicense) {
    if let Ok(mut map) = self.inner.lock() {
      map.insert(license.content_id(), license);
    }
  }

  pub fn is_registered(&self, content_id: ContentId) -> bool {
    self
      .inner
      .lock()
      .map(|map| map.contains_key(&content_id))
      .unwrap_or(false)
  }

  /// A cached license usable right now, if any.
  pub fn find_unexpired(&self, content_id: ContentId, now: i64) -> Option<PublishingLicense> {
    self
      .inner
      .lock()
      .ok()
      .and_then(|map| map.get(&content_id).cloned())
      .filter(|l| !l.is_expired(now))
  }

  pub fn remove(&self, content_id: ContentId) {
    if let Ok(mut map) = self.inner.lock() {
      map.remove(&content_id);
    }
  }

  pub fn purge_expired(&self, now: i64) {
    if let Ok(mut map) = self.inner.lock() {
      map.retain(|_, l| !l.is_expired(now));
    }
  }
}
