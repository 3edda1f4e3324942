// crates/engine/src/domain/types/document.rs

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::protection::ProtectionDescriptor;

/// Identifier of one piece of content across its protected lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub Uuid);

impl ContentId {
  pub fn new() -> Self {
    ContentId(Uuid::new_v4())
  }
}

impl Default for ContentId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for ContentId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Where the data currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataState {
  /// Inactive data stored physically.
  Rest,
  /// Data traversing a network or in memory to be read.
  Motion,
  /// Active data under constant change.
  Use,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentFormat {
  File,
  Email,
}

/// Controls how label stamps are serialized into document metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataVersionFormat {
  /// Stamp entries ordered by label id.
  Default,
  /// At most one stamp per tenant; entries keyed by tenant id.
  OneLabelPerTenant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataVersion {
  pub version: u32,
  pub format: MetadataVersionFormat,
}

impl Default for MetadataVersion {
  fn default() -> Self {
    Self {
      version: 1,
      format: MetadataVersionFormat::Default,
    }
  }
}

/// Lazy view over the document's existing metadata. Queried only when the
/// decision engine needs it, filtered by exact names and by prefixes.
pub trait MetadataSource: Send + Sync {
  /// Return every entry whose key is in `names` or starts with one of
  /// `name_prefixes`. Both filters empty means "everything".
  fn metadata(&self, names: &[&str], name_prefixes: &[&str]) -> BTreeMap<String, String>;
}

impl MetadataSource for BTreeMap<String, String> {
  fn metadata(&self, names: &[&str], name_prefixes: &[&str]) -> BTreeMap<String, String> {
    if names.is_empty() && name_prefixes.is_empty() {
      return self.clone();
    }
    self
      .iter()
      .filter(|(k, _)| {
        names.contains(&k.as_str()) || name_prefixes.iter().any(|p| k.starts_with(p))
      })
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect()
  }
}

/// Everything the decision engine needs to know about one document.
#[derive(Clone)]
pub struct DocumentState {
  pub content_id: ContentId,
  pub data_state: DataState,
  pub metadata: Arc<dyn MetadataSource>,
  /// The document's current protection, if any.
  pub protection: Option<ProtectionDescriptor>,
  pub content_format: ContentFormat,
  /// Free-form entries attached to audit events for this document.
  pub audit_metadata: BTreeMap<String, String>,
  pub metadata_version: MetadataVersion,
}

impl fmt::Debug for DocumentState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DocumentState")
      .field("content_id", &self.content_id)
      .field("data_state", &self.data_state)
      .field("content_format", &self.content_format)
      .field("protection", &self.protection.is_some())
      .field("metadata_version", &self.metadata_version)
      .finish()
  }
}

impl DocumentState {
  pub fn new(content_id: ContentId, content_format: ContentFormat) -> Self {
    Self {
      content_id,
      data_state: DataState::Rest,
      metadata: Arc::new(BTreeMap::new()),
      protection: None,
      content_format,
      audit_metadata: BTreeMap::new(),
      metadata_version: MetadataVersion::default(),
    }
  }

  pub fn with_metadata(mut self, metadata: impl MetadataSource + 'static) -> Self {
    self.metadata = Arc::new(metadata);
    self
  }

  pub fn with_protection(mut self, descriptor: ProtectionDescriptor) -> Self {
    self.protection = Some(descriptor);
    self
  }
}
