// crates/engine/src/domain/policy/engine.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use super::super::error::{EngineError, EngineResult};
use super::super::types::config::PolicyEngineSettings;
use super::super::types::document::ContentFormat;
use super::super::types::label::{Label, LabelId};
use super::handler::PolicyHandler;
use crate::adapters::dispatch::TaskDispatcher;

/// A classifier rule package entry from the tenant policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityType {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub rule_package: String,
}

/// Tenant policy metadata carried alongside the catalogs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyMetadata {
  pub policy_file_id: String,
  #[serde(default)]
  pub sensitivity_file_id: String,
  /// Seconds since the unix epoch of the last successful policy fetch.
  #[serde(default)]
  pub last_fetch_time: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub more_info_url: Option<Url>,
  #[serde(default)]
  pub is_labeling_required: bool,
  #[serde(default)]
  pub is_downgrade_justification_required: bool,
  #[serde(default = "default_formats")]
  pub supported_formats: Vec<ContentFormat>,
}

fn default_formats() -> Vec<ContentFormat> {
  vec![ContentFormat::File, ContentFormat::Email]
}

/// Wire shape of a tenant policy document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
  pub metadata: PolicyMetadata,
  #[serde(default)]
  pub labels: Vec<Label>,
  #[serde(default)]
  pub sensitivity_types: Vec<SensitivityType>,
}

/// Tenant-scoped holder of the label and sensitivity-type catalogs.
///
/// Immutable once loaded; share it behind an `Arc` and read concurrently.
#[derive(Debug)]
pub struct PolicyEngine {
  settings: PolicyEngineSettings,
  metadata: PolicyMetadata,
  labels: BTreeMap<LabelId, Label>,
  roots: Vec<LabelId>,
  sensitivity_types: Vec<SensitivityType>,
}

impl PolicyEngine {
  /// Load an engine from a serialized policy document.
  pub fn from_policy_json(settings: PolicyEngineSettings, bytes: &[u8]) -> EngineResult<Arc<Self>> {
    let doc: PolicyDocument = serde_json::from_slice(bytes)?;
    Self::from_document(settings, doc)
  }

  pub fn from_document(settings: PolicyEngineSettings, doc: PolicyDocument) -> EngineResult<Arc<Self>> {
    if doc.labels.is_empty() {
      return Err(EngineError::NoPolicy);
    }

    let mut labels = BTreeMap::new();
    for label in &doc.labels {
      if labels.insert(label.id, label.clone()).is_some() {
        return Err(EngineError::BadInput(format!(
          "duplicate label id in policy: {}",
          label.id
        )));
      }
    }

    // Parents must resolve, and child lists are rebuilt from parent links so
    // the two can never disagree.
    for label in doc.labels.iter() {
      if let Some(parent) = label.parent {
        if !labels.contains_key(&parent) {
          return Err(EngineError::BadInput(format!(
            "label {} references unknown parent {parent}",
            label.id
          )));
        }
      }
    }
    let mut roots = Vec::new();
    for label in &doc.labels {
      match label.parent {
        Some(parent) => {
          if let Some(entry) = labels.get_mut(&parent) {
            if !entry.children.contains(&label.id) {
              entry.children.push(label.id);
            }
          }
        }
        None => roots.push(label.id),
      }
    }

    tracing::debug!(
      engine_id = %settings.engine_id,
      labels = labels.len(),
      sensitivity_types = doc.sensitivity_types.len(),
      "policy engine loaded"
    );

    Ok(Arc::new(Self {
      settings,
      metadata: doc.metadata,
      labels,
      roots,
      sensitivity_types: doc.sensitivity_types,
    }))
  }

  pub fn settings(&self) -> &PolicyEngineSettings {
    &self.settings
  }

  pub fn engine_id(&self) -> &str {
    &self.settings.engine_id
  }

  pub fn tenant_id(&self) -> &str {
    &self.settings.tenant_id
  }

  pub fn policy_file_id(&self) -> &str {
    &self.metadata.policy_file_id
  }

  pub fn sensitivity_file_id(&self) -> &str {
    &self.metadata.sensitivity_file_id
  }

  pub fn last_policy_fetch_time(&self) -> i64 {
    self.metadata.last_fetch_time
  }

  pub fn more_info_url(&self) -> Option<&Url> {
    self.metadata.more_info_url.as_ref()
  }

  pub fn is_labeling_required(&self) -> bool {
    self.metadata.is_labeling_required
  }

  pub fn is_downgrade_justification_required(&self) -> bool {
    self.metadata.is_downgrade_justification_required
  }

  pub fn has_classification_rules(&self) -> bool {
    !self.sensitivity_types.is_empty()
  }

  pub fn supports_format(&self, format: ContentFormat) -> bool {
    self.metadata.supported_formats.contains(&format)
  }

  /// Top-level labels, most to least sensitive.
  pub fn sensitivity_labels(&self) -> Vec<&Label> {
    let mut roots: Vec<&Label> = self
      .roots
      .iter()
      .filter_map(|id| self.labels.get(id))
      .collect();
    roots.sort_by(|a, b| b.sensitivity.cmp(&a.sensitivity).then(a.id.cmp(&b.id)));
    roots
  }

  pub fn sensitivity_types(&self) -> &[SensitivityType] {
    &self.sensitivity_types
  }

  pub fn label(&self, id: LabelId) -> Option<&Label> {
    self.labels.get(&id)
  }

  /// The label recommended for unlabeled content when labeling is required:
  /// the least sensitive active top-level label.
  pub fn default_label(&self) -> Option<&Label> {
    self
      .sensitivity_labels()
      .into_iter()
      .filter(|l| l.is_active)
      .min_by(|a, b| a.sensitivity.cmp(&b.sensitivity).then(a.id.cmp(&b.id)))
  }

  /// Label lookup for apply paths: the label must exist and be active.
  pub fn require_active_label(&self, id: LabelId) -> EngineResult<&Label> {
    let label = self.labels.get(&id).ok_or(EngineError::LabelNotFound(id))?;
    if !label.is_active {
      return Err(EngineError::LabelDisabled(id));
    }
    Ok(label)
  }

  /// Create a handler for running label decisions against this engine.
  pub fn policy_handler(
    self: &Arc<Self>,
    dispatcher: Arc<dyn TaskDispatcher>,
  ) -> PolicyHandler {
    PolicyHandler::new(Arc::clone(self), dispatcher)
  }
}
