// crates/engine/src/domain/types/label.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::action::{ContentMark, Watermark};

/// Identifier of a sensitivity label within one tenant policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelId(pub Uuid);

impl LabelId {
  pub fn new() -> Self {
    LabelId(Uuid::new_v4())
  }
}

impl Default for LabelId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for LabelId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// How a label was (or is being) assigned to content.
///
/// Privileged assignments are sticky: a later standard assignment must not
/// overwrite them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentMethod {
  Standard,
  Privileged,
  Auto,
}

impl AssignmentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      AssignmentMethod::Standard => "Standard",
      AssignmentMethod::Privileged => "Privileged",
      AssignmentMethod::Auto => "Auto",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "Standard" => Some(AssignmentMethod::Standard),
      "Privileged" => Some(AssignmentMethod::Privileged),
      "Auto" => Some(AssignmentMethod::Auto),
      _ => None,
    }
  }
}

/// Marking configuration a label mandates for documents carrying it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelMarkings {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub header: Option<ContentMark>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub footer: Option<ContentMark>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub watermark: Option<Watermark>,
}

impl LabelMarkings {
  pub fn is_empty(&self) -> bool {
    self.header.is_none() && self.footer.is_none() && self.watermark.is_none()
  }
}

/// Protection a label mandates, bound to a tenant template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelProtection {
  pub template_id: super::protection::TemplateId,
  /// Present when the template requires a customer-held key in addition to
  /// the service key.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub double_key_url: Option<url::Url>,
}

/// A sensitivity classification assignable to a document.
///
/// `sensitivity` is a rank; higher means more sensitive. Ranks define a total
/// order over the labels of one policy. Inactive labels are display-only and
/// rejected by every apply path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
  pub id: LabelId,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub color: String,
  pub sensitivity: i32,
  #[serde(default)]
  pub tooltip: String,
  #[serde(default)]
  pub auto_tooltip: String,
  #[serde(default = "default_true")]
  pub is_active: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<LabelId>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub children: Vec<LabelId>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub custom_settings: BTreeMap<String, String>,
  #[serde(default)]
  pub markings: LabelMarkings,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub protection: Option<LabelProtection>,
}

fn default_true() -> bool {
  true
}

/// The record of a label applied to a specific piece of content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentLabel {
  pub label_id: LabelId,
  /// Seconds since the unix epoch.
  pub creation_time: i64,
  pub assignment_method: AssignmentMethod,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extended_properties: BTreeMap<String, String>,
  /// Whether the content's current protection was derived from this label.
  #[serde(default)]
  pub protection_applied_from_label: bool,
}

impl ContentLabel {
  pub fn new(label_id: LabelId, assignment_method: AssignmentMethod) -> Self {
    let creation_time = std::time::SystemTime::now()
      .duration_since(std::time::UNIX_EPOCH)
      .map(|d| d.as_secs() as i64)
      .unwrap_or(0);
    Self {
      label_id,
      creation_time,
      assignment_method,
      extended_properties: BTreeMap::new(),
      protection_applied_from_label: false,
    }
  }
}
