// crates/engine/src/domain/policy/metadata.rs

//! Serialization of content labels into document metadata ("stamps").
//!
//! Two wire shapes exist. `Default` keys every entry by label id, so stamps
//! from different labels enumerate in label-id order. `OneLabelPerTenant`
//! keys entries by tenant id and allows at most one stamp per tenant;
//! re-stamping replaces only the entries of the writing tenant.

use std::collections::BTreeMap;

use super::super::types::document::MetadataVersionFormat;
use super::super::types::label::{AssignmentMethod, ContentLabel, LabelId};

pub const LABEL_METADATA_PREFIX: &str = "Seal_Label_";

const FIELD_ENABLED: &str = "Enabled";
const FIELD_METHOD: &str = "Method";
const FIELD_SET_DATE: &str = "SetDate";
const FIELD_SITE_ID: &str = "SiteId";
const FIELD_LABEL_ID: &str = "LabelId";
const FIELD_PROTECTED: &str = "ProtectionFromLabel";
const FIELD_PROP: &str = "Prop_";

/// A stamp read back out of document metadata.
#[derive(Debug, Clone)]
pub struct ParsedStamp {
  pub label: ContentLabel,
  pub tenant_id: Option<String>,
  pub enabled: bool,
}

fn key(middle: &str, field: &str) -> String {
  format!("{LABEL_METADATA_PREFIX}{middle}_{field}")
}

/// Entries for stamping `label` under the given version format.
pub fn stamp_entries(
  label: &ContentLabel,
  tenant_id: &str,
  format: MetadataVersionFormat,
) -> Vec<(String, String)> {
  let middle = match format {
    MetadataVersionFormat::Default => label.label_id.to_string(),
    MetadataVersionFormat::OneLabelPerTenant => tenant_id.to_string(),
  };
  let mut entries = vec![
    (key(&middle, FIELD_ENABLED), "true".to_string()),
    (key(&middle, FIELD_METHOD), label.assignment_method.as_str().to_string()),
    (key(&middle, FIELD_SET_DATE), label.creation_time.to_string()),
    (key(&middle, FIELD_SITE_ID), tenant_id.to_string()),
    (
      key(&middle, FIELD_PROTECTED),
      label.protection_applied_from_label.to_string(),
    ),
  ];
  if format == MetadataVersionFormat::OneLabelPerTenant {
    entries.push((key(&middle, FIELD_LABEL_ID), label.label_id.to_string()));
  }
  for (k, v) in &label.extended_properties {
    entries.push((key(&middle, &format!("{FIELD_PROP}{k}")), v.clone()));
  }
  entries.sort();
  entries
}

/// Keys that must be removed before stamping (or when stripping a label).
///
/// `Default` format owns every stamp key; `OneLabelPerTenant` only touches
/// the writing tenant's entries.
pub fn removal_keys(
  existing: &BTreeMap<String, String>,
  tenant_id: &str,
  format: MetadataVersionFormat,
) -> Vec<String> {
  match format {
    MetadataVersionFormat::Default => existing
      .keys()
      .filter(|k| k.starts_with(LABEL_METADATA_PREFIX))
      .cloned()
      .collect(),
    MetadataVersionFormat::OneLabelPerTenant => {
      let own_prefix = format!("{LABEL_METADATA_PREFIX}{tenant_id}_");
      existing
        .keys()
        .filter(|k| k.starts_with(&own_prefix))
        .cloned()
        .collect()
    }
  }
}

/// Parse every stamp found in `metadata`, in enumeration (key) order.
pub fn parse_stamps(metadata: &BTreeMap<String, String>) -> Vec<ParsedStamp> {
  // Group fields by the token between the prefix and the field name.
  let mut groups: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
  for (k, v) in metadata {
    let Some(rest) = k.strip_prefix(LABEL_METADATA_PREFIX) else {
      continue;
    };
    let Some((middle, field)) = rest.split_once('_') else {
      continue;
    };
    groups
      .entry(middle.to_string())
      .or_default()
      .insert(field.to_string(), v.clone());
  }

  let mut stamps = Vec::new();
  for (middle, fields) in groups {
    // Tenant-keyed stamps carry the label id as a field of their own.
    let (label_id, tenant_id) = match fields.get(FIELD_LABEL_ID) {
      Some(raw) => match raw.parse() {
        Ok(id) => (LabelId(id), Some(middle.clone())),
        Err(_) => continue,
      },
      None => match middle.parse() {
        Ok(id) => (LabelId(id), fields.get(FIELD_SITE_ID).cloned()),
        Err(_) => continue,
      },
    };
    let enabled = fields.get(FIELD_ENABLED).map(String::as_str) == Some("true");
    let assignment_method = fields
      .get(FIELD_METHOD)
      .and_then(|m| AssignmentMethod::parse(m))
      .unwrap_or(AssignmentMethod::Standard);
    let creation_time = fields
      .get(FIELD_SET_DATE)
      .and_then(|d| d.parse().ok())
      .unwrap_or(0);
    let protection_applied_from_label =
      fields.get(FIELD_PROTECTED).map(String::as_str) == Some("true");
    let extended_properties = fields
      .iter()
      .filter_map(|(f, v)| f.strip_prefix(FIELD_PROP).map(|p| (p.to_string(), v.clone())))
      .collect();

    stamps.push(ParsedStamp {
      label: ContentLabel {
        label_id,
        creation_time,
        assignment_method,
        extended_properties,
        protection_applied_from_label,
      },
      tenant_id,
      enabled,
    });
  }
  stamps
}

/// The effective current label among parsed stamps: the enabled stamp with
/// the most recent set date, ties broken by label id.
pub fn effective_label(stamps: &[ParsedStamp]) -> Option<ContentLabel> {
  stamps
    .iter()
    .filter(|s| s.enabled)
    .max_by(|a, b| {
      a.label
        .creation_time
        .cmp(&b.label.creation_time)
        .then_with(|| b.label.label_id.cmp(&a.label.label_id))
    })
    .map(|s| s.label.clone())
}
