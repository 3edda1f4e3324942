// crates/engine/src/domain/types/protection.rs

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::document::ContentId;
use super::label::LabelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub Uuid);

impl fmt::Display for TemplateId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtectionType {
  /// Rights defined by a tenant template.
  TemplateBased,
  /// Rights defined ad hoc by the publisher.
  Custom,
}

/// A usage right grantable on protected content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Right {
  Owner,
  View,
  Edit,
  Print,
  Extract,
  Forward,
  Reply,
  ReplyAll,
  Export,
}

/// A named bundle of rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
  Viewer,
  Reviewer,
  Author,
  CoOwner,
}

static ROLE_RIGHTS: Lazy<BTreeMap<Role, Vec<Right>>> = Lazy::new(|| {
  use Right::*;
  let mut m = BTreeMap::new();
  m.insert(Role::Viewer, vec![View, Reply, ReplyAll]);
  m.insert(Role::Reviewer, vec![View, Edit, Reply, ReplyAll, Forward]);
  m.insert(
    Role::Author,
    vec![View, Edit, Print, Extract, Reply, ReplyAll, Forward],
  );
  m.insert(
    Role::CoOwner,
    vec![Owner, View, Edit, Print, Extract, Forward, Reply, ReplyAll, Export],
  );
  m
});

impl Role {
  pub fn rights(self) -> &'static [Right] {
    // The table covers every variant.
    ROLE_RIGHTS.get(&self).map(Vec::as_slice).unwrap_or(&[])
  }
}

/// A set of users granted the same set of rights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRights {
  pub users: Vec<String>,
  pub rights: Vec<Right>,
}

/// A set of users granted the same role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoles {
  pub users: Vec<String>,
  pub roles: Vec<Role>,
}

/// Rights-and-identity metadata describing how content is restricted.
///
/// Immutable once constructed; safe for concurrent reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionDescriptor {
  pub protection_type: ProtectionType,
  pub owner: String,
  pub name: String,
  #[serde(default)]
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub template_id: Option<TemplateId>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label_id: Option<LabelId>,
  pub content_id: ContentId,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub user_rights: Vec<UserRights>,
  /// Seconds since the unix epoch; `None` means the content never expires.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content_valid_until: Option<i64>,
  #[serde(default = "default_offline_access")]
  pub allows_offline_access: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub referrer: Option<Url>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub double_key_url: Option<Url>,
}

fn default_offline_access() -> bool {
  true
}

impl ProtectionDescriptor {
  /// Descriptor bound to a tenant template. Rights resolution is deferred to
  /// the template owner (the service side of the template is out of scope;
  /// the publisher is always granted ownership locally).
  pub fn from_template(template_id: TemplateId, owner: impl Into<String>, content_id: ContentId) -> Self {
    let owner = owner.into();
    Self {
      protection_type: ProtectionType::TemplateBased,
      owner: owner.clone(),
      name: String::new(),
      description: String::new(),
      template_id: Some(template_id),
      label_id: None,
      content_id,
      user_rights: vec![UserRights {
        users: vec![owner],
        rights: vec![Right::Owner, Right::View, Right::Edit, Right::Print, Right::Extract, Right::Export],
      }],
      content_valid_until: None,
      allows_offline_access: true,
      referrer: None,
      double_key_url: None,
    }
  }

  /// Ad-hoc descriptor from explicit user → rights grants.
  pub fn from_user_rights(
    owner: impl Into<String>,
    content_id: ContentId,
    user_rights: Vec<UserRights>,
  ) -> Self {
    Self {
      protection_type: ProtectionType::Custom,
      owner: owner.into(),
      name: String::new(),
      description: String::new(),
      template_id: None,
      label_id: None,
      content_id,
      user_rights,
      content_valid_until: None,
      allows_offline_access: true,
      referrer: None,
      double_key_url: None,
    }
  }

  /// Ad-hoc descriptor from explicit user → roles grants; roles are expanded
  /// through the role table at construction.
  pub fn from_user_roles(
    owner: impl Into<String>,
    content_id: ContentId,
    user_roles: Vec<UserRoles>,
  ) -> Self {
    let user_rights = user_roles
      .into_iter()
      .map(|ur| {
        let mut rights: Vec<Right> = ur
          .roles
          .iter()
          .flat_map(|r| r.rights().iter().copied())
          .collect();
        rights.sort();
        rights.dedup();
        UserRights {
          users: ur.users,
          rights,
        }
      })
      .collect();
    Self::from_user_rights(owner, content_id, user_rights)
  }

  pub fn with_name(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
    self.name = name.into();
    self.description = description.into();
    self
  }

  pub fn with_label(mut self, label_id: LabelId) -> Self {
    self.label_id = Some(label_id);
    self
  }

  pub fn with_expiration(mut self, valid_until: i64) -> Self {
    self.content_valid_until = Some(valid_until);
    self
  }

  pub fn with_double_key_url(mut self, url: Url) -> Self {
    self.double_key_url = Some(url);
    self
  }

  pub fn with_referrer(mut self, url: Url) -> Self {
    self.referrer = Some(url);
    self
  }

  pub fn does_content_expire(&self) -> bool {
    self.content_valid_until.is_some()
  }

  /// Rights granted to `user`, case-insensitive on the address. The owner
  /// implicitly holds every right.
  pub fn rights_for(&self, user: &str) -> Vec<Right> {
    if self.owner.eq_ignore_ascii_case(user) {
      return vec![
        Right::Owner,
        Right::View,
        Right::Edit,
        Right::Print,
        Right::Extract,
        Right::Forward,
        Right::Reply,
        Right::ReplyAll,
        Right::Export,
      ];
    }
    let mut rights: Vec<Right> = self
      .user_rights
      .iter()
      .filter(|ur| ur.users.iter().any(|u| u.eq_ignore_ascii_case(user)))
      .flat_map(|ur| ur.rights.iter().copied())
      .collect();
    rights.sort();
    rights.dedup();
    rights
  }
}
