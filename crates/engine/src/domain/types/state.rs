// crates/engine/src/domain/types/state.rs

use std::collections::BTreeMap;

use bitflags::bitflags;

use super::label::{AssignmentMethod, LabelId};

bitflags! {
  /// Action kinds an application is able to execute. Actions whose kind is
  /// missing from the mask are silently dropped from decision output.
  #[derive(Debug, Clone, Copy, PartialEq, Eq)]
  pub struct ActionKinds: u32 {
    const ADD_CONTENT_FOOTER        = 1 << 0;
    const ADD_CONTENT_HEADER        = 1 << 1;
    const ADD_WATERMARK             = 1 << 2;
    const CUSTOM                    = 1 << 3;
    const JUSTIFY                   = 1 << 4;
    const METADATA                  = 1 << 5;
    const PROTECT_ADHOC             = 1 << 6;
    const PROTECT_BY_TEMPLATE       = 1 << 7;
    const PROTECT_DO_NOT_FORWARD    = 1 << 8;
    const REMOVE_CONTENT_FOOTER     = 1 << 9;
    const REMOVE_CONTENT_HEADER     = 1 << 10;
    const REMOVE_PROTECTION         = 1 << 11;
    const REMOVE_WATERMARK          = 1 << 12;
    const APPLY_LABEL               = 1 << 13;
    const RECOMMEND_LABEL           = 1 << 14;
    const PROTECT_ADHOC_DK          = 1 << 15;
    // bit 16 reserved
    const PROTECT_DO_NOT_FORWARD_DK = 1 << 17;
    const PROTECT_BY_ENCRYPT_ONLY   = 1 << 18;
  }
}

impl ActionKinds {
  /// Everything a fully capable labeling application handles.
  pub fn full() -> Self {
    Self::all()
  }
}

/// If and how the application wants to change the current label.
#[derive(Debug, Clone)]
pub enum LabelIntent {
  /// Keep whatever label the document currently carries.
  NoChange,
  /// Strip the current label.
  Remove { method: AssignmentMethod },
  /// Assign `label_id`, replacing any current label.
  Update {
    label_id: LabelId,
    extended_properties: BTreeMap<String, String>,
    method: AssignmentMethod,
  },
}

/// The caller's side of a decision: what it intends to do and what it can do.
#[derive(Debug, Clone)]
pub struct ApplicationActionState {
  pub intent: LabelIntent,
  /// Whether the user has already justified a sensitivity downgrade.
  pub is_downgrade_justified: bool,
  pub downgrade_justification: Option<String>,
  pub supported_actions: ActionKinds,
}

impl ApplicationActionState {
  pub fn no_change() -> Self {
    Self {
      intent: LabelIntent::NoChange,
      is_downgrade_justified: false,
      downgrade_justification: None,
      supported_actions: ActionKinds::full(),
    }
  }

  pub fn update(label_id: LabelId, method: AssignmentMethod) -> Self {
    Self {
      intent: LabelIntent::Update {
        label_id,
        extended_properties: BTreeMap::new(),
        method,
      },
      is_downgrade_justified: false,
      downgrade_justification: None,
      supported_actions: ActionKinds::full(),
    }
  }

  pub fn remove(method: AssignmentMethod) -> Self {
    Self {
      intent: LabelIntent::Remove { method },
      is_downgrade_justified: false,
      downgrade_justification: None,
      supported_actions: ActionKinds::full(),
    }
  }

  pub fn with_justification(mut self, text: impl Into<String>) -> Self {
    self.is_downgrade_justified = true;
    self.downgrade_justification = Some(text.into());
    self
  }

  pub fn with_supported_actions(mut self, mask: ActionKinds) -> Self {
    self.supported_actions = mask;
    self
  }
}
