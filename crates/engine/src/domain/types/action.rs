// crates/engine/src/domain/types/action.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::label::{ContentLabel, LabelId};
use super::protection::TemplateId;
use super::state::ActionKinds;
use crate::domain::error::{EngineError, EngineResult};

/// Horizontal placement of a content header/footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentAlignment {
  Left,
  Centered,
  Right,
}

impl Default for ContentAlignment {
  fn default() -> Self {
    ContentAlignment::Centered
  }
}

/// Orientation of a watermark across the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatermarkLayout {
  Horizontal,
  Diagonal,
}

impl Default for WatermarkLayout {
  fn default() -> Self {
    WatermarkLayout::Diagonal
  }
}

/// A header or footer mark the application is asked to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentMark {
  /// Stable name the application uses to find the mark again for removal.
  pub ui_element_name: String,
  pub text: String,
  #[serde(default = "default_font_name")]
  pub font_name: String,
  #[serde(default = "default_font_size")]
  pub font_size: u32,
  #[serde(default = "default_font_color")]
  pub font_color: String,
  #[serde(default)]
  pub alignment: ContentAlignment,
  #[serde(default)]
  pub margin: u32,
}

/// A watermark the application is asked to render over the whole document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watermark {
  pub ui_element_name: String,
  pub text: String,
  #[serde(default = "default_font_name")]
  pub font_name: String,
  #[serde(default = "default_font_size")]
  pub font_size: u32,
  #[serde(default = "default_font_color")]
  pub font_color: String,
  #[serde(default)]
  pub layout: WatermarkLayout,
}

fn default_font_name() -> String {
  "Calibri".to_string()
}

fn default_font_size() -> u32 {
  12
}

fn default_font_color() -> String {
  "#000000".to_string()
}

/// One step the application must execute to bring a document in line with
/// policy. Ordering within an [`ActionResult`] is causal and must be
/// preserved by the application.
#[derive(Debug, Clone)]
pub enum Action {
  AddContentHeader(ContentMark),
  AddContentFooter(ContentMark),
  AddWatermark(Watermark),
  RemoveContentHeader { ui_element_names: Vec<String> },
  RemoveContentFooter { ui_element_names: Vec<String> },
  RemoveWatermark { ui_element_names: Vec<String> },
  /// Metadata edits. Removals are applied before additions.
  Metadata {
    remove: Vec<String>,
    add: Vec<(String, String)>,
  },
  /// The application must collect a downgrade justification from the user
  /// and re-run the decision with it.
  Justify,
  Custom {
    name: String,
    properties: BTreeMap<String, String>,
  },
  ApplyLabel { label: ContentLabel },
  RecommendLabel { label_id: LabelId },
  ProtectByTemplate {
    template_id: TemplateId,
    double_key_url: Option<url::Url>,
  },
  ProtectAdhoc,
  ProtectAdhocDk,
  ProtectDoNotForward,
  ProtectDoNotForwardDk,
  ProtectByEncryptOnly,
  RemoveProtection,
}

impl Action {
  /// The single kind bit identifying this action variant.
  pub fn kind(&self) -> ActionKinds {
    match self {
      Action::AddContentHeader(_) => ActionKinds::ADD_CONTENT_HEADER,
      Action::AddContentFooter(_) => ActionKinds::ADD_CONTENT_FOOTER,
      Action::AddWatermark(_) => ActionKinds::ADD_WATERMARK,
      Action::RemoveContentHeader { .. } => ActionKinds::REMOVE_CONTENT_HEADER,
      Action::RemoveContentFooter { .. } => ActionKinds::REMOVE_CONTENT_FOOTER,
      Action::RemoveWatermark { .. } => ActionKinds::REMOVE_WATERMARK,
      Action::Metadata { .. } => ActionKinds::METADATA,
      Action::Justify => ActionKinds::JUSTIFY,
      Action::Custom { .. } => ActionKinds::CUSTOM,
      Action::ApplyLabel { .. } => ActionKinds::APPLY_LABEL,
      Action::RecommendLabel { .. } => ActionKinds::RECOMMEND_LABEL,
      Action::ProtectByTemplate { .. } => ActionKinds::PROTECT_BY_TEMPLATE,
      Action::ProtectAdhoc => ActionKinds::PROTECT_ADHOC,
      Action::ProtectAdhocDk => ActionKinds::PROTECT_ADHOC_DK,
      Action::ProtectDoNotForward => ActionKinds::PROTECT_DO_NOT_FORWARD,
      Action::ProtectDoNotForwardDk => ActionKinds::PROTECT_DO_NOT_FORWARD_DK,
      Action::ProtectByEncryptOnly => ActionKinds::PROTECT_BY_ENCRYPT_ONLY,
      Action::RemoveProtection => ActionKinds::REMOVE_PROTECTION,
    }
  }
}

/// Where one decision cycle currently stands.
///
/// `Evaluating` is transient inside `compute_actions`; a result is handed to
/// the caller in `ActionsComputed` and must be either applied then committed,
/// or abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPhase {
  ActionsComputed,
  Applied,
  Committed,
  Abandoned,
}

/// Ordered set of actions produced by one `compute_actions` call.
#[derive(Debug)]
pub struct ActionResult {
  actions: Vec<Action>,
  phase: DecisionPhase,
}

impl ActionResult {
  pub(crate) fn new(actions: Vec<Action>) -> Self {
    Self {
      actions,
      phase: DecisionPhase::ActionsComputed,
    }
  }

  pub fn actions(&self) -> &[Action] {
    &self.actions
  }

  pub fn phase(&self) -> DecisionPhase {
    self.phase
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  /// Record that the application has executed every action against the
  /// document. Must precede `notify_committed_actions`.
  pub fn mark_applied(&mut self) -> EngineResult<()> {
    match self.phase {
      DecisionPhase::ActionsComputed => {
        self.phase = DecisionPhase::Applied;
        Ok(())
      }
      other => Err(EngineError::BadInput(format!(
        "cannot apply an action result in phase {other:?}"
      ))),
    }
  }

  /// Discard the result without applying it. Terminal.
  pub fn abandon(&mut self) {
    self.phase = DecisionPhase::Abandoned;
  }

  pub(crate) fn mark_committed(&mut self) -> EngineResult<()> {
    match self.phase {
      DecisionPhase::Applied => {
        self.phase = DecisionPhase::Committed;
        Ok(())
      }
      other => Err(EngineError::BadInput(format!(
        "cannot commit an action result in phase {other:?}"
      ))),
    }
  }
}
