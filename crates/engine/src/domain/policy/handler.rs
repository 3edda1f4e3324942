// crates/engine/src/domain/policy/handler.rs

//! The label decision engine: given a document's current state and the
//! application's intent, compute the ordered actions required to reach the
//! requested state.

use std::sync::Arc;
use std::time::Duration;

use super::super::error::{EngineError, EngineResult};
use super::super::types::action::{Action, ActionResult};
use super::super::types::document::DocumentState;
use super::super::types::label::{AssignmentMethod, ContentLabel, Label};
use super::super::types::state::{ActionKinds, ApplicationActionState, LabelIntent};
use super::engine::PolicyEngine;
use super::metadata;
use crate::adapters::dispatch::TaskDispatcher;
use crate::adapters::logging::{LogLevel, LoggerDelegate};

/// Runs label decisions against one policy engine.
///
/// The handler is immutable after construction, so concurrent
/// `compute_actions` calls for different documents are safe.
pub struct PolicyHandler {
  engine: Arc<PolicyEngine>,
  dispatcher: Arc<dyn TaskDispatcher>,
  audit_logger: Option<Arc<dyn LoggerDelegate>>,
}

impl PolicyHandler {
  pub(crate) fn new(engine: Arc<PolicyEngine>, dispatcher: Arc<dyn TaskDispatcher>) -> Self {
    Self {
      engine,
      dispatcher,
      audit_logger: None,
    }
  }

  /// Route committed-action audit records to an application sink in addition
  /// to the tracing output.
  pub fn with_audit_logger(mut self, logger: Arc<dyn LoggerDelegate>) -> Self {
    self.audit_logger = Some(logger);
    self
  }

  pub fn engine(&self) -> &Arc<PolicyEngine> {
    &self.engine
  }

  /// Read the effective label back out of the document's metadata stamps.
  pub fn get_sensitivity_label(&self, doc: &DocumentState) -> EngineResult<Option<ContentLabel>> {
    let entries = doc
      .metadata
      .metadata(&[], &[metadata::LABEL_METADATA_PREFIX]);
    let stamps = metadata::parse_stamps(&entries);
    Ok(metadata::effective_label(&stamps))
  }

  /// Compute the ordered actions required by `app`'s intent on `doc`.
  pub fn compute_actions(
    &self,
    doc: &DocumentState,
    app: &ApplicationActionState,
  ) -> EngineResult<ActionResult> {
    tracing::debug!(content_id = %doc.content_id, "evaluating label decision");

    if !self.engine.supports_format(doc.content_format) {
      return Err(EngineError::ContentFormatNotSupported(doc.content_format));
    }

    let current = self.get_sensitivity_label(doc)?;
    let current_label = current
      .as_ref()
      .and_then(|c| self.engine.label(c.label_id));

    let actions = match &app.intent {
      LabelIntent::NoChange => self.actions_for_no_change(current.as_ref()),
      LabelIntent::Remove { method } => {
        self.actions_for_remove(doc, app, current.as_ref(), current_label, *method)?
      }
      LabelIntent::Update {
        label_id,
        extended_properties,
        method,
      } => {
        let new_label = self.engine.require_active_label(*label_id)?;
        self.actions_for_update(
          doc,
          app,
          current.as_ref(),
          current_label,
          new_label,
          extended_properties.clone(),
          *method,
        )?
      }
    };

    let actions = actions
      .into_iter()
      .filter(|a| app.supported_actions.contains(a.kind()))
      .collect::<Vec<_>>();

    tracing::debug!(
      content_id = %doc.content_id,
      count = actions.len(),
      "actions computed"
    );
    Ok(ActionResult::new(actions))
  }

  /// Flush the audit record for actions the application has applied to disk.
  ///
  /// Telemetry is handed to the task dispatcher; losing the record degrades
  /// auditability but does not fail the decision.
  pub fn notify_committed_actions(
    &self,
    result: &mut ActionResult,
    doc: &DocumentState,
    app: &ApplicationActionState,
  ) -> EngineResult<()> {
    result.mark_committed()?;

    let summary = summarize_intent(app);
    let content_id = doc.content_id;
    let audit_metadata = doc.audit_metadata.clone();
    let logger = self.audit_logger.clone();
    self.dispatcher.dispatch(
      Box::new(move || {
        tracing::info!(%content_id, intent = %summary, ?audit_metadata, "label actions committed");
        if let Some(logger) = logger {
          logger.write(
            LogLevel::Info,
            &format!("committed {summary} for {content_id}"),
            "seal_engine::audit",
          );
          logger.flush();
        }
      }),
      Duration::ZERO,
      false,
    );
    Ok(())
  }

  /// No intent to change anything: the only output is a recommendation when
  /// policy mandates labeling and the document has none.
  fn actions_for_no_change(&self, current: Option<&ContentLabel>) -> Vec<Action> {
    if current.is_some() || !self.engine.is_labeling_required() {
      return Vec::new();
    }
    match self.engine.default_label() {
      Some(label) => vec![Action::RecommendLabel { label_id: label.id }],
      None => Vec::new(),
    }
  }

  fn check_privilege(
    current: Option<&ContentLabel>,
    requested: AssignmentMethod,
  ) -> EngineResult<()> {
    if let Some(cur) = current {
      if cur.assignment_method == AssignmentMethod::Privileged
        && requested != AssignmentMethod::Privileged
      {
        return Err(EngineError::PrivilegedRequired);
      }
    }
    Ok(())
  }

  /// Downgrade gate. Returns `Some(Justify)` when the application should
  /// collect a justification instead of failing outright.
  fn check_downgrade(
    &self,
    app: &ApplicationActionState,
    current_rank: Option<i32>,
    new_rank: Option<i32>,
  ) -> EngineResult<Option<Action>> {
    if !self.engine.is_downgrade_justification_required() {
      return Ok(None);
    }
    let is_downgrade = match (current_rank, new_rank) {
      (Some(cur), Some(new)) => new < cur,
      (Some(_), None) => true, // removing a label drops sensitivity to none
      _ => false,
    };
    if !is_downgrade || app.is_downgrade_justified {
      return Ok(None);
    }
    if app.supported_actions.contains(ActionKinds::JUSTIFY) {
      Ok(Some(Action::Justify))
    } else {
      Err(EngineError::JustificationRequired)
    }
  }

  fn actions_for_remove(
    &self,
    doc: &DocumentState,
    app: &ApplicationActionState,
    current: Option<&ContentLabel>,
    current_label: Option<&Label>,
    method: AssignmentMethod,
  ) -> EngineResult<Vec<Action>> {
    let Some(current) = current else {
      return Ok(Vec::new()); // nothing to strip
    };
    Self::check_privilege(Some(current), method)?;

    let current_rank = current_label.map(|l| l.sensitivity);
    if let Some(justify) = self.check_downgrade(app, current_rank, None)? {
      return Ok(vec![justify]);
    }

    let mut actions = Vec::new();
    let existing = doc
      .metadata
      .metadata(&[], &[metadata::LABEL_METADATA_PREFIX]);
    let remove = metadata::removal_keys(
      &existing,
      self.engine.tenant_id(),
      doc.metadata_version.format,
    );
    if !remove.is_empty() {
      actions.push(Action::Metadata {
        remove,
        add: Vec::new(),
      });
    }

    if current.protection_applied_from_label && doc.protection.is_some() {
      actions.push(Action::RemoveProtection);
    }

    actions.extend(marking_removals(current_label));
    Ok(actions)
  }

  #[allow(clippy::too_many_arguments)]
  fn actions_for_update(
    &self,
    doc: &DocumentState,
    app: &ApplicationActionState,
    current: Option<&ContentLabel>,
    current_label: Option<&Label>,
    new_label: &Label,
    extended_properties: std::collections::BTreeMap<String, String>,
    method: AssignmentMethod,
  ) -> EngineResult<Vec<Action>> {
    let changing = current.map(|c| c.label_id != new_label.id).unwrap_or(true);
    if changing {
      Self::check_privilege(current, method)?;

      let current_rank = current_label.map(|l| l.sensitivity);
      if let Some(justify) =
        self.check_downgrade(app, current_rank, Some(new_label.sensitivity))?
      {
        return Ok(vec![justify]);
      }
    }

    let mut content_label = ContentLabel::new(new_label.id, method);
    content_label.extended_properties = extended_properties;
    content_label.protection_applied_from_label = new_label.protection.is_some();

    // Causal order: metadata first (removals inside the action precede
    // additions), then protection, then marking removals, then marking
    // additions, then the label assignment itself.
    let mut actions = Vec::new();

    let existing = doc
      .metadata
      .metadata(&[], &[metadata::LABEL_METADATA_PREFIX]);
    let remove = metadata::removal_keys(
      &existing,
      self.engine.tenant_id(),
      doc.metadata_version.format,
    );
    let add = metadata::stamp_entries(
      &content_label,
      self.engine.tenant_id(),
      doc.metadata_version.format,
    );
    actions.push(Action::Metadata { remove, add });

    match &new_label.protection {
      Some(protection) => actions.push(Action::ProtectByTemplate {
        template_id: protection.template_id,
        double_key_url: protection.double_key_url.clone(),
      }),
      None => {
        let was_label_protected = current
          .map(|c| c.protection_applied_from_label)
          .unwrap_or(false);
        if was_label_protected && doc.protection.is_some() {
          actions.push(Action::RemoveProtection);
        }
      }
    }

    if changing {
      actions.extend(marking_removals(current_label));
    }

    let markings = &new_label.markings;
    if let Some(header) = &markings.header {
      actions.push(Action::AddContentHeader(header.clone()));
    }
    if let Some(footer) = &markings.footer {
      actions.push(Action::AddContentFooter(footer.clone()));
    }
    if let Some(watermark) = &markings.watermark {
      actions.push(Action::AddWatermark(watermark.clone()));
    }

    actions.push(Action::ApplyLabel {
      label: content_label,
    });
    Ok(actions)
  }
}

/// Removal actions for the markings an outgoing label had mandated.
fn marking_removals(label: Option<&Label>) -> Vec<Action> {
  let Some(label) = label else {
    return Vec::new();
  };
  let mut actions = Vec::new();
  if let Some(header) = &label.markings.header {
    actions.push(Action::RemoveContentHeader {
      ui_element_names: vec![header.ui_element_name.clone()],
    });
  }
  if let Some(footer) = &label.markings.footer {
    actions.push(Action::RemoveContentFooter {
      ui_element_names: vec![footer.ui_element_name.clone()],
    });
  }
  if let Some(watermark) = &label.markings.watermark {
    actions.push(Action::RemoveWatermark {
      ui_element_names: vec![watermark.ui_element_name.clone()],
    });
  }
  actions
}

fn summarize_intent(app: &ApplicationActionState) -> String {
  match &app.intent {
    LabelIntent::NoChange => "no label change".to_string(),
    LabelIntent::Remove { .. } => "label removal".to_string(),
    LabelIntent::Update { label_id, .. } => format!("label update to {label_id}"),
  }
}
