mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use seal_engine as se;
use se::{
  Action, ActionKinds, ApplicationActionState, AssignmentMethod, ContentFormat, ContentId,
  DecisionPhase, EngineError, LabelIntent,
};

fn handler(justification_required: bool) -> (se::PolicyHandler, Arc<common::RecordingDispatcher>) {
  let dispatcher = Arc::new(common::RecordingDispatcher::default());
  let engine = common::engine(justification_required);
  (engine.policy_handler(dispatcher.clone()), dispatcher)
}

#[test]
fn upgrade_produces_apply_label_and_markings() {
  let (handler, _) = handler(true);
  let doc = common::labeled_document(common::public_label_id(), AssignmentMethod::Standard);
  let app = common::update_to(common::confidential_label_id());

  let result = handler.compute_actions(&doc, &app).unwrap();
  let actions = result.actions();

  assert!(matches!(actions.first(), Some(Action::Metadata { .. })));
  assert!(actions
    .iter()
    .any(|a| matches!(a, Action::ProtectByTemplate { template_id, .. } if *template_id == common::template_id())));
  assert!(actions.iter().any(|a| matches!(a, Action::AddContentHeader(_))));
  assert!(actions.iter().any(|a| matches!(a, Action::AddWatermark(_))));
  assert!(matches!(actions.last(), Some(Action::ApplyLabel { label }) if label.label_id == common::confidential_label_id()));
}

#[test]
fn downgrade_without_justification_fails() {
  let (handler, _) = handler(true);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Standard);
  let mut app = common::update_to(common::public_label_id());
  // The application cannot collect justifications.
  app.supported_actions = ActionKinds::all() - ActionKinds::JUSTIFY;

  let err = handler.compute_actions(&doc, &app).unwrap_err();
  assert!(matches!(err, EngineError::JustificationRequired));
}

#[test]
fn downgrade_with_justify_capability_yields_justify_action_only() {
  let (handler, _) = handler(true);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Standard);
  let app = common::update_to(common::public_label_id());

  let result = handler.compute_actions(&doc, &app).unwrap();
  assert_eq!(result.actions().len(), 1);
  assert!(matches!(result.actions()[0], Action::Justify));
}

#[test]
fn justified_downgrade_succeeds() {
  let (handler, _) = handler(true);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Standard);
  let app = common::update_to(common::public_label_id()).with_justification("approved by legal");

  let result = handler.compute_actions(&doc, &app).unwrap();
  assert!(result
    .actions()
    .iter()
    .any(|a| matches!(a, Action::ApplyLabel { label } if label.label_id == common::public_label_id())));
}

#[test]
fn downgrade_not_gated_when_policy_does_not_require_it() {
  let (handler, _) = handler(false);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Standard);
  let app = common::update_to(common::public_label_id());

  let result = handler.compute_actions(&doc, &app).unwrap();
  assert!(!result.actions().iter().any(|a| matches!(a, Action::Justify)));
}

#[test]
fn privileged_label_rejects_standard_update() {
  let (handler, _) = handler(true);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Privileged);
  let app = common::update_to(common::internal_label_id());

  let err = handler.compute_actions(&doc, &app).unwrap_err();
  assert!(matches!(err, EngineError::PrivilegedRequired));
}

#[test]
fn privileged_label_accepts_privileged_update() {
  let (handler, _) = handler(false);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Privileged);
  let app = ApplicationActionState::update(common::internal_label_id(), AssignmentMethod::Privileged);

  let result = handler.compute_actions(&doc, &app).unwrap();
  assert!(result
    .actions()
    .iter()
    .any(|a| matches!(a, Action::ApplyLabel { label } if label.label_id == common::internal_label_id())));
}

#[test]
fn privileged_remove_requires_privileged_method() {
  let (handler, _) = handler(false);
  let doc = common::labeled_document(common::internal_label_id(), AssignmentMethod::Privileged);

  let err = handler
    .compute_actions(&doc, &ApplicationActionState::remove(AssignmentMethod::Standard))
    .unwrap_err();
  assert!(matches!(err, EngineError::PrivilegedRequired));
}

#[test]
fn unknown_label_fails_not_found() {
  let (handler, _) = handler(false);
  let doc = common::document(ContentId::new());
  let missing = se::LabelId("00000000-0000-0000-0000-0000000000ff".parse().unwrap());

  let err = handler.compute_actions(&doc, &common::update_to(missing)).unwrap_err();
  assert!(matches!(err, EngineError::LabelNotFound(id) if id == missing));
}

#[test]
fn inactive_label_fails_disabled() {
  let (handler, _) = handler(false);
  let doc = common::document(ContentId::new());

  let err = handler
    .compute_actions(&doc, &common::update_to(common::retired_label_id()))
    .unwrap_err();
  assert!(matches!(err, EngineError::LabelDisabled(id) if id == common::retired_label_id()));
}

#[test]
fn unsupported_content_format_is_rejected() {
  let dispatcher = Arc::new(common::RecordingDispatcher::default());
  let mut json: serde_json::Value = serde_json::from_slice(&common::policy_json(false)).unwrap();
  json["metadata"]["supported_formats"] = serde_json::json!(["File"]);
  let engine = se::PolicyEngine::from_policy_json(
    common::engine_settings(),
    &serde_json::to_vec(&json).unwrap(),
  )
  .unwrap();
  let handler = engine.policy_handler(dispatcher);

  let mut doc = common::document(ContentId::new());
  doc.content_format = ContentFormat::Email;
  let err = handler
    .compute_actions(&doc, &common::update_to(common::public_label_id()))
    .unwrap_err();
  assert!(matches!(err, EngineError::ContentFormatNotSupported(ContentFormat::Email)));
}

#[test]
fn no_change_intent_yields_no_actions() {
  let (handler, _) = handler(true);
  let doc = common::labeled_document(common::internal_label_id(), AssignmentMethod::Standard);

  let result = handler
    .compute_actions(&doc, &ApplicationActionState::no_change())
    .unwrap();
  assert!(result.is_empty());
}

#[test]
fn unlabeled_document_gets_a_recommendation_when_labeling_required() {
  let (handler, _) = handler(false);
  let doc = common::document(ContentId::new());

  let result = handler
    .compute_actions(&doc, &ApplicationActionState::no_change())
    .unwrap();
  assert_eq!(result.actions().len(), 1);
  assert!(matches!(
    result.actions()[0],
    Action::RecommendLabel { label_id } if label_id == common::public_label_id()
  ));
}

#[test]
fn recommendation_is_dropped_when_app_cannot_recommend() {
  let (handler, _) = handler(false);
  let doc = common::document(ContentId::new());
  let app = ApplicationActionState::no_change()
    .with_supported_actions(ActionKinds::all() - ActionKinds::RECOMMEND_LABEL);

  let result = handler.compute_actions(&doc, &app).unwrap();
  assert!(result.is_empty());
}

#[test]
fn remove_strips_metadata_and_markings() {
  let (handler, _) = handler(false);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Standard);

  let result = handler
    .compute_actions(&doc, &ApplicationActionState::remove(AssignmentMethod::Standard))
    .unwrap();
  let actions = result.actions();

  let Some(Action::Metadata { remove, add }) = actions.first() else {
    panic!("expected metadata action first, got {actions:?}");
  };
  assert!(!remove.is_empty());
  assert!(add.is_empty());
  assert!(actions.iter().any(|a| matches!(a, Action::RemoveContentHeader { .. })));
  assert!(actions.iter().any(|a| matches!(a, Action::RemoveWatermark { .. })));
  assert!(!actions.iter().any(|a| matches!(a, Action::ApplyLabel { .. })));
}

#[test]
fn actions_are_filtered_by_supported_mask() {
  let (handler, _) = handler(false);
  let doc = common::document(ContentId::new());
  let app = common::update_to(common::confidential_label_id())
    .with_supported_actions(ActionKinds::METADATA | ActionKinds::APPLY_LABEL);

  let result = handler.compute_actions(&doc, &app).unwrap();
  for action in result.actions() {
    assert!(
      matches!(action, Action::Metadata { .. } | Action::ApplyLabel { .. }),
      "unexpected action {action:?}"
    );
  }
}

#[test]
fn protection_actions_precede_marking_actions() {
  let (handler, _) = handler(false);
  let doc = common::labeled_document(common::public_label_id(), AssignmentMethod::Standard);

  let result = handler
    .compute_actions(&doc, &common::update_to(common::confidential_label_id()))
    .unwrap();
  let actions = result.actions();
  let protect_pos = actions
    .iter()
    .position(|a| matches!(a, Action::ProtectByTemplate { .. }))
    .expect("protect action");
  let first_marking = actions
    .iter()
    .position(|a| {
      matches!(
        a,
        Action::AddContentHeader(_) | Action::AddContentFooter(_) | Action::AddWatermark(_)
      )
    })
    .expect("marking action");
  assert!(protect_pos < first_marking);
}

#[test]
fn metadata_removals_cover_old_stamp_and_adds_cover_new() {
  let (handler, _) = handler(false);
  let doc = common::labeled_document(common::internal_label_id(), AssignmentMethod::Standard);

  let result = handler
    .compute_actions(&doc, &common::update_to(common::public_label_id()))
    .unwrap();
  let Some(Action::Metadata { remove, add }) = result.actions().first() else {
    panic!("expected metadata action first");
  };

  let old = common::internal_label_id().to_string();
  let new = common::public_label_id().to_string();
  assert!(remove.iter().all(|k| k.contains(&old)));
  assert!(add.iter().all(|(k, _)| k.contains(&new)));

  // Applying removals before additions leaves exactly the added keys.
  let mut metadata: std::collections::BTreeMap<String, String> = common::labeled_document(
    common::internal_label_id(),
    AssignmentMethod::Standard,
  )
  .metadata
  .metadata(&[], &[]);
  for k in remove {
    metadata.remove(k);
  }
  for (k, v) in add {
    metadata.insert(k.clone(), v.clone());
  }
  assert!(metadata.keys().all(|k| k.contains(&new)));
}

#[test]
fn decision_phase_walks_applied_then_committed() {
  let (handler, dispatcher) = handler(false);
  let doc = common::labeled_document(common::public_label_id(), AssignmentMethod::Standard);
  let app = common::update_to(common::internal_label_id());

  let mut result = handler.compute_actions(&doc, &app).unwrap();
  assert_eq!(result.phase(), DecisionPhase::ActionsComputed);

  // Committing before applying is a caller bug.
  let err = handler.notify_committed_actions(&mut result, &doc, &app).unwrap_err();
  assert!(matches!(err, EngineError::BadInput(_)));

  result.mark_applied().unwrap();
  handler.notify_committed_actions(&mut result, &doc, &app).unwrap();
  assert_eq!(result.phase(), DecisionPhase::Committed);
  assert_eq!(dispatcher.dispatched.load(Ordering::SeqCst), 1);
}

#[test]
fn abandoned_result_cannot_be_applied() {
  let (handler, _) = handler(false);
  let doc = common::document(ContentId::new());
  let mut result = handler
    .compute_actions(&doc, &common::update_to(common::public_label_id()))
    .unwrap();

  result.abandon();
  assert_eq!(result.phase(), DecisionPhase::Abandoned);
  assert!(result.mark_applied().is_err());
}

#[test]
fn get_sensitivity_label_reads_stamp_back() {
  let (handler, _) = handler(false);
  let doc = common::labeled_document(common::confidential_label_id(), AssignmentMethod::Privileged);

  let label = handler.get_sensitivity_label(&doc).unwrap().unwrap();
  assert_eq!(label.label_id, common::confidential_label_id());
  assert_eq!(label.assignment_method, AssignmentMethod::Privileged);
}

#[test]
fn unlabeled_document_has_no_sensitivity_label() {
  let (handler, _) = handler(false);
  let doc = common::document(ContentId::new());
  assert!(handler.get_sensitivity_label(&doc).unwrap().is_none());
}

#[test]
fn same_label_reapply_is_not_a_downgrade() {
  let (handler, _) = handler(true);
  let doc = common::labeled_document(common::internal_label_id(), AssignmentMethod::Standard);
  let app = common::update_to(common::internal_label_id());

  let result = handler.compute_actions(&doc, &app).unwrap();
  assert!(!result.actions().iter().any(|a| matches!(a, Action::Justify)));
  assert!(result
    .actions()
    .iter()
    .any(|a| matches!(a, Action::ApplyLabel { label } if label.label_id == common::internal_label_id())));
}

#[test]
fn intent_enum_shapes() {
  let app = ApplicationActionState::remove(AssignmentMethod::Auto);
  assert!(matches!(app.intent, LabelIntent::Remove { method: AssignmentMethod::Auto }));
}
