#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use seal_engine as se;
use se::domain::policy::metadata;
use se::{
  ApplicationActionState, AssignmentMethod, ContentFormat, ContentId, ContentLabel,
  DocumentState, Identity, LabelId, PolicyEngine, PolicyEngineSettings, TaskDispatcher, TaskId,
  TokenChallenge,
};

pub const TENANT: &str = "11111111-2222-3333-4444-555555555555";

pub fn public_label_id() -> LabelId {
  LabelId("00000000-0000-0000-0000-000000000001".parse().unwrap())
}

pub fn internal_label_id() -> LabelId {
  LabelId("00000000-0000-0000-0000-000000000002".parse().unwrap())
}

pub fn confidential_label_id() -> LabelId {
  LabelId("00000000-0000-0000-0000-000000000003".parse().unwrap())
}

pub fn retired_label_id() -> LabelId {
  LabelId("00000000-0000-0000-0000-000000000004".parse().unwrap())
}

pub fn template_id() -> se::TemplateId {
  se::TemplateId("99999999-0000-0000-0000-000000000001".parse().unwrap())
}

/// Four-label tenant policy: Public < Internal < Confidential, plus a
/// disabled "Retired" label. Confidential mandates markings and template
/// protection.
pub fn policy_json(justification_required: bool) -> Vec<u8> {
  let doc = serde_json::json!({
    "metadata": {
      "policy_file_id": "policy-file-1",
      "sensitivity_file_id": "sensitivity-file-1",
      "last_fetch_time": 1_700_000_000,
      "more_info_url": "https://contoso.example/labels",
      "is_labeling_required": true,
      "is_downgrade_justification_required": justification_required,
      "supported_formats": ["File", "Email"]
    },
    "labels": [
      {
        "id": public_label_id().0,
        "name": "Public",
        "sensitivity": 0,
        "tooltip": "Anyone may see this."
      },
      {
        "id": internal_label_id().0,
        "name": "Internal",
        "sensitivity": 5,
        "tooltip": "Company internal."
      },
      {
        "id": confidential_label_id().0,
        "name": "Confidential",
        "sensitivity": 10,
        "tooltip": "Restricted distribution.",
        "markings": {
          "header": { "ui_element_name": "hdr-conf", "text": "CONFIDENTIAL" },
          "footer": { "ui_element_name": "ftr-conf", "text": "CONFIDENTIAL", "alignment": "Right" },
          "watermark": { "ui_element_name": "wm-conf", "text": "CONFIDENTIAL" }
        },
        "protection": { "template_id": template_id().0 }
      },
      {
        "id": retired_label_id().0,
        "name": "Retired",
        "sensitivity": 7,
        "is_active": false
      }
    ],
    "sensitivity_types": [
      { "id": "st-credit-card", "name": "Credit card number", "rule_package": "builtin" }
    ]
  });
  serde_json::to_vec(&doc).unwrap()
}

pub fn engine_settings() -> PolicyEngineSettings {
  PolicyEngineSettings::new("engine-1", Identity::new("alice@contoso.example"), TENANT)
}

pub fn engine(justification_required: bool) -> Arc<PolicyEngine> {
  PolicyEngine::from_policy_json(engine_settings(), &policy_json(justification_required)).unwrap()
}

/// Dispatcher that runs tasks inline and counts them, so tests can assert
/// audit work was handed off.
#[derive(Default)]
pub struct RecordingDispatcher {
  pub dispatched: AtomicUsize,
}

impl TaskDispatcher for RecordingDispatcher {
  fn dispatch(
    &self,
    task: se::adapters::dispatch::Task,
    _delay: Duration,
    _on_independent_thread: bool,
  ) -> TaskId {
    self.dispatched.fetch_add(1, Ordering::SeqCst);
    task();
    TaskId(self.dispatched.load(Ordering::SeqCst) as u64)
  }

  fn cancel(&self, _id: TaskId) -> bool {
    false
  }

  fn cancel_all(&self) {}
}

pub fn document(content_id: ContentId) -> DocumentState {
  DocumentState::new(content_id, ContentFormat::File)
}

/// Document whose metadata already carries a stamp for `label_id`.
pub fn labeled_document(label_id: LabelId, method: AssignmentMethod) -> DocumentState {
  let mut content_label = ContentLabel::new(label_id, method);
  content_label.creation_time = 1_700_000_100;
  let entries: BTreeMap<String, String> = metadata::stamp_entries(
    &content_label,
    TENANT,
    se::MetadataVersionFormat::Default,
  )
  .into_iter()
  .collect();
  document(ContentId::new()).with_metadata(entries)
}

pub fn update_to(label_id: LabelId) -> ApplicationActionState {
  ApplicationActionState::update(label_id, AssignmentMethod::Standard)
}

// ===== Protection fixtures =====

pub struct StaticAuth(pub Option<String>);

impl se::AuthDelegate for StaticAuth {
  fn acquire_token(&self, _identity: &Identity, _challenge: &TokenChallenge) -> Option<String> {
    self.0.clone()
  }
}

/// HTTP delegate that echoes the request body back as a 200 from another
/// thread, and records every send.
pub struct EchoHttpDelegate {
  pub tracker: Arc<se::RequestTracker>,
  pub sends: Mutex<Vec<se::HttpRequest>>,
}

impl EchoHttpDelegate {
  pub fn new(tracker: Arc<se::RequestTracker>) -> Self {
    Self {
      tracker,
      sends: Mutex::new(Vec::new()),
    }
  }
}

impl se::HttpDelegate for EchoHttpDelegate {
  fn send(&self, request: se::HttpRequest) {
    self.sends.lock().unwrap().push(request.clone());
    let tracker = Arc::clone(&self.tracker);
    std::thread::spawn(move || {
      let _ = tracker.notify_response(se::HttpResponse {
        id: request.id,
        status: 200,
        headers: BTreeMap::new(),
        body: request.body,
      });
    });
  }

  fn cancel(&self, _id: se::RequestId) {}
}

/// HTTP delegate that must never be reached.
#[derive(Default)]
pub struct CountingHttpDelegate {
  pub sends: AtomicUsize,
}

impl se::HttpDelegate for CountingHttpDelegate {
  fn send(&self, _request: se::HttpRequest) {
    self.sends.fetch_add(1, Ordering::SeqCst);
  }

  fn cancel(&self, _id: se::RequestId) {}
}

pub fn consumption_context(
  user: &str,
  http: Arc<dyn se::HttpDelegate>,
  tracker: Arc<se::RequestTracker>,
) -> se::ConsumptionContext {
  se::ConsumptionContext {
    identity: Identity::new(user),
    auth: Arc::new(StaticAuth(Some("token-1".to_string()))),
    http,
    tracker,
  }
}

pub fn descriptor_for(owner: &str, viewer: &str) -> se::ProtectionDescriptor {
  se::ProtectionDescriptor::from_user_rights(
    owner,
    ContentId::new(),
    vec![se::UserRights {
      users: vec![viewer.to_string()],
      rights: vec![se::Right::View, se::Right::Reply],
    }],
  )
}
