use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use seal_engine::domain::error::EngineError;
use seal_engine::domain::types as dt;
use seal_engine::{
  ConsumptionContext, ConsumptionSettings, LicenseStore, PolicyEngine, ProtectionHandler,
  PublishingSettings, RequestTracker,
};

// Licenses published through this FFI surface are cached process-wide so the
// host can consume its own content offline.
static LICENSE_STORE: Lazy<LicenseStore> = Lazy::new(LicenseStore::new);

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum FfiError {
    #[error("{message}")]
    Generic { message: String },
}

impl From<EngineError> for FfiError {
    fn from(e: EngineError) -> Self {
        FfiError::Generic {
            message: e.to_string(),
        }
    }
}

fn bad_input(message: impl Into<String>) -> FfiError {
    FfiError::Generic { message: message.into() }
}

// ===== FFI types mirroring the public Rust API (FFI-friendly) =====

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiCipherMode { Cbc4k, Ecb, Cbc512NoPadding, Cbc4kNoPadding }

impl From<FfiCipherMode> for seal_engine::CipherMode {
    fn from(v: FfiCipherMode) -> Self {
        match v {
            FfiCipherMode::Cbc4k => Self::Cbc4k,
            FfiCipherMode::Ecb => Self::Ecb,
            FfiCipherMode::Cbc512NoPadding => Self::Cbc512NoPadding,
            FfiCipherMode::Cbc4kNoPadding => Self::Cbc4kNoPadding,
        }
    }
}

impl From<seal_engine::CipherMode> for FfiCipherMode {
    fn from(v: seal_engine::CipherMode) -> Self {
        match v {
            seal_engine::CipherMode::Cbc4k => Self::Cbc4k,
            seal_engine::CipherMode::Ecb => Self::Ecb,
            seal_engine::CipherMode::Cbc512NoPadding => Self::Cbc512NoPadding,
            seal_engine::CipherMode::Cbc4kNoPadding => Self::Cbc4kNoPadding,
        }
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiContentFormat { File, Email }

impl From<FfiContentFormat> for dt::ContentFormat {
    fn from(v: FfiContentFormat) -> Self {
        match v { FfiContentFormat::File => Self::File, FfiContentFormat::Email => Self::Email }
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiAssignmentMethod { Standard, Privileged, Auto }

impl From<FfiAssignmentMethod> for dt::AssignmentMethod {
    fn from(v: FfiAssignmentMethod) -> Self {
        match v {
            FfiAssignmentMethod::Standard => Self::Standard,
            FfiAssignmentMethod::Privileged => Self::Privileged,
            FfiAssignmentMethod::Auto => Self::Auto,
        }
    }
}

impl From<dt::AssignmentMethod> for FfiAssignmentMethod {
    fn from(v: dt::AssignmentMethod) -> Self {
        match v {
            dt::AssignmentMethod::Standard => Self::Standard,
            dt::AssignmentMethod::Privileged => Self::Privileged,
            dt::AssignmentMethod::Auto => Self::Auto,
        }
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiMetadataVersionFormat { Default, OneLabelPerTenant }

impl From<FfiMetadataVersionFormat> for dt::MetadataVersionFormat {
    fn from(v: FfiMetadataVersionFormat) -> Self {
        match v {
            FfiMetadataVersionFormat::Default => Self::Default,
            FfiMetadataVersionFormat::OneLabelPerTenant => Self::OneLabelPerTenant,
        }
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiRight { Owner, View, Edit, Print, Extract, Forward, Reply, ReplyAll, Export }

impl From<FfiRight> for dt::Right {
    fn from(v: FfiRight) -> Self {
        match v {
            FfiRight::Owner => Self::Owner,
            FfiRight::View => Self::View,
            FfiRight::Edit => Self::Edit,
            FfiRight::Print => Self::Print,
            FfiRight::Extract => Self::Extract,
            FfiRight::Forward => Self::Forward,
            FfiRight::Reply => Self::Reply,
            FfiRight::ReplyAll => Self::ReplyAll,
            FfiRight::Export => Self::Export,
        }
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiActionKind {
    AddContentFooter,
    AddContentHeader,
    AddWatermark,
    Custom,
    Justify,
    Metadata,
    ProtectAdhoc,
    ProtectByTemplate,
    ProtectDoNotForward,
    RemoveContentFooter,
    RemoveContentHeader,
    RemoveProtection,
    RemoveWatermark,
    ApplyLabel,
    RecommendLabel,
    ProtectAdhocDk,
    ProtectDoNotForwardDk,
    ProtectByEncryptOnly,
}

impl From<FfiActionKind> for dt::ActionKinds {
    fn from(v: FfiActionKind) -> Self {
        match v {
            FfiActionKind::AddContentFooter => Self::ADD_CONTENT_FOOTER,
            FfiActionKind::AddContentHeader => Self::ADD_CONTENT_HEADER,
            FfiActionKind::AddWatermark => Self::ADD_WATERMARK,
            FfiActionKind::Custom => Self::CUSTOM,
            FfiActionKind::Justify => Self::JUSTIFY,
            FfiActionKind::Metadata => Self::METADATA,
            FfiActionKind::ProtectAdhoc => Self::PROTECT_ADHOC,
            FfiActionKind::ProtectByTemplate => Self::PROTECT_BY_TEMPLATE,
            FfiActionKind::ProtectDoNotForward => Self::PROTECT_DO_NOT_FORWARD,
            FfiActionKind::RemoveContentFooter => Self::REMOVE_CONTENT_FOOTER,
            FfiActionKind::RemoveContentHeader => Self::REMOVE_CONTENT_HEADER,
            FfiActionKind::RemoveProtection => Self::REMOVE_PROTECTION,
            FfiActionKind::RemoveWatermark => Self::REMOVE_WATERMARK,
            FfiActionKind::ApplyLabel => Self::APPLY_LABEL,
            FfiActionKind::RecommendLabel => Self::RECOMMEND_LABEL,
            FfiActionKind::ProtectAdhocDk => Self::PROTECT_ADHOC_DK,
            FfiActionKind::ProtectDoNotForwardDk => Self::PROTECT_DO_NOT_FORWARD_DK,
            FfiActionKind::ProtectByEncryptOnly => Self::PROTECT_BY_ENCRYPT_ONLY,
        }
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiMetadataEntry {
    pub key: String,
    pub value: String,
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiContentAlignment { Left, Centered, Right }

impl From<dt::ContentAlignment> for FfiContentAlignment {
    fn from(v: dt::ContentAlignment) -> Self {
        match v {
            dt::ContentAlignment::Left => Self::Left,
            dt::ContentAlignment::Centered => Self::Centered,
            dt::ContentAlignment::Right => Self::Right,
        }
    }
}

#[derive(uniffi::Enum, Debug, Clone, Copy)]
pub enum FfiWatermarkLayout { Horizontal, Diagonal }

impl From<dt::WatermarkLayout> for FfiWatermarkLayout {
    fn from(v: dt::WatermarkLayout) -> Self {
        match v {
            dt::WatermarkLayout::Horizontal => Self::Horizontal,
            dt::WatermarkLayout::Diagonal => Self::Diagonal,
        }
    }
}

/// FFI projection of the engine's action variants.
#[derive(uniffi::Enum, Debug, Clone)]
pub enum FfiAction {
    AddContentHeader { ui_element_name: String, text: String, font_name: String, font_size: u32, font_color: String, alignment: FfiContentAlignment, margin: u32 },
    AddContentFooter { ui_element_name: String, text: String, font_name: String, font_size: u32, font_color: String, alignment: FfiContentAlignment, margin: u32 },
    AddWatermark { ui_element_name: String, text: String, font_name: String, font_size: u32, font_color: String, layout: FfiWatermarkLayout },
    RemoveContentHeader { ui_element_names: Vec<String> },
    RemoveContentFooter { ui_element_names: Vec<String> },
    RemoveWatermark { ui_element_names: Vec<String> },
    Metadata { remove: Vec<String>, add: Vec<FfiMetadataEntry> },
    Justify,
    Custom { name: String, properties: Vec<FfiMetadataEntry> },
    ApplyLabel { label_id: String, method: FfiAssignmentMethod },
    RecommendLabel { label_id: String },
    ProtectByTemplate { template_id: String, double_key_url: Option<String> },
    ProtectAdhoc,
    ProtectAdhocDk,
    ProtectDoNotForward,
    ProtectDoNotForwardDk,
    ProtectByEncryptOnly,
    RemoveProtection,
}

fn entries(map: &BTreeMap<String, String>) -> Vec<FfiMetadataEntry> {
    map
        .iter()
        .map(|(k, v)| FfiMetadataEntry { key: k.clone(), value: v.clone() })
        .collect()
}

impl From<&dt::Action> for FfiAction {
    fn from(a: &dt::Action) -> Self {
        match a {
            dt::Action::AddContentHeader(m) => FfiAction::AddContentHeader {
                ui_element_name: m.ui_element_name.clone(),
                text: m.text.clone(),
                font_name: m.font_name.clone(),
                font_size: m.font_size,
                font_color: m.font_color.clone(),
                alignment: m.alignment.into(),
                margin: m.margin,
            },
            dt::Action::AddContentFooter(m) => FfiAction::AddContentFooter {
                ui_element_name: m.ui_element_name.clone(),
                text: m.text.clone(),
                font_name: m.font_name.clone(),
                font_size: m.font_size,
                font_color: m.font_color.clone(),
                alignment: m.alignment.into(),
                margin: m.margin,
            },
            dt::Action::AddWatermark(w) => FfiAction::AddWatermark {
                ui_element_name: w.ui_element_name.clone(),
                text: w.text.clone(),
                font_name: w.font_name.clone(),
                font_size: w.font_size,
                font_color: w.font_color.clone(),
                layout: w.layout.into(),
            },
            dt::Action::RemoveContentHeader { ui_element_names } => {
                FfiAction::RemoveContentHeader { ui_element_names: ui_element_names.clone() }
            }
            dt::Action::RemoveContentFooter { ui_element_names } => {
                FfiAction::RemoveContentFooter { ui_element_names: ui_element_names.clone() }
            }
            dt::Action::RemoveWatermark { ui_element_names } => {
                FfiAction::RemoveWatermark { ui_element_names: ui_element_names.clone() }
            }
            dt::Action::Metadata { remove, add } => FfiAction::Metadata {
                remove: remove.clone(),
                add: add
                    .iter()
                    .map(|(k, v)| FfiMetadataEntry { key: k.clone(), value: v.clone() })
                    .collect(),
            },
            dt::Action::Justify => FfiAction::Justify,
            dt::Action::Custom { name, properties } => FfiAction::Custom {
                name: name.clone(),
                properties: entries(properties),
            },
            dt::Action::ApplyLabel { label } => FfiAction::ApplyLabel {
                label_id: label.label_id.to_string(),
                method: label.assignment_method.into(),
            },
            dt::Action::RecommendLabel { label_id } => {
                FfiAction::RecommendLabel { label_id: label_id.to_string() }
            }
            dt::Action::ProtectByTemplate { template_id, double_key_url } => {
                FfiAction::ProtectByTemplate {
                    template_id: template_id.to_string(),
                    double_key_url: double_key_url.as_ref().map(|u| u.to_string()),
                }
            }
            dt::Action::ProtectAdhoc => FfiAction::ProtectAdhoc,
            dt::Action::ProtectAdhocDk => FfiAction::ProtectAdhocDk,
            dt::Action::ProtectDoNotForward => FfiAction::ProtectDoNotForward,
            dt::Action::ProtectDoNotForwardDk => FfiAction::ProtectDoNotForwardDk,
            dt::Action::ProtectByEncryptOnly => FfiAction::ProtectByEncryptOnly,
            dt::Action::RemoveProtection => FfiAction::RemoveProtection,
        }
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiEngineSettings {
    pub engine_id: String,
    pub user_email: String,
    pub tenant_id: String,
}

impl From<FfiEngineSettings> for dt::PolicyEngineSettings {
    fn from(v: FfiEngineSettings) -> Self {
        dt::PolicyEngineSettings::new(v.engine_id, dt::Identity::new(v.user_email), v.tenant_id)
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiDocumentState {
    pub content_id: Option<String>,
    pub format: FfiContentFormat,
    pub metadata: Vec<FfiMetadataEntry>,
    pub metadata_format: FfiMetadataVersionFormat,
}

impl TryFrom<FfiDocumentState> for dt::DocumentState {
    type Error = FfiError;
    fn try_from(v: FfiDocumentState) -> Result<Self, Self::Error> {
        let content_id = match v.content_id {
            Some(raw) => dt::ContentId(
                raw.parse().map_err(|_| bad_input(format!("invalid content id: {raw}")))?,
            ),
            None => dt::ContentId::new(),
        };
        let metadata: BTreeMap<String, String> = v
            .metadata
            .into_iter()
            .map(|e| (e.key, e.value))
            .collect();
        let mut doc = dt::DocumentState::new(content_id, v.format.into()).with_metadata(metadata);
        doc.metadata_version = dt::MetadataVersion {
            version: dt::EngineDefaults::METADATA_VERSION,
            format: v.metadata_format.into(),
        };
        Ok(doc)
    }
}

#[derive(uniffi::Enum, Debug, Clone)]
pub enum FfiLabelIntent {
    NoChange,
    Remove { method: FfiAssignmentMethod },
    Update { label_id: String, method: FfiAssignmentMethod },
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiApplicationActionState {
    pub intent: FfiLabelIntent,
    pub is_downgrade_justified: bool,
    pub downgrade_justification: Option<String>,
    pub supported_actions: Vec<FfiActionKind>,
}

impl TryFrom<FfiApplicationActionState> for dt::ApplicationActionState {
    type Error = FfiError;
    fn try_from(v: FfiApplicationActionState) -> Result<Self, Self::Error> {
        let intent = match v.intent {
            FfiLabelIntent::NoChange => dt::LabelIntent::NoChange,
            FfiLabelIntent::Remove { method } => dt::LabelIntent::Remove { method: method.into() },
            FfiLabelIntent::Update { label_id, method } => dt::LabelIntent::Update {
                label_id: dt::LabelId(
                    label_id
                        .parse()
                        .map_err(|_| bad_input(format!("invalid label id: {label_id}")))?,
                ),
                extended_properties: BTreeMap::new(),
                method: method.into(),
            },
        };
        let supported_actions = v
            .supported_actions
            .into_iter()
            .fold(dt::ActionKinds::empty(), |mask, k| mask | k.into());
        Ok(dt::ApplicationActionState {
            intent,
            is_downgrade_justified: v.is_downgrade_justified,
            downgrade_justification: v.downgrade_justification,
            supported_actions,
        })
    }
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiUserRights {
    pub users: Vec<String>,
    pub rights: Vec<FfiRight>,
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiProtectRequest {
    pub owner: String,
    pub name: String,
    pub user_rights: Vec<FfiUserRights>,
    pub is_deprecated_algorithm_preferred: bool,
    pub cipher_mode: Option<FfiCipherMode>,
}

#[derive(uniffi::Record, Debug, Clone)]
pub struct FfiProtectResult {
    pub ciphertext: Vec<u8>,
    pub publishing_license: Vec<u8>,
    pub cipher_mode: FfiCipherMode,
    pub block_size: u64,
    pub content_id: String,
}

// ===== Delegate stubs for the offline-only FFI consumption path =====

struct NullAuthDelegate;

impl seal_engine::AuthDelegate for NullAuthDelegate {
    fn acquire_token(
        &self,
        _identity: &dt::Identity,
        _challenge: &seal_engine::TokenChallenge,
    ) -> Option<String> {
        None
    }
}

struct NullHttpDelegate;

impl seal_engine::HttpDelegate for NullHttpDelegate {
    fn send(&self, _request: seal_engine::HttpRequest) {}
    fn cancel(&self, _id: seal_engine::RequestId) {}
}

fn offline_context(user: &str) -> ConsumptionContext {
    ConsumptionContext {
        identity: dt::Identity::new(user),
        auth: Arc::new(NullAuthDelegate),
        http: Arc::new(NullHttpDelegate),
        tracker: Arc::new(RequestTracker::new()),
    }
}

// ===== High-level API, mirroring Rust surface =====

#[uniffi::export]
pub fn compute_actions_ffi(
    policy_json: Vec<u8>,
    engine_settings: FfiEngineSettings,
    document: FfiDocumentState,
    app_state: FfiApplicationActionState,
) -> Result<Vec<FfiAction>, FfiError> {
    let engine = PolicyEngine::from_policy_json(engine_settings.into(), &policy_json)
        .map_err(FfiError::from)?;
    let dispatcher = Arc::new(InlineDispatcher);
    let handler = engine.policy_handler(dispatcher);
    let doc: dt::DocumentState = document.try_into()?;
    let app: dt::ApplicationActionState = app_state.try_into()?;
    let result = handler.compute_actions(&doc, &app).map_err(FfiError::from)?;
    Ok(result.actions().iter().map(FfiAction::from).collect())
}

#[uniffi::export]
pub fn get_sensitivity_label_ffi(
    policy_json: Vec<u8>,
    engine_settings: FfiEngineSettings,
    document: FfiDocumentState,
) -> Result<Option<String>, FfiError> {
    let engine = PolicyEngine::from_policy_json(engine_settings.into(), &policy_json)
        .map_err(FfiError::from)?;
    let handler = engine.policy_handler(Arc::new(InlineDispatcher));
    let doc: dt::DocumentState = document.try_into()?;
    let label = handler.get_sensitivity_label(&doc).map_err(FfiError::from)?;
    Ok(label.map(|l| l.label_id.to_string()))
}

#[uniffi::export]
pub fn protect_bytes_ffi(request: FfiProtectRequest, plaintext: Vec<u8>) -> Result<FfiProtectResult, FfiError> {
    let user_rights = request
        .user_rights
        .into_iter()
        .map(|ur| dt::UserRights {
            users: ur.users,
            rights: ur.rights.into_iter().map(Into::into).collect(),
        })
        .collect();
    let descriptor = dt::ProtectionDescriptor::from_user_rights(
        request.owner,
        dt::ContentId::new(),
        user_rights,
    )
    .with_name(request.name, String::new());

    let mut settings = PublishingSettings::new(descriptor);
    settings.is_deprecated_algorithm_preferred = request.is_deprecated_algorithm_preferred;
    settings.cipher_mode = request.cipher_mode.map(Into::into);

    let config = dt::ProtectionConfig::secure_default();
    let (ciphertext, handler) =
        seal_engine::protect_bytes(settings, &config, &LICENSE_STORE, &plaintext)
            .map_err(FfiError::from)?;
    Ok(FfiProtectResult {
        ciphertext,
        publishing_license: handler.serialized_publishing_license().map_err(FfiError::from)?,
        cipher_mode: handler.cipher_mode().into(),
        block_size: handler.block_size() as u64,
        content_id: handler.descriptor().content_id.to_string(),
    })
}

/// Offline consumption: a pre-license or a process-local cached license must
/// satisfy the request. Online acquisition stays on the Rust surface where
/// the application can supply its delegates.
#[uniffi::export]
pub fn unprotect_bytes_ffi(
    publishing_license: Vec<u8>,
    pre_license: Option<Vec<u8>>,
    user: String,
    ciphertext: Vec<u8>,
) -> Result<Vec<u8>, FfiError> {
    let mut settings = ConsumptionSettings::new(publishing_license);
    settings.is_offline_only = pre_license.is_none();
    settings.pre_license = pre_license;
    let config = dt::ProtectionConfig::secure_default();
    let ctx = offline_context(&user);
    seal_engine::unprotect_bytes(settings, &config, &LICENSE_STORE, &ctx, &ciphertext)
        .map_err(FfiError::from)
}

#[uniffi::export]
pub fn pre_license_ffi(publishing_license: Vec<u8>, user: String) -> Result<Vec<u8>, FfiError> {
    let license = seal_engine::PublishingLicense::parse(&publishing_license).map_err(FfiError::from)?;
    let mut settings = ConsumptionSettings::new(publishing_license);
    settings.is_offline_only = true;
    settings.delegated_user = Some(license.descriptor.owner.clone());
    let config = dt::ProtectionConfig::secure_default();
    let ctx = offline_context(&license.descriptor.owner);
    let handler = ProtectionHandler::create_consumption(settings, &config, &LICENSE_STORE, &ctx)
        .map_err(FfiError::from)?;
    let pre = handler.pre_license(&user, &LICENSE_STORE).map_err(FfiError::from)?;
    pre.serialize().map_err(FfiError::from)
}

#[uniffi::export]
pub fn protected_content_size_ffi(
    mode: FfiCipherMode,
    unprotected_size: u64,
    includes_final_block: bool,
) -> Result<u64, FfiError> {
    let mode: seal_engine::CipherMode = mode.into();
    mode
        .protected_content_size(unprotected_size, includes_final_block)
        .map_err(FfiError::from)
}

/// Runs dispatched work inline; the FFI decision surface never schedules
/// anything long-running.
struct InlineDispatcher;

impl seal_engine::TaskDispatcher for InlineDispatcher {
    fn dispatch(
        &self,
        task: seal_engine::adapters::dispatch::Task,
        _delay: std::time::Duration,
        _on_independent_thread: bool,
    ) -> seal_engine::TaskId {
        task();
        seal_engine::TaskId(0)
    }

    fn cancel(&self, _id: seal_engine::TaskId) -> bool {
        false
    }

    fn cancel_all(&self) {}
}

uniffi::setup_scaffolding!();
