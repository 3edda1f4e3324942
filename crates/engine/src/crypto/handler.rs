// crates/engine/src/crypto/handler.rs

//! Protection handlers: the bound cryptographic transform for one piece of
//! protected content, plus the publishing/consumption settings that create
//! them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use url::Url;

use super::cipher::{CipherMode, ContentKey, Transform, KEY_LEN};
use super::license::{unix_now, LicenseStore, PreLicense, PublishingLicense};
use crate::adapters::auth::{AuthDelegate, TokenChallenge};
use crate::adapters::http::{HttpDelegate, HttpMethod, HttpRequest, RequestTracker};
use crate::adapters::stream::ContentStream;
use crate::domain::error::{EngineError, EngineResult, NetworkCategory};
use crate::domain::types::config::{EngineDefaults, Identity, ProtectionConfig};
use crate::domain::types::protection::{ProtectionDescriptor, Right};

const LICENSE_RESOURCE: &str = "urn:seal:licensing";
const DEFAULT_LICENSE_ENDPOINT: &str = "https://licensing.seal.invalid/issue";

/// Supplies the customer-held half of a double-key protection key.
pub trait CustomerKeyProvider: Send + Sync {
  fn customer_key(&self, url: &Url) -> EngineResult<[u8; KEY_LEN]>;
}

/// Settings for protecting new content.
#[derive(Debug, Clone)]
pub struct PublishingSettings {
  pub descriptor: ProtectionDescriptor,
  /// Explicit opt-in for the deprecated ECB mode, kept only for backwards
  /// compatibility with very old consumers.
  pub is_deprecated_algorithm_preferred: bool,
  /// Whether non-aware applications may open the content with auditing.
  pub is_audited_extraction_allowed: bool,
  /// Acting on behalf of this user rather than the authenticated one.
  pub delegated_user: Option<String>,
  /// Also issue a pre-license to this user at publishing time.
  pub pre_license_user: Option<String>,
  /// Overrides the default cipher mode.
  pub cipher_mode: Option<CipherMode>,
}

impl PublishingSettings {
  pub fn new(descriptor: ProtectionDescriptor) -> Self {
    Self {
      descriptor,
      is_deprecated_algorithm_preferred: false,
      is_audited_extraction_allowed: EngineDefaults::AUDITED_EXTRACTION_ALLOWED,
      delegated_user: None,
      pre_license_user: None,
      cipher_mode: None,
    }
  }
}

/// Settings for consuming existing protected content.
#[derive(Debug, Clone)]
pub struct ConsumptionSettings {
  /// Serialized publishing license found with the content.
  pub publishing_license: Vec<u8>,
  /// Serialized pre-license, when one was issued to this user.
  pub pre_license: Option<Vec<u8>>,
  /// Forbid HTTP entirely; only a cached, unexpired license may satisfy the
  /// request.
  pub is_offline_only: bool,
  pub delegated_user: Option<String>,
}

impl ConsumptionSettings {
  pub fn new(publishing_license: Vec<u8>) -> Self {
    Self {
      publishing_license,
      pre_license: None,
      is_offline_only: EngineDefaults::OFFLINE_ONLY,
      delegated_user: None,
    }
  }
}

/// Delegate bundle for online license acquisition.
#[derive(Clone)]
pub struct ConsumptionContext {
  pub identity: Identity,
  pub auth: Arc<dyn AuthDelegate>,
  pub http: Arc<dyn HttpDelegate>,
  pub tracker: Arc<RequestTracker>,
}

/// The bound cryptographic transform for one piece of protected content.
pub struct ProtectionHandler {
  descriptor: ProtectionDescriptor,
  transform: Transform,
  license: PublishingLicense,
  issued_to: String,
  rights: Vec<Right>,
  encrypt_finalized: AtomicBool,
  decrypt_finalized: AtomicBool,
}

impl std::fmt::Debug for ProtectionHandler {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ProtectionHandler")
      .field("content_id", &self.descriptor.content_id)
      .field("cipher_mode", &self.transform.mode())
      .field("issued_to", &self.issued_to)
      .finish()
  }
}

impl ProtectionHandler {
  /// Create a handler for publishing new content.
  ///
  /// Generates a fresh content key, issues the publishing license, and
  /// registers it with the local store.
  pub fn create_publishing(
    settings: PublishingSettings,
    config: &ProtectionConfig,
    store: &LicenseStore,
  ) -> EngineResult<Self> {
    let mode = match settings.cipher_mode {
      Some(CipherMode::Ecb) if !settings.is_deprecated_algorithm_preferred => {
        return Err(EngineError::BadInput(
          "ECB requires the deprecated-algorithm opt-in".to_string(),
        ));
      }
      Some(mode) => mode,
      None if settings.is_deprecated_algorithm_preferred => CipherMode::Ecb,
      None => EngineDefaults::CIPHER_MODE,
    };

    let descriptor = settings.descriptor;
    let key = ContentKey::generate();
    let effective_key = effective_key(&key, &descriptor, config)?;

    let now = unix_now();
    let mut valid_until = now + config.license_validity().as_secs() as i64;
    if let Some(expiry) = descriptor.content_valid_until {
      valid_until = valid_until.min(expiry);
    }

    let license = PublishingLicense {
      descriptor: descriptor.clone(),
      cipher_mode: mode,
      content_key: PublishingLicense::encode_key(&key),
      issued_at: now,
      valid_until,
      is_audited_extraction_allowed: settings.is_audited_extraction_allowed,
    };
    store.register(license.clone());

    let issued_to = settings
      .delegated_user
      .unwrap_or_else(|| descriptor.owner.clone());
    let rights = descriptor.rights_for(&issued_to);

    tracing::debug!(
      content_id = %descriptor.content_id,
      mode = ?mode,
      "publishing handler created"
    );
    Ok(Self {
      descriptor,
      transform: Transform::new(mode, effective_key),
      license,
      issued_to,
      rights,
      encrypt_finalized: AtomicBool::new(false),
      decrypt_finalized: AtomicBool::new(false),
    })
  }

  /// Create a handler for consuming existing content.
  ///
  /// Offline-only requests are answered from the license store alone and
  /// never touch the HTTP delegate. Online requests acquire a fresh use
  /// license through the auth and HTTP delegates and cache it.
  pub fn create_consumption(
    settings: ConsumptionSettings,
    config: &ProtectionConfig,
    store: &LicenseStore,
    ctx: &ConsumptionContext,
  ) -> EngineResult<Self> {
    let user = settings
      .delegated_user
      .clone()
      .unwrap_or_else(|| ctx.identity.email.clone());

    let (license, rights) = if let Some(pre_bytes) = &settings.pre_license {
      let pre = PreLicense::parse(pre_bytes)?;
      if !pre.issued_to.eq_ignore_ascii_case(&user) {
        return Err(EngineError::AccessDenied(format!(
          "pre-license was issued to {}",
          pre.issued_to
        )));
      }
      if pre.license.is_expired(unix_now()) {
        return Err(EngineError::AccessDenied("license has expired".to_string()));
      }
      store.register(pre.license.clone());
      (pre.license, pre.rights)
    } else {
      let published = PublishingLicense::parse(&settings.publishing_license)?;
      if settings.is_offline_only {
        // Hard boundary: no cached license means failure, not a fetch.
        let cached = store
          .find_unexpired(published.content_id(), unix_now())
          .ok_or(EngineError::Network {
            category: NetworkCategory::Offline,
            http_status: None,
          })?;
        let rights = grants_for(&cached.descriptor, &user)?;
        (cached, rights)
      } else {
        let refreshed = acquire_use_license(&published, &user, config, ctx)?;
        let rights = grants_for(&refreshed.descriptor, &user)?;
        store.register(refreshed.clone());
        (refreshed, rights)
      }
    };

    let key = license.content_key()?;
    let effective_key = effective_key(&key, &license.descriptor, config)?;

    tracing::debug!(
      content_id = %license.content_id(),
      mode = ?license.cipher_mode,
      user = %user,
      "consumption handler created"
    );
    Ok(Self {
      descriptor: license.descriptor.clone(),
      transform: Transform::new(license.cipher_mode, effective_key),
      issued_to: user,
      rights,
      license,
      encrypt_finalized: AtomicBool::new(false),
      decrypt_finalized: AtomicBool::new(false),
    })
  }

  pub fn descriptor(&self) -> &ProtectionDescriptor {
    &self.descriptor
  }

  pub fn cipher_mode(&self) -> CipherMode {
    self.transform.mode()
  }

  /// Logical block size (in bytes) for the handler's cipher mode.
  pub fn block_size(&self) -> usize {
    self.transform.mode().block_size()
  }

  pub fn issued_user(&self) -> &str {
    &self.issued_to
  }

  pub fn owner(&self) -> &str {
    &self.descriptor.owner
  }

  pub fn granted_rights(&self) -> &[Right] {
    &self.rights
  }

  pub fn has_right(&self, right: Right) -> bool {
    self.rights.contains(&Right::Owner) || self.rights.contains(&right)
  }

  pub fn access_check(&self, right: Right) -> EngineResult<()> {
    if self.has_right(right) {
      Ok(())
    } else {
      Err(EngineError::AccessDenied(format!(
        "{} lacks the {right:?} right",
        self.issued_to
      )))
    }
  }

  /// Size of the protected form of `unprotected_size` bytes.
  ///
  /// Call before allocating output buffers; consistent with the byte count
  /// `encrypt_buffer` produces for the same flags.
  pub fn protected_content_size(
    &self,
    unprotected_size: u64,
    includes_final_block: bool,
  ) -> EngineResult<u64> {
    self
      .transform
      .mode()
      .protected_content_size(unprotected_size, includes_final_block)
  }

  /// Encrypt a buffer at the given plaintext offset.
  ///
  /// Offsets are multiples of the block size and may arrive out of order;
  /// exactly one call may set `is_final`, after which the encrypt side of
  /// the stream is closed.
  pub fn encrypt_buffer(&self, offset: u64, input: &[u8], is_final: bool) -> EngineResult<Vec<u8>> {
    if self.encrypt_finalized.load(Ordering::Acquire) {
      return Err(EngineError::BadInput(
        "encrypt stream already finalized".to_string(),
      ));
    }
    let out = self.transform.encrypt(offset, input, is_final)?;
    if is_final {
      self.encrypt_finalized.store(true, Ordering::Release);
    }
    Ok(out)
  }

  /// Decrypt a buffer at the given ciphertext offset. Same sequencing
  /// contract as `encrypt_buffer`.
  pub fn decrypt_buffer(&self, offset: u64, input: &[u8], is_final: bool) -> EngineResult<Vec<u8>> {
    self.access_check(Right::View)?;
    if self.decrypt_finalized.load(Ordering::Acquire) {
      return Err(EngineError::BadInput(
        "decrypt stream already finalized".to_string(),
      ));
    }
    let out = self.transform.decrypt(offset, input, is_final)?;
    if is_final {
      self.decrypt_finalized.store(true, Ordering::Release);
    }
    Ok(out)
  }

  /// Drive a whole plaintext stream through the cipher into `output`.
  /// Returns the number of protected bytes written.
  pub fn encrypt_stream(
    &self,
    input: &mut dyn ContentStream,
    output: &mut dyn ContentStream,
  ) -> EngineResult<u64> {
    let chunk = self.block_size() * 64;
    let mut buf = vec![0u8; chunk];
    let mut offset = 0u64;
    let mut written = 0u64;
    loop {
      let n = input.read_exact_or_eof(&mut buf)?;
      let is_final = n < chunk;
      let out = self.encrypt_buffer(offset, &buf[..n], is_final)?;
      output.write_all(&out)?;
      written += out.len() as u64;
      offset += n as u64;
      if is_final {
        break;
      }
    }
    output.flush()?;
    Ok(written)
  }

  /// Inverse of `encrypt_stream`. Returns the number of plaintext bytes
  /// written.
  pub fn decrypt_stream(
    &self,
    input: &mut dyn ContentStream,
    output: &mut dyn ContentStream,
  ) -> EngineResult<u64> {
    let chunk = self.block_size() * 64;
    let mut buf = vec![0u8; chunk];
    let mut offset = 0u64;
    let mut written = 0u64;
    loop {
      let n = input.read_exact_or_eof(&mut buf)?;
      let is_final = n < chunk;
      let out = self.decrypt_buffer(offset, &buf[..n], is_final)?;
      output.write_all(&out)?;
      written += out.len() as u64;
      offset += n as u64;
      if is_final {
        break;
      }
    }
    output.flush()?;
    Ok(written)
  }

  pub fn publishing_license(&self) -> &PublishingLicense {
    &self.license
  }

  pub fn serialized_publishing_license(&self) -> EngineResult<Vec<u8>> {
    self.license.serialize()
  }

  /// Issue a pre-license so `user` can consume this content offline.
  ///
  /// The content's license must still be registered with the local store.
  pub fn pre_license(&self, user: &str, store: &LicenseStore) -> EngineResult<PreLicense> {
    if !store.is_registered(self.descriptor.content_id) {
      return Err(EngineError::LicenseNotRegistered);
    }
    let rights = grants_for(&self.descriptor, user)?;
    Ok(PreLicense {
      issued_to: user.to_string(),
      rights,
      license: self.license.clone(),
    })
  }
}

/// Rights granted to `user`, or the matching error when there are none.
fn grants_for(descriptor: &ProtectionDescriptor, user: &str) -> EngineResult<Vec<Right>> {
  let rights = descriptor.rights_for(user);
  if rights.is_empty() {
    return Err(EngineError::NoPermissions {
      owner: Some(descriptor.owner.clone()),
      referrer: descriptor.referrer.as_ref().map(|u| u.to_string()),
    });
  }
  Ok(rights)
}

/// Resolve the key content is actually ciphered under, mixing in the
/// customer-held key for double-key descriptors.
fn effective_key(
  key: &ContentKey,
  descriptor: &ProtectionDescriptor,
  config: &ProtectionConfig,
) -> EngineResult<ContentKey> {
  let Some(dk_url) = &descriptor.double_key_url else {
    return Ok(key.clone());
  };
  if !config.double_key_enabled {
    return Err(EngineError::DoubleKeyDisabled);
  }
  let provider = config
    .customer_key_provider
    .as_ref()
    .ok_or_else(|| EngineError::CustomerKeyUnavailable(dk_url.to_string()))?;
  let customer_key = provider.customer_key(dk_url)?;
  key.mixed_with(&customer_key)
}

/// Fetch a fresh use license through the application's delegates.
fn acquire_use_license(
  published: &PublishingLicense,
  user: &str,
  config: &ProtectionConfig,
  ctx: &ConsumptionContext,
) -> EngineResult<PublishingLicense> {
  if published.is_expired(unix_now()) {
    return Err(EngineError::AccessDenied("content has expired".to_string()));
  }
  // Check grants locally first so a user with no permissions fails fast
  // instead of burning a round trip.
  grants_for(&published.descriptor, user)?;

  let endpoint = match &published.descriptor.referrer {
    Some(url) => url.clone(),
    None => Url::parse(DEFAULT_LICENSE_ENDPOINT)
      .map_err(|e| EngineError::Internal(format!("default endpoint: {e}")))?,
  };

  let challenge = TokenChallenge {
    authority: endpoint.origin().ascii_serialization(),
    resource: LICENSE_RESOURCE.to_string(),
    scope: "user_impersonation".to_string(),
  };
  let token = ctx
    .auth
    .acquire_token(&ctx.identity, &challenge)
    .ok_or(EngineError::NoAuthToken)?;

  let (id, rx) = ctx.tracker.begin();
  let mut headers = std::collections::BTreeMap::new();
  headers.insert("Authorization".to_string(), format!("Bearer {token}"));
  headers.insert("Content-Type".to_string(), "application/json".to_string());
  ctx.http.send(HttpRequest {
    id,
    method: HttpMethod::Post,
    url: endpoint,
    headers,
    body: published.serialize()?,
  });
  let response = ctx
    .tracker
    .await_response(id, &rx, config.http_timeout(), ctx.http.as_ref())?;

  match response.status {
    200 => PublishingLicense::parse(&response.body),
    401 => Err(EngineError::NoAuthToken),
    status => Err(EngineError::Network {
      category: NetworkCategory::FailureResponse,
      http_status: Some(status),
    }),
  }
}
