// crates/engine/src/crypto/cipher.rs

//! Block-oriented content ciphers.
//!
//! Content is encrypted in logical blocks ("segments") so applications can
//! read and write protected streams at arbitrary block offsets. CBC modes
//! derive one IV per segment from the segment index, which keeps segments
//! independently addressable. Padded modes finish the stream with PKCS#7 in
//! the final segment; the no-padding modes push alignment onto the caller.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::domain::error::{EngineError, EngineResult};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256EcbEnc = ecb::Encryptor<aes::Aes256>;
type Aes256EcbDec = ecb::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES cipher block size in bytes.
pub const AES_BLOCK: usize = 16;
/// Content key length in bytes (AES-256).
pub const KEY_LEN: usize = 32;

/// Cipher mode identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CipherMode {
  /// 4K segments with internal padding.
  Cbc4k,
  /// Legacy mode, no chaining. Explicit opt-in only.
  Ecb,
  /// 512-byte segments, caller-managed padding.
  Cbc512NoPadding,
  /// 4K segments, caller-managed padding.
  Cbc4kNoPadding,
}

impl CipherMode {
  /// Logical block (segment) size in bytes.
  pub fn block_size(self) -> usize {
    match self {
      CipherMode::Cbc4k | CipherMode::Cbc4kNoPadding => 4096,
      CipherMode::Ecb => AES_BLOCK,
      CipherMode::Cbc512NoPadding => 512,
    }
  }

  /// Whether the final segment is padded by the engine.
  pub fn pads_internally(self) -> bool {
    matches!(self, CipherMode::Cbc4k | CipherMode::Ecb)
  }

  /// Size of the protected form of `unprotected_size` bytes of content.
  ///
  /// Pure function of the mode; must agree with the byte count an actual
  /// encrypt pass produces for the same flags.
  pub fn protected_content_size(
    self,
    unprotected_size: u64,
    includes_final_block: bool,
  ) -> EngineResult<u64> {
    let bs = self.block_size() as u64;
    if self.pads_internally() {
      if includes_final_block {
        Ok(unprotected_size - unprotected_size % AES_BLOCK as u64 + AES_BLOCK as u64)
      } else {
        if unprotected_size % bs != 0 {
          return Err(EngineError::BadInput(format!(
            "non-final content must be a multiple of the {bs}-byte block size"
          )));
        }
        Ok(unprotected_size)
      }
    } else {
      let align = if includes_final_block { AES_BLOCK as u64 } else { bs };
      if unprotected_size % align != 0 {
        return Err(EngineError::BadInput(format!(
          "content must be a multiple of {align} bytes in a no-padding mode"
        )));
      }
      Ok(unprotected_size)
    }
  }
}

/// A 256-bit content encryption key, wiped from memory on drop.
pub struct ContentKey(Zeroizing<[u8; KEY_LEN]>);

impl ContentKey {
  pub fn generate() -> Self {
    let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
    rand::rngs::OsRng.fill_bytes(&mut bytes[..]);
    Self(bytes)
  }

  pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
    Self(Zeroizing::new(bytes))
  }

  pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
    &self.0
  }

  /// Mix a customer-held key into the content key (double-key protection).
  pub(crate) fn mixed_with(&self, customer_key: &[u8; KEY_LEN]) -> EngineResult<ContentKey> {
    let hk = hkdf::Hkdf::<Sha256>::new(Some(customer_key), self.as_bytes());
    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(b"seal double key content key", &mut okm[..])
      .map_err(|e| EngineError::Internal(format!("hkdf expand: {e}")))?;
    Ok(ContentKey(okm))
  }
}

impl Clone for ContentKey {
  fn clone(&self) -> Self {
    Self(Zeroizing::new(*self.0))
  }
}

impl std::fmt::Debug for ContentKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("ContentKey(..)")
  }
}

/// The keyed transform for one piece of content.
#[derive(Debug, Clone)]
pub(crate) struct Transform {
  mode: CipherMode,
  key: ContentKey,
}

impl Transform {
  pub fn new(mode: CipherMode, key: ContentKey) -> Self {
    Self { mode, key }
  }

  pub fn mode(&self) -> CipherMode {
    self.mode
  }

  /// IV for one segment, derived from the segment index under the content
  /// key so segments stay independently addressable.
  fn segment_iv(&self, segment_index: u64) -> EngineResult<[u8; AES_BLOCK]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(self.key.as_bytes())
      .map_err(|e| EngineError::Internal(format!("hmac init: {e}")))?;
    mac.update(&segment_index.to_le_bytes());
    let tag = mac.finalize().into_bytes();
    let mut iv = [0u8; AES_BLOCK];
    iv.copy_from_slice(&tag[..AES_BLOCK]);
    Ok(iv)
  }

  fn validate(&self, offset: u64, len: usize, is_final: bool) -> EngineResult<()> {
    let bs = self.mode.block_size();
    if offset % bs as u64 != 0 {
      return Err(EngineError::BadInput(format!(
        "offset {offset} is not aligned to the {bs}-byte block size"
      )));
    }
    if !is_final && len % bs != 0 {
      return Err(EngineError::BadInput(format!(
        "non-final buffers must be a multiple of the {bs}-byte block size"
      )));
    }
    if is_final && !self.mode.pads_internally() && len % AES_BLOCK != 0 {
      return Err(EngineError::BadInput(format!(
        "final buffer must be a multiple of {AES_BLOCK} bytes in a no-padding mode"
      )));
    }
    Ok(())
  }

  pub fn encrypt(&self, offset: u64, input: &[u8], is_final: bool) -> EngineResult<Vec<u8>> {
    self.validate(offset, input.len(), is_final)?;
    if self.mode == CipherMode::Ecb {
      return self.ecb_encrypt(input, is_final);
    }

    let bs = self.mode.block_size();
    let first_segment = offset / bs as u64;
    let mut out = Vec::with_capacity(input.len() + AES_BLOCK);

    let pad_final = self.mode.pads_internally() && is_final;
    // A stream whose length is an exact multiple of the segment size ends
    // with a pad-only segment, so segment boundaries in the ciphertext stay
    // at multiples of the segment size.
    let mut segments: Vec<&[u8]> = input.chunks(bs).collect();
    if pad_final && input.len() % bs == 0 {
      segments.push(&[]);
    }

    for (i, segment) in segments.iter().enumerate() {
      let iv = self.segment_iv(first_segment + i as u64)?;
      let enc = Aes256CbcEnc::new_from_slices(self.key.as_bytes(), &iv)
        .map_err(|e| EngineError::Internal(format!("cipher init: {e}")))?;
      let last = i + 1 == segments.len();
      if pad_final && last {
        out.extend_from_slice(&enc.encrypt_padded_vec_mut::<Pkcs7>(segment));
      } else {
        out.extend_from_slice(&enc.encrypt_padded_vec_mut::<NoPadding>(segment));
      }
    }
    Ok(out)
  }

  pub fn decrypt(&self, offset: u64, input: &[u8], is_final: bool) -> EngineResult<Vec<u8>> {
    let bs = self.mode.block_size();
    if input.len() % AES_BLOCK != 0 {
      return Err(EngineError::BadInput(format!(
        "ciphertext must be a multiple of {AES_BLOCK} bytes"
      )));
    }
    if offset % bs as u64 != 0 {
      return Err(EngineError::BadInput(format!(
        "offset {offset} is not aligned to the {bs}-byte block size"
      )));
    }
    // Only the final call may carry a partial trailing segment.
    if !is_final && input.len() % bs != 0 {
      return Err(EngineError::BadInput(format!(
        "non-final buffers must be a multiple of the {bs}-byte block size"
      )));
    }
    if self.mode == CipherMode::Ecb {
      return self.ecb_decrypt(input, is_final);
    }

    let first_segment = offset / bs as u64;
    let segments: Vec<&[u8]> = input.chunks(bs).collect();
    let mut out = Vec::with_capacity(input.len());

    for (i, segment) in segments.iter().enumerate() {
      let iv = self.segment_iv(first_segment + i as u64)?;
      let dec = Aes256CbcDec::new_from_slices(self.key.as_bytes(), &iv)
        .map_err(|e| EngineError::Internal(format!("cipher init: {e}")))?;
      let last = i + 1 == segments.len();
      if self.mode.pads_internally() && is_final && last {
        let plain = dec
          .decrypt_padded_vec_mut::<Pkcs7>(segment)
          .map_err(|_| EngineError::BadInput("corrupt padding in final block".to_string()))?;
        out.extend_from_slice(&plain);
      } else {
        let plain = dec
          .decrypt_padded_vec_mut::<NoPadding>(segment)
          .map_err(|_| EngineError::BadInput("misaligned ciphertext block".to_string()))?;
        out.extend_from_slice(&plain);
      }
    }
    Ok(out)
  }

  fn ecb_encrypt(&self, input: &[u8], is_final: bool) -> EngineResult<Vec<u8>> {
    let enc = Aes256EcbEnc::new_from_slice(self.key.as_bytes())
      .map_err(|e| EngineError::Internal(format!("cipher init: {e}")))?;
    if is_final {
      Ok(enc.encrypt_padded_vec_mut::<Pkcs7>(input))
    } else {
      Ok(enc.encrypt_padded_vec_mut::<NoPadding>(input))
    }
  }

  fn ecb_decrypt(&self, input: &[u8], is_final: bool) -> EngineResult<Vec<u8>> {
    let dec = Aes256EcbDec::new_from_slice(self.key.as_bytes())
      .map_err(|e| EngineError::Internal(format!("cipher init: {e}")))?;
    if is_final {
      dec
        .decrypt_padded_vec_mut::<Pkcs7>(input)
        .map_err(|_| EngineError::BadInput("corrupt padding in final block".to_string()))
    } else {
      dec
        .decrypt_padded_vec_mut::<NoPadding>(input)
        .map_err(|_| EngineError::BadInput("misaligned ciphertext block".to_string()))
    }
  }
}
