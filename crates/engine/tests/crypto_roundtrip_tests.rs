mod common;

use std::io::Cursor;

use seal_engine as se;
use se::{
  CipherMode, ConsumptionSettings, EngineError, LicenseStore, ProtectionConfig,
  ProtectionHandler, PublishingSettings,
};

fn publishing_handler(mode: CipherMode) -> ProtectionHandler {
  let descriptor = common::descriptor_for("owner@contoso.example", "bob@contoso.example");
  let mut settings = PublishingSettings::new(descriptor);
  settings.cipher_mode = Some(mode);
  settings.is_deprecated_algorithm_preferred = mode == CipherMode::Ecb;
  ProtectionHandler::create_publishing(
    settings,
    &ProtectionConfig::secure_default(),
    &LicenseStore::new(),
  )
  .unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
  (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn roundtrip_padded_modes_across_sizes() {
  for mode in [CipherMode::Cbc4k, CipherMode::Ecb] {
    let block = mode.block_size();
    for len in [0, 1, block - 1, block, block + 1, 10 * block + 7] {
      let handler = publishing_handler(mode);
      let plain = pattern(len);
      let cipher = handler.encrypt_buffer(0, &plain, true).unwrap();
      let roundtrip = handler.decrypt_buffer(0, &cipher, true).unwrap();
      assert_eq!(roundtrip, plain, "mode {mode:?}, len {len}");
    }
  }
}

#[test]
fn roundtrip_no_padding_modes_on_aligned_sizes() {
  for mode in [CipherMode::Cbc512NoPadding, CipherMode::Cbc4kNoPadding] {
    let block = mode.block_size();
    for len in [0, block, 10 * block, block + 16] {
      let handler = publishing_handler(mode);
      let plain = pattern(len);
      let cipher = handler.encrypt_buffer(0, &plain, true).unwrap();
      assert_eq!(cipher.len(), plain.len(), "no-padding modes preserve size");
      let roundtrip = handler.decrypt_buffer(0, &cipher, true).unwrap();
      assert_eq!(roundtrip, plain, "mode {mode:?}, len {len}");
    }
  }
}

#[test]
fn no_padding_modes_reject_unaligned_final_buffers() {
  for mode in [CipherMode::Cbc512NoPadding, CipherMode::Cbc4kNoPadding] {
    let handler = publishing_handler(mode);
    let err = handler.encrypt_buffer(0, &pattern(21), true).unwrap_err();
    assert!(matches!(err, EngineError::BadInput(_)), "mode {mode:?}");
  }
}

#[test]
fn protected_content_size_matches_actual_output() {
  for mode in [
    CipherMode::Cbc4k,
    CipherMode::Ecb,
    CipherMode::Cbc512NoPadding,
    CipherMode::Cbc4kNoPadding,
  ] {
    let block = mode.block_size();
    let sizes: &[usize] = if mode.pads_internally() {
      &[0, 1, 4095, 4096, 4097, 10 * 4096 + 7]
    } else {
      &[0, 16, 512, 4096, 8192]
    };
    for &len in sizes {
      if len % block != 0 && !mode.pads_internally() && len % 16 != 0 {
        continue;
      }
      let handler = publishing_handler(mode);
      let predicted = handler.protected_content_size(len as u64, true).unwrap();
      let actual = handler.encrypt_buffer(0, &pattern(len), true).unwrap().len() as u64;
      assert_eq!(predicted, actual, "mode {mode:?}, len {len}");
    }
  }
}

#[test]
fn protected_content_size_is_identity_for_non_final_full_blocks() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  assert_eq!(handler.protected_content_size(8192, false).unwrap(), 8192);
  assert!(handler.protected_content_size(8191, false).is_err());
}

#[test]
fn out_of_order_block_writes_decrypt_correctly() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  let block = handler.block_size();
  let plain = pattern(3 * block);

  // Encrypt the middle segment first, then the edges.
  let c1 = handler.encrypt_buffer(block as u64, &plain[block..2 * block], false).unwrap();
  let c0 = handler.encrypt_buffer(0, &plain[..block], false).unwrap();
  let c2 = handler.encrypt_buffer(2 * block as u64, &plain[2 * block..], true).unwrap();

  let mut cipher = Vec::new();
  cipher.extend_from_slice(&c0);
  cipher.extend_from_slice(&c1);
  cipher.extend_from_slice(&c2);

  let roundtrip = handler.decrypt_buffer(0, &cipher, true).unwrap();
  assert_eq!(roundtrip, plain);
}

#[test]
fn random_access_decrypt_of_one_segment() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  let block = handler.block_size();
  let plain = pattern(4 * block);
  let cipher = handler.encrypt_buffer(0, &plain, false).unwrap();

  let middle = handler
    .decrypt_buffer(2 * block as u64, &cipher[2 * block..3 * block], false)
    .unwrap();
  assert_eq!(middle, &plain[2 * block..3 * block]);
}

#[test]
fn misaligned_offset_is_rejected() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  let err = handler.encrypt_buffer(100, &pattern(4096), false).unwrap_err();
  assert!(matches!(err, EngineError::BadInput(_)));
}

#[test]
fn second_final_call_is_rejected() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  handler.encrypt_buffer(0, b"final bytes", true).unwrap();
  let err = handler.encrypt_buffer(4096, b"more", true).unwrap_err();
  assert!(matches!(err, EngineError::BadInput(_)));
}

#[test]
fn non_final_partial_block_is_rejected() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  let err = handler.encrypt_buffer(0, &pattern(1000), false).unwrap_err();
  assert!(matches!(err, EngineError::BadInput(_)));
}

#[test]
fn ecb_requires_deprecated_opt_in() {
  let descriptor = common::descriptor_for("owner@contoso.example", "bob@contoso.example");
  let mut settings = PublishingSettings::new(descriptor);
  settings.cipher_mode = Some(CipherMode::Ecb);
  settings.is_deprecated_algorithm_preferred = false;

  let err = ProtectionHandler::create_publishing(
    settings,
    &ProtectionConfig::secure_default(),
    &LicenseStore::new(),
  )
  .unwrap_err();
  assert!(matches!(err, EngineError::BadInput(_)));
}

#[test]
fn deprecated_preference_selects_ecb_by_default() {
  let descriptor = common::descriptor_for("owner@contoso.example", "bob@contoso.example");
  let mut settings = PublishingSettings::new(descriptor);
  settings.is_deprecated_algorithm_preferred = true;

  let handler = ProtectionHandler::create_publishing(
    settings,
    &ProtectionConfig::secure_default(),
    &LicenseStore::new(),
  )
  .unwrap();
  assert_eq!(handler.cipher_mode(), CipherMode::Ecb);
}

#[test]
fn default_mode_is_cbc4k_with_4096_block() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  assert_eq!(handler.cipher_mode(), CipherMode::Cbc4k);
  assert_eq!(handler.block_size(), 4096);
}

#[test]
fn different_handlers_produce_different_ciphertext() {
  let a = publishing_handler(CipherMode::Cbc4k);
  let b = publishing_handler(CipherMode::Cbc4k);
  let plain = pattern(4096);
  let ca = a.encrypt_buffer(0, &plain, true).unwrap();
  let cb = b.encrypt_buffer(0, &plain, true).unwrap();
  assert_ne!(ca, cb, "content keys are fresh per publish");
}

#[test]
fn identical_segments_differ_within_one_stream() {
  let handler = publishing_handler(CipherMode::Cbc4k);
  let block = handler.block_size();
  let plain = vec![0x5a; 2 * block];
  let cipher = handler.encrypt_buffer(0, &plain, false).unwrap();
  assert_ne!(
    &cipher[..block],
    &cipher[block..],
    "per-segment IVs must differ"
  );
}

#[test]
fn stream_roundtrip_through_cursors() {
  let store = LicenseStore::new();
  let descriptor = common::descriptor_for("owner@contoso.example", "bob@contoso.example");
  let settings = PublishingSettings::new(descriptor);
  let handler = ProtectionHandler::create_publishing(
    settings,
    &ProtectionConfig::secure_default(),
    &store,
  )
  .unwrap();

  let plain = pattern(300_000); // spans several stream chunks, unaligned tail
  let mut input = Cursor::new(plain.clone());
  let mut protected = Cursor::new(Vec::new());
  let written = handler.encrypt_stream(&mut input, &mut protected).unwrap();
  assert_eq!(written as usize, protected.get_ref().len());

  // Consume through a second handler created from the cached license.
  let license = handler.serialized_publishing_license().unwrap();
  let mut settings = ConsumptionSettings::new(license);
  settings.is_offline_only = true;
  settings.delegated_user = Some("bob@contoso.example".to_string());
  let tracker = std::sync::Arc::new(se::RequestTracker::new());
  let http = std::sync::Arc::new(common::CountingHttpDelegate::default());
  let consumer = ProtectionHandler::create_consumption(
    settings,
    &ProtectionConfig::secure_default(),
    &store,
    &common::consumption_context("bob@contoso.example", http, tracker),
  )
  .unwrap();

  let mut protected_in = Cursor::new(protected.into_inner());
  let mut out = Cursor::new(Vec::new());
  consumer.decrypt_stream(&mut protected_in, &mut out).unwrap();
  assert_eq!(out.into_inner(), plain);
}
