pub mod cipher;
pub mod handler;
pub mod license;

pub use cipher::{CipherMode, ContentKey};
pub use handler::{
  ConsumptionContext, ConsumptionSettings, CustomerKeyProvider, ProtectionHandler,
  PublishingSettings,
};
pub use license::{LicenseStore, PreLicense, PublishingLicense};
