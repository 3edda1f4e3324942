pub mod engine;
pub mod handler;
pub mod metadata;

pub use engine::{PolicyDocument, PolicyEngine, PolicyMetadata, SensitivityType};
pub use handler::PolicyHandler;
