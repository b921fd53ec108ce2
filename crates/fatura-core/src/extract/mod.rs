//! Multi-pass extraction against the completion service.

mod orchestrator;
pub mod payload;
pub mod prompts;

pub use orchestrator::{
    matches_section_signature, ExtractionDraft, IdResolution, Orchestrator, PassPlan,
};
pub use payload::{recover_json, RawExtraction};
