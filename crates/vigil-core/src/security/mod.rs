//! Feed safety: the pattern library, the five-layer redaction engine, and the audit recorder.

pub mod audit;
pub mod identity;
pub mod patterns;
pub mod redaction;

pub use audit::AuditRecorder;
pub use identity::SAFE_ALIAS;
pub use patterns::{Layer, PatternLibrary, PatternRule, ALLOWED_EMAIL_DOMAIN, EXEMPT_IPV4_PREFIXES};
pub use redaction::{RedactionEngine, RedactionOutcome, RedactionReport};
