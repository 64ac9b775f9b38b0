//! Identity protection table (layer 2).
//!
//! The protected identity and its safe alias are compiled in; nothing at runtime alters this table.
//!
//! Rows are ordered longest-form first so the full name wins over the bare first name, and the
//! alias never matches any row, which keeps the layer idempotent.

/// Safe alias substituted for every form of the protected identity.
pub const SAFE_ALIAS: &str = "Warden";

/// One grammatical form of the protected identity.
pub(crate) struct IdentityForm {
    pub label: &'static str,
    pub pattern: &'static str,
    pub replacement: &'static str,
}

pub(crate) const IDENTITY_FORMS: &[IdentityForm] = &[
    // "Morgan Hale", "Morgan Hale's"
    IdentityForm {
        label: "identity:full_name",
        pattern: r"(?i)\bmorgan\s+hale\b",
        replacement: "Warden",
    },
    // "@morgan"
    IdentityForm {
        label: "identity:handle",
        pattern: r"(?i)@morgan\b",
        replacement: "@warden",
    },
    // "Hey Morgan", "thanks, Morgan"
    IdentityForm {
        label: "identity:vocative",
        pattern: r"(?i)\b(hey|hi|hello|thanks|thank you|ok|okay|yo|dear|sorry)(,?\s+)morgan\b",
        replacement: "${1}${2}Warden",
    },
    // "Morgan's"
    IdentityForm {
        label: "identity:possessive",
        pattern: r"(?i)\bmorgan(['’])s\b",
        replacement: "Warden${1}s",
    },
    // "Morgan'll", "Morgan'd", "Morgan're", "Morgan've"
    IdentityForm {
        label: "identity:contraction",
        pattern: r"(?i)\bmorgan(['’](?:ll|d|re|ve))\b",
        replacement: "Warden${1}",
    },
    IdentityForm {
        label: "identity:name",
        pattern: r"(?i)\bmorgan\b",
        replacement: "Warden",
    },
];
