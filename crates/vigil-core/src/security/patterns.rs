//! Pattern library: the fixed, ordered rule set behind the five redaction layers.
//!
//! Rules are declared as static tables per layer and compiled once into a process-wide
//! [`PatternLibrary`]. Order inside a table matters: earlier rules rewrite the text that later
//! rules see (e.g. connection strings are replaced before the password rule could split them).

use super::identity::IDENTITY_FORMS;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::borrow::Cow;

/// Email domain that may appear on the public feed unredacted.
pub const ALLOWED_EMAIL_DOMAIN: &str = "example.com";

/// IPv4 prefixes that are never treated as infrastructure: loopback, the unspecified block, and
/// the three documentation ranges (TEST-NET-1/2/3).
pub const EXEMPT_IPV4_PREFIXES: &[&str] = &["127.", "0.", "192.0.2.", "198.51.100.", "203.0.113."];

/// One stage of the redaction pipeline. Numeric order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    HardBlocker = 1,
    IdentityProtection = 2,
    SecretDetection = 3,
    InfrastructureScrubbing = 4,
    PiiSanitization = 5,
}

impl Layer {
    pub const ALL: [Layer; 5] = [
        Layer::HardBlocker,
        Layer::IdentityProtection,
        Layer::SecretDetection,
        Layer::InfrastructureScrubbing,
        Layer::PiiSanitization,
    ];

    #[inline]
    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HardBlocker => "hard_blocker",
            Self::IdentityProtection => "identity_protection",
            Self::SecretDetection => "secret_detection",
            Self::InfrastructureScrubbing => "infrastructure_scrubbing",
            Self::PiiSanitization => "pii_sanitization",
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.number() == n)
    }
}

/// What a rule does when it matches.
#[derive(Clone, Copy)]
enum Action {
    /// Suppress the whole message.
    Block,
    /// Replace every match; `$n` / `${n}` expand capture groups.
    Replace(&'static str),
    /// Replace every match for which `exempt` returns false; exempt matches are left untouched.
    ReplaceUnless {
        exempt: fn(&str) -> bool,
        with: &'static str,
    },
}

struct RuleSpec {
    label: &'static str,
    pattern: &'static str,
    action: Action,
}

const fn replace(label: &'static str, pattern: &'static str, with: &'static str) -> RuleSpec {
    RuleSpec {
        label,
        pattern,
        action: Action::Replace(with),
    }
}

const HARD_BLOCKERS: &[RuleSpec] = &[
    RuleSpec {
        label: "blocker:do_not_publish",
        pattern: r"(?i)\[\s*do[\s_-]*not[\s_-]*publish\s*\]",
        action: Action::Block,
    },
    RuleSpec {
        label: "blocker:off_the_record",
        pattern: r"(?i)\[\s*off[\s_-]*the[\s_-]*record\s*\]",
        action: Action::Block,
    },
    RuleSpec {
        label: "blocker:private",
        pattern: r"(?i)\[\s*private\s*\]",
        action: Action::Block,
    },
    RuleSpec {
        label: "blocker:confidential",
        pattern: r"(?i)\[\s*confidential\s*\]",
        action: Action::Block,
    },
    RuleSpec {
        label: "blocker:private_comment",
        pattern: r"(?i)<!--\s*(?:private|do[\s_-]*not[\s_-]*publish)\s*-->",
        action: Action::Block,
    },
    RuleSpec {
        label: "blocker:no_share_tag",
        pattern: r"(?i)#(?:noshare|nopublish)\b",
        action: Action::Block,
    },
];

const SECRET_PATTERNS: &[RuleSpec] = &[
    replace(
        "credential:private_key",
        r"(?s)-----BEGIN [A-Z ]*PRIVATE KEY-----.*?(?:-----END [A-Z ]*PRIVATE KEY-----|\z)",
        "[credential:private_key]",
    ),
    replace(
        "credential:connection_string",
        r#"(?i)\b(?:postgres(?:ql)?|mysql|mariadb|mongodb(?:\+srv)?|rediss?|amqps?)://[^\s"'<>]+"#,
        "[credential:connection_string]",
    ),
    replace(
        "credential:anthropic_key",
        r"\bsk-ant-[A-Za-z0-9_-]{20,}",
        "[credential:anthropic_key]",
    ),
    replace(
        "credential:stripe_key",
        r"\b(?:sk|rk|pk)_(?:live|test)_[A-Za-z0-9]{16,}",
        "[credential:stripe_key]",
    ),
    replace(
        "credential:openai_key",
        r"\bsk-(?:proj-|svcacct-)?[A-Za-z0-9_-]{20,}",
        "[credential:openai_key]",
    ),
    replace(
        "credential:github_token",
        r"\b(?:gh[pousr]_[A-Za-z0-9]{36,}|github_pat_[A-Za-z0-9_]{22,})",
        "[credential:github_token]",
    ),
    replace(
        "credential:aws_access_key",
        r"\b(?:AKIA|ASIA)[0-9A-Z]{16}\b",
        "[credential:aws_access_key]",
    ),
    replace(
        "credential:slack_token",
        r"\bxox[abprs]-[A-Za-z0-9-]{10,}",
        "[credential:slack_token]",
    ),
    replace(
        "credential:google_api_key",
        r"\bAIza[0-9A-Za-z_-]{35}",
        "[credential:google_api_key]",
    ),
    replace(
        "credential:jwt",
        r"\beyJ[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}",
        "[credential:jwt]",
    ),
    replace(
        "credential:bearer_token",
        r"(?i)\b(bearer)\s+[A-Za-z0-9._~+/-]{16,}=*",
        "${1} [credential:bearer_token]",
    ),
    replace(
        "credential:password",
        r#"(?i)\b(passwords?|passwd|passphrase)(\s+(?:is|was)\s*[=:]\s*|\s+(?:is|was)\s+|\s*[=:]\s*)("[^"]*"|'[^']*'|[^\s"',;\[][^\s"',;]*)"#,
        "${1}${2}[credential:password]",
    ),
    // "pwd" is short enough to be followed by the value directly.
    replace(
        "credential:password",
        r#"(?i)\b(pwd)(\s*[=:]\s*|\s+)("[^"]*"|'[^']*'|[^\s"',;\[][^\s"',;]*)"#,
        "${1}${2}[credential:password]",
    ),
    replace(
        "credential:generic_secret",
        r#"(?i)\b(api[_-]?key|secret[_-]?key|client[_-]?secret|access[_-]?token|auth[_-]?token|secret|token)(\s*[:=]\s*)["']?[A-Za-z0-9_\-./+]{12,}["']?"#,
        "${1}${2}[credential:generic_secret]",
    ),
];

const INFRASTRUCTURE_PATTERNS: &[RuleSpec] = &[
    replace(
        "infra:ssh_command",
        r"\bssh(?:\s+-[A-Za-z]+(?:\s+[^\s@-]\S*)?)*\s+[A-Za-z0-9._-]+@[A-Za-z0-9.-]+",
        "ssh [host]",
    ),
    replace(
        "infra:internal_host",
        r"(?i)\b[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.(?:internal|local|lan|corp|intranet)\b",
        "[internal-host]",
    ),
    replace(
        "infra:home_path",
        r#"(?:/home/|/Users/|[A-Za-z]:\\Users\\)[A-Za-z0-9._-]+(?:[/\\][^\s"'<>]*)?"#,
        "[home-path]",
    ),
    RuleSpec {
        label: "infra:ip_address",
        pattern: r"\b(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)(?:\.(?:25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)){3}\b",
        action: Action::ReplaceUnless {
            exempt: is_exempt_ipv4,
            with: "[internal-ip]",
        },
    },
];

const PII_PATTERNS: &[RuleSpec] = &[
    RuleSpec {
        label: "pii:email",
        pattern: r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
        action: Action::ReplaceUnless {
            exempt: is_allowed_email,
            with: "[pii:email]",
        },
    },
    replace("pii:ssn", r"\b\d{3}-\d{2}-\d{4}\b", "[pii:ssn]"),
    replace(
        "pii:card_number",
        r"\b(?:\d{4}[ -]?){3}\d{1,4}\b",
        "[pii:card_number]",
    ),
    replace(
        "pii:phone",
        r"\+\d{1,3}[\s.-]?\(?\d{1,4}\)?(?:[\s.-]?\d{2,4}){2,3}\b",
        "[pii:phone]",
    ),
    replace(
        "pii:phone",
        r"(?:\b1[\s.-])?\(?\b\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}\b",
        "[pii:phone]",
    ),
];

fn is_exempt_ipv4(addr: &str) -> bool {
    EXEMPT_IPV4_PREFIXES.iter().any(|p| addr.starts_with(p))
}

fn is_allowed_email(addr: &str) -> bool {
    addr.rsplit_once('@')
        .map(|(_, domain)| domain.eq_ignore_ascii_case(ALLOWED_EMAIL_DOMAIN))
        .unwrap_or(false)
}

/// A compiled rule.
pub struct PatternRule {
    layer: Layer,
    label: &'static str,
    regex: Regex,
    action: Action,
}

impl std::fmt::Debug for PatternRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatternRule")
            .field("layer", &self.layer)
            .field("label", &self.label)
            .finish()
    }
}

impl PatternRule {
    fn compile(layer: Layer, label: &'static str, pattern: &str, action: Action) -> Self {
        let regex = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("built-in pattern {label} does not compile: {e}"));
        Self {
            layer,
            label,
            regex,
            action,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn is_blocker(&self) -> bool {
        matches!(self.action, Action::Block)
    }

    /// True if applying this rule to `text` would block or change it.
    pub fn fires(&self, text: &str) -> bool {
        match self.action {
            Action::Block | Action::Replace(_) => self.regex.is_match(text),
            Action::ReplaceUnless { exempt, .. } => {
                self.regex.find_iter(text).any(|m| !exempt(m.as_str()))
            }
        }
    }

    /// Rewrites `text`. Blockers never rewrite; callers check [`PatternRule::fires`] first.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match self.action {
            Action::Block => Cow::Borrowed(text),
            Action::Replace(with) => self.regex.replace_all(text, with),
            Action::ReplaceUnless { exempt, with } => {
                self.regex.replace_all(text, |caps: &Captures<'_>| {
                    let m = &caps[0];
                    if exempt(m) {
                        m.to_string()
                    } else {
                        with.to_string()
                    }
                })
            }
        }
    }
}

/// Immutable, ordered rule list for all five layers.
#[derive(Debug)]
pub struct PatternLibrary {
    rules: Vec<PatternRule>,
}

static LIBRARY: Lazy<PatternLibrary> = Lazy::new(PatternLibrary::compile);

impl PatternLibrary {
    /// The process-wide compiled library. Compiled on first use and shared read-only.
    pub fn global() -> &'static PatternLibrary {
        &LIBRARY
    }

    fn compile() -> Self {
        let mut rules = Vec::new();
        for entry in HARD_BLOCKERS {
            rules.push(PatternRule::compile(Layer::HardBlocker, entry.label, entry.pattern, entry.action));
        }
        for form in IDENTITY_FORMS {
            rules.push(PatternRule::compile(
                Layer::IdentityProtection,
                form.label,
                form.pattern,
                Action::Replace(form.replacement),
            ));
        }
        for (layer, entries) in [
            (Layer::SecretDetection, SECRET_PATTERNS),
            (Layer::InfrastructureScrubbing, INFRASTRUCTURE_PATTERNS),
            (Layer::PiiSanitization, PII_PATTERNS),
        ] {
            for entry in entries {
                rules.push(PatternRule::compile(layer, entry.label, entry.pattern, entry.action));
            }
        }
        Self { rules }
    }

    /// All rules in execution order.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Rules belonging to one layer, in execution order.
    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &PatternRule> + '_ {
        self.rules.iter().filter(move |r| r.layer == layer)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_compiles_in_layer_order() {
        let lib = PatternLibrary::global();
        assert!(!lib.is_empty());
        let layers: Vec<u8> = lib.rules().iter().map(|r| r.layer().number()).collect();
        let mut sorted = layers.clone();
        sorted.sort();
        assert_eq!(layers, sorted);
        assert!(lib.layer(Layer::HardBlocker).all(|r| r.is_blocker()));
        assert!(lib
            .rules()
            .iter()
            .filter(|r| r.layer() != Layer::HardBlocker)
            .all(|r| !r.is_blocker()));
    }

    #[test]
    fn exempt_ip_ranges_are_left_alone() {
        let rule = PatternLibrary::global()
            .rules()
            .iter()
            .find(|r| r.label() == "infra:ip_address")
            .unwrap();
        for addr in ["127.0.0.1", "0.0.0.0", "192.0.2.10", "198.51.100.7", "203.0.113.99"] {
            assert!(!rule.fires(addr), "{addr} should be exempt");
            assert_eq!(rule.apply(addr), addr);
        }
        assert!(rule.fires("10.0.0.5"));
        assert_eq!(rule.apply("host 192.168.1.20 up"), "host [internal-ip] up");
    }

    #[test]
    fn allowed_email_domain_is_case_insensitive() {
        assert!(is_allowed_email("press@Example.COM"));
        assert!(!is_allowed_email("press@example.com.evil.io"));
        assert!(!is_allowed_email("nobody"));
    }

    #[test]
    fn layer_numbers_roundtrip() {
        for layer in Layer::ALL {
            assert_eq!(Layer::from_number(layer.number()), Some(layer));
        }
        assert_eq!(Layer::from_number(0), None);
        assert_eq!(Layer::from_number(6), None);
    }
}
