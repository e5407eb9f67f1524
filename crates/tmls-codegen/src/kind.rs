use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// The language that owns a region of a host document.
///
/// `Template` is the host language itself: block delimiters, comments, and
/// any offset no generated output claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    Template,
    Markup,
    Code,
}

impl LanguageKind {
    /// Embedded languages, in the order their outputs are consulted.
    pub const EMBEDDED: [LanguageKind; 2] = [LanguageKind::Code, LanguageKind::Markup];

    #[must_use]
    pub fn is_embedded(self) -> bool {
        !matches!(self, LanguageKind::Template)
    }

    /// Suffix appended to a host path to name its generated document.
    #[must_use]
    pub fn virtual_suffix(self) -> Option<&'static str> {
        match self {
            LanguageKind::Template => None,
            LanguageKind::Markup => Some("__virtual.html"),
            LanguageKind::Code => Some("__virtual.code"),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LanguageKind::Template => "template",
            LanguageKind::Markup => "markup",
            LanguageKind::Code => "code",
        }
    }
}

impl fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The template constructs recognized in host text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// `{{ expression }}`
    Expression,
    /// `{% statement %}`
    Statement,
    /// `{# comment #}`
    Comment,
}

impl BlockKind {
    #[must_use]
    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            BlockKind::Expression => ("{{", "}}"),
            BlockKind::Statement => ("{%", "%}"),
            BlockKind::Comment => ("{#", "#}"),
        }
    }

    /// The language the block's content belongs to.
    #[must_use]
    pub fn content_language(self) -> LanguageKind {
        match self {
            BlockKind::Expression | BlockKind::Statement => LanguageKind::Code,
            BlockKind::Comment => LanguageKind::Template,
        }
    }
}
