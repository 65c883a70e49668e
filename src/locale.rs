use std::fmt;
use std::str::FromStr;

use isolang::Language;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ResourceError;

/// Locale identifiers
///
/// A `LocaleId` is a language code (ISO 639-1 or ISO 639-2) optionally
/// followed by a region, e.g. `fr`, `en-us` or `pt_BR`. Identifiers are
/// normalized to lower case with `-` as separator, so `en_US` and `en-us`
/// are the same locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocaleId {
    tag: String,
}

/// ISO 639-2/B codes that differ from their ISO 639-2/T form
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

fn lookup_language(code: &str) -> Option<Language> {
    match code.len() {
        2 => Language::from_639_1(code),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == code)
                .map(|(_, t)| *t)
                .unwrap_or(code);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

impl LocaleId {
    /// Parse and validate a locale identifier.
    pub fn new(tag: &str) -> Result<Self, ResourceError> {
        let normalized = tag.trim().replace('_', "-").to_lowercase();
        let mut subtags = normalized.split('-');
        let language = subtags.next().unwrap_or_default();

        if lookup_language(language).is_none() {
            return Err(ResourceError::InvalidLocale(tag.to_string()));
        }
        if subtags.any(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric())) {
            return Err(ResourceError::InvalidLocale(tag.to_string()));
        }

        Ok(Self { tag: normalized })
    }

    /// The normalized identifier
    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// The language part
    pub fn language(&self) -> &str {
        self.tag.split('-').next().unwrap_or(&self.tag)
    }

    /// The region part, if any
    pub fn region(&self) -> Option<&str> {
        self.tag.split('-').nth(1)
    }

    /// English name of the language
    pub fn language_name(&self) -> Option<&'static str> {
        lookup_language(self.language()).map(|l| l.to_name())
    }

    /// Whether both locales share the same language, whatever the region
    /// or code form (`fr`, `fra` and `fre` match).
    pub fn same_language(&self, other: &LocaleId) -> bool {
        match (lookup_language(self.language()), lookup_language(other.language())) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for LocaleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

impl FromStr for LocaleId {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl Serialize for LocaleId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.tag)
    }
}

impl<'de> Deserialize<'de> for LocaleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        LocaleId::new(&tag).map_err(serde::de::Error::custom)
    }
}
