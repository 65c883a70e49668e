/*!
 * Inline codes.
 *
 * A `Code` is one span of non-translatable markup embedded in translatable
 * text (for example `<b>`, `</b>` or `<br/>`). The coded text of a
 * `TextFragment` holds a marker pair in place of each code and the code
 * itself lives in the fragment's side list.
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::ResourceError;

/// Role of a code inside the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagType {
    /// Start of a paired span (e.g. `<b>`)
    Opening,
    /// End of a paired span (e.g. `</b>`)
    Closing,
    /// Standalone code with no partner (e.g. `<br/>`)
    Placeholder,
}

impl TagType {
    fn as_storage_char(self) -> char {
        match self {
            TagType::Opening => 'O',
            TagType::Closing => 'C',
            TagType::Placeholder => 'P',
        }
    }

    fn from_storage_char(c: char) -> Option<Self> {
        match c {
            'O' => Some(TagType::Opening),
            'C' => Some(TagType::Closing),
            'P' => Some(TagType::Placeholder),
            _ => None,
        }
    }
}

/// One embedded markup span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    /// Identifier, stable within one fragment. Opening and closing codes of
    /// the same span share it.
    pub id: i32,

    /// Role of the code
    pub tag_type: TagType,

    /// Logical grouping key (e.g. "b")
    pub tag_name: String,

    /// Original markup to re-emit verbatim
    pub data: String,

    /// Markup of the code in the output format when it differs from `data`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub outer_data: String,

    /// Whether `data` holds a reference to another resource
    #[serde(default)]
    pub has_reference: bool,

    /// Whether a translator may delete the code
    #[serde(default)]
    pub deletable: bool,

    /// Whether a translator may duplicate the code
    #[serde(default)]
    pub cloneable: bool,

    /// Position used when codes are reordered (bidi); -1 when unset
    #[serde(default = "default_display_order")]
    pub display_order: i32,

    /// Opaque inline annotations attached to the code
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

fn default_display_order() -> i32 {
    -1
}

impl Code {
    /// Create a new code. The id is assigned when the code is appended to a fragment.
    pub fn new(tag_type: TagType, tag_name: &str, data: &str) -> Self {
        Self {
            id: -1,
            tag_type,
            tag_name: tag_name.to_string(),
            data: data.to_string(),
            outer_data: String::new(),
            has_reference: false,
            deletable: false,
            cloneable: false,
            display_order: default_display_order(),
            annotations: BTreeMap::new(),
        }
    }

    /// Set the id.
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    /// Set the deletable and cloneable flags.
    pub fn with_flags(mut self, deletable: bool, cloneable: bool) -> Self {
        self.deletable = deletable;
        self.cloneable = cloneable;
        self
    }

    /// Whether the code carries any annotation.
    pub fn has_annotation(&self) -> bool {
        !self.annotations.is_empty()
    }

    /// Set an inline annotation.
    pub fn set_annotation(&mut self, name: &str, value: &str) {
        self.annotations.insert(name.to_string(), value.to_string());
    }

    /// Markup to emit when writing the code back out.
    pub fn output_data(&self) -> &str {
        if self.outer_data.is_empty() {
            &self.data
        } else {
            &self.outer_data
        }
    }

    /// Whether two codes are the same logical tag (raw data is ignored).
    pub fn same_tag(&self, other: &Code) -> bool {
        self.tag_type == other.tag_type && self.tag_name == other.tag_name
    }

    /// Serialize a list of codes into a single storage string.
    ///
    /// The format is one record per code, separated by `\u{009C}`, each record
    /// holding the fields separated by `\u{009D}`. Annotations are not stored.
    pub fn codes_to_string(codes: &[Code]) -> String {
        codes
            .iter()
            .map(|code| {
                [
                    code.tag_type.as_storage_char().to_string(),
                    code.id.to_string(),
                    code.tag_name.clone(),
                    code.data.clone(),
                    code.outer_data.clone(),
                    flags_to_string(code),
                    code.display_order.to_string(),
                ]
                .join(FIELD_SEPARATOR)
            })
            .collect::<Vec<_>>()
            .join(RECORD_SEPARATOR)
    }

    /// Rebuild a list of codes from a storage string made by `codes_to_string`.
    pub fn string_to_codes(storage: &str) -> Result<Vec<Code>, ResourceError> {
        if storage.is_empty() {
            return Ok(Vec::new());
        }

        storage
            .split(RECORD_SEPARATOR)
            .map(|record| {
                let fields: Vec<&str> = record.split(FIELD_SEPARATOR).collect();
                if fields.len() != 7 {
                    return Err(ResourceError::InvalidStorage(format!(
                        "expected 7 fields, found {}",
                        fields.len()
                    )));
                }

                let tag_type = fields[0]
                    .chars()
                    .next()
                    .and_then(TagType::from_storage_char)
                    .ok_or_else(|| ResourceError::InvalidStorage(format!("bad tag type '{}'", fields[0])))?;
                let id = fields[1]
                    .parse::<i32>()
                    .map_err(|e| ResourceError::InvalidStorage(format!("bad id: {}", e)))?;
                let display_order = fields[6]
                    .parse::<i32>()
                    .map_err(|e| ResourceError::InvalidStorage(format!("bad display order: {}", e)))?;

                let mut code = Code::new(tag_type, fields[2], fields[3]).with_id(id);
                code.outer_data = fields[4].to_string();
                code.has_reference = fields[5].contains('r');
                code.deletable = fields[5].contains('d');
                code.cloneable = fields[5].contains('c');
                code.display_order = display_order;
                Ok(code)
            })
            .collect()
    }
}

const RECORD_SEPARATOR: &str = "\u{009C}";
const FIELD_SEPARATOR: &str = "\u{009D}";

fn flags_to_string(code: &Code) -> String {
    let mut flags = String::new();
    if code.has_reference {
        flags.push('r');
    }
    if code.deletable {
        flags.push('d');
    }
    if code.cloneable {
        flags.push('c');
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_new_shouldHaveDefaultFlags() {
        let code = Code::new(TagType::Placeholder, "t", "d");

        assert!(!code.has_reference);
        assert!(!code.cloneable);
        assert!(!code.deletable);
        assert_eq!(code.display_order, -1);
        assert_eq!(code.output_data(), "d");
    }

    #[test]
    fn test_code_sameTag_shouldIgnoreRawData() {
        let a = Code::new(TagType::Opening, "b", "<b>");
        let b = Code::new(TagType::Opening, "b", "<B class='x'>");
        let c = Code::new(TagType::Closing, "b", "</b>");

        assert!(a.same_tag(&b));
        assert!(!a.same_tag(&c));
    }

    #[test]
    fn test_code_storage_shouldRebuildCodes() {
        let mut code = Code::new(TagType::Placeholder, "type", "data").with_id(100).with_flags(true, false);
        code.outer_data = "outer".to_string();
        code.has_reference = true;
        let codes = vec![code, Code::new(TagType::Opening, "b", "[b]").with_id(1)];

        let storage = Code::codes_to_string(&codes);
        let rebuilt = Code::string_to_codes(&storage).unwrap();

        assert_eq!(rebuilt, codes);
        assert_eq!(Code::codes_to_string(&rebuilt), storage);
    }

    #[test]
    fn test_code_stringToCodes_withGarbage_shouldFail() {
        assert!(Code::string_to_codes("not a record").is_err());
        assert!(Code::string_to_codes("").unwrap().is_empty());
    }
}
