/*!
 * Coded text: translatable text with inline codes.
 *
 * A `TextFragment` stores its text as a string where every inline code is
 * replaced by two reserved characters: a marker telling the role of the code
 * (opening, closing or isolated) followed by a character encoding the index
 * of the code in the side list. All positions used by the range operations
 * are counted in these coded-text units, so a code always occupies exactly
 * two units no matter how long its markup is.
 */

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::ResourceError;
use crate::resource::code::{Code, TagType};

/// Marker for an opening code.
pub const MARKER_OPENING: char = '\u{E101}';
/// Marker for a closing code.
pub const MARKER_CLOSING: char = '\u{E102}';
/// Marker for a placeholder, or an opening/closing code without its partner.
pub const MARKER_ISOLATED: char = '\u{E103}';
/// Base value of the index character that follows a marker.
pub const CHARBASE: u32 = 0xE110;

/// Whether a character is one of the three code markers.
pub fn is_marker(c: char) -> bool {
    matches!(c, MARKER_OPENING | MARKER_CLOSING | MARKER_ISOLATED)
}

/// Convert a code index into its index character.
pub fn index_to_char(index: usize) -> char {
    // CHARBASE + index stays a valid scalar value for any realistic code count
    char::from_u32(CHARBASE + index as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Convert an index character back into a code index.
pub fn char_to_index(c: char) -> usize {
    (c as u32).saturating_sub(CHARBASE) as usize
}

fn marker_for(tag_type: TagType) -> char {
    match tag_type {
        TagType::Opening => MARKER_OPENING,
        TagType::Closing => MARKER_CLOSING,
        TagType::Placeholder => MARKER_ISOLATED,
    }
}

/// How codes appear in a marker-free rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRendering {
    /// Codes are dropped
    Removed,
    /// Codes are shown as `<name>`, `</name>` or `<name/>`
    TagName,
}

/// A run of plain text or one code, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentElement<'a> {
    Text(String),
    Code(&'a Code),
}

/// One element of a coded text seen in order: a character or a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Token<'a> {
    Char(char),
    Code(TagType, &'a str),
}

/// Translatable text with embedded inline codes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextFragment {
    text: String,
    codes: Vec<Code>,
    #[serde(default)]
    last_code_id: i32,
}

impl TextFragment {
    /// Create an empty fragment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fragment holding plain text.
    pub fn from_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            codes: Vec::new(),
            last_code_id: 0,
        }
    }

    /// Create a fragment from a coded text and its codes.
    ///
    /// Fails if a marker refers to a missing code or if the number of codes
    /// does not match the number of markers.
    pub fn from_coded(coded_text: &str, codes: Vec<Code>) -> Result<Self, ResourceError> {
        let last_code_id = codes.iter().map(|c| c.id).max().unwrap_or(0).max(0);
        let fragment = Self {
            text: coded_text.to_string(),
            codes,
            last_code_id,
        };
        fragment.validate()?;
        Ok(fragment)
    }

    /// The coded text (text with marker pairs).
    pub fn coded_text(&self) -> &str {
        &self.text
    }

    /// The codes, indexed by the markers of the coded text.
    pub fn codes(&self) -> &[Code] {
        &self.codes
    }

    /// Mutable access to the codes. Markers are not affected.
    pub fn codes_mut(&mut self) -> &mut [Code] {
        &mut self.codes
    }

    /// Get a code by index.
    pub fn code(&self, index: usize) -> Option<&Code> {
        self.codes.get(index)
    }

    /// Length in coded-text units.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the fragment has neither text nor codes.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the fragment contains at least one code.
    pub fn has_code(&self) -> bool {
        !self.codes.is_empty()
    }

    /// Whether the fragment has text outside its codes.
    ///
    /// With `whitespace_is_text` false, whitespace alone does not count.
    pub fn has_text(&self, whitespace_is_text: bool) -> bool {
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if is_marker(c) {
                chars.next();
                continue;
            }
            if whitespace_is_text || !c.is_whitespace() {
                return true;
            }
        }
        false
    }

    /// Append plain text.
    pub fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Append a single character.
    pub fn append_char(&mut self, c: char) {
        self.text.push(c);
    }

    /// Append a new code and return its id.
    pub fn append_code(&mut self, tag_type: TagType, tag_name: &str, data: &str) -> i32 {
        self.push_code(Code::new(tag_type, tag_name, data))
    }

    /// Append an existing code. A negative id is replaced by a new one.
    pub fn append(&mut self, code: Code) -> i32 {
        self.push_code(code)
    }

    fn push_code(&mut self, mut code: Code) -> i32 {
        if code.id < 0 {
            code.id = self.allocate_id(&code, self.codes_before(self.len()));
        } else {
            self.last_code_id = self.last_code_id.max(code.id);
        }
        let id = code.id;
        self.text.push(marker_for(code.tag_type));
        self.text.push(index_to_char(self.codes.len()));
        self.codes.push(code);
        id
    }

    /// Append another fragment, text and codes.
    ///
    /// Code ids are kept, so codes of both fragments can share an id. Call
    /// `renumber_codes` when the result must have unique ids.
    pub fn append_fragment(&mut self, other: &TextFragment) {
        let offset = self.codes.len();
        let mut chars = other.text.chars();
        while let Some(c) = chars.next() {
            self.text.push(c);
            if is_marker(c) {
                if let Some(index_char) = chars.next() {
                    self.text.push(index_to_char(char_to_index(index_char) + offset));
                }
            }
        }
        self.codes.extend(other.codes.iter().cloned());
        self.last_code_id = self.last_code_id.max(other.last_code_id);
    }

    /// Insert a fragment at a position; `None` appends.
    ///
    /// A position between a marker and its index character moves before the
    /// code.
    pub fn insert(&mut self, position: Option<usize>, other: &TextFragment) -> Result<(), ResourceError> {
        let len = self.len();
        let mut position = position.unwrap_or(len);
        self.check_range(position, position)?;
        let chars: Vec<char> = self.text.chars().collect();
        if position > 0 && Self::is_index_position(&chars, position) {
            position -= 1;
        }

        let tail = self.split_off(position);
        self.append_fragment(other);
        self.append_fragment(&tail);
        self.reindex();
        Ok(())
    }

    /// Remove the range `start..end`.
    ///
    /// A range edge falling between a marker and its index character is
    /// widened so the whole code is removed with the range.
    pub fn remove(&mut self, start: usize, end: usize) -> Result<(), ResourceError> {
        self.check_range(start, end)?;
        let (start, end) = self.widen_to_codes(start, end);
        if start == end {
            return Ok(());
        }

        let chars: Vec<char> = self.text.chars().collect();
        self.text = chars[..start].iter().chain(chars[end..].iter()).collect();
        self.reindex();
        Ok(())
    }

    /// Copy the range `start..end` into a new fragment.
    ///
    /// Codes keep their ids; indices are local to the copy. An edge falling
    /// inside a marker pair shrinks the range so no broken pair is copied.
    pub fn sub_sequence(&self, start: usize, end: usize) -> Result<TextFragment, ResourceError> {
        self.check_range(start, end)?;
        let chars: Vec<char> = self.text.chars().collect();

        let mut start = start;
        let mut end = end;
        if start > 0 && start < chars.len() && is_marker(chars[start - 1]) && !is_marker(chars[start]) {
            start += 1;
        }
        if end > 0 && is_marker(chars[end - 1]) && !Self::is_index_position(&chars, end - 1) {
            end -= 1;
        }
        if end < start {
            end = start;
        }

        let mut result = TextFragment::new();
        let mut i = start;
        while i < end {
            let c = chars[i];
            if is_marker(c) && i + 1 < end {
                let code = self.codes[char_to_index(chars[i + 1])].clone();
                result.last_code_id = result.last_code_id.max(code.id);
                result.text.push(c);
                result.text.push(index_to_char(result.codes.len()));
                result.codes.push(code);
                i += 2;
            } else {
                result.text.push(c);
                i += 1;
            }
        }
        result.last_code_id = result.last_code_id.max(self.last_code_id);
        Ok(result)
    }

    /// Replace a span of literal text by a code whose data is that text.
    ///
    /// Returns the change in length of the coded text. Codes inside the span
    /// are folded into the data of the new code.
    pub fn change_to_code(
        &mut self,
        start: usize,
        end: usize,
        tag_type: TagType,
        tag_name: &str,
    ) -> Result<isize, ResourceError> {
        self.check_range(start, end)?;
        let (start, end) = self.widen_to_codes(start, end);
        let span = self.sub_sequence(start, end)?;
        let data = span.to_string();

        let mut code = Code::new(tag_type, tag_name, &data);
        code.id = self.allocate_id(&code, self.codes_before(start));

        let tail = self.split_off(end);
        self.split_off(start);
        self.text.push(marker_for(tag_type));
        self.text.push(index_to_char(self.codes.len()));
        self.last_code_id = self.last_code_id.max(code.id);
        self.codes.push(code);
        self.append_fragment(&tail);
        self.reindex();

        Ok(2 - (end - start) as isize)
    }

    /// Replace the coded text, keeping the current codes.
    ///
    /// Every marker of the new text must refer to an existing code; codes no
    /// longer referenced are dropped.
    pub fn set_coded_text(&mut self, coded_text: &str) -> Result<(), ResourceError> {
        let candidate = Self {
            text: coded_text.to_string(),
            codes: self.codes.clone(),
            last_code_id: self.last_code_id,
        };
        candidate.check_markers()?;
        *self = candidate;
        self.reindex();
        Ok(())
    }

    /// Codes whose markers lie inside `start..end`.
    pub fn codes_in(&self, start: usize, end: usize) -> Result<Vec<&Code>, ResourceError> {
        self.check_range(start, end)?;
        let chars: Vec<char> = self.text.chars().collect();
        let mut found = Vec::new();
        let mut i = start;
        while i < end {
            if is_marker(chars[i]) && i + 1 < end {
                found.push(&self.codes[char_to_index(chars[i + 1])]);
                i += 2;
            } else {
                i += 1;
            }
        }
        Ok(found)
    }

    /// Position of the first element that is not whitespace in `from..until`.
    ///
    /// With `codes_are_whitespace` true, markers are skipped like whitespace.
    pub fn index_of_first_non_whitespace(&self, from: usize, until: Option<usize>, codes_are_whitespace: bool) -> Option<usize> {
        let chars: Vec<char> = self.text.chars().collect();
        let until = until.unwrap_or(chars.len()).min(chars.len());
        let mut i = from;
        while i < until {
            let c = chars[i];
            if is_marker(c) {
                if !codes_are_whitespace {
                    return Some(i);
                }
                i += 2;
                continue;
            }
            if !c.is_whitespace() {
                return Some(i);
            }
            i += 1;
        }
        None
    }

    /// Position of the last unit of the last element that is not whitespace
    /// in `from..until`.
    ///
    /// With `codes_are_whitespace` true, markers are skipped like whitespace.
    pub fn index_of_last_non_whitespace(&self, from: usize, until: Option<usize>, codes_are_whitespace: bool) -> Option<usize> {
        let chars: Vec<char> = self.text.chars().collect();
        let until = until.unwrap_or(chars.len()).min(chars.len());
        let mut i = until;
        while i > from {
            i -= 1;
            if Self::is_index_position(&chars, i) {
                if !codes_are_whitespace {
                    return Some(i);
                }
                i -= 1;
                continue;
            }
            if !chars[i].is_whitespace() {
                return Some(i);
            }
        }
        None
    }

    /// Compare with another fragment.
    ///
    /// Without codes, markers are stripped and only text is compared. With
    /// codes, the type and name of each code take part but not its raw data.
    pub fn compare_to(&self, other: &TextFragment, include_codes: bool) -> Ordering {
        if include_codes {
            self.tokens().cmp(other.tokens())
        } else {
            self.tokens()
                .filter(|t| matches!(t, Token::Char(_)))
                .cmp(other.tokens().filter(|t| matches!(t, Token::Char(_))))
        }
    }

    /// Text without codes.
    pub fn to_display_text(&self) -> String {
        self.render(CodeRendering::Removed)
    }

    /// Text runs and codes in order of appearance.
    pub fn elements(&self) -> Vec<FragmentElement<'_>> {
        let mut elements = Vec::new();
        let mut run = String::new();
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if !is_marker(c) {
                run.push(c);
                continue;
            }
            if let Some(code) = chars.next().and_then(|i| self.codes.get(char_to_index(i))) {
                if !run.is_empty() {
                    elements.push(FragmentElement::Text(std::mem::take(&mut run)));
                }
                elements.push(FragmentElement::Code(code));
            }
        }
        if !run.is_empty() {
            elements.push(FragmentElement::Text(run));
        }
        elements
    }

    /// Marker-free rendering of the text.
    pub fn render(&self, rendering: CodeRendering) -> String {
        let mut result = String::with_capacity(self.text.len());
        for token in self.tokens() {
            match token {
                Token::Char(c) => result.push(c),
                Token::Code(tag_type, name) => {
                    if rendering == CodeRendering::TagName {
                        match tag_type {
                            TagType::Opening => result.push_str(&format!("<{}>", name)),
                            TagType::Closing => result.push_str(&format!("</{}>", name)),
                            TagType::Placeholder => result.push_str(&format!("<{}/>", name)),
                        }
                    }
                }
            }
        }
        result
    }

    /// Generic inline notation: `<1>`, `</1>`, `<2/>`, and `<b1/>`/`<e1/>` for
    /// isolated opening/closing codes. With `show_raw`, codes show their data.
    pub fn to_generic(&self, show_raw: bool) -> String {
        let mut result = String::new();
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if !is_marker(c) {
                result.push(c);
                continue;
            }
            let Some(index_char) = chars.next() else { break };
            let code = &self.codes[char_to_index(index_char)];
            if show_raw {
                result.push_str(&code.data);
                continue;
            }
            match (c, code.tag_type) {
                (MARKER_OPENING, _) => result.push_str(&format!("<{}>", code.id)),
                (MARKER_CLOSING, _) => result.push_str(&format!("</{}>", code.id)),
                (_, TagType::Opening) => result.push_str(&format!("<b{}/>", code.id)),
                (_, TagType::Closing) => result.push_str(&format!("<e{}/>", code.id)),
                (_, TagType::Placeholder) => result.push_str(&format!("<{}/>", code.id)),
            }
        }
        result
    }

    /// Renumber code ids from 1 in order of appearance. Closing codes take the
    /// id of the nearest unclosed opening code with the same name.
    pub fn renumber_codes(&mut self) {
        let mut next_id = 0;
        let mut open: Vec<(String, i32)> = Vec::new();
        for index in self.indices_in_order() {
            let code = &mut self.codes[index];
            match code.tag_type {
                TagType::Opening => {
                    next_id += 1;
                    code.id = next_id;
                    open.push((code.tag_name.clone(), next_id));
                }
                TagType::Closing => {
                    if let Some(pos) = open.iter().rposition(|(name, _)| *name == code.tag_name) {
                        code.id = open.remove(pos).1;
                    } else {
                        next_id += 1;
                        code.id = next_id;
                    }
                }
                TagType::Placeholder => {
                    next_id += 1;
                    code.id = next_id;
                }
            }
        }
        self.last_code_id = next_id;
    }

    /// Turn opening and closing codes whose partner is not in the fragment
    /// into isolated markers.
    pub fn balance_markers(&mut self) {
        let chars: Vec<char> = self.text.chars().collect();
        let mut rebuilt = String::with_capacity(self.text.len());
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if is_marker(c) && i + 1 < chars.len() {
                let code = &self.codes[char_to_index(chars[i + 1])];
                let partner = match code.tag_type {
                    TagType::Opening => Some(TagType::Closing),
                    TagType::Closing => Some(TagType::Opening),
                    TagType::Placeholder => None,
                };
                let marker = match partner {
                    Some(kind) if self.codes.iter().any(|o| o.tag_type == kind && o.id == code.id) => {
                        marker_for(code.tag_type)
                    }
                    _ => MARKER_ISOLATED,
                };
                rebuilt.push(marker);
                rebuilt.push(chars[i + 1]);
                i += 2;
            } else {
                rebuilt.push(c);
                i += 1;
            }
        }
        self.text = rebuilt;
    }

    /// Check the code-index invariant: every marker resolves to a code and
    /// each code is referenced exactly once.
    pub fn validate(&self) -> Result<(), ResourceError> {
        let referenced = self.check_markers()?;
        if referenced.len() != self.codes.len() {
            return Err(ResourceError::InvalidStorage(format!(
                "{} markers for {} codes",
                referenced.len(),
                self.codes.len()
            )));
        }
        let mut sorted = referenced.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != referenced.len() {
            return Err(ResourceError::InvalidStorage("a code is referenced twice".to_string()));
        }
        Ok(())
    }

    fn check_markers(&self) -> Result<Vec<usize>, ResourceError> {
        let mut referenced = Vec::new();
        let chars: Vec<char> = self.text.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            if is_marker(chars[i]) {
                let index = chars.get(i + 1).map(|c| char_to_index(*c)).unwrap_or(usize::MAX);
                if index >= self.codes.len() {
                    return Err(ResourceError::InvalidCodeIndex { position: i, index });
                }
                referenced.push(index);
                i += 2;
            } else {
                i += 1;
            }
        }
        Ok(referenced)
    }

    fn tokens(&self) -> impl Iterator<Item = Token<'_>> + '_ {
        let mut chars = self.text.chars();
        std::iter::from_fn(move || {
            let c = chars.next()?;
            if is_marker(c) {
                let code = chars.next().and_then(|i| self.codes.get(char_to_index(i)))?;
                Some(Token::Code(code.tag_type, code.tag_name.as_str()))
            } else {
                Some(Token::Char(c))
            }
        })
    }

    fn indices_in_order(&self) -> Vec<usize> {
        let mut indices = Vec::with_capacity(self.codes.len());
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if is_marker(c) {
                if let Some(index_char) = chars.next() {
                    indices.push(char_to_index(index_char));
                }
            }
        }
        indices
    }

    fn is_index_position(chars: &[char], position: usize) -> bool {
        // The unit after a marker is an index even if it looks like a marker
        let mut i = 0;
        while i < chars.len() {
            if is_marker(chars[i]) {
                if i + 1 == position {
                    return true;
                }
                i += 2;
            } else {
                i += 1;
            }
            if i > position {
                break;
            }
        }
        false
    }

    fn check_range(&self, start: usize, end: usize) -> Result<(), ResourceError> {
        let len = self.len();
        if start > end || end > len {
            return Err(ResourceError::InvalidRange { start, end, len });
        }
        Ok(())
    }

    fn widen_to_codes(&self, start: usize, end: usize) -> (usize, usize) {
        let chars: Vec<char> = self.text.chars().collect();
        let mut start = start;
        let mut end = end;
        if start > 0 && Self::is_index_position(&chars, start) {
            start -= 1;
        }
        if end > 0 && end < chars.len() && Self::is_index_position(&chars, end) {
            end += 1;
        }
        (start, end)
    }

    /// Split the fragment at a position, returning the tail with its codes.
    fn split_off(&mut self, position: usize) -> TextFragment {
        let len = self.len();
        let tail = self.sub_sequence(position, len).unwrap_or_default();
        let chars: Vec<char> = self.text.chars().collect();
        self.text = chars[..position.min(chars.len())].iter().collect();
        self.reindex();
        tail
    }

    /// Rebuild the code list from the markers in order of appearance and
    /// drop codes that are no longer referenced.
    fn reindex(&mut self) {
        let old_codes = std::mem::take(&mut self.codes);
        let mut rebuilt = String::with_capacity(self.text.len());
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if !is_marker(c) {
                rebuilt.push(c);
                continue;
            }
            let Some(index_char) = chars.next() else { break };
            if let Some(code) = old_codes.get(char_to_index(index_char)) {
                rebuilt.push(c);
                rebuilt.push(index_to_char(self.codes.len()));
                self.codes.push(code.clone());
            }
        }
        self.text = rebuilt;
    }

    /// Codes appearing before a position, in order.
    fn codes_before(&self, position: usize) -> Vec<usize> {
        let mut indices = Vec::new();
        let mut chars = self.text.chars().take(position);
        while let Some(c) = chars.next() {
            if is_marker(c) {
                if let Some(index_char) = chars.next() {
                    indices.push(char_to_index(index_char));
                }
            }
        }
        indices
    }

    /// Pick an id for a new code. A closing code reuses the id of the last
    /// unclosed opening code with the same name among `before`.
    fn allocate_id(&mut self, code: &Code, before: Vec<usize>) -> i32 {
        if code.tag_type == TagType::Closing {
            let mut open: Vec<(&str, i32)> = Vec::new();
            for index in before {
                let c = &self.codes[index];
                match c.tag_type {
                    TagType::Opening => open.push((c.tag_name.as_str(), c.id)),
                    TagType::Closing => {
                        if let Some(pos) = open.iter().rposition(|(_, id)| *id == c.id) {
                            open.remove(pos);
                        }
                    }
                    TagType::Placeholder => {}
                }
            }
            if let Some((_, id)) = open.iter().rev().find(|(name, _)| *name == code.tag_name) {
                return *id;
            }
        }
        self.last_code_id += 1;
        self.last_code_id
    }
}

impl PartialEq for TextFragment {
    /// Fragments are equal when they hold the same characters and the same
    /// codes in the same order; marker indices do not matter.
    fn eq(&self, other: &Self) -> bool {
        let mine = self.indices_in_order();
        let theirs = other.indices_in_order();
        self.compare_to(other, true) == Ordering::Equal
            && mine.len() == theirs.len()
            && mine
                .iter()
                .zip(theirs.iter())
                .all(|(a, b)| self.codes[*a] == other.codes[*b])
    }
}

impl Eq for TextFragment {}

impl fmt::Display for TextFragment {
    /// Text with every code expanded to its original data.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.text.chars();
        while let Some(c) = chars.next() {
            if is_marker(c) {
                if let Some(code) = chars.next().and_then(|i| self.codes.get(char_to_index(i))) {
                    f.write_str(&code.data)?;
                }
            } else {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

impl From<&str> for TextFragment {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}
