/*!
 * Gettext PO filter.
 *
 * Each entry becomes one event:
 * - the header entry (empty `msgid`) and comment-only blocks become
 *   document parts,
 * - a singular entry becomes a text unit named after its `msgctxt`,
 * - a plural entry becomes a group holding one text unit per `msgstr[n]`.
 *
 * The skeleton keeps every byte of the entry except the content of the
 * `msgstr` strings, which is written back from the text unit. Inside the
 * content, `\"` and `\\` are plain characters; other escapes and the joins
 * between the lines of a multi-line string are placeholder codes, so they
 * are written back unchanged. An empty `msgstr` gets a copy of the source
 * as target.
 */

use log::debug;

use crate::errors::FilterError;
use crate::event::Event;
use crate::filters::writer::GenericSkeletonWriter;
use crate::filters::{self, Encoder, EventQueue, Filter, FilterWriter, detector};
use crate::locale::LocaleId;
use crate::resource::code::TagType;
use crate::resource::container::TextContainer;
use crate::resource::fragment::TextFragment;
use crate::resource::model::{DocumentPart, Ending, RawDocument, StartGroup, TextUnit};
use crate::resource::skeleton::Skeleton;

pub const FILTER_ID: &str = "okf_po";
pub const MIME_TYPE: &str = "application/x-gettext";

/// Tag name of the code standing for the join between two lines of a string
pub const JOIN_TAG: &str = "x-po-join";
/// Tag name of the code standing for an escape sequence such as `\n`
pub const ESCAPE_TAG: &str = "x-po-escape";
/// Group type of plural entries
pub const PLURAL_GROUP_TYPE: &str = "x-gettext-plurals";

/// Escapes text for PO strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoEncoder;

impl Encoder for PoEncoder {
    fn encode(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '"' => out.push_str("\\\""),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                _ => out.push(c),
            }
        }
        out
    }
}

/// Filter for Gettext PO and POT files.
#[derive(Debug, Default)]
pub struct PoFilter {
    queue: EventQueue,
}

impl PoFilter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filter for PoFilter {
    fn name(&self) -> &str {
        FILTER_ID
    }

    fn mime_type(&self) -> &str {
        MIME_TYPE
    }

    fn open(&mut self, input: &RawDocument) -> Result<(), FilterError> {
        let target = input
            .target_locale
            .clone()
            .ok_or_else(|| FilterError::MissingTargetLocale(input.name.clone()))?;
        let bytes = input.read_bytes()?;
        let decoded = detector::decode(&bytes, &input.encoding, &input.name)?;

        let mut events = vec![Event::start_document(filters::start_document_for(
            input, &decoded, FILTER_ID, MIME_TYPE,
        ))];
        events.extend(PoParser::new(&decoded.text, &input.name, &target).parse()?);
        events.push(Event::end_document(Ending::new("ed1")));

        debug!("PO filter prepared {} events for '{}'", events.len(), input.name);
        self.queue.load(events);
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.queue.has_next()
    }

    fn next(&mut self) -> Result<Event, FilterError> {
        self.queue.next()
    }

    fn close(&mut self) {
        self.queue.close();
    }

    fn cancel(&mut self) {
        self.queue.cancel();
    }

    fn create_filter_writer(&self) -> Box<dyn FilterWriter> {
        Box::new(GenericSkeletonWriter::new(self.create_encoder()))
    }

    fn create_encoder(&self) -> Box<dyn Encoder> {
        Box::new(PoEncoder)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind<'a> {
    Blank,
    Comment,
    Continuation,
    Keyword(&'a str),
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    /// Byte offset of the line in the document
    start: usize,
    body: &'a str,
    /// Byte offset after the line break
    end: usize,
    /// 1-based line number
    number: usize,
}

/// A quoted value, possibly spread over several lines.
#[derive(Debug, Clone)]
struct QuotedValue {
    keyword: String,
    /// Byte offset after the first opening quote
    content_start: usize,
    /// Byte offset of the last closing quote
    content_end: usize,
    fragment: TextFragment,
    line: usize,
}

#[derive(Debug, Default)]
struct Entry {
    start: usize,
    end: usize,
    fuzzy: bool,
    msgctxt: Option<QuotedValue>,
    msgid: Option<QuotedValue>,
    msgid_plural: Option<QuotedValue>,
    msgstrs: Vec<QuotedValue>,
}

struct PoParser<'a> {
    text: &'a str,
    document: &'a str,
    target: &'a LocaleId,
    lines: Vec<Line<'a>>,
    tu_count: usize,
    dp_count: usize,
    group_count: usize,
}

impl<'a> PoParser<'a> {
    fn new(text: &'a str, document: &'a str, target: &'a LocaleId) -> Self {
        let mut lines = Vec::new();
        let mut offset = 0;
        for (number, (body, ending)) in filters::lines_with_endings(text).into_iter().enumerate() {
            let end = offset + body.len() + ending.len();
            lines.push(Line {
                start: offset,
                body,
                end,
                number: number + 1,
            });
            offset = end;
        }
        Self {
            text,
            document,
            target,
            lines,
            tu_count: 0,
            dp_count: 0,
            group_count: 0,
        }
    }

    fn malformed(&self, line: usize, message: &str) -> FilterError {
        FilterError::MalformedInput {
            document: self.document.to_string(),
            line,
            message: message.to_string(),
        }
    }

    fn classify(&self, line: &Line<'a>) -> Result<LineKind<'a>, FilterError> {
        let trimmed = line.body.trim_start();
        if trimmed.is_empty() {
            return Ok(LineKind::Blank);
        }
        if trimmed.starts_with('#') {
            return Ok(LineKind::Comment);
        }
        if trimmed.starts_with('"') {
            return Ok(LineKind::Continuation);
        }
        let keyword = trimmed
            .split(|c: char| c.is_whitespace() || c == '"')
            .next()
            .unwrap_or_default();
        let valid = matches!(keyword, "msgctxt" | "msgid" | "msgid_plural" | "msgstr")
            || keyword
                .strip_prefix("msgstr[")
                .and_then(|rest| rest.strip_suffix(']'))
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
        if valid {
            Ok(LineKind::Keyword(keyword))
        } else {
            Err(self.malformed(line.number, &format!("unexpected keyword '{}'", keyword)))
        }
    }

    fn parse(&mut self) -> Result<Vec<Event>, FilterError> {
        let mut events = Vec::new();
        let mut entry = Entry::default();
        let mut index = 0;

        while index < self.lines.len() {
            let line = self.lines[index];
            let kind = self.classify(&line)?;
            let starts_entry = matches!(kind, LineKind::Comment | LineKind::Keyword("msgctxt" | "msgid"));
            if starts_entry && !entry.msgstrs.is_empty() {
                entry.end = line.start;
                events.extend(self.entry_events(std::mem::take(&mut entry))?);
                entry.start = line.start;
            }

            match kind {
                LineKind::Blank => index += 1,
                LineKind::Comment => {
                    let trimmed = line.body.trim_start();
                    if trimmed.starts_with("#,") && trimmed[2..].split(',').any(|flag| flag.trim() == "fuzzy") {
                        entry.fuzzy = true;
                    }
                    index += 1;
                }
                LineKind::Continuation => {
                    return Err(self.malformed(line.number, "string without keyword"));
                }
                LineKind::Keyword(keyword) => {
                    let (value, next) = self.parse_value(keyword, index)?;
                    match keyword {
                        "msgctxt" => entry.msgctxt = Some(value),
                        "msgid" => entry.msgid = Some(value),
                        "msgid_plural" => entry.msgid_plural = Some(value),
                        _ => entry.msgstrs.push(value),
                    }
                    index = next;
                }
            }
        }

        entry.end = self.text.len();
        if entry.end > entry.start {
            events.extend(self.entry_events(entry)?);
        }
        Ok(events)
    }

    /// Parse the value starting on line `index`; returns it with the index of
    /// the first line after it.
    fn parse_value(&self, keyword: &str, index: usize) -> Result<(QuotedValue, usize), FilterError> {
        let line = self.lines[index];
        let quote = line
            .body
            .find('"')
            .ok_or_else(|| self.malformed(line.number, &format!("'{}' without string", keyword)))?;

        let mut segments = vec![self.scan_string(&line, line.start + quote)?];
        let mut next = index + 1;
        while next < self.lines.len() && self.classify(&self.lines[next])? == LineKind::Continuation {
            let continuation = self.lines[next];
            let indent = continuation.body.len() - continuation.body.trim_start().len();
            segments.push(self.scan_string(&continuation, continuation.start + indent)?);
            next += 1;
        }

        let mut fragment = TextFragment::new();
        for (n, (start, end)) in segments.iter().enumerate() {
            if n > 0 {
                let previous_end = segments[n - 1].1;
                fragment.append_code(TagType::Placeholder, JOIN_TAG, &self.text[previous_end..*start]);
            }
            unescape_into(&mut fragment, &self.text[*start..*end]);
        }

        let value = QuotedValue {
            keyword: keyword.to_string(),
            content_start: segments[0].0,
            content_end: segments[segments.len() - 1].1,
            fragment,
            line: line.number,
        };
        Ok((value, next))
    }

    /// Scan a quoted string opening at `quote`; returns the offsets of its
    /// content start and of its closing quote.
    fn scan_string(&self, line: &Line<'a>, quote: usize) -> Result<(usize, usize), FilterError> {
        let body_end = line.start + line.body.len();
        let bytes = self.text.as_bytes();
        let mut i = quote + 1;
        while i < body_end {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    if !self.text[i + 1..body_end].trim().is_empty() {
                        return Err(self.malformed(line.number, "unexpected text after string"));
                    }
                    return Ok((quote + 1, i));
                }
                _ => i += 1,
            }
        }
        Err(self.malformed(line.number, "unterminated string"))
    }

    fn entry_events(&mut self, entry: Entry) -> Result<Vec<Event>, FilterError> {
        let text = self.text;
        let literal = &text[entry.start..entry.end];
        let Some(msgid) = entry.msgid.as_ref() else {
            if !entry.msgstrs.is_empty() {
                return Err(self.malformed(entry.msgstrs[0].line, "msgstr without msgid"));
            }
            return Ok(self.document_part(literal).into_iter().collect());
        };
        if entry.msgstrs.is_empty() {
            return Err(self.malformed(msgid.line, "msgid without msgstr"));
        }

        let is_header = msgid.fragment.is_empty() && entry.msgctxt.is_none() && entry.msgid_plural.is_none();
        if is_header {
            return Ok(self.document_part(literal).into_iter().collect());
        }

        match entry.msgid_plural.as_ref() {
            None => {
                let msgstr = &entry.msgstrs[0];
                let mut skeleton = Skeleton::from_literal(&text[entry.start..msgstr.content_start]);
                let mut tu = self.text_unit(&entry, &msgid.fragment, &msgstr.fragment);
                skeleton.add_content_ref(&tu.id);
                skeleton.add_literal(&text[msgstr.content_end..entry.end]);
                tu.skeleton = Some(skeleton);
                Ok(vec![Event::text_unit(tu)])
            }
            Some(plural) => {
                self.group_count += 1;
                let mut group = StartGroup::new(None, &format!("g{}", self.group_count));
                group.group_type = Some(PLURAL_GROUP_TYPE.to_string());
                group.name = entry.msgctxt.as_ref().map(|c| c.fragment.to_display_text());
                let group_id = group.id.clone();
                let mut events = vec![Event::start_group(group)];

                let mut cursor = entry.start;
                for msgstr in &entry.msgstrs {
                    let source = if msgstr.keyword == "msgstr[0]" { &msgid.fragment } else { &plural.fragment };
                    let mut tu = self.text_unit(&entry, source, &msgstr.fragment);
                    let mut skeleton = Skeleton::from_literal(&text[cursor..msgstr.content_start]);
                    skeleton.add_content_ref(&tu.id);
                    tu.skeleton = Some(skeleton);
                    events.push(Event::text_unit(tu));
                    cursor = msgstr.content_end;
                }

                let ending = Ending::new(&group_id).with_skeleton(Skeleton::from_literal(&text[cursor..entry.end]));
                events.push(Event::end_group(ending));
                Ok(events)
            }
        }
    }

    fn text_unit(&mut self, entry: &Entry, source: &TextFragment, translation: &TextFragment) -> TextUnit {
        self.tu_count += 1;
        let mut tu = TextUnit::new(&format!("tu{}", self.tu_count), TextContainer::from_fragment(source.clone()));
        tu.name = entry.msgctxt.as_ref().map(|c| c.fragment.to_display_text());
        tu.mime_type = Some(MIME_TYPE.to_string());
        tu.preserve_whitespace = true;
        tu.properties.insert(
            "approved".to_string(),
            if entry.fuzzy { "no" } else { "yes" }.to_string(),
        );
        if translation.is_empty() {
            tu.create_target(self.target, true);
        } else {
            tu.set_target(self.target, TextContainer::from_fragment(translation.clone()));
        }
        tu
    }

    fn document_part(&mut self, literal: &str) -> Option<Event> {
        if literal.is_empty() {
            return None;
        }
        self.dp_count += 1;
        Some(Event::document_part(DocumentPart::new(
            &format!("dp{}", self.dp_count),
            Skeleton::from_literal(literal),
        )))
    }
}

/// Append the raw content of a PO string to a fragment.
fn unescape_into(fragment: &mut TextFragment, raw: &str) {
    let mut text = String::new();
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => text.push('"'),
            Some('\\') => text.push('\\'),
            Some(other) => {
                fragment.append_text(&std::mem::take(&mut text));
                fragment.append_code(TagType::Placeholder, ESCAPE_TAG, &format!("\\{}", other));
            }
            None => text.push('\\'),
        }
    }
    fragment.append_text(&text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    const RICH: &str = "# Header comment\n\
msgid \"\"\n\
msgstr \"\"\n\
\"Project-Id-Version: demo\\n\"\n\
\"Content-Type: text/plain; charset=UTF-8\\n\"\n\
\n\
#: src/main.c:10\n\
#, fuzzy, c-format\n\
msgctxt \"menu\"\n\
msgid \"Open \\\"%s\\\"\"\n\
msgstr \"Ouvrir \\\"%s\\\"\"\n\
\n\
msgid \"\"\n\
\"Line one\\n\"\n\
\"Line two\"\n\
msgstr \"Ligne un\\n\"\n\
\"Ligne deux\"\n\
\n\
msgid \"One file\"\n\
msgid_plural \"%d files\"\n\
msgstr[0] \"Un fichier\"\n\
msgstr[1] \"%d fichiers\"\n\
\n\
#~ msgid \"Old\"\n\
#~ msgstr \"Vieux\"\n";

    fn raw(text: &str) -> RawDocument {
        RawDocument::from_text("test.po", text, LocaleId::new("en").unwrap()).with_target_locale(fr())
    }

    fn fr() -> LocaleId {
        LocaleId::new("fr").unwrap()
    }

    fn extract(text: &str) -> Vec<Event> {
        filters::extract_all(&mut PoFilter::new(), &raw(text)).unwrap()
    }

    fn write(events: &[Event]) -> String {
        let mut writer = PoFilter::new().create_filter_writer();
        writer.set_options(Some(&fr()), "UTF-8");
        for event in events {
            writer.handle_event(event).unwrap();
        }
        writer.take_output()
    }

    #[test]
    fn test_poFilter_emptyMsgstr_shouldFallBackToSource() {
        let events = extract("msgid \"Text 1\"\nmsgstr \"\"\n");
        let tu = events.iter().find_map(|e| e.as_text_unit()).unwrap();

        assert_eq!(tu.source().content().to_string(), "Text 1");
        assert_eq!(tu.target(&fr()).unwrap().content(), tu.source().content());
        assert_eq!(write(&events), "msgid \"Text 1\"\nmsgstr \"Text 1\"\n");
    }

    #[test]
    fn test_poFilter_roundTrip_shouldReproduceInput() {
        assert_eq!(write(&extract(RICH)), RICH);
    }

    #[test]
    fn test_poFilter_roundTrip_withCrlf_shouldReproduceInput() {
        let input = "msgid \"a\"\r\nmsgstr \"\"\r\n\"b\"\r\n\r\nmsgid \"c\"\r\nmsgstr \"d\"";
        assert_eq!(write(&extract(input)), input);
    }

    #[test]
    fn test_poFilter_events_shouldFollowEntries() {
        let events = extract(RICH);
        let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();

        assert_eq!(
            types,
            vec![
                EventType::StartDocument,
                EventType::DocumentPart,
                EventType::TextUnit,
                EventType::TextUnit,
                EventType::StartGroup,
                EventType::TextUnit,
                EventType::TextUnit,
                EventType::EndGroup,
                EventType::DocumentPart,
                EventType::EndDocument,
            ]
        );
    }

    #[test]
    fn test_poFilter_textUnit_shouldCarryContextAndFlags() {
        let events = extract(RICH);
        let units: Vec<&TextUnit> = events.iter().filter_map(|e| e.as_text_unit()).collect();

        assert_eq!(units[0].name.as_deref(), Some("menu"));
        assert_eq!(units[0].source().content().to_string(), "Open \"%s\"");
        assert_eq!(units[0].properties.get("approved").map(String::as_str), Some("no"));
        assert_eq!(units[1].properties.get("approved").map(String::as_str), Some("yes"));

        let multi_line = units[1].source().content();
        assert_eq!(multi_line.to_display_text(), "Line oneLine two");
        assert_eq!(multi_line.codes().iter().filter(|c| c.tag_name == JOIN_TAG).count(), 2);
        assert_eq!(multi_line.codes().iter().filter(|c| c.tag_name == ESCAPE_TAG).count(), 1);

        assert_eq!(units[2].source().content().to_string(), "One file");
        assert_eq!(units[3].source().content().to_string(), "%d files");
        assert_eq!(units[3].target(&fr()).unwrap().content().to_string(), "%d fichiers");
    }

    #[test]
    fn test_poFilter_translatedTarget_shouldBeEscapedOnOutput() {
        let mut events = extract("msgid \"Hi\"\nmsgstr \"\"\n");
        for event in &mut events {
            if let Some(tu) = event.as_text_unit_mut() {
                tu.set_target(&fr(), TextContainer::from_text("Dit \"salut\" \\o/"));
            }
        }

        assert_eq!(write(&events), "msgid \"Hi\"\nmsgstr \"Dit \\\"salut\\\" \\\\o/\"\n");
    }

    #[test]
    fn test_poFilter_msgidWithoutMsgstr_shouldReportLine() {
        let result = filters::extract_all(&mut PoFilter::new(), &raw("msgid \"a\"\nmsgstr \"b\"\n\nmsgid \"c\"\n"));
        match result {
            Err(FilterError::MalformedInput { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected result: {:?}", other.map(|e| e.len())),
        }
    }

    #[test]
    fn test_poFilter_unterminatedString_shouldFail() {
        let result = filters::extract_all(&mut PoFilter::new(), &raw("msgid \"a\nmsgstr \"b\"\n"));
        assert!(matches!(result, Err(FilterError::MalformedInput { line: 1, .. })));
    }

    #[test]
    fn test_poFilter_withoutTargetLocale_shouldFail() {
        let input = RawDocument::from_text("a.po", "msgid \"a\"\nmsgstr \"\"\n", LocaleId::new("en").unwrap());
        let result = PoFilter::new().open(&input);
        assert!(matches!(result, Err(FilterError::MissingTargetLocale(_))));
    }

    #[test]
    fn test_poFilter_cancel_shouldEmitCanceled() {
        let mut filter = PoFilter::new();
        filter.open(&raw(RICH)).unwrap();
        filter.next().unwrap();
        filter.cancel();

        assert!(filter.has_next());
        assert!(filter.next().unwrap().is_canceled());
        assert!(!filter.has_next());
    }
}
