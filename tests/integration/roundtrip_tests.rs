/*!
 * Extraction and write back of whole documents
 */

use textskel::event::EventType;
use textskel::filters::plaintext::PlainTextFilter;
use textskel::filters::po::PoFilter;
use textskel::filters::subfilter::{SubFilter, SubFilterEventConverter};
use textskel::filters::{Filter, extract_all};
use textskel::{Event, RawDocument, Resource, Skeleton};

use crate::common::{self, SAMPLE_PO};

fn extract_po(text: &str) -> Vec<Event> {
    let raw = RawDocument::from_text("sample.po", text, common::en()).with_target_locale(common::fr());
    extract_all(&mut PoFilter::new(), &raw).unwrap()
}

fn write_po(events: &[Event]) -> String {
    let mut writer = PoFilter::new().create_filter_writer();
    writer.set_options(Some(&common::fr()), "UTF-8");
    for event in events {
        writer.handle_event(event).unwrap();
    }
    writer.take_output()
}

/// Id, source and French target of every text unit
fn unit_signatures(events: &[Event]) -> Vec<(String, String, String)> {
    events
        .iter()
        .filter_map(|e| e.as_text_unit())
        .map(|tu| {
            let target = tu.target(&common::fr()).map(|t| t.content().to_generic(true)).unwrap_or_default();
            (tu.id.clone(), tu.source().content().to_generic(true), target)
        })
        .collect()
}

#[test]
fn test_poRoundTrip_unchangedEvents_shouldOnlyFillEmptyTranslations() {
    common::init_logging();
    let output = write_po(&extract_po(SAMPLE_PO));

    let expected = SAMPLE_PO.replacen(
        "msgid \"Open file. Save file.\"\nmsgstr \"\"",
        "msgid \"Open file. Save file.\"\nmsgstr \"Open file. Save file.\"",
        1,
    );
    assert_eq!(output, expected);
}

#[test]
fn test_poRoundTrip_secondExtraction_shouldSeeSameUnits() {
    let first = extract_po(SAMPLE_PO);
    let second = extract_po(&write_po(&first));

    assert_eq!(unit_signatures(&first), unit_signatures(&second));
    assert_eq!(unit_signatures(&first).len(), 4);
}

#[test]
fn test_plainTextRoundTrip_translatedUnits_shouldReplaceOnlyText() {
    let raw = RawDocument::from_text("notes.txt", "first\r\n\r\nsecond", common::en());
    let mut events = extract_all(&mut PlainTextFilter::new(), &raw).unwrap();
    for event in &mut events {
        if let Some(tu) = event.as_text_unit_mut() {
            let translated = tu.source().content().to_string().to_uppercase();
            tu.set_target(&common::fr(), textskel::TextContainer::from_text(&translated));
        }
    }

    let mut writer = PlainTextFilter::new().create_filter_writer();
    writer.set_options(Some(&common::fr()), "UTF-8");
    for event in &events {
        writer.handle_event(event).unwrap();
    }

    assert_eq!(writer.take_output(), "FIRST\r\n\r\nSECOND");
}

#[test]
fn test_subFilter_embeddedText_shouldBecomePrefixedGroup() {
    let converter = SubFilterEventConverter::new(
        "tu7",
        Some(Skeleton::from_literal("<pre>")),
        Some(Skeleton::from_literal("</pre>")),
    )
    .unwrap();
    let mut sub_filter = SubFilter::new(Box::new(PlainTextFilter::new()), converter);
    let embedded = RawDocument::from_text("embedded.txt", "one\ntwo\n", common::en());

    let events = sub_filter.process(&embedded).unwrap();

    let first = events.first().unwrap();
    let last = events.last().unwrap();
    assert_eq!(first.event_type, EventType::StartGroup);
    assert_eq!(last.event_type, EventType::EndGroup);
    let group_id = first.resource.id().unwrap().to_string();
    assert_eq!(last.resource.id(), Some(group_id.as_str()));
    match &first.resource {
        Resource::StartGroup(group) => assert_eq!(group.parent_id.as_deref(), Some("tu7")),
        other => panic!("unexpected resource: {:?}", other),
    }

    let units: Vec<_> = events.iter().filter_map(|e| e.as_text_unit()).collect();
    assert_eq!(units.len(), 2);
    for tu in &units {
        assert!(tu.id.starts_with(&format!("{}_", group_id)));
        let skeleton = tu.skeleton.as_ref().unwrap();
        assert_eq!(skeleton.referenced_ids(), vec![tu.id.as_str()]);
    }
    assert_eq!(units[1].source().content().to_string(), "two");
}
