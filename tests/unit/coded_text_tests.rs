/*!
 * Tests for coded text and text containers
 */

use textskel::{TagType, TextContainer, TextFragment, TextUnit};

use crate::common;

/// "Click <b>here</b>. Then wait."
fn sample() -> TextFragment {
    let mut fragment = TextFragment::new();
    fragment.append_text("Click ");
    fragment.append_code(TagType::Opening, "b", "<b>");
    fragment.append_text("here");
    fragment.append_code(TagType::Closing, "b", "</b>");
    fragment.append_text(". Then wait.");
    fragment
}

#[test]
fn test_fragment_renderings_shouldKeepCodesOpaque() {
    let fragment = sample();

    assert_eq!(fragment.to_string(), "Click <b>here</b>. Then wait.");
    assert_eq!(fragment.to_generic(false), "Click <1>here</1>. Then wait.");
    assert_eq!(fragment.to_display_text(), "Click here. Then wait.");
    assert_eq!(fragment.len(), 26);
    assert_eq!(fragment.codes().len(), 2);
}

#[test]
fn test_fragment_splitAndAppend_shouldRebuildSameText() {
    let fragment = sample();
    let head = fragment.sub_sequence(0, 14).unwrap();
    let tail = fragment.sub_sequence(14, fragment.len()).unwrap();

    let mut rebuilt = head.clone();
    rebuilt.append_fragment(&tail);

    assert_eq!(head.to_generic(false), "Click <1>here</1>");
    assert_eq!(rebuilt.coded_text(), fragment.coded_text());
    assert_eq!(rebuilt.to_string(), fragment.to_string());
}

#[test]
fn test_fragment_fromCoded_shouldRebuildFromStorage() {
    let fragment = sample();
    let rebuilt = TextFragment::from_coded(fragment.coded_text(), fragment.codes().to_vec()).unwrap();

    assert_eq!(rebuilt.to_string(), fragment.to_string());
    assert!(rebuilt.has_code());
    assert!(rebuilt.has_text(false));
}

#[test]
fn test_container_segmentThenMerge_shouldRestoreCodedText() {
    let fragment = sample();
    let mut container = TextContainer::from_fragment(fragment.clone());

    container.segment(&[(0, 15), (16, 26)]).unwrap();

    assert!(container.is_segmented());
    assert_eq!(container.segment_count(), 2);
    assert_eq!(container.segments()[0].to_generic(false), "Click <1>here</1>.");
    assert_eq!(container.segments()[1].to_string(), "Then wait.");
    assert_eq!(container.content().coded_text(), fragment.coded_text());

    container.merge_all_segments();
    assert!(!container.is_segmented());
    assert_eq!(container.content().to_string(), fragment.to_string());
}

#[test]
fn test_textUnit_target_shouldFollowSegmentLayout() {
    let mut tu = TextUnit::new("tu1", TextContainer::from_fragment(sample()));
    tu.source_mut().segment(&[(0, 15), (16, 26)]).unwrap();

    let target = tu.create_target(&common::fr(), false);

    assert_eq!(target.segment_count(), 2);
    assert!(target.segments().iter().all(|s| s.is_empty()));
    assert!(tu.has_target(&common::fr()));
    assert!(!tu.has_target(&common::en()));
}
