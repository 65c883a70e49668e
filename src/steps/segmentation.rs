/*!
 * Sentence segmentation step.
 *
 * Splits the source (and optionally existing targets) of translatable text
 * units into segments. Whitespace between sentences goes to spacers, so
 * merging the segments gives back the original content.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::PipelineResult;
use crate::event::Event;
use crate::pipeline::step::{Flow, Step};
use crate::resource::container::TextContainer;
use crate::resource::fragment::TextFragment;

static DEFAULT_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(\s+)").expect("valid sentence pattern"));

/// Computes segment ranges over a fragment.
pub trait Segmenter: Send {
    /// Ranges of the segments, in coded-text positions.
    ///
    /// # Arguments
    /// * `fragment` - The content to split
    ///
    /// # Returns
    /// * Sorted, non-overlapping ranges; gaps between them become spacers
    fn compute(&self, fragment: &TextFragment) -> Vec<(usize, usize)>;
}

/// Splits after sentence terminators followed by whitespace.
#[derive(Debug, Clone)]
pub struct SentenceSegmenter {
    sentence_end: Regex,
}

impl Default for SentenceSegmenter {
    fn default() -> Self {
        Self {
            sentence_end: DEFAULT_SENTENCE_END.clone(),
        }
    }
}

impl SentenceSegmenter {
    /// Segmenter ending sentences on any of the given characters.
    pub fn new(terminators: &str) -> Result<Self, regex::Error> {
        let pattern = format!(r"[{}]+(\s+)", regex::escape(terminators));
        Ok(Self {
            sentence_end: Regex::new(&pattern)?,
        })
    }
}

impl Segmenter for SentenceSegmenter {
    fn compute(&self, fragment: &TextFragment) -> Vec<(usize, usize)> {
        let coded = fragment.coded_text();
        let to_position = |byte: usize| coded[..byte].chars().count();
        let len = fragment.len();

        // (end of sentence, start of the next one)
        let mut breaks = Vec::new();
        for captures in self.sentence_end.captures_iter(coded) {
            if let Some(space) = captures.get(1) {
                breaks.push((to_position(space.start()), to_position(space.end())));
            }
        }

        let mut ranges = Vec::new();
        let mut start = fragment.index_of_first_non_whitespace(0, None, false).unwrap_or(len);
        for (end, next) in breaks {
            if end > start {
                ranges.push((start, end));
            }
            start = start.max(next);
        }
        let end = fragment
            .index_of_last_non_whitespace(start, None, false)
            .map(|i| i + 1)
            .unwrap_or(start);
        if end > start {
            ranges.push((start, end));
        }
        ranges
    }
}

pub struct SegmentationStep {
    segmenter: Box<dyn Segmenter>,
    segment_targets: bool,
}

impl SegmentationStep {
    pub fn new(segmenter: Box<dyn Segmenter>) -> Self {
        Self {
            segmenter,
            segment_targets: true,
        }
    }

    /// Whether existing targets are segmented too
    pub fn with_targets(mut self, segment_targets: bool) -> Self {
        self.segment_targets = segment_targets;
        self
    }

    fn segment(&self, container: &mut TextContainer) -> PipelineResult<()> {
        if container.is_segmented() {
            return Ok(());
        }
        let ranges = self.segmenter.compute(&container.content());
        if ranges.is_empty() {
            return Ok(());
        }
        container.segment(&ranges)?;
        Ok(())
    }
}

impl Step for SegmentationStep {
    fn name(&self) -> &str {
        "segmentation"
    }

    fn handle_text_unit(&mut self, mut event: Event) -> PipelineResult<Flow> {
        if let Some(tu) = event.as_text_unit_mut() {
            if tu.is_translatable() {
                self.segment(tu.source_mut())?;
                if self.segment_targets {
                    let locales: Vec<_> = tu.target_locales().cloned().collect();
                    for locale in locales {
                        if let Some(target) = tu.target_mut(&locale) {
                            self.segment(target)?;
                        }
                    }
                }
                debug!("Unit '{}' has {} segment(s)", tu.id, tu.source().segment_count());
            }
        }
        Ok(Flow::Produced(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::code::TagType;
    use crate::resource::container::TextPart;
    use crate::resource::model::TextUnit;

    fn segment_texts(container: &TextContainer) -> Vec<String> {
        container.segments().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sentenceSegmenter_shouldSplitOnTerminators() {
        let mut container = TextContainer::from_text("First one. Second one!  Third?");
        let ranges = SentenceSegmenter::default().compute(&container.content());
        container.segment(&ranges).unwrap();

        assert_eq!(segment_texts(&container), vec!["First one.", "Second one!", "Third?"]);
        let spacers: Vec<String> = container
            .parts()
            .iter()
            .filter_map(|p| match p {
                TextPart::Spacer(f) => Some(f.to_string()),
                TextPart::Segment(_) => None,
            })
            .collect();
        assert_eq!(spacers, vec![" ", "  "]);
    }

    #[test]
    fn test_segmentationStep_mergeAll_shouldRestoreContent() {
        let mut fragment = TextFragment::from_text("  Click ");
        fragment.append_code(TagType::Opening, "b", "<b>");
        fragment.append_text("here");
        fragment.append_code(TagType::Closing, "b", "</b>");
        fragment.append_text(". Then wait. ");
        let original = fragment.clone();

        let mut step = SegmentationStep::new(Box::new(SentenceSegmenter::default()));
        let flow = step
            .handle_event(Event::text_unit(TextUnit::new("tu1", TextContainer::from_fragment(fragment))))
            .unwrap();
        let Flow::Produced(event) = flow else { panic!("unit not produced") };
        let mut source = event.as_text_unit().unwrap().source().clone();

        assert_eq!(source.segment_count(), 2);
        assert_eq!(source.content(), original);
        source.merge_all_segments();
        assert!(!source.is_segmented());
        assert_eq!(source.content(), original);
    }

    #[test]
    fn test_segmentationStep_nonTranslatable_shouldBeLeftAlone() {
        let mut tu = TextUnit::from_text("tu1", "One. Two.");
        tu.set_translatable(false);
        let mut step = SegmentationStep::new(Box::new(SentenceSegmenter::default()));

        let Flow::Produced(event) = step.handle_event(Event::text_unit(tu)).unwrap() else {
            panic!("unit not produced")
        };
        assert!(!event.as_text_unit().unwrap().source().is_segmented());
    }

    #[test]
    fn test_sentenceSegmenter_customTerminators_shouldBeUsed() {
        let segmenter = SentenceSegmenter::new(";").unwrap();
        let ranges = segmenter.compute(&TextFragment::from_text("a; b. c"));
        assert_eq!(ranges, vec![(0, 2), (3, 7)]);
    }
}
