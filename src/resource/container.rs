/*!
 * Text containers and segmentation.
 *
 * A `TextContainer` holds the content of one side (source or one target) of
 * a text unit. Before segmentation it is a single fragment; afterwards it is
 * an ordered list of parts where segments alternate with the inter-segment
 * text that is not meant for translation. Concatenating every part always
 * gives back the whole content.
 */

use serde::{Deserialize, Serialize};

use crate::errors::ResourceError;
use crate::resource::fragment::{self, TextFragment};

/// A translatable slice of a container with a stable id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Identifier, unique within the container
    pub id: String,
    /// Content of the segment
    pub content: TextFragment,
}

impl Segment {
    pub fn new(id: &str, content: TextFragment) -> Self {
        Self {
            id: id.to_string(),
            content,
        }
    }
}

/// One part of a segmented container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TextPart {
    /// Translatable segment
    Segment(Segment),
    /// Text between segments
    Spacer(TextFragment),
}

impl TextPart {
    /// Content of the part, whatever its kind.
    pub fn content(&self) -> &TextFragment {
        match self {
            TextPart::Segment(segment) => &segment.content,
            TextPart::Spacer(content) => content,
        }
    }
}

/// Either the whole content or the segmented parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Layout {
    Whole(TextFragment),
    Segmented(Vec<TextPart>),
}

/// Content of one side of a text unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContainer {
    layout: Layout,
}

impl Default for TextContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextContainer {
    /// Create an empty, unsegmented container.
    pub fn new() -> Self {
        Self {
            layout: Layout::Whole(TextFragment::new()),
        }
    }

    /// Create a container holding plain text.
    pub fn from_text(text: &str) -> Self {
        Self::from_fragment(TextFragment::from_text(text))
    }

    /// Create a container holding a fragment.
    pub fn from_fragment(fragment: TextFragment) -> Self {
        Self {
            layout: Layout::Whole(fragment),
        }
    }

    /// Whether the container has been segmented.
    pub fn is_segmented(&self) -> bool {
        matches!(self.layout, Layout::Segmented(_))
    }

    /// Whether the container holds neither text nor codes.
    pub fn is_empty(&self) -> bool {
        match &self.layout {
            Layout::Whole(fragment) => fragment.is_empty(),
            Layout::Segmented(parts) => parts.iter().all(|p| p.content().is_empty()),
        }
    }

    /// Whether the container has text outside codes.
    pub fn has_text(&self, whitespace_is_text: bool) -> bool {
        match &self.layout {
            Layout::Whole(fragment) => fragment.has_text(whitespace_is_text),
            Layout::Segmented(parts) => parts.iter().any(|p| p.content().has_text(whitespace_is_text)),
        }
    }

    /// The full content: the whole fragment, or all parts concatenated.
    pub fn content(&self) -> TextFragment {
        match &self.layout {
            Layout::Whole(fragment) => fragment.clone(),
            Layout::Segmented(parts) => {
                let mut merged = TextFragment::new();
                for part in parts {
                    merged.append_fragment(part.content());
                }
                merged
            }
        }
    }

    /// Mutable access to the whole fragment of an unsegmented container.
    pub fn whole_mut(&mut self) -> Option<&mut TextFragment> {
        match &mut self.layout {
            Layout::Whole(fragment) => Some(fragment),
            Layout::Segmented(_) => None,
        }
    }

    /// Replace the whole content, dropping any segmentation.
    pub fn set_content(&mut self, fragment: TextFragment) {
        self.layout = Layout::Whole(fragment);
    }

    /// Split the content into segments over the given ranges.
    ///
    /// Ranges are positions in the coded text of the full content. They must be
    /// sorted, must not overlap and must not cut a code in two. Text outside
    /// the ranges becomes spacer parts. A segmented container is merged first.
    pub fn segment(&mut self, ranges: &[(usize, usize)]) -> Result<(), ResourceError> {
        let content = self.content();
        let len = content.len();
        let chars: Vec<char> = content.coded_text().chars().collect();

        let mut previous_end = 0;
        for &(start, end) in ranges {
            if start < previous_end || start > end || end > len {
                return Err(ResourceError::InvalidRange { start, end, len });
            }
            for edge in [start, end] {
                if edge > 0 && edge < len && fragment::is_marker(chars[edge - 1]) {
                    return Err(ResourceError::InvalidRange { start, end, len });
                }
            }
            previous_end = end;
        }

        let mut parts = Vec::with_capacity(ranges.len() * 2 + 1);
        let mut position = 0;
        for (number, &(start, end)) in ranges.iter().enumerate() {
            if start > position {
                parts.push(TextPart::Spacer(content.sub_sequence(position, start)?));
            }
            let segment = Segment::new(&number.to_string(), content.sub_sequence(start, end)?);
            parts.push(TextPart::Segment(segment));
            position = end;
        }
        if position < len {
            parts.push(TextPart::Spacer(content.sub_sequence(position, len)?));
        }

        self.layout = Layout::Segmented(parts);
        Ok(())
    }

    /// Undo segmentation: the container holds the full content again.
    pub fn merge_all_segments(&mut self) {
        if self.is_segmented() {
            self.layout = Layout::Whole(self.content());
        }
    }

    /// All parts, segments and spacers. An unsegmented container is one segment.
    pub fn parts(&self) -> Vec<TextPart> {
        match &self.layout {
            Layout::Whole(fragment) => vec![TextPart::Segment(Segment::new("0", fragment.clone()))],
            Layout::Segmented(parts) => parts.clone(),
        }
    }

    /// Segment contents in order. An unsegmented container has one segment.
    pub fn segments(&self) -> Vec<&TextFragment> {
        match &self.layout {
            Layout::Whole(fragment) => vec![fragment],
            Layout::Segmented(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    TextPart::Segment(s) => Some(&s.content),
                    TextPart::Spacer(_) => None,
                })
                .collect(),
        }
    }

    /// Mutable segment contents in order.
    pub fn segments_mut(&mut self) -> Vec<&mut TextFragment> {
        match &mut self.layout {
            Layout::Whole(fragment) => vec![fragment],
            Layout::Segmented(parts) => parts
                .iter_mut()
                .filter_map(|p| match p {
                    TextPart::Segment(s) => Some(&mut s.content),
                    TextPart::Spacer(_) => None,
                })
                .collect(),
        }
    }

    /// Number of segments (1 when unsegmented).
    pub fn segment_count(&self) -> usize {
        self.segments().len()
    }

    /// Get a segment by id.
    pub fn segment_by_id(&self, id: &str) -> Option<&Segment> {
        match &self.layout {
            Layout::Whole(_) => None,
            Layout::Segmented(parts) => parts.iter().find_map(|p| match p {
                TextPart::Segment(s) if s.id == id => Some(s),
                _ => None,
            }),
        }
    }

    /// Ids of the segments in order.
    pub fn segment_ids(&self) -> Vec<String> {
        match &self.layout {
            Layout::Whole(_) => vec!["0".to_string()],
            Layout::Segmented(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    TextPart::Segment(s) => Some(s.id.clone()),
                    TextPart::Spacer(_) => None,
                })
                .collect(),
        }
    }

    /// Copy of this container with the same segmentation and empty segments.
    /// Spacers are kept so the layout still writes back around the segments.
    pub fn empty_like(&self) -> TextContainer {
        match &self.layout {
            Layout::Whole(_) => TextContainer::new(),
            Layout::Segmented(parts) => TextContainer {
                layout: Layout::Segmented(
                    parts
                        .iter()
                        .map(|p| match p {
                            TextPart::Segment(s) => TextPart::Segment(Segment::new(&s.id, TextFragment::new())),
                            TextPart::Spacer(f) => TextPart::Spacer(f.clone()),
                        })
                        .collect(),
                ),
            },
        }
    }
}
