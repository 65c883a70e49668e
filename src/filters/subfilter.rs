/*!
 * Sub-filters: extraction of a format embedded in another one.
 *
 * The events of the inner filter are folded into the parent stream: its
 * document boundaries become a group, and the ids of its resources are
 * prefixed with that group id so they stay unique in the parent document.
 * Group ids come from an id generator seeded with the parent id, so they
 * are the same on every run.
 */

use log::debug;

use crate::errors::{FilterError, ResourceError};
use crate::event::{Event, EventType};
use crate::filters::Filter;
use crate::resource::id_generator::{self, IdGenerator};
use crate::resource::model::{Ending, RawDocument, Resource, StartGroup};
use crate::resource::skeleton::Skeleton;

/// Rewrites the events of an inner filter for the parent stream.
#[derive(Debug, Clone)]
pub struct SubFilterEventConverter {
    parent_id: String,
    parent_name: String,
    id_generator: IdGenerator,
    start_skeleton: Option<Skeleton>,
    end_skeleton: Option<Skeleton>,
    current_group: Option<String>,
}

impl SubFilterEventConverter {
    /// Create a converter for resources nested in `parent_id`.
    ///
    /// # Arguments
    /// * `parent_id` - Id of the parent resource, seed of the group ids
    /// * `start_skeleton` - Parent markup written before the nested content
    /// * `end_skeleton` - Parent markup written after it
    pub fn new(
        parent_id: &str,
        start_skeleton: Option<Skeleton>,
        end_skeleton: Option<Skeleton>,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            parent_id: parent_id.to_string(),
            parent_name: String::new(),
            id_generator: IdGenerator::new(parent_id, id_generator::START_GROUP)?,
            start_skeleton,
            end_skeleton,
            current_group: None,
        })
    }

    /// Name of the parent, used to name the groups.
    pub fn with_parent_name(mut self, name: &str) -> Self {
        self.parent_name = name.to_string();
        self
    }

    /// Id of the group being converted, if any.
    pub fn current_group(&self) -> Option<&str> {
        self.current_group.as_deref()
    }

    /// Convert one event of the inner filter.
    pub fn convert_event(&mut self, event: Event) -> Event {
        match event.event_type {
            EventType::StartDocument => {
                let group_id = self.id_generator.create_id();
                let mut group = StartGroup::new(Some(&self.parent_id), &group_id);
                group.name = Some(format!("sub-filter{}", self.parent_name));
                group.skeleton = self.start_skeleton.clone();
                if let Resource::StartDocument(start) = &event.resource {
                    group.properties = start.properties.clone();
                    group.annotations = start.annotations.clone();
                }
                debug!("Sub-filter group '{}' in '{}'", group_id, self.parent_id);
                self.current_group = Some(group_id);
                Event::start_group(group)
            }
            EventType::EndDocument => {
                let group_id = self.current_group.take().unwrap_or_else(|| self.parent_id.clone());
                let mut ending = Ending::new(&group_id);
                ending.skeleton = self.end_skeleton.clone();
                Event::end_group(ending)
            }
            _ => self.prefix_ids(event),
        }
    }

    fn prefix_ids(&self, mut event: Event) -> Event {
        let Some(prefix) = self.current_group.as_deref() else {
            return event;
        };
        let rename = |id: &str| format!("{}_{}", prefix, id);
        if let Some(id) = event.resource.id().map(rename) {
            event.resource.set_id(&id);
        }
        if let Some(skeleton) = event.resource.skeleton_mut() {
            skeleton.rename_references(rename);
        }
        if let Resource::StartGroup(group) = &mut event.resource {
            group.parent_id = Some(group.parent_id.as_deref().map(rename).unwrap_or_else(|| prefix.to_string()));
        }
        event
    }
}

/// A filter run inside another filter.
pub struct SubFilter {
    filter: Box<dyn Filter>,
    converter: SubFilterEventConverter,
}

impl SubFilter {
    pub fn new(filter: Box<dyn Filter>, converter: SubFilterEventConverter) -> Self {
        Self { filter, converter }
    }

    /// Extract embedded content and return the converted events.
    pub fn process(&mut self, content: &RawDocument) -> Result<Vec<Event>, FilterError> {
        self.filter.open(content)?;
        let mut events = Vec::new();
        while self.filter.has_next() {
            let event = self.filter.next()?;
            events.push(self.converter.convert_event(event));
        }
        self.filter.close();
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::LocaleId;
    use crate::resource::model::{StartDocument, TextUnit};

    fn inner_events() -> Vec<Event> {
        let mut tu = TextUnit::from_text("tu1", "Hello");
        let mut skeleton = Skeleton::from_literal("<b>");
        skeleton.add_content_ref("tu1");
        tu.skeleton = Some(skeleton);
        vec![
            Event::start_document(StartDocument::new("sd1", "inner", LocaleId::new("en").unwrap())),
            Event::text_unit(tu),
            Event::end_document(Ending::new("sd1")),
        ]
    }

    #[test]
    fn test_converter_convertEvent_shouldTurnDocumentIntoGroup() {
        let mut converter = SubFilterEventConverter::new("test", Some(Skeleton::from_literal("<![CDATA[")), None)
            .unwrap()
            .with_parent_name("_tu3");
        let converted: Vec<Event> = inner_events().into_iter().map(|e| converter.convert_event(e)).collect();

        assert_eq!(converted[0].event_type, EventType::StartGroup);
        assert_eq!(converted[0].resource.id(), Some("P364492-sg1"));
        match &converted[0].resource {
            Resource::StartGroup(group) => {
                assert_eq!(group.parent_id.as_deref(), Some("test"));
                assert_eq!(group.name.as_deref(), Some("sub-filter_tu3"));
                assert_eq!(group.skeleton.as_ref().map(|s| s.to_string()).as_deref(), Some("<![CDATA["));
            }
            other => panic!("unexpected resource: {:?}", other),
        }

        assert_eq!(converted[1].resource.id(), Some("P364492-sg1_tu1"));
        assert_eq!(
            converted[1].resource.skeleton().map(|s| s.to_string()).as_deref(),
            Some("<b>[#$P364492-sg1_tu1]")
        );

        assert_eq!(converted[2].event_type, EventType::EndGroup);
        assert_eq!(converted[2].resource.id(), Some("P364492-sg1"));
    }

    #[test]
    fn test_converter_groupIds_shouldBeStableAcrossRuns() {
        let run = || {
            let mut converter = SubFilterEventConverter::new("parent-7", None, None).unwrap();
            let mut ids = Vec::new();
            for _ in 0..2 {
                for event in inner_events() {
                    let converted = converter.convert_event(event);
                    ids.push(converted.resource.id().map(str::to_string));
                }
            }
            ids
        };

        let first = run();
        assert_eq!(first, run());
        assert_ne!(first[0], first[3]);
    }
}
