/*!
 * Generic skeleton writer.
 *
 * Rebuilds a document by walking the skeleton of every resource in event
 * order. Literal parts are written verbatim. A reference is replaced by the
 * current value of the referenced resource: the target content for the
 * output locale (the source when there is no target), or a property.
 * Resources flagged as referents are not written in place; they are kept
 * until a skeleton refers to them.
 */

use std::collections::HashMap;

use log::{debug, warn};

use crate::errors::PipelineResult;
use crate::event::{Event, EventType};
use crate::filters::{Encoder, FilterWriter};
use crate::locale::LocaleId;
use crate::resource::fragment::FragmentElement;
use crate::resource::model::{Resource, TextUnit};
use crate::resource::skeleton::{RefProperty, Skeleton, SkeletonPart};

/// Referents can refer to other referents; deeper chains are treated as cycles.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Writer following skeletons, shared by all filters.
pub struct GenericSkeletonWriter {
    encoder: Box<dyn Encoder>,
    locale: Option<LocaleId>,
    encoding: Option<String>,
    has_bom: bool,
    output: String,
    referents: HashMap<String, Resource>,
}

impl GenericSkeletonWriter {
    pub fn new(encoder: Box<dyn Encoder>) -> Self {
        Self {
            encoder,
            locale: None,
            encoding: None,
            has_bom: false,
            output: String::new(),
            referents: HashMap::new(),
        }
    }

    /// Output written so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    fn write_resource(&mut self, resource: &Resource) {
        let rendered = match resource {
            Resource::TextUnit(tu) => self.render_text_unit(tu, resource, 0),
            other => match other.skeleton() {
                Some(skeleton) => self.render_skeleton(skeleton, other, 0),
                None => String::new(),
            },
        };
        self.output.push_str(&rendered);
    }

    fn render_text_unit(&self, tu: &TextUnit, resource: &Resource, depth: usize) -> String {
        match &tu.skeleton {
            Some(skeleton) => self.render_skeleton(skeleton, resource, depth),
            None => self.render_content(tu),
        }
    }

    fn render_skeleton(&self, skeleton: &Skeleton, current: &Resource, depth: usize) -> String {
        let mut out = String::new();
        for part in skeleton.parts() {
            match part {
                SkeletonPart::Literal(text) => out.push_str(text),
                SkeletonPart::Reference { resource_id, property } => {
                    out.push_str(&self.render_reference(resource_id, property, current, depth));
                }
            }
        }
        out
    }

    fn render_reference(&self, resource_id: &str, property: &RefProperty, current: &Resource, depth: usize) -> String {
        let is_self = current.id() == Some(resource_id);
        let target = if is_self { Some(current) } else { self.referents.get(resource_id) };
        let Some(target) = target else {
            warn!("Skeleton refers to unknown resource '{}'", resource_id);
            return String::new();
        };

        match property {
            RefProperty::Content => match target {
                Resource::TextUnit(tu) if is_self => self.render_content(tu),
                _ if depth >= MAX_REFERENCE_DEPTH => {
                    warn!("Reference chain too deep at '{}'", resource_id);
                    String::new()
                }
                Resource::TextUnit(tu) => self.render_text_unit(tu, target, depth + 1),
                other => other
                    .skeleton()
                    .map(|s| self.render_skeleton(s, other, depth + 1))
                    .unwrap_or_default(),
            },
            RefProperty::Property(name) => {
                let value = match target {
                    Resource::TextUnit(tu) => tu.property_for(self.locale.as_ref(), name),
                    other => other.property(name),
                };
                value.map(str::to_string).unwrap_or_else(|| {
                    warn!("Resource '{}' has no property '{}'", resource_id, name);
                    String::new()
                })
            }
        }
    }

    /// Content for the output locale, codes expanded to their data and text
    /// escaped by the encoder.
    fn render_content(&self, tu: &TextUnit) -> String {
        let content = tu.content_for(self.locale.as_ref()).content();
        let mut out = String::new();
        for element in content.elements() {
            match element {
                FragmentElement::Text(text) => out.push_str(&self.encoder.encode(&text)),
                FragmentElement::Code(code) => out.push_str(code.output_data()),
            }
        }
        out
    }
}

impl FilterWriter for GenericSkeletonWriter {
    fn set_options(&mut self, locale: Option<&LocaleId>, encoding: &str) {
        self.locale = locale.cloned();
        if !encoding.is_empty() {
            self.encoding = Some(encoding.to_string());
        }
    }

    fn handle_event(&mut self, event: &Event) -> PipelineResult<()> {
        match (&event.event_type, &event.resource) {
            (EventType::StartDocument, Resource::StartDocument(start)) => {
                debug!("Writing document '{}'", start.name);
                self.output.clear();
                self.referents.clear();
                if self.encoding.is_none() {
                    self.encoding = Some(start.encoding.clone());
                }
                self.has_bom = start.has_bom;
                self.write_resource(&event.resource);
            }
            (EventType::TextUnit, Resource::TextUnit(tu)) if tu.is_referent => {
                self.referents.insert(tu.id.clone(), event.resource.clone());
            }
            (EventType::DocumentPart, Resource::DocumentPart(dp)) if dp.is_referent => {
                self.referents.insert(dp.id.clone(), event.resource.clone());
            }
            (EventType::StartGroup, Resource::StartGroup(group)) if group.is_referent => {
                self.referents.insert(group.id.clone(), event.resource.clone());
            }
            (
                EventType::TextUnit
                | EventType::DocumentPart
                | EventType::StartGroup
                | EventType::EndGroup
                | EventType::StartSubDocument
                | EventType::EndSubDocument
                | EventType::EndDocument,
                resource,
            ) => self.write_resource(resource),
            _ => {}
        }
        Ok(())
    }

    fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    fn encoding(&self) -> &str {
        self.encoding.as_deref().unwrap_or("UTF-8")
    }

    fn has_bom(&self) -> bool {
        self.has_bom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::DefaultEncoder;
    use crate::resource::code::TagType;
    use crate::resource::container::TextContainer;
    use crate::resource::fragment::TextFragment;
    use crate::resource::model::{DocumentPart, Ending, StartDocument};

    fn fr() -> LocaleId {
        LocaleId::new("fr").unwrap()
    }

    fn write(writer: &mut GenericSkeletonWriter, events: &[Event]) -> String {
        for event in events {
            writer.handle_event(event).unwrap();
        }
        writer.take_output()
    }

    fn text_unit_with_skeleton(id: &str, fragment: TextFragment) -> TextUnit {
        let mut tu = TextUnit::new(id, TextContainer::from_fragment(fragment));
        let mut skeleton = Skeleton::from_literal("<p>");
        skeleton.add_content_ref(id);
        skeleton.add_literal("</p>\n");
        tu.skeleton = Some(skeleton);
        tu
    }

    fn document(units: Vec<Event>) -> Vec<Event> {
        let mut start = StartDocument::new("sd1", "doc.html", LocaleId::new("en").unwrap());
        start.skeleton = Some(Skeleton::from_literal("<html>\n"));
        let mut events = vec![Event::start_document(start)];
        events.extend(units);
        events.push(Event::end_document(Ending::new("sd1").with_skeleton(Skeleton::from_literal("</html>"))));
        events
    }

    #[test]
    fn test_writer_unchangedEvents_shouldReproduceDocument() {
        let mut fragment = TextFragment::from_text("a ");
        fragment.append_code(TagType::Opening, "b", "<b>");
        fragment.append_text("bold");
        fragment.append_code(TagType::Closing, "b", "</b>");
        let events = document(vec![Event::text_unit(text_unit_with_skeleton("tu1", fragment))]);

        let mut writer = GenericSkeletonWriter::new(Box::new(DefaultEncoder));
        writer.set_options(Some(&fr()), "UTF-8");

        assert_eq!(write(&mut writer, &events), "<html>\n<p>a <b>bold</b></p>\n</html>");
    }

    #[test]
    fn test_writer_target_shouldReplaceSource() {
        let mut tu = text_unit_with_skeleton("tu1", TextFragment::from_text("Hello"));
        tu.set_target(&fr(), TextContainer::from_text("Bonjour"));
        let events = document(vec![Event::text_unit(tu)]);

        let mut writer = GenericSkeletonWriter::new(Box::new(DefaultEncoder));
        writer.set_options(Some(&fr()), "");

        assert_eq!(write(&mut writer, &events), "<html>\n<p>Bonjour</p>\n</html>");
        assert_eq!(writer.encoding(), "UTF-8");
    }

    #[test]
    fn test_writer_referent_shouldBeWrittenWhereReferenced() {
        let mut referent = TextUnit::from_text("tu2", "alt text");
        referent.is_referent = true;

        let mut img = Skeleton::from_literal("<img alt=\"");
        img.add_content_ref("tu2");
        img.add_literal("\" src=\"");
        img.add_property_ref("dp1", "src");
        img.add_literal("\"/>\n");
        let mut dp = DocumentPart::new("dp1", img);
        dp.properties.insert("src".to_string(), "a.png".to_string());

        let events = document(vec![Event::text_unit(referent), Event::document_part(dp)]);
        let mut writer = GenericSkeletonWriter::new(Box::new(DefaultEncoder));

        assert_eq!(
            write(&mut writer, &events),
            "<html>\n<img alt=\"alt text\" src=\"a.png\"/>\n</html>"
        );
    }
}
