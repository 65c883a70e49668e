/*!
 * Resources carried by events.
 *
 * Every resource has an id unique within its document, an optional skeleton
 * and an annotation map. `TextUnit` is the only resource carrying
 * translatable content.
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::errors::FilterError;
use crate::locale::LocaleId;
use crate::resource::annotation::Annotations;
use crate::resource::container::TextContainer;
use crate::resource::skeleton::Skeleton;

/// Properties of a resource, by name
pub type Properties = BTreeMap<String, String>;

/// Where the bytes of a raw document come from.
#[derive(Debug, Clone)]
pub enum RawInput {
    /// Bytes already in memory
    Bytes(Vec<u8>),
    /// Text already decoded, encoded back with the declared encoding when read as bytes
    Text(String),
    /// A file read on demand
    File(PathBuf),
}

/// Input document before any filter has parsed it.
#[derive(Debug, Clone, Serialize)]
pub struct RawDocument {
    /// Path or name used in reports
    pub name: String,
    #[serde(skip)]
    pub input: RawInput,
    /// Declared encoding, used when no BOM says otherwise
    pub encoding: String,
    pub source_locale: LocaleId,
    pub target_locale: Option<LocaleId>,
    /// Filter to use; when absent, the filter is chosen from the file extension
    pub filter_config_id: Option<String>,
}

impl RawDocument {
    /// Create a raw document from bytes.
    pub fn from_bytes(name: &str, bytes: Vec<u8>, encoding: &str, source_locale: LocaleId) -> Self {
        Self {
            name: name.to_string(),
            input: RawInput::Bytes(bytes),
            encoding: encoding.to_string(),
            source_locale,
            target_locale: None,
            filter_config_id: None,
        }
    }

    /// Create a raw document from text.
    pub fn from_text(name: &str, text: &str, source_locale: LocaleId) -> Self {
        Self {
            name: name.to_string(),
            input: RawInput::Text(text.to_string()),
            encoding: "UTF-8".to_string(),
            source_locale,
            target_locale: None,
            filter_config_id: None,
        }
    }

    /// Create a raw document backed by a file.
    pub fn from_file(path: &Path, encoding: &str, source_locale: LocaleId) -> Self {
        Self {
            name: path.to_string_lossy().to_string(),
            input: RawInput::File(path.to_path_buf()),
            encoding: encoding.to_string(),
            source_locale,
            target_locale: None,
            filter_config_id: None,
        }
    }

    pub fn with_target_locale(mut self, locale: LocaleId) -> Self {
        self.target_locale = Some(locale);
        self
    }

    pub fn with_filter(mut self, filter_config_id: &str) -> Self {
        self.filter_config_id = Some(filter_config_id.to_string());
        self
    }

    /// Read the raw bytes of the document.
    pub fn read_bytes(&self) -> Result<Vec<u8>, FilterError> {
        match &self.input {
            RawInput::Bytes(bytes) => Ok(bytes.clone()),
            RawInput::Text(text) => crate::filters::detector::encode(text, &self.encoding),
            RawInput::File(path) => Ok(std::fs::read(path)?),
        }
    }

    /// Replace the input with new bytes.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.input = RawInput::Bytes(bytes);
    }

    /// File extension of the document name, lower case.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

/// Context of one batch item, carried by `START_BATCH_ITEM`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchItemContext {
    /// Position of the item in the batch
    pub index: usize,
    /// Path or name of the input document
    pub document: String,
    /// Where the writer step puts its output
    pub output_path: Option<PathBuf>,
    /// Encoding of the output; the input encoding when absent
    pub output_encoding: Option<String>,
    pub target_locale: Option<LocaleId>,
}

/// Start of a document.
#[derive(Debug, Clone, Serialize)]
pub struct StartDocument {
    pub id: String,
    /// Path or name of the document
    pub name: String,
    pub locale: LocaleId,
    /// Encoding the document was decoded with
    pub encoding: String,
    /// Whether the input started with a byte order mark
    pub has_bom: bool,
    /// Line break found in the input
    pub line_break: String,
    pub mime_type: String,
    /// Config id of the filter that produced the events
    pub filter_id: String,
    pub is_multilingual: bool,
    pub skeleton: Option<Skeleton>,
    pub annotations: Annotations,
    pub properties: Properties,
}

impl StartDocument {
    pub fn new(id: &str, name: &str, locale: LocaleId) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            locale,
            encoding: "UTF-8".to_string(),
            has_bom: false,
            line_break: "\n".to_string(),
            mime_type: String::new(),
            filter_id: String::new(),
            is_multilingual: false,
            skeleton: None,
            annotations: Annotations::new(),
            properties: Properties::new(),
        }
    }
}

/// End of a document, sub-document or group.
#[derive(Debug, Clone, Serialize)]
pub struct Ending {
    pub id: String,
    pub skeleton: Option<Skeleton>,
    pub annotations: Annotations,
}

impl Ending {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            skeleton: None,
            annotations: Annotations::new(),
        }
    }

    pub fn with_skeleton(mut self, skeleton: Skeleton) -> Self {
        self.skeleton = Some(skeleton);
        self
    }
}

/// Start of a sub-document.
#[derive(Debug, Clone, Serialize)]
pub struct StartSubDocument {
    pub id: String,
    pub parent_id: String,
    pub name: Option<String>,
    pub skeleton: Option<Skeleton>,
    pub annotations: Annotations,
    pub properties: Properties,
}

impl StartSubDocument {
    pub fn new(parent_id: &str, id: &str) -> Self {
        Self {
            id: id.to_string(),
            parent_id: parent_id.to_string(),
            name: None,
            skeleton: None,
            annotations: Annotations::new(),
            properties: Properties::new(),
        }
    }
}

/// Start of a group of units.
#[derive(Debug, Clone, Serialize)]
pub struct StartGroup {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: Option<String>,
    /// Kind of group, e.g. "x-gettext-plurals"
    pub group_type: Option<String>,
    pub is_referent: bool,
    pub skeleton: Option<Skeleton>,
    pub annotations: Annotations,
    pub properties: Properties,
}

impl StartGroup {
    pub fn new(parent_id: Option<&str>, id: &str) -> Self {
        Self {
            id: id.to_string(),
            parent_id: parent_id.map(str::to_string),
            name: None,
            group_type: None,
            is_referent: false,
            skeleton: None,
            annotations: Annotations::new(),
            properties: Properties::new(),
        }
    }
}

/// Non-translatable chunk of a document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPart {
    pub id: String,
    /// Referent parts are written where another skeleton refers to them
    pub is_referent: bool,
    pub skeleton: Option<Skeleton>,
    pub annotations: Annotations,
    pub properties: Properties,
}

impl DocumentPart {
    pub fn new(id: &str, skeleton: Skeleton) -> Self {
        Self {
            id: id.to_string(),
            is_referent: false,
            skeleton: Some(skeleton),
            annotations: Annotations::new(),
            properties: Properties::new(),
        }
    }
}

/// Translatable unit: one source container and one container per target locale.
#[derive(Debug, Clone, Serialize)]
pub struct TextUnit {
    pub id: String,
    /// Resource name or key (e.g. a message context)
    pub name: Option<String>,
    pub mime_type: Option<String>,
    translatable: bool,
    pub preserve_whitespace: bool,
    pub is_referent: bool,
    source: TextContainer,
    targets: BTreeMap<LocaleId, TextContainer>,
    /// Properties of the source side
    pub properties: Properties,
    target_properties: BTreeMap<LocaleId, Properties>,
    pub skeleton: Option<Skeleton>,
    pub annotations: Annotations,
}

impl TextUnit {
    pub fn new(id: &str, source: TextContainer) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            mime_type: None,
            translatable: true,
            preserve_whitespace: false,
            is_referent: false,
            source,
            targets: BTreeMap::new(),
            properties: Properties::new(),
            target_properties: BTreeMap::new(),
            skeleton: None,
            annotations: Annotations::new(),
        }
    }

    /// Create a unit holding plain source text.
    pub fn from_text(id: &str, text: &str) -> Self {
        Self::new(id, TextContainer::from_text(text))
    }

    pub fn is_translatable(&self) -> bool {
        self.translatable
    }

    pub fn set_translatable(&mut self, translatable: bool) {
        self.translatable = translatable;
    }

    pub fn source(&self) -> &TextContainer {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut TextContainer {
        &mut self.source
    }

    pub fn set_source(&mut self, source: TextContainer) {
        self.source = source;
    }

    pub fn has_target(&self, locale: &LocaleId) -> bool {
        self.targets.contains_key(locale)
    }

    pub fn target(&self, locale: &LocaleId) -> Option<&TextContainer> {
        self.targets.get(locale)
    }

    pub fn target_mut(&mut self, locale: &LocaleId) -> Option<&mut TextContainer> {
        self.targets.get_mut(locale)
    }

    /// Locales that have a target.
    pub fn target_locales(&self) -> impl Iterator<Item = &LocaleId> {
        self.targets.keys()
    }

    /// Get the target for a locale, creating it if absent.
    ///
    /// A new target is a copy of the source when `copy_source` is true, or an
    /// empty container with the segmentation of the source otherwise. An
    /// existing target is returned untouched.
    pub fn create_target(&mut self, locale: &LocaleId, copy_source: bool) -> &mut TextContainer {
        let source = &self.source;
        self.targets.entry(locale.clone()).or_insert_with(|| {
            if copy_source {
                source.clone()
            } else {
                source.empty_like()
            }
        })
    }

    /// Set the target for a locale, replacing any existing one.
    pub fn set_target(&mut self, locale: &LocaleId, target: TextContainer) {
        self.targets.insert(locale.clone(), target);
    }

    pub fn remove_target(&mut self, locale: &LocaleId) -> Option<TextContainer> {
        self.target_properties.remove(locale);
        self.targets.remove(locale)
    }

    /// The container to write for a locale: its target, or the source.
    pub fn content_for(&self, locale: Option<&LocaleId>) -> &TextContainer {
        locale.and_then(|l| self.targets.get(l)).unwrap_or(&self.source)
    }

    /// A property for a locale: the target property, or the source one.
    pub fn property_for(&self, locale: Option<&LocaleId>, name: &str) -> Option<&str> {
        locale
            .and_then(|l| self.target_properties.get(l))
            .and_then(|p| p.get(name))
            .or_else(|| self.properties.get(name))
            .map(String::as_str)
    }

    /// Set a property of the target for a locale.
    pub fn set_target_property(&mut self, locale: &LocaleId, name: &str, value: &str) {
        self.target_properties
            .entry(locale.clone())
            .or_default()
            .insert(name.to_string(), value.to_string());
    }
}

/// The resource carried by an event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Resource {
    /// Events with no payload (batch boundaries, cancellation)
    None,
    BatchItem(BatchItemContext),
    RawDocument(RawDocument),
    StartDocument(StartDocument),
    StartSubDocument(StartSubDocument),
    StartGroup(StartGroup),
    Ending(Ending),
    TextUnit(TextUnit),
    DocumentPart(DocumentPart),
}

impl Resource {
    /// Id of the resource, when it has one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Resource::StartDocument(r) => Some(&r.id),
            Resource::StartSubDocument(r) => Some(&r.id),
            Resource::StartGroup(r) => Some(&r.id),
            Resource::Ending(r) => Some(&r.id),
            Resource::TextUnit(r) => Some(&r.id),
            Resource::DocumentPart(r) => Some(&r.id),
            Resource::None | Resource::BatchItem(_) | Resource::RawDocument(_) => None,
        }
    }

    /// Change the id of the resource. No effect on resources without id.
    pub fn set_id(&mut self, id: &str) {
        let slot = match self {
            Resource::StartDocument(r) => &mut r.id,
            Resource::StartSubDocument(r) => &mut r.id,
            Resource::StartGroup(r) => &mut r.id,
            Resource::Ending(r) => &mut r.id,
            Resource::TextUnit(r) => &mut r.id,
            Resource::DocumentPart(r) => &mut r.id,
            Resource::None | Resource::BatchItem(_) | Resource::RawDocument(_) => return,
        };
        *slot = id.to_string();
    }

    pub fn skeleton(&self) -> Option<&Skeleton> {
        match self {
            Resource::StartDocument(r) => r.skeleton.as_ref(),
            Resource::StartSubDocument(r) => r.skeleton.as_ref(),
            Resource::StartGroup(r) => r.skeleton.as_ref(),
            Resource::Ending(r) => r.skeleton.as_ref(),
            Resource::TextUnit(r) => r.skeleton.as_ref(),
            Resource::DocumentPart(r) => r.skeleton.as_ref(),
            Resource::None | Resource::BatchItem(_) | Resource::RawDocument(_) => None,
        }
    }

    pub fn skeleton_mut(&mut self) -> Option<&mut Skeleton> {
        match self {
            Resource::StartDocument(r) => r.skeleton.as_mut(),
            Resource::StartSubDocument(r) => r.skeleton.as_mut(),
            Resource::StartGroup(r) => r.skeleton.as_mut(),
            Resource::Ending(r) => r.skeleton.as_mut(),
            Resource::TextUnit(r) => r.skeleton.as_mut(),
            Resource::DocumentPart(r) => r.skeleton.as_mut(),
            Resource::None | Resource::BatchItem(_) | Resource::RawDocument(_) => None,
        }
    }

    pub fn annotations(&self) -> Option<&Annotations> {
        match self {
            Resource::StartDocument(r) => Some(&r.annotations),
            Resource::StartSubDocument(r) => Some(&r.annotations),
            Resource::StartGroup(r) => Some(&r.annotations),
            Resource::Ending(r) => Some(&r.annotations),
            Resource::TextUnit(r) => Some(&r.annotations),
            Resource::DocumentPart(r) => Some(&r.annotations),
            Resource::None | Resource::BatchItem(_) | Resource::RawDocument(_) => None,
        }
    }

    pub fn annotations_mut(&mut self) -> Option<&mut Annotations> {
        match self {
            Resource::StartDocument(r) => Some(&mut r.annotations),
            Resource::StartSubDocument(r) => Some(&mut r.annotations),
            Resource::StartGroup(r) => Some(&mut r.annotations),
            Resource::Ending(r) => Some(&mut r.annotations),
            Resource::TextUnit(r) => Some(&mut r.annotations),
            Resource::DocumentPart(r) => Some(&mut r.annotations),
            Resource::None | Resource::BatchItem(_) | Resource::RawDocument(_) => None,
        }
    }

    /// A named property of resources that have properties.
    pub fn property(&self, name: &str) -> Option<&str> {
        let properties = match self {
            Resource::StartDocument(r) => &r.properties,
            Resource::StartSubDocument(r) => &r.properties,
            Resource::StartGroup(r) => &r.properties,
            Resource::TextUnit(r) => &r.properties,
            Resource::DocumentPart(r) => &r.properties,
            _ => return None,
        };
        properties.get(name).map(String::as_str)
    }
}
