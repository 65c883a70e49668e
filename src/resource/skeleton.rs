/*!
 * Skeletons: the non-translatable material of a document.
 *
 * A skeleton is an ordered list of literal spans and references. Literals
 * are written back verbatim; a reference is replaced at write time by the
 * current value of a resource's content or of one of its properties.
 */

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a reference substitutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefProperty {
    /// The text content (target, or source when there is no target)
    Content,
    /// A named property of the resource
    Property(String),
}

/// One part of a skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkeletonPart {
    /// Text emitted unchanged
    Literal(String),
    /// Deferred substitution of a resource value
    Reference {
        resource_id: String,
        property: RefProperty,
    },
}

/// Ordered skeleton parts owned by one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skeleton {
    parts: Vec<SkeletonPart>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a skeleton holding one literal.
    pub fn from_literal(text: &str) -> Self {
        let mut skeleton = Self::new();
        skeleton.add_literal(text);
        skeleton
    }

    /// Append literal text, merged with a preceding literal if any.
    pub fn add_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(SkeletonPart::Literal(last)) = self.parts.last_mut() {
            last.push_str(text);
        } else {
            self.parts.push(SkeletonPart::Literal(text.to_string()));
        }
    }

    /// Append a reference to the content of a resource.
    pub fn add_content_ref(&mut self, resource_id: &str) {
        self.parts.push(SkeletonPart::Reference {
            resource_id: resource_id.to_string(),
            property: RefProperty::Content,
        });
    }

    /// Append a reference to a named property of a resource.
    pub fn add_property_ref(&mut self, resource_id: &str, name: &str) {
        self.parts.push(SkeletonPart::Reference {
            resource_id: resource_id.to_string(),
            property: RefProperty::Property(name.to_string()),
        });
    }

    /// Append all parts of another skeleton.
    pub fn append(&mut self, other: &Skeleton) {
        for part in &other.parts {
            match part {
                SkeletonPart::Literal(text) => self.add_literal(text),
                reference => self.parts.push(reference.clone()),
            }
        }
    }

    pub fn parts(&self) -> &[SkeletonPart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Ids of every resource referenced by this skeleton.
    pub fn referenced_ids(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                SkeletonPart::Reference { resource_id, .. } => Some(resource_id.as_str()),
                SkeletonPart::Literal(_) => None,
            })
            .collect()
    }

    /// Rename references with `rename`, leaving literals alone.
    pub fn rename_references<F>(&mut self, rename: F)
    where
        F: Fn(&str) -> String,
    {
        for part in &mut self.parts {
            if let SkeletonPart::Reference { resource_id, .. } = part {
                *resource_id = rename(resource_id);
            }
        }
    }
}

impl fmt::Display for Skeleton {
    /// Debug rendering: literals as is, references as `[#$id]` or `[#$id@name]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            match part {
                SkeletonPart::Literal(text) => f.write_str(text)?,
                SkeletonPart::Reference {
                    resource_id,
                    property: RefProperty::Content,
                } => write!(f, "[#${}]", resource_id)?,
                SkeletonPart::Reference {
                    resource_id,
                    property: RefProperty::Property(name),
                } => write!(f, "[#${}@{}]", resource_id, name)?,
            }
        }
        Ok(())
    }
}
