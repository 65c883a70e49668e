/*!
 * Reproducible id generation.
 *
 * Ids are derived from a root string so that running the same extraction
 * twice with the same root yields the same ids.
 */

use crate::errors::ResourceError;

pub const START_GROUP: &str = "sg";
pub const END_GROUP: &str = "eg";
pub const TEXT_UNIT: &str = "tu";
pub const DOCUMENT_PART: &str = "dp";
pub const START_SUBDOCUMENT: &str = "ssd";
pub const END_SUBDOCUMENT: &str = "esd";

/// Generates ids of the form `<root>-<prefix><n>`.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    root_id: String,
    prefix: String,
    seq: u64,
}

impl IdGenerator {
    /// Create a generator. The root is hashed into a short id.
    pub fn new(root: &str, prefix: &str) -> Result<Self, ResourceError> {
        Ok(Self {
            root_id: make_root_id(root)?,
            prefix: prefix.to_string(),
            seq: 0,
        })
    }

    /// Start again from a new root.
    pub fn reset(&mut self, root: &str) -> Result<(), ResourceError> {
        self.root_id = make_root_id(root)?;
        self.seq = 0;
        Ok(())
    }

    /// Next id.
    pub fn create_id(&mut self) -> String {
        self.seq += 1;
        self.format_id(self.seq)
    }

    /// Last id created, if any.
    pub fn last_id(&self) -> Option<String> {
        (self.seq > 0).then(|| self.format_id(self.seq))
    }

    /// The hashed root.
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    fn format_id(&self, seq: u64) -> String {
        format!("{}-{}{}", self.root_id, self.prefix, seq)
    }
}

/// Hash a root string into `P` followed by the upper-case hexadecimal of its
/// 32-bit string hash (`h = 31 * h + unit` over UTF-16 units).
fn make_root_id(root: &str) -> Result<String, ResourceError> {
    if root.is_empty() {
        return Err(ResourceError::EmptyIdRoot);
    }
    let hash = root
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    Ok(format!("P{:X}", hash as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idGenerator_createId_shouldBeReproducible() {
        let mut generator = IdGenerator::new("test", "p").unwrap();
        assert_eq!(generator.root_id(), "P364492");
        assert_eq!(generator.last_id(), None);
        assert_eq!(generator.create_id(), "P364492-p1");
        assert_eq!(generator.create_id(), "P364492-p2");
        assert_eq!(generator.last_id().as_deref(), Some("P364492-p2"));

        let mut other = IdGenerator::new("test", "p").unwrap();
        assert_eq!(other.create_id(), "P364492-p1");
    }

    #[test]
    fn test_idGenerator_reset_shouldRestartSequence() {
        let mut generator = IdGenerator::new("test", START_GROUP).unwrap();
        generator.create_id();
        generator.reset("test/A/b/C").unwrap();

        assert_eq!(generator.create_id(), "P269F9F4B-sg1");
    }

    #[test]
    fn test_idGenerator_emptyRoot_shouldFail() {
        assert_eq!(IdGenerator::new("", "p").unwrap_err(), ResourceError::EmptyIdRoot);
    }
}
