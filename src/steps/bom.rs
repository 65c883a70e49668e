/*!
 * Byte order mark conversion on raw documents.
 *
 * Removing only strips a UTF-8 BOM unless non-UTF-8 marks are allowed too;
 * the detected encoding is then recorded on the document, since its bytes
 * no longer say it. Adding follows the declared encoding, and an empty
 * document gets a UTF-8 BOM. A document that already has a BOM is left as is.
 */

use log::debug;

use crate::errors::{PipelineError, PipelineResult};
use crate::event::Event;
use crate::filters::detector::{BomNewlineEncodingDetector, Encoding, UTF8_BOM};
use crate::pipeline::step::{Flow, Step};
use crate::resource::model::Resource;

pub struct BomConversionStep {
    remove: bool,
    also_non_utf8: bool,
}

impl BomConversionStep {
    pub fn new(remove: bool, also_non_utf8: bool) -> Self {
        Self { remove, also_non_utf8 }
    }

    /// Convert `bytes` declared as `encoding`.
    ///
    /// # Returns
    /// * The new bytes, and the encoding to declare when it changed
    pub fn convert(&self, bytes: &[u8], encoding: &str) -> (Vec<u8>, Option<String>) {
        let detector = BomNewlineEncodingDetector::new(bytes, encoding);
        if self.remove {
            if detector.has_utf8_bom() {
                return (bytes[UTF8_BOM.len()..].to_vec(), Some(Encoding::Utf8.name().to_string()));
            }
            if detector.has_bom() && self.also_non_utf8 {
                let detected = detector.encoding().to_string();
                return (bytes[detector.bom_length()..].to_vec(), Some(detected));
            }
            return (bytes.to_vec(), None);
        }

        if bytes.is_empty() {
            return (UTF8_BOM.to_vec(), Some(Encoding::Utf8.name().to_string()));
        }
        if detector.has_bom() {
            return (bytes.to_vec(), None);
        }
        match Encoding::from_name(encoding).and_then(Encoding::bom) {
            Some(bom) => {
                let mut converted = bom.to_vec();
                converted.extend_from_slice(bytes);
                (converted, None)
            }
            None => (bytes.to_vec(), None),
        }
    }
}

impl Step for BomConversionStep {
    fn name(&self) -> &str {
        "bom-conversion"
    }

    fn handle_raw_document(&mut self, mut event: Event) -> PipelineResult<Flow> {
        let Resource::RawDocument(raw) = &mut event.resource else {
            return Err(PipelineError::BadStepInput("RAW_DOCUMENT without raw document".to_string()));
        };
        let bytes = raw.read_bytes()?;
        let (converted, encoding) = self.convert(&bytes, &raw.encoding);
        debug!("'{}': {} -> {} bytes", raw.name, bytes.len(), converted.len());

        raw.set_bytes(converted);
        if let Some(encoding) = encoding {
            raw.encoding = encoding;
        }
        Ok(Flow::Produced(event))
    }
}
