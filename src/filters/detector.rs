/*!
 * Byte order mark, newline and encoding detection.
 *
 * Detection looks at the first bytes for a byte order mark and at the text
 * for the first line break. Decoding and encoding support UTF-8, UTF-16
 * (both byte orders) and ISO-8859-1; other encodings are reported as
 * unsupported.
 */

use std::fmt;

use log::debug;

use crate::errors::FilterError;

pub const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
pub const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
pub const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];
pub const UTF32LE_BOM: &[u8] = &[0xFF, 0xFE, 0x00, 0x00];
pub const UTF32BE_BOM: &[u8] = &[0x00, 0x00, 0xFE, 0xFF];
const UTF7_BOM_START: &[u8] = &[0x2B, 0x2F, 0x76];

/// Line break convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewlineType {
    Cr,
    Lf,
    CrLf,
}

impl NewlineType {
    /// The line break characters
    pub fn as_str(self) -> &'static str {
        match self {
            NewlineType::Cr => "\r",
            NewlineType::Lf => "\n",
            NewlineType::CrLf => "\r\n",
        }
    }

    /// Type of the first line break of a text, LF when there is none.
    pub fn detect(text: &str) -> NewlineType {
        let bytes = text.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'\n' => return NewlineType::Lf,
                b'\r' if bytes.get(i + 1) == Some(&b'\n') => return NewlineType::CrLf,
                b'\r' => return NewlineType::Cr,
                _ => {}
            }
        }
        NewlineType::Lf
    }

    /// Parse a configuration value (`lf`, `crlf` or `cr`).
    pub fn from_name(name: &str) -> Option<NewlineType> {
        match name.to_lowercase().as_str() {
            "lf" => Some(NewlineType::Lf),
            "crlf" => Some(NewlineType::CrLf),
            "cr" => Some(NewlineType::Cr),
            _ => None,
        }
    }
}

impl fmt::Display for NewlineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NewlineType::Cr => "CR",
            NewlineType::Lf => "LF",
            NewlineType::CrLf => "CRLF",
        };
        f.write_str(name)
    }
}

/// Encodings the codec functions can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
}

impl Encoding {
    /// Resolve an encoding name. `UTF-16` without byte order means little endian.
    pub fn from_name(name: &str) -> Option<Encoding> {
        match name.trim().to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Some(Encoding::Utf8),
            "utf-16" | "utf-16le" | "utf16" | "utf16le" => Some(Encoding::Utf16Le),
            "utf-16be" | "utf16be" => Some(Encoding::Utf16Be),
            "iso-8859-1" | "latin1" | "latin-1" | "iso8859-1" => Some(Encoding::Latin1),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Byte order mark of the encoding, if it has one
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            Encoding::Utf8 => Some(UTF8_BOM),
            Encoding::Utf16Le => Some(UTF16LE_BOM),
            Encoding::Utf16Be => Some(UTF16BE_BOM),
            Encoding::Latin1 => None,
        }
    }
}

/// Detects the byte order mark, encoding and newline type of raw bytes.
#[derive(Debug, Clone)]
pub struct BomNewlineEncodingDetector<'a> {
    bytes: &'a [u8],
    default_encoding: String,
    encoding: String,
    bom_length: usize,
    has_utf8_bom: bool,
    has_utf7_bom: bool,
    definitive: bool,
    newline: NewlineType,
}

impl<'a> BomNewlineEncodingDetector<'a> {
    /// Create a detector and run it.
    pub fn new(bytes: &'a [u8], default_encoding: &str) -> Self {
        let mut detector = Self {
            bytes,
            default_encoding: default_encoding.to_string(),
            encoding: default_encoding.to_string(),
            bom_length: 0,
            has_utf8_bom: false,
            has_utf7_bom: false,
            definitive: false,
            newline: NewlineType::Lf,
        };
        detector.detect();
        detector
    }

    fn detect(&mut self) {
        let bytes = self.bytes;
        // UTF-32LE must be checked before UTF-16LE, they share the first two bytes
        let found: Option<(&str, usize)> = if bytes.starts_with(UTF32LE_BOM) {
            Some(("UTF-32LE", 4))
        } else if bytes.starts_with(UTF32BE_BOM) {
            Some(("UTF-32BE", 4))
        } else if bytes.starts_with(UTF8_BOM) {
            self.has_utf8_bom = true;
            Some(("UTF-8", 3))
        } else if bytes.starts_with(UTF16LE_BOM) {
            Some(("UTF-16LE", 2))
        } else if bytes.starts_with(UTF16BE_BOM) {
            Some(("UTF-16BE", 2))
        } else if bytes.starts_with(UTF7_BOM_START) && matches!(bytes.get(3), Some(0x38 | 0x39 | 0x2B | 0x2F)) {
            self.has_utf7_bom = true;
            let length = if bytes.get(3) == Some(&0x38) && bytes.get(4) == Some(&0x2D) { 5 } else { 4 };
            Some(("UTF-7", length))
        } else {
            None
        };

        if let Some((encoding, length)) = found {
            self.encoding = encoding.to_string();
            self.bom_length = length;
            self.definitive = true;
        }

        self.newline = self.detect_newline();
        debug!(
            "Detected encoding {} (bom: {}), newline {}",
            self.encoding,
            self.has_bom(),
            self.newline
        );
    }

    fn detect_newline(&self) -> NewlineType {
        let body = &self.bytes[self.bom_length..];
        let (cr, lf): (&[u8], &[u8]) = match Encoding::from_name(&self.encoding) {
            Some(Encoding::Utf16Le) => (&[0x0D, 0x00], &[0x0A, 0x00]),
            Some(Encoding::Utf16Be) => (&[0x00, 0x0D], &[0x00, 0x0A]),
            _ => (&[0x0D], &[0x0A]),
        };
        let width = cr.len();
        let mut i = 0;
        while i + width <= body.len() {
            let unit = &body[i..i + width];
            if unit == lf {
                return NewlineType::Lf;
            }
            if unit == cr {
                let next = body.get(i + width..i + 2 * width);
                return if next == Some(lf) { NewlineType::CrLf } else { NewlineType::Cr };
            }
            i += width;
        }
        NewlineType::Lf
    }

    /// Encoding from the BOM, or the default encoding
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn default_encoding(&self) -> &str {
        &self.default_encoding
    }

    pub fn has_bom(&self) -> bool {
        self.bom_length > 0
    }

    pub fn has_utf8_bom(&self) -> bool {
        self.has_utf8_bom
    }

    pub fn has_utf7_bom(&self) -> bool {
        self.has_utf7_bom
    }

    /// Length of the byte order mark, 0 when there is none
    pub fn bom_length(&self) -> usize {
        self.bom_length
    }

    /// Whether the encoding comes from a byte order mark rather than the default
    pub fn is_definitive(&self) -> bool {
        self.definitive
    }

    pub fn newline_type(&self) -> NewlineType {
        self.newline
    }
}

/// Text decoded from raw bytes, with what was learned while decoding.
#[derive(Debug, Clone)]
pub struct DecodedText {
    pub text: String,
    /// Name of the encoding used
    pub encoding: String,
    pub has_bom: bool,
    pub newline: NewlineType,
}

/// Decode raw bytes. A byte order mark takes precedence over the declared
/// encoding and is not part of the decoded text.
pub fn decode(bytes: &[u8], declared_encoding: &str, document: &str) -> Result<DecodedText, FilterError> {
    let detector = BomNewlineEncodingDetector::new(bytes, declared_encoding);
    let encoding = Encoding::from_name(detector.encoding())
        .ok_or_else(|| FilterError::UnsupportedEncoding(detector.encoding().to_string()))?;
    let body = &bytes[detector.bom_length()..];

    let malformed = |message: String| FilterError::MalformedInput {
        document: document.to_string(),
        line: 0,
        message,
    };

    let text = match encoding {
        Encoding::Utf8 => String::from_utf8(body.to_vec()).map_err(|e| malformed(format!("invalid UTF-8: {}", e)))?,
        Encoding::Utf16Le | Encoding::Utf16Be => {
            if body.len() % 2 != 0 {
                return Err(malformed("odd number of bytes in UTF-16 input".to_string()));
            }
            let units: Vec<u16> = body
                .chunks_exact(2)
                .map(|pair| match encoding {
                    Encoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
                    _ => u16::from_le_bytes([pair[0], pair[1]]),
                })
                .collect();
            String::from_utf16(&units).map_err(|e| malformed(format!("invalid UTF-16: {}", e)))?
        }
        Encoding::Latin1 => body.iter().map(|b| *b as char).collect(),
    };

    Ok(DecodedText {
        text,
        encoding: encoding.name().to_string(),
        has_bom: detector.has_bom(),
        newline: detector.newline_type(),
    })
}

/// Encode text without byte order mark.
pub fn encode(text: &str, encoding: &str) -> Result<Vec<u8>, FilterError> {
    let encoding = Encoding::from_name(encoding).ok_or_else(|| FilterError::UnsupportedEncoding(encoding.to_string()))?;
    match encoding {
        Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
        Encoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        Encoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        Encoding::Latin1 => text
            .chars()
            .map(|c| {
                u8::try_from(c as u32).map_err(|_| {
                    FilterError::UnsupportedEncoding(format!("U+{:04X} cannot be written as ISO-8859-1", c as u32))
                })
            })
            .collect(),
    }
}

/// Encode text, prefixed with the byte order mark of the encoding when asked.
pub fn encode_with_bom(text: &str, encoding: &str, with_bom: bool) -> Result<Vec<u8>, FilterError> {
    let mut bytes = Vec::new();
    if with_bom {
        if let Some(bom) = Encoding::from_name(encoding).and_then(Encoding::bom) {
            bytes.extend_from_slice(bom);
        }
    }
    bytes.extend(encode(text, encoding)?);
    Ok(bytes)
}
