//! Minimal ISO 10303-21 reader.
//!
//! Reads the HEADER schema name and every simple entity instance of the DATA
//! section into an id-indexed map. No schema knowledge lives here: attribute
//! positions are interpreted by `reader.rs`.

use std::collections::HashMap;

use thiserror::Error;

/// Deepest list or typed-value nesting accepted inside one instance.
const MAX_NESTING: usize = 128;

#[derive(Debug, Error)]
pub enum StepError {
    #[error("not an ISO 10303-21 file")]
    NotStep,

    #[error("missing DATA section")]
    MissingData,

    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("unexpected '{found}' at byte {pos}, expected {expected}")]
    Unexpected {
        pos: usize,
        found: char,
        expected: &'static str,
    },

    #[error("invalid number '{text}' at byte {pos}")]
    InvalidNumber { pos: usize, text: String },

    #[error("values nested deeper than {} levels at byte {pos}", MAX_NESTING)]
    TooDeep { pos: usize },
}

/// A single attribute value of an entity instance.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    Null,
    Derived,
    Integer(i64),
    Real(f64),
    String(String),
    Enum(String),
    Ref(u64),
    Binary(String),
    List(Vec<StepValue>),
    Typed(String, Box<StepValue>),
}

impl StepValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<u64> {
        match self {
            StepValue::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// References held by this value, whether it is a single `#n` or a list of them.
    pub fn ref_ids(&self) -> Vec<u64> {
        match self {
            StepValue::Ref(id) => vec![*id],
            StepValue::List(items) => items.iter().filter_map(StepValue::as_ref_id).collect(),
            _ => vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: u64,
    /// Uppercase as written in the file, e.g. `IFCRAMP`.
    pub type_name: String,
    pub attrs: Vec<StepValue>,
}

impl EntityRecord {
    pub fn attr(&self, index: usize) -> Option<&StepValue> {
        self.attrs.get(index)
    }

    pub fn str_attr(&self, index: usize) -> Option<&str> {
        self.attr(index).and_then(StepValue::as_str)
    }
}

#[derive(Debug, Default)]
pub struct StepFile {
    pub schema: Option<String>,
    pub entities: HashMap<u64, EntityRecord>,
    /// Complex (multi-type) instances are not interpreted, only counted.
    pub skipped_complex: usize,
}

impl StepFile {
    pub fn get(&self, id: u64) -> Option<&EntityRecord> {
        self.entities.get(&id)
    }

    pub fn of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a EntityRecord> {
        self.entities
            .values()
            .filter(move |e| e.type_name == type_name)
    }
}

pub fn parse_step(bytes: &[u8]) -> Result<StepFile, StepError> {
    let mut cursor = Cursor { src: bytes, pos: 0 };
    cursor.skip_ws();
    if !cursor.starts_with(b"ISO-10303-21") {
        return Err(StepError::NotStep);
    }

    let data_start = data_section_start(bytes).ok_or(StepError::MissingData)?;
    let schema = parse_schema(&bytes[..data_start]);

    let mut file = StepFile {
        schema,
        ..Default::default()
    };
    cursor.pos = data_start + b"DATA;".len();

    loop {
        cursor.skip_ws();
        if cursor.at_end() {
            return Err(StepError::UnexpectedEof);
        }
        if cursor.starts_with(b"ENDSEC") {
            break;
        }
        cursor.expect(b'#', "'#' starting an entity instance")?;
        let id = cursor.read_id()?;
        cursor.skip_ws();
        cursor.expect(b'=', "'='")?;
        cursor.skip_ws();

        if cursor.peek() == Some(b'(') {
            cursor.skip_instance()?;
            file.skipped_complex += 1;
            continue;
        }

        let type_name = cursor.read_keyword();
        if type_name.is_empty() {
            return Err(cursor.unexpected("an entity type name"));
        }
        cursor.skip_ws();
        let attrs = match cursor.parse_value(0)? {
            StepValue::List(items) => items,
            _ => return Err(cursor.unexpected("an attribute list")),
        };
        cursor.skip_ws();
        cursor.expect(b';', "';'")?;

        file.entities.insert(
            id,
            EntityRecord {
                id,
                type_name,
                attrs,
            },
        );
    }

    Ok(file)
}

/// Pulls the first schema identifier out of `FILE_SCHEMA(('IFC4X3'))`.
fn parse_schema(header: &[u8]) -> Option<String> {
    let start = find(header, b"FILE_SCHEMA")?;
    let rest = &header[start..];
    let open = rest.iter().position(|&b| b == b'\'')?;
    let close = rest[open + 1..].iter().position(|&b| b == b'\'')?;
    let schema = String::from_utf8_lossy(&rest[open + 1..open + 1 + close]).into_owned();
    (!schema.is_empty()).then_some(schema)
}

/// The `DATA;` keyword following the header's `ENDSEC;`.
fn data_section_start(bytes: &[u8]) -> Option<usize> {
    let header_end = find_keyword(bytes, 0, b"ENDSEC;")?;
    find_keyword(bytes, header_end, b"DATA;")
}

/// First `keyword` at or after `from` outside quoted strings and comments.
fn find_keyword(bytes: &[u8], from: usize, keyword: &[u8]) -> Option<usize> {
    let mut in_string = false;
    let mut i = from;
    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest[0] == b'\'' {
            // a doubled quote toggles twice
            in_string = !in_string;
        } else if !in_string && rest.starts_with(b"/*") {
            i += 2 + find(&rest[2..], b"*/").map_or(rest.len() - 2, |end| end + 2);
            continue;
        } else if !in_string && rest.starts_with(keyword) {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.src[self.pos.min(self.src.len())..].starts_with(prefix)
    }

    fn unexpected(&self, expected: &'static str) -> StepError {
        match self.peek() {
            Some(b) => StepError::Unexpected {
                pos: self.pos,
                found: b as char,
                expected,
            },
            None => StepError::UnexpectedEof,
        }
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), StepError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn skip_ws(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if self.starts_with(b"/*") {
                match find(&self.src[self.pos + 2..], b"*/") {
                    Some(end) => self.pos += 2 + end + 2,
                    None => self.pos = self.src.len(),
                }
            } else {
                break;
            }
        }
    }

    fn read_id(&mut self) -> Result<u64, StepError> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        text.parse::<u64>().map_err(|_| StepError::InvalidNumber {
            pos: start,
            text: text.to_string(),
        })
    }

    fn read_keyword(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).to_ascii_uppercase()
    }

    /// Skips a complex instance body up to and including its terminating ';'.
    fn skip_instance(&mut self) -> Result<(), StepError> {
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'\'' => {
                    self.read_string()?;
                    continue;
                }
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b';' if depth == 0 => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => {}
            }
            self.pos += 1;
        }
        Err(StepError::UnexpectedEof)
    }

    fn parse_value(&mut self, depth: usize) -> Result<StepValue, StepError> {
        self.skip_ws();
        if depth > MAX_NESTING {
            return Err(StepError::TooDeep { pos: self.pos });
        }
        let b = self.peek().ok_or(StepError::UnexpectedEof)?;
        match b {
            b'$' => {
                self.pos += 1;
                Ok(StepValue::Null)
            }
            b'*' => {
                self.pos += 1;
                Ok(StepValue::Derived)
            }
            b'\'' => Ok(StepValue::String(self.read_string()?)),
            b'"' => {
                self.pos += 1;
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c != b'"') {
                    self.pos += 1;
                }
                let raw = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.expect(b'"', "closing '\"'")?;
                Ok(StepValue::Binary(raw))
            }
            b'.' => {
                self.pos += 1;
                let name = self.read_keyword();
                self.expect(b'.', "closing '.' of an enumeration")?;
                Ok(StepValue::Enum(name))
            }
            b'#' => {
                self.pos += 1;
                Ok(StepValue::Ref(self.read_id()?))
            }
            b'(' => {
                self.pos += 1;
                let mut items = Vec::new();
                self.skip_ws();
                if self.peek() == Some(b')') {
                    self.pos += 1;
                    return Ok(StepValue::List(items));
                }
                loop {
                    items.push(self.parse_value(depth + 1)?);
                    self.skip_ws();
                    match self.peek() {
                        Some(b',') => self.pos += 1,
                        Some(b')') => {
                            self.pos += 1;
                            return Ok(StepValue::List(items));
                        }
                        _ => return Err(self.unexpected("',' or ')'")),
                    }
                }
            }
            b'0'..=b'9' | b'-' | b'+' => self.read_number(),
            c if c.is_ascii_alphabetic() => {
                let name = self.read_keyword();
                self.skip_ws();
                self.expect(b'(', "'(' after a typed value")?;
                let inner = self.parse_value(depth + 1)?;
                self.skip_ws();
                self.expect(b')', "')' closing a typed value")?;
                Ok(StepValue::Typed(name, Box::new(inner)))
            }
            _ => Err(self.unexpected("an attribute value")),
        }
    }

    fn read_number(&mut self) -> Result<StepValue, StepError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'0'..=b'9' | b'+' | b'-' | b'.' | b'E' | b'e')
        ) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap_or_default();
        let invalid = || StepError::InvalidNumber {
            pos: start,
            text: text.to_string(),
        };
        if text.contains(|c: char| matches!(c, '.' | 'E' | 'e')) {
            text.parse::<f64>().map(StepValue::Real).map_err(|_| invalid())
        } else {
            text.parse::<i64>()
                .map(StepValue::Integer)
                .map_err(|_| invalid())
        }
    }

    /// Reads a quoted string starting at the opening quote and decodes its escapes.
    fn read_string(&mut self) -> Result<String, StepError> {
        self.expect(b'\'', "opening quote")?;
        let mut raw = Vec::new();
        loop {
            match self.peek() {
                None => return Err(StepError::UnexpectedEof),
                Some(b'\'') => {
                    if self.src.get(self.pos + 1) == Some(&b'\'') {
                        raw.push(b'\'');
                        self.pos += 2;
                    } else {
                        self.pos += 1;
                        break;
                    }
                }
                Some(b) => {
                    raw.push(b);
                    self.pos += 1;
                }
            }
        }
        Ok(decode_step_string(&String::from_utf8_lossy(&raw)))
    }
}

/// Decodes the control directives of ISO 10303-21 strings.
///
/// Unknown or malformed directives are kept verbatim.
pub fn decode_step_string(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '\\' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        let rest: String = chars[i..chars.len().min(i + 4)].iter().collect();

        if rest.starts_with("\\\\") {
            out.push('\\');
            i += 2;
        } else if rest.starts_with("\\S\\") && i + 3 < chars.len() {
            let base = chars[i + 3] as u32;
            out.push(char::from_u32(base + 0x80).unwrap_or(chars[i + 3]));
            i += 4;
        } else if rest.starts_with("\\X\\") {
            let hex: String = chars[i + 3..chars.len().min(i + 5)].iter().collect();
            match u8::from_str_radix(&hex, 16) {
                Ok(byte) if hex.len() == 2 => {
                    out.push(byte as char);
                    i += 5;
                }
                _ => {
                    out.push('\\');
                    i += 1;
                }
            }
        } else if rest.starts_with("\\X2\\") || rest.starts_with("\\X4\\") {
            let width = if rest.starts_with("\\X2\\") { 4 } else { 8 };
            let body_start = i + 4;
            let end = (body_start..chars.len().saturating_sub(3))
                .find(|&j| chars[j..j + 4].iter().collect::<String>() == "\\X0\\");
            let Some(end) = end else {
                out.push('\\');
                i += 1;
                continue;
            };
            let body: String = chars[body_start..end].iter().collect();
            out.push_str(&decode_hex_units(&body, width));
            i = end + 4;
        } else if rest.starts_with("\\P") && rest.len() == 4 && rest.ends_with('\\') {
            // code page switch; ASCII content is unaffected
            i += 4;
        } else {
            out.push('\\');
            i += 1;
        }
    }
    out
}

fn decode_hex_units(body: &str, width: usize) -> String {
    let digits: Vec<char> = body.chars().collect();
    if width == 4 {
        let units: Vec<u16> = digits
            .chunks(4)
            .filter_map(|c| u16::from_str_radix(&c.iter().collect::<String>(), 16).ok())
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        digits
            .chunks(8)
            .filter_map(|c| u32::from_str_radix(&c.iter().collect::<String>(), 16).ok())
            .filter_map(char::from_u32)
            .collect()
    }
}
