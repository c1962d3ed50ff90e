//! The subset of Structured Field Values (RFC 8941) used by the
//! `Content-Digest`, `Signature-Input` and `Signature` headers:
//! dictionaries, inner lists of strings with parameters, and byte sequences.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed structured field: {0}")]
pub struct FieldError(&'static str);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BareItem {
    Integer(i64),
    String(String),
    Token(String),
    Boolean(bool),
}

/// `("a" "b");key=value;...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerList {
    pub items: Vec<String>,
    pub params: Vec<(String, BareItem)>,
}

impl InnerList {
    pub fn param(&self, key: &str) -> Option<&BareItem> {
        self.params
            .iter()
            .rev()
            .find(|(name, _)| name == key)
            .map(|(_, item)| item)
    }

    pub fn string_param(&self, key: &str) -> Option<&str> {
        match self.param(key)? {
            BareItem::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn integer_param(&self, key: &str) -> Option<i64> {
        match self.param(key)? {
            BareItem::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

/// Whether `key` is a legal dictionary key / parameter name.
pub fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '*')
        && chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.' | '*')
        })
}

/// Splits a dictionary into `(key, raw member value)` pairs.
///
/// Member values are returned unparsed and trimmed. A repeated key keeps its
/// first position and takes the last value.
pub fn parse_dictionary(input: &str) -> Result<Vec<(String, String)>, FieldError> {
    let mut members: Vec<(String, String)> = Vec::new();
    for member in split_top_level(input)? {
        let member = member.trim();
        if member.is_empty() {
            return Err(FieldError("empty dictionary member"));
        }
        let (key, value) = member.split_once('=').unwrap_or((member, "?1"));
        let key = key.trim();
        if !is_valid_key(key) {
            return Err(FieldError("invalid dictionary key"));
        }
        let value = value.trim().to_string();
        match members.iter_mut().find(|(existing, _)| existing == key) {
            Some(slot) => slot.1 = value,
            None => members.push((key.to_string(), value)),
        }
    }
    Ok(members)
}

pub fn dictionary_get<'a>(members: &'a [(String, String)], key: &str) -> Option<&'a str> {
    members
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

pub fn parse_byte_sequence(value: &str) -> Result<Vec<u8>, FieldError> {
    let encoded = value
        .trim()
        .strip_prefix(':')
        .and_then(|rest| rest.strip_suffix(':'))
        .ok_or(FieldError("byte sequence must be wrapped in colons"))?;
    STANDARD
        .decode(encoded)
        .map_err(|_| FieldError("byte sequence is not base64"))
}

pub fn serialize_byte_sequence(bytes: &[u8]) -> String {
    format!(":{}:", STANDARD.encode(bytes))
}

pub fn serialize_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

pub fn parse_inner_list(value: &str) -> Result<InnerList, FieldError> {
    let mut parser = Parser::new(value.trim());
    let list = parser.inner_list()?;
    parser.skip_spaces();
    if !parser.at_end() {
        return Err(FieldError("trailing characters after inner list"));
    }
    Ok(list)
}

fn split_top_level(input: &str) -> Result<Vec<&str>, FieldError> {
    let mut parts = Vec::new();
    let (mut start, mut depth) = (0, 0usize);
    let (mut in_string, mut escaped) = (false, false);
    for (i, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or(FieldError("unbalanced parenthesis"))?,
            ',' if depth == 0 => {
                parts.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if in_string || depth != 0 {
        return Err(FieldError("unterminated string or inner list"));
    }
    parts.push(&input[start..]);
    Ok(parts)
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8, what: &'static str) -> Result<(), FieldError> {
        if self.peek() != Some(byte) {
            return Err(FieldError(what));
        }
        self.pos += 1;
        Ok(())
    }

    fn inner_list(&mut self) -> Result<InnerList, FieldError> {
        self.expect(b'(', "inner list must start with '('")?;
        let mut items = Vec::new();
        loop {
            self.skip_spaces();
            if self.peek() == Some(b')') {
                self.pos += 1;
                break;
            }
            items.push(self.string()?);
            if !matches!(self.peek(), Some(b' ' | b')')) {
                return Err(FieldError("inner list items must be space separated"));
            }
        }
        let params = self.parameters()?;
        Ok(InnerList { items, params })
    }

    fn parameters(&mut self) -> Result<Vec<(String, BareItem)>, FieldError> {
        let mut params = Vec::new();
        while self.peek() == Some(b';') {
            self.pos += 1;
            self.skip_spaces();
            let key = self.key()?;
            let value = if self.peek() == Some(b'=') {
                self.pos += 1;
                self.bare_item()?
            } else {
                BareItem::Boolean(true)
            };
            params.push((key, value));
        }
        Ok(params)
    }

    fn key(&mut self) -> Result<String, FieldError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, b'_' | b'-' | b'.' | b'*')
            {
                self.pos += 1;
            } else {
                break;
            }
        }
        let key = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| FieldError("key is not ascii"))?;
        if !is_valid_key(key) {
            return Err(FieldError("invalid parameter key"));
        }
        Ok(key.to_string())
    }

    fn bare_item(&mut self) -> Result<BareItem, FieldError> {
        match self.peek() {
            Some(b'"') => self.string().map(BareItem::String),
            Some(b'-' | b'0'..=b'9') => self.integer().map(BareItem::Integer),
            Some(b'?') => {
                self.pos += 1;
                let value = match self.peek() {
                    Some(b'1') => true,
                    Some(b'0') => false,
                    _ => return Err(FieldError("boolean must be ?0 or ?1")),
                };
                self.pos += 1;
                Ok(BareItem::Boolean(value))
            }
            Some(c) if c.is_ascii_alphabetic() || c == b'*' => self.token().map(BareItem::Token),
            _ => Err(FieldError("unsupported bare item")),
        }
    }

    fn string(&mut self) -> Result<String, FieldError> {
        self.expect(b'"', "expected string")?;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(FieldError("unterminated string")),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c @ (b'"' | b'\\')) => out.push(c as char),
                        _ => return Err(FieldError("invalid escape in string")),
                    }
                    self.pos += 1;
                }
                Some(c @ 0x20..=0x7e) => {
                    out.push(c as char);
                    self.pos += 1;
                }
                Some(_) => return Err(FieldError("non-printable character in string")),
            }
        }
    }

    fn integer(&mut self) -> Result<i64, FieldError> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let digits = self.pos - digits_start;
        if digits == 0 || digits > 15 {
            return Err(FieldError("integer must have 1 to 15 digits"));
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|text| text.parse().ok())
            .ok_or(FieldError("invalid integer"))
    }

    fn token(&mut self) -> Result<String, FieldError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || b":/!#$%&'*+-.^_`|~".contains(&c) {
                self.pos += 1;
            } else {
                break;
            }
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map(str::to_string)
            .map_err(|_| FieldError("token is not ascii"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_keeps_raw_values() {
        let members =
            parse_dictionary(r#"sig1=("@method" "content-digest");keyid="a,b", sig2=:AAE=:"#)
                .unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].0, "sig1");
        assert_eq!(members[0].1, r#"("@method" "content-digest");keyid="a,b""#);
        assert_eq!(dictionary_get(&members, "sig2"), Some(":AAE=:"));
    }

    #[test]
    fn dictionary_last_value_wins() {
        let members = parse_dictionary("a=1, b=2, a=3").unwrap();
        assert_eq!(members, vec![("a".into(), "3".into()), ("b".into(), "2".into())]);
    }

    #[test]
    fn dictionary_rejects_bad_input() {
        assert!(parse_dictionary("Sig=1").is_err());
        assert!(parse_dictionary("a=1,,b=2").is_err());
        assert!(parse_dictionary(r#"a=("x"#).is_err());
        assert!(parse_dictionary(r#"a="open"#).is_err());
    }

    #[test]
    fn byte_sequence() {
        assert_eq!(parse_byte_sequence(" :AAE=: ").unwrap(), vec![0, 1]);
        assert!(parse_byte_sequence("AAE=").is_err());
        assert!(parse_byte_sequence(":not base64!:").is_err());
        assert_eq!(serialize_byte_sequence(&[0, 1]), ":AAE=:");
    }

    #[test]
    fn inner_list_with_params() {
        let list = parse_inner_list(
            r#"("@method" "content-digest");created=1700000000;keyid="k\"1";alg="rsa-v1_5-sha256";flag"#,
        )
        .unwrap();
        assert_eq!(list.items, vec!["@method", "content-digest"]);
        assert_eq!(list.integer_param("created"), Some(1_700_000_000));
        assert_eq!(list.string_param("keyid"), Some("k\"1"));
        assert_eq!(list.string_param("alg"), Some("rsa-v1_5-sha256"));
        assert_eq!(list.param("flag"), Some(&BareItem::Boolean(true)));
        assert_eq!(list.string_param("created"), None);
    }

    #[test]
    fn empty_inner_list() {
        let list = parse_inner_list("();keyid=\"k\"").unwrap();
        assert!(list.items.is_empty());
        assert_eq!(list.string_param("keyid"), Some("k"));
    }

    #[test]
    fn inner_list_rejects_garbage() {
        assert!(parse_inner_list(r#""@method""#).is_err());
        assert!(parse_inner_list(r#"("@method""content-digest")"#).is_err());
        assert!(parse_inner_list(r#"("@method") junk"#).is_err());
        assert!(parse_inner_list(r#"("@method");Keyid="x""#).is_err());
        assert!(parse_inner_list(r#"("@method");created=1234567890123456"#).is_err());
    }

    #[test]
    fn string_serialization_escapes() {
        assert_eq!(serialize_string(r#"a"b\c"#), r#""a\"b\\c""#);
        let list = parse_inner_list(&format!("({})", serialize_string(r#"a"b\c"#))).unwrap();
        assert_eq!(list.items, vec![r#"a"b\c"#]);
    }

    #[test]
    fn keys() {
        assert!(is_valid_key("sig1"));
        assert!(is_valid_key("sha-256"));
        assert!(!is_valid_key("1sig"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("Sig"));
    }
}
