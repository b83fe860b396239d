use crate::decode::Decoded;
use crate::error::ParseError;
use crate::expr::CountExpr;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;

/// What one element of a field is read as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    U8,
    U16,
    U32,
    U64,
    PascalString,
    ZeroTerminatedString,
    /// Another schema in the same registry, decoded once per element.
    Nested(String),
}

impl ElementKind {
    pub fn is_nested(&self) -> bool {
        matches!(self, ElementKind::Nested(_))
    }

    /// Fewest bytes one element can occupy; unknown for nested schemas.
    pub fn min_width(&self) -> Option<usize> {
        match self {
            ElementKind::U8 | ElementKind::PascalString | ElementKind::ZeroTerminatedString => {
                Some(1)
            }
            ElementKind::U16 => Some(2),
            ElementKind::U32 => Some(4),
            ElementKind::U64 => Some(8),
            ElementKind::Nested(_) => None,
        }
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "8u" => ElementKind::U8,
            "16u" => ElementKind::U16,
            "32u" => ElementKind::U32,
            "64u" => ElementKind::U64,
            "PascalString" => ElementKind::PascalString,
            "ZeroTerminatedString" => ElementKind::ZeroTerminatedString,
            other => match other.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(id) if !id.trim().is_empty() => ElementKind::Nested(id.trim().to_string()),
                _ => return Err(format!("unknown element type `{}`", other)),
            },
        })
    }
}

/// How many elements a field holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Count {
    /// No count declared: exactly one element.
    Implicit,
    /// A declared count; the field always decodes to a sequence.
    Expr(CountExpr),
}

/// What to do when an element does not match the expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMismatch {
    /// Stop decoding this payload and keep what was read so far.
    Abort,
    #[default]
    Throw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Seconds since 1904-01-01T00:00:00Z.
    Date,
    /// Unsigned 16.16 fixed point.
    Fixed32,
    /// Unsigned 8.8 fixed point.
    Fixed16,
    /// Four-character code.
    Code,
    /// 3x3 transform of 16.16 and 2.30 fixed-point values.
    Matrix,
    /// Name bytes, either a C string or a length-prefixed string.
    Text,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "date" => Encoding::Date,
            "fixed32" => Encoding::Fixed32,
            "fixed16" => Encoding::Fixed16,
            "code" => Encoding::Code,
            "matrix" => Encoding::Matrix,
            "text" => Encoding::Text,
            other => return Err(format!("unknown encoding `{}`", other)),
        })
    }
}

/// One entry of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Empty for padding: the bytes are read and checked but never stored.
    pub name: String,
    pub kind: ElementKind,
    pub count: Count,
    pub expected: Option<String>,
    pub on_mismatch: OnMismatch,
    pub encoding: Option<Encoding>,
}

impl FieldDescriptor {
    pub fn new(name: &str, kind: ElementKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            count: Count::Implicit,
            expected: None,
            on_mismatch: OnMismatch::Throw,
            encoding: None,
        }
    }

    pub fn padding(kind: ElementKind) -> Self {
        Self::new("", kind)
    }

    /// u8 field, the most common kind in box headers.
    pub fn u8(name: &str) -> Self {
        Self::new(name, ElementKind::U8)
    }

    pub fn u16(name: &str) -> Self {
        Self::new(name, ElementKind::U16)
    }

    pub fn u32(name: &str) -> Self {
        Self::new(name, ElementKind::U32)
    }

    pub fn u64(name: &str) -> Self {
        Self::new(name, ElementKind::U64)
    }

    pub fn nested(name: &str, schema: &str) -> Self {
        Self::new(name, ElementKind::Nested(schema.to_string()))
    }

    pub fn count(mut self, n: i64) -> Self {
        self.count = Count::Expr(CountExpr::literal(n));
        self
    }

    pub fn count_of(mut self, expr: CountExpr) -> Self {
        self.count = Count::Expr(expr);
        self
    }

    pub fn count_expr(mut self, expr: &str) -> Result<Self, ParseError> {
        self.count = Count::Expr(CountExpr::parse(expr)?);
        Ok(self)
    }

    pub fn expect(mut self, value: &str) -> Self {
        self.expected = Some(value.to_string());
        self
    }

    pub fn or_abort(mut self) -> Self {
        self.on_mismatch = OnMismatch::Abort;
        self
    }

    pub fn encoding(mut self, enc: Encoding) -> Self {
        self.encoding = Some(enc);
        self
    }

    pub fn is_padding(&self) -> bool {
        self.name.is_empty()
    }

    /// Whether the decoded value is always a sequence, whatever the count.
    pub fn is_array(&self) -> bool {
        matches!(self.count, Count::Expr(_)) || self.kind.is_nested()
    }
}

/// Parses the compact form `name #t:32u,c:{n},e:0,b:abort,i:date`.
///
/// Keys: `t` element type (required), `c` count expression, `e` expected
/// value, `b` mismatch behaviour (`abort` or `throw`), `i` encoding.
impl FromStr for FieldDescriptor {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| ParseError::InvalidDescriptor {
            descriptor: s.to_string(),
            reason,
        };
        let (name, props) = s
            .split_once('#')
            .ok_or_else(|| invalid("missing `#`".into()))?;

        let mut kind = None;
        let mut out = FieldDescriptor::new(name.trim(), ElementKind::U8);
        // `{a} > 0 ? 1 : 0` contains ':' and ',' never appears in an
        // expression, so split on ',' first and then on the first ':'.
        for prop in props.split(',') {
            let (key, value) = prop
                .split_once(':')
                .ok_or_else(|| invalid(format!("property `{}` has no value", prop.trim())))?;
            let value = value.trim();
            match key.trim() {
                "t" => kind = Some(value.parse::<ElementKind>().map_err(invalid)?),
                "c" => out.count = Count::Expr(CountExpr::parse(value)?),
                "e" => out.expected = Some(value.to_string()),
                "b" => {
                    out.on_mismatch = match value {
                        "abort" => OnMismatch::Abort,
                        "throw" => OnMismatch::Throw,
                        other => return Err(invalid(format!("unknown behaviour `{}`", other))),
                    }
                }
                "i" => out.encoding = Some(value.parse::<Encoding>().map_err(invalid)?),
                other => return Err(invalid(format!("unknown property `{}`", other))),
            }
        }
        out.kind = kind.ok_or_else(|| invalid("missing `t:` element type".into()))?;
        Ok(out)
    }
}

/// A single decoded element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    UInt(u64),
    Text(String),
    Struct(Payload),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Payload> {
        match self {
            Value::Struct(p) => Some(p),
            _ => None,
        }
    }
}

/// The text an expected-value constraint is compared against.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::UInt(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Struct(_) => f.write_str("[struct]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Scalar(Value),
    Sequence(Vec<Value>),
}

impl RawValue {
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            RawValue::Scalar(v) => Some(v),
            RawValue::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            RawValue::Scalar(_) => None,
            RawValue::Sequence(items) => Some(items),
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_scalar().and_then(Value::as_u64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    pub raw: RawValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded: Option<Decoded>,
    #[serde(skip)]
    pub(crate) pending: Option<Encoding>,
}

impl FieldValue {
    pub fn new(raw: RawValue, encoding: Option<Encoding>) -> Self {
        Self {
            raw,
            decoded: None,
            pending: encoding,
        }
    }

    /// The encoding still waiting for the decode pass, if any.
    pub fn pending_encoding(&self) -> Option<Encoding> {
        self.pending
    }
}

/// Named fields in schema declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, FieldValue)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// A repeated name replaces the earlier value in place.
    pub fn insert(&mut self, name: String, value: FieldValue) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut FieldValue> {
        self.fields.iter_mut().map(|(_, v)| v)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
