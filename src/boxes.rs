use crate::error::ParseError;
use crate::schema::Payload;
use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        FourCC(*bytes)
    }

    /// Big-endian integer form, as the code is stored on disk.
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Every byte maps to one character (Latin-1), so the rendering is
    /// lossless and always four characters long.
    pub fn as_string(&self) -> String {
        self.0.iter().map(|&c| c as char).collect()
    }

    pub fn as_str_lossy(&self) -> String {
        self.0
            .iter()
            .map(|&c| if (32..=126).contains(&c) { c as char } else { '.' })
            .collect()
    }
}

impl From<u32> for FourCC {
    fn from(v: u32) -> Self {
        FourCC(v.to_be_bytes())
    }
}

impl From<FourCC> for u32 {
    fn from(cc: FourCC) -> Self {
        cc.as_u32()
    }
}

impl FromStr for FourCC {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 4];
        let mut n = 0;
        for c in s.chars() {
            let b = u8::try_from(u32::from(c))
                .map_err(|_| ParseError::InvalidTypeName(s.to_string()))?;
            if n == 4 {
                return Err(ParseError::InvalidTypeName(s.to_string()));
            }
            out[n] = b;
            n += 1;
        }
        if n != 4 {
            return Err(ParseError::InvalidTypeName(s.to_string()));
        }
        Ok(FourCC(out))
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str_lossy())
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// Index of a box inside its [`ParseResult`](crate::ParseResult) arena.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct BoxId(pub(crate) usize);

impl BoxId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One decoded atom.
#[derive(Debug, Clone)]
pub struct AtomBox {
    pub typ: FourCC,
    /// Declared size, header included.
    pub size: u32,
    /// Absolute offset of the header in the source buffer.
    pub offset: u64,
    /// Content bytes actually available to this box: the declared content
    /// clamped to what remains of the enclosing container.
    pub content_len: u32,
    pub children: Vec<BoxId>,
    /// Decoded fields, present only for types with a registered schema.
    pub payload: Option<Payload>,
}

impl AtomBox {
    pub const HEADER_SIZE: u32 = 8;

    pub fn name(&self) -> String {
        self.typ.as_string()
    }

    pub fn content_offset(&self) -> u64 {
        self.offset + u64::from(Self::HEADER_SIZE)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
