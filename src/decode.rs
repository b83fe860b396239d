//! Post-pass that turns tagged raw integers into their meaning.

use crate::boxes::FourCC;
use crate::schema::{Encoding, FieldValue, Payload, RawValue, Value};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds from 1904-01-01T00:00:00Z to 1970-01-01T00:00:00Z.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

const FIXED_16_16: f64 = 1.0 / 65536.0;
const FIXED_2_30: f64 = 1.0 / 1_073_741_824.0;

/// An instant, stored as seconds relative to the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    unix_seconds: i64,
}

impl Timestamp {
    pub fn from_mac_seconds(raw: u64) -> Self {
        // raw fits in i64 for every 32- and 64-bit field that is not absurd;
        // saturate rather than wrap for the rest
        let raw = i64::try_from(raw).unwrap_or(i64::MAX);
        Self {
            unix_seconds: raw.saturating_sub(MAC_EPOCH_OFFSET),
        }
    }

    pub fn unix_seconds(&self) -> i64 {
        self.unix_seconds
    }

    pub fn to_system_time(&self) -> Option<SystemTime> {
        let magnitude = Duration::from_secs(self.unix_seconds.unsigned_abs());
        if self.unix_seconds >= 0 {
            UNIX_EPOCH.checked_add(magnitude)
        } else {
            UNIX_EPOCH.checked_sub(magnitude)
        }
    }
}

/// RFC 3339, UTC, second precision.
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.unix_seconds.div_euclid(86_400);
        let secs = self.unix_seconds.rem_euclid(86_400);
        let (y, m, d) = civil_from_days(days);
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            y,
            m,
            d,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Proleptic Gregorian date for a day count relative to 1970-01-01.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Decoded {
    Date(Timestamp),
    Fixed(f64),
    Code(String),
    Matrix([[f64; 3]; 3]),
    Text(String),
    /// Element-wise decoding of a tagged sequence.
    Sequence(Vec<Decoded>),
}

impl Decoded {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Decoded::Fixed(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_code(&self) -> Option<&str> {
        match self {
            Decoded::Code(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Decoded::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<Timestamp> {
        match self {
            Decoded::Date(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&[[f64; 3]; 3]> {
        match self {
            Decoded::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

pub fn fixed_point(raw: u64, frac_bits: u32) -> f64 {
    raw as f64 / (1u64 << frac_bits) as f64
}

/// Row-major 3x3; the last column is 2.30, everything else 16.16.
pub fn matrix(raw: &[u64; 9]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, &v) in raw.iter().enumerate() {
        let scale = if i % 3 == 2 { FIXED_2_30 } else { FIXED_16_16 };
        out[i / 3][i % 3] = v as f64 * scale;
    }
    out
}

fn decode_scalar(enc: Encoding, raw: u64) -> Option<Decoded> {
    match enc {
        Encoding::Date => Some(Decoded::Date(Timestamp::from_mac_seconds(raw))),
        Encoding::Fixed32 => Some(Decoded::Fixed(fixed_point(raw, 16))),
        Encoding::Fixed16 => Some(Decoded::Fixed(fixed_point(raw, 8))),
        Encoding::Code => u32::try_from(raw)
            .ok()
            .map(|v| Decoded::Code(FourCC::from(v).as_string())),
        Encoding::Matrix | Encoding::Text => None,
    }
}

/// Renders handler-style name bytes.
///
/// A leading length byte is stripped when it covers the rest of the bytes
/// (QuickTime Pascal form, possibly zero padded); otherwise the bytes are a
/// C string. Text ends at the first zero byte either way.
pub fn name_text(bytes: &[u8]) -> String {
    let body = match bytes.split_first() {
        Some((&len, rest))
            if usize::from(len) <= rest.len()
                && rest[usize::from(len)..].iter().all(|&b| b == 0) =>
        {
            &rest[..usize::from(len)]
        }
        _ => bytes,
    };
    body.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

pub fn decode_raw(enc: Encoding, raw: &RawValue) -> Option<Decoded> {
    match (enc, raw) {
        (Encoding::Matrix, RawValue::Sequence(items)) => {
            let nums: Vec<u64> = items.iter().filter_map(Value::as_u64).collect();
            let nine: [u64; 9] = nums.try_into().ok()?;
            Some(Decoded::Matrix(matrix(&nine)))
        }
        (Encoding::Text, RawValue::Sequence(items)) => items
            .iter()
            .map(|v| v.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(|bytes| Decoded::Text(name_text(&bytes))),
        (_, RawValue::Scalar(Value::UInt(v))) => decode_scalar(enc, *v),
        (_, RawValue::Sequence(items)) => items
            .iter()
            .map(|item| item.as_u64().and_then(|v| decode_scalar(enc, v)))
            .collect::<Option<Vec<_>>>()
            .map(Decoded::Sequence),
        _ => None,
    }
}

fn decode_field(field: &mut FieldValue) {
    if let Some(enc) = field.pending.take() {
        field.decoded = decode_raw(enc, &field.raw);
        if field.decoded.is_none() {
            log::debug!("cannot apply {:?} encoding to {:?}", enc, field.raw);
        }
    }
}

/// Decodes every tagged field of `payload`, nested structures included.
pub fn decode_payload(payload: &mut Payload) {
    let mut stack = vec![payload];
    while let Some(p) = stack.pop() {
        for field in p.values_mut() {
            decode_field(field);
            match &mut field.raw {
                RawValue::Scalar(Value::Struct(inner)) => stack.push(inner),
                RawValue::Sequence(items) => {
                    for item in items.iter_mut() {
                        if let Value::Struct(inner) = item {
                            stack.push(inner);
                        }
                    }
                }
                RawValue::Scalar(_) => {}
            }
        }
    }
}
