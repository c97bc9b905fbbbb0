use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;
use types::TelemetryValue;

const FLOAT_PREFIX: &str = "fl_";
const FLOAT_DIGITS: usize = 8;
const UNSIGNED_PREFIX_LEN: usize = 3;
const UNSIGNED_MAX_DIGITS: usize = 16;

/// Categories and fields requested by the connectivity probe.
pub const PROBE_FIELDS: &[(&str, &[&str])] = &[("STATISTIC", &["STAT_DAY_E_HOUSE"])];

/// Categories and fields requested on every poll. Each entry must have a catalog entry.
pub const POLL_FIELDS: &[(&str, &[&str])] = &[
    (
        "STATISTIC",
        &[
            "STAT_DAY_E_HOUSE",
            "STAT_DAY_E_PV",
            "STAT_DAY_BAT_CHARGE",
            "STAT_DAY_BAT_DISCHARGE",
            "STAT_DAY_E_GRID_IMPORT",
            "STAT_DAY_E_GRID_EXPORT",
        ],
    ),
    (
        "ENERGY",
        &[
            "STAT_STATE",
            "GUI_BAT_DATA_POWER",
            "GUI_INVERTER_POWER",
            "GUI_HOUSE_POW",
            "GUI_GRID_POW",
            "STAT_MAINT_REQUIRED",
            "GUI_BAT_DATA_FUEL_CHARGE",
            "GUI_CHARGING_INFO",
            "GUI_BOOSTING_INFO",
        ],
    ),
    ("WIZARD", &["CONFIG_LOADED"]),
    ("SYS_UPDATE", &["UPDATE_AVAILABLE"]),
];

/// A decoded device numeral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeral {
    Unsigned(u64),
    /// Reconstructed single-precision value, rounded to two decimals.
    Float(f64),
}

impl Numeral {
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Unsigned(v) => *v == 0,
            Self::Float(v) => *v == 0.0,
        }
    }

    /// Integer view used for status-code lookups. Fractional or negative floats have none.
    pub fn as_code(&self) -> Option<u64> {
        match self {
            Self::Unsigned(v) => Some(*v),
            Self::Float(v) if *v >= 0.0 && v.fract() == 0.0 && *v <= u64::MAX as f64 => {
                Some(*v as u64)
            }
            Self::Float(_) => None,
        }
    }
}

impl From<Numeral> for TelemetryValue {
    fn from(value: Numeral) -> Self {
        match value {
            Numeral::Unsigned(v) => TelemetryValue::Integer(v),
            Numeral::Float(v) => TelemetryValue::Float(v),
        }
    }
}

impl fmt::Display for Numeral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:.2}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("unrecognized numeral convention: {0:?}")]
    UnknownPrefix(String),
    #[error("float numeral must carry exactly 8 hex digits: {0:?}")]
    FloatWidth(String),
    #[error("invalid hex digits in numeral: {0:?}")]
    InvalidHex(String),
}

/// Every variant is a malformed payload; encoding failures keep the offending key.
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected an object at {0}")]
    NotAnObject(String),
    #[error("unexpected nesting below {0}")]
    TooDeep(String),
    #[error("expected a string value at {0}")]
    NotAString(String),
    #[error("invalid encoding at {key}: {source}")]
    Encoding {
        key: String,
        #[source]
        source: EncodingError,
    },
}

/// Decodes one `fl_XXXXXXXX` or `u?_X...` numeral string.
pub fn decode_value(raw: &str) -> Result<Numeral, EncodingError> {
    if let Some(digits) = raw.strip_prefix(FLOAT_PREFIX) {
        return hex_to_float32(digits, raw).map(Numeral::Float);
    }
    if is_unsigned_prefix(raw) {
        let digits = &raw[UNSIGNED_PREFIX_LEN..];
        if !is_hex(digits) || digits.len() > UNSIGNED_MAX_DIGITS {
            return Err(EncodingError::InvalidHex(raw.to_string()));
        }
        let value = u64::from_str_radix(digits, 16)
            .map_err(|_| EncodingError::InvalidHex(raw.to_string()))?;
        return Ok(Numeral::Unsigned(value));
    }
    Err(EncodingError::UnknownPrefix(raw.to_string()))
}

// `u`, one width marker (`u8_`, `u1_`, `u3_`, `u6_` on real devices), then `_`.
fn is_unsigned_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() > UNSIGNED_PREFIX_LEN
        && bytes[0] == b'u'
        && bytes[1].is_ascii_alphanumeric()
        && bytes[2] == b'_'
}

fn is_hex(digits: &str) -> bool {
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Rebuilds an IEEE-754 single from its bit pattern by summing mantissa bits.
/// Subnormals and the special exponents are not treated specially.
fn hex_to_float32(digits: &str, raw: &str) -> Result<f64, EncodingError> {
    if digits.len() != FLOAT_DIGITS {
        return Err(EncodingError::FloatWidth(raw.to_string()));
    }
    if !is_hex(digits) {
        return Err(EncodingError::InvalidHex(raw.to_string()));
    }
    let bits =
        u32::from_str_radix(digits, 16).map_err(|_| EncodingError::InvalidHex(raw.to_string()))?;
    if bits == 0 {
        return Ok(0.0);
    }

    let sign = if bits >> 31 == 1 { -1.0 } else { 1.0 };
    let mut exponent = ((bits >> 23) & 0xFF) as i32 - 127;
    let mantissa = (bits & 0x7F_FFFF) + 0x80_0000;

    let mut sum = 0.0f64;
    for bit in (0..24).rev() {
        if (mantissa >> bit) & 1 == 1 {
            sum += 2f64.powi(exponent);
        }
        exponent -= 1;
    }

    Ok(round_two_places(sign * sum))
}

fn round_two_places(value: f64) -> f64 {
    let rounded = (value * 100.0).round() / 100.0;
    // fold -0.0 into 0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// One leaf of a telemetry document.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField {
    pub category: String,
    pub field: String,
    pub raw: Numeral,
}

impl DecodedField {
    pub fn key(&self) -> String {
        composite_key(&self.category, &self.field)
    }
}

/// Decoded fields in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetrySnapshot {
    fields: Vec<DecodedField>,
}

impl TelemetrySnapshot {
    pub fn fields(&self) -> &[DecodedField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, category: &str, field: &str) -> Option<Numeral> {
        self.fields
            .iter()
            .find(|item| item.category == category && item.field == field)
            .map(|item| item.raw)
    }
}

pub fn composite_key(category: &str, field: &str) -> String {
    format!("{category}.{field}")
}

/// Parses a `{"CATEGORY":{"FIELD":"<numeral>"}}` document and decodes every leaf.
pub fn decode_document(body: &str) -> Result<TelemetrySnapshot, ParserError> {
    let root: Value = serde_json::from_str(body)?;
    let Value::Object(categories) = root else {
        return Err(ParserError::NotAnObject("document root".to_string()));
    };

    let mut fields = Vec::new();
    for (category, entries) in categories {
        let Value::Object(entries) = entries else {
            return Err(ParserError::NotAnObject(category));
        };

        for (field, leaf) in entries {
            let key = composite_key(&category, &field);
            let raw = match leaf {
                Value::String(raw) => raw,
                Value::Object(_) | Value::Array(_) => return Err(ParserError::TooDeep(key)),
                _ => return Err(ParserError::NotAString(key)),
            };
            let value = match decode_value(&raw) {
                Ok(value) => value,
                Err(source) => return Err(ParserError::Encoding { key, source }),
            };
            fields.push(DecodedField {
                category: category.clone(),
                field,
                raw: value,
            });
        }
    }

    debug!(fields = fields.len(), "telemetry document decoded");
    Ok(TelemetrySnapshot { fields })
}

/// Builds a request body asking for `fields`, each with an empty value.
pub fn request_body(fields: &[(&str, &[&str])]) -> String {
    let mut root = Map::new();
    for (category, names) in fields {
        let entries: Map<String, Value> = names
            .iter()
            .map(|name| (name.to_string(), Value::String(String::new())))
            .collect();
        root.insert(category.to_string(), Value::Object(entries));
    }
    Value::Object(root).to_string()
}

pub fn probe_request() -> String {
    request_body(PROBE_FIELDS)
}

pub fn poll_request() -> String {
    request_body(POLL_FIELDS)
}
