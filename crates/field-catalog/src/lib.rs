//! Static metadata for the fields a Senec appliance reports.
//!
//! Every `(category, field)` pair maps to a description, a unit and a value
//! transform. Pairs without an entry still resolve, to a generic description with
//! the raw value passed through.

mod status;

use senec_parser::Numeral;
use types::TelemetryValue;

pub use status::STATUS_CODES;

/// Catalog field used to translate `ENERGY.STAT_STATE` into text.
pub const STATE_TEXT_FIELD: &str = "STAT_STATE-Text";
/// Published key of the synthesized system-state text.
pub const STATE_TEXT_KEY: &str = "ENERGY.STAT_STATE_Text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    None,
    Watt,
    KilowattHour,
    Percent,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Watt => "W",
            Self::KilowattHour => "kWh",
            Self::Percent => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Identity,
    /// `true` for any non-zero raw value.
    BooleanFromZero,
    /// System-state label from [`status_label`].
    StatusText,
}

impl Transform {
    pub fn apply(&self, raw: Numeral) -> TelemetryValue {
        match self {
            Self::Identity => raw.into(),
            Self::BooleanFromZero => TelemetryValue::Bool(!raw.is_zero()),
            Self::StatusText => TelemetryValue::Text(match raw.as_code() {
                Some(code) => status_label(code),
                None => unknown_status(raw),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub description: &'static str,
    pub unit: Unit,
    pub transform: Transform,
}

const fn entry(description: &'static str, unit: Unit, transform: Transform) -> CatalogEntry {
    CatalogEntry {
        description,
        unit,
        transform,
    }
}

const CATALOG: &[(&str, &str, CatalogEntry)] = &[
    ("ENERGY", "STAT_STATE", entry("System Mode", Unit::None, Transform::Identity)),
    ("ENERGY", STATE_TEXT_FIELD, entry("System Mode", Unit::None, Transform::StatusText)),
    ("ENERGY", "GUI_BAT_DATA_FUEL_CHARGE", entry("Accu Level", Unit::Percent, Transform::Identity)),
    ("ENERGY", "GUI_INVERTER_POWER", entry("PV Power current", Unit::Watt, Transform::Identity)),
    ("ENERGY", "GUI_GRID_POW", entry("Net Power current", Unit::Watt, Transform::Identity)),
    ("ENERGY", "GUI_BAT_DATA_POWER", entry("Accu Power current", Unit::Watt, Transform::Identity)),
    ("ENERGY", "GUI_HOUSE_POW", entry("House Power current", Unit::Watt, Transform::Identity)),
    ("ENERGY", "GUI_CHARGING_INFO", entry("Accu charging", Unit::None, Transform::BooleanFromZero)),
    ("ENERGY", "GUI_BOOSTING_INFO", entry("Boost", Unit::None, Transform::BooleanFromZero)),
    (
        "ENERGY",
        "STAT_MAINT_REQUIRED",
        entry("Maintenance required", Unit::None, Transform::BooleanFromZero),
    ),
    ("STATISTIC", "STAT_DAY_E_PV", entry("PV Power Day", Unit::KilowattHour, Transform::Identity)),
    (
        "STATISTIC",
        "STAT_DAY_E_GRID_IMPORT",
        entry("Net Import Day", Unit::KilowattHour, Transform::Identity),
    ),
    (
        "STATISTIC",
        "STAT_DAY_E_GRID_EXPORT",
        entry("Net Export Day", Unit::KilowattHour, Transform::Identity),
    ),
    (
        "STATISTIC",
        "STAT_DAY_BAT_CHARGE",
        entry("Accu Charged Day", Unit::KilowattHour, Transform::Identity),
    ),
    (
        "STATISTIC",
        "STAT_DAY_BAT_DISCHARGE",
        entry("Accu Discharged Day", Unit::KilowattHour, Transform::Identity),
    ),
    (
        "STATISTIC",
        "STAT_DAY_E_HOUSE",
        entry("House Power Day", Unit::KilowattHour, Transform::Identity),
    ),
    (
        "SYS_UPDATE",
        "UPDATE_AVAILABLE",
        entry("Update available", Unit::None, Transform::BooleanFromZero),
    ),
    (
        "WIZARD",
        "CONFIG_LOADED",
        entry("Configuration loaded", Unit::None, Transform::BooleanFromZero),
    ),
];

/// A field after catalog lookup and transform.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub description: String,
    pub unit: Unit,
    pub value: TelemetryValue,
}

pub fn lookup(category: &str, field: &str) -> Option<&'static CatalogEntry> {
    CATALOG
        .iter()
        .find(|(cat, name, _)| *cat == category && *name == field)
        .map(|(_, _, entry)| entry)
}

pub fn resolve(category: &str, field: &str, raw: Numeral) -> Resolution {
    match lookup(category, field) {
        Some(entry) => Resolution {
            description: entry.description.to_string(),
            unit: entry.unit,
            value: entry.transform.apply(raw),
        },
        None => Resolution {
            description: format!("Unknown: {category}.{field}"),
            unit: Unit::None,
            value: raw.into(),
        },
    }
}

/// Human readable system state, e.g. `"WARTUNGSLADUNG (5)"`.
pub fn status_label(code: u64) -> String {
    match STATUS_CODES.binary_search_by_key(&code, |(code, _)| *code) {
        Ok(index) => format!("{} ({code})", STATUS_CODES[index].1),
        Err(_) => format!("Unknown: {code} (Please report to Dev)"),
    }
}

fn unknown_status(raw: Numeral) -> String {
    format!("Unknown: {raw} (Please report to Dev)")
}
