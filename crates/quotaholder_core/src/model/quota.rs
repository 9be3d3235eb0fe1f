//! Quota row value object.
//!
//! # Responsibility
//! - Represent one `(entity, resource)` quota row.
//! - Convert to and from the ledger's flat 11-field tuple.
//! - Convert to and from a sparse field map (set fields only).
//!
//! # Invariants
//! - A quota is unknown iff every field except `flags` is unset.
//! - `imported`, `exported`, `returned` and `released` are ledger counters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Ledger wire format:
/// `(entity, resource, quantity, capacity, import_limit, export_limit,
/// imported, exported, returned, released, flags)`.
pub type QuotaTuple = (
    String,
    String,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
    i64,
);

/// One field value in a sparse quota map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuotaValue {
    Text(String),
    Number(i64),
}

/// Sparse map field had the wrong value kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaFieldError {
    pub field: String,
}

impl Display for QuotaFieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "quota field `{}` has the wrong value kind", self.field)
    }
}

impl Error for QuotaFieldError {}

/// One quota row. `None` means "not reported".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quota {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<i64>,
    /// Opaque bitmask.
    #[serde(default)]
    pub flags: i64,
}

const TEXT_FIELDS: [&str; 2] = ["entity", "resource"];
const NUMBER_FIELDS: [&str; 8] = [
    "quantity",
    "capacity",
    "import_limit",
    "export_limit",
    "imported",
    "exported",
    "returned",
    "released",
];

impl Quota {
    pub const DEFAULT_FLAGS: i64 = 0;

    /// The "no such row" value.
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.entity.is_none()
            && self.resource.is_none()
            && self.number_fields().iter().all(Option::is_none)
    }

    pub fn from_tuple(tuple: QuotaTuple) -> Self {
        let (
            entity,
            resource,
            quantity,
            capacity,
            import_limit,
            export_limit,
            imported,
            exported,
            returned,
            released,
            flags,
        ) = tuple;
        Self {
            entity: Some(entity),
            resource: Some(resource),
            quantity: Some(quantity),
            capacity: Some(capacity),
            import_limit: Some(import_limit),
            export_limit: Some(export_limit),
            imported: Some(imported),
            exported: Some(exported),
            returned: Some(returned),
            released: Some(released),
            flags,
        }
    }

    /// Flat tuple form, or `None` while any field is unset.
    pub fn to_tuple(&self) -> Option<QuotaTuple> {
        Some((
            self.entity.clone()?,
            self.resource.clone()?,
            self.quantity?,
            self.capacity?,
            self.import_limit?,
            self.export_limit?,
            self.imported?,
            self.exported?,
            self.returned?,
            self.released?,
            self.flags,
        ))
    }

    /// Builds a quota from a sparse map; absent keys stay unset.
    pub fn from_map(map: &BTreeMap<String, QuotaValue>) -> Result<Self, QuotaFieldError> {
        let text = |field: &str| match map.get(field) {
            None => Ok(None),
            Some(QuotaValue::Text(value)) => Ok(Some(value.clone())),
            Some(QuotaValue::Number(_)) => Err(QuotaFieldError {
                field: field.to_string(),
            }),
        };
        let number = |field: &str| match map.get(field) {
            None => Ok(None),
            Some(QuotaValue::Number(value)) => Ok(Some(*value)),
            Some(QuotaValue::Text(_)) => Err(QuotaFieldError {
                field: field.to_string(),
            }),
        };

        Ok(Self {
            entity: text("entity")?,
            resource: text("resource")?,
            quantity: number("quantity")?,
            capacity: number("capacity")?,
            import_limit: number("import_limit")?,
            export_limit: number("export_limit")?,
            imported: number("imported")?,
            exported: number("exported")?,
            returned: number("returned")?,
            released: number("released")?,
            flags: number("flags")?.unwrap_or(Self::DEFAULT_FLAGS),
        })
    }

    /// Sparse map holding only the set fields. `flags` is always present.
    pub fn to_map(&self) -> BTreeMap<String, QuotaValue> {
        let mut map = BTreeMap::new();
        for (field, value) in TEXT_FIELDS.iter().zip([&self.entity, &self.resource]) {
            if let Some(value) = value {
                map.insert((*field).to_string(), QuotaValue::Text(value.clone()));
            }
        }
        for (field, value) in NUMBER_FIELDS.iter().zip(self.number_fields()) {
            if let Some(value) = value {
                map.insert((*field).to_string(), QuotaValue::Number(value));
            }
        }
        map.insert("flags".to_string(), QuotaValue::Number(self.flags));
        map
    }

    fn number_fields(&self) -> [Option<i64>; 8] {
        [
            self.quantity,
            self.capacity,
            self.import_limit,
            self.export_limit,
            self.imported,
            self.exported,
            self.returned,
            self.released,
        ]
    }
}
