//! Explicit `Serialize()`-style column extraction for domain events.
//!
//! The original pipeline's writer used duck-typed attribute extraction
//! (`to_dict`/`vars()`) to turn arbitrary event objects into row values. This
//! crate replaces that with an explicit method every event/position type
//! implements (`DomainRecord::columns`), so the writer never inspects fields
//! reflectively -- it just asks each record for its column list and builds
//! the bulk insert from that, uniformly across event kinds.

use chrono::{DateTime, Utc};
use postgres_types::{ToSql, Type};
use std::error::Error;

use crate::types::{Address, DomainEventId, Hash};

/// A single column's value, type-erased enough that `DomainEventWriter` can
/// build a `VALUES (...)` list without knowing the concrete event type.
#[derive(Debug, Clone)]
pub enum ColumnValue {
    Text(String),
    OptText(Option<String>),
    BigInt(i64),
    Numeric(String), // arbitrary-precision amounts, stored as Postgres NUMERIC via text cast
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Int(i32),
}

impl From<&Address> for ColumnValue {
    fn from(a: &Address) -> Self {
        ColumnValue::Text(a.as_str().to_string())
    }
}

impl From<&Hash> for ColumnValue {
    fn from(h: &Hash) -> Self {
        ColumnValue::Text(h.as_str().to_string())
    }
}

impl From<&DomainEventId> for ColumnValue {
    fn from(id: &DomainEventId) -> Self {
        ColumnValue::Text(id.as_str().to_string())
    }
}

impl ToSql for ColumnValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<postgres_types::IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            ColumnValue::Text(s) => s.to_sql(ty, out),
            ColumnValue::OptText(s) => s.to_sql(ty, out),
            ColumnValue::BigInt(v) => v.to_sql(ty, out),
            ColumnValue::Numeric(s) => {
                let d = bigdecimal::BigDecimal::from_str_radix(s, 10).unwrap_or_default();
                d.to_sql(ty, out)
            }
            ColumnValue::Float(v) => v.to_sql(ty, out),
            ColumnValue::Bool(v) => v.to_sql(ty, out),
            ColumnValue::Timestamp(v) => v.to_sql(ty, out),
            ColumnValue::Int(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

trait FromStrRadixExt {
    fn from_str_radix(s: &str, radix: u32) -> Self;
}

impl FromStrRadixExt for bigdecimal::BigDecimal {
    fn from_str_radix(s: &str, _radix: u32) -> Self {
        use std::str::FromStr;
        bigdecimal::BigDecimal::from_str(s).unwrap_or_default()
    }
}

/// Every event and position type implements this to hand the writer its
/// identifying key plus an ordered column list, instead of the writer
/// reflecting over struct fields.
pub trait DomainRecord {
    fn content_id(&self) -> &DomainEventId;
    /// Table-qualified column names, in the same order as `columns()`.
    fn column_names() -> &'static [&'static str]
    where
        Self: Sized;
    fn columns(&self) -> Vec<ColumnValue>;
}
