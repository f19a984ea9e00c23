//! The application state being protected.
//!
//! A snapshot is a set of named entity collections plus a settings object.
//! Records are schemaless JSON objects; the validator checks the few fields
//! each collection requires and leaves the rest alone.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::SafekeepError;

/// Every record-bearing collection in a snapshot. Settings is a single
/// object and is handled separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Categories,
    Menu,
    Orders,
    Employees,
    Stock,
    Expenses,
    Revenues,
    Shifts,
    PayrollRecords,
    Tables,
    Users,
    Attendance,
    Customers,
    Suppliers,
}

impl Collection {
    pub const ALL: [Collection; 14] = [
        Collection::Categories,
        Collection::Menu,
        Collection::Orders,
        Collection::Employees,
        Collection::Stock,
        Collection::Expenses,
        Collection::Revenues,
        Collection::Shifts,
        Collection::PayrollRecords,
        Collection::Tables,
        Collection::Users,
        Collection::Attendance,
        Collection::Customers,
        Collection::Suppliers,
    ];

    /// Field name in the serialized snapshot.
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Categories => "categories",
            Collection::Menu => "menu",
            Collection::Orders => "orders",
            Collection::Employees => "employees",
            Collection::Stock => "stock",
            Collection::Expenses => "expenses",
            Collection::Revenues => "revenues",
            Collection::Shifts => "shifts",
            Collection::PayrollRecords => "payrollRecords",
            Collection::Tables => "tables",
            Collection::Users => "users",
            Collection::Attendance => "attendance",
            Collection::Customers => "customers",
            Collection::Suppliers => "suppliers",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered collection of JSON records.
///
/// Normally a JSON array. A missing or `null` collection reads as empty; any
/// other non-array value is kept as-is so the validator can report it
/// instead of the deserializer silently discarding it.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCollection(Value);

impl EntityCollection {
    pub fn new(records: Vec<Value>) -> Self {
        EntityCollection(Value::Array(records))
    }

    pub fn empty() -> Self {
        EntityCollection::new(Vec::new())
    }

    /// Wrap an arbitrary JSON value, mapping `null` to an empty collection.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => EntityCollection::empty(),
            other => EntityCollection(other),
        }
    }

    /// The records, or `None` if the underlying value is not a sequence.
    pub fn records(&self) -> Option<&[Value]> {
        self.0.as_array().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.records().map_or(0, <[Value]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl Default for EntityCollection {
    fn default() -> Self {
        EntityCollection::empty()
    }
}

impl Serialize for EntityCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EntityCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(EntityCollection::from_value)
    }
}

impl From<Vec<Value>> for EntityCollection {
    fn from(records: Vec<Value>) -> Self {
        EntityCollection::new(records)
    }
}

fn empty_settings() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A full copy of the application state at one instant.
///
/// Fields are private: once captured, a snapshot is only ever changed by
/// building a new one through the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStateSnapshot {
    #[serde(default)]
    categories: EntityCollection,
    #[serde(default)]
    menu: EntityCollection,
    #[serde(default)]
    orders: EntityCollection,
    #[serde(default)]
    employees: EntityCollection,
    #[serde(default)]
    stock: EntityCollection,
    #[serde(default)]
    expenses: EntityCollection,
    #[serde(default)]
    revenues: EntityCollection,
    #[serde(default)]
    shifts: EntityCollection,
    #[serde(default, alias = "payroll")]
    payroll_records: EntityCollection,
    #[serde(default = "empty_settings")]
    settings: Value,
    #[serde(default)]
    tables: EntityCollection,
    #[serde(default)]
    users: EntityCollection,
    #[serde(default)]
    attendance: EntityCollection,
    #[serde(default)]
    customers: EntityCollection,
    #[serde(default)]
    suppliers: EntityCollection,
    #[serde(
        rename = "timestamp",
        with = "time::serde::rfc3339",
        default = "crate::ids::now"
    )]
    captured_at: OffsetDateTime,
}

impl ApplicationStateSnapshot {
    /// An empty state captured now.
    pub fn empty() -> Self {
        ApplicationStateSnapshot::empty_at(crate::ids::now())
    }

    pub fn empty_at(captured_at: OffsetDateTime) -> Self {
        ApplicationStateSnapshot {
            categories: EntityCollection::empty(),
            menu: EntityCollection::empty(),
            orders: EntityCollection::empty(),
            employees: EntityCollection::empty(),
            stock: EntityCollection::empty(),
            expenses: EntityCollection::empty(),
            revenues: EntityCollection::empty(),
            shifts: EntityCollection::empty(),
            payroll_records: EntityCollection::empty(),
            settings: empty_settings(),
            tables: EntityCollection::empty(),
            users: EntityCollection::empty(),
            attendance: EntityCollection::empty(),
            customers: EntityCollection::empty(),
            suppliers: EntityCollection::empty(),
            captured_at,
        }
    }

    pub fn collection(&self, which: Collection) -> &EntityCollection {
        match which {
            Collection::Categories => &self.categories,
            Collection::Menu => &self.menu,
            Collection::Orders => &self.orders,
            Collection::Employees => &self.employees,
            Collection::Stock => &self.stock,
            Collection::Expenses => &self.expenses,
            Collection::Revenues => &self.revenues,
            Collection::Shifts => &self.shifts,
            Collection::PayrollRecords => &self.payroll_records,
            Collection::Tables => &self.tables,
            Collection::Users => &self.users,
            Collection::Attendance => &self.attendance,
            Collection::Customers => &self.customers,
            Collection::Suppliers => &self.suppliers,
        }
    }

    fn collection_slot(&mut self, which: Collection) -> &mut EntityCollection {
        match which {
            Collection::Categories => &mut self.categories,
            Collection::Menu => &mut self.menu,
            Collection::Orders => &mut self.orders,
            Collection::Employees => &mut self.employees,
            Collection::Stock => &mut self.stock,
            Collection::Expenses => &mut self.expenses,
            Collection::Revenues => &mut self.revenues,
            Collection::Shifts => &mut self.shifts,
            Collection::PayrollRecords => &mut self.payroll_records,
            Collection::Tables => &mut self.tables,
            Collection::Users => &mut self.users,
            Collection::Attendance => &mut self.attendance,
            Collection::Customers => &mut self.customers,
            Collection::Suppliers => &mut self.suppliers,
        }
    }

    pub fn settings(&self) -> &Value {
        &self.settings
    }

    pub fn captured_at(&self) -> OffsetDateTime {
        self.captured_at
    }

    /// A copy of this snapshot with one collection replaced.
    pub fn with_collection(mut self, which: Collection, records: impl Into<EntityCollection>) -> Self {
        *self.collection_slot(which) = records.into();
        self
    }

    pub fn with_settings(mut self, settings: Value) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_captured_at(mut self, at: OffsetDateTime) -> Self {
        self.captured_at = at;
        self
    }

    /// Total record count across all collections.
    pub fn record_count(&self) -> usize {
        Collection::ALL
            .iter()
            .map(|c| self.collection(*c).len())
            .sum()
    }

    /// Canonical byte encoding. The content hash is computed over these bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SafekeepError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SafekeepError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Default for ApplicationStateSnapshot {
    fn default() -> Self {
        ApplicationStateSnapshot::empty()
    }
}
