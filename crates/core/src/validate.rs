//! Structural validation of application state.
//!
//! Each collection is checked on its own: every record needs a non-empty
//! `id`, and a handful of collections have extra required fields. A
//! collection that is present but empty is valid; one that is not a
//! sequence at all is a hard error. Warnings never affect validity.
//!
//! Validation of a collection yields to the scheduler every
//! [`YIELD_EVERY`] records, and full-state validation yields between
//! collections, so a large state never monopolises a runtime worker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::{ApplicationStateSnapshot, Collection, EntityCollection};

/// Records checked between cooperative yields.
pub const YIELD_EVERY: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Fold another result into this one. Validity is the AND of both.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

// ── Field helpers ────────────────────────────────────────────────────

fn non_empty_str<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

/// A record's id as text. Numeric ids are accepted.
fn record_id(record: &Value) -> Option<String> {
    match record.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// How a record is named in messages: its id, or its position.
fn reference(record: &Value, index: usize) -> String {
    record_id(record).unwrap_or_else(|| format!("#{index}"))
}

/// Like [`reference`], but prefers the human name when there is one.
fn describe(record: &Value, index: usize) -> String {
    match (non_empty_str(record, "name"), record_id(record)) {
        (Some(name), Some(id)) => format!("'{name}' [{id}]"),
        (Some(name), None) => format!("'{name}' [#{index}]"),
        (None, _) => reference(record, index),
    }
}

// ── Per-record rules ─────────────────────────────────────────────────

type RecordCheck = fn(&Value, usize, &mut ValidationResult);

fn check_category(record: &Value, i: usize, out: &mut ValidationResult) {
    if non_empty_str(record, "name").is_none() {
        out.error(format!("category {} has no name", reference(record, i)));
    }
}

fn check_dish(record: &Value, i: usize, out: &mut ValidationResult) {
    if non_empty_str(record, "name").is_none() {
        out.error(format!("dish {} has no name", reference(record, i)));
    }
    // Prices may be stored as numeric strings such as "12.50".
    let price = match record.get("price") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().ok()),
        Some(v) => Some(v.as_f64()),
    };
    match price {
        Some(Some(price)) if price >= 0.0 => {}
        Some(Some(price)) => out.error(format!(
            "dish {} has an invalid price ({price})",
            describe(record, i)
        )),
        Some(None) => out.error(format!("dish {} has a non-numeric price", describe(record, i))),
        None => out.error(format!("dish {} has no price", describe(record, i))),
    }
    let has_category = match record.get("categoryId") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    };
    if !has_category {
        out.warn(format!("dish {} has no category", describe(record, i)));
    }
}

fn check_order(record: &Value, i: usize, out: &mut ValidationResult) {
    if matches!(record.get("tableId"), None | Some(Value::Null)) {
        out.error(format!("order {} has no table", reference(record, i)));
    }
    let has_items = record
        .get("items")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty());
    if !has_items {
        out.warn(format!("order {} has no items", reference(record, i)));
    }
}

fn check_employee(record: &Value, i: usize, out: &mut ValidationResult) {
    if non_empty_str(record, "name").is_none() {
        out.error(format!("employee {} has no name", reference(record, i)));
    }
}

fn check_nothing(_: &Value, _: usize, _: &mut ValidationResult) {}

fn rules_for(collection: Collection) -> (&'static str, RecordCheck) {
    match collection {
        Collection::Categories => ("category", check_category),
        Collection::Menu => ("dish", check_dish),
        Collection::Orders => ("order", check_order),
        Collection::Employees => ("employee", check_employee),
        other => (other.as_str(), check_nothing),
    }
}

// ── Collection validation ────────────────────────────────────────────

/// Validate one collection with the rules registered for it.
pub async fn validate_collection(
    collection: Collection,
    records: &EntityCollection,
) -> ValidationResult {
    let (noun, check) = rules_for(collection);
    let mut out = ValidationResult::default();

    let Some(items) = records.records() else {
        out.error(format!("{collection} is not a sequence"));
        return out;
    };

    for (i, record) in items.iter().enumerate() {
        if record_id(record).is_none() {
            out.error(format!("{noun} at index {i} has no id"));
        }
        check(record, i, &mut out);
        if i > 0 && i % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }
    out
}

pub async fn validate_categories(records: &EntityCollection) -> ValidationResult {
    validate_collection(Collection::Categories, records).await
}

pub async fn validate_menu(records: &EntityCollection) -> ValidationResult {
    validate_collection(Collection::Menu, records).await
}

pub async fn validate_orders(records: &EntityCollection) -> ValidationResult {
    validate_collection(Collection::Orders, records).await
}

pub async fn validate_employees(records: &EntityCollection) -> ValidationResult {
    validate_collection(Collection::Employees, records).await
}

/// The settings singleton needs a restaurant name; a currency is expected.
pub fn validate_settings(settings: &Value) -> ValidationResult {
    let mut out = ValidationResult::default();
    if !settings.is_object() {
        out.error("settings is not an object");
        return out;
    }
    if non_empty_str(settings, "restaurantName").is_none() {
        out.error("settings has no restaurant name");
    }
    if non_empty_str(settings, "currency").is_none() {
        out.warn("settings has no currency");
    }
    out
}

/// Validate every collection and the settings. Valid only when every part
/// is valid.
pub async fn validate_full_state(state: &ApplicationStateSnapshot) -> ValidationResult {
    let mut out = validate_settings(state.settings());
    for collection in Collection::ALL {
        tokio::task::yield_now().await;
        out.merge(validate_collection(collection, state.collection(collection)).await);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coll(v: Value) -> EntityCollection {
        EntityCollection::from_value(v)
    }

    #[tokio::test]
    async fn empty_collection_is_valid() {
        let res = validate_categories(&EntityCollection::empty()).await;
        assert!(res.is_valid());
        assert!(res.warnings.is_empty());
    }

    #[tokio::test]
    async fn non_sequence_is_a_hard_error() {
        let res = validate_collection(Collection::Stock, &coll(json!({ "id": "s1" }))).await;
        assert!(!res.is_valid());
        assert_eq!(res.errors, vec!["stock is not a sequence".to_string()]);
    }

    #[tokio::test]
    async fn category_needs_id_and_name() {
        let res = validate_categories(&coll(json!([
            { "id": "c1", "name": "Drinks" },
            { "name": "No id" },
            { "id": "c3", "name": "  " }
        ])))
        .await;
        assert_eq!(
            res.errors,
            vec![
                "category at index 1 has no id".to_string(),
                "category c3 has no name".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn negative_price_names_the_dish() {
        let res = validate_menu(&coll(json!([
            { "id": "d1", "name": "Soup", "price": 4.5, "categoryId": "c1" },
            { "id": "d2", "name": "Bitoque", "price": -1, "categoryId": "c1" }
        ])))
        .await;
        assert!(!res.is_valid());
        assert_eq!(res.errors.len(), 1);
        assert!(res.errors[0].contains("Bitoque"));
        assert!(res.errors[0].contains("d2"));
    }

    #[tokio::test]
    async fn zero_price_is_allowed_and_missing_category_only_warns() {
        let res = validate_menu(&coll(json!([{ "id": "d1", "name": "Water", "price": 0 }]))).await;
        assert!(res.is_valid());
        assert_eq!(res.warnings.len(), 1);
    }

    #[tokio::test]
    async fn string_prices_are_parsed_before_checking() {
        let res = validate_menu(&coll(json!([
            { "id": "d1", "name": "Soup", "price": "12.50", "categoryId": "c1" },
            { "id": "d2", "name": "Tart", "price": "-3", "categoryId": "c1" },
            { "id": "d3", "name": "Stew", "price": "twelve", "categoryId": "c1" },
            { "id": "d4", "name": "Pie", "price": [4], "categoryId": "c1" },
            { "id": "d5", "name": "Ice", "categoryId": "c1" }
        ])))
        .await;
        assert_eq!(res.errors.len(), 4);
        assert!(res.errors[0].contains("d2") && res.errors[0].contains("invalid price (-3)"));
        assert!(res.errors[1].contains("d3") && res.errors[1].ends_with("has a non-numeric price"));
        assert!(res.errors[2].contains("d4") && res.errors[2].ends_with("has a non-numeric price"));
        assert!(res.errors[3].contains("d5") && res.errors[3].ends_with("has no price"));
    }

    #[tokio::test]
    async fn orders_need_a_table_and_warn_without_items() {
        let res = validate_orders(&coll(json!([
            { "id": "o1", "tableId": 0, "items": [] },
            { "id": "o2", "items": [{ "dishId": "d1" }] }
        ])))
        .await;
        assert_eq!(res.errors, vec!["order o2 has no table".to_string()]);
        assert_eq!(res.warnings, vec!["order o1 has no items".to_string()]);
    }

    #[tokio::test]
    async fn generic_collections_only_require_ids() {
        let res = validate_collection(
            Collection::Suppliers,
            &coll(json!([{ "id": 7 }, { "id": "" }])),
        )
        .await;
        assert_eq!(res.errors, vec!["suppliers at index 1 has no id".to_string()]);
    }

    #[test]
    fn settings_rules() {
        assert!(!validate_settings(&json!("nope")).is_valid());
        let missing = validate_settings(&json!({}));
        assert!(!missing.is_valid());
        let ok = validate_settings(&json!({ "restaurantName": "Tasca" }));
        assert!(ok.is_valid());
        assert_eq!(ok.warnings, vec!["settings has no currency".to_string()]);
    }

    #[tokio::test]
    async fn large_collections_validate_in_chunks() {
        let records: Vec<Value> = (0..1_050)
            .map(|i| json!({ "id": format!("e{i}"), "name": "Staff" }))
            .collect();
        let res = validate_employees(&EntityCollection::new(records)).await;
        assert!(res.is_valid());
    }

    #[tokio::test]
    async fn full_state_is_the_and_of_its_parts() {
        let good = ApplicationStateSnapshot::empty()
            .with_settings(json!({ "restaurantName": "Tasca", "currency": "EUR" }))
            .with_collection(Collection::Categories, vec![json!({ "id": "c1", "name": "Mains" })]);
        assert!(validate_full_state(&good).await.is_valid());

        let bad = good.with_collection(Collection::Tables, vec![json!({ "seats": 4 })]);
        let res = validate_full_state(&bad).await;
        assert!(!res.is_valid());
        assert_eq!(res.errors.len(), 1);
    }
}
