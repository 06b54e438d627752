//! Shopping cart held by the active session
//!
//! The cart is an insertion-ordered list of lines keyed by product id. The
//! grand total is always derived from the lines; it is never stored.

mod reconcile;

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use reconcile::reconcile;

/// Opaque product identifier
///
/// Interpreters send either integer or string ids; both are kept as-is and
/// compared exactly (`1` and `"1"` are different products).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductId {
    /// Numeric id (database primary key)
    Int(i64),
    /// String id
    Text(String),
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for ProductId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for ProductId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl From<String> for ProductId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// One product's aggregated presence in the cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Unique key within a cart
    pub product_id: ProductId,
    /// Display label
    pub name: String,
    /// Cumulative units added (always positive)
    pub quantity: u64,
    /// Extended price of the line, not the unit price
    pub total_price: Decimal,
}

/// Cart-shaped entry carried by an interpreter reply
///
/// Every field is optional on the wire; the reconciliation engine decides
/// which fields an action requires. Parsing never fails on a single entry:
/// a field of the wrong type is left empty and the problem is kept in
/// `invalid`, so one bad entry cannot discard the rest of the reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeltaLine {
    /// Product the entry refers to
    pub product_id: Option<ProductId>,
    /// Display label
    pub name: Option<String>,
    /// Units to add
    pub quantity: Option<i64>,
    /// Extended price for `quantity` units
    pub total_price: Option<Decimal>,
    /// Why part of the entry could not be read
    #[serde(skip)]
    pub invalid: Option<String>,
}

impl DeltaLine {
    /// Entry naming only a product, as sent for `remove`
    #[must_use]
    pub fn product(product_id: impl Into<ProductId>) -> Self {
        Self {
            product_id: Some(product_id.into()),
            ..Self::default()
        }
    }

    /// Fully populated entry, as sent for `add`
    #[must_use]
    pub fn line(
        product_id: impl Into<ProductId>,
        name: impl Into<String>,
        quantity: i64,
        total_price: Decimal,
    ) -> Self {
        Self {
            product_id: Some(product_id.into()),
            name: Some(name.into()),
            quantity: Some(quantity),
            total_price: Some(total_price),
            invalid: None,
        }
    }

    /// Read an entry from untyped JSON
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(fields) = value.as_object() else {
            return Self {
                invalid: Some(format!("expected an object, got {value}")),
                ..Self::default()
            };
        };

        let mut line = Self::default();
        let mut problems = Vec::new();

        match present(fields, "product_id") {
            None => {}
            Some(Value::String(id)) => line.product_id = Some(ProductId::Text(id.clone())),
            Some(Value::Number(id)) if id.is_i64() => {
                line.product_id = id.as_i64().map(ProductId::Int);
            }
            Some(other) => problems.push(format!("product_id {other} is not an integer or string")),
        }

        match present(fields, "name") {
            None => {}
            Some(Value::String(name)) => line.name = Some(name.clone()),
            Some(other) => problems.push(format!("name {other} is not a string")),
        }

        if let Some(quantity) = present(fields, "quantity") {
            match quantity.as_i64() {
                Some(q) => line.quantity = Some(q),
                None => problems.push(format!("quantity {quantity} is not an integer")),
            }
        }

        if let Some(total) = present(fields, "total_price") {
            match serde_json::from_value::<Decimal>(total.clone()) {
                Ok(t) => line.total_price = Some(t),
                Err(e) => problems.push(format!("total_price {total}: {e}")),
            }
        }

        if !problems.is_empty() {
            line.invalid = Some(problems.join("; "));
        }
        line
    }
}

impl<'de> Deserialize<'de> for DeltaLine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Field value, treating `null` as absent
fn present<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    fields.get(key).filter(|v| !v.is_null())
}

/// `{product_id, quantity}` pair sent to the interpreter as cart context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Product id
    pub product_id: ProductId,
    /// Units currently in the cart
    pub quantity: u64,
}

/// Ordered collection of cart lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Lines in insertion order
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of distinct products
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up the line for a product
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.product_id == product_id)
    }

    /// Sum of every line's total price
    #[must_use]
    pub fn grand_total(&self) -> Decimal {
        self.lines
            .iter()
            .fold(Decimal::ZERO, |total, l| total.saturating_add(l.total_price))
    }

    /// Total units across all lines
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines
            .iter()
            .fold(0, |count, l| count.saturating_add(l.quantity))
    }

    /// Reduce the cart to the context the interpreter needs
    #[must_use]
    pub fn context(&self) -> Vec<ContextItem> {
        self.lines
            .iter()
            .map(|l| ContextItem {
                product_id: l.product_id.clone(),
                quantity: l.quantity,
            })
            .collect()
    }

    /// Render a plain-text bill preview
    ///
    /// Returns `None` for an empty cart.
    #[must_use]
    pub fn preview(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }

        let mut out = String::from("PREVIEW:\n");
        for line in &self.lines {
            out.push_str(&format!(
                "{} x {} = ₹{}\n",
                line.name, line.quantity, line.total_price
            ));
        }
        out.push_str(&format!("\nTOTAL: ₹{}", self.grand_total()));
        Some(out)
    }
}

impl FromIterator<CartLine> for Cart {
    fn from_iter<I: IntoIterator<Item = CartLine>>(iter: I) -> Self {
        let mut cart = Self::new();
        for line in iter {
            match cart.lines.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                    existing.total_price = existing.total_price.saturating_add(line.total_price);
                }
                None => cart.lines.push(line),
            }
        }
        cart
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, qty: u64, total: i64) -> CartLine {
        CartLine {
            product_id: id.into(),
            name: id.to_uppercase(),
            quantity: qty,
            total_price: Decimal::from(total),
        }
    }

    #[test]
    fn test_grand_total_is_derived_from_lines() {
        let cart: Cart = vec![line("p1", 2, 30), line("p2", 1, 45)].into_iter().collect();
        assert_eq!(cart.grand_total(), Decimal::from(75));
        assert_eq!(cart.item_count(), 3);
        assert_eq!(Cart::new().grand_total(), Decimal::ZERO);
    }

    #[test]
    fn test_from_iter_merges_duplicate_ids() {
        let cart: Cart = vec![line("p1", 2, 30), line("p1", 1, 15)].into_iter().collect();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].quantity, 3);
        assert_eq!(cart.lines()[0].total_price, Decimal::from(45));
    }

    #[test]
    fn test_from_iter_saturates() {
        let mut big = line("p1", u64::MAX, 0);
        big.total_price = Decimal::MAX;
        let cart: Cart = vec![big.clone(), big].into_iter().collect();
        assert_eq!(cart.lines()[0].quantity, u64::MAX);
        assert_eq!(cart.grand_total(), Decimal::MAX);
    }

    #[test]
    fn test_delta_line_reads_wrong_types_without_failing() {
        let entries: Vec<DeltaLine> = serde_json::from_value(serde_json::json!([
            {"product_id": 7, "name": "Maggi", "quantity": 2.5, "total_price": 30.0},
            {"product_id": true, "quantity": 1, "total_price": "12.50"},
            {"product_id": "p1", "name": null, "unit_price": 15},
            "soap"
        ]))
        .unwrap();

        assert_eq!(entries[0].product_id, Some(ProductId::Int(7)));
        assert!(entries[0].quantity.is_none());
        assert!(entries[0].invalid.as_deref().unwrap().contains("quantity"));

        assert!(entries[1].product_id.is_none());
        assert_eq!(entries[1].total_price, Some(Decimal::new(1250, 2)));
        assert!(entries[1].invalid.as_deref().unwrap().contains("product_id"));

        assert_eq!(entries[2], DeltaLine::product("p1"));
        assert!(entries[3].invalid.is_some());
    }

    #[test]
    fn test_context_keeps_only_id_and_quantity() {
        let cart: Cart = vec![line("p1", 2, 30)].into_iter().collect();
        let json = serde_json::to_value(cart.context()).unwrap();
        assert_eq!(json, serde_json::json!([{ "product_id": "p1", "quantity": 2 }]));
    }

    #[test]
    fn test_product_id_accepts_int_and_string() {
        let ids: Vec<ProductId> = serde_json::from_str(r#"[7, "p7"]"#).unwrap();
        assert_eq!(ids, vec![ProductId::Int(7), ProductId::Text("p7".to_string())]);
        assert_ne!(ids[0], ProductId::from("7"));
    }

    #[test]
    fn test_preview() {
        assert!(Cart::new().preview().is_none());

        let cart: Cart = vec![line("p1", 2, 30)].into_iter().collect();
        let preview = cart.preview().unwrap();
        assert!(preview.contains("P1 x 2 = ₹30"));
        assert!(preview.ends_with("TOTAL: ₹30"));
    }
}
