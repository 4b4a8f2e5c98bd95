//! Intake of loosely-typed vendor group documents
//!
//! Older clients send the vendor groups of a proposal as a JSON array whose
//! numeric fields may be numbers, strings or garbage. This is the one place
//! that shape is checked; past it everything is a [`VendorGroup`].
//!
//! Malformed prices and quantities are not errors. A price that is
//! negative, not a number or above [`price_ceiling`] reads as `0`, a
//! missing or unreadable quantity
//! reads as `0` (modifications default to `1`). Only a document that is not
//! an array of objects is rejected.
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use tracing::warn;

use super::error::IntakeError;
use super::proposal::{AssemblyFee, LineItem, Modification, Side, VendorGroup};

pub fn parse_vendor_groups(json: &str) -> Result<Vec<VendorGroup>, IntakeError> {
    let value: Value = serde_json::from_str(json)?;
    vendor_groups_from_value(&value)
}

pub fn vendor_groups_from_value(value: &Value) -> Result<Vec<VendorGroup>, IntakeError> {
    let groups = value.as_array().ok_or(IntakeError::Shape {
        path: "$".into(),
        expected: "an array of vendor groups",
    })?;

    groups
        .iter()
        .enumerate()
        .map(|(i, group)| vendor_group(group, &format!("$[{i}]")))
        .collect()
}

fn object<'v>(value: &'v Value, path: &str) -> Result<&'v Map<String, Value>, IntakeError> {
    value.as_object().ok_or_else(|| IntakeError::Shape {
        path: path.to_string(),
        expected: "an object",
    })
}

fn array<'v>(
    fields: &'v Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'v [Value], IntakeError> {
    match fields.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(values)) => Ok(values),
        Some(_) => Err(IntakeError::Shape {
            path: format!("{path}.{key}"),
            expected: "an array",
        }),
    }
}

/// First present, non-null field among `keys`.
fn field<'v>(fields: &'v Map<String, Value>, keys: &[&str]) -> Option<&'v Value> {
    keys.iter()
        .filter_map(|key| fields.get(*key))
        .find(|value| !value.is_null())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Largest unit price accepted from a document, one trillion.
pub fn price_ceiling() -> Decimal {
    Decimal::new(1_000_000_000_000, 0)
}

/// Reads a price, mapping negative, unreadable or absurdly large values to
/// zero.
pub fn coerce_price(value: Option<&Value>) -> Decimal {
    let parsed = match value {
        Some(Value::Number(n)) => parse_decimal(&n.to_string()),
        Some(Value::String(s)) => parse_decimal(s),
        _ => None,
    };

    match parsed {
        Some(price) if price > price_ceiling() => {
            warn!(%price, "price above ceiling coerced to zero");
            Decimal::ZERO
        }
        Some(price) if !price.is_sign_negative() || price.is_zero() => price,
        Some(price) => {
            warn!(%price, "negative price coerced to zero");
            Decimal::ZERO
        }
        None => {
            if value.is_some_and(|v| !v.is_null()) {
                warn!(?value, "unreadable price coerced to zero");
            }
            Decimal::ZERO
        }
    }
}

/// Reads a quantity as a non-negative whole number, `default` when absent.
/// Fractions are truncated and negatives become zero.
pub fn coerce_quantity(value: Option<&Value>, default: u32) -> u32 {
    let parsed = match value {
        None | Some(Value::Null) => return default,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(_) => return 0,
    };

    parse_decimal(&parsed)
        .map(|q| q.trunc().max(Decimal::ZERO).min(Decimal::from(u32::MAX)))
        .and_then(|q| u32::try_from(q).ok())
        .unwrap_or(0)
}

fn assembly_fee(value: Option<&Value>) -> Option<AssemblyFee> {
    let fields = value?.as_object()?;
    let amount = coerce_price(field(fields, &["price", "amount"]));
    let kind = text(fields.get("type")).unwrap_or_default().to_ascii_lowercase();

    Some(match kind.as_str() {
        "percentage" | "percent" => AssemblyFee::Percentage { percent: amount },
        // flat, fixed and untyped legacy fees
        _ => AssemblyFee::Flat { per_unit: amount },
    })
}

fn modification(value: &Value, path: &str) -> Result<Modification, IntakeError> {
    let fields = object(value, path)?;
    let name = text(field(fields, &["name", "templateName", "templateId"])).unwrap_or_default();

    let mut modification = Modification::new(&name, coerce_price(field(fields, &["price", "unitPrice"])))
        .set_quantity(coerce_quantity(field(fields, &["qty", "quantity"]), 1));

    if let Some(Value::Object(options)) = fields.get("selectedOptions") {
        for (key, option) in options {
            let value = match option {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            modification = modification.add_option(key, &value);
        }
    }

    Ok(modification)
}

fn line_item(value: &Value, path: &str) -> Result<LineItem, IntakeError> {
    let fields = object(value, path)?;
    let code = text(field(fields, &["code", "catalogCode"])).unwrap_or_default();

    let mut item = LineItem::new(&code)
        .set_quantity(coerce_quantity(field(fields, &["qty", "quantity"]), 0))
        .set_catalog_price(coerce_price(field(fields, &["originalPrice", "catalogPrice", "price"])))
        .set_row_assembled(flag(fields.get("isRowAssembled")));

    if let Some(fee) = assembly_fee(field(fields, &["assemblyFee", "assemblyCost"])) {
        item = item.set_assembly_fee(fee);
    }
    item = item.include_assembly_fee(flag(fields.get("includeAssemblyFee")));

    if let Some(side) = text(fields.get("hingeSide")).and_then(|s| Side::parse(&s)) {
        item = item.set_hinge_side(side);
    }
    if let Some(side) = text(fields.get("exposedSide")).and_then(|s| Side::parse(&s)) {
        item = item.set_exposed_side(side);
    }

    for (i, entry) in array(fields, "modifications", path)?.iter().enumerate() {
        item = item.add_modification(modification(entry, &format!("{path}.modifications[{i}]"))?);
    }

    Ok(item)
}

fn vendor_group(value: &Value, path: &str) -> Result<VendorGroup, IntakeError> {
    let fields = object(value, path)?;
    let vendor_id = text(field(fields, &["vendorId", "manufacturer", "manufacturerId"])).ok_or_else(
        || IntakeError::Shape {
            path: format!("{path}.manufacturer"),
            expected: "a vendor identifier",
        },
    )?;

    let mut group = VendorGroup::new(&vendor_id);
    if let Some(style) = text(field(fields, &["styleId", "selectedStyle"])) {
        group = group.set_style(&style);
    }

    for (i, entry) in array(fields, "items", path)?.iter().enumerate() {
        group = group.add_item(line_item(entry, &format!("{path}.items[{i}]"))?);
    }

    Ok(group)
}
