//! Value parsers for the compact flag syntaxes (`--item`, `--rule`,
//! `--sort`). Each returns a plain `String` error so clap can report it
//! against the offending flag.

use crm::models::{OrderItem, SegmentRule};
use crm::query::SortDirection;
use serde_json::Value;

#[cfg(test)]
#[path = "parse_test.rs"]
mod parse_test;

/// `name:price:qty`. The name may itself contain colons.
pub fn order_item(raw: &str) -> Result<OrderItem, String> {
    let mut parts = raw.rsplitn(3, ':');
    let (Some(qty), Some(price), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected name:price:qty, got {raw:?}"));
    };
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| format!("price {price:?} is not a number"))?;
    let quantity: u32 = qty
        .trim()
        .parse()
        .map_err(|_| format!("quantity {qty:?} is not a whole number"))?;
    Ok(OrderItem::new(name.trim(), price, quantity))
}

/// `field:operator:value[:AND|OR]`. Numeric values are sent as JSON
/// numbers, everything else as strings.
pub fn segment_rule(raw: &str) -> Result<SegmentRule, String> {
    let mut parts: Vec<&str> = raw.split(':').collect();
    if parts.len() < 3 {
        return Err(format!("expected field:operator:value[:AND|OR], got {raw:?}"));
    }
    let or = match parts.last().map(|p| p.to_ascii_uppercase()) {
        Some(last) if parts.len() > 3 && (last == "AND" || last == "OR") => {
            parts.pop();
            last == "OR"
        }
        _ => false,
    };
    let value = parts[2..].join(":");
    let rule = SegmentRule::new(parts[0].trim(), parts[1].trim(), rule_value(&value));
    Ok(if or { rule.or() } else { rule })
}

fn rule_value(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(number @ Value::Number(_)) => number,
        _ => Value::String(raw.to_owned()),
    }
}

/// `asc` or `desc`.
pub fn direction(raw: &str) -> Result<SortDirection, String> {
    match raw.to_ascii_lowercase().as_str() {
        "asc" => Ok(SortDirection::Asc),
        "desc" => Ok(SortDirection::Desc),
        other => Err(format!("unknown sort direction {other:?}")),
    }
}
