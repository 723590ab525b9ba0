use super::*;
use crm::models::LogicalOperator;
use serde_json::json;

#[test]
fn item_keeps_colons_in_name() {
    let item = order_item("Tea: masala:40.5:2").unwrap();
    assert_eq!(item, OrderItem::new("Tea: masala", 40.5, 2));
}

#[test]
fn item_rejects_bad_numbers() {
    assert!(order_item("Tea:forty:2").unwrap_err().contains("price"));
    assert!(order_item("Tea:40:-1").unwrap_err().contains("quantity"));
    assert!(order_item("Tea:40").is_err());
}

#[test]
fn rule_numbers_become_json_numbers() {
    let rule = segment_rule("totalSpend:>:5000").unwrap();
    assert_eq!(rule.field, "totalSpend");
    assert_eq!(rule.operator, ">");
    assert_eq!(rule.value, json!(5000));
    assert_eq!(rule.logical_operator, LogicalOperator::And);
}

#[test]
fn rule_connector_is_optional_and_case_insensitive() {
    let rule = segment_rule("name:contains:Asha:or").unwrap();
    assert_eq!(rule.value, json!("Asha"));
    assert_eq!(rule.logical_operator, LogicalOperator::Or);
}

#[test]
fn rule_value_may_contain_colons() {
    let rule = segment_rule("lastVisit:<:2024-01-01T00:00:00Z").unwrap();
    assert_eq!(rule.value, json!("2024-01-01T00:00:00Z"));
}

#[test]
fn rule_needs_three_parts() {
    assert!(segment_rule("totalSpend:>").is_err());
}

#[test]
fn direction_parses_both_ways() {
    assert_eq!(direction("DESC"), Ok(SortDirection::Desc));
    assert_eq!(direction("asc"), Ok(SortDirection::Asc));
    assert!(direction("up").is_err());
}
