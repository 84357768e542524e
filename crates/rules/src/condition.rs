//! Recursive AND/OR condition trees over a single telemetry sample.
//!
//! Deserialization dispatches on the presence of `conditions`: a node with
//! child conditions is a branch, anything else is a leaf comparison.
//! Operators stay raw strings so unknown values deserialize fine and simply
//! evaluate to false; a misconfigured rule must never take the worker down.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Branch {
        /// "AND" | "OR"; absent means AND.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
        conditions: Vec<Condition>,
    },
    Leaf {
        parameter: String,
        /// gt | lt | gte | lte | eq | neq
        operator: String,
        value: f64,
    },
}

/// Evaluate a tree against a metric bag. Total: missing parameters, unknown
/// operators, and empty branches all evaluate to false.
pub fn evaluate(condition: &Condition, metrics: &BTreeMap<String, f64>) -> bool {
    match condition {
        Condition::Leaf {
            parameter,
            operator,
            value,
        } => {
            let Some(actual) = metrics.get(parameter) else {
                return false;
            };
            match operator.as_str() {
                "gt" => actual > value,
                "lt" => actual < value,
                "gte" => actual >= value,
                "lte" => actual <= value,
                "eq" => actual == value,
                "neq" => actual != value,
                _ => false,
            }
        }
        Condition::Branch {
            operator,
            conditions,
        } => {
            if conditions.is_empty() {
                return false;
            }
            match branch_operator(operator).as_str() {
                "AND" => conditions.iter().all(|c| evaluate(c, metrics)),
                "OR" => conditions.iter().any(|c| evaluate(c, metrics)),
                _ => false,
            }
        }
    }
}

fn branch_operator(operator: &Option<String>) -> String {
    operator
        .as_deref()
        .unwrap_or("AND")
        .to_uppercase()
}

/// Render `"[<rule_name>] <expr>"` with the actual readings inlined.
///
/// Leaves render as `<param> (<actual>) <op> <threshold>`; nested branches
/// are parenthesized and joined by their operator.
pub fn build_alert_message(
    rule_name: &str,
    condition: &Condition,
    metrics: &BTreeMap<String, f64>,
) -> String {
    let expr = match condition {
        Condition::Branch {
            operator,
            conditions,
        } => {
            let op = branch_operator(operator);
            conditions
                .iter()
                .map(|c| render_node(c, metrics))
                .collect::<Vec<_>>()
                .join(&format!(" {op} "))
        }
        leaf => render_node(leaf, metrics),
    };

    format!("[{rule_name}] {expr}")
}

fn render_node(condition: &Condition, metrics: &BTreeMap<String, f64>) -> String {
    match condition {
        Condition::Leaf {
            parameter,
            operator,
            value,
        } => {
            let actual = metrics
                .get(parameter)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "?".to_string());
            format!("{parameter} ({actual}) {operator} {value}")
        }
        Condition::Branch {
            operator,
            conditions,
        } => {
            let op = branch_operator(operator);
            let inner = conditions
                .iter()
                .map(|c| render_node(c, metrics))
                .collect::<Vec<_>>()
                .join(&format!(" {op} "));
            format!("({inner})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn parse(json: serde_json::Value) -> Condition {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn leaf_operators() {
        let m = metrics(&[("voltage", 240.0)]);
        for (op, expected) in [
            ("gt", false),
            ("lt", false),
            ("gte", true),
            ("lte", true),
            ("eq", true),
            ("neq", false),
        ] {
            let leaf = parse(serde_json::json!({
                "parameter": "voltage", "operator": op, "value": 240.0
            }));
            assert_eq!(evaluate(&leaf, &m), expected, "operator {op}");
        }
    }

    #[test]
    fn missing_parameter_is_false() {
        let leaf = parse(serde_json::json!({
            "parameter": "torque", "operator": "gt", "value": 1.0
        }));
        assert!(!evaluate(&leaf, &metrics(&[("voltage", 240.0)])));
    }

    #[test]
    fn unknown_operator_is_false() {
        let leaf = parse(serde_json::json!({
            "parameter": "voltage", "operator": "between", "value": 1.0
        }));
        assert!(!evaluate(&leaf, &metrics(&[("voltage", 240.0)])));

        let branch = parse(serde_json::json!({
            "operator": "XOR",
            "conditions": [{"parameter": "voltage", "operator": "gt", "value": 1.0}]
        }));
        assert!(!evaluate(&branch, &metrics(&[("voltage", 240.0)])));
    }

    #[test]
    fn empty_branch_is_false() {
        let branch = parse(serde_json::json!({"operator": "AND", "conditions": []}));
        assert!(!evaluate(&branch, &metrics(&[("voltage", 240.0)])));
    }

    #[test]
    fn branch_operator_defaults_to_and() {
        let branch = parse(serde_json::json!({
            "conditions": [
                {"parameter": "voltage", "operator": "gt", "value": 200.0},
                {"parameter": "current", "operator": "gt", "value": 3.0}
            ]
        }));
        assert!(evaluate(&branch, &metrics(&[("voltage", 240.0), ("current", 4.0)])));
        assert!(!evaluate(&branch, &metrics(&[("voltage", 240.0), ("current", 2.0)])));
    }

    #[test]
    fn nested_tree_scenarios() {
        // (voltage > 200 AND current > 3) OR frequency > 55
        let tree = parse(serde_json::json!({
            "operator": "OR",
            "conditions": [
                {
                    "operator": "AND",
                    "conditions": [
                        {"parameter": "voltage", "operator": "gt", "value": 200.0},
                        {"parameter": "current", "operator": "gt", "value": 3.0}
                    ]
                },
                {"parameter": "frequency", "operator": "gt", "value": 55.0}
            ]
        }));

        assert!(evaluate(
            &tree,
            &metrics(&[("voltage", 240.0), ("current", 4.0), ("frequency", 50.0)])
        ));
        assert!(evaluate(
            &tree,
            &metrics(&[("voltage", 180.0), ("current", 2.0), ("frequency", 60.0)])
        ));
        assert!(!evaluate(
            &tree,
            &metrics(&[("voltage", 180.0), ("current", 4.0), ("frequency", 50.0)])
        ));
    }

    #[test]
    fn parse_render_roundtrip() {
        let trees = [
            serde_json::json!({"parameter": "voltage", "operator": "gt", "value": 240.0}),
            serde_json::json!({
                "operator": "OR",
                "conditions": [
                    {"parameter": "voltage", "operator": "gt", "value": 240.0},
                    {
                        "operator": "AND",
                        "conditions": [
                            {"parameter": "current", "operator": "gte", "value": 3.0},
                            {"parameter": "power", "operator": "lt", "value": 900.0}
                        ]
                    }
                ]
            }),
        ];

        for json in trees {
            let tree: Condition = serde_json::from_value(json).unwrap();
            let rendered = serde_json::to_value(&tree).unwrap();
            let reparsed: Condition = serde_json::from_value(rendered).unwrap();
            assert_eq!(tree, reparsed);
        }
    }

    #[test]
    fn message_rendering() {
        let tree = parse(serde_json::json!({
            "operator": "AND",
            "conditions": [
                {"parameter": "voltage", "operator": "gt", "value": 240.0}
            ]
        }));
        let message = build_alert_message("High Voltage", &tree, &metrics(&[("voltage", 245.0)]));
        assert_eq!(message, "[High Voltage] voltage (245) gt 240");
    }

    #[test]
    fn message_rendering_nested() {
        let tree = parse(serde_json::json!({
            "operator": "OR",
            "conditions": [
                {
                    "operator": "AND",
                    "conditions": [
                        {"parameter": "voltage", "operator": "gt", "value": 200.0},
                        {"parameter": "current", "operator": "gt", "value": 3.0}
                    ]
                },
                {"parameter": "frequency", "operator": "gt", "value": 55.0}
            ]
        }));
        let message = build_alert_message(
            "Overload",
            &tree,
            &metrics(&[("voltage", 240.0), ("current", 4.0), ("frequency", 50.0)]),
        );
        assert_eq!(
            message,
            "[Overload] (voltage (240) gt 200 AND current (4) gt 3) OR frequency (50) gt 55"
        );
    }

    #[test]
    fn message_rendering_missing_metric_shows_placeholder() {
        let tree = parse(serde_json::json!({
            "parameter": "torque", "operator": "gt", "value": 10.0
        }));
        let message = build_alert_message("Torque", &tree, &metrics(&[]));
        assert_eq!(message, "[Torque] torque (?) gt 10");
    }
}
