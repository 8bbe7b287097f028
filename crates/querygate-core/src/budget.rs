//! Cost budgeting against a pre-computed execution plan.
//!
//! Ceilings apply to the single most expensive node, never to a sum across the
//! tree, so one bad scan trips the budget however cheap its siblings are.

use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MAX_TOTAL_COST: f64 = 500_000.0;
pub const DEFAULT_MAX_PLAN_ROWS: f64 = 1_000_000.0;

const COST_KEYS: &[&str] = &["Total Cost", "cost", "totalCost"];
const ROW_KEYS: &[&str] = &["Plan Rows", "estimatedRows", "rows"];
const CHILD_KEYS: &[&str] = &["Plans", "children"];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub max_total_cost: f64,
    pub max_plan_rows: f64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_total_cost: DEFAULT_MAX_TOTAL_COST,
            max_plan_rows: DEFAULT_MAX_PLAN_ROWS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub estimated_rows: f64,
    #[serde(default)]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn leaf(cost: f64, estimated_rows: f64) -> Self {
        Self {
            cost,
            estimated_rows,
            children: vec![],
        }
    }

    pub fn metrics(&self) -> PlanMetrics {
        let mut m = PlanMetrics::default();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            m.observe(node.cost, node.estimated_rows);
            stack.extend(node.children.iter());
        }
        m
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanMetrics {
    pub max_total_cost: f64,
    pub max_plan_rows: f64,
    pub nodes: usize,
}

impl PlanMetrics {
    fn observe(&mut self, cost: f64, rows: f64) {
        self.nodes += 1;
        if cost.is_finite() && cost > self.max_total_cost {
            self.max_total_cost = cost;
        }
        if rows.is_finite() && rows > self.max_plan_rows {
            self.max_plan_rows = rows;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetRejection {
    PlanParse,
    BudgetExceeded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetOutcome {
    pub ok: bool,
    pub errors: Vec<String>,
    pub metrics: Option<PlanMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exceeded: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<BudgetRejection>,
}

impl BudgetOutcome {
    pub fn into_result(self) -> Result<PlanMetrics, GateError> {
        match (self.rejection, self.metrics) {
            (None, Some(m)) => Ok(m),
            (Some(BudgetRejection::BudgetExceeded), _) => Err(GateError::Policy(self.errors)),
            _ => Err(GateError::Parse(self.errors.join("; "))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBudgetEvaluator {
    pub budget: Budget,
}

impl QueryBudgetEvaluator {
    pub fn new(budget: Budget) -> Self {
        Self { budget }
    }

    /// Evaluate raw planner output in any of the accepted shapes.
    pub fn evaluate(&self, explain: &Value) -> BudgetOutcome {
        match locate_plan(explain) {
            Some(root) => self.check(metrics_from_value(&root)),
            None => BudgetOutcome {
                ok: false,
                errors: vec!["Could not parse EXPLAIN output".into()],
                metrics: None,
                exceeded: vec![],
                rejection: Some(BudgetRejection::PlanParse),
            },
        }
    }

    pub fn evaluate_plan(&self, plan: &PlanNode) -> BudgetOutcome {
        self.check(plan.metrics())
    }

    fn check(&self, metrics: PlanMetrics) -> BudgetOutcome {
        let mut errors = Vec::new();
        let mut exceeded = Vec::new();
        if metrics.max_total_cost > self.budget.max_total_cost {
            exceeded.push("maxTotalCost".to_string());
            errors.push(format!(
                "Estimated total cost {} exceeds budget {} (maxTotalCost)",
                metrics.max_total_cost, self.budget.max_total_cost
            ));
        }
        if metrics.max_plan_rows > self.budget.max_plan_rows {
            exceeded.push("maxPlanRows".to_string());
            errors.push(format!(
                "Estimated plan rows {} exceeds budget {} (maxPlanRows)",
                metrics.max_plan_rows, self.budget.max_plan_rows
            ));
        }

        BudgetOutcome {
            ok: errors.is_empty(),
            rejection: (!errors.is_empty()).then_some(BudgetRejection::BudgetExceeded),
            errors,
            metrics: Some(metrics),
            exceeded,
        }
    }
}

type PlanLocator = fn(&Value) -> Option<Value>;

/// Ordered list of shapes a plan may arrive in; the first hit wins.
const PLAN_LOCATORS: &[(&str, PlanLocator)] = &[
    ("explain_rows", from_explain_rows),
    ("plan_array", from_plan_array),
    ("plan_object", from_plan_object),
    ("bare_node", from_bare_node),
];

pub fn locate_plan(input: &Value) -> Option<Value> {
    PLAN_LOCATORS.iter().find_map(|(name, locate)| {
        let found = locate(input);
        if found.is_some() {
            tracing::debug!(event = "budget.plan_located", strategy = name);
        }
        found
    })
}

fn from_explain_rows(input: &Value) -> Option<Value> {
    let first = input.as_array()?.first()?.as_object()?;
    let plan = first.get("QUERY PLAN").or_else(|| first.get("query_plan"))?;
    let parsed;
    let plan = match plan {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).ok()?;
            &parsed
        }
        other => other,
    };
    plan.as_array()?.first()?.get("Plan").cloned()
}

fn from_plan_array(input: &Value) -> Option<Value> {
    input.as_array()?.first()?.get("Plan").cloned()
}

fn from_plan_object(input: &Value) -> Option<Value> {
    input.as_object()?.get("Plan").cloned()
}

fn from_bare_node(input: &Value) -> Option<Value> {
    let obj = input.as_object()?;
    COST_KEYS
        .iter()
        .chain(ROW_KEYS)
        .any(|k| obj.contains_key(*k))
        .then(|| input.clone())
}

fn metrics_from_value(root: &Value) -> PlanMetrics {
    let mut m = PlanMetrics::default();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        m.observe(read_number(node, COST_KEYS), read_number(node, ROW_KEYS));
        if let Some(children) = CHILD_KEYS
            .iter()
            .find_map(|k| node.get(*k))
            .and_then(Value::as_array)
        {
            stack.extend(children.iter());
        }
    }
    m
}

fn read_number(node: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|k| node.get(*k))
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluator(cost: f64, rows: f64) -> QueryBudgetEvaluator {
        QueryBudgetEvaluator::new(Budget {
            max_total_cost: cost,
            max_plan_rows: rows,
        })
    }

    #[test]
    fn reads_postgres_explain_rows() {
        let explain = json!([{
            "QUERY PLAN": [{
                "Plan": {
                    "Node Type": "Aggregate",
                    "Total Cost": 120.5,
                    "Plan Rows": 1,
                    "Plans": [{"Node Type": "Seq Scan", "Total Cost": 100.0, "Plan Rows": 599}]
                }
            }]
        }]);
        let out = evaluator(1000.0, 1000.0).evaluate(&explain);
        assert!(out.ok);
        let m = out.metrics.unwrap();
        assert_eq!(m.max_total_cost, 120.5);
        assert_eq!(m.max_plan_rows, 599.0);
        assert_eq!(m.nodes, 2);
    }

    #[test]
    fn query_plan_may_arrive_as_text() {
        let explain = json!([{"QUERY PLAN": "[{\"Plan\": {\"Total Cost\": 9, \"Plan Rows\": 3}}]"}]);
        let out = evaluator(10.0, 10.0).evaluate(&explain);
        assert!(out.ok);
        assert_eq!(out.metrics.unwrap().max_total_cost, 9.0);
    }

    #[test]
    fn maximum_not_sum() {
        // many cheap siblings stay under budget even though their sum would not
        let cheap: Vec<PlanNode> = (0..50).map(|_| PlanNode::leaf(90.0, 10.0)).collect();
        let plan = PlanNode {
            cost: 95.0,
            estimated_rows: 10.0,
            children: cheap,
        };
        let out = evaluator(100.0, 100.0).evaluate_plan(&plan);
        assert!(out.ok, "{:?}", out.errors);
        assert_eq!(out.metrics.unwrap().max_total_cost, 95.0);
    }

    #[test]
    fn one_expensive_node_trips_the_budget() {
        let mut children: Vec<PlanNode> = (0..20).map(|_| PlanNode::leaf(1.0, 1.0)).collect();
        children.push(PlanNode {
            cost: 2.0,
            estimated_rows: 1.0,
            children: vec![PlanNode::leaf(750_000.0, 5_000_000.0)],
        });
        let plan = PlanNode {
            cost: 3.0,
            estimated_rows: 1.0,
            children,
        };
        let out = QueryBudgetEvaluator::default().evaluate_plan(&plan);
        assert!(!out.ok);
        assert_eq!(out.exceeded, vec!["maxTotalCost", "maxPlanRows"]);
        assert!(out.errors[0].contains("750000"));
        assert!(matches!(out.into_result(), Err(GateError::Policy(_))));
    }

    #[test]
    fn camel_case_tree_shape() {
        let plan = json!({"cost": 5, "estimatedRows": 2, "children": [{"cost": 50, "estimatedRows": 1}]});
        let out = evaluator(10.0, 10.0).evaluate(&plan);
        assert!(!out.ok);
        assert_eq!(out.exceeded, vec!["maxTotalCost"]);
    }

    #[test]
    fn unlocatable_plan_is_parse_error() {
        let out = QueryBudgetEvaluator::default().evaluate(&json!({"rows_returned": 3}));
        assert_eq!(out.rejection, Some(BudgetRejection::PlanParse));
        assert!(matches!(out.into_result(), Err(GateError::Parse(_))));
    }

    #[test]
    fn deep_plans_do_not_recurse() {
        let mut node = json!({"Total Cost": 1.0, "Plan Rows": 1});
        for i in 0..100 {
            node = json!({"Total Cost": i as f64, "Plan Rows": 1, "Plans": [node]});
        }
        let out = QueryBudgetEvaluator::default().evaluate(&json!({"Plan": node}));
        assert!(out.ok);
        assert_eq!(out.metrics.unwrap().nodes, 101);
    }
}
