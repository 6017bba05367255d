//! Query and scan expression builder.
//!
//! [`QueryBuilder`] accumulates filter and key conditions and renders them
//! into the expression strings and placeholder maps of a [`ScanInput`] or
//! [`QueryInput`]. Within one render, each distinct attribute gets one `#fN`
//! name placeholder and each distinct value one `:vN` value placeholder, so a
//! field or value used by several conditions is declared once.

use std::collections::HashMap;
use std::fmt;

use dynamap_model::input::{QueryInput, ScanInput};
use dynamap_model::types::{ExpressionAttributeNames, ExpressionAttributeValues};
use dynamap_model::{AttributeValue, Key};

use crate::error::QueryError;

// ---------------------------------------------------------------------------
// Operators & conditions
// ---------------------------------------------------------------------------

/// A condition operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `BETWEEN a AND b`; the value is a two-element list.
    Between,
    /// `begins_with(attr, value)`
    BeginsWith,
    /// `attr IN (...)`; the value is a non-empty list.
    In,
    /// `attribute_exists(attr)`
    AttributeExists,
    /// `attribute_not_exists(attr)`
    AttributeNotExists,
    /// `attribute_type(attr, value)`
    AttributeType,
    /// `contains(attr, value)`
    Contains,
    /// `size(attr) = value`
    Size,
    /// Any other operator, rendered as `attr OP value`.
    Other(String),
}

impl From<&str> for Operator {
    fn from(op: &str) -> Self {
        match op {
            "=" => Self::Eq,
            "<>" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "between" => Self::Between,
            "begins_with" => Self::BeginsWith,
            "in" => Self::In,
            "attribute_exists" => Self::AttributeExists,
            "attribute_not_exists" => Self::AttributeNotExists,
            "attribute_type" => Self::AttributeType,
            "contains" => Self::Contains,
            "size" => Self::Size,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Between => "between",
            Self::BeginsWith => "begins_with",
            Self::In => "in",
            Self::AttributeExists => "attribute_exists",
            Self::AttributeNotExists => "attribute_not_exists",
            Self::AttributeType => "attribute_type",
            Self::Contains => "contains",
            Self::Size => "size",
            Self::Other(op) => op,
        };
        f.write_str(s)
    }
}

/// Which expression a condition belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// Rendered into `FilterExpression`.
    Filter,
    /// Rendered into `KeyConditionExpression`.
    KeyCondition,
}

/// One accumulated predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Target expression.
    pub kind: ConditionKind,
    /// Attribute name.
    pub field: String,
    /// Operator.
    pub operator: Operator,
    /// Operand; `Null` for operators that take none.
    pub value: AttributeValue,
}

/// A rendered expression and the placeholders it declares.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedExpression {
    /// The expression, or `None` if no condition of the kind was added.
    pub expression: Option<String>,
    /// Name placeholders.
    pub names: ExpressionAttributeNames,
    /// Value placeholders.
    pub values: ExpressionAttributeValues,
}

// ---------------------------------------------------------------------------
// Placeholder allocation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Placeholders {
    by_field: HashMap<String, String>,
    by_value: HashMap<AttributeValue, String>,
    names: ExpressionAttributeNames,
    values: ExpressionAttributeValues,
}

impl Placeholders {
    fn name(&mut self, field: &str) -> String {
        if let Some(existing) = self.by_field.get(field) {
            return existing.clone();
        }
        let placeholder = format!("#f{}", self.by_field.len());
        self.by_field.insert(field.to_owned(), placeholder.clone());
        self.names.insert(placeholder.clone(), field.to_owned());
        placeholder
    }

    fn value(&mut self, value: &AttributeValue) -> String {
        if let Some(existing) = self.by_value.get(value) {
            return existing.clone();
        }
        let placeholder = format!(":v{}", self.by_value.len());
        self.by_value.insert(value.clone(), placeholder.clone());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    fn render(
        &mut self,
        conditions: &[Condition],
        kind: ConditionKind,
    ) -> Result<Option<String>, QueryError> {
        let parts = conditions
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| self.fragment(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((!parts.is_empty()).then(|| parts.join(" AND ")))
    }

    fn fragment(&mut self, cond: &Condition) -> Result<String, QueryError> {
        let attr = self.name(&cond.field);
        let fragment = match &cond.operator {
            Operator::Between => {
                let [low, high] = operands::<2>(cond)?;
                let low = self.value(low);
                let high = self.value(high);
                format!("{attr} BETWEEN {low} AND {high}")
            }
            Operator::In => {
                let list = list_operand(cond)?;
                if list.is_empty() {
                    return Err(invalid(cond, "expected at least one value"));
                }
                let placeholders: Vec<String> = list.iter().map(|v| self.value(v)).collect();
                format!("{attr} IN ({})", placeholders.join(", "))
            }
            Operator::AttributeExists => format!("attribute_exists({attr})"),
            Operator::AttributeNotExists => format!("attribute_not_exists({attr})"),
            Operator::BeginsWith => format!("begins_with({attr}, {})", self.value(&cond.value)),
            Operator::AttributeType => {
                format!("attribute_type({attr}, {})", self.value(&cond.value))
            }
            Operator::Contains => format!("contains({attr}, {})", self.value(&cond.value)),
            Operator::Size => format!("size({attr}) = {}", self.value(&cond.value)),
            op => format!("{attr} {op} {}", self.value(&cond.value)),
        };
        Ok(fragment)
    }

    fn finish(self, expression: Option<String>) -> RenderedExpression {
        RenderedExpression {
            expression,
            names: self.names,
            values: self.values,
        }
    }
}

fn invalid(cond: &Condition, message: &str) -> QueryError {
    QueryError::InvalidOperand {
        operator: cond.operator.to_string(),
        field: cond.field.clone(),
        message: message.to_owned(),
    }
}

fn list_operand(cond: &Condition) -> Result<&[AttributeValue], QueryError> {
    cond.value
        .as_l()
        .ok_or_else(|| invalid(cond, "expected a list of values"))
}

fn operands<const N: usize>(cond: &Condition) -> Result<&[AttributeValue; N], QueryError> {
    list_operand(cond)?
        .try_into()
        .map_err(|_| invalid(cond, &format!("expected exactly {N} values")))
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Accumulates conditions and paging options for a scan or query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    conditions: Vec<Condition>,
    limit: Option<i32>,
    start_key: Key,
    index: Option<String>,
}

impl QueryBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter condition.
    pub fn filter(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<Operator>,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        self.push(ConditionKind::Filter, field, operator.into(), value.into())
    }

    /// Add a filter that takes no operand, such as `attribute_exists`.
    pub fn filter_unary(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<Operator>,
    ) -> &mut Self {
        self.push(
            ConditionKind::Filter,
            field,
            operator.into(),
            AttributeValue::Null(true),
        )
    }

    /// Add a key condition.
    pub fn key_condition(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<Operator>,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        self.push(
            ConditionKind::KeyCondition,
            field,
            operator.into(),
            value.into(),
        )
    }

    /// Add an equality key condition.
    pub fn key_eq(
        &mut self,
        field: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        self.key_condition(field, Operator::Eq, value)
    }

    /// Limit the number of items evaluated.
    pub fn limit(&mut self, limit: i32) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Continue from a previous page's cursor.
    pub fn exclusive_start_key(&mut self, key: Key) -> &mut Self {
        self.start_key = key;
        self
    }

    /// Query a secondary index.
    pub fn index(&mut self, name: impl Into<String>) -> &mut Self {
        self.index = Some(name.into());
        self
    }

    /// The accumulated conditions, in insertion order.
    #[must_use]
    pub fn conditions_list(&self) -> &[Condition] {
        &self.conditions
    }

    fn push(
        &mut self,
        kind: ConditionKind,
        field: impl Into<String>,
        operator: Operator,
        value: AttributeValue,
    ) -> &mut Self {
        self.conditions.push(Condition {
            kind,
            field: field.into(),
            operator,
            value,
        });
        self
    }

    /// Render the conditions of one kind on their own.
    pub fn render(&self, kind: ConditionKind) -> Result<RenderedExpression, QueryError> {
        let mut placeholders = Placeholders::default();
        let expression = placeholders.render(&self.conditions, kind)?;
        Ok(placeholders.finish(expression))
    }

    /// Build a scan request for `table` from the filter conditions.
    pub fn filters(&self, table: impl Into<String>) -> Result<ScanInput, QueryError> {
        let rendered = self.render(ConditionKind::Filter)?;
        Ok(ScanInput {
            table_name: table.into(),
            filter_expression: rendered.expression,
            expression_attribute_names: rendered.names,
            expression_attribute_values: rendered.values,
            limit: self.limit,
            exclusive_start_key: self.start_key.clone(),
        })
    }

    /// Build a query request for `table` from the key and filter conditions.
    ///
    /// Both expressions share one placeholder table.
    pub fn conditions(&self, table: impl Into<String>) -> Result<QueryInput, QueryError> {
        let mut placeholders = Placeholders::default();
        let key_condition = placeholders.render(&self.conditions, ConditionKind::KeyCondition)?;
        let filter = placeholders.render(&self.conditions, ConditionKind::Filter)?;
        let rendered = placeholders.finish(filter);
        Ok(QueryInput {
            table_name: table.into(),
            index_name: self.index.clone(),
            key_condition_expression: key_condition,
            filter_expression: rendered.expression,
            expression_attribute_names: rendered.names,
            expression_attribute_values: rendered.values,
            limit: self.limit,
            exclusive_start_key: self.start_key.clone(),
        })
    }
}
