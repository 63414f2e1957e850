//! In-memory backend
//!
//! Interprets compiled statements against per-entity row vectors with
//! full uniqueness and foreign-key enforcement. Mutations are validated
//! against a working copy and committed only when every row passes, so a
//! failed statement leaves table state unchanged. A statement counter is
//! exposed so tests can assert query budgets.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::backends::core::{Backend, Row, StatementOutcome};
use crate::error::{ConstraintKind, OrmError, OrmResult};
use crate::query::{
    AggregateExpr, AggregateFn, ComparisonOp, DeleteStatement, InsertStatement, JoinKind,
    OrderDirection, Predicate, ProjectionExpr, ScalarExpr, SelectStatement, Statement,
    UpdateStatement,
};
use crate::schema::{EntityDef, SchemaRegistry, UniqueConstraint};

/// A row widened with entity qualifiers, so joined columns coexist
type ScopedRow = HashMap<(String, String), Value>;

/// Backend interpreting statements against in-memory tables
pub struct MemoryBackend {
    registry: Arc<SchemaRegistry>,
    tables: Mutex<HashMap<String, Vec<Row>>>,
    statements: AtomicUsize,
}

impl MemoryBackend {
    /// Create an empty table per registered entity
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        let tables = registry
            .entities()
            .map(|entity| (entity.name.clone(), Vec::new()))
            .collect();
        Self {
            registry,
            tables: Mutex::new(tables),
            statements: AtomicUsize::new(0),
        }
    }

    /// Number of statements executed since construction or the last reset
    pub fn statements_issued(&self) -> usize {
        self.statements.load(AtomicOrdering::SeqCst)
    }

    /// Reset the statement counter
    pub fn reset_statement_count(&self) {
        self.statements.store(0, AtomicOrdering::SeqCst);
    }

    /// Snapshot of an entity's rows, for state assertions in tests
    pub fn table(&self, entity: &str) -> Vec<Row> {
        self.tables
            .lock()
            .map(|tables| tables.get(entity).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock_tables(&self) -> OrmResult<std::sync::MutexGuard<'_, HashMap<String, Vec<Row>>>> {
        self.tables
            .lock()
            .map_err(|_| OrmError::Backend("memory backend lock poisoned".to_string()))
    }

    fn run_select(&self, statement: &SelectStatement) -> OrmResult<StatementOutcome> {
        let tables = self.lock_tables()?;
        let root = statement.entity.as_str();
        let base = tables
            .get(root)
            .ok_or_else(|| OrmError::Schema(format!("unknown entity '{}'", root)))?;

        let mut scoped: Vec<ScopedRow> = base.iter().map(|row| scope_row(root, row)).collect();

        for join in &statement.joins {
            let right_def = self.registry.entity(&join.entity)?;
            let right_rows = tables
                .get(&join.entity)
                .ok_or_else(|| OrmError::Schema(format!("unknown entity '{}'", join.entity)))?;

            let mut joined = Vec::new();
            for left_row in scoped {
                let mut matched = false;
                for right in right_rows {
                    let mut candidate = left_row.clone();
                    for (key, value) in scope_row(&join.entity, right) {
                        candidate.insert(key, value);
                    }
                    let left_value = eval_scalar_scoped(
                        &ScalarExpr::Column(join.on_left.clone()),
                        &candidate,
                        root,
                    )?;
                    let right_value = eval_scalar_scoped(
                        &ScalarExpr::Column(join.on_right.clone()),
                        &candidate,
                        root,
                    )?;
                    if !left_value.is_null()
                        && !right_value.is_null()
                        && values_equal(&left_value, &right_value)
                    {
                        joined.push(candidate);
                        matched = true;
                    }
                }
                if !matched && join.kind == JoinKind::Left {
                    let mut candidate = left_row;
                    for column in right_def.column_names() {
                        candidate.insert((join.entity.clone(), column.to_string()), Value::Null);
                    }
                    joined.push(candidate);
                }
            }
            scoped = joined;
        }

        if let Some(filter) = &statement.filter {
            let mut kept = Vec::new();
            for row in scoped {
                if eval_predicate_scoped(filter, &row, root)? {
                    kept.push(row);
                }
            }
            scoped = kept;
        }

        let grouped = !statement.group_by.is_empty()
            || statement
                .projection
                .iter()
                .any(|item| item.expr.is_aggregate());

        // Each output row keeps a representative source row so ORDER BY
        // can reference unprojected columns.
        let mut output: Vec<(Option<ScopedRow>, Row)> = Vec::new();

        if grouped {
            let mut group_order: Vec<String> = Vec::new();
            let mut groups: HashMap<String, Vec<ScopedRow>> = HashMap::new();
            if statement.group_by.is_empty() {
                group_order.push(String::new());
                groups.insert(String::new(), scoped);
            } else {
                for row in scoped {
                    let mut key_values = Vec::new();
                    for column in &statement.group_by {
                        key_values.push(eval_scalar_scoped(
                            &ScalarExpr::Column(crate::query::ColumnRef::unqualified(column)),
                            &row,
                            root,
                        )?);
                    }
                    let key = Value::Array(key_values).to_string();
                    if !groups.contains_key(&key) {
                        group_order.push(key.clone());
                    }
                    groups.entry(key).or_default().push(row);
                }
            }

            for key in group_order {
                let rows = groups.remove(&key).unwrap_or_default();
                let first = rows.first().cloned();
                let mut out = Row::new();
                for item in &statement.projection {
                    let value = match &item.expr {
                        ProjectionExpr::Scalar(expr) => match &first {
                            Some(representative) => {
                                eval_scalar_scoped(expr, representative, root)?
                            }
                            None => Value::Null,
                        },
                        ProjectionExpr::Aggregate(aggregate) => {
                            eval_aggregate(aggregate, &rows, root)?
                        }
                    };
                    out.insert(item.alias.clone(), value);
                }
                if let Some(having) = &statement.having {
                    if !eval_predicate_having(
                        having,
                        &out,
                        &statement.group_by,
                        first.as_ref(),
                        root,
                    )? {
                        continue;
                    }
                }
                output.push((first, out));
            }
        } else {
            for row in scoped {
                let mut out = Row::new();
                for item in &statement.projection {
                    if let ProjectionExpr::Scalar(expr) = &item.expr {
                        out.insert(item.alias.clone(), eval_scalar_scoped(expr, &row, root)?);
                    }
                }
                output.push((Some(row), out));
            }
        }

        // Stable sorts applied from the last key to the first give
        // lexicographic multi-key ordering.
        for (column, direction) in statement.order_by.iter().rev() {
            output.sort_by(|a, b| {
                let left = order_key(a, column, root);
                let right = order_key(b, column, root);
                let ordering = compare_values(&left, &right);
                match direction {
                    OrderDirection::Asc => ordering,
                    OrderDirection::Desc => ordering.reverse(),
                }
            });
        }

        let offset = statement.offset.unwrap_or(0).max(0) as usize;
        let mut rows: Vec<Row> = output.into_iter().skip(offset).map(|(_, row)| row).collect();
        if let Some(limit) = statement.limit {
            rows.truncate(limit.max(0) as usize);
        }

        Ok(StatementOutcome::rows(rows))
    }

    fn run_insert(&self, statement: &InsertStatement) -> OrmResult<StatementOutcome> {
        let entity = self.registry.entity(&statement.entity)?;
        let mut tables = self.lock_tables()?;
        let mut working = tables.get(&statement.entity).cloned().unwrap_or_default();

        let mut touched: Vec<Row> = Vec::new();
        for values in &statement.rows {
            let row: Row = statement
                .columns
                .iter()
                .cloned()
                .zip(values.iter().cloned())
                .collect();

            match find_unique_conflict(entity, &working, &row) {
                Some((constraint, columns, index)) => {
                    let policy = statement
                        .on_conflict
                        .as_ref()
                        .filter(|policy| same_column_set(&policy.target, &columns));
                    match policy {
                        Some(policy) => {
                            for (column, value) in &policy.set {
                                working[index].insert(column.clone(), value.clone());
                            }
                            check_foreign_keys(&tables, entity, &working[index])?;
                            touched.push(working[index].clone());
                        }
                        None => {
                            warn!(entity = %entity.name, constraint = %constraint, "unique violation");
                            return Err(OrmError::ConstraintViolation {
                                constraint,
                                kind: ConstraintKind::Unique,
                                detail: format!("duplicate key in '{}'", entity.name),
                            });
                        }
                    }
                }
                None => {
                    check_foreign_keys(&tables, entity, &row)?;
                    working.push(row.clone());
                    touched.push(row);
                }
            }
        }

        let affected = touched.len() as u64;
        tables.insert(statement.entity.clone(), working);
        Ok(mutation_outcome(touched, affected, statement.returning.as_deref()))
    }

    fn run_update(&self, statement: &UpdateStatement) -> OrmResult<StatementOutcome> {
        let entity = self.registry.entity(&statement.entity)?;
        let mut tables = self.lock_tables()?;
        let mut working = tables.get(&statement.entity).cloned().unwrap_or_default();

        let mut touched_indexes = Vec::new();
        for (index, row) in working.iter().enumerate() {
            let selected = match &statement.filter {
                Some(filter) => {
                    eval_predicate_scoped(filter, &scope_row(&entity.name, row), &entity.name)?
                }
                None => true,
            };
            if selected {
                touched_indexes.push(index);
            }
        }

        for index in &touched_indexes {
            for (column, value) in &statement.set {
                working[*index].insert(column.clone(), value.clone());
            }
        }

        for constraint in unique_constraints(entity) {
            let mut seen: HashMap<String, usize> = HashMap::new();
            for (index, row) in working.iter().enumerate() {
                let key_values: Vec<Value> = constraint
                    .columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                    .collect();
                if key_values.iter().any(Value::is_null) {
                    continue;
                }
                let key = Value::Array(key_values).to_string();
                if seen.insert(key, index).is_some() {
                    return Err(OrmError::ConstraintViolation {
                        constraint: constraint.name.clone(),
                        kind: ConstraintKind::Unique,
                        detail: format!("duplicate key in '{}' after update", entity.name),
                    });
                }
            }
        }

        for index in &touched_indexes {
            check_foreign_keys(&tables, entity, &working[*index])?;
        }

        let touched: Vec<Row> = touched_indexes
            .iter()
            .map(|index| working[*index].clone())
            .collect();
        let affected = touched.len() as u64;
        tables.insert(statement.entity.clone(), working);
        Ok(mutation_outcome(touched, affected, statement.returning.as_deref()))
    }

    fn run_delete(&self, statement: &DeleteStatement) -> OrmResult<StatementOutcome> {
        let entity = self.registry.entity(&statement.entity)?;
        let mut tables = self.lock_tables()?;
        let working = tables.get(&statement.entity).cloned().unwrap_or_default();

        let mut kept = Vec::new();
        let mut removed = Vec::new();
        for row in working {
            let selected = match &statement.filter {
                Some(filter) => {
                    eval_predicate_scoped(filter, &scope_row(&entity.name, &row), &entity.name)?
                }
                None => true,
            };
            if selected {
                removed.push(row);
            } else {
                kept.push(row);
            }
        }

        if !removed.is_empty() {
            let removed_keys: Vec<Vec<Value>> = removed
                .iter()
                .map(|row| {
                    entity
                        .primary_key
                        .iter()
                        .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();

            for other in self.registry.entities() {
                for fk in other
                    .foreign_keys
                    .iter()
                    .filter(|fk| fk.references_entity == entity.name)
                {
                    let referencing: &[Row] = if other.name == entity.name {
                        &kept
                    } else {
                        tables.get(&other.name).map(|rows| rows.as_slice()).unwrap_or(&[])
                    };
                    for row in referencing {
                        let values: Vec<Value> = fk
                            .columns
                            .iter()
                            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                            .collect();
                        if values.iter().any(Value::is_null) {
                            continue;
                        }
                        let still_referenced = removed_keys
                            .iter()
                            .any(|key| rows_equal(key, &values));
                        if still_referenced {
                            warn!(entity = %entity.name, constraint = %fk.name, "delete blocked by reference");
                            return Err(OrmError::ConstraintViolation {
                                constraint: fk.name.clone(),
                                kind: ConstraintKind::ForeignKey,
                                detail: format!(
                                    "rows in '{}' still reference '{}'",
                                    other.name, entity.name
                                ),
                            });
                        }
                    }
                }
            }
        }

        let affected = removed.len() as u64;
        tables.insert(statement.entity.clone(), kept);
        Ok(StatementOutcome::affected(affected))
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn run(&self, statement: &Statement) -> OrmResult<StatementOutcome> {
        self.statements.fetch_add(1, AtomicOrdering::SeqCst);
        debug!(entity = statement.entity(), "memory backend statement");
        match statement {
            Statement::Select(select) => self.run_select(select),
            Statement::Insert(insert) => self.run_insert(insert),
            Statement::Update(update) => self.run_update(update),
            Statement::Delete(delete) => self.run_delete(delete),
        }
    }
}

fn scope_row(entity: &str, row: &Row) -> ScopedRow {
    row.iter()
        .map(|(column, value)| ((entity.to_string(), column.clone()), value.clone()))
        .collect()
}

fn mutation_outcome(touched: Vec<Row>, affected: u64, returning: Option<&[String]>) -> StatementOutcome {
    match returning {
        Some(columns) => {
            let rows = touched
                .into_iter()
                .map(|row| {
                    columns
                        .iter()
                        .map(|column| {
                            (
                                column.clone(),
                                row.get(column).cloned().unwrap_or(Value::Null),
                            )
                        })
                        .collect()
                })
                .collect();
            StatementOutcome {
                rows,
                rows_affected: affected,
            }
        }
        None => StatementOutcome::affected(affected),
    }
}

fn unique_constraints(entity: &EntityDef) -> Vec<UniqueConstraint> {
    let mut constraints = vec![UniqueConstraint {
        name: entity.primary_key_constraint_name(),
        columns: entity.primary_key.clone(),
    }];
    constraints.extend(entity.uniques.iter().cloned());
    constraints
}

fn find_unique_conflict(
    entity: &EntityDef,
    rows: &[Row],
    candidate: &Row,
) -> Option<(String, Vec<String>, usize)> {
    for constraint in unique_constraints(entity) {
        let key_values: Vec<Value> = constraint
            .columns
            .iter()
            .map(|column| candidate.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        if key_values.iter().any(Value::is_null) {
            continue;
        }
        for (index, row) in rows.iter().enumerate() {
            let existing: Vec<Value> = constraint
                .columns
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
                .collect();
            if rows_equal(&key_values, &existing) {
                return Some((constraint.name.clone(), constraint.columns.clone(), index));
            }
        }
    }
    None
}

fn check_foreign_keys(
    tables: &HashMap<String, Vec<Row>>,
    entity: &EntityDef,
    row: &Row,
) -> OrmResult<()> {
    for fk in &entity.foreign_keys {
        let values: Vec<Value> = fk
            .columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        if values.iter().any(Value::is_null) {
            continue;
        }
        let target_rows = tables
            .get(&fk.references_entity)
            .map(|rows| rows.as_slice())
            .unwrap_or(&[]);
        let found = target_rows.iter().any(|target| {
            let target_values: Vec<Value> = fk
                .references_columns
                .iter()
                .map(|column| target.get(column).cloned().unwrap_or(Value::Null))
                .collect();
            rows_equal(&values, &target_values)
        });
        if !found {
            warn!(entity = %entity.name, constraint = %fk.name, "foreign key violation");
            return Err(OrmError::ConstraintViolation {
                constraint: fk.name.clone(),
                kind: ConstraintKind::ForeignKey,
                detail: format!(
                    "no row in '{}' matches the referenced key",
                    fk.references_entity
                ),
            });
        }
    }
    Ok(())
}

fn same_column_set(left: &[String], right: &[String]) -> bool {
    let mut left_sorted = left.to_vec();
    let mut right_sorted = right.to_vec();
    left_sorted.sort_unstable();
    right_sorted.sort_unstable();
    left_sorted == right_sorted
}

fn order_key(entry: &(Option<ScopedRow>, Row), column: &str, root: &str) -> Value {
    if let Some(value) = entry.1.get(column) {
        return value.clone();
    }
    entry
        .0
        .as_ref()
        .and_then(|scoped| scoped.get(&(root.to_string(), column.to_string())).cloned())
        .unwrap_or(Value::Null)
}

fn eval_scalar_scoped(expr: &ScalarExpr, row: &ScopedRow, root: &str) -> OrmResult<Value> {
    match expr {
        ScalarExpr::Column(reference) => {
            let entity = reference.entity.as_deref().unwrap_or(root);
            row.get(&(entity.to_string(), reference.column.clone()))
                .cloned()
                .ok_or_else(|| {
                    OrmError::Backend(format!(
                        "column '{}' not present at evaluation time",
                        reference
                    ))
                })
        }
        ScalarExpr::Literal(value) => Ok(value.clone()),
        ScalarExpr::Lower(inner) => map_string(eval_scalar_scoped(inner, row, root)?, |s| {
            s.to_lowercase()
        }),
        ScalarExpr::Upper(inner) => map_string(eval_scalar_scoped(inner, row, root)?, |s| {
            s.to_uppercase()
        }),
        ScalarExpr::Coalesce(args) => {
            for arg in args {
                let value = eval_scalar_scoped(arg, row, root)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            Ok(Value::Null)
        }
    }
}

fn map_string(value: Value, transform: impl Fn(&str) -> String) -> OrmResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(text) => Ok(Value::String(transform(&text))),
        other => Err(OrmError::Backend(format!(
            "string function applied to non-string value {}",
            other
        ))),
    }
}

fn eval_predicate_scoped(predicate: &Predicate, row: &ScopedRow, root: &str) -> OrmResult<bool> {
    match predicate {
        Predicate::And(parts) => {
            for part in parts {
                if !eval_predicate_scoped(part, row, root)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for part in parts {
                if eval_predicate_scoped(part, row, root)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Compare { left, op, values } => {
            let left_value = eval_scalar_scoped(left, row, root)?;
            Ok(compare_with_op(&left_value, *op, values))
        }
    }
}

// HAVING predicates reference projection aliases or grouped columns;
// grouped columns not in the projection fall back to the group's
// representative source row.
fn eval_predicate_having(
    predicate: &Predicate,
    out: &Row,
    group_by: &[String],
    representative: Option<&ScopedRow>,
    root: &str,
) -> OrmResult<bool> {
    match predicate {
        Predicate::And(parts) => {
            for part in parts {
                if !eval_predicate_having(part, out, group_by, representative, root)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for part in parts {
                if eval_predicate_having(part, out, group_by, representative, root)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Compare { left, op, values } => {
            let left_value = eval_scalar_having(left, out, group_by, representative, root)?;
            Ok(compare_with_op(&left_value, *op, values))
        }
    }
}

fn eval_scalar_having(
    expr: &ScalarExpr,
    out: &Row,
    group_by: &[String],
    representative: Option<&ScopedRow>,
    root: &str,
) -> OrmResult<Value> {
    match expr {
        ScalarExpr::Column(reference) => {
            if reference.entity.is_none() {
                if let Some(value) = out.get(&reference.column) {
                    return Ok(value.clone());
                }
            }
            if group_by.contains(&reference.column) {
                if let Some(row) = representative {
                    return eval_scalar_scoped(expr, row, root);
                }
            }
            Err(OrmError::Backend(format!(
                "having reference '{}' not resolvable",
                reference
            )))
        }
        ScalarExpr::Literal(value) => Ok(value.clone()),
        ScalarExpr::Lower(inner) => map_string(
            eval_scalar_having(inner, out, group_by, representative, root)?,
            |s| s.to_lowercase(),
        ),
        ScalarExpr::Upper(inner) => map_string(
            eval_scalar_having(inner, out, group_by, representative, root)?,
            |s| s.to_uppercase(),
        ),
        ScalarExpr::Coalesce(args) => {
            for arg in args {
                let value = eval_scalar_having(arg, out, group_by, representative, root)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            Ok(Value::Null)
        }
    }
}

fn eval_aggregate(aggregate: &AggregateExpr, rows: &[ScopedRow], root: &str) -> OrmResult<Value> {
    let arg = match &aggregate.arg {
        Some(arg) => arg,
        // COUNT(*) counts rows regardless of content.
        None => return Ok(Value::Number(Number::from(rows.len() as i64))),
    };

    let mut values = Vec::with_capacity(rows.len());
    for row in rows {
        values.push(eval_scalar_scoped(arg, row, root)?);
    }
    let non_null: Vec<&Value> = values.iter().filter(|value| !value.is_null()).collect();

    match aggregate.func {
        AggregateFn::Count => Ok(Value::Number(Number::from(non_null.len() as i64))),
        AggregateFn::Sum => Ok(sum_values(&non_null)),
        AggregateFn::Avg => {
            if non_null.is_empty() {
                return Ok(Value::Null);
            }
            let total: f64 = non_null
                .iter()
                .filter_map(|value| value.as_f64())
                .sum();
            Ok(Number::from_f64(total / non_null.len() as f64)
                .map(Value::Number)
                .unwrap_or(Value::Null))
        }
        AggregateFn::Min => Ok(non_null
            .iter()
            .min_by(|a, b| compare_values(a, b))
            .map(|value| (*value).clone())
            .unwrap_or(Value::Null)),
        AggregateFn::Max => Ok(non_null
            .iter()
            .max_by(|a, b| compare_values(a, b))
            .map(|value| (*value).clone())
            .unwrap_or(Value::Null)),
    }
}

fn sum_values(values: &[&Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    if values.iter().all(|value| value.as_i64().is_some()) {
        let total: i64 = values.iter().filter_map(|value| value.as_i64()).sum();
        return Value::Number(Number::from(total));
    }
    let total: f64 = values.iter().filter_map(|value| value.as_f64()).sum();
    Number::from_f64(total)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn compare_with_op(left: &Value, op: ComparisonOp, values: &[Value]) -> bool {
    match op {
        ComparisonOp::IsNull => left.is_null(),
        ComparisonOp::IsNotNull => !left.is_null(),
        ComparisonOp::In => {
            !left.is_null() && values.iter().any(|value| values_equal(left, value))
        }
        ComparisonOp::Between => {
            if left.is_null() || values[0].is_null() || values[1].is_null() {
                return false;
            }
            compare_values(left, &values[0]) != Ordering::Less
                && compare_values(left, &values[1]) != Ordering::Greater
        }
        ComparisonOp::Like => match (left, &values[0]) {
            (Value::String(text), Value::String(pattern)) => like_match(pattern, text),
            _ => false,
        },
        ComparisonOp::Equal => {
            !left.is_null() && !values[0].is_null() && values_equal(left, &values[0])
        }
        ComparisonOp::NotEqual => {
            !left.is_null() && !values[0].is_null() && !values_equal(left, &values[0])
        }
        ComparisonOp::GreaterThan => {
            comparable(left, &values[0]) && compare_values(left, &values[0]) == Ordering::Greater
        }
        ComparisonOp::GreaterThanOrEqual => {
            comparable(left, &values[0]) && compare_values(left, &values[0]) != Ordering::Less
        }
        ComparisonOp::LessThan => {
            comparable(left, &values[0]) && compare_values(left, &values[0]) == Ordering::Less
        }
        ComparisonOp::LessThanOrEqual => {
            comparable(left, &values[0]) && compare_values(left, &values[0]) != Ordering::Greater
        }
    }
}

fn comparable(left: &Value, right: &Value) -> bool {
    !left.is_null() && !right.is_null()
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            a.as_f64().unwrap_or(f64::NAN) == b.as_f64().unwrap_or(f64::NAN)
        }
        _ => left == right,
    }
}

fn rows_equal(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right.iter())
            .all(|(a, b)| values_equal(a, b))
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .unwrap_or_default()
            .partial_cmp(&b.as_f64().unwrap_or_default())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}

// SQL LIKE with % and _ wildcards.
fn like_match(pattern: &str, text: &str) -> bool {
    fn matches(pattern: &[char], text: &[char]) -> bool {
        match pattern.first() {
            None => text.is_empty(),
            Some('%') => (0..=text.len()).any(|skip| matches(&pattern[1..], &text[skip..])),
            Some('_') => !text.is_empty() && matches(&pattern[1..], &text[1..]),
            Some(expected) => {
                text.first() == Some(expected) && matches(&pattern[1..], &text[1..])
            }
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    matches(&pattern, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_like_match_wildcards() {
        assert!(like_match("der%", "derek"));
        assert!(like_match("%@test.com", "derek@test.com"));
        assert!(like_match("d_rek", "derek"));
        assert!(!like_match("derek_", "derek"));
    }

    #[test]
    fn test_values_equal_across_number_forms() {
        assert!(values_equal(&json!(18), &json!(18.0)));
        assert!(!values_equal(&json!(18), &json!("18")));
    }

    #[test]
    fn test_sum_prefers_integer_arithmetic() {
        let a = json!(1);
        let b = json!(2);
        assert_eq!(sum_values(&[&a, &b]), json!(3));
        let c = json!(1.5);
        assert_eq!(sum_values(&[&a, &c]), json!(2.5));
    }
}
