//! Statement rendering to parameterized SQL
//!
//! Values never appear inline; every literal becomes a `$n` placeholder
//! with its value pushed onto the parameter list.

use serde_json::Value;

use crate::query::expr::{AggregateExpr, ProjectionExpr, ScalarExpr, SelectItem};
use crate::query::predicate::Predicate;
use crate::query::statement::{
    DeleteStatement, InsertStatement, SelectStatement, Statement, UpdateStatement,
};
use crate::query::types::ComparisonOp;

/// Render a compiled statement to SQL text plus bound parameters
pub fn render(statement: &Statement) -> (String, Vec<Value>) {
    let mut params = Vec::new();
    let sql = match statement {
        Statement::Select(select) => render_select(select, &mut params),
        Statement::Insert(insert) => render_insert(insert, &mut params),
        Statement::Update(update) => render_update(update, &mut params),
        Statement::Delete(delete) => render_delete(delete, &mut params),
    };
    (sql, params)
}

fn render_select(statement: &SelectStatement, params: &mut Vec<Value>) -> String {
    let mut sql = String::from("SELECT ");

    let items: Vec<String> = statement
        .projection
        .iter()
        .map(|item| render_item(item, params))
        .collect();
    sql.push_str(&items.join(", "));

    sql.push_str(" FROM ");
    sql.push_str(&statement.entity);

    for join in &statement.joins {
        sql.push_str(&format!(
            " {} {} ON {} = {}",
            join.kind, join.entity, join.on_left, join.on_right
        ));
    }

    if let Some(filter) = &statement.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&render_predicate(filter, params, None));
    }

    if !statement.group_by.is_empty() {
        sql.push_str(" GROUP BY ");
        sql.push_str(&statement.group_by.join(", "));
    }

    if let Some(having) = &statement.having {
        sql.push_str(" HAVING ");
        // SQL cannot reference select aliases in HAVING; aliased
        // aggregates are expanded back to their expressions.
        sql.push_str(&render_predicate(having, params, Some(&statement.projection)));
    }

    if !statement.order_by.is_empty() {
        let clauses: Vec<String> = statement
            .order_by
            .iter()
            .map(|(column, direction)| format!("{} {}", column, direction))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&clauses.join(", "));
    }

    if let Some(limit) = statement.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = statement.offset {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    sql
}

fn render_insert(statement: &InsertStatement, params: &mut Vec<Value>) -> String {
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        statement.entity,
        statement.columns.join(", ")
    );

    let rows: Vec<String> = statement
        .rows
        .iter()
        .map(|row| {
            let placeholders: Vec<String> = row
                .iter()
                .map(|value| push_param(value.clone(), params))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    sql.push_str(&rows.join(", "));

    if let Some(on_conflict) = &statement.on_conflict {
        sql.push_str(&format!(
            " ON CONFLICT ({}) DO UPDATE SET ",
            on_conflict.target.join(", ")
        ));
        let updates: Vec<String> = on_conflict
            .set
            .iter()
            .map(|(column, value)| format!("{} = {}", column, push_param(value.clone(), params)))
            .collect();
        sql.push_str(&updates.join(", "));
    }

    if let Some(returning) = &statement.returning {
        sql.push_str(&format!(" RETURNING {}", returning.join(", ")));
    }

    sql
}

fn render_update(statement: &UpdateStatement, params: &mut Vec<Value>) -> String {
    let mut sql = format!("UPDATE {} SET ", statement.entity);

    let updates: Vec<String> = statement
        .set
        .iter()
        .map(|(column, value)| format!("{} = {}", column, push_param(value.clone(), params)))
        .collect();
    sql.push_str(&updates.join(", "));

    if let Some(filter) = &statement.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&render_predicate(filter, params, None));
    }

    if let Some(returning) = &statement.returning {
        sql.push_str(&format!(" RETURNING {}", returning.join(", ")));
    }

    sql
}

fn render_delete(statement: &DeleteStatement, params: &mut Vec<Value>) -> String {
    let mut sql = format!("DELETE FROM {}", statement.entity);
    if let Some(filter) = &statement.filter {
        sql.push_str(" WHERE ");
        sql.push_str(&render_predicate(filter, params, None));
    }
    sql
}

fn render_item(item: &SelectItem, params: &mut Vec<Value>) -> String {
    let rendered = match &item.expr {
        ProjectionExpr::Scalar(expr) => {
            // A bare column projected under its own name needs no alias.
            if let ScalarExpr::Column(reference) = expr {
                if reference.column == item.alias {
                    return reference.to_string();
                }
            }
            render_scalar(expr, params)
        }
        ProjectionExpr::Aggregate(aggregate) => render_aggregate(aggregate, params),
    };
    format!("{} AS {}", rendered, item.alias)
}

fn render_scalar(expr: &ScalarExpr, params: &mut Vec<Value>) -> String {
    match expr {
        ScalarExpr::Column(reference) => reference.to_string(),
        ScalarExpr::Literal(value) => push_param(value.clone(), params),
        ScalarExpr::Lower(inner) => format!("LOWER({})", render_scalar(inner, params)),
        ScalarExpr::Upper(inner) => format!("UPPER({})", render_scalar(inner, params)),
        ScalarExpr::Coalesce(args) => {
            let rendered: Vec<String> = args.iter().map(|arg| render_scalar(arg, params)).collect();
            format!("COALESCE({})", rendered.join(", "))
        }
    }
}

fn render_aggregate(aggregate: &AggregateExpr, params: &mut Vec<Value>) -> String {
    match &aggregate.arg {
        Some(arg) => format!("{}({})", aggregate.func, render_scalar(arg, params)),
        None => format!("{}(*)", aggregate.func),
    }
}

fn render_predicate(
    predicate: &Predicate,
    params: &mut Vec<Value>,
    projection: Option<&[SelectItem]>,
) -> String {
    match predicate {
        Predicate::And(parts) => group_parts(parts, " AND ", params, projection),
        Predicate::Or(parts) => group_parts(parts, " OR ", params, projection),
        Predicate::Compare { left, op, values } => {
            let left_sql = render_predicate_operand(left, params, projection);
            match op {
                ComparisonOp::IsNull | ComparisonOp::IsNotNull => {
                    format!("{} {}", left_sql, op)
                }
                ComparisonOp::Between => format!(
                    "{} BETWEEN {} AND {}",
                    left_sql,
                    push_param(values[0].clone(), params),
                    push_param(values[1].clone(), params)
                ),
                ComparisonOp::In => {
                    // An empty IN list matches nothing.
                    if values.is_empty() {
                        return "FALSE".to_string();
                    }
                    let placeholders: Vec<String> = values
                        .iter()
                        .map(|value| push_param(value.clone(), params))
                        .collect();
                    format!("{} IN ({})", left_sql, placeholders.join(", "))
                }
                _ => format!(
                    "{} {} {}",
                    left_sql,
                    op,
                    push_param(values[0].clone(), params)
                ),
            }
        }
    }
}

fn group_parts(
    parts: &[Predicate],
    separator: &str,
    params: &mut Vec<Value>,
    projection: Option<&[SelectItem]>,
) -> String {
    let rendered: Vec<String> = parts
        .iter()
        .map(|part| render_predicate(part, params, projection))
        .collect();
    format!("({})", rendered.join(separator))
}

// Inside HAVING, a column reference that names an aggregate alias is
// expanded back to the aggregate expression.
fn render_predicate_operand(
    expr: &ScalarExpr,
    params: &mut Vec<Value>,
    projection: Option<&[SelectItem]>,
) -> String {
    if let (Some(items), ScalarExpr::Column(reference)) = (projection, expr) {
        if reference.entity.is_none() {
            if let Some(item) = items.iter().find(|item| item.alias == reference.column) {
                if let ProjectionExpr::Aggregate(aggregate) = &item.expr {
                    return render_aggregate(aggregate, params);
                }
            }
        }
    }
    render_scalar(expr, params)
}

fn push_param(value: Value, params: &mut Vec<Value>) -> String {
    params.push(value);
    format!("${}", params.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::expr::{col, count_all, lower, ColumnRef};
    use crate::query::predicate::{eq, gt, ne, or};
    use crate::query::statement::{JoinSpec, OnConflict};
    use crate::query::types::{JoinKind, OrderDirection};
    use serde_json::json;

    fn scalar_item(alias: &str, expr: ScalarExpr) -> SelectItem {
        SelectItem {
            alias: alias.to_string(),
            expr: ProjectionExpr::Scalar(expr),
        }
    }

    #[test]
    fn test_render_select_with_filter_and_paging() {
        let statement = Statement::Select(SelectStatement {
            entity: "users".to_string(),
            projection: vec![
                scalar_item("name", col("name")),
                scalar_item("lower_name", lower(col("name"))),
            ],
            joins: Vec::new(),
            filter: Some(eq("age", 18).and(ne("name", "derek"))),
            group_by: Vec::new(),
            having: None,
            order_by: vec![("age".to_string(), OrderDirection::Asc)],
            limit: Some(10),
            offset: Some(0),
        });

        let (sql, params) = render(&statement);
        assert_eq!(
            sql,
            "SELECT name, LOWER(name) AS lower_name FROM users \
             WHERE (age = $1 AND name != $2) ORDER BY age ASC LIMIT 10 OFFSET 0"
        );
        assert_eq!(params, vec![json!(18), json!("derek")]);
    }

    #[test]
    fn test_render_having_expands_aggregate_alias() {
        let statement = Statement::Select(SelectStatement {
            entity: "users".to_string(),
            projection: vec![
                scalar_item("age", col("age")),
                SelectItem {
                    alias: "count".to_string(),
                    expr: ProjectionExpr::Aggregate(count_all()),
                },
            ],
            joins: Vec::new(),
            filter: None,
            group_by: vec!["age".to_string()],
            having: Some(gt("count", 1)),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        });

        let (sql, params) = render(&statement);
        assert_eq!(
            sql,
            "SELECT age, COUNT(*) AS count FROM users GROUP BY age HAVING COUNT(*) > $1"
        );
        assert_eq!(params, vec![json!(1)]);
    }

    #[test]
    fn test_render_left_join() {
        let statement = Statement::Select(SelectStatement {
            entity: "users".to_string(),
            projection: vec![scalar_item("name", col("name"))],
            joins: vec![JoinSpec {
                kind: JoinKind::Left,
                entity: "user_preferences".to_string(),
                on_left: ColumnRef::qualified("users", "id"),
                on_right: ColumnRef::qualified("user_preferences", "user_id"),
            }],
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        });

        let (sql, _) = render(&statement);
        assert_eq!(
            sql,
            "SELECT name FROM users LEFT JOIN user_preferences \
             ON users.id = user_preferences.user_id"
        );
    }

    #[test]
    fn test_render_insert_with_conflict_policy() {
        let statement = Statement::Insert(InsertStatement {
            entity: "users".to_string(),
            columns: vec!["name".to_string(), "email".to_string()],
            rows: vec![vec![json!("derek"), json!("derek@test.com")]],
            on_conflict: Some(OnConflict {
                target: vec!["email".to_string()],
                constraint: "users_email_key".to_string(),
                set: vec![("name".to_string(), json!("updated"))],
            }),
            returning: Some(vec!["id".to_string()]),
        });

        let (sql, params) = render(&statement);
        assert_eq!(
            sql,
            "INSERT INTO users (name, email) VALUES ($1, $2) \
             ON CONFLICT (email) DO UPDATE SET name = $3 RETURNING id"
        );
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_render_delete_with_or_filter() {
        let statement = Statement::Delete(DeleteStatement {
            entity: "users".to_string(),
            filter: Some(or(vec![eq("name", "a"), eq("name", "b")])),
        });

        let (sql, params) = render(&statement);
        assert_eq!(sql, "DELETE FROM users WHERE (name = $1 OR name = $2)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_render_empty_in_list_matches_nothing() {
        let statement = Statement::Delete(DeleteStatement {
            entity: "users".to_string(),
            filter: Some(crate::query::predicate::is_in("id", Vec::<String>::new())),
        });

        let (sql, params) = render(&statement);
        assert_eq!(sql, "DELETE FROM users WHERE FALSE");
        assert!(params.is_empty());
    }
}
