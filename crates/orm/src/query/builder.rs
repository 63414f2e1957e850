//! Query builder and compilation

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::backends::{Backend, Row};
use crate::error::{OrmError, OrmResult};
use crate::query::expr::{
    AggregateExpr, ColumnRef, ProjectionExpr, ScalarExpr, SelectItem,
};
use crate::query::predicate::Predicate;
use crate::query::statement::{JoinSpec, SelectStatement, Statement};
use crate::query::types::{JoinKind, OrderDirection};
use crate::query::validate::Scope;
use crate::schema::SchemaRegistry;

/// Fluent builder for SELECT queries against a registry entity
///
/// Nothing is validated until [`QueryBuilder::compile`], which performs
/// every build-time check and produces a backend-ready statement.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    registry: Arc<SchemaRegistry>,
    entity: String,
    projection: Vec<SelectItem>,
    joins: Vec<JoinSpec>,
    filter: Option<Predicate>,
    group_by: Vec<String>,
    having: Option<Predicate>,
    order_by: Vec<(String, OrderDirection)>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl QueryBuilder {
    /// Start a query over an entity; an empty projection selects every
    /// column of the entity
    pub fn new(registry: Arc<SchemaRegistry>, entity: &str) -> Self {
        Self {
            registry,
            entity: entity.to_string(),
            projection: Vec::new(),
            joins: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Project a scalar expression under an alias
    pub fn select<E: Into<ScalarExpr>>(mut self, alias: &str, expr: E) -> Self {
        self.projection.push(SelectItem {
            alias: alias.to_string(),
            expr: ProjectionExpr::Scalar(expr.into()),
        });
        self
    }

    /// Project a raw column under its own name
    pub fn select_column(self, column: &str) -> Self {
        self.select(column, ScalarExpr::Column(ColumnRef::parse(column)))
    }

    /// Project several raw columns under their own names
    pub fn select_columns(mut self, columns: &[&str]) -> Self {
        for column in columns {
            self = self.select_column(column);
        }
        self
    }

    /// Project an aggregate under an alias
    pub fn select_aggregate(mut self, alias: &str, aggregate: AggregateExpr) -> Self {
        self.projection.push(SelectItem {
            alias: alias.to_string(),
            expr: ProjectionExpr::Aggregate(aggregate),
        });
        self
    }

    /// Add a filter predicate; multiple calls combine under AND
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Add an INNER JOIN on an equi-condition; column references may be
    /// written as `"entity.column"` or as bare root columns
    pub fn join(self, entity: &str, on_left: &str, on_right: &str) -> Self {
        self.push_join(JoinKind::Inner, entity, on_left, on_right)
    }

    /// Add a LEFT JOIN; left-side rows survive with null right-side
    /// columns when no match exists
    pub fn left_join(self, entity: &str, on_left: &str, on_right: &str) -> Self {
        self.push_join(JoinKind::Left, entity, on_left, on_right)
    }

    fn push_join(mut self, kind: JoinKind, entity: &str, on_left: &str, on_right: &str) -> Self {
        self.joins.push(JoinSpec {
            kind,
            entity: entity.to_string(),
            on_left: ColumnRef::parse(on_left),
            on_right: ColumnRef::parse(on_right),
        });
        self
    }

    /// Group by the given root-entity columns
    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by
            .extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Filter groups after aggregation; predicates reference projection
    /// aliases or grouped columns
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Order ascending by a projection alias or root column
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Order descending by a projection alias or root column
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by
            .push((column.to_string(), OrderDirection::Desc));
        self
    }

    /// Bound the result set; zero or negative is a build-time error
    pub fn limit(mut self, count: i64) -> Self {
        self.limit = Some(count);
        self
    }

    /// Skip leading rows; negative is a build-time error
    pub fn offset(mut self, count: i64) -> Self {
        self.offset = Some(count);
        self
    }

    /// Validate the whole descriptor and produce a compiled statement
    pub fn compile(&self) -> OrmResult<SelectStatement> {
        let mut scope = Scope::new(&self.registry, &self.entity)?;
        let root = self.registry.entity(&self.entity)?;

        for join in &self.joins {
            scope.join(&self.registry, &join.entity)?;
        }
        for join in &self.joins {
            scope.resolve_column(&join.on_left)?;
            scope.resolve_column(&join.on_right)?;
        }

        // An empty projection selects every root column.
        let projection: Vec<SelectItem> = if self.projection.is_empty() {
            root.columns
                .iter()
                .map(|column| SelectItem {
                    alias: column.name.clone(),
                    expr: ProjectionExpr::Scalar(ScalarExpr::Column(ColumnRef::unqualified(
                        &column.name,
                    ))),
                })
                .collect()
        } else {
            self.projection.clone()
        };

        let mut aliases = HashSet::new();
        for item in &projection {
            if !aliases.insert(item.alias.as_str()) {
                return Err(OrmError::Query(format!(
                    "duplicate projection alias '{}'",
                    item.alias
                )));
            }
            match &item.expr {
                ProjectionExpr::Scalar(expr) => scope.validate_scalar(expr)?,
                ProjectionExpr::Aggregate(aggregate) => {
                    if let Some(arg) = &aggregate.arg {
                        scope.validate_scalar(arg)?;
                    }
                }
            }
        }

        if let Some(filter) = &self.filter {
            scope.validate_predicate(filter)?;
        }

        for column in &self.group_by {
            if !root.has_column(column) {
                return Err(OrmError::Query(format!(
                    "group by references unknown column '{}' on '{}'",
                    column, root.name
                )));
            }
        }

        self.check_grouping(&projection, root.name.as_str())?;
        self.check_having(&projection)?;
        self.check_order_by(&projection, root.name.as_str())?;

        if let Some(limit) = self.limit {
            if limit <= 0 {
                return Err(OrmError::Query(format!(
                    "limit must be positive, got {}",
                    limit
                )));
            }
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err(OrmError::Query(format!(
                    "offset cannot be negative, got {}",
                    offset
                )));
            }
        }

        debug!(entity = %self.entity, joins = self.joins.len(), "compiled select");

        Ok(SelectStatement {
            entity: self.entity.clone(),
            projection,
            joins: self.joins.clone(),
            filter: self.filter.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
        })
    }

    // In a grouped query every scalar projection may only reference
    // grouped columns; aggregates without grouping collapse the whole
    // table, so scalar projections are rejected there too.
    fn check_grouping(&self, projection: &[SelectItem], root: &str) -> OrmResult<()> {
        let has_aggregate = projection.iter().any(|item| item.expr.is_aggregate());
        if self.group_by.is_empty() && !has_aggregate {
            return Ok(());
        }

        for item in projection {
            if let ProjectionExpr::Scalar(expr) = &item.expr {
                if self.group_by.is_empty() {
                    return Err(OrmError::Query(format!(
                        "projection '{}' mixes a raw attribute with aggregates and no group by",
                        item.alias
                    )));
                }
                let mut refs = Vec::new();
                expr.referenced_columns(&mut refs);
                for reference in refs {
                    let in_root_scope = reference
                        .entity
                        .as_deref()
                        .map_or(true, |entity| entity == root);
                    if !in_root_scope || !self.group_by.contains(&reference.column) {
                        return Err(OrmError::Query(format!(
                            "projection '{}' references non-grouped column '{}'",
                            item.alias, reference
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    // HAVING may only reference aggregate aliases and grouped columns;
    // anything else is a build-time error.
    fn check_having(&self, projection: &[SelectItem]) -> OrmResult<()> {
        let having = match &self.having {
            Some(having) => having,
            None => return Ok(()),
        };
        if self.group_by.is_empty() {
            return Err(OrmError::Query(
                "having requires a group by clause".to_string(),
            ));
        }
        self.check_having_predicate(having, projection)
    }

    fn check_having_predicate(
        &self,
        predicate: &Predicate,
        projection: &[SelectItem],
    ) -> OrmResult<()> {
        match predicate {
            Predicate::And(parts) | Predicate::Or(parts) => {
                for part in parts {
                    self.check_having_predicate(part, projection)?;
                }
                Ok(())
            }
            Predicate::Compare { left, op, values } => {
                crate::query::validate::check_arity(*op, values.len())?;
                let mut refs = Vec::new();
                left.referenced_columns(&mut refs);
                for reference in refs {
                    let is_aggregate_alias = reference.entity.is_none()
                        && projection
                            .iter()
                            .any(|item| item.alias == reference.column && item.expr.is_aggregate());
                    let is_grouped = reference.entity.is_none()
                        && self.group_by.contains(&reference.column);
                    if !is_aggregate_alias && !is_grouped {
                        return Err(OrmError::Query(format!(
                            "having references non-aggregated, non-grouped column '{}'",
                            reference
                        )));
                    }
                }
                Ok(())
            }
        }
    }

    fn check_order_by(&self, projection: &[SelectItem], root: &str) -> OrmResult<()> {
        let grouped = !self.group_by.is_empty()
            || projection.iter().any(|item| item.expr.is_aggregate());
        for (column, _) in &self.order_by {
            let is_alias = projection.iter().any(|item| item.alias == *column);
            if is_alias {
                continue;
            }
            if grouped {
                if self.group_by.contains(column) {
                    continue;
                }
                return Err(OrmError::Query(format!(
                    "order by '{}' must name a projection alias or grouped column",
                    column
                )));
            }
            let root_def = self.registry.entity(root)?;
            if !root_def.has_column(column) {
                return Err(OrmError::Query(format!(
                    "order by references unknown column '{}' on '{}'",
                    column, root
                )));
            }
        }
        Ok(())
    }

    /// Compile and execute, returning shaped rows
    pub async fn fetch_all(&self, backend: &dyn Backend) -> OrmResult<Vec<Row>> {
        let statement = Statement::Select(self.compile()?);
        let outcome = backend.run(&statement).await?;
        Ok(outcome.rows)
    }

    /// Compile and execute, returning the first row if any
    pub async fn fetch_optional(&self, backend: &dyn Backend) -> OrmResult<Option<Row>> {
        let statement = Statement::Select(self.clone().limit(1).compile()?);
        let outcome = backend.run(&statement).await?;
        Ok(outcome.rows.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::expr::{col, count_all, lower};
    use crate::query::predicate::{eq, gt};
    use crate::schema::{ColumnDef, ColumnType, EntityDef, SchemaBuilder};

    fn registry() -> Arc<SchemaRegistry> {
        SchemaBuilder::new()
            .entity(
                EntityDef::new("users")
                    .with_column(ColumnDef::new("id", ColumnType::Uuid).default_generated_uuid())
                    .with_column(ColumnDef::new("name", ColumnType::VarChar(255)))
                    .with_column(ColumnDef::new("age", ColumnType::Integer))
                    .with_primary_key(&["id"]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_empty_projection_defaults_to_all_columns() {
        let statement = QueryBuilder::new(registry(), "users").compile().unwrap();
        let aliases: Vec<&str> = statement
            .projection
            .iter()
            .map(|item| item.alias.as_str())
            .collect();
        assert_eq!(aliases, vec!["id", "name", "age"]);
    }

    #[test]
    fn test_unknown_column_is_a_build_error() {
        let err = QueryBuilder::new(registry(), "users")
            .select_column("email")
            .compile()
            .unwrap_err();
        assert!(matches!(err, OrmError::Query(_)));
    }

    #[test]
    fn test_limit_zero_is_a_build_error() {
        let err = QueryBuilder::new(registry(), "users")
            .limit(0)
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("limit"));
    }

    #[test]
    fn test_having_rejects_ungrouped_column() {
        let err = QueryBuilder::new(registry(), "users")
            .select_column("age")
            .select_aggregate("count", count_all())
            .group_by(&["age"])
            .having(gt("name", "a"))
            .compile()
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("non-aggregated, non-grouped column"));
    }

    #[test]
    fn test_having_accepts_aggregate_alias_and_grouped_column() {
        let statement = QueryBuilder::new(registry(), "users")
            .select_column("age")
            .select_aggregate("count", count_all())
            .group_by(&["age"])
            .having(gt("count", 1).and(gt("age", 0)))
            .compile();
        assert!(statement.is_ok());
    }

    #[test]
    fn test_grouped_query_rejects_ungrouped_scalar_projection() {
        let err = QueryBuilder::new(registry(), "users")
            .select_column("name")
            .select_aggregate("count", count_all())
            .group_by(&["age"])
            .compile()
            .unwrap_err();
        assert!(err.to_string().contains("non-grouped"));
    }

    #[test]
    fn test_computed_projection_compiles() {
        let statement = QueryBuilder::new(registry(), "users")
            .select_column("name")
            .select("lower_name", lower(col("name")))
            .filter(eq("age", 18))
            .compile()
            .unwrap();
        assert_eq!(statement.projection.len(), 2);
    }
}
