//! Shared build-time validation of column references and predicates

use crate::error::{OrmError, OrmResult};
use crate::query::expr::{ColumnRef, ScalarExpr};
use crate::query::predicate::Predicate;
use crate::query::types::ComparisonOp;
use crate::schema::{EntityDef, SchemaRegistry};

/// The entities visible to a statement: the root plus any joined entities
pub(crate) struct Scope<'a> {
    root: &'a EntityDef,
    joined: Vec<&'a EntityDef>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(registry: &'a SchemaRegistry, root: &str) -> OrmResult<Self> {
        Ok(Self {
            root: registry.entity(root)?,
            joined: Vec::new(),
        })
    }

    pub(crate) fn join(&mut self, registry: &'a SchemaRegistry, entity: &str) -> OrmResult<()> {
        self.joined.push(registry.entity(entity)?);
        Ok(())
    }

    /// Unqualified references resolve against the root entity; qualified
    /// references must name the root or a joined entity.
    pub(crate) fn resolve_column(&self, reference: &ColumnRef) -> OrmResult<()> {
        let entity = match &reference.entity {
            None => self.root,
            Some(name) if *name == self.root.name => self.root,
            Some(name) => self
                .joined
                .iter()
                .find(|e| e.name == *name)
                .copied()
                .ok_or_else(|| {
                    OrmError::Query(format!("entity '{}' is not in scope for this query", name))
                })?,
        };
        if !entity.has_column(&reference.column) {
            return Err(OrmError::Query(format!(
                "unknown column '{}' on entity '{}'",
                reference.column, entity.name
            )));
        }
        Ok(())
    }

    pub(crate) fn validate_scalar(&self, expr: &ScalarExpr) -> OrmResult<()> {
        let mut refs = Vec::new();
        expr.referenced_columns(&mut refs);
        for reference in refs {
            self.resolve_column(reference)?;
        }
        Ok(())
    }

    pub(crate) fn validate_predicate(&self, predicate: &Predicate) -> OrmResult<()> {
        match predicate {
            Predicate::And(parts) | Predicate::Or(parts) => {
                for part in parts {
                    self.validate_predicate(part)?;
                }
                Ok(())
            }
            Predicate::Compare { left, op, values } => {
                self.validate_scalar(left)?;
                check_arity(*op, values.len())
            }
        }
    }
}

pub(crate) fn check_arity(op: ComparisonOp, provided: usize) -> OrmResult<()> {
    if let Some(expected) = op.arity() {
        if provided != expected {
            return Err(OrmError::Query(format!(
                "operator {} expects {} bound value(s), got {}",
                op, expected, provided
            )));
        }
    }
    Ok(())
}

/// Validate a predicate in a single-entity scope (mutations, nested fetch)
pub(crate) fn validate_entity_predicate(
    registry: &SchemaRegistry,
    entity: &str,
    predicate: &Predicate,
) -> OrmResult<()> {
    Scope::new(registry, entity)?.validate_predicate(predicate)
}
