//! Relation metadata types

use serde::{Deserialize, Serialize};

/// Cardinality of a relation as seen from its source entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    /// One related row on the target side; the target holds the foreign key
    HasOne,
    /// Many related rows on the target side; the target holds the foreign key
    HasMany,
    /// The source holds the foreign key to the target's primary key
    BelongsTo,
}

impl RelationKind {
    /// Returns true if this relation resolves to a sequence of rows
    pub fn is_collection(self) -> bool {
        matches!(self, Self::HasMany)
    }
}

/// Equi-join condition between a relation's source and target entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinCondition {
    /// Column on the source entity
    pub local_column: String,
    /// Column on the target entity
    pub foreign_column: String,
}

/// A named, directed relation between two registered entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDef {
    /// Relation name, unique per source entity
    pub name: String,
    /// Source entity name
    pub source: String,
    /// Target entity name
    pub target: String,
    /// Cardinality as seen from the source
    pub kind: RelationKind,
    /// Join condition (foreign key = primary key)
    pub join: JoinCondition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind_collection() {
        assert!(RelationKind::HasMany.is_collection());
        assert!(!RelationKind::HasOne.is_collection());
        assert!(!RelationKind::BelongsTo.is_collection());
    }
}
