//! Filter tree compilation.
//!
//! A filter group renders as its children's predicates joined by the group's
//! keyword and wrapped in one pair of parentheses. Children that render to
//! nothing are dropped, and a group left with no children renders to nothing.

use std::collections::BTreeMap;

use super::{CompileError, CompileResult, FieldKind};
use crate::model::explore::FieldId;
use crate::model::filter::{FilterGroup, FilterGroupItem};
use crate::model::types::DimensionType;
use crate::sql::filter_rule::FilterRuleRenderer;

/// SQL and canonical type of a field a rule can target.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub sql: String,
    pub field_type: DimensionType,
}

/// The fields a filter tree may reference.
#[derive(Debug, Clone)]
pub struct FieldResolver {
    kind: FieldKind,
    fields: BTreeMap<FieldId, ResolvedField>,
}

impl FieldResolver {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, field_id: impl Into<FieldId>, sql: String, field_type: DimensionType) {
        self.fields
            .insert(field_id.into(), ResolvedField { sql, field_type });
    }

    pub fn with(mut self, field_id: impl Into<FieldId>, sql: &str, field_type: DimensionType) -> Self {
        self.insert(field_id, sql.to_string(), field_type);
        self
    }

    pub fn resolve(&self, field_id: &str) -> CompileResult<&ResolvedField> {
        self.fields
            .get(field_id)
            .ok_or_else(|| CompileError::unknown_field(self.kind, field_id))
    }
}

/// Compile an optional filter group into a parenthesized predicate.
///
/// Returns `None` for an absent group, an empty group, or a group whose
/// children all render to nothing.
pub fn compile_filter_group(
    group: Option<&FilterGroup>,
    fields: &FieldResolver,
    renderer: &FilterRuleRenderer<'_>,
) -> CompileResult<Option<String>> {
    match group {
        Some(group) => compile_group(group, fields, renderer),
        None => Ok(None),
    }
}

fn compile_group(
    group: &FilterGroup,
    fields: &FieldResolver,
    renderer: &FilterRuleRenderer<'_>,
) -> CompileResult<Option<String>> {
    let mut parts = Vec::with_capacity(group.items().len());
    for item in group.items() {
        let sql = match item {
            FilterGroupItem::Group(nested) => compile_group(nested, fields, renderer)?,
            FilterGroupItem::Rule(rule) => {
                let field = fields.resolve(rule.field_id())?;
                renderer.render(rule, &field.sql, field.field_type)?
            }
        };
        if let Some(sql) = sql {
            parts.push(sql);
        }
    }

    if parts.is_empty() {
        return Ok(None);
    }
    let keyword = if group.is_and() { " AND " } else { " OR " };
    Ok(Some(format!("({})", parts.join(keyword))))
}
