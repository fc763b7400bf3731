//! Assembly of a full SELECT statement from an Explore and a metric query.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use super::filter_tree::{compile_filter_group, FieldResolver};
use super::{CompileError, CompileResult, FieldKind};
use crate::model::explore::{CompiledTable, Dimension, Explore, ExploreJoin, JoinType, Metric};
use crate::model::filter::FilterGroup;
use crate::model::query::CompiledMetricQuery;
use crate::sql::dialect::SqlDialect;
use crate::sql::filter_rule::FilterRuleRenderer;
use crate::sql::token::{Token, TokenStream};

/// `${TABLE}` or `${table_name}` inside field and join SQL.
static TABLE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\s*([^}\s]+)\s*\}").unwrap());

const OWNER_TABLE: &str = "TABLE";

/// Result of compiling a metric query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    /// The generated SQL.
    pub query: String,
    /// Whether any selected metric is an auto-generated placeholder.
    pub has_example_metric: bool,
}

impl CompiledQuery {
    /// SHA-256 of the SQL, lowercase hex.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.query.as_bytes());
        format!("{:x}", digest)
    }
}

/// Build the SQL for `query` over `explore` in `dialect`.
///
/// The statement selects dimensions then metrics, each aliased by field id,
/// from the base table plus every joined table a compiled field references.
/// Dimension filters render in WHERE, metric filters in HAVING. Sorts must
/// reference selected fields.
pub fn build_query(
    explore: &Explore,
    query: &CompiledMetricQuery,
    dialect: &dyn SqlDialect,
) -> CompileResult<CompiledQuery> {
    let base = explore
        .base()
        .ok_or_else(|| CompileError::UnknownTableReference {
            table: explore.base_table.clone(),
            context: format!("explore '{}'", explore.name),
        })?;

    let dimension_ids = query.unique_dimensions();
    let metric_ids = query.unique_metrics();
    if dimension_ids.is_empty() && metric_ids.is_empty() {
        return Err(CompileError::EmptyQuery);
    }

    let mut sql = SqlTemplates {
        explore,
        dialect,
        referenced: BTreeSet::new(),
    };

    let dimensions = dimension_ids
        .iter()
        .map(|id| find_dimension(explore, id))
        .collect::<CompileResult<Vec<_>>>()?;
    let metrics = metric_ids
        .iter()
        .map(|id| find_metric(explore, query, id))
        .collect::<CompileResult<Vec<_>>>()?;
    let has_example_metric = metrics.iter().any(|m| m.is_auto_generated);

    let mut selects = Vec::with_capacity(dimensions.len() + metrics.len());
    for dimension in &dimensions {
        selects.push((sql.dimension(dimension)?, dimension.field_id()));
    }
    for metric in &metrics {
        selects.push((sql.metric(metric)?, metric.field_id()));
    }

    let renderer = FilterRuleRenderer::new(dialect, query.reference_time);
    let dimension_fields = dimension_filter_fields(query.filters.dimensions.as_ref(), &mut sql)?;
    let where_sql = compile_filter_group(
        query.filters.dimensions.as_ref(),
        &dimension_fields,
        &renderer,
    )?;
    let metric_fields = metric_filter_fields(query.filters.metrics.as_ref(), query, &mut sql)?;
    let having_sql =
        compile_filter_group(query.filters.metrics.as_ref(), &metric_fields, &renderer)?;

    let selected: Vec<&str> = dimension_ids.iter().chain(metric_ids.iter()).copied().collect();
    for sort in &query.sorts {
        if !selected.contains(&sort.field_id.as_str()) {
            return Err(CompileError::unknown_field(
                FieldKind::SelectedField,
                &sort.field_id,
            ));
        }
    }

    let joins = sql.required_joins()?;

    let mut ts = TokenStream::new();
    ts.push(Token::Select).newline();
    for (i, (expr, alias)) in selects.into_iter().enumerate() {
        if i > 0 {
            ts.comma().newline();
        }
        ts.indent(1)
            .push(Token::Raw(expr))
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident(alias));
    }

    ts.newline()
        .push(Token::From)
        .space()
        .push(table_ident(base))
        .space()
        .push(Token::As)
        .space()
        .push(Token::Ident(base.name.clone()));

    for (join, on_sql) in joins {
        let table = explore
            .tables
            .get(&join.table)
            .ok_or_else(|| unknown_table(&join.table, "explore joins"))?;
        ts.newline()
            .extend(join_keywords(join.join_type))
            .space()
            .push(table_ident(table))
            .space()
            .push(Token::As)
            .space()
            .push(Token::Ident(table.name.clone()))
            .newline()
            .indent(1)
            .push(Token::On)
            .space()
            .push(Token::Raw(on_sql));
    }

    if let Some(predicate) = where_sql {
        ts.newline()
            .push(Token::Where)
            .space()
            .push(Token::Raw(predicate));
    }

    if !dimensions.is_empty() && !metrics.is_empty() {
        let positions = (1..=dimensions.len()).map(|i| TokenStream::from(Token::LitInt(i as i64)));
        ts.newline()
            .push(Token::GroupBy)
            .space()
            .join(positions, Token::Comma);
    }

    if let Some(predicate) = having_sql {
        ts.newline()
            .push(Token::Having)
            .space()
            .push(Token::Raw(predicate));
    }

    if !query.sorts.is_empty() {
        let orderings = query.sorts.iter().map(|sort| {
            let mut item = TokenStream::from(Token::Ident(sort.field_id.clone()));
            if sort.descending {
                item.space().push(Token::Desc);
            }
            item
        });
        ts.newline()
            .push(Token::OrderBy)
            .space()
            .join(orderings, Token::Comma);
    }

    ts.newline().append(&dialect.emit_limit(query.limit));

    Ok(CompiledQuery {
        query: ts.serialize(dialect),
        has_example_metric,
    })
}

fn find_dimension<'a>(explore: &'a Explore, id: &str) -> CompileResult<&'a Dimension> {
    explore
        .find_dimension(id)
        .ok_or_else(|| CompileError::unknown_field(FieldKind::Dimension, id))
}

fn find_metric<'a>(
    explore: &'a Explore,
    query: &'a CompiledMetricQuery,
    id: &str,
) -> CompileResult<&'a Metric> {
    explore
        .find_metric(id)
        .or_else(|| {
            query
                .compiled_additional_metrics
                .iter()
                .find(|m| m.field_id() == id)
        })
        .ok_or_else(|| CompileError::unknown_field(FieldKind::Metric, id))
}

fn dimension_filter_fields(
    group: Option<&FilterGroup>,
    sql: &mut SqlTemplates<'_>,
) -> CompileResult<FieldResolver> {
    let mut fields = FieldResolver::new(FieldKind::Dimension);
    for rule in group.map(|g| g.rules()).unwrap_or_default() {
        let dimension = find_dimension(sql.explore, rule.field_id())?;
        fields.insert(
            rule.field_id(),
            sql.dimension(dimension)?,
            dimension.dimension_type,
        );
    }
    Ok(fields)
}

fn metric_filter_fields(
    group: Option<&FilterGroup>,
    query: &CompiledMetricQuery,
    sql: &mut SqlTemplates<'_>,
) -> CompileResult<FieldResolver> {
    let mut fields = FieldResolver::new(FieldKind::Metric);
    for rule in group.map(|g| g.rules()).unwrap_or_default() {
        let metric = find_metric(sql.explore, query, rule.field_id())?;
        fields.insert(
            rule.field_id(),
            sql.metric(metric)?,
            metric.metric_type.value_type(),
        );
    }
    Ok(fields)
}

fn table_ident(table: &CompiledTable) -> Token {
    Token::QualifiedIdent {
        database: table.database.clone(),
        schema: table.schema.clone(),
        name: table.sql_table.clone(),
    }
}

fn join_keywords(join_type: JoinType) -> Vec<Token> {
    let kind = match join_type {
        JoinType::Left => vec![Token::Left, Token::Space, Token::Outer],
        JoinType::Right => vec![Token::Right, Token::Space, Token::Outer],
        JoinType::Full => vec![Token::Full, Token::Space, Token::Outer],
        JoinType::Inner => vec![Token::Inner],
    };
    kind.into_iter()
        .chain([Token::Space, Token::Join])
        .collect()
}

fn unknown_table(table: &str, context: &str) -> CompileError {
    CompileError::UnknownTableReference {
        table: table.to_string(),
        context: context.to_string(),
    }
}

/// Compiles field and join SQL, tracking which tables it references.
struct SqlTemplates<'a> {
    explore: &'a Explore,
    dialect: &'a dyn SqlDialect,
    referenced: BTreeSet<String>,
}

impl<'a> SqlTemplates<'a> {
    fn dimension(&mut self, dimension: &Dimension) -> CompileResult<String> {
        let context = format!("dimension {}", dimension.field_id());
        self.compile(&dimension.sql, &dimension.table, &context)
    }

    fn metric(&mut self, metric: &Metric) -> CompileResult<String> {
        let context = format!("metric {}", metric.field_id());
        let column = self.compile(&metric.sql, &metric.table, &context)?;
        Ok(self.dialect.metric_sql(&column, metric))
    }

    /// Replace table placeholders with quoted aliases.
    fn compile(&mut self, template: &str, owner: &str, context: &str) -> CompileResult<String> {
        self.referenced.insert(owner.to_string());
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in TABLE_REFERENCE.captures_iter(template) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let table = if name.as_str() == OWNER_TABLE {
                owner
            } else {
                name.as_str()
            };
            if !self.explore.tables.contains_key(table) {
                return Err(unknown_table(table, context));
            }
            self.referenced.insert(table.to_string());
            out.push_str(&template[last..whole.start()]);
            out.push_str(&self.dialect.quote_identifier(table));
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }

    /// Joins needed by the referenced tables, in declaration order, with
    /// their compiled conditions. Tables named in a needed join's condition
    /// are needed too.
    fn required_joins(&mut self) -> CompileResult<Vec<(&'a ExploreJoin, String)>> {
        let explore = self.explore;
        let mut needed: BTreeSet<String> = BTreeSet::new();
        loop {
            let pending: Vec<String> = self
                .referenced
                .iter()
                .filter(|t| **t != explore.base_table && !needed.contains(*t))
                .cloned()
                .collect();
            if pending.is_empty() {
                break;
            }
            for table in pending {
                let join = explore
                    .joined_tables
                    .iter()
                    .find(|j| j.table == table)
                    .ok_or_else(|| unknown_table(&table, "explore joins"))?;
                self.compile(&join.sql_on, &join.table, &format!("join {}", join.table))?;
                needed.insert(table);
            }
        }

        let mut joins = Vec::with_capacity(needed.len());
        for join in &explore.joined_tables {
            if needed.contains(&join.table) {
                let on_sql = self.compile(&join.sql_on, &join.table, &format!("join {}", join.table))?;
                joins.push((join, on_sql));
            }
        }
        Ok(joins)
    }
}
