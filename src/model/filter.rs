//! Filter trees: rules nested inside AND/OR groups.

use serde::{Deserialize, Serialize};

use super::explore::FieldId;

/// Comparison applied by a filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    IsNull,
    NotNull,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    Include,
    DoesNotInclude,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    InThePast,
    NotInThePast,
    InTheNext,
    InTheCurrent,
    InBetween,
}

impl FilterOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::IsNull => "isNull",
            FilterOperator::NotNull => "notNull",
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "notEquals",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
            FilterOperator::Include => "include",
            FilterOperator::DoesNotInclude => "doesNotInclude",
            FilterOperator::LessThan => "lessThan",
            FilterOperator::LessThanOrEqual => "lessThanOrEqual",
            FilterOperator::GreaterThan => "greaterThan",
            FilterOperator::GreaterThanOrEqual => "greaterThanOrEqual",
            FilterOperator::InThePast => "inThePast",
            FilterOperator::NotInThePast => "notInThePast",
            FilterOperator::InTheNext => "inTheNext",
            FilterOperator::InTheCurrent => "inTheCurrent",
            FilterOperator::InBetween => "inBetween",
        }
    }

    /// Operators whose window is computed relative to the query's reference time.
    pub fn is_relative(&self) -> bool {
        matches!(
            self,
            FilterOperator::InThePast
                | FilterOperator::NotInThePast
                | FilterOperator::InTheNext
                | FilterOperator::InTheCurrent
        )
    }
}

/// Unit used by relative date operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfTime {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    #[default]
    Days,
    Weeks,
    Months,
    Quarters,
    Years,
}

/// Extra settings for relative date operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateFilterSettings {
    #[serde(default)]
    pub unit_of_time: UnitOfTime,
    /// Only count fully elapsed units.
    #[serde(default)]
    pub completed: bool,
}

/// Field a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterTarget {
    pub field_id: FieldId,
}

/// Leaf predicate of a filter tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    #[serde(default)]
    pub id: String,
    pub target: FilterTarget,
    pub operator: FilterOperator,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
    #[serde(default)]
    pub settings: Option<DateFilterSettings>,
    /// Disabled rules render no predicate.
    #[serde(default)]
    pub disabled: bool,
}

impl FilterRule {
    pub fn new(
        field_id: impl Into<FieldId>,
        operator: FilterOperator,
        values: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            id: String::new(),
            target: FilterTarget {
                field_id: field_id.into(),
            },
            operator,
            values,
            settings: None,
            disabled: false,
        }
    }

    pub fn with_settings(mut self, settings: DateFilterSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn field_id(&self) -> &str {
        &self.target.field_id
    }
}

/// Child of a filter group: a nested group or a rule.
///
/// Groups are tried first; an object carrying `and`/`or` is a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterGroupItem {
    Group(FilterGroup),
    Rule(FilterRule),
}

impl From<FilterRule> for FilterGroupItem {
    fn from(rule: FilterRule) -> Self {
        FilterGroupItem::Rule(rule)
    }
}

impl From<FilterGroup> for FilterGroupItem {
    fn from(group: FilterGroup) -> Self {
        FilterGroupItem::Group(group)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndFilterGroup {
    #[serde(default)]
    pub id: String,
    pub and: Vec<FilterGroupItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrFilterGroup {
    #[serde(default)]
    pub id: String,
    pub or: Vec<FilterGroupItem>,
}

/// Boolean group of filter items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterGroup {
    And(AndFilterGroup),
    Or(OrFilterGroup),
}

impl FilterGroup {
    pub fn and(items: Vec<FilterGroupItem>) -> Self {
        FilterGroup::And(AndFilterGroup {
            id: String::new(),
            and: items,
        })
    }

    pub fn or(items: Vec<FilterGroupItem>) -> Self {
        FilterGroup::Or(OrFilterGroup {
            id: String::new(),
            or: items,
        })
    }

    pub fn items(&self) -> &[FilterGroupItem] {
        match self {
            FilterGroup::And(g) => &g.and,
            FilterGroup::Or(g) => &g.or,
        }
    }

    pub fn is_and(&self) -> bool {
        matches!(self, FilterGroup::And(_))
    }

    /// Every rule in the tree, depth first.
    pub fn rules(&self) -> Vec<&FilterRule> {
        let mut out = Vec::new();
        collect_rules(self, &mut out);
        out
    }
}

fn collect_rules<'a>(group: &'a FilterGroup, out: &mut Vec<&'a FilterRule>) {
    for item in group.items() {
        match item {
            FilterGroupItem::Group(g) => collect_rules(g, out),
            FilterGroupItem::Rule(r) => out.push(r),
        }
    }
}
