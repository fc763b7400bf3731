//! Rendering of single filter rules into predicates.
//!
//! Each canonical type has its own operator table. Field SQL is always
//! parenthesized; values are rendered as dialect-quoted literals, never raw.
//! Relative date operators resolve against the query's reference time, so the
//! same rule always renders the same predicate.

use chrono::{
    DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc,
};
use serde_json::Value;

use super::dialect::SqlDialect;
use super::token::{Token, TokenStream};
use crate::compile::{CompileError, CompileResult};
use crate::model::filter::{FilterOperator, FilterRule, UnitOfTime};
use crate::model::types::{DimensionType, WeekDay};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders filter rules for one dialect and one query.
#[derive(Debug, Clone, Copy)]
pub struct FilterRuleRenderer<'a> {
    dialect: &'a dyn SqlDialect,
    reference_time: Option<DateTime<Utc>>,
}

impl<'a> FilterRuleRenderer<'a> {
    pub fn new(dialect: &'a dyn SqlDialect, reference_time: Option<DateTime<Utc>>) -> Self {
        Self {
            dialect,
            reference_time,
        }
    }

    /// Render `rule` against a field's SQL and canonical type.
    ///
    /// Disabled rules render to `None`.
    pub fn render(
        &self,
        rule: &FilterRule,
        field_sql: &str,
        field_type: DimensionType,
    ) -> CompileResult<Option<String>> {
        if rule.disabled {
            return Ok(None);
        }

        let predicate = match rule.operator {
            FilterOperator::IsNull => null_check(field_sql, Token::IsNull),
            FilterOperator::NotNull => null_check(field_sql, Token::IsNotNull),
            _ => match field_type {
                DimensionType::String => self.render_string(rule, field_sql)?,
                DimensionType::Number => self.render_number(rule, field_sql)?,
                DimensionType::Date | DimensionType::Timestamp => {
                    self.render_date(rule, field_sql, field_type)?
                }
                DimensionType::Boolean => self.render_boolean(rule, field_sql)?,
            },
        };
        Ok(Some(predicate.serialize(self.dialect)))
    }

    fn render_string(&self, rule: &FilterRule, sql: &str) -> CompileResult<TokenStream> {
        let values = rule
            .values
            .iter()
            .map(|v| string_value(rule, v))
            .collect::<CompileResult<Vec<_>>>()?;

        if values.is_empty() {
            return match rule.operator {
                FilterOperator::Equals
                | FilterOperator::NotEquals
                | FilterOperator::Include
                | FilterOperator::DoesNotInclude => Ok(Token::LitBool(true).into()),
                FilterOperator::StartsWith | FilterOperator::EndsWith => {
                    Err(invalid(rule, "expected at least one value"))
                }
                _ => Err(unsupported(rule, DimensionType::String)),
            };
        }

        let patterns = |shape: fn(&str) -> String| -> Vec<Token> {
            values.iter().map(|v| string_literal(&shape(v))).collect()
        };
        let literals = || -> Vec<Token> { values.iter().map(|v| string_literal(v)).collect() };
        match rule.operator {
            FilterOperator::Equals => Ok(equals(sql, literals())),
            FilterOperator::NotEquals => Ok(not_equals(sql, literals())),
            FilterOperator::Include => Ok(any_of(
                patterns(|v| format!("%{}%", v))
                    .into_iter()
                    .map(|p| contains(sql, p, false))
                    .collect(),
                Token::Or,
            )),
            FilterOperator::DoesNotInclude => Ok(any_of(
                patterns(|v| format!("%{}%", v))
                    .into_iter()
                    .map(|p| contains(sql, p, true))
                    .collect(),
                Token::And,
            )),
            FilterOperator::StartsWith => Ok(any_of(
                patterns(|v| format!("{}%", v))
                    .into_iter()
                    .map(|p| compare(sql, Token::Like, p.into()))
                    .collect(),
                Token::Or,
            )),
            FilterOperator::EndsWith => Ok(any_of(
                patterns(|v| format!("%{}", v))
                    .into_iter()
                    .map(|p| compare(sql, Token::Like, p.into()))
                    .collect(),
                Token::Or,
            )),
            _ => Err(unsupported(rule, DimensionType::String)),
        }
    }

    fn render_number(&self, rule: &FilterRule, sql: &str) -> CompileResult<TokenStream> {
        let literals = rule
            .values
            .iter()
            .map(|v| number_literal(rule, v))
            .collect::<CompileResult<Vec<_>>>()?;

        match rule.operator {
            FilterOperator::Equals | FilterOperator::NotEquals if literals.is_empty() => {
                Ok(Token::LitBool(true).into())
            }
            FilterOperator::Equals => Ok(equals(sql, literals)),
            FilterOperator::NotEquals => Ok(not_equals(sql, literals)),
            FilterOperator::LessThan
            | FilterOperator::LessThanOrEqual
            | FilterOperator::GreaterThan
            | FilterOperator::GreaterThanOrEqual => {
                let value = literals
                    .into_iter()
                    .next()
                    .ok_or_else(|| invalid(rule, "expected a value"))?;
                Ok(compare(sql, comparison(rule.operator), grouped(value)))
            }
            FilterOperator::InBetween => {
                let (low, high) = between(rule, literals)?;
                Ok(window(sql, grouped(low), Token::Lte, grouped(high)))
            }
            _ => Err(unsupported(rule, DimensionType::Number)),
        }
    }

    fn render_date(
        &self,
        rule: &FilterRule,
        sql: &str,
        field_type: DimensionType,
    ) -> CompileResult<TokenStream> {
        if rule.operator.is_relative() {
            return self.render_relative(rule, sql, field_type);
        }

        let literals = rule
            .values
            .iter()
            .map(|v| date_value(rule, v).map(|t| date_literal(t, field_type)))
            .collect::<CompileResult<Vec<_>>>()?;

        match rule.operator {
            FilterOperator::Equals
            | FilterOperator::NotEquals
            | FilterOperator::LessThan
            | FilterOperator::LessThanOrEqual
            | FilterOperator::GreaterThan
            | FilterOperator::GreaterThanOrEqual => {
                let value = literals
                    .into_iter()
                    .next()
                    .ok_or_else(|| invalid(rule, "expected a date"))?;
                let predicate = compare(sql, comparison(rule.operator), value.into());
                if rule.operator == FilterOperator::NotEquals {
                    Ok(or_null(predicate, sql))
                } else {
                    Ok(predicate)
                }
            }
            FilterOperator::InBetween => {
                let (low, high) = between(rule, literals)?;
                Ok(window(sql, low.into(), Token::Lte, high.into()))
            }
            _ => Err(unsupported(rule, field_type)),
        }
    }

    fn render_relative(
        &self,
        rule: &FilterRule,
        sql: &str,
        field_type: DimensionType,
    ) -> CompileResult<TokenStream> {
        let now = self
            .reference_time
            .ok_or_else(|| CompileError::MissingReferenceTime {
                field_id: rule.field_id().to_string(),
                operator: rule.operator.as_str(),
            })?
            .naive_utc();
        let settings = rule.settings.unwrap_or_default();
        let unit = settings.unit_of_time;
        let week_start = self.dialect.effective_start_of_week();
        let lit = |t: NaiveDateTime| TokenStream::from(date_literal(t, field_type));
        let truncated = || {
            start_of(now, unit, week_start).ok_or_else(|| invalid(rule, "date out of range"))
        };

        match rule.operator {
            FilterOperator::InTheCurrent => {
                let from = truncated()?;
                let until = shift(rule, from, unit, 1)?;
                Ok(window(sql, lit(from), Token::Lt, lit(until)))
            }
            FilterOperator::InThePast | FilterOperator::NotInThePast => {
                let amount = amount(rule)?;
                let (from, until, upper) = if settings.completed {
                    let until = truncated()?;
                    (shift(rule, until, unit, -amount)?, until, Token::Lt)
                } else {
                    (shift(rule, now, unit, -amount)?, now, Token::Lte)
                };
                if rule.operator == FilterOperator::NotInThePast {
                    return Ok(or_null(compare(sql, Token::Lt, lit(from)), sql));
                }
                Ok(window(sql, lit(from), upper, lit(until)))
            }
            FilterOperator::InTheNext => {
                let amount = amount(rule)?;
                if settings.completed {
                    let from = shift(rule, truncated()?, unit, 1)?;
                    let until = shift(rule, from, unit, amount)?;
                    Ok(window(sql, lit(from), Token::Lt, lit(until)))
                } else {
                    let until = shift(rule, now, unit, amount)?;
                    Ok(window(sql, lit(now), Token::Lte, lit(until)))
                }
            }
            _ => Err(unsupported(rule, field_type)),
        }
    }

    fn render_boolean(&self, rule: &FilterRule, sql: &str) -> CompileResult<TokenStream> {
        let value = match rule.values.first() {
            Some(v) => bool_value(rule, v)?,
            None => return Err(invalid(rule, "expected a boolean")),
        };
        let literal = TokenStream::from(Token::LitBool(value));
        match rule.operator {
            FilterOperator::Equals => Ok(compare(sql, Token::Eq, literal)),
            FilterOperator::NotEquals => Ok(or_null(compare(sql, Token::Ne, literal), sql)),
            _ => Err(unsupported(rule, DimensionType::Boolean)),
        }
    }
}

// ============================================================================
// Literals
// ============================================================================

fn string_literal(value: &str) -> Token {
    Token::LitString(value.to_string())
}

fn number_literal(rule: &FilterRule, value: &Value) -> CompileResult<Token> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Token::LitInt(i)),
            None => Ok(Token::LitFloat(finite(rule, n.as_f64())?)),
        },
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(i) => Ok(Token::LitInt(i)),
            Err(_) => Ok(Token::LitFloat(finite(rule, s.trim().parse::<f64>().ok())?)),
        },
        other => Err(invalid(rule, &format!("expected a number, got {}", other))),
    }
}

fn date_literal(value: NaiveDateTime, field_type: DimensionType) -> Token {
    let format = match field_type {
        DimensionType::Date => DATE_FORMAT,
        _ => TIMESTAMP_FORMAT,
    };
    string_literal(&value.format(format).to_string())
}

// ============================================================================
// Predicate shapes
// ============================================================================

/// `(field)`
fn field(sql: &str) -> TokenStream {
    grouped(Token::Raw(sql.to_string()))
}

fn grouped(token: Token) -> TokenStream {
    wrap(token.into())
}

fn wrap(inner: TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.lparen().append(&inner).rparen();
    ts
}

/// `(field) <op> value`
fn compare(sql: &str, op: Token, value: TokenStream) -> TokenStream {
    let mut ts = field(sql);
    ts.space().push(op).space().append(&value);
    ts
}

fn null_check(sql: &str, check: Token) -> TokenStream {
    let mut ts = field(sql);
    ts.space().push(check);
    ts
}

/// `(predicate OR (field) IS NULL)`
fn or_null(predicate: TokenStream, sql: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.join([predicate, null_check(sql, Token::IsNull)], Token::Or);
    wrap(ts)
}

/// `((field) >= low AND (field) <upper> high)`
fn window(sql: &str, low: TokenStream, upper: Token, high: TokenStream) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.join(
        [compare(sql, Token::Gte, low), compare(sql, upper, high)],
        Token::And,
    );
    wrap(ts)
}

fn equals(sql: &str, literals: Vec<Token>) -> TokenStream {
    match <[Token; 1]>::try_from(literals) {
        Ok([single]) => compare(sql, Token::Eq, single.into()),
        Err(literals) => in_list(sql, literals, false),
    }
}

fn not_equals(sql: &str, literals: Vec<Token>) -> TokenStream {
    let predicate = match <[Token; 1]>::try_from(literals) {
        Ok([single]) => compare(sql, Token::Ne, single.into()),
        Err(literals) => in_list(sql, literals, true),
    };
    or_null(predicate, sql)
}

/// `(field) [NOT] IN (a, b, ...)`
fn in_list(sql: &str, literals: Vec<Token>, negated: bool) -> TokenStream {
    let mut list = TokenStream::new();
    list.join(literals.into_iter().map(TokenStream::from), Token::Comma);

    let mut ts = field(sql);
    ts.space();
    if negated {
        ts.push(Token::Not).space();
    }
    ts.push(Token::In).space().append(&wrap(list));
    ts
}

/// `LOWER(field) [NOT] LIKE LOWER(pattern)`
fn contains(sql: &str, pattern: Token, negated: bool) -> TokenStream {
    let lower = |inner: Token| {
        let mut ts = TokenStream::from(Token::FunctionName("lower".into()));
        ts.append(&grouped(inner));
        ts
    };

    let mut ts = lower(Token::Raw(sql.to_string()));
    ts.space();
    if negated {
        ts.push(Token::Not).space();
    }
    ts.push(Token::Like).space().append(&lower(pattern));
    ts
}

fn any_of(mut parts: Vec<TokenStream>, keyword: Token) -> TokenStream {
    if parts.len() == 1 {
        return parts.remove(0);
    }
    let mut ts = TokenStream::new();
    ts.join(parts, keyword);
    wrap(ts)
}

fn comparison(operator: FilterOperator) -> Token {
    match operator {
        FilterOperator::LessThan => Token::Lt,
        FilterOperator::LessThanOrEqual => Token::Lte,
        FilterOperator::GreaterThan => Token::Gt,
        FilterOperator::GreaterThanOrEqual => Token::Gte,
        FilterOperator::NotEquals => Token::Ne,
        _ => Token::Eq,
    }
}

fn between(rule: &FilterRule, literals: Vec<Token>) -> CompileResult<(Token, Token)> {
    match <[Token; 2]>::try_from(literals) {
        Ok([low, high]) => Ok((low, high)),
        Err(_) => Err(invalid(rule, "expected exactly two values")),
    }
}

// ============================================================================
// Values
// ============================================================================

fn unsupported(rule: &FilterRule, field_type: DimensionType) -> CompileError {
    CompileError::UnsupportedOperator {
        field_id: rule.field_id().to_string(),
        operator: rule.operator.as_str(),
        field_type,
    }
}

fn invalid(rule: &FilterRule, message: &str) -> CompileError {
    CompileError::InvalidFilterValue {
        field_id: rule.field_id().to_string(),
        message: message.to_string(),
    }
}

fn finite(rule: &FilterRule, value: Option<f64>) -> CompileResult<f64> {
    match value {
        Some(f) if f.is_finite() => Ok(f),
        _ => Err(invalid(rule, "expected a finite number")),
    }
}

fn string_value(rule: &FilterRule, value: &Value) -> CompileResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(invalid(rule, &format!("expected a string, got {}", other))),
    }
}

fn bool_value(rule: &FilterRule, value: &Value) -> CompileResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(invalid(rule, &format!("expected a boolean, got {}", other))),
    }
}

fn date_value(rule: &FilterRule, value: &Value) -> CompileResult<NaiveDateTime> {
    let text = match value {
        Value::String(s) => s.trim(),
        other => return Err(invalid(rule, &format!("expected a date, got {}", other))),
    };
    parse_datetime(text).ok_or_else(|| invalid(rule, &format!("unrecognised date '{}'", text)))
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS[+HH[:MM]]` or `YYYY-MM-DD`.
///
/// Values with an offset are converted to UTC.
pub(crate) fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_utc());
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

fn amount(rule: &FilterRule) -> CompileResult<i64> {
    let n = match rule.values.first() {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match n {
        Some(n) if n >= 0 => Ok(n),
        _ => Err(invalid(rule, "expected a non-negative whole number")),
    }
}

// ============================================================================
// Calendar arithmetic
// ============================================================================

fn shift(
    rule: &FilterRule,
    at: NaiveDateTime,
    unit: UnitOfTime,
    amount: i64,
) -> CompileResult<NaiveDateTime> {
    let delta = match unit {
        UnitOfTime::Milliseconds => TimeDelta::try_milliseconds(amount),
        UnitOfTime::Seconds => TimeDelta::try_seconds(amount),
        UnitOfTime::Minutes => TimeDelta::try_minutes(amount),
        UnitOfTime::Hours => TimeDelta::try_hours(amount),
        UnitOfTime::Days => TimeDelta::try_days(amount),
        UnitOfTime::Weeks => TimeDelta::try_weeks(amount),
        UnitOfTime::Months => return add_months(at, amount).ok_or_else(|| out_of_range(rule)),
        UnitOfTime::Quarters => {
            return amount
                .checked_mul(3)
                .and_then(|m| add_months(at, m))
                .ok_or_else(|| out_of_range(rule))
        }
        UnitOfTime::Years => {
            return amount
                .checked_mul(12)
                .and_then(|m| add_months(at, m))
                .ok_or_else(|| out_of_range(rule))
        }
    };
    delta
        .and_then(|d| at.checked_add_signed(d))
        .ok_or_else(|| out_of_range(rule))
}

fn out_of_range(rule: &FilterRule) -> CompileError {
    invalid(rule, "date out of range")
}

fn add_months(at: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        at.checked_add_months(magnitude)
    } else {
        at.checked_sub_months(magnitude)
    }
}

/// Truncate `at` to the start of its `unit`.
fn start_of(at: NaiveDateTime, unit: UnitOfTime, week_start: WeekDay) -> Option<NaiveDateTime> {
    let date = at.date();
    match unit {
        UnitOfTime::Milliseconds => at.with_nanosecond(at.nanosecond() / 1_000_000 * 1_000_000),
        UnitOfTime::Seconds => at.with_nanosecond(0),
        UnitOfTime::Minutes => date.and_hms_opt(at.hour(), at.minute(), 0),
        UnitOfTime::Hours => date.and_hms_opt(at.hour(), 0, 0),
        UnitOfTime::Days => Some(date.and_time(NaiveTime::MIN)),
        UnitOfTime::Weeks => {
            let offset =
                (date.weekday().num_days_from_monday() + 7 - u32::from(week_start.index())) % 7;
            date.checked_sub_days(chrono::Days::new(u64::from(offset)))
                .map(|d| d.and_time(NaiveTime::MIN))
        }
        UnitOfTime::Months => {
            NaiveDate::from_ymd_opt(date.year(), date.month(), 1).map(|d| d.and_time(NaiveTime::MIN))
        }
        UnitOfTime::Quarters => {
            let month = (date.month() - 1) / 3 * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1).map(|d| d.and_time(NaiveTime::MIN))
        }
        UnitOfTime::Years => {
            NaiveDate::from_ymd_opt(date.year(), 1, 1).map(|d| d.and_time(NaiveTime::MIN))
        }
    }
}
