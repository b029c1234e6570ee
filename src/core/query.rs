//! List query model: filters, sorting and page windows

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::error::{ArgumentError, RecordsResult};
use crate::core::field::{FieldType, FieldValue};
use crate::core::module::ModuleDefinition;
use crate::core::record::Record;

/// Requested page size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSize {
    /// Every matching row, bounded only by the store's maximum limit
    All,
    /// A positive number of rows per page
    Limited(u64),
}

/// Pagination window of a list request
///
/// Page numbers start at 1; 0 means "no page requested" and reads from the
/// first row. Negative values are rejected by the request layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub size: PageSize,
    pub number: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            size: PageSize::All,
            number: 0,
        }
    }
}

impl Page {
    pub fn new(size: PageSize, number: u64) -> Self {
        Self { size, number }
    }

    /// Rows to skip before the page starts
    ///
    /// Saturates at `u64::MAX`; use [`Page::checked_offset`] to detect a
    /// window that lies past any addressable row.
    pub fn offset(&self) -> u64 {
        match self.size {
            PageSize::Limited(size) => self.number.saturating_sub(1).saturating_mul(size),
            PageSize::All => 0,
        }
    }

    /// Rows to skip, or `None` when the offset does not fit in a `u64`
    pub fn checked_offset(&self) -> Option<u64> {
        match self.size {
            PageSize::Limited(size) => self.number.saturating_sub(1).checked_mul(size),
            PageSize::All => Some(0),
        }
    }

    /// Row limit handed to the store
    pub fn limit(&self, max_limit: u64) -> u64 {
        match self.size {
            PageSize::All => max_limit,
            PageSize::Limited(size) => size,
        }
    }
}

/// Comparison operator of a filter condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl FilterOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq" | "=" => Some(FilterOp::Eq),
            "neq" | "ne" | "!=" => Some(FilterOp::Neq),
            "gt" | ">" => Some(FilterOp::Gt),
            "gte" | ">=" => Some(FilterOp::Gte),
            "lt" | "<" => Some(FilterOp::Lt),
            "lte" | "<=" => Some(FilterOp::Lte),
            "like" => Some(FilterOp::Like),
            _ => None,
        }
    }
}

/// How conditions combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// One `field op value` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
}

impl Condition {
    pub fn new(field: &str, op: FilterOp, value: &str) -> Self {
        Self {
            field: field.to_string(),
            op,
            value: value.to_string(),
        }
    }

    fn matches(&self, record: &Record) -> bool {
        let actual = record.value_of(&self.field).unwrap_or(FieldValue::Null);
        let ordering = || compare_raw(&actual, &self.value);

        match self.op {
            FilterOp::Like => like_matches(&self.value, &actual.to_text()),
            FilterOp::Eq => ordering() == Ordering::Equal,
            FilterOp::Neq => ordering() != Ordering::Equal,
            FilterOp::Gt => ordering() == Ordering::Greater,
            FilterOp::Gte => ordering() != Ordering::Less,
            FilterOp::Lt => ordering() == Ordering::Less,
            FilterOp::Lte => ordering() != Ordering::Greater,
        }
    }
}

/// Compare a stored value with a raw query string, interpreting the string
/// with the stored value's type
fn compare_raw(actual: &FieldValue, raw: &str) -> Ordering {
    let ty = match actual {
        FieldValue::Integer(_) => FieldType::Integer,
        FieldValue::Float(_) => FieldType::Float,
        FieldValue::Boolean(_) => FieldType::Boolean,
        FieldValue::DateTime(_) => FieldType::DateTime,
        FieldValue::String(_) | FieldValue::Null => FieldType::String,
    };

    match ty.coerce("filter", &serde_json::Value::String(raw.to_string())) {
        Ok(expected) if !actual.is_null() => actual.compare(&expected),
        _ => actual.to_text().as_str().cmp(raw),
    }
}

/// SQL LIKE semantics: `%` any run, `_` one character, case-insensitive
fn like_matches(pattern: &str, text: &str) -> bool {
    let mut expr = String::from("(?is)^");
    for c in pattern.chars() {
        match c {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            c => expr.push_str(&regex::escape(&c.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).is_ok_and(|re| re.is_match(text))
}

/// A list filter; an empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub combinator: Combinator,
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new(combinator: Combinator, conditions: Vec<Condition>) -> Self {
        Self {
            combinator,
            conditions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.combinator {
            Combinator::And => self.conditions.iter().all(|c| c.matches(record)),
            Combinator::Or => self.conditions.iter().any(|c| c.matches(record)),
        }
    }

    /// Reject conditions on fields the module does not declare
    pub fn validate(&self, module: &ModuleDefinition) -> RecordsResult<()> {
        for condition in &self.conditions {
            if !module.declares(&condition.field) {
                return Err(ArgumentError::InvalidParameter {
                    parameter: format!("filter[{}]", condition.field),
                    message: format!("unknown field in module {}", module.name),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// One sort key; `-field` sorts descending
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    /// Parse a comma-separated sort expression such as `-date_entered,name`
    pub fn parse_list(expr: &str) -> Vec<SortKey> {
        expr.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('-') {
                Some(field) => SortKey {
                    field: field.to_string(),
                    descending: true,
                },
                None => SortKey {
                    field: s.trim_start_matches('+').to_string(),
                    descending: false,
                },
            })
            .collect()
    }

    pub fn validate(keys: &[SortKey], module: &ModuleDefinition) -> RecordsResult<()> {
        for key in keys {
            if !module.declares(&key.field) {
                return Err(ArgumentError::InvalidParameter {
                    parameter: "sort".to_string(),
                    message: format!("unknown field '{}' in module {}", key.field, module.name),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Compare two records by a list of keys
    pub fn compare(keys: &[SortKey], a: &Record, b: &Record) -> Ordering {
        for key in keys {
            let av = a.value_of(&key.field).unwrap_or(FieldValue::Null);
            let bv = b.value_of(&key.field).unwrap_or(FieldValue::Null);
            let ord = av.compare(&bv);
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Everything a list request asks for, validated and immutable
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub module: String,
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub page: Page,
    pub include_deleted: bool,
    /// Requested fields; empty means the module's default visible fields
    pub fields: Vec<String>,
}

impl ListQuery {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            ..Self::default()
        }
    }

    pub fn with_page(mut self, size: PageSize, number: u64) -> Self {
        self.page = Page::new(size, number);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, expr: &str) -> Self {
        self.sort = SortKey::parse_list(expr);
        self
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }
}

/// The bulk fetch the service hands to the store
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub module: String,
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub offset: u64,
    pub limit: u64,
    pub include_deleted: bool,
    pub fields: Vec<String>,
}
