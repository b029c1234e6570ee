//! Query-string parsing for record routes
//!
//! Parameters arrive as raw `(key, value)` pairs so that bracketed JSON:API
//! keys (`page[size]`, `filter[name][like]`, `fields[Accounts]`) keep their
//! order and can be copied into pagination links unchanged.

use crate::config::ServiceConfig;
use crate::core::error::{ArgumentError, RecordsError, RecordsResult};
use crate::core::query::{Combinator, Condition, Filter, FilterOp, ListQuery, Page, PageSize, SortKey};

fn invalid(parameter: &str, message: impl Into<String>) -> RecordsError {
    ArgumentError::InvalidParameter {
        parameter: parameter.to_string(),
        message: message.into(),
    }
    .into()
}

/// Split `root[a][b]` into `("root", ["a", "b"])`
fn split_brackets(key: &str) -> Option<(&str, Vec<&str>)> {
    let open = key.find('[')?;
    let (root, mut rest) = key.split_at(open);
    let mut segments = Vec::new();

    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        segments.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    Some((root, segments))
}

/// Comma-separated field list of `fields[<module>]`
pub fn parse_fields(module: &str, pairs: &[(String, String)]) -> Vec<String> {
    pairs
        .iter()
        .filter(|(k, _)| {
            split_brackets(k).is_some_and(|(root, seg)| root == "fields" && seg == [module])
        })
        .flat_map(|(_, v)| v.split(','))
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_page_size(raw: &str, config: &ServiceConfig) -> RecordsResult<PageSize> {
    let size: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("page[size]", "expected an integer"))?;

    if size == config.all_records_size {
        Ok(PageSize::All)
    } else if size >= 1 {
        Ok(PageSize::Limited(size as u64))
    } else {
        Err(invalid("page[size]", "must be a positive integer"))
    }
}

fn parse_page_number(raw: &str) -> RecordsResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| invalid("page[number]", "must be a non-negative integer"))
}

fn parse_flag(parameter: &str, raw: &str) -> RecordsResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        _ => Err(invalid(parameter, "expected 1, 0, true or false")),
    }
}

/// Build a validated list query from the request's query pairs
///
/// Unrecognized parameters are ignored.
pub fn parse_list_query(
    module: &str,
    pairs: &[(String, String)],
    config: &ServiceConfig,
) -> RecordsResult<ListQuery> {
    let mut query = ListQuery::new(module);
    let mut page = Page::default();
    let mut conditions = Vec::new();
    let mut combinator = Combinator::And;

    for (key, value) in pairs {
        if key == "sort" {
            query.sort = SortKey::parse_list(value);
            continue;
        }
        if key == "deleted" {
            query.include_deleted = parse_flag(key, value)?;
            continue;
        }

        let Some((root, segments)) = split_brackets(key) else {
            continue;
        };

        match (root, segments.as_slice()) {
            ("page", ["size"]) => page.size = parse_page_size(value, config)?,
            ("page", ["number"]) => page.number = parse_page_number(value)?,
            ("filter", ["operator"]) => {
                combinator = match value.trim().to_ascii_lowercase().as_str() {
                    "and" => Combinator::And,
                    "or" => Combinator::Or,
                    _ => return Err(invalid(key, "expected 'and' or 'or'")),
                }
            }
            ("filter", [field]) => conditions.push(Condition::new(field, FilterOp::Eq, value)),
            ("filter", [field, op]) => {
                let op = FilterOp::parse(op)
                    .ok_or_else(|| invalid(key, format!("unknown operator '{}'", op)))?;
                conditions.push(Condition::new(field, op, value));
            }
            ("filter", _) => return Err(invalid(key, "malformed filter")),
            _ => {}
        }
    }

    if page.checked_offset().is_none() {
        return Err(invalid("page[number]", "page window is out of range"));
    }

    query.page = page;
    query.filter = Filter::new(combinator, conditions);
    query.fields = parse_fields(module, pairs);
    Ok(query)
}
