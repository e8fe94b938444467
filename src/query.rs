//! Search query mini-language parser.
//!
//! Raw queries mix free text with `key:value` directives, e.g.
//! `cabinetId:NG-1 top:10 orderby:lastMod contract "acme corp"`.
//! Tokens split on whitespace with shell-style quoting, each token
//! containing a colon splits at the first colon, and the recognized keys
//! become typed overrides. Everything else joins back into free text.
//!
//! Parsing is total over arbitrary input except for recognized keys with
//! malformed values, which are caller errors.

use serde::Deserialize;
use thiserror::Error;

/// Sort order accepted by the repository's search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    Relevance,
    LastModified,
}

impl OrderBy {
    /// Wire name expected by the repository API.
    pub fn as_param(&self) -> &'static str {
        match self {
            OrderBy::Relevance => "relevance",
            OrderBy::LastModified => "lastMod",
        }
    }

    /// Accepts the wire name and common spellings, case-insensitively.
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "relevance" => Some(OrderBy::Relevance),
            "lastmod" | "last_modified" | "lastmodified" => Some(OrderBy::LastModified),
            _ => None,
        }
    }
}

/// Parsed query. Every field except `free_text` is an optional override;
/// defaults come from configuration at search time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchQuery {
    pub cabinet_id: Option<String>,
    pub top: Option<u32>,
    pub order_by: Option<OrderBy>,
    pub select: Option<String>,
    pub free_text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid value for `{key}`: {value:?} ({reason})")]
    InvalidParameter {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Parse a raw query string into a [`SearchQuery`].
///
/// Never fails on arbitrary text. The only errors are malformed values for
/// recognized keys (`top` must be a positive integer, `orderby` must name a
/// known sort order).
pub fn parse(raw: &str) -> Result<SearchQuery, QueryError> {
    let tokens = match tokenize(raw) {
        Some(tokens) => tokens,
        // Unbalanced quotes degrade to plain whitespace splitting.
        None => raw.split_whitespace().map(str::to_string).collect(),
    };

    let mut query = SearchQuery::default();
    let mut free = Vec::new();

    for token in tokens {
        let Some((key, value)) = split_directive(&token) else {
            free.push(token);
            continue;
        };
        if value.is_empty() {
            // "top:" carries no value, treat the override as unset.
            continue;
        }
        match key {
            "cabinetId" => query.cabinet_id = Some(value.to_string()),
            "select" => query.select = Some(value.to_string()),
            "top" => {
                let parsed = value.parse::<u32>().ok().filter(|n| *n >= 1);
                match parsed {
                    Some(n) => query.top = Some(n),
                    None => {
                        return Err(QueryError::InvalidParameter {
                            key: "top",
                            value: value.to_string(),
                            reason: "expected a positive integer",
                        })
                    }
                }
            }
            "orderby" => match OrderBy::from_keyword(value) {
                Some(order) => query.order_by = Some(order),
                None => {
                    return Err(QueryError::InvalidParameter {
                        key: "orderby",
                        value: value.to_string(),
                        reason: "expected relevance or lastMod",
                    })
                }
            },
            // Unknown key, drop the whole token.
            _ => {}
        }
    }

    query.free_text = free.join(" ");
    Ok(query)
}

/// Split a directive-shaped token at its first colon. `None` means the
/// token has no colon at all and belongs to the free text.
fn split_directive(token: &str) -> Option<(&str, &str)> {
    let (key, value) = token.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Shell-style tokenizer: whitespace separates tokens, single quotes are
/// literal, double quotes honor backslash escapes, a bare backslash escapes
/// the next character. Returns `None` on unbalanced quoting or a trailing
/// escape.
fn tokenize(raw: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(inner) => current.push(inner),
                        None => return None,
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped @ ('"' | '\\')) => current.push(escaped),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return None,
                        },
                        Some(inner) => current.push(inner),
                        None => return None,
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return None,
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let q = parse("merger agreement draft").unwrap();
        assert_eq!(q.free_text, "merger agreement draft");
        assert_eq!(q.cabinet_id, None);
        assert_eq!(q.top, None);
        assert_eq!(q.order_by, None);
    }

    #[test]
    fn test_directives_and_free_text() {
        let q = parse("cabinetId:NG-1 top:10 orderby:lastMod alpha \"pdf\"").unwrap();
        assert_eq!(q.cabinet_id.as_deref(), Some("NG-1"));
        assert_eq!(q.top, Some(10));
        assert_eq!(q.order_by, Some(OrderBy::LastModified));
        assert_eq!(q.free_text, "alpha pdf");
    }

    #[test]
    fn test_quotes_preserve_spaces() {
        let q = parse("\"acme corp\" 'board minutes'").unwrap();
        assert_eq!(q.free_text, "acme corp board minutes");
    }

    #[test]
    fn test_quoted_colon_still_splits_as_directive() {
        // Quoting groups spaces; directive detection happens after.
        let q = parse("cabinetId:\"NG 1\" alpha").unwrap();
        assert_eq!(q.cabinet_id.as_deref(), Some("NG 1"));
        assert_eq!(q.free_text, "alpha");
    }

    #[test]
    fn test_unknown_keys_dropped() {
        let q = parse("shelf:A7 alpha beta").unwrap();
        assert_eq!(q.free_text, "alpha beta");
        assert_eq!(q.cabinet_id, None);
    }

    #[test]
    fn test_non_numeric_top_is_invalid() {
        let err = parse("top:many alpha").unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidParameter { key: "top", .. }
        ));
    }

    #[test]
    fn test_zero_top_is_invalid() {
        assert!(parse("top:0").is_err());
    }

    #[test]
    fn test_unknown_orderby_is_invalid() {
        let err = parse("orderby:upside-down").unwrap_err();
        assert!(matches!(
            err,
            QueryError::InvalidParameter { key: "orderby", .. }
        ));
    }

    #[test]
    fn test_orderby_spellings() {
        assert_eq!(OrderBy::from_keyword("lastMod"), Some(OrderBy::LastModified));
        assert_eq!(OrderBy::from_keyword("LASTMODIFIED"), Some(OrderBy::LastModified));
        assert_eq!(OrderBy::from_keyword("relevance"), Some(OrderBy::Relevance));
        assert_eq!(OrderBy::from_keyword("sideways"), None);
        assert_eq!(OrderBy::LastModified.as_param(), "lastMod");
    }

    #[test]
    fn test_empty_directive_value_is_dropped() {
        let q = parse("top: alpha").unwrap();
        assert_eq!(q.top, None);
        assert_eq!(q.free_text, "alpha");
    }

    #[test]
    fn test_unbalanced_quote_degrades_to_whitespace_split() {
        let q = parse("alpha \"beta gamma").unwrap();
        assert_eq!(q.free_text, "alpha \"beta gamma");
    }

    #[test]
    fn test_empty_input() {
        let q = parse("").unwrap();
        assert_eq!(q, SearchQuery::default());
    }

    #[test]
    fn test_last_directive_wins() {
        let q = parse("top:5 top:9").unwrap();
        assert_eq!(q.top, Some(9));
    }
}
