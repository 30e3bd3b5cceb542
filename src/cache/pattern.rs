//! Glob patterns over cache keys for operator-driven bulk deletion.
//!
//! Supported syntax: `*` (any run of characters), `?` (one character) and
//! `[...]` character classes with optional `!` negation. Everything else is
//! literal. Malformed patterns are rejected rather than widened.

use regex::Regex;

use super::error::CacheError;

#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    matcher: Regex,
}

impl KeyPattern {
    pub fn parse(pattern: &str) -> Result<Self, CacheError> {
        if pattern.trim().is_empty() {
            return Err(CacheError::invalid_pattern(pattern, "pattern is empty"));
        }
        if pattern.chars().any(char::is_control) {
            return Err(CacheError::invalid_pattern(
                pattern,
                "pattern contains control characters",
            ));
        }

        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');

        let mut chars = pattern.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                '[' => {
                    let mut class = String::new();
                    let mut closed = false;
                    if chars.peek() == Some(&'!') {
                        chars.next();
                        class.push('^');
                    }
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            closed = true;
                            break;
                        }
                        if matches!(inner, '\\' | '[' | '^' | '&' | '~') {
                            class.push('\\');
                        }
                        class.push(inner);
                    }
                    if !closed {
                        return Err(CacheError::invalid_pattern(
                            pattern,
                            "unterminated character class",
                        ));
                    }
                    if class.is_empty() || class == "^" {
                        return Err(CacheError::invalid_pattern(
                            pattern,
                            "empty character class",
                        ));
                    }
                    expr.push('[');
                    expr.push_str(&class);
                    expr.push(']');
                }
                ']' => {
                    return Err(CacheError::invalid_pattern(
                        pattern,
                        "unbalanced `]` outside a character class",
                    ));
                }
                literal => expr.push_str(&regex::escape(&literal.to_string())),
            }
        }
        expr.push('$');

        let matcher = Regex::new(&expr)
            .map_err(|err| CacheError::invalid_pattern(pattern, err.to_string()))?;

        Ok(Self {
            source: pattern.to_string(),
            matcher,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.matcher.is_match(key)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}
