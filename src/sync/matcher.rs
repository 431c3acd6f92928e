//! Name matching for descriptor patterns.
//!
//! A pattern is either a literal name or contains `*`, which matches any
//! substring (including the empty one). The whole name has to match.
//! Multiple patterns are OR-ed.

use regex::Regex;

/// Compiled set of descriptor patterns.
#[derive(Debug, Clone)]
pub struct NameMatcher {
    literals: Vec<String>,
    wildcards: Vec<Regex>,
}

impl NameMatcher {
    /// Compile `patterns`.
    ///
    /// Literal characters are escaped, so a pattern can never fail to compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let mut literals = Vec::new();
        let mut wildcards = Vec::new();

        for pattern in patterns {
            let pattern = pattern.as_ref();
            if is_wildcard(pattern) {
                if let Some(re) = wildcard_regex(pattern) {
                    wildcards.push(re);
                }
            } else {
                literals.push(pattern.to_string());
            }
        }

        Self {
            literals,
            wildcards,
        }
    }

    /// Whether `name` matches at least one pattern.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.literals.iter().any(|l| l == name) || self.wildcards.iter().any(|re| re.is_match(name))
    }

    /// Names from `candidates` matching any pattern, in candidate order.
    pub fn filter<'a, I>(&self, candidates: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().filter(|n| self.is_match(n)).collect()
    }
}

/// Whether `pattern` contains the wildcard token.
#[must_use]
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.contains('*')
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    // `*` spans newlines too
    Regex::new(&format!("(?s)^{body}$")).ok()
}
