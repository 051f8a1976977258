//! User-defined classifier rules.
//!
//! A rule matches a candidate directory either by exact `name` or by a
//! `regex` searched anywhere in the name. When both are given the regex wins.
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One rule as written in `rice.toml` under `[[classifier.rules]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDef {
    /// Exact directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Regular expression searched in the directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Pattern(Regex),
}

/// A compiled rule with its diagnostic label.
#[derive(Debug, Clone)]
struct Rule {
    label: String,
    matcher: Matcher,
}

/// Compiled rule set consulted by the name scorer.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile rule definitions. Definitions with neither field are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] for a regex that does not compile.
    pub fn compile(defs: &[RuleDef]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(defs.len());
        for def in defs {
            let rule = match (&def.regex, &def.name) {
                (Some(pattern), _) => Rule {
                    label: format!("rule:/{pattern}/"),
                    matcher: Matcher::Pattern(Regex::new(pattern).map_err(|e| {
                        ConfigError::InvalidRule {
                            rule: pattern.clone(),
                            message: e.to_string(),
                        }
                    })?),
                },
                (None, Some(name)) => Rule {
                    label: format!("rule:{name}"),
                    matcher: Matcher::Exact(name.clone()),
                },
                (None, None) => continue,
            };
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    /// Labels of every rule that matches `dir_name`, in definition order.
    #[must_use]
    pub fn matches(&self, dir_name: &str) -> Vec<String> {
        self.rules
            .iter()
            .filter(|r| match &r.matcher {
                Matcher::Exact(name) => name == dir_name,
                Matcher::Pattern(re) => re.is_match(dir_name),
            })
            .map(|r| r.label.clone())
            .collect()
    }

    /// Number of compiled rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` when there are no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
