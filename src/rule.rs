//! Rules: the immutable knowledge units consumed by the engine.
//!
//! A rule concludes its `action` fact when its `conditions` hold, combined
//! with AND or OR. Condition order is significant: it drives question order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a rule combines its conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every condition must hold.
    #[default]
    And,
    /// At least one condition must hold.
    Or,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

/// A single rule: `IF conditions (combined) THEN action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Ordered fact keys. Earlier conditions are asked first.
    pub conditions: Vec<String>,
    /// The concluded fact key. Unique across a well-formed rule set.
    pub action: String,
    #[serde(default)]
    pub combinator: Combinator,
    /// Whether the conclusion is a final, user-facing outcome.
    #[serde(default)]
    pub goal: bool,
    /// Grouping tag for display order only.
    #[serde(default)]
    pub category: String,
}

impl Rule {
    /// Create an AND rule with no category.
    pub fn and<I, S>(conditions: I, action: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            conditions: conditions.into_iter().map(Into::into).collect(),
            action: action.into(),
            combinator: Combinator::And,
            goal: false,
            category: String::new(),
        }
    }

    /// Create an OR rule with no category.
    pub fn or<I, S>(conditions: I, action: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            combinator: Combinator::Or,
            ..Self::and(conditions, action)
        }
    }

    /// Mark this rule as a goal.
    pub fn as_goal(mut self) -> Self {
        self.goal = true;
        self
    }

    /// Set the category tag.
    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn is_or(&self) -> bool {
        self.combinator == Combinator::Or
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joiner = match self.combinator {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        };
        write!(f, "IF {} THEN {}", self.conditions.join(joiner), self.action)?;
        if self.goal {
            write!(f, " [goal]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_fields() {
        let rule = Rule::or(["inv_ok", "trade_ok"], "biz_ok").in_category("E");
        assert_eq!(rule.combinator, Combinator::Or);
        assert_eq!(rule.conditions, vec!["inv_ok", "trade_ok"]);
        assert_eq!(rule.action, "biz_ok");
        assert_eq!(rule.category, "E");
        assert!(!rule.goal);
        assert!(rule.as_goal().goal);
    }

    #[test]
    fn display_joins_with_combinator() {
        let rule = Rule::and(["nat_match", "biz_ok"], "E_ok").as_goal();
        assert_eq!(rule.to_string(), "IF nat_match AND biz_ok THEN E_ok [goal]");
    }

    #[test]
    fn deserialize_applies_defaults() {
        let rule: Rule =
            serde_json::from_str(r#"{"conditions":["a","b"],"action":"c"}"#).unwrap();
        assert_eq!(rule.combinator, Combinator::And);
        assert!(!rule.goal);
        assert!(rule.category.is_empty());

        let rule: Rule =
            serde_json::from_str(r#"{"conditions":["a"],"action":"c","combinator":"or"}"#)
                .unwrap();
        assert!(rule.is_or());
    }
}
