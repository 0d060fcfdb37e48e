//! Knowledge base snapshot: an immutable, indexed view of a rule list.
//!
//! A snapshot is built once and shared (behind `Arc`) by every engine started
//! against it. Reloading rules means building a new snapshot for new sessions;
//! live dialogues keep the snapshot they started with.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, KnowledgeResult};
use crate::rule::Rule;

/// Position of a rule in its knowledge base (declaration order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// On-disk shape of a rule file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDocument {
    /// Preferred category display order. Unlisted categories follow in order
    /// of first appearance.
    #[serde(default)]
    pub category_order: Vec<String>,
    pub rules: Vec<Rule>,
}

/// Immutable, indexed rule snapshot.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    rules: Vec<Rule>,
    goals: Vec<RuleId>,
    /// Fact key → rules concluding it.
    deriving: HashMap<String, Vec<RuleId>>,
    /// Fact key → rules listing it as a condition.
    dependents: HashMap<String, Vec<RuleId>>,
    category_rank: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Build a snapshot with categories ranked by first appearance.
    pub fn new(rules: Vec<Rule>) -> KnowledgeResult<Self> {
        Self::with_category_order(rules, &[])
    }

    /// Build a snapshot with an explicit category display order.
    ///
    /// Fails fast on rules the engine cannot evaluate: an empty action, no
    /// conditions, a blank condition, or a rule depending on its own conclusion.
    pub fn with_category_order(rules: Vec<Rule>, category_order: &[String]) -> KnowledgeResult<Self> {
        for (index, rule) in rules.iter().enumerate() {
            if rule.action.trim().is_empty() {
                return Err(KnowledgeError::EmptyAction { index });
            }
            if rule.conditions.is_empty() {
                return Err(KnowledgeError::NoConditions {
                    rule: rule.action.clone(),
                });
            }
            for (position, condition) in rule.conditions.iter().enumerate() {
                if condition.trim().is_empty() {
                    return Err(KnowledgeError::EmptyCondition {
                        rule: rule.action.clone(),
                        position,
                    });
                }
                if *condition == rule.action {
                    return Err(KnowledgeError::SelfReference {
                        rule: rule.action.clone(),
                        condition: condition.clone(),
                    });
                }
            }
        }

        let mut goals = Vec::new();
        let mut deriving: HashMap<String, Vec<RuleId>> = HashMap::new();
        let mut dependents: HashMap<String, Vec<RuleId>> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            let id = RuleId(index);
            if rule.goal {
                goals.push(id);
            }
            deriving.entry(rule.action.clone()).or_default().push(id);
            let mut seen = HashSet::new();
            for condition in &rule.conditions {
                if seen.insert(condition.as_str()) {
                    dependents.entry(condition.clone()).or_default().push(id);
                }
            }
        }

        let mut category_rank: HashMap<String, usize> = HashMap::new();
        for category in category_order
            .iter()
            .chain(rules.iter().map(|r| &r.category))
        {
            let next = category_rank.len();
            category_rank.entry(category.clone()).or_insert(next);
        }

        tracing::debug!(
            rules = rules.len(),
            goals = goals.len(),
            derived = deriving.len(),
            "built knowledge base snapshot"
        );

        Ok(Self {
            rules,
            goals,
            deriving,
            dependents,
            category_rank,
        })
    }

    /// Build a snapshot from a parsed rule document.
    pub fn from_document(doc: RuleDocument) -> KnowledgeResult<Self> {
        Self::with_category_order(doc.rules, &doc.category_order)
    }

    /// Load a rule file: TOML when the extension is `.toml`, JSON otherwise.
    pub fn load(path: &Path) -> KnowledgeResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let is_toml = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
        let doc: RuleDocument = if is_toml {
            toml::from_str(&content).map_err(|e| KnowledgeError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| KnowledgeError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
        };
        tracing::info!(path = %path.display(), rules = doc.rules.len(), "loaded rule file");
        Self::from_document(doc)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    /// All rule ids in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        (0..self.rules.len()).map(RuleId)
    }

    /// Goal rules in declaration order.
    pub fn goals(&self) -> &[RuleId] {
        &self.goals
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// A fact is derived when some rule concludes it.
    pub fn is_derived(&self, fact: &str) -> bool {
        self.deriving.contains_key(fact)
    }

    /// Rules concluding `fact`, in declaration order.
    pub fn deriving_rules(&self, fact: &str) -> &[RuleId] {
        self.deriving.get(fact).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rules listing `fact` as a condition, in declaration order.
    pub fn dependents(&self, fact: &str) -> &[RuleId] {
        self.dependents.get(fact).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `fact` is a condition of at least one rule (i.e. askable).
    pub fn is_condition(&self, fact: &str) -> bool {
        self.dependents.contains_key(fact)
    }

    /// First rule concluding `action`.
    pub fn find(&self, action: &str) -> Option<RuleId> {
        self.deriving_rules(action).first().copied()
    }

    /// Every distinct condition that no rule concludes.
    pub fn base_conditions(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .flat_map(|r| r.conditions.iter())
            .filter(|c| !self.is_derived(c))
            .filter(|c| seen.insert(c.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn category_rank(&self, category: &str) -> usize {
        self.category_rank
            .get(category)
            .copied()
            .unwrap_or(self.category_rank.len())
    }

    /// Rule ids sorted by category rank, then declaration order.
    pub fn display_order(&self) -> Vec<RuleId> {
        let mut ids: Vec<RuleId> = self.ids().collect();
        ids.sort_by_key(|id| (self.category_rank(&self.rule(*id).category), id.0));
        ids
    }

    /// The rule list as a serializable document.
    pub fn to_document(&self) -> RuleDocument {
        let mut ranked: Vec<(&String, &usize)> = self.category_rank.iter().collect();
        ranked.sort_by_key(|(_, rank)| **rank);
        RuleDocument {
            category_order: ranked.into_iter().map(|(c, _)| c.clone()).collect(),
            rules: self.rules.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> KnowledgeBase {
        KnowledgeBase::new(vec![
            Rule::and(["nat_match", "biz_ok"], "E_ok")
                .as_goal()
                .in_category("E"),
            Rule::or(["inv_ok", "trade_ok"], "biz_ok").in_category("E"),
            Rule::and(["intra_company"], "L_ok").as_goal().in_category("L"),
        ])
        .unwrap()
    }

    #[test]
    fn indexes_derived_and_dependents() {
        let kb = sample();
        assert!(kb.is_derived("biz_ok"));
        assert!(!kb.is_derived("inv_ok"));
        assert_eq!(kb.deriving_rules("biz_ok"), &[RuleId(1)]);
        assert_eq!(kb.dependents("biz_ok"), &[RuleId(0)]);
        assert!(kb.is_condition("trade_ok"));
        assert!(!kb.is_condition("E_ok"));
        assert_eq!(kb.goals(), &[RuleId(0), RuleId(2)]);
        assert_eq!(kb.find("L_ok"), Some(RuleId(2)));
        assert_eq!(
            kb.base_conditions(),
            vec!["nat_match", "inv_ok", "trade_ok", "intra_company"]
        );
    }

    #[test]
    fn explicit_category_order_wins() {
        let rules = vec![
            Rule::and(["a"], "x").in_category("B"),
            Rule::and(["b"], "y").in_category("E"),
            Rule::and(["c"], "z").in_category("B"),
        ];
        let kb = KnowledgeBase::with_category_order(rules, &["E".to_string()]).unwrap();
        let order: Vec<usize> = kb.display_order().into_iter().map(RuleId::index).collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert_eq!(kb.category_rank("unlisted"), 2);
    }

    #[test]
    fn self_reference_fails_fast() {
        let err = KnowledgeBase::new(vec![Rule::and(["a", "loop"], "loop")]).unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::SelfReference { ref rule, ref condition }
                if rule == "loop" && condition == "loop"
        ));
    }

    #[test]
    fn empty_rules_are_rejected() {
        assert!(matches!(
            KnowledgeBase::new(vec![Rule::and(Vec::<String>::new(), "x")]),
            Err(KnowledgeError::NoConditions { .. })
        ));
        assert!(matches!(
            KnowledgeBase::new(vec![Rule::and(["a"], " ")]),
            Err(KnowledgeError::EmptyAction { index: 0 })
        ));
        assert!(matches!(
            KnowledgeBase::new(vec![Rule::and(["a", ""], "x")]),
            Err(KnowledgeError::EmptyCondition { position: 1, .. })
        ));
    }

    #[test]
    fn duplicate_actions_do_not_crash() {
        let kb = KnowledgeBase::new(vec![
            Rule::and(["a"], "dup"),
            Rule::and(["b"], "dup"),
        ])
        .unwrap();
        assert_eq!(kb.deriving_rules("dup").len(), 2);
        assert_eq!(kb.find("dup"), Some(RuleId(0)));
    }

    #[test]
    fn load_json_and_toml() {
        let dir = tempfile::TempDir::new().unwrap();

        let json_path = dir.path().join("rules.json");
        std::fs::write(
            &json_path,
            r#"{"category_order":["E"],"rules":[
                {"conditions":["nat_match","biz_ok"],"action":"E_ok","goal":true,"category":"E"},
                {"conditions":["inv_ok","trade_ok"],"action":"biz_ok","combinator":"or","category":"E"}
            ]}"#,
        )
        .unwrap();
        let kb = KnowledgeBase::load(&json_path).unwrap();
        assert_eq!(kb.len(), 2);
        assert!(kb.rule(RuleId(1)).is_or());

        let toml_path = dir.path().join("rules.toml");
        std::fs::write(
            &toml_path,
            r#"
            [[rules]]
            conditions = ["intra_company"]
            action = "L_ok"
            goal = true
            category = "L"
            "#,
        )
        .unwrap();
        let kb = KnowledgeBase::load(&toml_path).unwrap();
        assert_eq!(kb.goals().len(), 1);
    }

    #[test]
    fn load_reports_parse_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            KnowledgeBase::load(&path),
            Err(KnowledgeError::Parse { .. })
        ));
        assert!(matches!(
            KnowledgeBase::load(&dir.path().join("missing.json")),
            Err(KnowledgeError::Read { .. })
        ));
    }
}
