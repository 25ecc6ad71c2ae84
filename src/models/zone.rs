use super::size::Stat;
use serde::{Deserialize, Serialize};

/// A placement rule, and once joined, the topology root it draws capacity from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub id:          i64,
    pub rule_name:   String,
    /// Name of the joined root node; empty until joined.
    pub public_name: String,
    pub is_root:     bool,
    /// Items the rule's `take` steps reference, in rule order.
    pub topology_item_names: Vec<String>,
    pub stat:        Stat,
}

impl Zone {
    pub fn new(id: i64, rule_name: impl Into<String>, topology_item_names: Vec<String>) -> Self {
        Zone {
            id,
            rule_name: rule_name.into(),
            public_name: String::new(),
            is_root: false,
            topology_item_names,
            stat: Stat::default(),
        }
    }

    /// Whether the rule takes from the topology item `name`.
    ///
    /// Device-class shadow items (`default~ssd`) count as their base item.
    pub fn references(&self, name: &str) -> bool {
        self.topology_item_names
            .iter()
            .any(|item| item.split('~').next() == Some(name))
    }

    /// Provisioned share of the derated total, in percent.
    pub fn provisioned_pct(&self) -> f64 {
        let total = self.stat.total.bytes();
        if total == 0.0 { return 0.0; }
        self.stat.provisioned.bytes() / total * 100.0
    }
}

/// One entry of `osd crush rule dump`.
#[derive(Debug, Clone, Deserialize)]
pub struct CrushRule {
    pub rule_id:   i64,
    pub rule_name: String,
    #[serde(default)]
    pub steps:     Vec<CrushStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrushStep {
    pub op: String,
    #[serde(default)]
    pub item_name: Option<String>,
}

impl From<CrushRule> for Zone {
    fn from(rule: CrushRule) -> Self {
        let items = rule.steps
            .into_iter()
            .filter(|s| s.op == "take")
            .filter_map(|s| s.item_name)
            .collect();
        Zone::new(rule.rule_id, rule.rule_name, items)
    }
}
