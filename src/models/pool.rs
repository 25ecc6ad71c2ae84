use super::size::{Size, Stat};
use serde::Serialize;

/// Placement rule a pool is bound to, as resolved from the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementRef {
    pub rule_id:   i64,
    pub rule_name: String,
}

impl PlacementRef {
    /// Stand-in for a pool whose rule lookup failed.
    pub fn unknown() -> Self {
        PlacementRef {
            rule_id:   Pool::UNKNOWN_RULE_ID,
            rule_name: Pool::UNKNOWN_RULE_NAME.to_string(),
        }
    }
}

/// Logical usage counters of one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolUsage {
    pub used_bytes:         f64,
    pub replication_factor: u32,
}

/// One storage pool for the current poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pool {
    pub name:      String,
    pub rule_id:   i64,
    pub rule_name: String,
    /// Only `used` and `provisioned` are meaningful at pool level.
    pub stat:      Stat,
}

impl Pool {
    pub const UNKNOWN_RULE_ID: i64 = -1;
    pub const UNKNOWN_RULE_NAME: &'static str = "None";

    /// `provisioned` is the on-disk footprint: logical bytes times the copy count.
    pub fn new(name: impl Into<String>, rule: PlacementRef, usage: PoolUsage) -> Self {
        let stat = Stat {
            used:        Size::from_bytes(usage.used_bytes),
            provisioned: Size::from_bytes(usage.used_bytes * usage.replication_factor as f64),
            ..Stat::default()
        };
        Pool { name: name.into(), rule_id: rule.rule_id, rule_name: rule.rule_name, stat }
    }

    pub fn has_known_rule(&self) -> bool {
        self.rule_id != Self::UNKNOWN_RULE_ID
    }
}
