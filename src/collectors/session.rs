use super::mon::{
    MonRequest, MonTransport, PREFIX_CRUSH_RULE_DUMP, PREFIX_DF, PREFIX_OSD_DF, PREFIX_POOL_GET,
    PREFIX_POOL_LS, PREFIX_VERSION,
};
use crate::error::{CephError, CephResult};
use crate::models::pool::{PlacementRef, Pool, PoolUsage};
use crate::models::topology::TopologyNode;
use crate::models::zone::{CrushRule, Zone};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use tracing::{debug, warn};

/// Assumed protocol version when the monitor will not say.
pub const DEFAULT_VERSION: u32 = 12;

/// Newest release that still names the pool's rule `crush_ruleset`.
pub const LEGACY_RULE_KEY_MAX_VERSION: u32 = 10;

/// Pool variable holding the placement rule, which was renamed after Jewel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKey {
    CrushRuleset,
    CrushRule,
}

impl RuleKey {
    pub fn for_version(version: u32) -> Self {
        if version <= LEGACY_RULE_KEY_MAX_VERSION { RuleKey::CrushRuleset } else { RuleKey::CrushRule }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RuleKey::CrushRuleset => "crush_ruleset",
            RuleKey::CrushRule    => "crush_rule",
        }
    }
}

#[derive(Deserialize)]
struct VersionReply {
    version: String,
}

#[derive(Deserialize)]
struct PoolSizeReply {
    size: u32,
}

#[derive(Deserialize)]
struct DfReply {
    #[serde(default)]
    pools: Vec<DfPool>,
}

#[derive(Debug, Clone, Deserialize)]
struct DfPool {
    name:  String,
    stats: DfPoolStats,
}

#[derive(Debug, Clone, Deserialize)]
struct DfPoolStats {
    /// Logical bytes (Nautilus and later).
    #[serde(default)]
    stored:     Option<f64>,
    #[serde(default)]
    bytes_used: f64,
}

#[derive(Deserialize)]
struct OsdDfTreeReply {
    #[serde(default)]
    nodes: Vec<TopologyNode>,
}

/// An open monitor connection with the protocol version already detected.
///
/// Dropping the session shuts the transport down.
pub struct Session<T: MonTransport> {
    transport: T,
    version:   u32,
    rule_key:  RuleKey,
    df_cache:  RefCell<Option<Vec<DfPool>>>,
}

impl<T: MonTransport> Session<T> {
    /// Connect and detect the protocol version. A connection failure is returned;
    /// a failed version probe falls back to [`DEFAULT_VERSION`].
    pub fn open(mut transport: T) -> CephResult<Self> {
        if let Err(e) = transport.connect() {
            transport.shutdown();
            return Err(e);
        }
        let mut session = Session {
            transport,
            version:  DEFAULT_VERSION,
            rule_key: RuleKey::for_version(DEFAULT_VERSION),
            df_cache: RefCell::new(None),
        };
        let version = session.protocol_version().unwrap_or_else(|e| {
            warn!(error = %e, fallback = DEFAULT_VERSION, "version detection failed");
            DEFAULT_VERSION
        });
        session.version  = version;
        session.rule_key = RuleKey::for_version(version);
        debug!(version, rule_key = session.rule_key.as_str(), "session open");
        Ok(session)
    }

    pub fn version(&self) -> u32 { self.version }
    pub fn rule_key(&self) -> RuleKey { self.rule_key }

    fn query<R: DeserializeOwned>(&self, req: &MonRequest) -> CephResult<R> {
        let raw = self.transport.mon_command(req)?;
        serde_json::from_slice(&raw).map_err(|e| CephError::decode(&req.label(), e))
    }

    pub fn protocol_version(&self) -> CephResult<u32> {
        let reply: VersionReply = self.query(&MonRequest::new(PREFIX_VERSION))?;
        parse_version(&reply.version)
    }

    pub fn list_pool_names(&self) -> CephResult<Vec<String>> {
        self.query(&MonRequest::new(PREFIX_POOL_LS))
    }

    pub fn list_placement_rules(&self) -> CephResult<Vec<Zone>> {
        let rules: Vec<CrushRule> = self.query(&MonRequest::new(PREFIX_CRUSH_RULE_DUMP))?;
        Ok(rules.into_iter().map(Zone::from).collect())
    }

    pub fn dump_topology_tree(&self) -> CephResult<Vec<TopologyNode>> {
        let reply: OsdDfTreeReply = self.query(&MonRequest::new(PREFIX_OSD_DF).output_method("tree"))?;
        Ok(reply.nodes)
    }

    /// Look up the pool's placement rule and fill in the half the reply lacks
    /// (id or name) from `rules`. A half that cannot be resolved gets its sentinel.
    pub fn pool_placement_rule(&self, pool: &str, rules: &[Zone]) -> CephResult<PlacementRef> {
        let key = self.rule_key.as_str();
        let req = MonRequest::new(PREFIX_POOL_GET).pool(pool).var(key);
        let reply: Value = self.query(&req)?;

        match reply.get(key) {
            Some(Value::String(name)) => {
                let rule_id = rules.iter()
                    .find(|z| &z.rule_name == name)
                    .map(|z| z.id)
                    .unwrap_or_else(|| {
                        warn!(pool, rule = %name, "rule name not in rule dump");
                        Pool::UNKNOWN_RULE_ID
                    });
                Ok(PlacementRef { rule_id, rule_name: name.clone() })
            }
            Some(Value::Number(n)) => {
                let rule_id = n.as_i64()
                    .ok_or_else(|| CephError::NotFound(format!("{} of {} is not an integer", key, pool)))?;
                let rule_name = rules.iter()
                    .find(|z| z.id == rule_id)
                    .map(|z| z.rule_name.clone())
                    .unwrap_or_else(|| {
                        warn!(pool, rule_id, "rule id not in rule dump");
                        Pool::UNKNOWN_RULE_NAME.to_string()
                    });
                Ok(PlacementRef { rule_id, rule_name })
            }
            _ => Err(CephError::NotFound(format!("{} missing for pool {}", key, pool))),
        }
    }

    /// Logical bytes stored in the pool and its replica count.
    pub fn pool_raw_usage(&self, pool: &str) -> CephResult<PoolUsage> {
        let used_bytes = self.pool_df(pool)?;
        let size: PoolSizeReply = self.query(&MonRequest::new(PREFIX_POOL_GET).pool(pool).var("size"))?;
        Ok(PoolUsage { used_bytes, replication_factor: size.size })
    }

    fn pool_df(&self, pool: &str) -> CephResult<f64> {
        if self.df_cache.borrow().is_none() {
            let reply: DfReply = self.query(&MonRequest::new(PREFIX_DF).var("detail"))?;
            *self.df_cache.borrow_mut() = Some(reply.pools);
        }
        self.df_cache
            .borrow()
            .as_ref()
            .and_then(|pools| pools.iter().find(|p| p.name == pool))
            .map(|p| p.stats.stored.unwrap_or(p.stats.bytes_used))
            .ok_or_else(|| CephError::NotFound(format!("pool {} absent from df", pool)))
    }
}

impl<T: MonTransport> Drop for Session<T> {
    fn drop(&mut self) {
        self.transport.shutdown();
    }
}

/// Major release from a version banner: "ceph version 14.2.22 (ca74…) nautilus (stable)" → 14.
pub fn parse_version(banner: &str) -> CephResult<u32> {
    banner
        .split_whitespace()
        .nth(2)
        .and_then(|v| v.split('.').next())
        .and_then(|major| major.parse().ok())
        .ok_or_else(|| CephError::NotFound(format!("no version number in {:?}", banner)))
}
