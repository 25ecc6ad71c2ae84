//! Capacity aggregation: pools → placement rules → topology roots.
//!
//! One cycle runs strictly in order against a single session:
//! open, enrich pools, join rules to roots, sum pools into zones.

use crate::collectors::mon::MonTransport;
use crate::collectors::session::Session;
use crate::error::CephResult;
use crate::models::pool::{PlacementRef, Pool, PoolUsage};
use crate::models::size::Size;
use crate::models::topology::TopologyNode;
use crate::models::zone::Zone;
use crate::util::human::percent_of;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Share of a root's raw capacity treated as the usable design ceiling.
pub const DESIGN_CEILING_PCT: f64 = 75.0;

/// Replication baseline the root counters are divided by.
pub const BASELINE_REPLICAS: f64 = 3.0;

/// Output of one poll cycle for one cluster.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub version: u32,
    pub pools:   Vec<Pool>,
    pub zones:   Vec<Zone>,
}

/// Run a full cycle. Only a failed connection or an unreadable pool list
/// fails the cycle; every other lookup degrades to sentinel or zero values.
pub fn run_cycle<T: MonTransport>(transport: T) -> CephResult<CycleReport> {
    let session = Session::open(transport)?;

    let pool_names = session.list_pool_names()?;
    let rules = session.list_placement_rules().unwrap_or_else(|e| {
        warn!(error = %e, "placement rule listing failed");
        Vec::new()
    });
    debug!(pools = pool_names.len(), rules = rules.len(),
        rule_key = session.rule_key().as_str(), "cluster listed");

    let pools = enrich_pools(&session, &pool_names, &rules);
    let unresolved = pools.iter().filter(|p| !p.has_known_rule()).count();
    if unresolved > 0 {
        warn!(unresolved, "pools without a resolved placement rule");
    }

    let nodes = session.dump_topology_tree().unwrap_or_else(|e| {
        warn!(error = %e, "topology dump failed");
        Vec::new()
    });

    let zones = aggregate_pools(&join_roots(&rules, &nodes), &pools);
    info!(zones = zones.len(), pools = pools.len(), "cycle complete");

    Ok(CycleReport { version: session.version(), pools, zones })
}

/// Build one `Pool` per name. Each pool's lookups fail independently.
pub fn enrich_pools<T: MonTransport>(session: &Session<T>, names: &[String], rules: &[Zone]) -> Vec<Pool> {
    names.iter().map(|name| {
        let rule = session.pool_placement_rule(name, rules).unwrap_or_else(|e| {
            warn!(pool = %name, error = %e, "placement rule lookup failed");
            PlacementRef::unknown()
        });
        let usage = session.pool_raw_usage(name).unwrap_or_else(|e| {
            warn!(pool = %name, error = %e, "usage lookup failed");
            PoolUsage::default()
        });
        Pool::new(name.as_str(), rule, usage)
    })
    .collect()
}

/// Pair every root node with every rule that takes from it.
///
/// Output follows the scan order (roots outer, rules inner). A rule taking
/// from several roots yields one zone per root; nothing is deduplicated.
pub fn join_roots(rules: &[Zone], nodes: &[TopologyNode]) -> Vec<Zone> {
    let mut joined = Vec::new();
    for node in nodes.iter().filter(|n| n.is_root()) {
        for rule in rules.iter().filter(|r| r.references(&node.name)) {
            let mut zone = rule.clone();
            zone.is_root     = true;
            zone.public_name = node.name.clone();
            zone.stat.total.set_bytes(percent_of(DESIGN_CEILING_PCT, node.total_bytes() / BASELINE_REPLICAS));
            zone.stat.available.set_bytes(node.avail_bytes());
            zone.stat.used.set_bytes(node.used_bytes() / BASELINE_REPLICAS);
            debug!(root = %node.name, root_id = node.id, rule = %zone.rule_name, total = %zone.stat.total, "zone joined");
            joined.push(zone);
        }
    }
    joined
}

/// Sum the provisioned bytes of each root-backed zone's pools and derive `free`.
///
/// `free` goes negative when a zone is over-provisioned.
pub fn aggregate_pools(zones: &[Zone], pools: &[Pool]) -> Vec<Zone> {
    zones.iter()
        .filter(|z| z.is_root)
        .map(|zone| {
            let mut zone = zone.clone();
            let mut provisioned = Size::from_bytes(0.0);
            for pool in pools.iter().filter(|p| p.rule_name == zone.rule_name) {
                provisioned.add_bytes(pool.stat.provisioned.bytes());
            }
            provisioned.convert();
            zone.stat.free.set_bytes(zone.stat.total.bytes() - provisioned.bytes());
            zone.stat.provisioned = provisioned;
            zone
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeMon;
    use crate::error::CephError;
    use std::sync::atomic::Ordering;

    fn root(name: &str, total_kb: u64, used_kb: u64, avail_kb: u64) -> TopologyNode {
        TopologyNode { id: -1, name: name.into(), node_type: "root".into(), total_kb, used_kb, avail_kb }
    }

    fn host(name: &str) -> TopologyNode {
        TopologyNode { id: -3, name: name.into(), node_type: "host".into(), total_kb: 999, used_kb: 1, avail_kb: 998 }
    }

    fn pool(name: &str, rule: &str, used: f64, factor: u32) -> Pool {
        Pool::new(
            name,
            PlacementRef { rule_id: 0, rule_name: rule.into() },
            PoolUsage { used_bytes: used, replication_factor: factor },
        )
    }

    #[test]
    fn root_join_applies_derating_formula() {
        let rules = vec![Zone::new(0, "replicated_rule", vec!["default".into()])];
        let nodes = vec![host("node1"), root("default", 300, 30, 270)];
        let zones = join_roots(&rules, &nodes);

        assert_eq!(zones.len(), 1);
        let z = &zones[0];
        assert!(z.is_root);
        assert_eq!(z.public_name, "default");
        assert_eq!(z.stat.total.bytes(), 0.75 * (300.0 * 1024.0 / 3.0));
        assert_eq!(z.stat.used.bytes(), 30.0 * 1024.0 / 3.0);
        assert_eq!(z.stat.available.bytes(), 270.0 * 1024.0);
        assert_eq!(z.stat.total.to_string(), "75.0 KiB");
    }

    #[test]
    fn rules_not_taking_from_a_root_are_dropped() {
        let rules = vec![
            Zone::new(0, "a", vec!["default".into()]),
            Zone::new(1, "b", vec!["elsewhere".into()]),
        ];
        let zones = join_roots(&rules, &[root("default", 10, 0, 10)]);
        assert_eq!(zones.iter().map(|z| z.id).collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn fan_out_is_kept_in_scan_order() {
        let rules = vec![
            Zone::new(0, "a", vec!["dc1".into(), "dc2".into()]),
            Zone::new(1, "b", vec!["dc1".into()]),
        ];
        let nodes = vec![root("dc1", 30, 0, 30), root("dc2", 60, 0, 60)];
        let zones = join_roots(&rules, &nodes);
        let order: Vec<(&str, &str)> = zones.iter()
            .map(|z| (z.public_name.as_str(), z.rule_name.as_str()))
            .collect();
        assert_eq!(order, vec![("dc1", "a"), ("dc1", "b"), ("dc2", "a")]);
    }

    #[test]
    fn three_pools_on_one_root_zone() {
        let rules = vec![Zone::new(0, "replicated_rule", vec!["default".into()])];
        let pools = vec![
            pool("a", "replicated_rule", 100.0, 3),
            pool("b", "replicated_rule", 100.0, 3),
            pool("c", "replicated_rule", 100.0, 3),
        ];
        for p in &pools {
            assert_eq!(p.stat.provisioned.bytes(), 300.0);
        }
        let zones = aggregate_pools(&join_roots(&rules, &[root("default", 300, 0, 300)]), &pools);

        let total = 0.75 * (300.0 * 1024.0 / 3.0);
        let z = &zones[0];
        assert_eq!(z.stat.provisioned.bytes(), 900.0);
        assert_eq!(z.stat.provisioned.unit(), "B");
        assert_eq!(z.stat.total.bytes(), total);
        assert_eq!(z.stat.free.bytes(), total - 900.0);
    }

    #[test]
    fn only_matching_pools_count() {
        let rules = vec![
            Zone::new(0, "hdd", vec!["default".into()]),
            Zone::new(1, "ssd", vec!["default~ssd".into()]),
        ];
        let pools = vec![
            pool("p1", "hdd", 10.0, 3),
            pool("p2", "ssd", 20.0, 2),
            pool("p3", "hdd", 5.0, 1),
            pool("lost", Pool::UNKNOWN_RULE_NAME, 1000.0, 3),
        ];
        let zones = aggregate_pools(&join_roots(&rules, &[root("default", 3, 0, 3)]), &pools);
        assert_eq!(zones[0].stat.provisioned.bytes(), 35.0);
        assert_eq!(zones[1].stat.provisioned.bytes(), 40.0);
    }

    #[test]
    fn provisioned_sum_ignores_pool_order() {
        let rules = vec![Zone::new(0, "r", vec!["default".into()])];
        let joined = join_roots(&rules, &[root("default", 900, 0, 900)]);
        let mut pools = vec![pool("a", "r", 1.0, 3), pool("b", "r", 7.0, 2), pool("c", "r", 11.0, 1)];
        let forward = aggregate_pools(&joined, &pools);
        pools.reverse();
        let backward = aggregate_pools(&joined, &pools);
        assert_eq!(forward[0].stat.provisioned.bytes(), backward[0].stat.provisioned.bytes());
        assert_eq!(forward[0].stat.provisioned.bytes(), 28.0);
    }

    #[test]
    fn over_provisioned_zone_goes_negative() {
        let rules = vec![Zone::new(0, "r", vec!["default".into()])];
        let joined = join_roots(&rules, &[root("default", 1, 0, 1)]);
        let zones = aggregate_pools(&joined, &[pool("big", "r", 4096.0, 3)]);
        let free = zones[0].stat.free.bytes();
        assert_eq!(free, 0.75 * (1024.0 / 3.0) - 12288.0);
        assert!(free < 0.0);
        assert!(zones[0].stat.free.value().starts_with('-'));
    }

    #[test]
    fn unjoined_zones_are_not_aggregated() {
        let zones = aggregate_pools(&[Zone::new(0, "r", vec![])], &[pool("a", "r", 1.0, 1)]);
        assert!(zones.is_empty());
    }

    #[test]
    fn inputs_are_left_untouched() {
        let rules = vec![Zone::new(0, "r", vec!["default".into()])];
        let joined = join_roots(&rules, &[root("default", 3, 0, 3)]);
        assert!(!rules[0].is_root);
        let _ = aggregate_pools(&joined, &[pool("a", "r", 1.0, 1)]);
        assert_eq!(joined[0].stat.provisioned.bytes(), 0.0);
    }

    const VERSION: &str = r#"{"version":"ceph version 17.2.7 (b12291d110049b2f35e32e0de30d70e9a4c060d2) quincy (stable)"}"#;
    const RULES: &str = r#"[{"rule_id":0,"rule_name":"replicated_rule","steps":[
        {"op":"take","item":-1,"item_name":"default"},
        {"op":"chooseleaf_firstn","num":0,"type":"host"},{"op":"emit"}]}]"#;
    const TREE: &str = r#"{"nodes":[
        {"id":-1,"name":"default","type":"root","kb":300,"kb_used":30,"kb_avail":270,"children":[-3]},
        {"id":-3,"name":"node1","type":"host","kb":300,"kb_used":30,"kb_avail":270,"children":[0]},
        {"id":0,"name":"osd.0","type":"osd","kb":300,"kb_used":30,"kb_avail":270}],"stray":[]}"#;
    const DF: &str = r#"{"pools":[
        {"name":"rbd","id":1,"stats":{"stored":100}},
        {"name":"broken","id":2,"stats":{"stored":100}},
        {"name":"cephfs","id":3,"stats":{"stored":100}}]}"#;

    fn scripted_cluster() -> FakeMon {
        FakeMon::new()
            .reply("version", VERSION)
            .reply("osd pool ls", r#"["rbd","broken","cephfs"]"#)
            .reply("osd crush rule dump", RULES)
            .reply("osd df tree", TREE)
            .reply("df detail", DF)
            .reply("osd pool get rbd crush_rule", r#"{"pool":"rbd","pool_id":1,"crush_rule":"replicated_rule"}"#)
            .fail("osd pool get broken crush_rule", "ENOENT")
            .reply("osd pool get cephfs crush_rule", r#"{"pool":"cephfs","pool_id":3,"crush_rule":"replicated_rule"}"#)
            .reply("osd pool get rbd size", r#"{"pool":"rbd","pool_id":1,"size":3}"#)
            .reply("osd pool get broken size", r#"{"pool":"broken","pool_id":2,"size":3}"#)
            .reply("osd pool get cephfs size", r#"{"pool":"cephfs","pool_id":3,"size":3}"#)
    }

    #[test]
    fn one_failed_pool_does_not_spoil_the_others() {
        let report = run_cycle(scripted_cluster()).unwrap();
        assert_eq!(report.version, 17);
        assert_eq!(report.pools.len(), 3);

        let broken = &report.pools[1];
        assert_eq!(broken.name, "broken");
        assert_eq!(broken.rule_id, -1);
        assert_eq!(broken.rule_name, "None");
        assert_eq!(broken.stat.provisioned.bytes(), 300.0);

        for ok in [&report.pools[0], &report.pools[2]] {
            assert_eq!(ok.rule_id, 0);
            assert_eq!(ok.rule_name, "replicated_rule");
            assert_eq!(ok.stat.provisioned.bytes(), 300.0);
        }

        assert_eq!(report.zones.len(), 1);
        let z = &report.zones[0];
        assert_eq!(z.public_name, "default");
        assert_eq!(z.stat.provisioned.bytes(), 600.0);
        assert_eq!(z.stat.free.bytes(), 0.75 * (300.0 * 1024.0 / 3.0) - 600.0);
    }

    #[test]
    fn failed_usage_lookup_yields_zero_usage() {
        let mon = scripted_cluster().fail("osd pool get cephfs size", "EIO");
        let report = run_cycle(mon).unwrap();
        let cephfs = &report.pools[2];
        assert_eq!(cephfs.rule_name, "replicated_rule");
        assert_eq!(cephfs.stat.used.bytes(), 0.0);
        assert_eq!(cephfs.stat.provisioned.bytes(), 0.0);
    }

    #[test]
    fn missing_topology_gives_empty_result() {
        let mon = scripted_cluster().fail("osd df tree", "EACCES");
        let report = run_cycle(mon).unwrap();
        assert_eq!(report.pools.len(), 3);
        assert!(report.zones.is_empty());
    }

    #[test]
    fn connection_failure_fails_the_cycle_and_releases() {
        let mon = scripted_cluster().refuse_connect();
        let flag = mon.shutdown_flag();
        assert!(matches!(run_cycle(mon), Err(CephError::Transport(_))));
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn completed_cycle_releases_session() {
        let mon = scripted_cluster();
        let flag = mon.shutdown_flag();
        run_cycle(mon).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }
}
