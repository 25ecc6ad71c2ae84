use serde::Deserialize;

/// One node of the `osd df tree` dump. Counters are in KiB.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TopologyNode {
    pub id:   i64,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(rename = "kb", default)]
    pub total_kb: u64,
    #[serde(rename = "kb_used", default)]
    pub used_kb:  u64,
    #[serde(rename = "kb_avail", default)]
    pub avail_kb: u64,
}

impl TopologyNode {
    pub const ROOT: &'static str = "root";

    pub fn is_root(&self) -> bool { self.node_type == Self::ROOT }

    pub fn total_bytes(&self) -> f64 { kib_to_bytes(self.total_kb) }
    pub fn used_bytes(&self)  -> f64 { kib_to_bytes(self.used_kb) }
    pub fn avail_bytes(&self) -> f64 { kib_to_bytes(self.avail_kb) }
}

fn kib_to_bytes(kb: u64) -> f64 { kb as f64 * 1024.0 }
