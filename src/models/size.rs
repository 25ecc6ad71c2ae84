use crate::util::human::scale_bytes;
use serde::Serialize;

/// A byte count plus its human-scaled rendering.
///
/// `set_bytes` keeps `value`/`unit` in step with `bytes`. `add_bytes` only
/// accumulates and leaves the rendering stale until `convert` is called, so
/// sums over many pools are scaled once at the end.
///
/// Negative and NaN counts are accepted and rendered as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Size {
    bytes: f64,
    value: String,
    unit:  String,
}

impl Size {
    pub fn from_bytes(bytes: f64) -> Self {
        let mut s = Size { bytes, value: String::new(), unit: String::new() };
        s.convert();
        s
    }

    pub fn bytes(&self) -> f64 { self.bytes }
    pub fn value(&self) -> &str { &self.value }
    pub fn unit(&self) -> &str { &self.unit }

    pub fn set_bytes(&mut self, bytes: f64) {
        self.bytes = bytes;
        self.convert();
    }

    pub fn add_bytes(&mut self, delta: f64) {
        self.bytes += delta;
    }

    /// Recompute `value`/`unit` from `bytes`.
    pub fn convert(&mut self) {
        let (value, unit) = scale_bytes(self.bytes);
        self.value = value;
        self.unit  = unit;
    }
}

impl Default for Size {
    fn default() -> Self { Size::from_bytes(0.0) }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

/// Capacity snapshot of one pool or zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stat {
    pub total:       Size,
    pub used:        Size,
    pub available:   Size,
    pub provisioned: Size,
    pub free:        Size,
}
