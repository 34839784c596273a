//! Pluggable scheduling algorithms (§4.C). Exactly one is active
//! cluster-wide per node; switching is atomic at a scheduling boundary.

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Algorithm {
    RoundRobin,
    Priority,
    FairShare,
    RealTime,
    LoadBalancing,
    Adaptive,
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Priority
    }
}
