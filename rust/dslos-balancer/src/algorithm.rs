/// Replica-selection strategy for a single service's pool (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancerAlgorithm {
    RoundRobin,
    LeastConnections,
    /// Rendezvous (highest-random-weight) hashing over `client_key`, so
    /// the chosen replica stays stable across membership changes instead
    /// of remapping every client when `N` changes, as a plain `mod N`
    /// scheme would.
    IpHash,
    /// Classic nginx smooth-weighted round-robin.
    WeightedRoundRobin,
    WeightedLeastConnections,
    Random,
}

impl Default for BalancerAlgorithm {
    fn default() -> Self {
        BalancerAlgorithm::RoundRobin
    }
}
