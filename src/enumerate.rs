//! Candidate generation. Pure and lazy: no I/O, never fails, and iterating twice
//! over the same inputs yields the same candidates.
use crate::netdetect::NetworkRange;
use crate::types::{Endpoint, HttpCandidate, Payload, Target};

/// Every (network, host index, port) combination as a [`Target`].
pub fn targets<'a>(
    ranges: &'a [NetworkRange],
    ports: &'a [u16],
) -> impl Iterator<Item = Target> + Clone + 'a {
    ranges.iter().flat_map(move |range| {
        range
            .addresses()
            .flat_map(move |host| ports.iter().map(move |&port| Target::new(host, port)))
    })
}

/// Number of targets [`targets`] will yield, without enumerating them.
pub fn target_count(ranges: &[NetworkRange], ports: &[u16]) -> u64 {
    ranges
        .iter()
        .map(NetworkRange::host_count)
        .sum::<u64>()
        * ports.len() as u64
}

/// Pair one endpoint with each payload.
pub fn payload_candidates<'a>(
    endpoint: &'a Endpoint,
    payloads: &'a [Payload],
) -> impl Iterator<Item = HttpCandidate> + Clone + 'a {
    payloads.iter().map(move |payload| HttpCandidate {
        endpoint: endpoint.clone(),
        payload: payload.clone(),
    })
}
