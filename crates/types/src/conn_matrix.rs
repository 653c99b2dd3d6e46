//! Deterministic quorum connection schedule.
//!
//! Every quorum member derives, from nothing but its own position and the
//! quorum size, the set of positions it opens connections to (outgoing) and
//! the set it expects traffic from (incoming). All nodes must agree on the
//! schedule or relayed messages stop converging, so the functions here are
//! pure and must never change without a coordinated upgrade.
//!
//! The schedule is a ring: position `p` sends to `p + 1`, `p + 2`, and
//! `p + 4` (mod quorum size). That bounds fan-out at three while reaching
//! every member of a ten-member quorum within three hops, and it makes
//! incoming exactly the mirror of outgoing.

use std::collections::BTreeSet;

const RELAY_OFFSETS: [usize; 3] = [1, 2, 4];

fn ring_conns(position: i32, quorum_size: usize, forward: bool) -> Vec<usize> {
    if position < 0 || quorum_size < 2 || position as usize >= quorum_size {
        return Vec::new();
    }
    let p = position as usize;
    let mut targets = BTreeSet::new();
    for d in RELAY_OFFSETS {
        let d = d % quorum_size;
        let target = if forward {
            (p + d) % quorum_size
        } else {
            (p + quorum_size - d) % quorum_size
        };
        if target != p {
            targets.insert(target);
        }
    }
    targets.into_iter().collect()
}

/// Positions the member at `position` must open connections to.
///
/// A negative `position` means "not a member" and yields no connections.
pub fn quorum_outgoing_conns(position: i32, quorum_size: usize) -> Vec<usize> {
    ring_conns(position, quorum_size, true)
}

/// Positions the member at `position` should expect traffic from. These are
/// opportunistic: worth relaying to if a connection is already open.
pub fn quorum_incoming_conns(position: i32, quorum_size: usize) -> Vec<usize> {
    ring_conns(position, quorum_size, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_non_member_has_no_conns() {
        assert!(quorum_outgoing_conns(-1, 10).is_empty());
        assert!(quorum_incoming_conns(-1, 10).is_empty());
    }

    #[test]
    fn test_fan_out_bounded() {
        for n in 2..=10 {
            for p in 0..n {
                assert!(quorum_outgoing_conns(p as i32, n).len() <= 3);
            }
        }
    }

    #[test]
    fn test_incoming_mirrors_outgoing() {
        for n in 2..=10usize {
            for a in 0..n {
                for b in quorum_outgoing_conns(a as i32, n) {
                    let incoming = quorum_incoming_conns(b as i32, n);
                    assert!(
                        incoming.contains(&a),
                        "edge {a}->{b} in quorum of {n} not mirrored"
                    );
                }
            }
        }
    }

    #[test]
    fn test_every_member_reachable_within_three_hops() {
        for n in 2..=10usize {
            for start in 0..n {
                let mut reached: HashSet<usize> = HashSet::from([start]);
                let mut frontier = vec![start];
                for _ in 0..3 {
                    let mut next = Vec::new();
                    for p in frontier {
                        for t in quorum_outgoing_conns(p as i32, n) {
                            if reached.insert(t) {
                                next.push(t);
                            }
                        }
                    }
                    frontier = next;
                }
                assert_eq!(reached.len(), n, "from {start} in quorum of {n}");
            }
        }
    }

    #[test]
    fn test_no_self_edges() {
        for n in 2..=10 {
            for p in 0..n {
                assert!(!quorum_outgoing_conns(p as i32, n).contains(&p));
                assert!(!quorum_incoming_conns(p as i32, n).contains(&p));
            }
        }
    }
}
