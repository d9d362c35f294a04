//! CIDR containment over a list snapshot.

use crate::list::AddressEntry;
use std::net::Ipv4Addr;

/// First entry, in snapshot order, whose block contains `address`.
pub fn find_containing(address: Ipv4Addr, entries: &[AddressEntry]) -> Option<&AddressEntry> {
    entries.iter().find(|entry| entry.subnet.contains(address))
}

/// Whether any entry's block contains `address`.
///
/// Entries are [`Cidr`](crate::list::Cidr) values, so malformed rows have
/// already been rejected when the backend decoded them.
pub fn contains_any(address: Ipv4Addr, entries: &[AddressEntry]) -> bool {
    find_containing(address, entries).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(nets: &[&str]) -> Vec<AddressEntry> {
        nets.iter()
            .enumerate()
            .map(|(id, net)| AddressEntry { subnet: net.parse().unwrap(), id: id as u64 })
            .collect()
    }

    #[test]
    fn empty_snapshot_matches_nothing() {
        assert!(!contains_any(Ipv4Addr::new(10, 0, 0, 1), &[]));
    }

    #[test]
    fn first_match_in_snapshot_order_wins() {
        let list = entries(&["172.16.0.0/12", "10.0.0.0/8", "10.1.0.0/16"]);
        let hit = find_containing(Ipv4Addr::new(10, 1, 2, 3), &list).unwrap();
        assert_eq!(hit.id, 1);
        assert!(contains_any(Ipv4Addr::new(172, 31, 255, 255), &list));
        assert!(!contains_any(Ipv4Addr::new(192, 168, 0, 1), &list));
    }

    #[test]
    fn order_does_not_change_the_answer() {
        let forward = entries(&["192.168.64.0/24", "10.0.0.0/8"]);
        let mut backward = forward.clone();
        backward.reverse();
        for addr in ["192.168.64.55", "10.200.0.1", "192.168.65.1"] {
            let addr: Ipv4Addr = addr.parse().unwrap();
            assert_eq!(contains_any(addr, &forward), contains_any(addr, &backward));
        }
    }
}
