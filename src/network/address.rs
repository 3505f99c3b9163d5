//! Host address enumeration inside a network
//!
//! Addresses are treated as big-endian counters: the n-th address of a network
//! is its base address (host bits zeroed) plus n, carrying through byte
//! boundaries. Enumeration is lazy and stops as soon as the caller drops the
//! iterator.
use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

fn to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => u128::from(u32::from(a)),
        IpAddr::V6(a) => u128::from(a),
    }
}

fn from_u128(value: u128, v6: bool) -> IpAddr {
    if v6 {
        IpAddr::V6(Ipv6Addr::from(value))
    } else {
        // callers never exceed the network's broadcast address
        IpAddr::V4(Ipv4Addr::from(value as u32))
    }
}

/// Number of addresses in the network, or `None` when it does not fit in
/// a `u128` (only `::/0`)
pub fn address_count(net: &IpNet) -> Option<u128> {
    let host_bits = u32::from(net.max_prefix_len() - net.prefix_len());
    1u128.checked_shl(host_bits)
}

/// The `n`-th address of the network, starting at its base address
pub fn nth_address(net: &IpNet, n: u128) -> Option<IpAddr> {
    let base = to_u128(net.network());
    let last = to_u128(net.broadcast());
    let value = base.checked_add(n)?;
    (value <= last).then(|| from_u128(value, matches!(net, IpNet::V6(_))))
}

/// Whether an address may be handed out to a client.
///
/// Unspecified and multicast addresses are never allocatable, nor is the
/// network's own base address unless the network is a single host.
pub fn is_allocatable(net: &IpNet, addr: IpAddr) -> bool {
    if addr.is_unspecified() || addr.is_multicast() {
        return false;
    }
    net.prefix_len() == net.max_prefix_len() || addr != net.network()
}

/// Lazy iterator over every address of a network
#[derive(Debug, Clone)]
pub struct Addresses {
    next: Option<u128>,
    last: u128,
    v6: bool,
}

impl Iterator for Addresses {
    type Item = IpAddr;

    fn next(&mut self) -> Option<IpAddr> {
        let current = self.next?;
        self.next = if current < self.last {
            Some(current + 1)
        } else {
            None
        };
        Some(from_u128(current, self.v6))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            None => (0, Some(0)),
            Some(current) => match usize::try_from(self.last - current) {
                Ok(n) if n < usize::MAX => (n + 1, Some(n + 1)),
                _ => (usize::MAX, None),
            },
        }
    }
}

/// Enumerate every address of `net`, from its base address to its last one
pub fn iterate(net: &IpNet) -> Addresses {
    Addresses {
        next: Some(to_u128(net.network())),
        last: to_u128(net.broadcast()),
        v6: matches!(net, IpNet::V6(_)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> IpNet {
        s.parse().unwrap()
    }

    #[test]
    fn test_iterate_starts_at_base() {
        let addrs: Vec<IpAddr> = iterate(&net("10.0.0.7/30")).collect();
        let expected: Vec<IpAddr> = ["10.0.0.4", "10.0.0.5", "10.0.0.6", "10.0.0.7"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(addrs, expected);
    }

    #[test]
    fn test_iterate_carries_across_bytes() {
        let addrs: Vec<IpAddr> = iterate(&net("10.0.0.0/23")).skip(255).take(2).collect();
        assert_eq!(addrs[0], "10.0.0.255".parse::<IpAddr>().unwrap());
        assert_eq!(addrs[1], "10.0.1.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_iterate_length() {
        assert_eq!(iterate(&net("192.168.1.0/24")).count(), 256);
        assert_eq!(iterate(&net("192.168.1.9/32")).count(), 1);
        assert_eq!(iterate(&net("fd00::/120")).count(), 256);
        assert_eq!(address_count(&net("192.168.1.0/24")), Some(256));
        assert_eq!(address_count(&net("::/0")), None);
    }

    #[test]
    fn test_iterate_top_of_space() {
        let addrs: Vec<IpAddr> = iterate(&net("255.255.255.254/31")).collect();
        assert_eq!(addrs.len(), 2);
        assert_eq!(addrs[1], "255.255.255.255".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_huge_network_is_lazy() {
        let mut addrs = iterate(&net("fd00::/64"));
        assert_eq!(addrs.next(), Some("fd00::".parse().unwrap()));
        assert_eq!(addrs.next(), Some("fd00::1".parse().unwrap()));
    }

    #[test]
    fn test_nth_address() {
        let n = net("10.0.10.1/24");
        assert_eq!(nth_address(&n, 0), Some("10.0.10.0".parse().unwrap()));
        assert_eq!(nth_address(&n, 255), Some("10.0.10.255".parse().unwrap()));
        assert_eq!(nth_address(&n, 256), None);
    }

    #[test]
    fn test_is_allocatable() {
        let n = net("10.0.10.1/24");
        assert!(!is_allocatable(&n, "10.0.10.0".parse().unwrap()));
        assert!(is_allocatable(&n, "10.0.10.1".parse().unwrap()));
        assert!(!is_allocatable(&net("224.0.0.0/24"), "224.0.0.1".parse().unwrap()));
        assert!(!is_allocatable(&net("0.0.0.0/32"), "0.0.0.0".parse().unwrap()));
        assert!(is_allocatable(&net("10.1.1.1/32"), "10.1.1.1".parse().unwrap()));
    }
}
