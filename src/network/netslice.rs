//! Ordered list of networks, as written in `Address` and `AllowedIPs` values
use crate::error::{Error, Result};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// The null IPv4 network 0.0.0.0/0
pub fn ipv4_zero_net() -> IpNet {
    IpNet::V4(Ipv4Net::default())
}

/// The null IPv6 network ::/0
pub fn ipv6_zero_net() -> IpNet {
    IpNet::V6(Ipv6Net::default())
}

/// Parse a single "address/prefix" value, keeping the host part of the address
pub fn parse_network(value: &str) -> Result<IpNet> {
    let value = value.trim();
    value.parse::<IpNet>().map_err(|source| Error::InvalidNetwork {
        value: value.to_string(),
        source,
    })
}

/// Same prefix, different address (both of the same family)
fn with_addr(net: &IpNet, addr: IpAddr) -> Option<IpNet> {
    IpNet::new(addr, net.prefix_len()).ok()
}

/// An ordered sequence of (address, prefix length) pairs, possibly
/// mixing address families
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetSlice(Vec<IpNet>);

impl NetSlice {
    pub fn new() -> Self {
        NetSlice(Vec::new())
    }

    /// Build a slice from a list of "address/prefix" strings.
    /// An empty list is an error.
    pub fn from_strings<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::EmptyNetworks);
        }
        values
            .iter()
            .map(|v| parse_network(v.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(NetSlice)
    }

    pub fn append(&mut self, net: IpNet) {
        self.0.push(net);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IpNet> {
        self.0.iter()
    }

    /// Host addresses of every element, in order
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.0.iter().map(|n| n.addr())
    }

    /// Narrow every element to a single host (/32 or /128)
    pub fn to_host_routes(&self) -> NetSlice {
        NetSlice(self.0.iter().map(|n| IpNet::from(n.addr())).collect())
    }

    /// Add one to the lowest-order byte of every address.
    ///
    /// Legacy sequential provisioning only: there is no carry, so the call fails
    /// if any element already ends with 255. The slice is left untouched on error.
    pub fn increment(&mut self) -> Result<()> {
        let mut next = Vec::with_capacity(self.0.len());
        for net in &self.0 {
            let addr = match net.addr() {
                IpAddr::V4(a) => {
                    let mut octets = a.octets();
                    octets[3] = octets[3]
                        .checked_add(1)
                        .ok_or_else(|| Error::IncrementLimit(net.to_string()))?;
                    IpAddr::from(octets)
                }
                IpAddr::V6(a) => {
                    let mut octets = a.octets();
                    octets[15] = octets[15]
                        .checked_add(1)
                        .ok_or_else(|| Error::IncrementLimit(net.to_string()))?;
                    IpAddr::from(octets)
                }
            };
            let bumped = with_addr(net, addr).ok_or_else(|| Error::IncrementLimit(net.to_string()))?;
            next.push(bumped);
        }
        self.0 = next;
        Ok(())
    }
}

impl FromStr for NetSlice {
    type Err = Error;

    /// Parse "addr/prefix, addr/prefix, ..."
    fn from_str(s: &str) -> Result<Self> {
        s.split(',')
            .map(parse_network)
            .collect::<Result<Vec<_>>>()
            .map(NetSlice)
    }
}

impl fmt::Display for NetSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, net) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", net)?;
        }
        Ok(())
    }
}

impl From<Vec<IpNet>> for NetSlice {
    fn from(nets: Vec<IpNet>) -> Self {
        NetSlice(nets)
    }
}

impl<'a> IntoIterator for &'a NetSlice {
    type Item = &'a IpNet;
    type IntoIter = std::slice::Iter<'a, IpNet>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_render() {
        let text = " 192.168.0.1/24, fe80::/64";
        let slice: NetSlice = text.parse().unwrap();
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.to_string(), text.trim());

        let again: NetSlice = slice.to_string().parse().unwrap();
        assert_eq!(again, slice);
    }

    #[test]
    fn test_append() {
        let mut slice = NetSlice::new();
        assert!(slice.is_empty());
        slice.append("127.0.0.1/32".parse().unwrap());
        assert_eq!(slice.len(), 1);
        assert_eq!(slice.to_string(), "127.0.0.1/32");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["192.168.256.0/24", "192.168.1.0/33", "192.168.256.0.1", "192.168.0.-1", ""] {
            assert!(bad.parse::<NetSlice>().is_err(), "{} should not parse", bad);
        }
        assert!(matches!(
            "10.10.10.10/34, fa50:cafe::/32".parse::<NetSlice>(),
            Err(Error::InvalidNetwork { .. })
        ));
    }

    #[test]
    fn test_from_strings() {
        let slice = NetSlice::from_strings(&["10.0.0.1/24", "fd00::1/64"]).unwrap();
        assert_eq!(slice.to_string(), "10.0.0.1/24, fd00::1/64");
        let empty: [&str; 0] = [];
        assert!(matches!(NetSlice::from_strings(&empty), Err(Error::EmptyNetworks)));
    }

    #[test]
    fn test_copy_is_independent() {
        let original: NetSlice = "10.0.0.1/24".parse().unwrap();
        let mut copy = original.clone();
        copy.increment().unwrap();
        assert_eq!(original.to_string(), "10.0.0.1/24");
        assert_eq!(copy.to_string(), "10.0.0.2/24");
    }

    #[test]
    fn test_increment_limit_leaves_slice_untouched() {
        let mut slice: NetSlice = "10.0.0.4/24, 10.0.1.255/24".parse().unwrap();
        assert!(matches!(slice.increment(), Err(Error::IncrementLimit(_))));
        assert_eq!(slice.to_string(), "10.0.0.4/24, 10.0.1.255/24");

        let mut v6: NetSlice = "fd00::fe/64".parse().unwrap();
        v6.increment().unwrap();
        assert_eq!(v6.to_string(), "fd00::ff/64");
        assert!(v6.increment().is_err());
    }

    #[test]
    fn test_host_routes() {
        let slice: NetSlice = "10.0.10.2/24, fd00::2/64".parse().unwrap();
        assert_eq!(slice.to_host_routes().to_string(), "10.0.10.2/32, fd00::2/128");
    }

    #[test]
    fn test_zero_nets() {
        assert_eq!(ipv4_zero_net().to_string(), "0.0.0.0/0");
        assert_eq!(ipv6_zero_net().to_string(), "::/0");
    }
}
