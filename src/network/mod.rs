//! Network addresses: declared networks and address enumeration
pub mod address;
pub mod netslice;

pub use address::{is_allocatable, iterate, nth_address, Addresses};
pub use netslice::{ipv4_zero_net, ipv6_zero_net, parse_network, NetSlice};
