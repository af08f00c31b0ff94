//! Address canonicalization.
//!
//! Rewrites one address token into descriptive text so that equivalent
//! notations (`10.0.10.0/24`, `10.0.10.0-10.0.10.255`) share vocabulary once
//! embedded. The output is only lexical; no overlap between ranges is ever
//! computed here.

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;

static RANGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+\.\d+\.\d+\.\d+)-(\d+\.\d+\.\d+\.\d+)$").expect("range pattern is valid")
});

/// Canonical text for a host, CIDR block or dashed range.
///
/// Total: tokens that cannot be parsed come back unchanged (CIDR) or with
/// only the lexical range wording (dashed range).
#[must_use]
pub fn canonicalize(token: &str) -> String {
    let token = token.trim();

    if let Some(caps) = RANGE_RE.captures(token) {
        let (start, end) = (&caps[1], &caps[2]);
        let mut text = format!("range {start} to {end}");
        if let Some((network, prefix)) = single_subnet(start, end) {
            text.push_str(&format!(" subnet {network}/{prefix}"));
        }
        return text;
    }

    if token.contains('/') {
        return match parse_cidr(token) {
            Some((network, broadcast)) => {
                format!("subnet {token} range {network} to {broadcast}")
            }
            None => token.to_string(),
        };
    }

    format!("host {token}")
}

/// The one subnet exactly covering `start..=end`, if there is one.
fn single_subnet(start: &str, end: &str) -> Option<(Ipv4Addr, u8)> {
    let first: Ipv4Addr = start.parse().ok()?;
    let last: Ipv4Addr = end.parse().ok()?;
    let networks = summarize_range(u32::from(first), u32::from(last));
    match networks.as_slice() {
        [single] => Some(*single),
        _ => None,
    }
}

/// Smallest list of CIDR blocks covering `first..=last` exactly. Empty when
/// `first > last`.
pub(crate) fn summarize_range(first: u32, last: u32) -> Vec<(Ipv4Addr, u8)> {
    let mut blocks = Vec::new();
    let last = u64::from(last);
    let mut current = u64::from(first);
    while current <= last {
        let alignment = if current == 0 {
            32
        } else {
            current.trailing_zeros()
        };
        let span = last - current + 1;
        let fits = 63 - span.leading_zeros();
        let host_bits = alignment.min(fits);
        #[allow(clippy::cast_possible_truncation)]
        blocks.push((Ipv4Addr::from(current as u32), (32 - host_bits) as u8));
        current += 1u64 << host_bits;
    }
    blocks
}

/// Network and broadcast address of a CIDR token. Host bits may be set
/// (`10.0.0.7/24` is read as `10.0.0.0/24`). The mask may be a prefix
/// length, a netmask or a hostmask.
fn parse_cidr(token: &str) -> Option<(Ipv4Addr, Ipv4Addr)> {
    let (addr, mask) = token.split_once('/')?;
    let addr: Ipv4Addr = addr.parse().ok()?;
    let mask = parse_mask(mask)?;
    let network = u32::from(addr) & mask;
    let broadcast = network | !mask;
    Some((Ipv4Addr::from(network), Ipv4Addr::from(broadcast)))
}

fn parse_mask(raw: &str) -> Option<u32> {
    if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
        let prefix: u32 = raw.parse().ok()?;
        return match prefix {
            0 => Some(0),
            1..=32 => Some(u32::MAX << (32 - prefix)),
            _ => None,
        };
    }

    let mask = u32::from(raw.parse::<Ipv4Addr>().ok()?);
    if is_contiguous_netmask(mask) {
        Some(mask)
    } else if is_contiguous_netmask(!mask) {
        Some(!mask)
    } else {
        None
    }
}

const fn is_contiguous_netmask(mask: u32) -> bool {
    mask.leading_ones() + mask.trailing_zeros() == 32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn cidr_lists_subnet_and_bounds() {
        let text = canonicalize("10.0.10.0/24");
        assert_eq!(text, "subnet 10.0.10.0/24 range 10.0.10.0 to 10.0.10.255");
        assert!(text.contains("subnet 10.0.10.0/24"));
        assert!(text.contains("10.0.10.0 to 10.0.10.255"));
    }

    #[test]
    fn aligned_range_names_its_subnet() {
        let text = canonicalize("10.0.10.0-10.0.10.255");
        assert_eq!(text, "range 10.0.10.0 to 10.0.10.255 subnet 10.0.10.0/24");
    }

    #[test]
    fn both_notations_share_vocabulary() {
        let cidr = canonicalize("10.0.10.0/24");
        let range = canonicalize("10.0.10.0-10.0.10.255");
        for fragment in ["subnet 10.0.10.0/24", "10.0.10.0 to 10.0.10.255"] {
            assert!(cidr.contains(fragment), "{cidr}");
            assert!(range.contains(fragment), "{range}");
        }
    }

    #[test]
    fn unaligned_range_has_no_subnet() {
        assert_eq!(
            canonicalize("10.0.30.1-10.0.30.50"),
            "range 10.0.30.1 to 10.0.30.50"
        );
    }

    #[test]
    fn inverted_or_invalid_range_keeps_range_wording() {
        assert_eq!(
            canonicalize("10.0.0.9-10.0.0.1"),
            "range 10.0.0.9 to 10.0.0.1"
        );
        assert_eq!(
            canonicalize("10.0.0.300-10.0.1.0"),
            "range 10.0.0.300 to 10.0.1.0"
        );
    }

    #[test]
    fn single_address_range_is_a_host_subnet() {
        assert_eq!(
            canonicalize("10.0.0.5-10.0.0.5"),
            "range 10.0.0.5 to 10.0.0.5 subnet 10.0.0.5/32"
        );
    }

    #[test]
    fn cidr_with_host_bits_uses_network_bounds() {
        assert_eq!(
            canonicalize("192.168.1.77/28"),
            "subnet 192.168.1.77/28 range 192.168.1.64 to 192.168.1.79"
        );
    }

    #[test]
    fn cidr_accepts_netmask_and_edge_prefixes() {
        assert_eq!(
            canonicalize("10.1.0.0/255.255.0.0"),
            "subnet 10.1.0.0/255.255.0.0 range 10.1.0.0 to 10.1.255.255"
        );
        assert_eq!(
            canonicalize("0.0.0.0/0"),
            "subnet 0.0.0.0/0 range 0.0.0.0 to 255.255.255.255"
        );
        assert_eq!(
            canonicalize("10.0.0.1/32"),
            "subnet 10.0.0.1/32 range 10.0.0.1 to 10.0.0.1"
        );
    }

    #[test]
    fn unparsable_cidr_falls_back_to_raw_token() {
        assert_eq!(canonicalize("10.0.0.0/33"), "10.0.0.0/33");
        assert_eq!(canonicalize("not-an-ip/24"), "not-an-ip/24");
        assert_eq!(canonicalize("10.0.0.0/+8"), "10.0.0.0/+8");
        assert_eq!(canonicalize("10.0.0.0/255.0.255.0"), "10.0.0.0/255.0.255.0");
    }

    #[test]
    fn plain_tokens_are_hosts() {
        assert_eq!(canonicalize(" 10.0.1.10 "), "host 10.0.1.10");
        assert_eq!(canonicalize("db.internal"), "host db.internal");
    }

    #[test]
    fn summarizes_unaligned_range_into_blocks() {
        let blocks = summarize_range(
            u32::from(Ipv4Addr::new(10, 0, 0, 1)),
            u32::from(Ipv4Addr::new(10, 0, 0, 6)),
        );
        let rendered: Vec<String> = blocks.iter().map(|(a, p)| format!("{a}/{p}")).collect();
        assert_eq!(
            rendered,
            vec!["10.0.0.1/32", "10.0.0.2/31", "10.0.0.4/31", "10.0.0.6/32"]
        );
        assert_eq!(
            summarize_range(0, u32::MAX),
            vec![(Ipv4Addr::new(0, 0, 0, 0), 0)]
        );
        assert!(summarize_range(5, 4).is_empty());
    }

    proptest! {
        #[test]
        fn proptest_cidr_and_expanded_range_overlap(raw in any::<u32>(), prefix in 0u32..=32) {
            let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
            let network = Ipv4Addr::from(raw & mask);
            let broadcast = Ipv4Addr::from((raw & mask) | !mask);

            let cidr = canonicalize(&format!("{network}/{prefix}"));
            let range = canonicalize(&format!("{network}-{broadcast}"));
            let subnet = format!("subnet {network}/{prefix}");
            let bounds = format!("{network} to {broadcast}");

            prop_assert!(cidr.contains(&subnet));
            prop_assert!(cidr.contains(&bounds));
            prop_assert!(range.contains(&subnet));
            prop_assert!(range.contains(&bounds));
        }

        #[test]
        fn proptest_summary_blocks_tile_the_range(a in any::<u32>(), b in any::<u32>()) {
            let (first, last) = if a <= b { (a, b) } else { (b, a) };
            let blocks = summarize_range(first, last);
            let mut expected = u64::from(first);
            for (start, prefix) in blocks {
                prop_assert_eq!(u64::from(u32::from(start)), expected);
                expected += 1u64 << (32 - u32::from(prefix));
            }
            prop_assert_eq!(expected, u64::from(last) + 1);
        }
    }
}
