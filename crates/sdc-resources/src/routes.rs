// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Parsing of network route and resolver lists.

use std::collections::BTreeMap;

use crate::error::{ResourceError, Result};

/// Parse `dest:via` pairs separated by commas into a route map.
///
/// Empty input yields no routes. Any pair that does not split into a
/// non-empty destination and gateway fails the whole call.
pub fn parse_routes(input: &str) -> Result<BTreeMap<String, String>> {
    let mut routes = BTreeMap::new();
    if input.trim().is_empty() {
        return Ok(routes);
    }

    for pair in input.split(',') {
        let pair = pair.trim();
        let (dest, via) = pair
            .split_once(':')
            .ok_or_else(|| ResourceError::InvalidRoute(pair.to_string()))?;
        let (dest, via) = (dest.trim(), via.trim());
        if dest.is_empty() || via.is_empty() {
            return Err(ResourceError::InvalidRoute(pair.to_string()));
        }
        routes.insert(dest.to_string(), via.to_string());
    }

    Ok(routes)
}

/// Split a comma-separated list, dropping empty entries.
pub fn parse_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_routes() {
        let routes = parse_routes("a:b,c:d").unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes["a"], "b");
        assert_eq!(routes["c"], "d");
    }

    #[test]
    fn test_parse_cidr_routes_with_whitespace() {
        let routes = parse_routes(" 10.1.0.0/16 : 10.0.0.1 , 192.168.0.0/24:10.0.0.2 ").unwrap();
        assert_eq!(routes["10.1.0.0/16"], "10.0.0.1");
        assert_eq!(routes["192.168.0.0/24"], "10.0.0.2");
    }

    #[test]
    fn test_parse_empty_is_no_routes() {
        assert!(parse_routes("").unwrap().is_empty());
        assert!(parse_routes("   ").unwrap().is_empty());
    }

    #[test]
    fn test_pair_without_separator_fails() {
        let err = parse_routes("a:b,cd").unwrap_err();
        assert!(matches!(err, ResourceError::InvalidRoute(ref p) if p == "cd"));
    }

    #[test]
    fn test_pair_with_empty_side_fails() {
        assert!(parse_routes("a:").is_err());
        assert!(parse_routes(":b").is_err());
        assert!(parse_routes("a:b,").is_err());
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("8.8.8.8, 8.8.4.4"), vec!["8.8.8.8", "8.8.4.4"]);
        assert_eq!(parse_list("uuid-1"), vec!["uuid-1"]);
        assert!(parse_list("").is_empty());
        assert_eq!(parse_list("a,,b"), vec!["a", "b"]);
    }
}
