//! Human-readable names for sensor addresses.
//!
//! Lets output identify sensors as "Kitchen" or "Bedroom" instead of by address.

use crate::address::SensorAddress;
use std::collections::BTreeMap;

/// Sensor address to name mappings.
pub type AliasMap = BTreeMap<SensorAddress, String>;

/// A parsed alias mapping a sensor address to a name.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub address: SensorAddress,
    pub name: String,
}

/// Parse an alias from a string in the format "ADDRESS=NAME".
///
/// # Example
/// ```
/// use mijia_listener::alias::parse_alias;
///
/// let alias = parse_alias("A4:C1:38:0B:2E:01=Kitchen").unwrap();
/// assert_eq!(alias.address.to_string(), "A4:C1:38:0B:2E:01");
/// assert_eq!(alias.name, "Kitchen");
/// ```
pub fn parse_alias(src: &str) -> Result<Alias, String> {
    let (address, name) = src
        .split_once('=')
        .ok_or_else(|| "invalid alias: expected format ADDRESS=NAME".to_string())?;

    if name.trim().is_empty() {
        return Err(format!("invalid alias '{src}': name is empty"));
    }

    Ok(Alias {
        address: address.trim().parse().map_err(|e| format!("invalid alias: {e}"))?,
        name: name.to_string(),
    })
}

/// Collect aliases into a lookup map. Later entries win for repeated addresses.
pub fn to_map(aliases: &[Alias]) -> AliasMap {
    aliases
        .iter()
        .map(|a| (a.address, a.name.clone()))
        .collect()
}

/// The alias of `address`, or the address itself.
pub fn resolve_name(address: &SensorAddress, aliases: &AliasMap) -> String {
    aliases
        .get(address)
        .cloned()
        .unwrap_or_else(|| address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TEST_ADDRESS;

    #[test]
    fn test_parse_alias_valid() {
        let alias = parse_alias("aa:bb:cc:dd:ee:ff=Kitchen").unwrap();
        assert_eq!(alias.address, TEST_ADDRESS);
        assert_eq!(alias.name, "Kitchen");
    }

    #[test]
    fn test_parse_alias_keeps_spaces_in_name() {
        let alias = parse_alias("AA:BB:CC:DD:EE:FF=Living Room").unwrap();
        assert_eq!(alias.name, "Living Room");
    }

    #[test]
    fn test_parse_alias_invalid() {
        assert!(parse_alias("no-equals-sign").is_err());
        assert!(parse_alias("AA:BB:CC:DD:EE:FF=").is_err());
        let err = parse_alias("Kitchen=AA:BB:CC:DD:EE:FF").unwrap_err();
        assert!(err.starts_with("invalid alias: invalid address 'Kitchen'"));
    }

    #[test]
    fn test_to_map_and_resolve() {
        let other = SensorAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        let map = to_map(&[
            Alias {
                address: TEST_ADDRESS,
                name: "Kitchen".to_string(),
            },
            Alias {
                address: TEST_ADDRESS,
                name: "Sauna".to_string(),
            },
        ]);
        assert_eq!(resolve_name(&TEST_ADDRESS, &map), "Sauna");
        assert_eq!(resolve_name(&other, &map), "11:22:33:44:55:66");
    }
}
