//! Method naming policy.
//!
//! The service spells methods in `PascalCase` (`Player.GetActivePlayers`). Locally each method
//! is also reachable through a `camelCase` alias (`player.getActivePlayers`), and both spellings
//! refer to the same remote method.

/// The remote spelling of a bare method name: first character uppercased.
pub fn to_remote_name(bare: &str) -> String {
    map_first(bare, char::to_uppercase)
}

/// The local alias of a bare method name: first character lowercased.
pub fn to_local_alias(bare: &str) -> String {
    map_first(bare, char::to_lowercase)
}

/// Joins a namespace and a bare method name into a fully qualified name.
pub fn qualify(namespace: &str, bare: &str) -> String {
    format!("{namespace}.{bare}")
}

/// Index-like member names (`"0"`, `"42"`) never name a namespace or a method.
pub fn is_numeric_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit())
}

fn map_first<I>(name: &str, map: impl FnOnce(char) -> I) -> String
where
    I: Iterator<Item = char>,
{
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => map(first).chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_and_local_spellings() {
        assert_eq!(to_remote_name("getActivePlayers"), "GetActivePlayers");
        assert_eq!(to_remote_name("GetActivePlayers"), "GetActivePlayers");
        assert_eq!(to_local_alias("GetActivePlayers"), "getActivePlayers");
        assert_eq!(to_local_alias("echo"), "echo");
        assert_eq!(to_remote_name(""), "");
    }

    #[test]
    fn only_the_first_character_changes() {
        assert_eq!(to_remote_name("oNOFF"), "ONOFF");
        assert_eq!(to_local_alias("URLDecode"), "uRLDecode");
    }

    #[test]
    fn numeric_keys() {
        assert!(is_numeric_key("0"));
        assert!(is_numeric_key("123"));
        assert!(!is_numeric_key(""));
        assert!(!is_numeric_key("Player"));
        assert!(!is_numeric_key("1a"));
    }

    #[test]
    fn qualifies_names() {
        assert_eq!(qualify("Demo", "Echo"), "Demo.Echo");
    }
}
