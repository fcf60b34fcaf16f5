//! Entry key generation and handling.

/// Separator between the policy name and caller key in the rendered form.
pub const KEY_SEPARATOR: &str = "::";

/// A key that uniquely identifies one live bucket.
///
/// The key is composed of the policy name and the caller-supplied key. Both
/// parts are kept separately so that `("a::b", "c")` and `("a", "b::c")` stay
/// distinct even though they render to the same string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    /// The policy this entry belongs to
    pub policy: String,
    /// The caller key within the policy
    pub key: String,
}

impl EntryKey {
    /// Create a new entry key from a policy name and caller key.
    pub fn new(policy: &str, key: &str) -> Self {
        Self {
            policy: policy.to_string(),
            key: key.to_string(),
        }
    }

    /// Convert the entry key to its composite string representation.
    pub fn to_string_key(&self) -> String {
        format!("{}{}{}", self.policy, KEY_SEPARATOR, self.key)
    }
}

impl std::fmt::Display for EntryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_key_to_string() {
        let key = EntryKey::new("foo", "IP_0");
        assert_eq!(key.to_string_key(), "foo::IP_0");
        assert_eq!(key.to_string(), "foo::IP_0");
    }

    #[test]
    fn test_entry_key_uses_caller_key() {
        let first = EntryKey::new("foo", "IP_0");
        let second = EntryKey::new("foo", "IP_1");

        assert_ne!(first, second);
        assert_eq!(first, EntryKey::new("foo", "IP_0"));
    }

    #[test]
    fn test_entry_key_parts_do_not_alias() {
        let first = EntryKey::new("a::b", "c");
        let second = EntryKey::new("a", "b::c");

        assert_eq!(first.to_string_key(), second.to_string_key());
        assert_ne!(first, second);
    }
}
