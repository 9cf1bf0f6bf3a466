//! Connection identifier.

use std::fmt;

/// Opaque identity of one live connection: the key in the
/// [`super::Hub`] registry and the `conn_id` log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Creates a random id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_distinct_registry_keys() {
        let ids: HashSet<ConnectionId> = (0..64).map(|_| ConnectionId::new()).collect();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn displays_as_hyphenated_uuid() {
        let s = ConnectionId::new().to_string();
        assert_eq!(s.len(), 36);
        assert_eq!(s.matches('-').count(), 4);
    }
}
