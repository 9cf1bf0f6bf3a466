//! Origin allow-list applied to WebSocket upgrades.

/// Decides which `Origin` header values may open a connection.
///
/// An absent or empty origin (same-origin pages, CLI tools) is always
/// allowed. Anything else must match an entry exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    /// Creates a policy from an explicit allow-list.
    #[must_use]
    pub fn new(allowed: Vec<String>) -> Self {
        Self { allowed }
    }

    /// Returns `true` if `origin` may upgrade.
    #[must_use]
    pub fn allows(&self, origin: Option<&str>) -> bool {
        match origin {
            None | Some("") => true,
            Some(origin) => self.allowed.iter().any(|a| a == origin),
        }
    }
}
