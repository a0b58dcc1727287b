use crate::policy::Caller;
use std::collections::HashMap;

/// Seam between the core and whatever establishes identity.
///
/// Production wires this to the session layer; tests and development use
/// `StaticProvider`. Keeping identity behind a trait means the core never
/// grows a "pick a role" shortcut of its own.
pub trait IdentityProvider: Send + Sync {
    /// Resolve an opaque credential (session token, header value) to a
    /// caller, or `None` if it does not identify anyone.
    fn resolve(&self, credential: &str) -> Option<Caller>;
}

/// Fixed credential table.
#[derive(Debug, Default)]
pub struct StaticProvider {
    callers: HashMap<String, Caller>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caller(mut self, credential: impl Into<String>, caller: Caller) -> Self {
        self.callers.insert(credential.into(), caller);
        self
    }
}

impl IdentityProvider for StaticProvider {
    fn resolve(&self, credential: &str) -> Option<Caller> {
        self.callers.get(credential).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use uuid::Uuid;

    #[test]
    fn resolves_known_credentials_only() {
        let caller = Caller::new(Uuid::new_v4(), Role::Doctor, Some(Uuid::new_v4()));
        let provider = StaticProvider::new().with_caller("token-1", caller.clone());

        assert_eq!(provider.resolve("token-1"), Some(caller));
        assert_eq!(provider.resolve("token-2"), None);
    }
}
