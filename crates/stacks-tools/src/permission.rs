use crate::types::ToolCallRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Allow,
    Deny,
}

/// Gates tool execution. The default resolver always allows, matching a
/// registry with no permission policy configured.
pub trait PermissionResolver: Send + Sync {
    fn check(&self, call: &ToolCallRequest) -> Permission;
}

pub struct AllowAll;

impl PermissionResolver for AllowAll {
    fn check(&self, _call: &ToolCallRequest) -> Permission {
        Permission::Allow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    #[test]
    fn allow_all_allows_any_call() {
        let resolver = AllowAll;
        let call = ToolCallRequest {
            id: "1".into(),
            name: "anything".into(),
            arguments: IndexMap::new(),
        };
        assert_eq!(resolver.check(&call), Permission::Allow);
    }
}
