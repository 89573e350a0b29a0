//! Role-based authorization.

use crate::auth::identity::Identity;

/// Roles a route accepts. Holding any one of them is enough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRequirement {
    allowed_roles: Vec<String>,
}

impl RoleRequirement {
    /// A requirement any authenticated identity satisfies.
    pub fn any() -> Self {
        Self::default()
    }

    /// Parse a comma-separated role list such as `"admin, auditor"`.
    ///
    /// Entries are trimmed and empty entries dropped, so `""` and `" , "`
    /// both mean "no role required".
    pub fn parse(roles: &str) -> Self {
        let mut allowed_roles: Vec<String> = Vec::new();
        for role in roles.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            if !allowed_roles.iter().any(|r| r == role) {
                allowed_roles.push(role.to_string());
            }
        }
        Self { allowed_roles }
    }

    pub fn allowed_roles(&self) -> &[String] {
        &self.allowed_roles
    }

    pub fn is_empty(&self) -> bool {
        self.allowed_roles.is_empty()
    }

    /// True when no role is required or the identity holds an allowed role.
    pub fn is_satisfied_by(&self, identity: &Identity) -> bool {
        self.allowed_roles.is_empty()
            || self
                .allowed_roles
                .iter()
                .any(|role| identity.is_in_role(role))
    }
}

/// Decide whether `identity` may invoke a route guarded by `requirement`.
///
/// Authentication is checked separately; this only matches roles.
pub fn is_authorized(identity: &Identity, requirement: &RoleRequirement) -> bool {
    requirement.is_satisfied_by(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::Claim;

    fn identity_with_roles(roles: &[&str]) -> Identity {
        let claims = roles.iter().map(|r| Claim::new("roles", *r)).collect();
        Identity::new("Bearer", claims, &["roles".to_string()])
    }

    #[test]
    fn test_parse_trims_and_drops_empty_entries() {
        let requirement = RoleRequirement::parse(" admin ,, auditor , ");

        assert_eq!(requirement.allowed_roles(), &["admin", "auditor"]);
    }

    #[test]
    fn test_parse_empty_means_any() {
        assert!(RoleRequirement::parse("").is_empty());
        assert!(RoleRequirement::parse(" , ,").is_empty());
        assert_eq!(RoleRequirement::parse(""), RoleRequirement::any());
    }

    #[test]
    fn test_parse_deduplicates() {
        let requirement = RoleRequirement::parse("admin,admin");

        assert_eq!(requirement.allowed_roles().len(), 1);
    }

    #[test]
    fn test_empty_requirement_allows_any_identity() {
        assert!(is_authorized(&identity_with_roles(&[]), &RoleRequirement::any()));
        assert!(is_authorized(&Identity::anonymous(), &RoleRequirement::any()));
    }

    #[test]
    fn test_single_role_required() {
        let requirement = RoleRequirement::parse("admin");

        assert!(!is_authorized(&identity_with_roles(&["user"]), &requirement));
        assert!(is_authorized(
            &identity_with_roles(&["user", "admin"]),
            &requirement
        ));
    }

    #[test]
    fn test_any_of_several_roles_is_enough() {
        let requirement = RoleRequirement::parse("admin,auditor");

        assert!(is_authorized(&identity_with_roles(&["auditor"]), &requirement));
        assert!(!is_authorized(&identity_with_roles(&["user"]), &requirement));
    }

    #[test]
    fn test_role_match_is_case_sensitive() {
        let requirement = RoleRequirement::parse("Admin");

        assert!(!is_authorized(&identity_with_roles(&["admin"]), &requirement));
    }

    #[test]
    fn test_identity_without_roles_is_denied() {
        let requirement = RoleRequirement::parse("admin");

        assert!(!is_authorized(&identity_with_roles(&[]), &requirement));
    }
}
