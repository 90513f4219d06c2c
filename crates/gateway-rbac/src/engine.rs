//! RBAC-with-resource-roles engine (C5).
//!
//! In-memory policy/model evaluation, loaded from a Casbin-style CSV
//! policy file (`p, role, object, action` / `g, user, role` /
//! `g2, object, class`) without depending on the `casbin` crate itself
//! — the policy shape needed here (subject-object-action plus a single
//! level of resource-role grouping) is small and fully specified, so
//! it is evaluated directly.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{RbacError, Result};

pub type Subject = String;
pub type Role = String;
pub type Object = String;
pub type Action = String;
pub type ObjectClass = String;

/// The `"Admin"` role name, checked by [`RbacEngine::is_admin`].
pub const ADMIN_ROLE: &str = "Admin";

#[derive(Debug, Default)]
pub struct RbacEngine {
    policies: HashSet<(Role, Object, Action)>,
    assignments: HashMap<Subject, HashSet<Role>>,
    resource_roles: HashMap<Object, ObjectClass>,
}

impl RbacEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy file in the three-record CSV shape described above.
    /// Blank lines and lines starting with `#` are skipped. Malformed
    /// rows are skipped and logged rather than aborting the whole load
    /// — matching the "invalid config yields an empty/partial client
    /// list, not a fatal error" rule applied to the RBAC policy too.
    pub fn load_from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RbacError::PolicyFile(e.to_string()))?;
        Ok(Self::load_from_str(&raw))
    }

    pub fn load_from_str(raw: &str) -> Self {
        let mut engine = Self::new();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(raw.as_bytes());

        for record in reader.records().flatten() {
            let fields: Vec<&str> = record.iter().collect();
            match fields.as_slice() {
                ["p", role, object, action] => {
                    engine.policies.insert((role.to_string(), object.to_string(), action.to_string()));
                }
                ["g", user, role] => {
                    engine.assignments.entry(user.to_string()).or_default().insert(role.to_string());
                }
                ["g2", object, class] => {
                    engine.resource_roles.insert(object.to_string(), class.to_string());
                }
                _ => {
                    tracing::warn!(row = ?fields, "skipping malformed RBAC policy row");
                }
            }
        }
        engine
    }

    /// `(role, object, action)` is authorized directly, or via the
    /// object's resource-role class (`(role, class, action)`).
    pub fn authorize(&self, subject: &str, object: &str, action: &str) -> bool {
        let roles = self.roles_of(subject);
        for role in &roles {
            if self.policies.contains(&(role.clone(), object.to_string(), action.to_string())) {
                return true;
            }
            if let Some(class) = self.resource_roles.get(object) {
                if self.policies.contains(&(role.clone(), class.clone(), action.to_string())) {
                    return true;
                }
            }
        }
        false
    }

    pub fn is_admin(&self, subject: &str) -> bool {
        self.roles_of(subject).contains(ADMIN_ROLE)
    }

    pub fn roles_of(&self, subject: &str) -> HashSet<Role> {
        self.assignments.get(subject).cloned().unwrap_or_default()
    }

    pub fn users_in_role(&self, role: &str) -> HashSet<Subject> {
        self.assignments
            .iter()
            .filter(|(_, roles)| roles.contains(role))
            .map(|(user, _)| user.clone())
            .collect()
    }

    pub fn add_role(&mut self, subject: &str, role: &str) {
        self.assignments.entry(subject.to_string()).or_default().insert(role.to_string());
    }

    pub fn remove_role(&mut self, subject: &str, role: &str) {
        if let Some(roles) = self.assignments.get_mut(subject) {
            roles.remove(role);
        }
    }

    /// Any user assigned to at least one role is considered "existing",
    /// matching the original's `check_user_exists` (which scans every
    /// role's membership rather than a dedicated user table).
    pub fn user_exists(&self, subject: &str) -> bool {
        self.assignments.get(subject).is_some_and(|roles| !roles.is_empty())
    }

    /// Refuses to remove the last admin. The guard is evaluated against
    /// the *target* subject, not the caller.
    pub fn delete_user(&mut self, subject: &str) -> Result<()> {
        if self.is_admin(subject) && self.users_in_role(ADMIN_ROLE).len() == 1 {
            return Err(RbacError::LastAdmin(subject.to_string()));
        }
        self.assignments.remove(subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_policy() -> &'static str {
        "p, Admin, *, *\n\
         p, PlantOperator, BoilerTemperature, increase\n\
         g, alice, Admin\n\
         g, bob, PlantOperator\n\
         g2, BoilerTemperature, ProcessParameter\n\
         p, Admin, ProcessParameter, reconfigure\n"
    }

    #[test]
    fn authorize_resolves_resource_role_class() {
        let engine = RbacEngine::load_from_str(sample_policy());
        assert!(engine.authorize("bob", "BoilerTemperature", "increase"));
        assert!(engine.authorize("alice", "BoilerTemperature", "reconfigure"));
        assert!(!engine.authorize("bob", "BoilerTemperature", "reconfigure"));
    }

    #[test]
    fn is_admin_checks_the_admin_role() {
        let engine = RbacEngine::load_from_str(sample_policy());
        assert!(engine.is_admin("alice"));
        assert!(!engine.is_admin("bob"));
    }

    #[test]
    fn authorize_is_a_pure_function_of_the_policy() {
        let engine = RbacEngine::load_from_str(sample_policy());
        let first = engine.authorize("bob", "BoilerTemperature", "increase");
        let second = engine.authorize("bob", "BoilerTemperature", "increase");
        assert_eq!(first, second);
    }

    #[test]
    fn delete_user_refuses_to_remove_the_last_admin() {
        let mut engine = RbacEngine::load_from_str(sample_policy());
        assert!(matches!(engine.delete_user("alice"), Err(RbacError::LastAdmin(_))));
        assert!(engine.is_admin("alice"));
    }

    #[test]
    fn delete_user_allows_removing_a_non_last_admin() {
        let mut engine = RbacEngine::load_from_str(sample_policy());
        engine.add_role("carol", "Admin");
        assert!(engine.delete_user("alice").is_ok());
        assert!(!engine.user_exists("alice"));
    }

    #[test]
    fn user_exists_requires_at_least_one_role() {
        let engine = RbacEngine::load_from_str(sample_policy());
        assert!(engine.user_exists("bob"));
        assert!(!engine.user_exists("horst"));
    }
}
