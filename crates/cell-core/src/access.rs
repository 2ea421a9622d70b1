//! # Access Rules
//!
//! Pure evaluation of tenant access rules. The `auth/permissions` cell loads
//! the tenant's active rules for a resource and hands them to [`evaluate`].
//!
//! ## Evaluation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  rules ──► filter: resource == r                                        │
//! │                    action == a  OR  action == "*"                       │
//! │                    subject: any | user == userId | role == role         │
//! │        ──► pick:   highest priority                                     │
//! │                    tie → deny beats allow                               │
//! │                    tie → lowest id                                      │
//! │        ──► none matched → deny                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::validation::{self, ValidationResult};

/// Action value that matches every action on a resource.
pub const ANY_ACTION: &str = "*";

/// Whether a matching rule grants or refuses access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
pub enum RuleEffect {
    Allow,
    Deny,
}

/// Who a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
pub enum SubjectType {
    /// A single user, named by `subject_id`.
    User,
    /// Everyone holding the role named by `subject_id`.
    Role,
    /// Every caller.
    Any,
}

/// The caller a permission check is made for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub user_id: String,
    pub role: Option<String>,
}

/// One access rule, as evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRule {
    pub id: String,
    pub resource: String,
    pub action: String,
    pub subject_type: SubjectType,
    pub subject_id: Option<String>,
    pub effect: RuleEffect,
    pub priority: i64,
}

impl AccessRule {
    /// Returns true if this rule applies to the request.
    pub fn matches(&self, resource: &str, action: &str, subject: &Subject) -> bool {
        if self.resource != resource {
            return false;
        }

        if self.action != ANY_ACTION && self.action != action {
            return false;
        }

        match self.subject_type {
            SubjectType::Any => true,
            SubjectType::User => self.subject_id.as_deref() == Some(subject.user_id.as_str()),
            SubjectType::Role => match (&self.subject_id, &subject.role) {
                (Some(rule_role), Some(role)) => rule_role == role,
                _ => false,
            },
        }
    }

    /// Precedence among matching rules; greater wins.
    fn precedence(&self) -> (i64, bool, Reverse<&str>) {
        (
            self.priority,
            self.effect == RuleEffect::Deny,
            Reverse(self.id.as_str()),
        )
    }
}

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Decision {
    pub allowed: bool,
    /// The rule that decided; absent when nothing matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub rule_id: Option<String>,
}

impl Decision {
    /// The decision when no rule matched.
    pub fn default_deny() -> Self {
        Decision {
            allowed: false,
            rule_id: None,
        }
    }
}

/// Evaluates rules for a request. Inactive rules must already be filtered out.
///
/// ## Example
/// ```rust
/// use cell_core::access::{evaluate, AccessRule, RuleEffect, Subject, SubjectType};
///
/// let rules = vec![AccessRule {
///     id: "r1".into(),
///     resource: "b2b_groups".into(),
///     action: "*".into(),
///     subject_type: SubjectType::Role,
///     subject_id: Some("admin".into()),
///     effect: RuleEffect::Allow,
///     priority: 10,
/// }];
/// let admin = Subject { user_id: "u1".into(), role: Some("admin".into()) };
///
/// assert!(evaluate(&rules, "b2b_groups", "create", &admin).allowed);
/// ```
pub fn evaluate(rules: &[AccessRule], resource: &str, action: &str, subject: &Subject) -> Decision {
    rules
        .iter()
        .filter(|rule| rule.matches(resource, action, subject))
        .max_by(|a, b| a.precedence().cmp(&b.precedence()))
        .map(|rule| Decision {
            allowed: rule.effect == RuleEffect::Allow,
            rule_id: Some(rule.id.clone()),
        })
        .unwrap_or_else(Decision::default_deny)
}

/// Validates the fields of a new access rule.
///
/// ## Rules
/// - `resource` non-blank, at most 64 characters
/// - `action` is `*` or a valid action name
/// - `subjectId` present unless the subject type is `any`
pub fn validate_rule(
    resource: &str,
    action: &str,
    subject_type: SubjectType,
    subject_id: Option<&str>,
) -> ValidationResult<()> {
    validation::validate_name("resource", resource, 64)?;

    if action != ANY_ACTION {
        validation::validate_action_name(action)?;
    }

    let has_subject = subject_id.map_or(false, |s| !s.trim().is_empty());
    if subject_type != SubjectType::Any && !has_subject {
        return Err(ValidationError::required("subjectId"));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
