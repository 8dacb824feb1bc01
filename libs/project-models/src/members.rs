//! Project members

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Credentials and role of a single project member
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub password: String,

    /// Opaque role string, passed through untouched
    pub permission: String,
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("password", &"[REDACTED]")
            .field("permission", &self.permission)
            .finish()
    }
}

/// Members keyed by account identifier.
///
/// A sorted map so that serialization is stable across runs.
pub type Members = BTreeMap<String, Member>;

/// Default members used when none are supplied on the command line
pub const DEFAULT_MEMBERS: &str = r#"{"test@test.com":{"password":"test", "permission":"creator"}}"#;

/// Parse a members mapping.
///
/// Single quotes are normalized to double quotes first, so both
/// `{'a':{'password':'p','permission':'r'}}` and the strict JSON form are
/// accepted.
pub fn parse_members(raw: &str) -> Result<Members, ModelError> {
    let normalized = raw.replace('\'', "\"");
    serde_json::from_str(&normalized).map_err(|e| ModelError::InvalidMembers(e.to_string()))
}

/// Serialize members as compact JSON with no insignificant whitespace
pub fn members_to_compact_json(members: &Members) -> String {
    // Map of plain strings, serialization cannot fail
    serde_json::to_string(members).unwrap_or_else(|_| "{}".to_string())
}

/// Check that members survive a round trip through the shell-quoted command
pub(crate) fn validate_members(members: &Members) -> Result<(), ModelError> {
    for (account, member) in members {
        if account.is_empty() {
            return Err(ModelError::InvalidMembers("empty account identifier".to_string()));
        }
        for value in [account, &member.password, &member.permission] {
            if value.contains('\'') {
                return Err(ModelError::InvalidMembers(format!(
                    "single quote not allowed in member {}",
                    account
                )));
            }
        }
    }
    Ok(())
}
