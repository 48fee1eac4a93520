//! The local user profile.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Who is reviewing the conflicts. Persisted with the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Display name. Never empty.
    pub name: String,
    /// Contact address; may be empty.
    pub email: String,
    /// Free-form role, e.g. "Reviewer".
    pub role: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Guest".to_string(),
            email: String::new(),
            role: "Reviewer".to_string(),
        }
    }
}

impl UserProfile {
    /// Builds a profile, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyField` when the name is blank.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        role: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let profile = Self {
            name: name.into().trim().to_string(),
            email: email.into().trim().to_string(),
            role: role.into().trim().to_string(),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Checks the profile invariants.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyField` when the name is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyField {
                field: "name".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        assert!(UserProfile::default().validate().is_ok());
    }

    #[test]
    fn test_new_trims_fields() {
        let p = UserProfile::new("  Ada ", " ada@example.com", "Editor ").unwrap();
        assert_eq!(p.name, "Ada");
        assert_eq!(p.email, "ada@example.com");
        assert_eq!(p.role, "Editor");
    }

    #[test]
    fn test_blank_name_rejected() {
        let err = UserProfile::new("   ", "", "").unwrap_err();
        assert!(matches!(err, ValidationError::EmptyField { ref field } if field == "name"));
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let p: UserProfile = serde_json::from_str(r#"{"name":"Lin"}"#).unwrap();
        assert_eq!(p.name, "Lin");
        assert_eq!(p.role, "Reviewer");
    }
}
