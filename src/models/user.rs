// src/models/user.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login identity.
    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub full_name: String,
    pub qualification: Option<String>,
    pub dob: Option<NaiveDate>,

    /// Inactive users cannot log in and receive no mail.
    pub active: bool,
}

/// A user together with the names of the roles they hold.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithRoles {
    #[serde(flatten)]
    pub user: User,
    pub roles: Vec<String>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(length(max = 100))]
    pub qualification: Option<String>,
    pub dob: Option<NaiveDate>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Query for `GET /api/get-profile`.
#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    pub email: String,
}

/// DTO for a user editing their own profile. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(max = 100))]
    pub qualification: Option<String>,
    pub dob: Option<NaiveDate>,
}

impl UpdateProfileRequest {
    pub fn apply(self, user: &mut User) {
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
        if let Some(qualification) = self.qualification {
            user.qualification = Some(qualification);
        }
        if let Some(dob) = self.dob {
            user.dob = Some(dob);
        }
    }
}

/// DTO for an admin updating any user. Absent fields are unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: Option<String>,
    #[validate(length(max = 100))]
    pub qualification: Option<String>,
    pub dob: Option<NaiveDate>,
    pub active: Option<bool>,
}

impl AdminUpdateUserRequest {
    pub fn apply(self, user: &mut User) {
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
        if let Some(qualification) = self.qualification {
            user.qualification = Some(qualification);
        }
        if let Some(dob) = self.dob {
            user.dob = Some(dob);
        }
        if let Some(active) = self.active {
            user.active = active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> User {
        User {
            id: 2,
            email: "user@example.com".into(),
            password: "hash".into(),
            full_name: "General User".into(),
            qualification: Some("Standard".into()),
            dob: NaiveDate::from_ymd_opt(2002, 5, 10),
            active: true,
        }
    }

    #[test]
    fn profile_update_keeps_unspecified_fields() {
        let mut user = sample();
        UpdateProfileRequest {
            full_name: Some("Renamed".into()),
            ..Default::default()
        }
        .apply(&mut user);

        assert_eq!(user.full_name, "Renamed");
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.qualification.as_deref(), Some("Standard"));
    }

    #[test]
    fn admin_can_deactivate() {
        let mut user = sample();
        AdminUpdateUserRequest {
            active: Some(false),
            ..Default::default()
        }
        .apply(&mut user);
        assert!(!user.active);
        assert_eq!(user.full_name, "General User");
    }

    #[test]
    fn password_never_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("password").is_none());
    }
}
