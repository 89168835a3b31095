use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::store::{date_format, Log, NewUser, User};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// One row of the user list. Logs are deliberately excluded from this
/// projection.
#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: i64,
    pub forename: String,
    pub surname: String,
    pub email: String,
    #[serde(with = "date_format")]
    pub date_of_birth: Option<Date>,
    pub active: bool,
}

impl From<User> for UserListItem {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            forename: user.forename,
            surname: user.surname,
            email: user.email,
            date_of_birth: user.date_of_birth,
            active: user.active,
        }
    }
}

/// Response body for the list endpoint: the resolved filter label plus the
/// projected rows.
#[derive(Debug, Serialize)]
pub struct UserList {
    pub active_filter: String,
    pub items: Vec<UserListItem>,
}

/// Display shape for a single user (view and delete-confirmation pages).
#[derive(Debug, Serialize)]
pub struct UserDetails {
    pub id: i64,
    pub forename: String,
    pub surname: String,
    pub email: String,
    #[serde(with = "date_format")]
    pub date_of_birth: Option<Date>,
    pub active: bool,
}

impl From<User> for UserDetails {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            forename: user.forename,
            surname: user.surname,
            email: user.email,
            date_of_birth: user.date_of_birth,
            active: user.active,
        }
    }
}

/// Create/edit form body. Serialized back to the client unchanged when a
/// submission fails validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserForm {
    #[serde(default)]
    pub forename: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, with = "date_format")]
    pub date_of_birth: Option<Date>,
    #[serde(default)]
    pub active: bool,
}

impl UserForm {
    /// Required forename and surname, required well-formed email. Returns
    /// one error per failing field, empty when the form is valid.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.forename.trim().is_empty() {
            errors.push(FieldError::new("forename", "First name is required."));
        }
        if self.surname.trim().is_empty() {
            errors.push(FieldError::new("surname", "Last name is required."));
        }
        if self.email.trim().is_empty() {
            errors.push(FieldError::new("email", "Email is required."));
        } else if !is_valid_email(self.email.trim()) {
            errors.push(FieldError::new("email", "Email is not a valid email address."));
        }
        errors
    }

    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            forename: self.forename.trim().to_string(),
            surname: self.surname.trim().to_string(),
            email: self.email.trim().to_string(),
            date_of_birth: self.date_of_birth,
            active: self.active,
        }
    }

    /// Overwrites the mutable fields of an existing user, leaving its id
    /// untouched.
    pub fn apply_to(&self, user: &mut User) {
        user.forename = self.forename.trim().to_string();
        user.surname = self.surname.trim().to_string();
        user.email = self.email.trim().to_string();
        user.date_of_birth = self.date_of_birth;
        user.active = self.active;
    }
}

impl From<&User> for UserForm {
    fn from(user: &User) -> Self {
        Self {
            forename: user.forename.clone(),
            surname: user.surname.clone(),
            email: user.email.clone(),
            date_of_birth: user.date_of_birth,
            active: user.active,
        }
    }
}

/// A single field validation failure. A form-level failure carries an
/// empty field name.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn form_level(message: &str) -> Self {
        Self::new("", message)
    }
}

/// Failed submission: the errors plus the echoed form so the client can
/// redisplay it.
#[derive(Debug, Serialize)]
pub struct FormErrors {
    pub errors: Vec<FieldError>,
    pub form: UserForm,
}

/// Body accompanying a redirect outcome.
#[derive(Debug, Serialize)]
pub struct Notice {
    pub success: bool,
    pub message: String,
}

/// Audit trail page for one user.
#[derive(Debug, Serialize)]
pub struct UserLogs {
    pub user_id: i64,
    pub user_name: String,
    pub logs: Vec<Log>,
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn valid_form_passes_validation() {
        let form = UserForm {
            forename: "New".to_string(),
            surname: "User".to_string(),
            email: "newuser@example.com".to_string(),
            date_of_birth: Some(date!(1990 - 01 - 01)),
            active: true,
        };
        assert!(form.validate().is_empty());
    }

    #[test]
    fn missing_fields_are_each_reported() {
        let form = UserForm::default();
        let errors = form.validate();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["forename", "surname", "email"]);
    }

    #[test]
    fn malformed_email_is_rejected() {
        let form = UserForm {
            forename: "New".to_string(),
            surname: "User".to_string(),
            email: "not-an-email".to_string(),
            date_of_birth: None,
            active: false,
        };
        let errors = form.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "email");
    }

    #[test]
    fn email_regex_accepts_common_shapes() {
        assert!(is_valid_email("a@b.co"));
        assert!(is_valid_email("first.last+tag@sub.example.com"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn apply_to_keeps_the_id() {
        let mut user = crate::store::User {
            id: 9,
            forename: "Old".to_string(),
            surname: "Name".to_string(),
            email: "old@example.com".to_string(),
            date_of_birth: None,
            active: false,
        };
        let form = UserForm {
            forename: "New".to_string(),
            surname: "Name".to_string(),
            email: "new@example.com".to_string(),
            date_of_birth: Some(date!(1985 - 06 - 15)),
            active: true,
        };
        form.apply_to(&mut user);
        assert_eq!(user.id, 9);
        assert_eq!(user.forename, "New");
        assert_eq!(user.email, "new@example.com");
        assert!(user.active);
    }

    #[test]
    fn form_deserializes_with_missing_optional_fields() {
        let form: UserForm = serde_json::from_str(r#"{"forename":"A"}"#).expect("deserialize");
        assert_eq!(form.forename, "A");
        assert!(form.surname.is_empty());
        assert!(form.date_of_birth.is_none());
        assert!(!form.active);
    }
}
