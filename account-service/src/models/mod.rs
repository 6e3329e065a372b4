use email_address::EmailAddress;
use fundboard_shared::error::{AppError, Result};
use fundboard_shared::i18n::MessageKey;
use fundboard_shared::models::User;
use fundboard_shared::permissions::{Action, Resource};
use serde::{Deserialize, Serialize};

fn required(value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(MessageKey::MissingParameters))
}

fn password(value: Option<String>) -> Result<String> {
    value
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::bad_request(MessageKey::MissingParameters))
}

// Request DTOs
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub organization_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug)]
pub struct Registration {
    pub organization_name: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration> {
        let registration = Registration {
            organization_name: required(self.organization_name)?,
            email: required(self.email)?,
            password: password(self.password)?,
            first_name: required(self.first_name)?,
            last_name: required(self.last_name)?,
        };
        if !EmailAddress::is_valid(&registration.email) {
            return Err(AppError::bad_request(MessageKey::InvalidEmail));
        }
        Ok(registration)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    pub fn validate(self) -> Result<(String, String)> {
        Ok((required(self.email)?, password(self.password)?))
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct AccessQuery {
    pub resource: Option<String>,
    pub action: Option<String>,
}

impl AccessQuery {
    pub fn parse(self) -> Result<(Resource, Action)> {
        let resource = required(self.resource)?;
        let action = required(self.action)?;
        match (resource.parse::<Resource>(), action.parse::<Action>()) {
            (Ok(resource), Ok(action)) => Ok((resource, action)),
            _ => Err(AppError::bad_request(MessageKey::InvalidResourceOrAction)),
        }
    }
}

// Response DTOs
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub organization_id: String,
    pub user_id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: User,
}

#[derive(Serialize, Debug)]
pub struct AccessResponse {
    pub allowed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_request_trims_names_but_not_password() {
        let registration = RegisterRequest {
            organization_name: Some("  Acme ".into()),
            email: Some("admin@acme.org".into()),
            password: Some(" secret123 ".into()),
            first_name: Some("A".into()),
            last_name: Some("B".into()),
        }
        .validate()
        .unwrap();

        assert_eq!(registration.organization_name, "Acme");
        assert_eq!(registration.password, " secret123 ");
    }

    #[test]
    fn access_query_rejects_unknown_names() {
        let query = |resource: &str, action: &str| AccessQuery {
            resource: Some(resource.into()),
            action: Some(action.into()),
        };

        assert_eq!(
            query("transactions", "read").parse().unwrap(),
            (Resource::Transactions, Action::Read)
        );
        assert_eq!(
            query("vault", "read").parse().unwrap_err().key,
            Some(MessageKey::InvalidResourceOrAction)
        );
        assert_eq!(
            AccessQuery::default().parse().unwrap_err().key,
            Some(MessageKey::MissingParameters)
        );
    }
}
