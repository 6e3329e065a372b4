use chrono::Duration;
use email_address::EmailAddress;
use fundboard_shared::error::{AppError, Result};
use fundboard_shared::i18n::MessageKey;
use fundboard_shared::models::{Invitation, InvitationState, Role, MAX_EXPIRY_DAYS};
use serde::{Deserialize, Serialize};

/// Absent and blank strings are both "missing".
fn required(value: &Option<String>) -> Result<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::bad_request(MessageKey::MissingParameters))
}

fn valid_email(email: &str) -> Result<()> {
    if EmailAddress::is_valid(email) {
        Ok(())
    } else {
        Err(AppError::bad_request(MessageKey::InvalidEmail))
    }
}

// Request DTOs
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub email: Option<String>,
    pub role: Option<String>,
    pub organization_id: Option<String>,
    pub invited_by_user_id: Option<String>,
    pub expires_in_days: Option<i64>,
}

/// A create request that passed validation.
#[derive(Debug)]
pub struct NewInvitation {
    pub email: String,
    pub role: Role,
    pub organization_id: String,
    pub invited_by_user_id: String,
    pub expires_in: Duration,
}

impl CreateInvitationRequest {
    /// `default_days` applies when `expiresInDays` is absent or 0.
    pub fn validate(self, default_days: i64) -> Result<NewInvitation> {
        let email = required(&self.email)?;
        let role = required(&self.role)?;
        let organization_id = required(&self.organization_id)?;
        let invited_by_user_id = required(&self.invited_by_user_id)?;

        valid_email(email)?;
        let role: Role = role
            .parse()
            .map_err(|_| AppError::bad_request(MessageKey::InvalidRole))?;

        let days = match self.expires_in_days {
            None | Some(0) => default_days,
            Some(days) if (1..=MAX_EXPIRY_DAYS).contains(&days) => days,
            Some(_) => return Err(AppError::bad_request(MessageKey::InvalidExpiry)),
        };

        Ok(NewInvitation {
            email: email.to_string(),
            role,
            organization_id: organization_id.to_string(),
            invited_by_user_id: invited_by_user_id.to_string(),
            expires_in: Duration::days(days),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcceptInvitationRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug)]
pub struct Acceptance {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl AcceptInvitationRequest {
    pub fn validate(self) -> Result<Acceptance> {
        let email = required(&self.email)?;
        // Passwords are taken verbatim, only emptiness is checked here.
        let password = self
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::bad_request(MessageKey::MissingParameters))?;
        let first_name = required(&self.first_name)?;
        let last_name = required(&self.last_name)?;

        valid_email(email)?;

        Ok(Acceptance {
            email: email.to_string(),
            password: password.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct RevokeInvitationRequest {
    pub id: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RevokeTarget {
    Id(String),
    Token(String),
}

impl RevokeInvitationRequest {
    /// Exactly one of `id` and `token` must be given.
    pub fn target(self) -> Result<RevokeTarget> {
        let present = |v: Option<String>| {
            v.map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        match (present(self.id), present(self.token)) {
            (Some(id), None) => Ok(RevokeTarget::Id(id)),
            (None, Some(token)) => Ok(RevokeTarget::Token(token)),
            _ => Err(AppError::bad_request(MessageKey::RevokeTargetRequired)),
        }
    }
}

// Response DTOs
#[derive(Serialize, Debug)]
pub struct CreateInvitationResponse {
    pub invitation: Invitation,
    pub link: String,
}

#[derive(Serialize, Debug)]
pub struct InvitationStatusResponse {
    pub valid: bool,
    pub reason: Option<InvitationState>,
    pub invitation: Option<Invitation>,
}

#[derive(Serialize, Debug)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Invitation as listed on the team screen, with its state at read time.
#[derive(Serialize, Debug)]
pub struct InvitationSummary {
    #[serde(flatten)]
    pub invitation: Invitation,
    pub state: InvitationState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(expires_in_days: Option<i64>) -> CreateInvitationRequest {
        CreateInvitationRequest {
            email: Some("new@acme.org".into()),
            role: Some("treasurer".into()),
            organization_id: Some("org-1".into()),
            invited_by_user_id: Some("admin-1".into()),
            expires_in_days,
        }
    }

    #[test]
    fn create_request_applies_expiry_bounds() {
        let expiry = |days: Option<i64>| {
            create(days).validate(7).unwrap().expires_in
        };

        assert_eq!(expiry(None), Duration::days(7));
        assert_eq!(expiry(Some(0)), Duration::days(7));
        assert_eq!(expiry(Some(1)), Duration::days(1));
        assert_eq!(expiry(Some(365)), Duration::days(365));
        assert_eq!(
            create(Some(366)).validate(7).unwrap_err().key,
            Some(MessageKey::InvalidExpiry)
        );
        assert_eq!(
            create(Some(-2)).validate(7).unwrap_err().key,
            Some(MessageKey::InvalidExpiry)
        );
    }

    #[test]
    fn create_request_parses_role_and_rejects_blank_fields() {
        let ok = create(None).validate(7).unwrap();
        assert_eq!(ok.role, Role::Treasurer);

        let mut blank = create(None);
        blank.organization_id = Some("   ".into());
        assert_eq!(
            blank.validate(7).unwrap_err().key,
            Some(MessageKey::MissingParameters)
        );

        let mut bad_role = create(None);
        bad_role.role = Some("OWNER".into());
        assert_eq!(
            bad_role.validate(7).unwrap_err().key,
            Some(MessageKey::InvalidRole)
        );

        let mut bad_email = create(None);
        bad_email.email = Some("not-an-email".into());
        assert_eq!(
            bad_email.validate(7).unwrap_err().key,
            Some(MessageKey::InvalidEmail)
        );
    }

    #[test]
    fn revoke_needs_exactly_one_target() {
        let target = |id: Option<&str>, token: Option<&str>| {
            RevokeInvitationRequest {
                id: id.map(str::to_string),
                token: token.map(str::to_string),
            }
            .target()
        };

        assert_eq!(
            target(Some("inv-1"), None).unwrap(),
            RevokeTarget::Id("inv-1".into())
        );
        assert_eq!(
            target(None, Some("abc")).unwrap(),
            RevokeTarget::Token("abc".into())
        );
        assert!(target(None, None).is_err());
        assert!(target(Some(""), None).is_err());
        assert!(target(Some("inv-1"), Some("abc")).is_err());
    }
}
