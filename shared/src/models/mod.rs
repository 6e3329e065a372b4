mod invitation;
mod organization;
mod role;
mod user;

pub use invitation::{
    generate_invitation_token, Invitation, InvitationState, InvitationStatus,
    DEFAULT_EXPIRY_DAYS, MAX_EXPIRY_DAYS, TOKEN_BYTES,
};
pub use organization::Organization;
pub use role::{Role, UnknownRole};
pub use user::User;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to milliseconds, the precision the stores keep.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
