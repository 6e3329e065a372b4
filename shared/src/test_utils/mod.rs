//! In-memory collaborators and helpers for handler tests.

pub mod dynamo_test_utils;
pub mod http_test_utils;
pub mod mock_identity;
pub mod mock_store;
pub mod test_logging;

use crate::config::{AppConfig, IdentityConfig, TableNames};
use mock_identity::TEST_JWT_SECRET;

pub const TEST_APP_BASE_URL: &str = "https://app.fundboard.test";

/// Configuration the handler tests run with. No prefix, default expiry.
pub fn test_config() -> AppConfig {
    AppConfig {
        tables: TableNames {
            invitations: "invitations-test".to_string(),
            users: "users-test".to_string(),
            organizations: "organizations-test".to_string(),
        },
        identity: IdentityConfig {
            url: "http://127.0.0.1:9".to_string(),
            anon_key: "test-anon-key".to_string(),
            service_role_key: Some("test-service-key".to_string()),
            jwt_secret: TEST_JWT_SECRET.to_string(),
        },
        app_base_url: TEST_APP_BASE_URL.to_string(),
        invitation_expiry_days: crate::models::DEFAULT_EXPIRY_DAYS,
        route_prefix: String::new(),
        port: None,
    }
}
