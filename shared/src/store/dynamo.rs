use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    error::DisplayErrorContext,
    operation::{
        put_item::PutItemError, transact_write_items::TransactWriteItemsError,
        update_item::UpdateItemError,
    },
    types::{AttributeValue, Put, ReturnValue, TransactWriteItem, Update},
    Client,
};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde_dynamo::{from_item, from_items, to_attribute_value, to_item};

use super::{AccountStore, InvitationStore};
use crate::config::TableNames;
use crate::error::StoreError;
use crate::models::{Invitation, InvitationStatus, Organization, User};

pub const TOKEN_INDEX: &str = "token-index";
pub const ORGANIZATION_INDEX: &str = "organization-index";

type Item = HashMap<String, AttributeValue>;

/// DynamoDB-backed store for the `invitations`, `users` and
/// `organizations` tables.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
    tables: TableNames,
}

fn database_error(operation: &str, err: impl std::error::Error) -> StoreError {
    let message = format!("{} failed: {}", operation, DisplayErrorContext(&err));
    error!("{}", message);
    StoreError::Database(message)
}

fn id_key(id: &str) -> AttributeValue {
    AttributeValue::S(id.to_string())
}

impl DynamoStore {
    pub async fn new(tables: TableNames) -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        info!(
            "Creating DynamoStore for tables {}, {}, {}",
            tables.invitations, tables.users, tables.organizations
        );
        Self::with_client(Client::new(&config), tables)
    }

    pub fn with_client(client: Client, tables: TableNames) -> Self {
        Self { client, tables }
    }

    async fn get_by_id<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<T, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(table)
            .key("id", id_key(id))
            .send()
            .await
            .map_err(|e| database_error("GetItem", e))?;

        match output.item {
            Some(item) => Ok(from_item(item)?),
            None => Err(StoreError::NotFound(format!("{} {}", table, id))),
        }
    }
}

#[async_trait]
impl InvitationStore for DynamoStore {
    async fn create_invitation(&self, invitation: Invitation) -> Result<Invitation, StoreError> {
        let item: Item = to_item(&invitation)?;
        let result = self
            .client
            .put_item()
            .table_name(&self.tables.invitations)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!("Stored invitation {}", invitation.id);
                Ok(invitation)
            }
            Err(err) => match err.into_service_error() {
                PutItemError::ConditionalCheckFailedException(_) => Err(StoreError::Conflict(
                    format!("invitation {} already exists", invitation.id),
                )),
                other => Err(database_error("PutItem", other)),
            },
        }
    }

    async fn get_invitation(&self, id: &str) -> Result<Invitation, StoreError> {
        self.get_by_id(&self.tables.invitations, id).await
    }

    async fn get_invitation_by_token(&self, token: &str) -> Result<Invitation, StoreError> {
        let output = self
            .client
            .query()
            .table_name(&self.tables.invitations)
            .index_name(TOKEN_INDEX)
            .key_condition_expression("#token = :token")
            .expression_attribute_names("#token", "token")
            .expression_attribute_values(":token", AttributeValue::S(token.to_string()))
            .send()
            .await
            .map_err(|e| database_error("Query", e))?;

        let item = output
            .items
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound("invitation for token".to_string()))?;
        Ok(from_item(item)?)
    }

    async fn get_invitations_by_organization(
        &self,
        organization_id: &str,
    ) -> Result<Vec<Invitation>, StoreError> {
        let mut invitations = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.tables.invitations)
                .index_name(ORGANIZATION_INDEX)
                .key_condition_expression("organization_id = :organization_id")
                .expression_attribute_values(
                    ":organization_id",
                    AttributeValue::S(organization_id.to_string()),
                )
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| database_error("Query", e))?;

            let page: Vec<Invitation> = from_items(output.items.unwrap_or_default())?;
            invitations.extend(page);

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!(
            "Loaded {} invitations for organization {}",
            invitations.len(),
            organization_id
        );
        Ok(invitations)
    }

    async fn revoke_invitation(
        &self,
        id: &str,
        revoked_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError> {
        let now: AttributeValue = to_attribute_value(revoked_at)?;
        let result = self
            .client
            .update_item()
            .table_name(&self.tables.invitations)
            .key("id", id_key(id))
            .update_expression("SET #status = :revoked, updated_at = :now")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":revoked",
                AttributeValue::S(InvitationStatus::Revoked.as_str().to_string()),
            )
            .expression_attribute_values(":now", now)
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => match output.attributes {
                Some(item) => Ok(from_item(item)?),
                None => Err(StoreError::Database(
                    "UpdateItem returned no attributes".to_string(),
                )),
            },
            Err(err) => match err.into_service_error() {
                UpdateItemError::ConditionalCheckFailedException(_) => {
                    Err(StoreError::NotFound(format!("invitation {}", id)))
                }
                other => Err(database_error("UpdateItem", other)),
            },
        }
    }

    async fn accept_invitation(
        &self,
        invitation: &Invitation,
        user: User,
        accepted_at: DateTime<Utc>,
    ) -> Result<Invitation, StoreError> {
        let invitation_id = invitation.id.as_str();
        let user_item: Item = to_item(&user)?;
        let now: AttributeValue = to_attribute_value(accepted_at)?;

        let put_user = Put::builder()
            .table_name(&self.tables.users)
            .set_item(Some(user_item))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(|e| database_error("Put builder", e))?;

        let accept = Update::builder()
            .table_name(&self.tables.invitations)
            .key("id", id_key(invitation_id))
            .update_expression("SET #status = :accepted, accepted_at = :now, updated_at = :now")
            .condition_expression("#status = :pending")
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(
                ":accepted",
                AttributeValue::S(InvitationStatus::Accepted.as_str().to_string()),
            )
            .expression_attribute_values(
                ":pending",
                AttributeValue::S(InvitationStatus::Pending.as_str().to_string()),
            )
            .expression_attribute_values(":now", now)
            .build()
            .map_err(|e| database_error("Update builder", e))?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(put_user).build())
            .transact_items(TransactWriteItem::builder().update(accept).build())
            .send()
            .await;

        if let Err(err) = result {
            return match err.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(cancelled) => {
                    warn!(
                        "Acceptance of invitation {} cancelled: {:?}",
                        invitation_id,
                        cancelled.cancellation_reasons()
                    );
                    Err(StoreError::Conflict(format!(
                        "invitation {} is no longer pending or user {} exists",
                        invitation_id, user.id
                    )))
                }
                other => Err(database_error("TransactWriteItems", other)),
            };
        }

        info!(
            "Invitation {} accepted, user {} created",
            invitation_id, user.id
        );
        let mut accepted = invitation.clone();
        accepted.mark_accepted(accepted_at);
        Ok(accepted)
    }
}

#[async_trait]
impl AccountStore for DynamoStore {
    async fn create_organization_with_admin(
        &self,
        organization: Organization,
        admin: User,
    ) -> Result<(Organization, User), StoreError> {
        let put_organization = Put::builder()
            .table_name(&self.tables.organizations)
            .set_item(Some(to_item(&organization)?))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(|e| database_error("Put builder", e))?;

        let put_admin = Put::builder()
            .table_name(&self.tables.users)
            .set_item(Some(to_item(&admin)?))
            .condition_expression("attribute_not_exists(id)")
            .build()
            .map_err(|e| database_error("Put builder", e))?;

        let result = self
            .client
            .transact_write_items()
            .transact_items(TransactWriteItem::builder().put(put_organization).build())
            .transact_items(TransactWriteItem::builder().put(put_admin).build())
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(
                    "Organization {} created with admin {}",
                    organization.id, admin.id
                );
                Ok((organization, admin))
            }
            Err(err) => match err.into_service_error() {
                TransactWriteItemsError::TransactionCanceledException(_) => {
                    Err(StoreError::Conflict(format!(
                        "organization {} or user {} already exists",
                        organization.id, admin.id
                    )))
                }
                other => Err(database_error("TransactWriteItems", other)),
            },
        }
    }

    async fn get_organization(&self, id: &str) -> Result<Organization, StoreError> {
        self.get_by_id(&self.tables.organizations, id).await
    }

    async fn get_user(&self, id: &str) -> Result<User, StoreError> {
        self.get_by_id(&self.tables.users, id).await
    }
}
