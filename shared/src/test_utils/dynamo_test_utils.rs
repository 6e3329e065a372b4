use std::env;

use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{
    config::{Credentials, Region},
    types::{
        AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
        Projection, ProjectionType, ScalarAttributeType,
    },
    Client,
};
use log::{debug, info};

use crate::config::TableNames;
use crate::store::dynamo::{ORGANIZATION_INDEX, TOKEN_INDEX};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handler tests run against DynamoDB local when `USE_DYNAMODB=true`.
pub fn use_dynamodb() -> bool {
    env::var("USE_DYNAMODB")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Client for DynamoDB local, `DYNAMODB_ENDPOINT` or `http://localhost:8000`.
pub async fn create_dynamo_client() -> Client {
    let endpoint =
        env::var("DYNAMODB_ENDPOINT").unwrap_or_else(|_| "http://localhost:8000".to_string());
    info!("Connecting to DynamoDB local at {}", endpoint);

    let config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .endpoint_url(endpoint)
        .credentials_provider(Credentials::new("test", "test", None, None, "test"))
        .load()
        .await;
    Client::new(&config)
}

fn string_attribute(name: &str) -> Result<AttributeDefinition, BoxError> {
    Ok(AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()?)
}

fn hash_key(name: &str) -> Result<KeySchemaElement, BoxError> {
    Ok(KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(KeyType::Hash)
        .build()?)
}

fn index(name: &str, attribute: &str) -> Result<GlobalSecondaryIndex, BoxError> {
    Ok(GlobalSecondaryIndex::builder()
        .index_name(name)
        .key_schema(hash_key(attribute)?)
        .projection(
            Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
        )
        .build()?)
}

/// Creates an `id`-keyed table, with the invitation GSIs when asked to.
pub async fn create_table(
    client: &Client,
    table_name: &str,
    with_invitation_indexes: bool,
) -> Result<(), BoxError> {
    let mut request = client
        .create_table()
        .table_name(table_name)
        .billing_mode(BillingMode::PayPerRequest)
        .key_schema(hash_key("id")?)
        .attribute_definitions(string_attribute("id")?);

    if with_invitation_indexes {
        request = request
            .attribute_definitions(string_attribute("token")?)
            .attribute_definitions(string_attribute("organization_id")?)
            .global_secondary_indexes(index(TOKEN_INDEX, "token")?)
            .global_secondary_indexes(index(ORGANIZATION_INDEX, "organization_id")?);
    }

    request.send().await?;
    debug!("Created table {}", table_name);
    Ok(())
}

/// Creates the three tables, tolerating ones that already exist.
pub async fn create_tables(client: &Client, tables: &TableNames) -> Result<(), BoxError> {
    for (name, indexed) in [
        (&tables.invitations, true),
        (&tables.users, false),
        (&tables.organizations, false),
    ] {
        if let Err(e) = create_table(client, name, indexed).await {
            let message = format!("{:?}", e);
            if !message.contains("ResourceInUseException") {
                return Err(e);
            }
            debug!("Table {} already exists", name);
        }
    }
    Ok(())
}
