//! DynamoDB implementation of [`DocumentStore`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, CreateGlobalSecondaryIndexAction, Delete,
    GlobalSecondaryIndex, GlobalSecondaryIndexUpdate, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ProvisionedThroughput, Put,
    ScalarAttributeType, TableDescription, TransactWriteItem,
};
use aws_sdk_dynamodb::Client;
use dynalinq_core::schema::{
    AttributeType, Capacity, GlobalIndex, GlobalIndexState, IndexStatus, KeyAttribute, KeySchema,
    TableDefinition, TableState, TableStatus, Throughput,
};
use dynalinq_core::store::{
    DocumentStore, GetRequest, QueryRequest, Result, ScanRequest, StoreError, WriteRequest,
};
use dynalinq_core::{Document, EntityKey};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::conversions::{document_to_item, item_to_document, key_to_item, Item};
use super::error::{map_cancellation, map_sdk_error};
use super::expressions::{and_all, Expressions};

/// Items per TransactWriteItems call.
pub const MAX_TRANSACTION_ITEMS: usize = 100;

const ACTIVE_POLL_ATTEMPTS: usize = 60;
const ACTIVE_POLL_DELAY: Duration = Duration::from_secs(2);

/// Document store backed by DynamoDB (or DynamoDB Local).
///
/// Key schemas are learned from `create_table` or `DescribeTable` and kept
/// for building primary keys of reads and writes.
#[derive(Clone)]
pub struct DynamoDbStore {
    client: Client,
    schemas: Arc<RwLock<HashMap<String, KeySchema>>>,
}

impl DynamoDbStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            schemas: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a store from an optional custom endpoint (DynamoDB Local) and
    /// a region.
    pub async fn connect(endpoint_url: Option<&str>, region: &str) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()));
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;
        info!(endpoint = ?endpoint_url, region, "DynamoDB client configured");
        Self::new(Client::new(&sdk_config))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn key_schema(&self, table: &str) -> Result<KeySchema> {
        if let Some(schema) = self.schemas.read().await.get(table) {
            return Ok(schema.clone());
        }
        let description = self.describe(table).await?.ok_or_else(|| {
            StoreError::TableNotFound(table.to_string())
        })?;
        let schema = key_schema_from(table, &description)?;
        self.schemas
            .write()
            .await
            .insert(table.to_string(), schema.clone());
        Ok(schema)
    }

    async fn describe(&self, table: &str) -> Result<Option<TableDescription>> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(response) => Ok(response.table),
            Err(err) => match map_sdk_error(err, table) {
                StoreError::TableNotFound(_) => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn wait_for_table_active(&self, table: &str) -> Result<()> {
        for _ in 0..ACTIVE_POLL_ATTEMPTS {
            if let Some(state) = self.describe_table(table).await? {
                let indexes_active = state
                    .global_indexes
                    .iter()
                    .all(|g| g.status == IndexStatus::Active);
                if state.status == TableStatus::Active && indexes_active {
                    return Ok(());
                }
            }
            debug!(table, "Waiting for table to become active");
            tokio::time::sleep(ACTIVE_POLL_DELAY).await;
        }
        Err(StoreError::OperationFailed(format!(
            "Timed out waiting for table {table} to become active"
        )))
    }
}

#[async_trait]
impl DocumentStore for DynamoDbStore {
    async fn describe_table(&self, table: &str) -> Result<Option<TableState>> {
        Ok(self.describe(table).await?.map(|d| table_state(&d)))
    }

    async fn create_table(&self, definition: &TableDefinition) -> Result<()> {
        let schema = &definition.key_schema;
        let throughput = table_throughput(schema);

        let mut request = self
            .client
            .create_table()
            .table_name(&definition.name)
            .set_key_schema(Some(key_elements(
                &schema.hash_key,
                schema.range_key.as_ref(),
            )?))
            .set_attribute_definitions(Some(attribute_definitions(&schema.key_attributes())?));

        request = match throughput {
            Some(throughput) => request
                .billing_mode(BillingMode::Provisioned)
                .provisioned_throughput(provisioned(throughput)?),
            None => request.billing_mode(BillingMode::PayPerRequest),
        };

        for local in &schema.local_indexes {
            request = request.local_secondary_indexes(
                LocalSecondaryIndex::builder()
                    .index_name(&local.name)
                    .set_key_schema(Some(key_elements(&schema.hash_key, Some(&local.range_key))?))
                    .projection(projection_all())
                    .build()
                    .map_err(build_error)?,
            );
        }

        for global in &schema.global_indexes {
            request = request.global_secondary_indexes(
                GlobalSecondaryIndex::builder()
                    .index_name(&global.name)
                    .set_key_schema(Some(key_elements(
                        &global.hash_key,
                        global.range_key.as_ref(),
                    )?))
                    .projection(projection_all())
                    .set_provisioned_throughput(
                        global
                            .capacity
                            .resolve()
                            .or(throughput)
                            .map(provisioned)
                            .transpose()?,
                    )
                    .build()
                    .map_err(build_error)?,
            );
        }

        request
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &definition.name))?;
        info!(table = %definition.name, "Table created");

        self.schemas
            .write()
            .await
            .insert(definition.name.clone(), schema.clone());
        self.wait_for_table_active(&definition.name).await
    }

    async fn add_global_index(&self, table: &str, index: &GlobalIndex) -> Result<()> {
        let mut keys = vec![&index.hash_key];
        keys.extend(index.range_key.iter());

        let mut action = CreateGlobalSecondaryIndexAction::builder()
            .index_name(&index.name)
            .set_key_schema(Some(key_elements(&index.hash_key, index.range_key.as_ref())?))
            .projection(projection_all());
        if let Some(throughput) = index.capacity.resolve() {
            action = action.provisioned_throughput(provisioned(throughput)?);
        }

        self.client
            .update_table()
            .table_name(table)
            .set_attribute_definitions(Some(attribute_definitions(&keys)?))
            .global_secondary_index_updates(
                GlobalSecondaryIndexUpdate::builder()
                    .create(action.build().map_err(build_error)?)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| map_sdk_error(e, table))?;
        info!(table, index = %index.name, "Global index added");

        if let Some(schema) = self.schemas.write().await.get_mut(table) {
            schema.global_indexes.push(index.clone());
        }
        self.wait_for_table_active(table).await
    }

    async fn get_item(&self, request: &GetRequest) -> Result<Option<Document>> {
        let schema = self.key_schema(&request.table).await?;
        let output = self
            .client
            .get_item()
            .table_name(&request.table)
            .set_key(Some(key_to_item(&schema, &request.key)?))
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, &request.table))?;
        output.item.as_ref().map(item_to_document).transpose()
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Document>> {
        let mut expressions = Expressions::new();
        let mut key_condition = expressions.condition(&request.hash_condition)?;
        if let Some(range) = &request.range_condition {
            key_condition = format!("{key_condition} AND {}", expressions.condition(range)?);
        }
        let filter = and_all([
            expressions.conditions(&request.filter)?,
            request
                .custom_filter
                .as_ref()
                .map(|f| expressions.filter(f))
                .transpose()?,
        ]);

        let mut documents = Vec::new();
        let mut remaining = request.options.limit;
        let mut start_key: Option<Item> = None;
        loop {
            let page = self
                .client
                .query()
                .table_name(&request.table)
                .set_index_name(request.index_name.clone())
                .key_condition_expression(&key_condition)
                .set_filter_expression(filter.clone())
                .set_expression_attribute_names(expressions.names())
                .set_expression_attribute_values(expressions.values())
                .scan_index_forward(request.scan_forward)
                .consistent_read(request.options.consistent_read)
                .set_limit(remaining.map(page_limit))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &request.table))?;

            for item in page.items.unwrap_or_default() {
                documents.push(item_to_document(&item)?);
            }
            if let Some(remaining) = remaining.as_mut() {
                *remaining = remaining.saturating_sub(page.scanned_count.max(0) as usize);
            }
            start_key = page.last_evaluated_key;
            if start_key.is_none() || remaining == Some(0) {
                break;
            }
        }

        debug!(
            table = %request.table,
            index = ?request.index_name,
            count = documents.len(),
            "DynamoDB query"
        );
        Ok(documents)
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Vec<Document>> {
        let mut expressions = Expressions::new();
        let filter = and_all([
            expressions.conditions(&request.filter)?,
            request
                .custom_filter
                .as_ref()
                .map(|f| expressions.filter(f))
                .transpose()?,
        ]);

        let mut documents = Vec::new();
        let mut remaining = request.options.limit;
        let mut start_key: Option<Item> = None;
        loop {
            let page = self
                .client
                .scan()
                .table_name(&request.table)
                .set_filter_expression(filter.clone())
                .set_expression_attribute_names(expressions.names())
                .set_expression_attribute_values(expressions.values())
                .consistent_read(request.options.consistent_read)
                .set_limit(remaining.map(page_limit))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, &request.table))?;

            for item in page.items.unwrap_or_default() {
                documents.push(item_to_document(&item)?);
            }
            if let Some(remaining) = remaining.as_mut() {
                *remaining = remaining.saturating_sub(page.scanned_count.max(0) as usize);
            }
            start_key = page.last_evaluated_key;
            if start_key.is_none() || remaining == Some(0) {
                break;
            }
        }

        debug!(table = %request.table, count = documents.len(), "DynamoDB scan");
        Ok(documents)
    }

    /// Each chunk of [`MAX_TRANSACTION_ITEMS`] is one transaction. A failing
    /// chunk leaves earlier chunks applied.
    async fn write_batch(&self, table: &str, requests: &[WriteRequest]) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        let schema = self.key_schema(table).await?;

        for chunk in requests.chunks(MAX_TRANSACTION_ITEMS) {
            let items = chunk
                .iter()
                .map(|r| transact_item(table, &schema, r))
                .collect::<Result<Vec<_>>>()?;
            let keys: Vec<EntityKey> = chunk.iter().map(|r| r.key().clone()).collect();

            let outcome = self
                .client
                .transact_write_items()
                .set_transact_items(Some(items))
                .send()
                .await;
            if let Err(err) = outcome {
                if let Some(TransactWriteItemsError::TransactionCanceledException(cancelled)) =
                    err.as_service_error()
                {
                    let reasons: Vec<_> = cancelled
                        .cancellation_reasons()
                        .iter()
                        .map(|r| (r.code(), r.message()))
                        .collect();
                    return Err(map_cancellation(table, &keys, &reasons));
                }
                return Err(map_sdk_error(err, table));
            }
            debug!(table, items = chunk.len(), "DynamoDB transaction committed");
        }
        Ok(())
    }
}

fn transact_item(
    table: &str,
    schema: &KeySchema,
    request: &WriteRequest,
) -> Result<TransactWriteItem> {
    let mut expressions = Expressions::new();
    let condition = expressions.write_condition(request.condition(), schema.hash_key_name());

    let item = match request {
        WriteRequest::Put { item, .. } => TransactWriteItem::builder().put(
            Put::builder()
                .table_name(table)
                .set_item(Some(document_to_item(item)))
                .set_condition_expression(condition)
                .set_expression_attribute_names(expressions.names())
                .set_expression_attribute_values(expressions.values())
                .build()
                .map_err(build_error)?,
        ),
        WriteRequest::Delete { key, .. } => TransactWriteItem::builder().delete(
            Delete::builder()
                .table_name(table)
                .set_key(Some(key_to_item(schema, key)?))
                .set_condition_expression(condition)
                .set_expression_attribute_names(expressions.names())
                .set_expression_attribute_values(expressions.values())
                .build()
                .map_err(build_error)?,
        ),
    };
    Ok(item.build())
}

fn build_error(err: impl std::fmt::Display) -> StoreError {
    StoreError::InvalidData(err.to_string())
}

fn page_limit(remaining: usize) -> i32 {
    i32::try_from(remaining).unwrap_or(i32::MAX)
}

fn projection_all() -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::All)
        .build()
}

fn key_elements(
    hash: &KeyAttribute,
    range: Option<&KeyAttribute>,
) -> Result<Vec<KeySchemaElement>> {
    let mut elements = vec![KeySchemaElement::builder()
        .attribute_name(&hash.name)
        .key_type(KeyType::Hash)
        .build()
        .map_err(build_error)?];
    if let Some(range) = range {
        elements.push(
            KeySchemaElement::builder()
                .attribute_name(&range.name)
                .key_type(KeyType::Range)
                .build()
                .map_err(build_error)?,
        );
    }
    Ok(elements)
}

/// One definition per distinct key attribute name.
fn attribute_definitions(attributes: &[&KeyAttribute]) -> Result<Vec<AttributeDefinition>> {
    let mut definitions: Vec<AttributeDefinition> = Vec::new();
    for attribute in attributes {
        if definitions
            .iter()
            .any(|d| d.attribute_name() == attribute.name)
        {
            continue;
        }
        definitions.push(
            AttributeDefinition::builder()
                .attribute_name(&attribute.name)
                .attribute_type(scalar_type(attribute.attribute_type))
                .build()
                .map_err(build_error)?,
        );
    }
    Ok(definitions)
}

fn scalar_type(attribute_type: AttributeType) -> ScalarAttributeType {
    match attribute_type {
        AttributeType::String => ScalarAttributeType::S,
        AttributeType::Number => ScalarAttributeType::N,
        AttributeType::Binary => ScalarAttributeType::B,
    }
}

fn provisioned(throughput: Throughput) -> Result<ProvisionedThroughput> {
    ProvisionedThroughput::builder()
        .read_capacity_units(i64::try_from(throughput.read).unwrap_or(i64::MAX))
        .write_capacity_units(i64::try_from(throughput.write).unwrap_or(i64::MAX))
        .build()
        .map_err(build_error)
}

/// Table-level throughput. A table is provisioned when any global index asks
/// for fixed capacity, sized to the largest such index; otherwise on-demand.
pub fn table_throughput(schema: &KeySchema) -> Option<Throughput> {
    schema
        .global_indexes
        .iter()
        .filter_map(|g| g.capacity.resolve())
        .reduce(|a, b| Throughput {
            read: a.read.max(b.read),
            write: a.write.max(b.write),
        })
}

fn table_state(description: &TableDescription) -> TableState {
    use aws_sdk_dynamodb::types::IndexStatus as SdkIndexStatus;
    use aws_sdk_dynamodb::types::TableStatus as SdkTableStatus;

    let global_indexes = description
        .global_secondary_indexes()
        .iter()
        .map(|gsi| GlobalIndexState {
            name: gsi.index_name().unwrap_or_default().to_string(),
            status: match gsi.index_status() {
                Some(SdkIndexStatus::Creating) => IndexStatus::Creating,
                Some(SdkIndexStatus::Updating) => IndexStatus::Updating,
                Some(SdkIndexStatus::Deleting) => IndexStatus::Deleting,
                _ => IndexStatus::Active,
            },
        })
        .collect();

    let status = match description.table_status() {
        Some(SdkTableStatus::Creating) => TableStatus::Creating,
        Some(SdkTableStatus::Updating) => TableStatus::Updating,
        Some(SdkTableStatus::Deleting) => TableStatus::Deleting,
        _ => TableStatus::Active,
    };

    TableState {
        status,
        global_indexes,
    }
}

fn split_key_schema(elements: &[KeySchemaElement]) -> (Option<&str>, Option<&str>) {
    let find = |key_type: KeyType| {
        elements
            .iter()
            .find(|e| *e.key_type() == key_type)
            .map(|e| e.attribute_name())
    };
    (find(KeyType::Hash), find(KeyType::Range))
}

/// Rebuilds a key schema from a table description.
fn key_schema_from(table: &str, description: &TableDescription) -> Result<KeySchema> {
    let types: HashMap<&str, AttributeType> = description
        .attribute_definitions()
        .iter()
        .map(|d| {
            let attribute_type = match d.attribute_type() {
                ScalarAttributeType::N => AttributeType::Number,
                ScalarAttributeType::B => AttributeType::Binary,
                _ => AttributeType::String,
            };
            (d.attribute_name(), attribute_type)
        })
        .collect();
    let attribute = |name: &str| {
        KeyAttribute::new(
            name,
            types.get(name).copied().unwrap_or(AttributeType::String),
        )
    };

    let (hash, range) = split_key_schema(description.key_schema());
    let hash = hash.ok_or_else(|| {
        StoreError::InvalidData(format!("Table {table} reports no hash key"))
    })?;
    let mut schema = KeySchema::new(attribute(hash));
    if let Some(range) = range {
        schema = schema.with_range(attribute(range));
    }

    for local in description.local_secondary_indexes() {
        if let (Some(name), (_, Some(range))) =
            (local.index_name(), split_key_schema(local.key_schema()))
        {
            schema = schema.with_local_index(name, attribute(range));
        }
    }

    for global in description.global_secondary_indexes() {
        let (Some(name), (Some(hash), range)) =
            (global.index_name(), split_key_schema(global.key_schema()))
        else {
            continue;
        };
        let mut index = GlobalIndex::new(name, attribute(hash));
        if let Some(range) = range {
            index = index.with_range(attribute(range));
        }
        let capacity = global.provisioned_throughput().and_then(|t| {
            match (t.read_capacity_units(), t.write_capacity_units()) {
                (Some(read), Some(write)) if read > 0 => Some(Throughput {
                    read: read as u64,
                    write: write.max(0) as u64,
                }),
                _ => None,
            }
        });
        if let Some(throughput) = capacity {
            index = index.with_capacity(Capacity::Fixed(throughput));
        }
        schema = schema.with_global_index(index);
    }

    Ok(schema)
}
