use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use shared::{newest_first, HistoryRecord};

use super::{HistoryError, HistoryRepository};

#[derive(Clone)]
pub struct DynamoDbRepository {
    client: Client,
    history_table: String,
}

impl DynamoDbRepository {
    pub fn new(client: Client, history_table: String) -> Self {
        Self {
            client,
            history_table,
        }
    }
}

#[async_trait]
impl HistoryRepository for DynamoDbRepository {
    async fn append(&self, record: &HistoryRecord) -> Result<String, HistoryError> {
        log::debug!(
            "Appending history record {} to DynamoDB table '{}'",
            record.id,
            self.history_table
        );

        match self
            .client
            .put_item()
            .table_name(&self.history_table)
            .set_item(Some(record_to_item(record)))
            .send()
            .await
        {
            Ok(_) => {
                log::info!("Stored history record {}", record.id);
                Ok(record.id.clone())
            }
            Err(e) => {
                log::error!(
                    "DynamoDB put_item failed for record {}: {}",
                    record.id,
                    DisplayErrorContext(&e)
                );
                Err(HistoryError::Backend(e.to_string()))
            }
        }
    }

    async fn list(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let mut records = Vec::new();
        let mut exclusive_start_key = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.history_table)
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(|e| {
                    log::error!("DynamoDB scan failed: {}", DisplayErrorContext(&e));
                    HistoryError::Backend(e.to_string())
                })?;

            records.extend(parse_items(result.items()));

            match result.last_evaluated_key() {
                Some(key) if !key.is_empty() => exclusive_start_key = Some(key.clone()),
                _ => break,
            }
        }

        log::debug!("Scanned {} history records", records.len());
        Ok(newest_first(records, limit))
    }

    async fn delete(&self, id: &str) -> Result<(), HistoryError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.history_table)
            .key("id", AttributeValue::S(id.to_string()))
            .condition_expression("attribute_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => {
                log::info!("Deleted history record {}", id);
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                log::warn!("History record {} not found in DynamoDB", id);
                Err(HistoryError::NotFound(id.to_string()))
            }
            Err(e) => {
                log::error!("DynamoDB delete_item failed for {}: {}", id, DisplayErrorContext(&e));
                Err(HistoryError::Backend(e.to_string()))
            }
        }
    }
}

fn record_to_item(record: &HistoryRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert("id".to_string(), AttributeValue::S(record.id.clone()));
    item.insert(
        "image_url".to_string(),
        AttributeValue::S(record.image_url.clone()),
    );
    item.insert(
        "top_label".to_string(),
        AttributeValue::S(record.top_label.clone()),
    );
    item.insert(
        "top_confidence_percentage".to_string(),
        AttributeValue::N(record.top_confidence_percentage.to_string()),
    );
    item.insert(
        "model_name".to_string(),
        AttributeValue::S(record.model_name.clone()),
    );
    item.insert(
        "processing_time_seconds".to_string(),
        AttributeValue::N(record.processing_time_seconds.to_string()),
    );
    item.insert(
        "timestamp".to_string(),
        AttributeValue::S(record.timestamp.to_rfc3339()),
    );
    if let Some(key) = &record.storage_key {
        item.insert("storage_key".to_string(), AttributeValue::S(key.clone()));
    }
    item
}

fn get_string(item: &HashMap<String, AttributeValue>, key: &str) -> Result<String, HistoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| HistoryError::InvalidData(format!("Missing {} attribute", key)))
}

fn get_number<T: std::str::FromStr>(
    item: &HashMap<String, AttributeValue>,
    key: &str,
) -> Result<T, HistoryError> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| HistoryError::InvalidData(format!("Missing or invalid {} attribute", key)))
}

fn item_to_record(item: &HashMap<String, AttributeValue>) -> Result<HistoryRecord, HistoryError> {
    let timestamp = get_string(item, "timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| HistoryError::InvalidData(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc);

    Ok(HistoryRecord {
        id: get_string(item, "id")?,
        image_url: get_string(item, "image_url")?,
        top_label: get_string(item, "top_label")?,
        top_confidence_percentage: get_number(item, "top_confidence_percentage")?,
        model_name: get_string(item, "model_name").unwrap_or_default(),
        processing_time_seconds: get_number(item, "processing_time_seconds").unwrap_or(0.0),
        timestamp,
        storage_key: get_string(item, "storage_key").ok(),
    })
}

/// Items that do not parse are logged and left out so one bad row cannot
/// hide the rest of the log.
fn parse_items(items: &[HashMap<String, AttributeValue>]) -> Vec<HistoryRecord> {
    items
        .iter()
        .filter_map(|item| match item_to_record(item) {
            Ok(record) => Some(record),
            Err(e) => {
                let id = item
                    .get("id")
                    .and_then(|v| v.as_s().ok())
                    .map(String::as_str)
                    .unwrap_or("<no id>");
                log::warn!("Skipping history item {}: {}", id, e);
                None
            }
        })
        .collect()
}
