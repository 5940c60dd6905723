use crate::store::ids::{fresh_point_id, id_text, parse_delete_id, resolve_identifier};
use crate::store::{
    DeleteStatus, ExampleMetadata, ExampleRecord, ExampleStore, PointId, ScrollPage,
    ScrollRequest, StoreError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// A candidate example as it appears in an import document or an add request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewExample {
    #[serde(default)]
    pub nl: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub tables: Option<Vec<String>>,
    #[serde(default, rename = "type")]
    pub query_type: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
}

impl NewExample {
    /// Reads one import item. Only non-objects are rejected; an optional field
    /// of the wrong type is dropped on its own.
    fn from_import_item(index: usize, item: Value) -> Option<Self> {
        let Value::Object(mut fields) = item else {
            return None;
        };

        Some(Self {
            nl: fields.remove("nl").and_then(|nl| match nl {
                Value::String(nl) => Some(nl),
                _ => None,
            }),
            sql: lenient_field(&mut fields, "sql", index),
            tables: lenient_field(&mut fields, "tables", index),
            query_type: lenient_field(&mut fields, "type", index),
            id: fields.remove("id").filter(|id| !id.is_null()),
        })
    }

    fn text(&self) -> Option<&str> {
        self.nl.as_deref().filter(|nl| !nl.trim().is_empty())
    }
}

fn lenient_field<T: DeserializeOwned>(
    fields: &mut Map<String, Value>,
    key: &str,
    index: usize,
) -> Option<T> {
    match fields.remove(key)? {
        Value::Null => None,
        value => match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring '{}' of example at index {}: {}", key, index, e);
                None
            }
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    pub added: usize,
    pub ids: Vec<PointId>,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddedExample {
    pub point_id: PointId,
    pub nl_content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeletedExample {
    pub id: PointId,
    pub status: DeleteStatus,
}

/// Decodes an uploaded import file. The document must be a JSON array.
pub fn parse_examples_document(bytes: &[u8]) -> Result<Vec<Value>, StoreError> {
    let document: Value = serde_json::from_slice(bytes).map_err(|e| {
        StoreError::Validation(format!(
            "Error decoding JSON: {}. Ensure it's a valid JSON array of objects.",
            e
        ))
    })?;

    match document {
        Value::Array(items) => Ok(items),
        _ => Err(StoreError::Validation(
            "JSON content must be an array (list) of example objects.".to_string(),
        )),
    }
}

/// Imports a batch of candidate records in one store call.
///
/// Records that are not objects, or have no usable `nl` text, are skipped.
/// Caller-supplied ids are kept when they resolve; otherwise a fresh UUID is used.
pub async fn import_examples(
    store: &dyn ExampleStore,
    items: Vec<Value>,
) -> Result<ImportSummary, StoreError> {
    let mut records = Vec::with_capacity(items.len());
    let mut ids = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for (index, item) in items.into_iter().enumerate() {
        let Some(candidate) = NewExample::from_import_item(index, item) else {
            warn!("Item at index {} is not an example object; skipping", index);
            skipped += 1;
            continue;
        };

        let Some(nl) = candidate.text() else {
            warn!(
                "Skipping example at index {}: missing or empty 'nl' field (id: {})",
                index,
                candidate.id.as_ref().map_or("N/A".to_string(), |id| id.to_string())
            );
            skipped += 1;
            continue;
        };

        let assigned = resolve_identifier(candidate.id.as_ref()).assign();
        if assigned.generated {
            debug!(
                "Generated id {} for example at index {} (supplied id: {:?})",
                assigned.id, index, candidate.id
            );
        }

        let metadata = ExampleMetadata {
            source_id: candidate.id.as_ref().and_then(id_text),
            sql: candidate.sql.clone(),
            tables: candidate.tables.clone(),
            query_type: candidate.query_type.clone(),
            point_id_ref: Some(assigned.id.to_string()),
        };
        records.push(ExampleRecord {
            nl: nl.to_string(),
            metadata,
        });
        ids.push(assigned.id);
    }

    let added = commit_batch(store, records, ids.clone()).await?;
    info!(
        "Imported {} examples into {} ({} skipped)",
        added,
        store.collection(),
        skipped
    );

    Ok(ImportSummary {
        added,
        ids,
        skipped,
    })
}

async fn commit_batch(
    store: &dyn ExampleStore,
    records: Vec<ExampleRecord>,
    ids: Vec<PointId>,
) -> Result<usize, StoreError> {
    if records.len() != ids.len() {
        return Err(StoreError::Consistency {
            records: records.len(),
            ids: ids.len(),
        });
    }
    if records.is_empty() {
        return Ok(0);
    }
    store.add(records, ids).await
}

/// Stores one example under a freshly generated id. Any id on the request is
/// recorded as provenance only.
pub async fn add_single_example(
    store: &dyn ExampleStore,
    example: NewExample,
) -> Result<AddedExample, StoreError> {
    let Some(nl) = example.text().map(str::to_string) else {
        return Err(StoreError::Validation(
            "The 'nl' field is missing or empty in the provided example.".to_string(),
        ));
    };

    let point_id = fresh_point_id();
    let record = ExampleRecord {
        nl: nl.clone(),
        metadata: ExampleMetadata {
            source_id: example.id.as_ref().and_then(id_text),
            sql: example.sql,
            tables: example.tables,
            query_type: example.query_type,
            point_id_ref: Some(point_id.to_string()),
        },
    };

    store.add(vec![record], vec![point_id.clone()]).await?;
    info!("Added example {} to {}", point_id, store.collection());

    Ok(AddedExample {
        point_id,
        nl_content: nl,
    })
}

pub async fn list_examples(
    store: &dyn ExampleStore,
    request: ScrollRequest,
) -> Result<ScrollPage, StoreError> {
    debug!(
        "Scrolling {} (limit {}, offset {:?})",
        store.collection(),
        request.limit,
        request.offset
    );
    store.scroll(request).await
}

/// Deletes by id and waits for the backend. Only a completed delete counts as success.
pub async fn delete_example(
    store: &dyn ExampleStore,
    raw_id: &str,
) -> Result<DeletedExample, StoreError> {
    let id = parse_delete_id(raw_id)?;

    match store.delete(&id).await? {
        DeleteStatus::Completed => {
            info!("Deleted example {} from {}", id, store.collection());
            Ok(DeletedExample {
                id,
                status: DeleteStatus::Completed,
            })
        }
        status => {
            warn!("Delete of {} was not confirmed: {}", id, status);
            Err(StoreError::DeleteNotConfirmed { id, status })
        }
    }
}
