//! MongoDB-backed `Registry`.
//!
//! Mirrors the document shape and single-field `$set`/`$inc`/`$setOnInsert` atomicity
//! of the original Python `mongo_bootstrap.py`/`lb.py` pair: one document per backend
//! in the `servers` collection of the `chlb` database, unique on `instance_id`. Every
//! mutation here is a partial update touching only the fields it carries — never a
//! full-document replace — so two concurrent tasks updating different fields of the
//! same document can't clobber each other. No multi-document transaction is needed
//! because every mutation here touches exactly one document.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::{IndexOptions, UpdateOptions};
use mongodb::{Client, Collection, IndexModel};
use tracing::warn;

use super::{BackendUpdate, Registry};
use crate::error::{Error, Result};
use crate::types::{Backend, InstanceId, Status};

const DATABASE: &str = "chlb";
const COLLECTION: &str = "servers";

#[derive(Clone)]
pub struct MongoRegistry {
    collection: Collection<Backend>,
    raw: Collection<mongodb::bson::Document>,
}

impl MongoRegistry {
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(DATABASE);
        let collection = db.collection::<Backend>(COLLECTION);
        let raw = db.collection::<mongodb::bson::Document>(COLLECTION);

        let index = IndexModel::builder()
            .keys(doc! { "instance_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(index).await?;

        let status_index = IndexModel::builder().keys(doc! { "status": 1 }).build();
        collection.create_index(status_index).await?;

        Ok(Self { collection, raw })
    }
}

#[async_trait]
impl Registry for MongoRegistry {
    async fn snapshot(&self) -> Result<Vec<Backend>> {
        use futures_util::stream::TryStreamExt;
        let mut cursor = self.raw.find(doc! {}).await?;
        let mut backends = Vec::new();
        while let Some(raw_doc) = cursor.try_next().await? {
            match mongodb::bson::from_document::<Backend>(raw_doc) {
                Ok(backend) => backends.push(backend),
                Err(e) => warn!("skipping malformed backend document: {e}"),
            }
        }
        Ok(backends)
    }

    /// Partial `$set` of only the fields `update` carries, with `$setOnInsert` supplying
    /// the seed fields for the case where `instance_id` has no existing document yet.
    /// Never a full-document replace: a concurrently-running task (e.g. the health
    /// probe's `set_status`) touching a field this call doesn't carry must not be
    /// clobbered back to a stale value.
    async fn upsert(&self, instance_id: &InstanceId, seed: Backend, update: BackendUpdate) -> Result<()> {
        let mut set_doc = Document::new();
        if let Some(status) = update.status {
            set_doc.insert("status", status_str(status));
        }
        if let Some(weight) = update.weight {
            set_doc.insert("weight", weight as i64);
        }
        if let Some(metrics) = update.metrics {
            let metrics_bson = mongodb::bson::to_bson(&metrics).map_err(|e| Error::RegistryUnavailable(e.to_string()))?;
            set_doc.insert("metrics", metrics_bson);
        }
        if let Some(last_checked) = update.last_checked {
            let ts_bson = mongodb::bson::to_bson(&last_checked).map_err(|e| Error::RegistryUnavailable(e.to_string()))?;
            set_doc.insert("last_checked", ts_bson);
        }

        let mut on_insert = doc! {
            "instance_id": instance_id,
            "name": &seed.name,
            "address": &seed.address,
            "port": seed.port as i32,
            "load_count": seed.load_count as i64,
        };
        if update.status.is_none() {
            on_insert.insert("status", status_str(seed.status));
        }
        if update.weight.is_none() {
            on_insert.insert("weight", seed.weight as i64);
        }
        if update.metrics.is_none() {
            let metrics_bson = mongodb::bson::to_bson(&seed.metrics).map_err(|e| Error::RegistryUnavailable(e.to_string()))?;
            on_insert.insert("metrics", metrics_bson);
        }
        if update.last_checked.is_none() {
            let ts_bson = mongodb::bson::to_bson(&seed.last_checked).map_err(|e| Error::RegistryUnavailable(e.to_string()))?;
            on_insert.insert("last_checked", ts_bson);
        }

        let mut update_doc = doc! { "$setOnInsert": on_insert };
        if !set_doc.is_empty() {
            update_doc.insert("$set", set_doc);
        }

        self.collection
            .update_one(doc! { "instance_id": instance_id }, update_doc)
            .with_options(UpdateOptions::builder().upsert(true).build())
            .await?;
        Ok(())
    }

    async fn bulk_replace(&self, records: Vec<Backend>) -> Result<()> {
        self.collection.delete_many(doc! {}).await?;
        if !records.is_empty() {
            self.collection.insert_many(&records).await?;
        }
        Ok(())
    }

    async fn inc_load(&self, instance_id: &InstanceId) -> Result<()> {
        self.collection
            .update_one(
                doc! { "instance_id": instance_id },
                doc! { "$inc": { "load_count": 1i64 } },
            )
            .await?;
        Ok(())
    }

    async fn set_status(&self, instance_id: &InstanceId, status: Status) -> Result<()> {
        self.collection
            .update_one(
                doc! { "instance_id": instance_id },
                doc! { "$set": { "status": status_str(status) } },
            )
            .await?;
        Ok(())
    }
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::Healthy => "HEALTHY",
        Status::Unhealthy => "UNHEALTHY",
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(e: mongodb::error::Error) -> Self {
        Error::RegistryUnavailable(e.to_string())
    }
}
