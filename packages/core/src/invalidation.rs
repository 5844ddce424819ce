// ABOUTME: Cache invalidation contract emitted after committed mutations
// ABOUTME: Descriptor types, a deduplicating batch builder and the sink trait

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cached resource families the engine knows how to name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    Inventory,
    InventoryStats,
    Product,
    Sku,
    Kanban,
    Location,
    Department,
    Person,
    TransferLog,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Inventory => "inventory",
            Resource::InventoryStats => "inventoryStats",
            Resource::Product => "product",
            Resource::Sku => "sku",
            Resource::Kanban => "kanban",
            Resource::Location => "location",
            Resource::Department => "department",
            Resource::Person => "person",
            Resource::TransferLog => "transferLog",
        };
        f.write_str(name)
    }
}

/// One invalidation descriptor: a resource family, optionally narrowed to one id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Invalidation {
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Invalidation {
    pub fn all(resource: Resource) -> Self {
        Self { resource, id: None }
    }

    pub fn one(resource: Resource, id: impl Into<String>) -> Self {
        Self {
            resource,
            id: Some(id.into()),
        }
    }
}

/// Batch of descriptors collected while a transaction runs.
///
/// Each resource/id pair appears at most once, so the sink is called once per pair.
#[derive(Debug, Default, Clone)]
pub struct Invalidations {
    items: BTreeSet<Invalidation>,
}

impl Invalidations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) -> &mut Self {
        self.items.insert(Invalidation::all(resource));
        self
    }

    pub fn add_id(&mut self, resource: Resource, id: impl Into<String>) -> &mut Self {
        self.items.insert(Invalidation::one(resource, id));
        self
    }

    pub fn add_opt(&mut self, resource: Resource, id: Option<&str>) -> &mut Self {
        if let Some(id) = id {
            self.add_id(resource, id);
        }
        self
    }

    /// Merge another batch into this one
    pub fn extend(&mut self, other: Invalidations) -> &mut Self {
        self.items.extend(other.items);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, resource: Resource, id: Option<&str>) -> bool {
        self.items.contains(&Invalidation {
            resource,
            id: id.map(str::to_string),
        })
    }

    pub fn into_vec(self) -> Vec<Invalidation> {
        self.items.into_iter().collect()
    }

    /// Hand the batch to a sink. Call only after the transaction committed.
    pub fn emit(self, sink: &dyn InvalidationSink) {
        if self.is_empty() {
            return;
        }
        let batch = self.into_vec();
        sink.invalidate(&batch);
    }
}

/// Receiver for invalidation batches. Implementations must not block.
pub trait InvalidationSink: Send + Sync {
    fn invalidate(&self, batch: &[Invalidation]);
}

/// Default sink: logs descriptors and forgets them
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

impl InvalidationSink for LoggingSink {
    fn invalidate(&self, batch: &[Invalidation]) {
        for item in batch {
            match &item.id {
                Some(id) => debug!("Invalidating cache: {}:{}", item.resource, id),
                None => debug!("Invalidating cache: {}", item.resource),
            }
        }
    }
}

/// Sink that keeps every batch it receives, for tests and diagnostics
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<Invalidation>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<Invalidation>> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn last(&self) -> Option<Vec<Invalidation>> {
        self.batches().pop()
    }

    pub fn clear(&self) {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl InvalidationSink for RecordingSink {
    fn invalidate(&self, batch: &[Invalidation]) {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(batch.to_vec());
    }
}
