//! Record stores.
//!
//! A list view owns exactly one store and mutates it only through the [`Repository`]
//! operations. The in-memory implementation keeps records in display order: newly created
//! records go to the front, updates replace in place, deletes remove exactly one record.

use crate::error::{LisError, LisResult};
use std::fmt;

/// A record with a stable identity.
pub trait Record: Clone + fmt::Debug {
    /// Human-readable kind used in messages, e.g. `"test order"`.
    const KIND: &'static str;

    fn id(&self) -> &str;
}

/// Storage operations a list view needs.
pub trait Repository<T: Record> {
    /// All records in display order.
    fn list(&self) -> &[T];

    fn get(&self, id: &str) -> Option<&T>;

    fn get_mut(&mut self, id: &str) -> Option<&mut T>;

    /// Inserts `record` at the front.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::DuplicateId`] if a record with the same id exists.
    fn create(&mut self, record: T) -> LisResult<()>;

    /// Replaces the record with the same id, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] if no record has that id.
    fn update(&mut self, record: T) -> LisResult<()>;

    /// Removes and returns the record with `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LisError::NotFound`] if no record has that id.
    fn delete(&mut self, id: &str) -> LisResult<T>;

    fn len(&self) -> usize {
        self.list().len()
    }

    fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// Vec-backed store.
#[derive(Clone, Debug, PartialEq)]
pub struct InMemoryRepository<T> {
    records: Vec<T>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: Record> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps seeded records, keeping their order.
    pub fn from_records(records: Vec<T>) -> Self {
        Self { records }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    fn not_found(id: &str) -> LisError {
        LisError::NotFound {
            kind: T::KIND,
            id: id.to_owned(),
        }
    }
}

impl<T: Record> Repository<T> for InMemoryRepository<T> {
    fn list(&self) -> &[T] {
        &self.records
    }

    fn get(&self, id: &str) -> Option<&T> {
        self.records.iter().find(|r| r.id() == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    fn create(&mut self, record: T) -> LisResult<()> {
        if self.position(record.id()).is_some() {
            return Err(LisError::DuplicateId {
                kind: T::KIND,
                id: record.id().to_owned(),
            });
        }
        self.records.insert(0, record);
        Ok(())
    }

    fn update(&mut self, record: T) -> LisResult<()> {
        let index = self
            .position(record.id())
            .ok_or_else(|| Self::not_found(record.id()))?;
        self.records[index] = record;
        Ok(())
    }

    fn delete(&mut self, id: &str) -> LisResult<T> {
        let index = self.position(id).ok_or_else(|| Self::not_found(id))?;
        Ok(self.records.remove(index))
    }
}
