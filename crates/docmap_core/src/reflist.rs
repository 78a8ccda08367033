//! List-of-references proxy.

use crate::document::Document;
use crate::error::{OdmError, OdmResult};
use docmap_codec::Value;
use std::ops::Index;

/// The resolved documents of a list-of-references field.
///
/// Mutations keep the proxy and the owner's stored id list in lockstep.
/// Removals go by id, so a proxy taken before another change to the same
/// field never drops an entry the stored list keeps. Changes are in memory
/// only until the owner is saved.
#[derive(Debug, Clone)]
pub struct RefList {
    owner: Document,
    field: String,
    target: String,
    items: Vec<Document>,
}

impl RefList {
    pub(crate) fn new(owner: Document, field: String, target: String, items: Vec<Document>) -> Self {
        Self {
            owner,
            field,
            target,
            items,
        }
    }

    /// Returns the owning document.
    #[must_use]
    pub fn owner(&self) -> &Document {
        &self.owner
    }

    /// Returns the number of referenced documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the document at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Document> {
        self.items.get(index)
    }

    /// Iterates over the referenced documents in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.items.iter()
    }

    /// Returns the documents as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Document] {
        &self.items
    }

    /// Returns true if a document with the same id is in the list.
    #[must_use]
    pub fn contains(&self, doc: &Document) -> bool {
        self.items.iter().any(|d| d == doc)
    }

    /// Appends a document and its id.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if `doc` belongs to another entity type, or
    /// `DocumentRemoved` if either document was removed.
    pub fn push(&mut self, doc: &Document) -> OdmResult<()> {
        if doc.entity_type().name() != self.target {
            return Err(OdmError::type_mismatch(
                self.owner.entity_type().name(),
                self.field.as_str(),
                format!("{} document", self.target),
                format!("{} document", doc.entity_type().name()),
            ));
        }
        doc.ensure_live()?;

        let id = doc.id().clone();
        self.with_ids(|ids| {
            ids.push(id);
            Ok(())
        })?;
        self.items.push(doc.clone());
        Ok(())
    }

    /// Removes the first entry with the same id as `doc`, and the first
    /// occurrence of that id from the owner's stored list.
    ///
    /// Returns false if it was not in the list.
    ///
    /// # Errors
    ///
    /// Returns `DocumentRemoved` if the owner was removed, or the errors
    /// of [`RefList::remove_at`] when the stored list no longer holds it.
    pub fn remove(&mut self, doc: &Document) -> OdmResult<bool> {
        let Some(index) = self.items.iter().position(|d| d == doc) else {
            return Ok(false);
        };
        self.remove_at(index)?;
        Ok(true)
    }

    /// Removes and returns the entry at `index`.
    ///
    /// The stored id at the same position is removed when it matches;
    /// otherwise the first stored occurrence of the id is.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `index` is past either list, `NotFound`
    /// if the stored list no longer holds the entry's id, or
    /// `DocumentRemoved`. The proxy is unchanged on error.
    pub fn remove_at(&mut self, index: usize) -> OdmResult<Document> {
        let len = self.items.len();
        if index >= len {
            return Err(OdmError::IndexOutOfRange { index, len });
        }
        let id = self.items[index].id().clone();
        let target = self.target.as_str();
        self.with_ids(|ids| {
            let position = if ids.get(index) == Some(&id) {
                Some(index)
            } else {
                ids.iter().position(|stored| *stored == id)
            };
            match position {
                Some(position) => {
                    ids.remove(position);
                    Ok(())
                }
                None if index >= ids.len() => Err(OdmError::IndexOutOfRange {
                    index,
                    len: ids.len(),
                }),
                None => Err(OdmError::not_found(target, id.to_string())),
            }
        })?;
        Ok(self.items.remove(index))
    }

    /// Removes and returns the last entry.
    ///
    /// # Errors
    ///
    /// Same as [`RefList::remove_at`].
    pub fn pop(&mut self) -> OdmResult<Option<Document>> {
        match self.items.len() {
            0 => Ok(None),
            len => self.remove_at(len - 1).map(Some),
        }
    }

    fn with_ids<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> OdmResult<R>) -> OdmResult<R> {
        let field = self.field.as_str();
        let entity = self.owner.entity_type().name().to_string();
        self.owner.with_record(|record| {
            let slot = record
                .entry(field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot.as_array_mut() {
                Some(ids) => f(ids),
                None => Err(OdmError::type_mismatch(
                    entity,
                    field,
                    "array",
                    slot.type_name(),
                )),
            }
        })?
    }
}

impl Index<usize> for RefList {
    type Output = Document;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}

impl<'a> IntoIterator for &'a RefList {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
