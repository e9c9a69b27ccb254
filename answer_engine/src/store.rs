//! The document store boundary.
//!
//! The engine never talks to a database directly. It sees a [Collection] of
//! answer sheets and a [DocumentStore] that hands out access to it, either for
//! a read or for a transaction. Writes made inside a transaction are only
//! visible to others once the closure returns `Ok`.

use std::sync::Mutex;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::config::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// No document matched. The dedup path treats this as "insert fresh".
    #[snafu(display("no document matches the filter"))]
    NotFound {},

    /// A conditional update did not find the document in the expected state.
    #[snafu(display("write conflict on document {id}"))]
    WriteConflict { id: DocumentId },

    #[snafu(display("the store lock was poisoned by a failed writer"))]
    Poisoned {},

    /// Connection, decoding or any other adapter failure.
    #[snafu(display("store backend failure: {message}"))]
    Backend {
        message: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound {})
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A predicate over stored answer sheets.
#[derive(PartialEq, Debug, Clone)]
pub enum Filter {
    All,
    Id(DocumentId),
    SurveyId(SurveyId),
    IsUnique(bool),
    /// At least one answer to `question_id` with exactly this content.
    AnswerMatches {
        question_id: QuestionId,
        content: AnswerContent,
    },
    /// At least one answer whose content contains the text, ignoring case.
    AnswerContains(String),
    And(Vec<Filter>),
    /// An empty disjunction matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    pub fn matches(&self, doc: &StoredSheet) -> bool {
        match self {
            Filter::All => true,
            Filter::Id(id) => doc.id == *id,
            Filter::SurveyId(sid) => doc.sheet.survey_id == *sid,
            Filter::IsUnique(u) => doc.sheet.is_unique == *u,
            Filter::AnswerMatches {
                question_id,
                content,
            } => doc
                .sheet
                .answers
                .iter()
                .any(|a| a.question_id == *question_id && a.content == *content),
            Filter::AnswerContains(text) => {
                doc.sheet.answers.iter().any(|a| a.content.contains_text(text))
            }
            Filter::And(fs) => fs.iter().all(|f| f.matches(doc)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(doc)),
        }
    }
}

/// A partial update of a stored sheet.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Patch {
    SetUnique(bool),
}

impl Patch {
    fn apply(&self, sheet: &mut AnswerSheet) {
        match self {
            Patch::SetUnique(u) => sheet.is_unique = *u,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Page {
    pub skip: u64,
    pub limit: u64,
}

/// The operations the engine needs from a collection of answer sheets.
///
/// Documents come back in insertion order.
pub trait Collection {
    fn insert_one(&mut self, sheet: AnswerSheet) -> StoreResult<DocumentId>;

    /// The first matching document, or [StoreError::NotFound].
    fn find_one(&self, filter: &Filter) -> StoreResult<StoredSheet>;

    /// Patches the first matching document. Returns the number of modified documents.
    fn update_one(&mut self, filter: &Filter, patch: &Patch) -> StoreResult<u64>;

    fn find(&self, filter: &Filter, page: Option<Page>) -> StoreResult<Vec<StoredSheet>>;

    fn count(&self, filter: &Filter) -> StoreResult<u64>;

    /// Returns the number of deleted documents.
    fn delete_many(&mut self, filter: &Filter) -> StoreResult<u64>;
}

pub trait DocumentStore {
    /// Runs `f` with exclusive access to the collection. Its writes are committed
    /// when it returns `Ok` and discarded otherwise.
    fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Collection) -> StoreResult<T>;

    fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn Collection) -> StoreResult<T>;
}

/// A collection held in memory. Also the unit of persistence of file based stores.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCollection {
    #[serde(rename = "nextId")]
    next_id: u64,
    documents: Vec<StoredSheet>,
}

impl MemoryCollection {
    pub fn new() -> MemoryCollection {
        MemoryCollection::default()
    }

    pub fn documents(&self) -> &[StoredSheet] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Collection for MemoryCollection {
    fn insert_one(&mut self, sheet: AnswerSheet) -> StoreResult<DocumentId> {
        // Ids are never reused, even after deletions.
        self.next_id += 1;
        let id = DocumentId(self.next_id);
        self.documents.push(StoredSheet { id, sheet });
        Ok(id)
    }

    fn find_one(&self, filter: &Filter) -> StoreResult<StoredSheet> {
        self.documents
            .iter()
            .find(|d| filter.matches(d))
            .cloned()
            .ok_or(StoreError::NotFound {})
    }

    fn update_one(&mut self, filter: &Filter, patch: &Patch) -> StoreResult<u64> {
        match self.documents.iter_mut().find(|d| filter.matches(d)) {
            Some(doc) => {
                patch.apply(&mut doc.sheet);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn find(&self, filter: &Filter, page: Option<Page>) -> StoreResult<Vec<StoredSheet>> {
        let matching = self.documents.iter().filter(|d| filter.matches(d));
        let res: Vec<StoredSheet> = match page {
            Some(p) => matching
                .skip(p.skip as usize)
                .take(p.limit as usize)
                .cloned()
                .collect(),
            None => matching.cloned().collect(),
        };
        Ok(res)
    }

    fn count(&self, filter: &Filter) -> StoreResult<u64> {
        Ok(self.documents.iter().filter(|d| filter.matches(d)).count() as u64)
    }

    fn delete_many(&mut self, filter: &Filter) -> StoreResult<u64> {
        let before = self.documents.len();
        self.documents.retain(|d| !filter.matches(d));
        Ok((before - self.documents.len()) as u64)
    }
}

/// Runs `f` on a copy of `coll` and returns the copy if `f` succeeded.
///
/// Shared by the stores that implement transactions by copy-on-write.
pub fn run_on_copy<T, F>(coll: &MemoryCollection, f: F) -> StoreResult<(MemoryCollection, T)>
where
    F: FnOnce(&mut dyn Collection) -> StoreResult<T>,
{
    let mut working = coll.clone();
    let res = f(&mut working)?;
    Ok((working, res))
}

/// An in-process document store.
///
/// Transactions are serialized by a mutex and applied to a copy of the
/// collection, so a failed transaction leaves no trace.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryCollection>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn from_collection(coll: MemoryCollection) -> MemoryStore {
        MemoryStore {
            inner: Mutex::new(coll),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> StoreResult<MemoryCollection> {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned {})?;
        Ok(guard.clone())
    }
}

impl DocumentStore for MemoryStore {
    fn transaction<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut dyn Collection) -> StoreResult<T>,
    {
        let mut guard = self.inner.lock().map_err(|_| StoreError::Poisoned {})?;
        let (working, res) = run_on_copy(&guard, f)?;
        debug!(
            "transaction: committed, {} -> {} documents",
            guard.len(),
            working.len()
        );
        *guard = working;
        Ok(res)
    }

    fn read<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&dyn Collection) -> StoreResult<T>,
    {
        let guard = self.inner.lock().map_err(|_| StoreError::Poisoned {})?;
        f(&*guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    #[test]
    fn filters() {
        let mut coll = MemoryCollection::new();
        coll.insert_one(sheet(1, &[(10, "Red")], true)).unwrap();
        coll.insert_one(sheet(1, &[(10, "blue┋green")], false)).unwrap();
        coll.insert_one(sheet(2, &[(20, "red")], true)).unwrap();

        assert_eq!(coll.count(&Filter::SurveyId(1)).unwrap(), 2);
        assert_eq!(coll.count(&Filter::IsUnique(true)).unwrap(), 2);
        assert_eq!(coll.count(&Filter::AnswerContains("RED".into())).unwrap(), 2);
        let elem = Filter::AnswerMatches {
            question_id: 10,
            content: AnswerContent::parse("blue┋green"),
        };
        assert_eq!(coll.count(&elem).unwrap(), 1);
        // No semantic set comparison: the order of the selections matters.
        let reordered = Filter::AnswerMatches {
            question_id: 10,
            content: AnswerContent::parse("green┋blue"),
        };
        assert_eq!(coll.count(&reordered).unwrap(), 0);
        assert_eq!(coll.count(&Filter::Or(vec![])).unwrap(), 0);
        assert_eq!(
            coll.count(&Filter::And(vec![Filter::SurveyId(1), Filter::IsUnique(false)]))
                .unwrap(),
            1
        );
    }

    #[test]
    fn find_one_not_found() {
        let coll = MemoryCollection::new();
        let err = coll.find_one(&Filter::All).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn paging_and_delete() {
        let mut coll = MemoryCollection::new();
        for i in 0..5 {
            coll.insert_one(sheet(1, &[(1, format!("v{}", i).as_str())], true))
                .unwrap();
        }
        let page = coll
            .find(&Filter::All, Some(Page { skip: 3, limit: 10 }))
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, DocumentId(4));

        assert_eq!(coll.delete_many(&Filter::SurveyId(1)).unwrap(), 5);
        assert!(coll.is_empty());
        // Identifiers keep increasing after a deletion.
        let id = coll.insert_one(sheet(1, &[], true)).unwrap();
        assert_eq!(id, DocumentId(6));
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = MemoryStore::new();
        store
            .transaction(|c| c.insert_one(sheet(1, &[(1, "a")], true)))
            .unwrap();

        let res: StoreResult<()> = store.transaction(|c| {
            c.update_one(&Filter::All, &Patch::SetUnique(false))?;
            Err(StoreError::Backend {
                message: "disk full".to_string(),
                source: "disk full".into(),
            })
        });
        assert!(res.is_err());

        let snap = store.snapshot().unwrap();
        assert_eq!(snap.len(), 1);
        assert!(snap.documents()[0].sheet.is_unique);
    }
}
