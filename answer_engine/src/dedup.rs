use std::collections::HashSet;

use log::{debug, info};

use crate::config::*;
use crate::store::*;

/// What happened to a submitted answer sheet.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SubmitOutcome {
    /// The sheet answers no tracked question. Stored without deduplication.
    Inserted(DocumentId),
    /// No unique sheet shares a tracked answer with this one. Stored as submitted.
    InsertedFirst(DocumentId),
    /// An older unique sheet shared a tracked answer. It was demoted and the new
    /// sheet stored as the unique one.
    Superseded {
        demoted: DocumentId,
        inserted: DocumentId,
    },
}

impl SubmitOutcome {
    pub fn inserted(&self) -> DocumentId {
        match self {
            SubmitOutcome::Inserted(id) | SubmitOutcome::InsertedFirst(id) => *id,
            SubmitOutcome::Superseded { inserted, .. } => *inserted,
        }
    }
}

/// The disjunction of one clause per tracked answer of the sheet, or `None`
/// when the sheet answers no tracked question.
///
/// Contents are compared verbatim, selection order included.
pub fn match_filter(sheet: &AnswerSheet, tracked: &HashSet<QuestionId>) -> Option<Filter> {
    let clauses: Vec<Filter> = sheet
        .answers
        .iter()
        .filter(|a| tracked.contains(&a.question_id))
        .map(|a| Filter::AnswerMatches {
            question_id: a.question_id,
            content: a.content.clone(),
        })
        .collect();
    if clauses.is_empty() {
        None
    } else {
        Some(Filter::Or(clauses))
    }
}

/// Stores a new answer sheet, superseding the unique sheet it duplicates.
///
/// The lookup, the demotion and the insertion run in a single store
/// transaction: two submissions with the same tracked answers cannot both see
/// "no match" and both end up unique, and a failed insertion leaves the old
/// sheet unique.
pub fn submit<S: DocumentStore>(
    store: &S,
    sheet: &AnswerSheet,
    tracked: &HashSet<QuestionId>,
) -> StoreResult<SubmitOutcome> {
    let outcome = store.transaction(|c| submit_in(c, sheet, tracked))?;
    log_outcome(sheet, &outcome);
    Ok(outcome)
}

/// The body of [submit], for callers that already hold a transaction.
///
/// Several calls in one transaction behave like successive submissions.
pub fn submit_in(
    c: &mut dyn Collection,
    sheet: &AnswerSheet,
    tracked: &HashSet<QuestionId>,
) -> StoreResult<SubmitOutcome> {
    let matching = match match_filter(sheet, tracked) {
        Some(f) => f,
        None => {
            let id = c.insert_one(sheet.clone())?;
            return Ok(SubmitOutcome::Inserted(id));
        }
    };
    debug!("submit: survey {}: match filter {:?}", sheet.survey_id, matching);

    let filter = Filter::And(vec![Filter::IsUnique(true), matching]);
    let existing = match c.find_one(&filter) {
        Ok(doc) => doc,
        Err(e) if e.is_not_found() => {
            let id = c.insert_one(sheet.clone())?;
            return Ok(SubmitOutcome::InsertedFirst(id));
        }
        Err(e) => return Err(e),
    };

    // Only demote the sheet if it is still the unique one.
    let cas = Filter::And(vec![Filter::Id(existing.id), Filter::IsUnique(true)]);
    if c.update_one(&cas, &Patch::SetUnique(false))? == 0 {
        return Err(StoreError::WriteConflict { id: existing.id });
    }

    let mut replacement = sheet.clone();
    replacement.is_unique = true;
    let inserted = c.insert_one(replacement)?;
    Ok(SubmitOutcome::Superseded {
        demoted: existing.id,
        inserted,
    })
}

pub(crate) fn log_outcome(sheet: &AnswerSheet, outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Inserted(id) => info!(
            "submit: survey {}: no tracked answer, inserted {}",
            sheet.survey_id, id
        ),
        SubmitOutcome::InsertedFirst(id) => info!(
            "submit: survey {}: no unique match, inserted {}",
            sheet.survey_id, id
        ),
        SubmitOutcome::Superseded { demoted, inserted } => info!(
            "submit: survey {}: {} supersedes {}",
            sheet.survey_id, inserted, demoted
        ),
    }
}
