/*!
Deduplication and vote statistics for survey answer sheets.

The engine has two entry points:
- [submit_answer_sheet] validates a new answer sheet and stores it. When the
  sheet repeats the answer of an existing sheet to a tracked question (a
  question marked `unique`), the older sheet loses its unique flag and the new
  one becomes the unique representative.
- [survey_statistics] counts, for every question of a vote survey, how many
  times each option was selected and ranks the options.

Storage goes through the [DocumentStore] trait. [MemoryStore] is an
in-process implementation.

```
use answer_engine::*;
use std::collections::HashMap;

let survey = Survey::new(1, SurveyKind::Vote);
let questions = vec![Question {
    id: 10,
    survey_id: 1,
    serial_num: 1,
    subject: "Favourite color".to_string(),
    question_type: 1,
    other_option: true,
    required: true,
    unique: false,
    minimum_option: 0,
    maximum_option: 0,
}];
let options: HashMap<QuestionId, Vec<QuestionOption>> = [(
    10,
    vec![
        QuestionOption { question_id: 10, serial_num: 1, content: "red".to_string() },
        QuestionOption { question_id: 10, serial_num: 2, content: "blue".to_string() },
    ],
)]
.into_iter()
.collect();

let store = MemoryStore::new();
let sheet = AnswerSheet {
    survey_id: 1,
    submitted_at: "2024-05-04 12:00:00".to_string(),
    is_unique: true,
    answers: vec![Answer {
        question_id: 10,
        serial_num: 1,
        subject: "Favourite color".to_string(),
        content: AnswerContent::parse("red┋blue"),
    }],
};
submit_answer_sheet(&store, &survey, &questions, &sheet)?;

let stats = survey_statistics(&store, &survey, &questions, &options, false)?;
assert_eq!(stats[0].option(1).map(|o| o.count), Some(1));
# Ok::<(), EngineError>(())
```
*/

mod browse;
mod config;
mod dedup;
mod rank;
mod stats;
mod store;
mod validate;

#[cfg(test)]
mod test_util;

use std::collections::HashMap;

use log::{debug, info};
use snafu::{ResultExt, Snafu};

pub use crate::browse::*;
pub use crate::config::*;
pub use crate::dedup::*;
pub use crate::rank::*;
pub use crate::stats::*;
pub use crate::store::*;
pub use crate::validate::*;

/// Errors that prevent a submission or a statistics request from completing.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EngineError {
    #[snafu(display("invalid request: {source}"))]
    Validation { source: ValidationError },

    #[snafu(display("store error: {source}"))]
    Store { source: StoreError },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Validates a new answer sheet and stores it, superseding the unique sheet it
/// duplicates on the tracked questions of the survey.
///
/// Arguments:
/// * `store` where the answer sheets are kept
/// * `survey` the survey being answered
/// * `questions` all the questions of this survey. The questions flagged as
/// `unique` are the tracked questions.
/// * `sheet` the new answer sheet
pub fn submit_answer_sheet<S: DocumentStore>(
    store: &S,
    survey: &Survey,
    questions: &[Question],
    sheet: &AnswerSheet,
) -> EngineResult<SubmitOutcome> {
    validate_submission(survey, questions, sheet).context(ValidationSnafu {})?;
    let tracked = tracked_questions(questions);
    debug!(
        "submit_answer_sheet: survey {}: tracked questions {:?}",
        survey.id, tracked
    );
    dedup::submit(store, sheet, &tracked).context(StoreSnafu {})
}

/// Validates and stores a batch of answer sheets, in order, in one store
/// transaction.
///
/// Returns one result per sheet: the outcome, or the reason the sheet was
/// rejected. Rejected sheets do not stop the batch. A store error aborts the
/// whole batch and nothing is stored.
pub fn submit_answer_sheets<S: DocumentStore>(
    store: &S,
    survey: &Survey,
    questions: &[Question],
    sheets: &[AnswerSheet],
) -> EngineResult<Vec<ValidationResult<SubmitOutcome>>> {
    let tracked = tracked_questions(questions);
    let results = store
        .transaction(|c| {
            let mut results = Vec::with_capacity(sheets.len());
            for sheet in sheets.iter() {
                let res = match validate_submission(survey, questions, sheet) {
                    Ok(()) => Ok(dedup::submit_in(c, sheet, &tracked)?),
                    Err(e) => Err(e),
                };
                results.push(res);
            }
            Ok(results)
        })
        .context(StoreSnafu {})?;
    for (sheet, res) in sheets.iter().zip(results.iter()) {
        if let Ok(outcome) = res {
            dedup::log_outcome(sheet, outcome);
        }
    }
    info!(
        "submit_answer_sheets: survey {}: {} of {} sheets stored",
        survey.id,
        results.iter().filter(|r| r.is_ok()).count(),
        sheets.len()
    );
    Ok(results)
}

/// Vote statistics of a survey, one entry per question in the order of
/// `questions`.
///
/// If `unique_only` is set, only the answer sheets currently flagged unique are
/// counted.
///
/// The answer sheets are read in one pass. With stores that do not isolate
/// reads, sheets submitted during the read may or may not be counted.
pub fn survey_statistics<S: DocumentStore>(
    store: &S,
    survey: &Survey,
    questions: &[Question],
    options_by_question: &HashMap<QuestionId, Vec<QuestionOption>>,
    unique_only: bool,
) -> EngineResult<Vec<QuestionStatistics>> {
    validate_statistics_request(survey).context(ValidationSnafu {})?;

    let mut fs = vec![Filter::SurveyId(survey.id)];
    if unique_only {
        fs.push(Filter::IsUnique(true));
    }
    let filter = Filter::And(fs);
    let docs = store
        .read(|c| c.find(&filter, None))
        .context(StoreSnafu {})?;
    info!(
        "survey_statistics: survey {}: {} answer sheets",
        survey.id,
        docs.len()
    );

    let sheets: Vec<AnswerSheet> = docs.into_iter().map(|d| d.sheet).collect();
    let counted = survey.kind.counted_questions(questions);
    Ok(aggregate(&sheets, questions, options_by_question, &counted))
}
