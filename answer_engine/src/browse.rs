//! Reading back the stored answer sheets of a survey.

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::*;
use crate::store::*;

/// Which answer sheets of a survey to list.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SheetQuery {
    pub survey_id: SurveyId,
    /// 1-based. Pagination is only applied when both page fields are non-zero.
    pub page_num: u64,
    pub page_size: u64,
    /// If not empty, only the sheets with an answer containing this text (ignoring case).
    pub text: String,
    pub unique_only: bool,
}

impl SheetQuery {
    pub fn filter(&self) -> Filter {
        let mut fs = vec![Filter::SurveyId(self.survey_id)];
        if !self.text.is_empty() {
            fs.push(Filter::AnswerContains(self.text.clone()));
        }
        if self.unique_only {
            fs.push(Filter::IsUnique(true));
        }
        Filter::And(fs)
    }

    pub fn page(&self) -> Option<Page> {
        if self.page_num == 0 || self.page_size == 0 {
            None
        } else {
            Some(Page {
                skip: (self.page_num - 1) * self.page_size,
                limit: self.page_size,
            })
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetPage {
    pub sheets: Vec<StoredSheet>,
    /// Number of sheets matching the query, over all the pages.
    pub total: u64,
}

/// The count and the page are read under the same lock, so they agree.
pub fn list_answer_sheets<S: DocumentStore>(
    store: &S,
    query: &SheetQuery,
) -> StoreResult<SheetPage> {
    let filter = query.filter();
    let page = store.read(|c| {
        let total = c.count(&filter)?;
        let sheets = c.find(&filter, query.page())?;
        Ok(SheetPage { sheets, total })
    })?;
    info!(
        "list_answer_sheets: survey {}: {} of {} sheets",
        query.survey_id,
        page.sheets.len(),
        page.total
    );
    Ok(page)
}

/// Removes all the answer sheets of a survey. Returns how many were removed.
pub fn delete_answer_sheets<S: DocumentStore>(store: &S, survey_id: SurveyId) -> StoreResult<u64> {
    let deleted = store.transaction(|c| c.delete_many(&Filter::SurveyId(survey_id)))?;
    info!("delete_answer_sheets: survey {}: {} sheets deleted", survey_id, deleted);
    Ok(deleted)
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswers {
    pub title: String,
    #[serde(rename = "questionType")]
    pub question_type: i32,
    /// One entry per sheet, in sheet order. Empty when the sheet skipped the question.
    pub answers: Vec<String>,
}

/// The answers laid out by question, as columns of a spreadsheet.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnswersView {
    #[serde(rename = "questionAnswers")]
    pub question_answers: Vec<QuestionAnswers>,
    pub time: Vec<String>,
}

pub fn answers_by_question(sheets: &[StoredSheet], questions: &[Question]) -> AnswersView {
    let question_answers = questions
        .iter()
        .map(|q| QuestionAnswers {
            title: q.subject.clone(),
            question_type: q.question_type,
            answers: sheets
                .iter()
                .map(|s| {
                    s.sheet
                        .answer_to(q.id)
                        .map(|a| a.content.joined())
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect();
    AnswersView {
        question_answers,
        time: sheets.iter().map(|s| s.sheet.submitted_at.clone()).collect(),
    }
}
