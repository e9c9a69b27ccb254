use std::path::Path;

use answer_engine::*;
use log::debug;
use snafu::prelude::*;

use crate::survey::config_reader::SurveyDefinition;
use crate::survey::*;

/// Name of the optional column holding the submission time in imported files.
pub const TIME_COLUMN: &str = "time";

/// One row of an imported file, before it is matched with the questions.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedSheet {
    pub id: String,
    pub time: Option<String>,
    /// (column header, cell content), in column order.
    pub cells: Vec<(String, String)>,
}

pub fn current_time() -> String {
    chrono::Local::now().format(SUBMISSION_TIME_FORMAT).to_string()
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

pub fn is_time_column(header: &str) -> bool {
    header.trim().eq_ignore_ascii_case(TIME_COLUMN)
}

/// Matches the columns with the question subjects and builds the answer sheet.
///
/// Rows without a time (or with an empty one) get `default_time`.
pub fn assemble_sheet(
    def: &SurveyDefinition,
    ps: &ParsedSheet,
    default_time: &str,
) -> SurveyResult<AnswerSheet> {
    let mut answers: Vec<Answer> = Vec::new();
    for (header, value) in ps.cells.iter() {
        let question = def
            .questions
            .iter()
            .find(|q| q.subject == header.trim())
            .context(UnknownColumnSnafu {
                column: header.clone(),
            })?;
        answers.push(Answer {
            question_id: question.id,
            serial_num: question.serial_num,
            subject: question.subject.clone(),
            content: AnswerContent::parse(value.trim()),
        });
    }
    let submitted_at = match ps.time.as_deref().map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => default_time.to_string(),
    };
    debug!("assemble_sheet: {}: {} answers", ps.id, answers.len());
    Ok(AnswerSheet {
        survey_id: def.survey.id,
        submitted_at,
        is_unique: true,
        answers,
    })
}
