// Builders shared by the unit tests.

use std::collections::HashMap;

use crate::config::*;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An answer sheet with one answer per `(question id, wire content)` pair.
pub fn sheet(survey_id: SurveyId, answers: &[(QuestionId, &str)], unique: bool) -> AnswerSheet {
    AnswerSheet {
        survey_id,
        submitted_at: "2024-05-04 12:00:00".to_string(),
        is_unique: unique,
        answers: answers
            .iter()
            .map(|(qid, content)| Answer {
                question_id: *qid,
                serial_num: *qid as i32,
                subject: format!("question {}", qid),
                content: AnswerContent::parse(content),
            })
            .collect(),
    }
}

pub fn question(id: QuestionId, question_type: i32, other_option: bool) -> Question {
    Question {
        id,
        survey_id: 1,
        serial_num: id as i32,
        subject: format!("question {}", id),
        question_type,
        other_option,
        required: false,
        unique: false,
        minimum_option: 0,
        maximum_option: 0,
    }
}

pub fn options(question_id: QuestionId, contents: &[&str]) -> Vec<QuestionOption> {
    contents
        .iter()
        .enumerate()
        .map(|(idx, c)| QuestionOption {
            question_id,
            serial_num: (idx + 1) as i32,
            content: c.to_string(),
        })
        .collect()
}

pub fn options_map(entries: Vec<Vec<QuestionOption>>) -> HashMap<QuestionId, Vec<QuestionOption>> {
    entries
        .into_iter()
        .filter_map(|opts| opts.first().map(|o| (o.question_id, opts.clone())))
        .collect()
}
