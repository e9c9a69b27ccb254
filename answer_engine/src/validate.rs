use std::collections::HashMap;

use log::debug;
use snafu::{ensure, OptionExt, Snafu};

use crate::config::*;

/// Reasons to reject a submission before it reaches the store.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("survey {survey_id} is not open (status {status})"))]
    SurveyNotOpen { survey_id: SurveyId, status: i32 },

    #[snafu(display("survey {survey_id} opens at {start}, submitted at {submitted_at}"))]
    SubmissionTooEarly {
        survey_id: SurveyId,
        start: String,
        submitted_at: String,
    },

    #[snafu(display("survey {survey_id} closed at {deadline}, submitted at {submitted_at}"))]
    SubmissionTooLate {
        survey_id: SurveyId,
        deadline: String,
        submitted_at: String,
    },

    #[snafu(display("submission time {submitted_at:?} is not a valid time"))]
    InvalidSubmissionTime { submitted_at: String },

    #[snafu(display("answer sheet is for survey {actual}, expected survey {expected}"))]
    SurveyMismatch {
        expected: SurveyId,
        actual: SurveyId,
    },

    #[snafu(display("the survey has {expected} questions but {actual} were answered"))]
    QuestionCountMismatch { expected: usize, actual: usize },

    #[snafu(display("question {question_id} is unknown"))]
    UnknownQuestion { question_id: QuestionId },

    #[snafu(display("question {serial_num} does not belong to survey {survey_id}"))]
    ForeignQuestion { serial_num: i32, survey_id: SurveyId },

    #[snafu(display("question {serial_num} is required but was left empty"))]
    RequiredAnswerMissing { serial_num: i32 },

    #[snafu(display(
        "question {serial_num}: {selected} options selected, \
         allowed range is [{min}, {max}] (0 = unbounded)"
    ))]
    OptionCountOutOfRange {
        serial_num: i32,
        selected: usize,
        min: u32,
        max: u32,
    },

    #[snafu(display("survey {survey_id} is a research survey, vote statistics are not available"))]
    NotAVoteSurvey { survey_id: SurveyId },
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Checks a submission against the survey it answers.
///
/// The checks run in this order: the survey is open, the submission time is
/// inside its time window (bounds included), the sheet targets it, every
/// question is answered exactly once by count, each answered question
/// belongs to the survey, required questions are not blank and multi-select
/// answers respect the configured bounds.
pub fn validate_submission(
    survey: &Survey,
    questions: &[Question],
    sheet: &AnswerSheet,
) -> ValidationResult<()> {
    ensure!(
        survey.is_open(),
        SurveyNotOpenSnafu {
            survey_id: survey.id,
            status: survey.status
        }
    );
    check_time_window(survey, &sheet.submitted_at)?;
    ensure!(
        sheet.survey_id == survey.id,
        SurveyMismatchSnafu {
            expected: survey.id,
            actual: sheet.survey_id
        }
    );
    ensure!(
        questions.len() == sheet.answers.len(),
        QuestionCountMismatchSnafu {
            expected: questions.len(),
            actual: sheet.answers.len()
        }
    );

    let by_id: HashMap<QuestionId, &Question> = questions.iter().map(|q| (q.id, q)).collect();
    for answer in sheet.answers.iter() {
        let question = by_id
            .get(&answer.question_id)
            .context(UnknownQuestionSnafu {
                question_id: answer.question_id,
            })?;
        ensure!(
            question.survey_id == survey.id,
            ForeignQuestionSnafu {
                serial_num: question.serial_num,
                survey_id: survey.id
            }
        );
        ensure!(
            !(question.required && answer.content.is_blank()),
            RequiredAnswerMissingSnafu {
                serial_num: question.serial_num
            }
        );
        if survey.kind.is_multi_select(question.question_type) {
            let selected = answer.content.selection_count();
            let too_few =
                question.minimum_option != 0 && selected < question.minimum_option as usize;
            let too_many =
                question.maximum_option != 0 && selected > question.maximum_option as usize;
            ensure!(
                !too_few && !too_many,
                OptionCountOutOfRangeSnafu {
                    serial_num: question.serial_num,
                    selected,
                    min: question.minimum_option,
                    max: question.maximum_option,
                }
            );
        }
    }
    debug!(
        "validate_submission: survey {}: {} answers accepted",
        survey.id,
        sheet.answers.len()
    );
    Ok(())
}

fn check_time_window(survey: &Survey, submitted_at: &str) -> ValidationResult<()> {
    if survey.start_time.is_none() && survey.deadline.is_none() {
        return Ok(());
    }
    let at = submission_time::parse(submitted_at).context(InvalidSubmissionTimeSnafu {
        submitted_at,
    })?;
    if let Some(start) = survey.start_time {
        ensure!(
            at >= start,
            SubmissionTooEarlySnafu {
                survey_id: survey.id,
                start: start.format(SUBMISSION_TIME_FORMAT).to_string(),
                submitted_at,
            }
        );
    }
    if let Some(deadline) = survey.deadline {
        ensure!(
            at <= deadline,
            SubmissionTooLateSnafu {
                survey_id: survey.id,
                deadline: deadline.format(SUBMISSION_TIME_FORMAT).to_string(),
                submitted_at,
            }
        );
    }
    Ok(())
}

/// Vote statistics only exist for vote surveys.
pub fn validate_statistics_request(survey: &Survey) -> ValidationResult<()> {
    ensure!(
        survey.kind == SurveyKind::Vote,
        NotAVoteSurveySnafu {
            survey_id: survey.id
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    fn vote_survey() -> Survey {
        Survey::new(1, SurveyKind::Vote)
    }

    #[test]
    fn accepts_valid_sheet() {
        let questions = vec![question(1, 1, false), question(2, 3, false)];
        let s = sheet(1, &[(1, "a┋b"), (2, "free text")], true);
        assert_eq!(validate_submission(&vote_survey(), &questions, &s), Ok(()));
    }

    #[test]
    fn closed_survey() {
        let mut survey = vote_survey();
        survey.status = 1;
        let err = validate_submission(&survey, &[], &sheet(1, &[], true)).unwrap_err();
        assert!(matches!(err, ValidationError::SurveyNotOpen { status: 1, .. }));
    }

    #[test]
    fn wrong_number_of_answers() {
        let questions = vec![question(1, 1, false), question(2, 1, false)];
        let err =
            validate_submission(&vote_survey(), &questions, &sheet(1, &[(1, "a")], true))
                .unwrap_err();
        assert_eq!(
            err,
            ValidationError::QuestionCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn unknown_and_foreign_questions() {
        let mut foreign = question(2, 1, false);
        foreign.survey_id = 5;
        let questions = vec![question(1, 1, false), foreign];

        let survey = vote_survey();
        let check = |answers: &[(QuestionId, &str)]| {
            validate_submission(&survey, &questions, &sheet(1, answers, true))
        };

        let err = check(&[(1, "a"), (3, "b")]).unwrap_err();
        assert_eq!(err, ValidationError::UnknownQuestion { question_id: 3 });

        let err = check(&[(1, "a"), (2, "b")]).unwrap_err();
        assert!(matches!(err, ValidationError::ForeignQuestion { serial_num: 2, .. }));
    }

    #[test]
    fn required_question_left_blank() {
        let mut q = question(1, 1, false);
        q.required = true;
        let err =
            validate_submission(&vote_survey(), &[q], &sheet(1, &[(1, "")], true)).unwrap_err();
        assert_eq!(err, ValidationError::RequiredAnswerMissing { serial_num: 1 });
    }

    #[test]
    fn selection_bounds() {
        let mut q = question(1, 1, false);
        q.minimum_option = 2;
        q.maximum_option = 3;
        let survey = vote_survey();
        let check = |content: &str| {
            validate_submission(&survey, &[q.clone()], &sheet(1, &[(1, content)], true))
        };

        assert!(check("a┋b").is_ok());
        assert!(check("a┋b┋c").is_ok());
        assert!(matches!(
            check("a"),
            Err(ValidationError::OptionCountOutOfRange { selected: 1, .. })
        ));
        assert!(matches!(
            check("a┋b┋c┋d"),
            Err(ValidationError::OptionCountOutOfRange { selected: 4, .. })
        ));

        // Type 1 is single choice in research surveys: no bounds apply.
        let research = Survey {
            kind: SurveyKind::Research,
            ..survey.clone()
        };
        assert!(validate_submission(&research, &[q.clone()], &sheet(1, &[(1, "a")], true)).is_ok());
    }

    #[test]
    fn time_window() {
        let mut survey = vote_survey();
        survey.start_time = submission_time::parse("2024-05-01 08:00:00");
        survey.deadline = submission_time::parse("2024-05-31 20:00:00");
        let questions = vec![question(1, 3, false)];
        let at = |time: &str| {
            let mut s = sheet(1, &[(1, "x")], true);
            s.submitted_at = time.to_string();
            validate_submission(&survey, &questions, &s)
        };

        // Both bounds are inclusive.
        assert!(at("2024-05-01 08:00:00").is_ok());
        assert!(at("2024-05-31 20:00:00").is_ok());
        assert!(matches!(
            at("2024-05-01 07:59:59"),
            Err(ValidationError::SubmissionTooEarly { .. })
        ));
        assert!(matches!(
            at("2024-05-31 20:00:01"),
            Err(ValidationError::SubmissionTooLate { .. })
        ));
        assert!(matches!(
            at("last tuesday"),
            Err(ValidationError::InvalidSubmissionTime { .. })
        ));

        // Without a window the time is not looked at.
        let open = vote_survey();
        let mut s = sheet(1, &[(1, "x")], true);
        s.submitted_at = "last tuesday".to_string();
        assert!(validate_submission(&open, &questions, &s).is_ok());
    }

    #[test]
    fn statistics_need_a_vote_survey() {
        assert!(validate_statistics_request(&vote_survey()).is_ok());
        let research = Survey {
            kind: SurveyKind::Research,
            ..vote_survey()
        };
        assert_eq!(
            validate_statistics_request(&research),
            Err(ValidationError::NotAVoteSurvey { survey_id: 1 })
        );
    }
}
