use std::collections::{HashMap, HashSet};
use std::fs;

use answer_engine::*;
use chrono::NaiveDateTime;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;

use crate::survey::io_common::current_time;
use crate::survey::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OptionConfig {
    #[serde(rename = "serialNum")]
    pub serial_num: i32,
    pub content: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionConfig {
    pub id: QuestionId,
    #[serde(rename = "serialNum")]
    pub serial_num: i32,
    pub subject: String,
    #[serde(rename = "questionType")]
    pub question_type: i32,
    #[serde(rename = "otherOption")]
    pub other_option: Option<bool>,
    pub required: Option<bool>,
    pub unique: Option<bool>,
    #[serde(rename = "minimumOption")]
    pub minimum_option: Option<u32>,
    #[serde(rename = "maximumOption")]
    pub maximum_option: Option<u32>,
    pub options: Option<Vec<OptionConfig>>,
}

/// The survey definition file.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    pub id: SurveyId,
    #[serde(rename = "type")]
    pub survey_type: i32,
    /// Defaults to open.
    pub status: Option<i32>,
    #[serde(rename = "startTime", default, with = "submission_time")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(default, with = "submission_time")]
    pub deadline: Option<NaiveDateTime>,
    pub title: Option<String>,
    pub questions: Vec<QuestionConfig>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    #[serde(rename = "questionId")]
    pub question_id: QuestionId,
    pub content: String,
}

/// An answer sheet as written by hand: the serial numbers and subjects are
/// taken from the survey definition.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    #[serde(rename = "surveyId")]
    pub survey_id: SurveyId,
    pub time: Option<String>,
    pub answers: Vec<AnswerConfig>,
}

/// A validated survey definition, in the shape the engine consumes.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyDefinition {
    pub survey: Survey,
    pub title: Option<String>,
    pub questions: Vec<Question>,
    pub options: HashMap<QuestionId, Vec<QuestionOption>>,
}

impl SurveyDefinition {
    pub fn question(&self, question_id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

fn read_json_file(path: &str) -> BSurveyResult<String> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    Ok(contents)
}

pub fn read_survey_definition(path: &str) -> BSurveyResult<SurveyDefinition> {
    let contents = read_json_file(path)?;
    let config: SurveyConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_survey_definition: {:?}", config);
    let def = validate_config(&config)?;
    Ok(def)
}

fn validate_config(config: &SurveyConfig) -> SurveyResult<SurveyDefinition> {
    let kind = match SurveyKind::try_from(config.survey_type) {
        Ok(k) => k,
        Err(msg) => whatever!("Survey {}: {}", config.id, msg),
    };

    let mut seen: HashSet<QuestionId> = HashSet::new();
    let mut questions: Vec<Question> = Vec::new();
    let mut options: HashMap<QuestionId, Vec<QuestionOption>> = HashMap::new();
    for qc in config.questions.iter() {
        if !seen.insert(qc.id) {
            whatever!("Question id {} is defined twice", qc.id);
        }
        let mut q_options: Vec<QuestionOption> = Vec::new();
        for oc in qc.options.clone().unwrap_or_default() {
            if oc.serial_num == OTHER_SERIAL_NUM {
                whatever!(
                    "Question {}: option serial number {} is reserved for the '{}' entry",
                    qc.id,
                    OTHER_SERIAL_NUM,
                    OTHER_LABEL
                );
            }
            q_options.push(QuestionOption {
                question_id: qc.id,
                serial_num: oc.serial_num,
                content: oc.content,
            });
        }
        options.insert(qc.id, q_options);
        questions.push(Question {
            id: qc.id,
            survey_id: config.id,
            serial_num: qc.serial_num,
            subject: qc.subject.clone(),
            question_type: qc.question_type,
            other_option: qc.other_option.unwrap_or(false),
            required: qc.required.unwrap_or(false),
            unique: qc.unique.unwrap_or(false),
            minimum_option: qc.minimum_option.unwrap_or(0),
            maximum_option: qc.maximum_option.unwrap_or(0),
        });
    }

    Ok(SurveyDefinition {
        survey: Survey {
            id: config.id,
            kind,
            status: config.status.unwrap_or(SURVEY_STATUS_OPEN),
            start_time: config.start_time,
            deadline: config.deadline,
        },
        title: config.title.clone(),
        questions,
        options,
    })
}

pub fn read_answer_sheet(path: &str, def: &SurveyDefinition) -> BSurveyResult<AnswerSheet> {
    let contents = read_json_file(path)?;
    let config: SheetConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    Ok(sheet_from_config(config, def))
}

fn sheet_from_config(config: SheetConfig, def: &SurveyDefinition) -> AnswerSheet {
    let answers = config
        .answers
        .into_iter()
        .map(|ac| {
            // Unknown questions are kept as is, the validation rejects them.
            let (serial_num, subject) = match def.question(ac.question_id) {
                Some(q) => (q.serial_num, q.subject.clone()),
                None => (0, String::new()),
            };
            Answer {
                question_id: ac.question_id,
                serial_num,
                subject,
                content: AnswerContent::parse(&ac.content),
            }
        })
        .collect();
    AnswerSheet {
        survey_id: config.survey_id,
        submitted_at: config.time.unwrap_or_else(current_time),
        is_unique: true,
        answers,
    }
}

pub fn read_summary(path: &str) -> BSurveyResult<JSValue> {
    let contents = read_json_file(path)?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}
