// ********* Input data structures ***********

use std::collections::HashSet;
use std::fmt::Display;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type SurveyId = i64;
pub type QuestionId = i64;

/// Separator used by the wire format to join the values of a multi-select answer.
pub const MULTI_SELECT_DELIMITER: &str = "┋";

/// Serial number reserved for the synthetic "other" bucket. No configured option uses it.
pub const OTHER_SERIAL_NUM: i32 = 0;

/// Label of the synthetic "other" bucket in the statistics.
pub const OTHER_LABEL: &str = "other";

/// Status code of a survey that accepts submissions.
pub const SURVEY_STATUS_OPEN: i32 = 2;

/// Format of submission times and of the survey time window.
pub const SUBMISSION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The values selected in one answer, in the order the respondent gave them.
///
/// Single-choice and free text answers hold exactly one value. The transport
/// encoding joins the values with [MULTI_SELECT_DELIMITER]. No value contains
/// the delimiter, so every wire string has exactly one in-memory form.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AnswerContent(Vec<String>);

impl AnswerContent {
    /// Values holding the delimiter are split, as they would be on the wire.
    pub fn new(values: Vec<String>) -> AnswerContent {
        if values.is_empty() {
            AnswerContent(vec![String::new()])
        } else {
            AnswerContent::parse(&values.join(MULTI_SELECT_DELIMITER))
        }
    }

    pub fn single(value: impl Into<String>) -> AnswerContent {
        AnswerContent::parse(&value.into())
    }

    /// Reads the wire encoding.
    pub fn parse(joined: &str) -> AnswerContent {
        AnswerContent(
            joined
                .split(MULTI_SELECT_DELIMITER)
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn joined(&self) -> String {
        self.0.join(MULTI_SELECT_DELIMITER)
    }

    /// True when nothing was written or selected.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|v| v.is_empty())
    }

    pub fn selection_count(&self) -> usize {
        self.0.len()
    }

    /// Case-insensitive substring search over all the values.
    pub fn contains_text(&self, text: &str) -> bool {
        let needle = text.to_lowercase();
        self.0.iter().any(|v| v.to_lowercase().contains(&needle))
    }
}

impl From<String> for AnswerContent {
    fn from(joined: String) -> AnswerContent {
        AnswerContent::parse(&joined)
    }
}

impl From<&str> for AnswerContent {
    fn from(joined: &str) -> AnswerContent {
        AnswerContent::parse(joined)
    }
}

impl From<AnswerContent> for String {
    fn from(content: AnswerContent) -> String {
        content.joined()
    }
}

impl Display for AnswerContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.joined())
    }
}

/// The answer of one respondent to one question.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "questionId")]
    pub question_id: QuestionId,
    #[serde(rename = "serialNum")]
    pub serial_num: i32,
    pub subject: String,
    pub content: AnswerContent,
}

/// One full submission to a survey.
///
/// Once stored, only `is_unique` may change.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSheet {
    #[serde(rename = "surveyId")]
    pub survey_id: SurveyId,
    #[serde(rename = "time")]
    pub submitted_at: String,
    #[serde(rename = "unique", default = "default_unique")]
    pub is_unique: bool,
    pub answers: Vec<Answer>,
}

fn default_unique() -> bool {
    true
}

impl AnswerSheet {
    pub fn answer_to(&self, question_id: QuestionId) -> Option<&Answer> {
        self.answers.iter().find(|a| a.question_id == question_id)
    }
}

/// Identifier assigned by the document store on insertion.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An answer sheet as held by the document store.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct StoredSheet {
    pub id: DocumentId,
    #[serde(flatten)]
    pub sheet: AnswerSheet,
}

// ********* Survey metadata **********

/// The two families of surveys. They differ in the question type codes they use
/// for multi-select questions and in whether vote statistics are available.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SurveyKind {
    Research,
    Vote,
}

impl TryFrom<i32> for SurveyKind {
    type Error = String;

    fn try_from(code: i32) -> Result<SurveyKind, String> {
        match code {
            0 => Ok(SurveyKind::Research),
            1 => Ok(SurveyKind::Vote),
            x => Err(format!("unknown survey type code {}", x)),
        }
    }
}

impl From<SurveyKind> for i32 {
    fn from(kind: SurveyKind) -> i32 {
        match kind {
            SurveyKind::Research => 0,
            SurveyKind::Vote => 1,
        }
    }
}

impl SurveyKind {
    /// Whether a question of this type code accepts several selections.
    pub fn is_multi_select(&self, question_type: i32) -> bool {
        match self {
            SurveyKind::Research => question_type == 2,
            SurveyKind::Vote => question_type == 1,
        }
    }

    /// The questions whose answers are counted in the vote statistics.
    ///
    /// Only vote surveys have counted questions, and only those of type 1.
    pub fn counted_questions(&self, questions: &[Question]) -> HashSet<QuestionId> {
        match self {
            SurveyKind::Research => HashSet::new(),
            SurveyKind::Vote => questions
                .iter()
                .filter(|q| q.question_type == 1)
                .map(|q| q.id)
                .collect(),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    #[serde(rename = "type")]
    pub kind: SurveyKind,
    pub status: i32,
    /// Submissions before this time are rejected.
    #[serde(rename = "startTime", default, with = "submission_time")]
    pub start_time: Option<NaiveDateTime>,
    /// Submissions after this time are rejected.
    #[serde(default, with = "submission_time")]
    pub deadline: Option<NaiveDateTime>,
}

impl Survey {
    /// An open survey without time window.
    pub fn new(id: SurveyId, kind: SurveyKind) -> Survey {
        Survey {
            id,
            kind,
            status: SURVEY_STATUS_OPEN,
            start_time: None,
            deadline: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == SURVEY_STATUS_OPEN
    }
}

/// Serde adapter for optional times written with [SUBMISSION_TIME_FORMAT].
pub mod submission_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::SUBMISSION_TIME_FORMAT;

    pub fn parse(s: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(s.trim(), SUBMISSION_TIME_FORMAT).ok()
    }

    pub fn serialize<S>(t: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match t {
            Some(t) => serializer.serialize_str(&t.format(SUBMISSION_TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => parse(&s).map(Some).ok_or_else(|| {
                serde::de::Error::custom(format!(
                    "invalid time {:?}, expected {}",
                    s, SUBMISSION_TIME_FORMAT
                ))
            }),
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    #[serde(rename = "surveyId")]
    pub survey_id: SurveyId,
    #[serde(rename = "serialNum")]
    pub serial_num: i32,
    pub subject: String,
    #[serde(rename = "questionType")]
    pub question_type: i32,
    #[serde(rename = "otherOption", default)]
    pub other_option: bool,
    #[serde(default)]
    pub required: bool,
    /// Answers to this question are used as the deduplication key.
    #[serde(default)]
    pub unique: bool,
    /// 0 means no lower bound.
    #[serde(rename = "minimumOption", default)]
    pub minimum_option: u32,
    /// 0 means no upper bound.
    #[serde(rename = "maximumOption", default)]
    pub maximum_option: u32,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    #[serde(rename = "questionId")]
    pub question_id: QuestionId,
    #[serde(rename = "serialNum")]
    pub serial_num: i32,
    pub content: String,
}

/// The questions whose answers act as the deduplication key.
pub fn tracked_questions(questions: &[Question]) -> HashSet<QuestionId> {
    questions.iter().filter(|q| q.unique).map(|q| q.id).collect()
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OptionCount {
    #[serde(rename = "serialNum")]
    pub serial_num: i32,
    pub content: String,
    pub count: u64,
    pub rank: u32,
}

/// Vote statistics for one question.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionStatistics {
    #[serde(rename = "serialNum")]
    pub serial_num: i32,
    #[serde(rename = "question")]
    pub subject: String,
    #[serde(rename = "questionType")]
    pub question_type: i32,
    pub options: Vec<OptionCount>,
}

impl QuestionStatistics {
    pub fn option(&self, serial_num: i32) -> Option<&OptionCount> {
        self.options.iter().find(|o| o.serial_num == serial_num)
    }
}
