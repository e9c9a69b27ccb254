use std::collections::{HashMap, HashSet};

use log::{debug, info, warn};

use crate::config::*;
use crate::rank::assign_ranks;

// The running counts of one question.
#[derive(Debug, Default)]
struct QuestionTally<'a> {
    // option content -> serial number
    by_content: HashMap<&'a str, i32>,
    by_serial: HashMap<i32, u64>,
    other: u64,
}

impl<'a> QuestionTally<'a> {
    fn new(options: &'a [QuestionOption]) -> QuestionTally<'a> {
        let mut tally = QuestionTally::default();
        for o in options.iter() {
            if o.serial_num == OTHER_SERIAL_NUM {
                warn!(
                    "question {}: option {:?} uses the reserved serial number, ignored",
                    o.question_id, o.content
                );
                continue;
            }
            tally.by_content.insert(o.content.as_str(), o.serial_num);
            tally.by_serial.insert(o.serial_num, 0);
        }
        tally
    }

    fn add(&mut self, value: &str) {
        match self.by_content.get(value) {
            Some(serial_num) => *self.by_serial.entry(*serial_num).or_insert(0) += 1,
            // Unknown content always lands in "other", whether or not the
            // question offers that choice.
            None => self.other += 1,
        }
    }

    fn count(&self, serial_num: i32) -> u64 {
        self.by_serial.get(&serial_num).cloned().unwrap_or(0)
    }
}

fn options_of(
    options_by_question: &HashMap<QuestionId, Vec<QuestionOption>>,
    question_id: QuestionId,
) -> &[QuestionOption] {
    options_by_question
        .get(&question_id)
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

/// Per-question vote counts over a set of answer sheets.
///
/// Arguments:
/// * `sheets` the answer sheets to count. May be empty.
/// * `questions` the questions of the survey, in display order. The output
/// follows this order.
/// * `options_by_question` the configured options of each question
/// * `counted` the questions whose answers are counted. The other questions
/// are still listed, with all their counts at zero.
///
/// Every selected value of a counted answer increments the option with the
/// same content, or the "other" bucket (serial number 0) when there is none.
/// The "other" bucket is listed first when the question allows it or when it
/// received votes, the configured options follow by serial number.
pub fn aggregate(
    sheets: &[AnswerSheet],
    questions: &[Question],
    options_by_question: &HashMap<QuestionId, Vec<QuestionOption>>,
    counted: &HashSet<QuestionId>,
) -> Vec<QuestionStatistics> {
    info!(
        "aggregate: processing {} answer sheets over {} questions ({} counted)",
        sheets.len(),
        questions.len(),
        counted.len()
    );
    let mut tallies: HashMap<QuestionId, QuestionTally> = questions
        .iter()
        .map(|q| (q.id, QuestionTally::new(options_of(options_by_question, q.id))))
        .collect();

    for sheet in sheets.iter() {
        for answer in sheet.answers.iter() {
            let tally = match tallies.get_mut(&answer.question_id) {
                Some(t) => t,
                None => {
                    warn!(
                        "aggregate: survey {}: answer to unknown question {}, skipped",
                        sheet.survey_id, answer.question_id
                    );
                    continue;
                }
            };
            if !counted.contains(&answer.question_id) {
                continue;
            }
            for value in answer.content.values() {
                tally.add(value);
            }
        }
    }

    let mut res: Vec<QuestionStatistics> = Vec::with_capacity(questions.len());
    for q in questions.iter() {
        let tally = &tallies[&q.id];
        let mut configured: Vec<&QuestionOption> = options_of(options_by_question, q.id)
            .iter()
            .filter(|o| o.serial_num != OTHER_SERIAL_NUM)
            .collect();
        configured.sort_by_key(|o| o.serial_num);

        let mut options: Vec<OptionCount> = Vec::with_capacity(configured.len() + 1);
        if q.other_option || tally.other > 0 {
            options.push(OptionCount {
                serial_num: OTHER_SERIAL_NUM,
                content: OTHER_LABEL.to_string(),
                count: tally.other,
                rank: 1,
            });
        }
        for o in configured {
            options.push(OptionCount {
                serial_num: o.serial_num,
                content: o.content.clone(),
                count: tally.count(o.serial_num),
                rank: 1,
            });
        }
        assign_ranks(&mut options);
        debug!("aggregate: question {}: {:?}", q.id, options);

        res.push(QuestionStatistics {
            serial_num: q.serial_num,
            subject: q.subject.clone(),
            question_type: q.question_type,
            options,
        });
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::*;

    fn counts(qs: &QuestionStatistics) -> Vec<(i32, u64, u32)> {
        qs.options
            .iter()
            .map(|o| (o.serial_num, o.count, o.rank))
            .collect()
    }

    #[test]
    fn no_sheets() {
        init_logs();
        let questions = vec![question(1, 1, true)];
        let opts = options_map(vec![options(1, &["yes", "no"])]);
        let counted = SurveyKind::Vote.counted_questions(&questions);

        let res = aggregate(&[], &questions, &opts, &counted);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].options.len(), 3);
        assert!(res[0].options.iter().all(|o| o.count == 0 && o.rank == 1));
        assert_eq!(res[0].options[0].content, OTHER_LABEL);
    }

    #[test]
    fn multi_select_values_are_split() {
        let questions = vec![question(1, 1, true)];
        let opts = options_map(vec![options(1, &["red", "blue", "green"])]);
        let counted = SurveyKind::Vote.counted_questions(&questions);
        let sheets = vec![sheet(1, &[(1, "red┋blue")], true)];

        let res = aggregate(&sheets, &questions, &opts, &counted);
        assert_eq!(
            counts(&res[0]),
            vec![(0, 0, 3), (1, 1, 1), (2, 1, 1), (3, 0, 3)]
        );
    }

    #[test]
    fn constructed_content_is_split_like_wire_content() {
        let questions = vec![question(1, 1, true)];
        let opts = options_map(vec![options(1, &["red", "blue", "green"])]);
        let counted = SurveyKind::Vote.counted_questions(&questions);
        let mut s = sheet(1, &[(1, "")], true);
        s.answers[0].content = AnswerContent::single("red┋blue");

        let res = aggregate(&[s], &questions, &opts, &counted);
        assert_eq!(
            counts(&res[0]),
            vec![(0, 0, 3), (1, 1, 1), (2, 1, 1), (3, 0, 3)]
        );
    }

    #[test]
    fn unmatched_content_goes_to_other() {
        let questions = vec![question(1, 1, false)];
        let opts = options_map(vec![options(1, &["red", "blue"])]);
        let counted = SurveyKind::Vote.counted_questions(&questions);
        let sheets = vec![
            sheet(1, &[(1, "purple")], true),
            sheet(1, &[(1, "red")], true),
        ];

        let res = aggregate(&sheets, &questions, &opts, &counted);
        let other = res[0].option(OTHER_SERIAL_NUM).unwrap();
        assert_eq!(other.count, 1);
        assert_eq!(res[0].option(1).unwrap().count, 1);
        assert_eq!(res[0].option(2).unwrap().count, 0);
    }

    #[test]
    fn other_hidden_when_not_allowed_and_empty() {
        let questions = vec![question(1, 1, false)];
        let opts = options_map(vec![options(1, &["red", "blue"])]);
        let counted = SurveyKind::Vote.counted_questions(&questions);
        let sheets = vec![sheet(1, &[(1, "blue")], true)];

        let res = aggregate(&sheets, &questions, &opts, &counted);
        assert_eq!(counts(&res[0]), vec![(1, 0, 2), (2, 1, 1)]);
    }

    #[test]
    fn questions_keep_their_order() {
        let questions = vec![
            question(3, 1, false),
            question(1, 2, false),
            question(2, 1, true),
        ];
        let opts = options_map(vec![
            options(1, &["a", "b"]),
            options(2, &["a", "b"]),
            options(3, &["a", "b"]),
        ]);
        let counted = SurveyKind::Vote.counted_questions(&questions);
        let sheets = vec![
            sheet(1, &[(3, "b"), (1, "a"), (2, "zzz")], true),
            sheet(1, &[(3, "b"), (1, "a"), (2, "a")], true),
            sheet(1, &[(3, "a"), (99, "a")], true),
        ];

        let res = aggregate(&sheets, &questions, &opts, &counted);
        let serials: Vec<i32> = res.iter().map(|q| q.serial_num).collect();
        assert_eq!(serials, vec![3, 1, 2]);
        assert_eq!(counts(&res[0]), vec![(1, 1, 2), (2, 2, 1)]);
        // Not counted: listed with zero counts.
        assert_eq!(counts(&res[1]), vec![(1, 0, 1), (2, 0, 1)]);
        assert_eq!(counts(&res[2]), vec![(0, 1, 1), (1, 1, 1), (2, 0, 3)]);
    }

    #[test]
    fn options_sorted_by_serial_number() {
        let questions = vec![question(1, 1, false)];
        let mut opts = options(1, &["a", "b", "c"]);
        opts.reverse();
        let opts = options_map(vec![opts]);
        let counted = SurveyKind::Vote.counted_questions(&questions);
        let sheets = vec![sheet(1, &[(1, "c")], true), sheet(1, &[(1, "c┋a")], true)];

        let res = aggregate(&sheets, &questions, &opts, &counted);
        assert_eq!(counts(&res[0]), vec![(1, 1, 2), (2, 0, 3), (3, 2, 1)]);
    }
}
