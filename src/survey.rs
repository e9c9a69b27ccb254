use log::{debug, info, warn};

use answer_engine::*;
use snafu::{prelude::*, Snafu};

use std::fs;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::survey::config_reader::*;
use crate::survey::io_common::*;
use crate::survey::io_store::JsonFileStore;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
pub mod io_store;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing file {path}"))]
    WritingJson {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Error opening CSV file"))]
    CsvOpen { source: csv::Error },
    #[snafu(display("Error parsing CSV line"))]
    CsvLineParse { source: csv::Error },

    #[snafu(display("Error opening Excel file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The Excel file has no worksheet or no header row"))]
    EmptyExcel {},
    #[snafu(display("The Excel file has no worksheet named {name}"))]
    ExcelWorksheetMissing { name: String },
    #[snafu(display("Unexpected cell type in line {lineno}: {content}"))]
    ExcelWrongCellType { lineno: u64, content: String },

    #[snafu(display("Column {column:?} does not match the subject of any question"))]
    UnknownColumn { column: String },

    #[snafu(display("Store file {path} could not be loaded"))]
    LoadingStore {
        source: serde_json::Error,
        path: String,
    },

    #[snafu(display("Engine error"))]
    Engine { source: EngineError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;
pub type BSurveyResult<T> = Result<T, Box<SurveyError>>;

fn describe_outcome(outcome: &SubmitOutcome) -> String {
    match outcome {
        SubmitOutcome::Inserted(id) => format!("stored answer sheet {}", id),
        SubmitOutcome::InsertedFirst(id) => format!("stored answer sheet {} (unique)", id),
        SubmitOutcome::Superseded { demoted, inserted } => format!(
            "stored answer sheet {} (unique), answer sheet {} is superseded",
            inserted, demoted
        ),
    }
}

pub fn run_submit(survey_path: &str, store_path: &str, sheet_path: &str) -> BSurveyResult<()> {
    let def = read_survey_definition(survey_path)?;
    let store = JsonFileStore::open(store_path)?;
    let sheet = read_answer_sheet(sheet_path, &def)?;
    info!("sheet: {:?}", sheet);

    let outcome =
        submit_answer_sheet(&store, &def.survey, &def.questions, &sheet).context(EngineSnafu {})?;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

fn read_sheets_data(
    path: &str,
    input_type: &str,
    excel_worksheet_name: Option<String>,
) -> BSurveyResult<Vec<ParsedSheet>> {
    info!("Attempting to read answer sheets from {:?}", path);
    match input_type {
        "csv" => io_csv::read_csv_sheets(path),
        "xlsx" => io_excel::read_excel_sheets(path, excel_worksheet_name),
        x => Err(Box::new(SurveyError::Whatever {
            message: format!("Input type not implemented {:?}", x),
            source: None,
        })),
    }
}

pub fn run_import(
    survey_path: &str,
    store_path: &str,
    input_path: &str,
    input_type: Option<String>,
    excel_worksheet_name: Option<String>,
) -> BSurveyResult<()> {
    let def = read_survey_definition(survey_path)?;
    let store = JsonFileStore::open(store_path)?;
    let input_type = input_type.unwrap_or_else(|| "csv".to_string());
    let parsed = read_sheets_data(input_path, &input_type, excel_worksheet_name)?;
    debug!("run_import: {} rows read", parsed.len());

    let default_time = current_time();
    let mut sheets: Vec<AnswerSheet> = Vec::new();
    for ps in parsed.iter() {
        sheets.push(assemble_sheet(&def, ps, &default_time)?);
    }

    // All the rows go through one store transaction.
    let results = submit_answer_sheets(&store, &def.survey, &def.questions, &sheets)
        .context(EngineSnafu {})?;
    let mut stored = 0;
    let mut superseded = 0;
    let mut skipped = 0;
    for (ps, res) in parsed.iter().zip(results.iter()) {
        match res {
            Ok(outcome) => {
                debug!("run_import: {}: {}", ps.id, describe_outcome(outcome));
                stored += 1;
                if matches!(outcome, SubmitOutcome::Superseded { .. }) {
                    superseded += 1;
                }
            }
            // Invalid rows are reported and skipped, the others are still imported.
            Err(e) => {
                warn!("run_import: {}: skipping answer sheet: {}", ps.id, e);
                skipped += 1;
            }
        }
    }
    println!(
        "imported {} answer sheets ({} superseded an earlier sheet), skipped {}",
        stored, superseded, skipped
    );
    Ok(())
}

fn build_summary_js(
    def: &SurveyDefinition,
    stats: &[QuestionStatistics],
) -> BSurveyResult<JSValue> {
    let stats_js = serde_json::to_value(stats).context(ParsingJsonSnafu {})?;
    Ok(json!({
        "config": {
            "survey": def.survey.id,
            "title": def.title,
        },
        "statistics": stats_js }))
}

fn write_output(out: Option<String>, content: &str) -> BSurveyResult<()> {
    match out.as_deref() {
        None | Some("stdout") | Some("") => {
            println!("{}", content);
        }
        Some(path) => {
            info!("Writing statistics to {}", path);
            fs::write(path, content).context(WritingJsonSnafu { path })?;
        }
    }
    Ok(())
}

pub fn run_statistics(
    survey_path: &str,
    store_path: &str,
    unique_only: bool,
    out: Option<String>,
    check_summary_path: Option<String>,
) -> BSurveyResult<()> {
    let def = read_survey_definition(survey_path)?;
    let store = JsonFileStore::open(store_path)?;

    let stats = survey_statistics(
        &store,
        &def.survey,
        &def.questions,
        &def.options,
        unique_only,
    )
    .context(EngineSnafu {})?;

    // Assemble the final json
    let result_js = build_summary_js(&def, &stats)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_output(out, &pretty_js_stats)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(&summary_p)?;
        debug!("summary: {:?}", summary_ref);
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            return Err(Box::new(SurveyError::Whatever {
                message: "Difference detected between calculated statistics and reference statistics"
                    .into(),
                source: None,
            }));
        }
    }
    Ok(())
}

pub fn run_list(
    survey_path: &str,
    store_path: &str,
    query: SheetQuery,
) -> BSurveyResult<()> {
    let def = read_survey_definition(survey_path)?;
    let store = JsonFileStore::open(store_path)?;
    let query = SheetQuery {
        survey_id: def.survey.id,
        ..query
    };
    let page = list_answer_sheets(&store, &query)
        .map_err(|source| EngineError::Store { source })
        .context(EngineSnafu {})?;
    let view = answers_by_question(&page.sheets, &def.questions);

    let ids: Vec<JSValue> = page
        .sheets
        .iter()
        .map(|s| json!({"id": s.id, "unique": s.sheet.is_unique}))
        .collect();
    let js = json!({
        "total": page.total,
        "sheets": ids,
        "answers": view,
    });
    let pretty = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
    println!("{}", pretty);
    Ok(())
}

pub fn run_clear(survey_path: &str, store_path: &str) -> BSurveyResult<()> {
    let def = read_survey_definition(survey_path)?;
    let store = JsonFileStore::open(store_path)?;
    let deleted = delete_answer_sheets(&store, def.survey.id)
        .map_err(|source| EngineError::Store { source })
        .context(EngineSnafu {})?;
    println!("deleted {} answer sheets of survey {}", deleted, def.survey.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const SURVEY: &str = r#"{
        "id": 7,
        "type": 1,
        "title": "Class representative",
        "questions": [
            {"id": 70, "serialNum": 1, "subject": "Student id", "questionType": 3,
             "required": true, "unique": true, "options": []},
            {"id": 71, "serialNum": 2, "subject": "Candidates", "questionType": 1,
             "otherOption": true, "maximumOption": 2,
             "options": [{"serialNum": 1, "content": "Ann"}, {"serialNum": 2, "content": "Ben"}]}
        ]
    }"#;

    fn write(dir: &Path, name: &str, content: &str) -> String {
        let p = dir.join(name);
        fs::write(&p, content).unwrap();
        p.display().to_string()
    }

    #[test]
    fn import_then_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let survey = write(dir.path(), "survey.json", SURVEY);
        let store = dir.path().join("store.json").display().to_string();
        let input = write(
            dir.path(),
            "votes.csv",
            "time,Student id,Candidates\n\
             2024-01-01 10:00:00,s1,Ann\n\
             2024-01-01 10:01:00,s2,Ann┋Ben\n\
             2024-01-01 10:02:00,s1,Ben\n\
             2024-01-01 10:03:00,s3,Ann┋Ben┋Zed\n",
        );
        run_import(&survey, &store, &input, None, None).unwrap();

        let out = dir.path().join("stats.json").display().to_string();
        run_statistics(&survey, &store, true, Some(out.clone()), None).unwrap();
        let js: JSValue = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let candidates = &js["statistics"][1]["options"];
        // other, Ann, Ben
        assert_eq!(candidates[0]["count"], json!(0));
        assert_eq!(candidates[1]["count"], json!(1));
        assert_eq!(candidates[2]["count"], json!(2));
        assert_eq!(candidates[2]["rank"], json!(1));

        // The output is its own reference.
        run_statistics(&survey, &store, true, Some(out.clone()), Some(out)).unwrap();
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let survey = write(dir.path(), "survey.json", SURVEY);
        let store = dir.path().join("store.json").display().to_string();
        let reference = write(dir.path(), "ref.json", r#"{"statistics": []}"#);
        let out = dir.path().join("stats.json").display().to_string();
        let res = run_statistics(&survey, &store, false, Some(out), Some(reference));
        assert!(res.is_err());
    }

    #[test]
    fn submit_single_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let survey = write(dir.path(), "survey.json", SURVEY);
        let store = dir.path().join("store.json").display().to_string();
        let sheet = write(
            dir.path(),
            "sheet.json",
            r#"{"surveyId": 7, "answers": [
                {"questionId": 70, "content": "s9"},
                {"questionId": 71, "content": "Ben"}]}"#,
        );
        run_submit(&survey, &store, &sheet).unwrap();
        run_submit(&survey, &store, &sheet).unwrap();

        let coll = JsonFileStore::open(&store).unwrap().snapshot().unwrap();
        assert_eq!(coll.len(), 2);
        assert!(!coll.documents()[0].sheet.is_unique);
        assert!(coll.documents()[1].sheet.is_unique);
        assert_eq!(coll.documents()[1].sheet.answers[1].subject, "Candidates");

        run_clear(&survey, &store).unwrap();
        let coll = JsonFileStore::open(&store).unwrap().snapshot().unwrap();
        assert!(coll.is_empty());
    }
}
