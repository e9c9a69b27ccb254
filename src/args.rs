use clap::{Parser, Subcommand};

/// This is a survey answer sheet store and vote tabulation program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validates one answer sheet and stores it, superseding the sheet it duplicates.
    Submit {
        #[clap(flatten)]
        files: SurveyFiles,

        /// (file path) The answer sheet in JSON format. The `time` field may be omitted,
        /// in which case the current local time is used.
        #[clap(short = 'a', long, value_parser)]
        sheet: String,
    },

    /// Reads many answer sheets from a CSV or Excel file and submits them in order.
    Import {
        #[clap(flatten)]
        files: SurveyFiles,

        /// (file path) The file containing the answer sheets.
        #[clap(short, long, value_parser)]
        input: String,

        /// (default csv) The type of the input: csv or xlsx.
        #[clap(long, value_parser)]
        input_type: Option<String>,

        /// (default: first worksheet) When using an Excel file, indicates the name of the worksheet to use.
        #[clap(long, value_parser)]
        excel_worksheet_name: Option<String>,
    },

    /// Computes the vote statistics of the survey.
    Stats {
        #[clap(flatten)]
        files: SurveyFiles,

        /// Only count the answer sheets currently flagged unique.
        #[clap(long, takes_value = false)]
        unique_only: bool,

        /// (file path, 'stdout' or empty) If specified, the statistics will be written in JSON format
        /// to the given location. Otherwise they are printed on the standard output.
        #[clap(short, long, value_parser)]
        out: Option<String>,

        /// (file path) A reference file containing expected statistics in JSON format. If provided,
        /// surveytally will check that the computed statistics match the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },

    /// Lists the stored answer sheets of the survey.
    List {
        #[clap(flatten)]
        files: SurveyFiles,

        /// (1-based) The page to show. Pages are only used if --page-size is also given.
        #[clap(long, value_parser, default_value_t = 0)]
        page: u64,

        #[clap(long, value_parser, default_value_t = 0)]
        page_size: u64,

        /// Only the sheets with an answer containing this text (case insensitive).
        #[clap(long, value_parser)]
        text: Option<String>,

        /// Only the answer sheets currently flagged unique.
        #[clap(long, takes_value = false)]
        unique_only: bool,
    },

    /// Deletes all the stored answer sheets of the survey.
    Clear {
        #[clap(flatten)]
        files: SurveyFiles,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct SurveyFiles {
    /// (file path) The survey definition in JSON format: the survey, its questions and their options.
    #[clap(short, long, value_parser)]
    pub survey: String,

    /// (file path) The JSON file holding the answer sheets. It is created if it does not exist.
    #[clap(long, value_parser)]
    pub store: String,
}
