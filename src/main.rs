mod args;
mod survey;

use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;

use crate::args::{Args, Command};
use answer_engine::SheetQuery;

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    debug!("args: {:?}", args);

    let res = match args.command {
        Command::Submit { files, sheet } => {
            survey::run_submit(&files.survey, &files.store, &sheet)
        }
        Command::Import {
            files,
            input,
            input_type,
            excel_worksheet_name,
        } => survey::run_import(
            &files.survey,
            &files.store,
            &input,
            input_type,
            excel_worksheet_name,
        ),
        Command::Stats {
            files,
            unique_only,
            out,
            reference,
        } => survey::run_statistics(&files.survey, &files.store, unique_only, out, reference),
        Command::List {
            files,
            page,
            page_size,
            text,
            unique_only,
        } => {
            let query = SheetQuery {
                page_num: page,
                page_size,
                text: text.unwrap_or_default(),
                unique_only,
                ..Default::default()
            };
            survey::run_list(&files.survey, &files.store, query)
        }
        Command::Clear { files } => survey::run_clear(&files.survey, &files.store),
    };

    if let Err(e) = res {
        eprintln!("An error occured: {}", e);
        let mut cause = std::error::Error::source(&*e);
        while let Some(c) = cause {
            eprintln!("caused by: {}", c);
            cause = std::error::Error::source(c);
        }
        if let Some(bt) = ErrorCompat::backtrace(&*e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
