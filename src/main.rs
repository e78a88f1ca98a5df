use std::fs::File;
use std::io::stdout;
use std::process::ExitCode;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use log::{error, info};
use prettytable::{format, Cell, Row, Table};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use serde_json::to_writer_pretty;
use text_partition::{open_partitions, BoundedView, Codec, LineReader, PartitionError};

#[derive(ValueEnum, Debug, Clone)]
enum DisplayFormat {
    Table,
    Json,
}

#[derive(Parser, Debug)]
#[command(version, about = "Split a text file into line-aligned partitions and read them in parallel", long_about = None)]
struct Args {
    /// Input file to partition.
    #[arg(short = 'i', long = "input-file")]
    input_file: String,

    /// Number of partitions, if unspecified then one per worker thread.
    #[arg(short = 'p', long = "partitions")]
    partitions: Option<usize>,

    /// Text encoding (utf-8, utf-16le or utf-16be), if unspecified then it is
    /// detected from the byte-order mark, falling back to utf-8.
    #[arg(short = 'e', long = "encoding")]
    encoding: Option<Codec>,

    /// Also count the lines of each partition matching this regular expression.
    #[arg(short = 'm', long = "match")]
    pattern: Option<Regex>,

    /// Format the output as either a table (the default) or JSON.
    #[clap(value_enum, short = 'o', long = "output-format", default_value = "table")]
    output_format: DisplayFormat,
}

/// What one worker found in its partition.
#[derive(Debug, Serialize)]
struct PartitionSummary {
    index: usize,
    /// Byte range in the input file.
    start: u64,
    end: u64,
    lines: u64,
    chars: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    matches: Option<u64>,
}

/// Read every line of one partition. Runs on a rayon worker, one per partition.
fn process_reader(
    index: usize,
    reader: LineReader<BoundedView<File>>,
    pattern: Option<&Regex>,
) -> Result<PartitionSummary, PartitionError> {
    let range = reader.get_ref().range();
    let mut lines = 0;
    let mut chars = 0;
    let mut matches = 0;
    for line in reader {
        let line = line?;
        lines += 1;
        chars += line.chars().count() as u64;
        if pattern.is_some_and(|pattern| pattern.is_match(&line)) {
            matches += 1;
        }
    }
    Ok(PartitionSummary {
        index,
        start: range.start,
        end: range.end,
        lines,
        chars,
        matches: pattern.map(|_| matches),
    })
}

/// Partition the input file and process the partitions in parallel with
/// [Rayon](https://docs.rs/rayon/latest/rayon/).
fn process_file(args: &Args) -> Result<Vec<PartitionSummary>, PartitionError> {
    let partitions = args.partitions.unwrap_or_else(rayon::current_num_threads);
    let readers = open_partitions(&args.input_file, partitions, args.encoding)?;
    info!(
        "reading {} in {} partitions as {}",
        args.input_file,
        readers.len(),
        readers[0].codec()
    );
    readers
        .into_par_iter()
        .enumerate()
        .map(|(index, reader)| process_reader(index, reader, args.pattern.as_ref()))
        .collect()
}

fn display_table(summaries: &[PartitionSummary], args: &Args) {
    let mut table = Table::new();
    let mut titles = vec![
        Cell::new("partition"),
        Cell::new("start"),
        Cell::new("end"),
        Cell::new("lines"),
        Cell::new("chars"),
    ];
    if args.pattern.is_some() {
        titles.push(Cell::new("matches"));
    }
    table.set_titles(Row::new(titles));
    for summary in summaries {
        let mut cells = vec![
            Cell::new(&summary.index.to_string()),
            Cell::new(&summary.start.to_string()),
            Cell::new(&summary.end.to_string()),
            Cell::new(&summary.lines.to_string()),
            Cell::new(&summary.chars.to_string()),
        ];
        if let Some(matches) = summary.matches {
            cells.push(Cell::new(&matches.to_string()));
        }
        table.add_row(Row::new(cells));
    }
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.printstd();
}

#[derive(Serialize)]
struct JsonOut<'a> {
    partitions: &'a [PartitionSummary],
}

fn display_json(summaries: &[PartitionSummary]) -> serde_json::Result<()> {
    to_writer_pretty(stdout(), &JsonOut { partitions: summaries })
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    if args.partitions == Some(0) {
        Args::command()
            .error(ErrorKind::ValueValidation, "partitions must be positive")
            .exit();
    }
    let summaries = match process_file(&args) {
        Ok(summaries) => summaries,
        Err(err) => {
            error!("could not process {}: {}", args.input_file, err);
            return ExitCode::FAILURE;
        }
    };
    match args.output_format {
        DisplayFormat::Table => display_table(&summaries, &args),
        DisplayFormat::Json => {
            if let Err(err) = display_json(&summaries) {
                error!("could not write JSON output: {}", err);
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}
