use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod classify;
mod config;
mod error;
mod merge;
mod models;
mod normalize;
mod pipeline;
mod report;
mod source;

use crate::config::{EvaluationOptions, MappingFile};
use crate::merge::JoinKey;
use crate::models::{ClassFilter, GradeLevel, Section, Subject};

#[derive(Parser)]
#[command(name = "term-score-analyzer")]
#[command(about = "Merge period score exports for one class and classify students", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Markdown,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the period exports and classify every student
    Analyze {
        /// First grading period export (CSV or workbook)
        #[arg(long = "period-1")]
        period_1: Option<PathBuf>,
        /// Second grading period export (CSV or workbook)
        #[arg(long = "period-2")]
        period_2: Option<PathBuf>,
        /// End-of-term export (CSV or workbook)
        #[arg(long = "end-of-term")]
        end_of_term: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Subject::Arabic)]
        subject: Subject,
        /// Primary grade level, 1 to 6
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=6))]
        grade: u8,
        /// Class section, 1 to 4
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=4))]
        section: u8,
        /// JSON file mapping each period's headers onto the standard fields
        #[arg(long)]
        mapping: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = JoinKey::IdAndName)]
        key: JoinKey,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Include the progress of this student across periods
        #[arg(long)]
        student: Option<String>,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the column headers of an export (CSV or workbook)
    Headers {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print a mapping file that uses the standard column names
    MappingTemplate,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn emit(out: Option<&PathBuf>, contents: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, contents)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{contents}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            period_1,
            period_2,
            end_of_term,
            subject,
            grade,
            section,
            mapping,
            key,
            format,
            student,
            out,
        } => {
            let mappings = match mapping {
                Some(path) => MappingFile::load(&path)?,
                None => MappingFile::default(),
            };
            let options = EvaluationOptions {
                subject,
                filter: ClassFilter {
                    grade: GradeLevel::new(grade).context("grade must be between 1 and 6")?,
                    section: Section::new(section).context("section must be between 1 and 4")?,
                },
                join_key: key,
                mappings,
            };

            let tables = source::load_period_tables([period_1, period_2, end_of_term]).await;
            let evaluation = pipeline::evaluate(tables, &options);
            if let Some(result) = evaluation.result() {
                let counts = result.summary();
                info!(
                    students = counts.total,
                    weak = counts.weak,
                    excellent = counts.excellent,
                    "evaluation complete"
                );
            }

            let rendered = match format {
                OutputFormat::Markdown => report::build_report(
                    &evaluation,
                    &options,
                    chrono::Local::now().date_naive(),
                    student.as_deref(),
                ),
                OutputFormat::Json => report::build_json(&evaluation, student.as_deref())?,
                OutputFormat::Csv => report::build_csv(&evaluation)?,
            };
            emit(out.as_ref(), &rendered)?;
        }
        Commands::Headers { file } => {
            for (index, header) in source::read_headers(&file)?.iter().enumerate() {
                println!("{}: {}", index + 1, header);
            }
        }
        Commands::MappingTemplate => {
            let template = serde_json::to_string_pretty(&MappingFile::template())?;
            println!("{template}");
        }
    }

    Ok(())
}
