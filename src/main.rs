use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use registrar::application::enrollment::{EnrollmentService, NotificationOutcome};
use registrar::application::transfer::AccountTransferService;
use registrar::config::{LogFormat, RegistrarConfig};
use registrar::domain::course::CourseId;
use registrar::domain::ports::RepositoryRef;
use registrar::domain::student::StudentId;
use registrar::infrastructure::in_memory::InMemoryRepository;
use registrar::infrastructure::notifier::LogNotifier;
use registrar::interfaces::csv::request_reader::{Request, RequestReader};
use registrar::interfaces::csv::roster::{self, RosterWriter};
use registrar::logging;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a CSV file of transfer and enroll requests, then print the student roster
    Process {
        /// Requests CSV (`type, student, to, amount, courses`)
        input: PathBuf,
        /// Students CSV to load before processing
        #[arg(long)]
        students: Option<PathBuf>,
        /// Courses CSV to load before processing
        #[arg(long)]
        courses: Option<PathBuf>,
    },
    /// Transfer balance between two students
    Transfer {
        #[arg(long)]
        from: StudentId,
        #[arg(long)]
        to: StudentId,
        #[arg(long, allow_hyphen_values = true)]
        amount: i64,
    },
    /// Enroll a student in one or more courses
    Enroll {
        #[arg(long)]
        student: StudentId,
        #[arg(long = "course", required = true)]
        courses: Vec<CourseId>,
    },
    /// Print all students
    Students,
    /// Print courses
    Courses {
        /// Only active courses
        #[arg(long)]
        active: bool,
        /// Only courses created before this RFC 3339 timestamp
        #[arg(long)]
        created_before: Option<DateTime<Utc>>,
    },
    /// Print enrollments
    Enrollments {
        #[arg(long)]
        student: Option<StudentId>,
    },
    /// Load students from a CSV file
    ImportStudents { file: PathBuf },
    /// Load courses from a CSV file
    ImportCourses { file: PathBuf },
}

#[cfg(feature = "storage-rocksdb")]
fn open_repository(db_path: Option<&Path>) -> Result<RepositoryRef> {
    use registrar::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Arc::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Arc::new(InMemoryRepository::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_repository(db_path: Option<&Path>) -> Result<RepositoryRef> {
    if db_path.is_some() {
        tracing::warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryRepository::new()))
}

async fn import_students(repository: &RepositoryRef, path: &Path) -> Result<usize> {
    let students = roster::read_students(File::open(path).into_diagnostic()?).into_diagnostic()?;
    let count = students.len();
    for student in students {
        repository.store_student(student).await.into_diagnostic()?;
    }
    tracing::info!(count, path = %path.display(), "imported students");
    Ok(count)
}

async fn import_courses(repository: &RepositoryRef, path: &Path) -> Result<usize> {
    let courses = roster::read_courses(File::open(path).into_diagnostic()?).into_diagnostic()?;
    let count = courses.len();
    for course in courses {
        repository.store_course(course).await.into_diagnostic()?;
    }
    tracing::info!(count, path = %path.display(), "imported courses");
    Ok(count)
}

fn log_notification(student: StudentId, outcome: &NotificationOutcome) {
    if let NotificationOutcome::Failed(reason) = outcome {
        tracing::warn!(student, %reason, "enrollment confirmation was not delivered");
    }
}

async fn print_students(repository: &RepositoryRef) -> Result<()> {
    let students = repository.all_students().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = RosterWriter::new(stdout.lock());
    writer.write_students(&students).into_diagnostic()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RegistrarConfig::load(path).into_diagnostic()?,
        None => RegistrarConfig::default(),
    };
    logging::init(
        cli.verbose || config.logging.verbose,
        cli.log_format.unwrap_or(config.logging.format),
    );

    let db_path = cli.db_path.or(config.storage.db_path);
    let repository = open_repository(db_path.as_deref())?;
    let retries = config.retry.max_conflict_retries;
    let transfers = AccountTransferService::new(repository.clone(), retries);
    let enrollments =
        EnrollmentService::new(repository.clone(), Arc::new(LogNotifier), retries);

    match cli.command {
        Command::Process {
            input,
            students,
            courses,
        } => {
            if let Some(path) = students {
                import_students(&repository, &path).await?;
            }
            if let Some(path) = courses {
                import_courses(&repository, &path).await?;
            }

            let file = File::open(input).into_diagnostic()?;
            let reader = RequestReader::new(file);
            for request in reader.requests() {
                match request {
                    Ok(Request::Transfer { from, to, amount }) => {
                        if let Err(e) = transfers.transfer(from, to, amount).await {
                            tracing::error!(from, to, amount, kind = ?e.kind(), "Error processing request: {}", e);
                        }
                    }
                    Ok(Request::Enroll { student, courses }) => {
                        match enrollments.enroll(student, courses).await {
                            Ok(report) => log_notification(student, &report.notification),
                            Err(e) => {
                                tracing::error!(student, kind = ?e.kind(), "Error processing request: {}", e)
                            }
                        }
                    }
                    Err(e) => tracing::error!("Error reading request: {}", e),
                }
            }

            print_students(&repository).await?;
        }
        Command::Transfer { from, to, amount } => {
            transfers.transfer(from, to, amount).await.into_diagnostic()?;
            print_students(&repository).await?;
        }
        Command::Enroll { student, courses } => {
            let report = enrollments.enroll(student, courses).await.into_diagnostic()?;
            log_notification(student, &report.notification);
            println!(
                "enrolled student {} in {:?}; already enrolled in {:?}; activated {:?}",
                report.student, report.newly_enrolled, report.already_enrolled, report.activated
            );
        }
        Command::Students => print_students(&repository).await?,
        Command::Courses {
            active,
            created_before,
        } => {
            let mut courses = match created_before {
                Some(cutoff) => repository
                    .courses_created_before(cutoff)
                    .await
                    .into_diagnostic()?,
                None if active => repository.active_courses().await.into_diagnostic()?,
                None => repository.all_courses().await.into_diagnostic()?,
            };
            if active {
                courses.retain(|c| c.active);
            }
            let stdout = io::stdout();
            let mut writer = RosterWriter::new(stdout.lock());
            writer.write_courses(&courses).into_diagnostic()?;
        }
        Command::Enrollments { student } => {
            let rows = match student {
                Some(id) => repository.enrollments_for_student(id).await,
                None => repository.all_enrollments().await,
            }
            .into_diagnostic()?;
            let courses: HashMap<_, _> = repository
                .all_courses()
                .await
                .into_diagnostic()?
                .into_iter()
                .map(|c| (c.id, c))
                .collect();
            let stdout = io::stdout();
            let mut writer = RosterWriter::new(stdout.lock());
            writer.write_enrollments(&rows, &courses).into_diagnostic()?;
        }
        Command::ImportStudents { file } => {
            let count = import_students(&repository, &file).await?;
            println!("imported {} students", count);
        }
        Command::ImportCourses { file } => {
            let count = import_courses(&repository, &file).await?;
            println!("imported {} courses", count);
        }
    }

    Ok(())
}
