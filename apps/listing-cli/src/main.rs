use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use keyset_core::PageRequest;
use keyset_db::{ConnectOpts, DbHandle};
use lesson_listing::client::LessonListingApi;
use lesson_listing::config::ListingConfig;
use lesson_listing::domain::query::{
    AssignedStudentQuery, LessonListQuery, LessonWindow, SubscriptionQuery,
};
use lesson_listing::gateways::local::LessonListingLocalClient;
use lesson_listing::model::{LessonStatus, PurchaseMethod};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs, DatabaseConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const MODULE_NAME: &str = "lesson_listing";

/// Expand a sqlite DSN into an absolute-path DSN using a base directory.
/// In-memory DSNs are kept as-is.
fn absolutize_sqlite_dsn(dsn: &str, base_dir: &Path) -> Result<String> {
    if dsn.eq_ignore_ascii_case("sqlite::memory:") || dsn.eq_ignore_ascii_case("sqlite://:memory:")
    {
        return Ok("sqlite::memory:".to_string());
    }
    let db_path = dsn
        .strip_prefix("sqlite://")
        .ok_or_else(|| anyhow!("DSN must start with sqlite:// (got: {})", dsn))?;

    let (path_str, query) = match db_path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (db_path, None),
    };

    let mut p = PathBuf::from(path_str);
    if p.as_os_str().is_empty() {
        return Err(anyhow!("Empty SQLite path in DSN"));
    }
    if p.is_relative() {
        p = base_dir.join(p);
    }
    if let Some(dir) = p.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let mut out = String::from("sqlite://");
    out.push_str(&p.to_string_lossy().replace('\\', "/"));
    if let Some(q) = query {
        out.push('?');
        out.push_str(q);
    }
    Ok(out)
}

/// Lesson listing - keyset-paginated lists of lessons, students and subscriptions
#[derive(Parser)]
#[command(name = "listing-cli")]
#[command(about = "Keyset-paginated lesson scheduling lists")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database URL (overrides config)
    #[arg(long)]
    database_url: Option<String>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Apply database migrations before running the command
    #[arg(long)]
    migrate: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug)]
struct PageArgs {
    /// Page size (configured default when omitted)
    #[arg(long)]
    limit: Option<u32>,

    /// Cursor taken from a previous page
    #[arg(long)]
    cursor: Option<String>,

    /// Walk toward the previous page
    #[arg(long)]
    backward: bool,
}

impl PageArgs {
    fn request(&self) -> PageRequest {
        let mut page = PageRequest {
            limit: self.limit,
            cursor: self.cursor.clone(),
            ..PageRequest::default()
        };
        if self.backward {
            page = page.backward();
        }
        page
    }
}

#[derive(Args, Debug)]
struct StudentFilterArgs {
    /// Evaluate as of this instant (RFC 3339, defaults to now)
    #[arg(long)]
    at: Option<DateTime<Utc>>,

    #[arg(long = "student", value_delimiter = ',')]
    student_ids: Vec<String>,

    #[arg(long = "course", value_delimiter = ',')]
    course_ids: Vec<String>,

    #[arg(long = "location", value_delimiter = ',')]
    location_ids: Vec<String>,

    /// First start date to include (YYYY-MM-DD)
    #[arg(long)]
    from_date: Option<NaiveDate>,

    /// Last start date to include (YYYY-MM-DD)
    #[arg(long)]
    to_date: Option<NaiveDate>,

    /// Match against the student name
    #[arg(long)]
    keyword: Option<String>,
}

impl StudentFilterArgs {
    fn query(self, method: PurchaseMethod, now: DateTime<Utc>) -> AssignedStudentQuery {
        let mut q = AssignedStudentQuery::new(method, self.at.unwrap_or(now));
        q.student_ids = self.student_ids;
        q.course_ids = self.course_ids;
        q.location_ids = self.location_ids;
        q.from_date = self.from_date;
        q.to_date = self.to_date;
        q.keyword = self.keyword;
        q
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum WindowArg {
    Past,
    Future,
}

impl From<WindowArg> for LessonWindow {
    fn from(w: WindowArg) -> Self {
        match w {
            WindowArg::Past => LessonWindow::Past,
            WindowArg::Future => LessonWindow::Future,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MethodArg {
    Slot,
    Recurring,
}

impl From<MethodArg> for PurchaseMethod {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::Slot => PurchaseMethod::Slot,
            MethodArg::Recurring => PurchaseMethod::Recurring,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List past or future lessons
    Lessons {
        #[command(flatten)]
        page: PageArgs,

        #[arg(long, value_enum, default_value = "future")]
        window: WindowArg,

        /// Instant separating past from future (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// First lesson date to include (YYYY-MM-DD)
        #[arg(long)]
        from_date: Option<NaiveDate>,

        /// Last lesson date to include (YYYY-MM-DD)
        #[arg(long)]
        to_date: Option<NaiveDate>,

        #[arg(long = "location", value_delimiter = ',')]
        location_ids: Vec<String>,

        #[arg(long = "teacher", value_delimiter = ',')]
        teacher_ids: Vec<String>,

        #[arg(long = "course", value_delimiter = ',')]
        course_ids: Vec<String>,

        #[arg(long = "class", value_delimiter = ',')]
        class_ids: Vec<String>,

        #[arg(long = "status", value_delimiter = ',')]
        statuses: Vec<LessonStatus>,

        /// Match against the lesson name
        #[arg(long)]
        keyword: Option<String>,
    },
    /// List students assigned to courses
    AssignedStudents {
        #[command(flatten)]
        page: PageArgs,

        #[arg(long, value_enum, default_value = "slot")]
        method: MethodArg,

        #[command(flatten)]
        filters: StudentFilterArgs,
    },
    /// List student subscriptions
    Subscriptions {
        #[command(flatten)]
        page: PageArgs,

        #[arg(long = "course", value_delimiter = ',')]
        course_ids: Vec<String>,

        #[arg(long = "location", value_delimiter = ',')]
        location_ids: Vec<String>,

        #[arg(long = "grade", value_delimiter = ',')]
        grades: Vec<String>,

        #[arg(long = "class", value_delimiter = ',')]
        class_ids: Vec<String>,

        /// Keep subscriptions active on this date (YYYY-MM-DD)
        #[arg(long)]
        lesson_date: Option<NaiveDate>,

        /// Match against the student name
        #[arg(long)]
        keyword: Option<String>,
    },
    /// Show the recurring occurrence at a 1-based row number
    OccurrenceAt {
        row_number: u64,

        #[command(flatten)]
        filters: StudentFilterArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        database_url: cli.database_url.clone(),
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.clone().unwrap_or_default();
    runtime::init_logging_from_config(&logging_config, Path::new(&config.home_dir));
    tracing::info!("listing-cli starting");

    let db_config = config
        .database
        .clone()
        .ok_or_else(|| anyhow!("Database URL not configured"))?;
    let db = connect(&db_config, Path::new(&config.home_dir)).await?;

    if cli.migrate {
        lesson_listing::migrate(db.seaorm()).await?;
    }

    let outcome = match cli.command {
        Some(command) => {
            let listing_cfg: ListingConfig = config.module_config(MODULE_NAME)?;
            let service = lesson_listing::build_service(db.sea(), &listing_cfg)?;
            let client: Arc<dyn LessonListingApi> =
                Arc::new(LessonListingLocalClient::new(Arc::new(service)));
            run_command(client.as_ref(), command).await
        }
        None if cli.migrate => Ok(()),
        None => Err(anyhow!("No command given, see --help")),
    };

    db.close().await;
    outcome
}

async fn connect(cfg: &DatabaseConfig, base_dir: &Path) -> Result<DbHandle> {
    let mut dsn = cfg.url.trim().to_owned();
    if dsn.is_empty() {
        bail!("Database URL not configured");
    }
    if dsn.starts_with("sqlite://") {
        dsn = absolutize_sqlite_dsn(&dsn, base_dir)?;
    }

    let defaults = ConnectOpts::default();
    let opts = ConnectOpts {
        max_conns: cfg.max_conns.or(defaults.max_conns),
        acquire_timeout: cfg.acquire_timeout.or(defaults.acquire_timeout),
        busy_timeout_ms: cfg.busy_timeout_ms.or(defaults.busy_timeout_ms),
    };

    tracing::info!(dsn = %dsn, "Connecting to database");
    let db = DbHandle::connect(&dsn, opts)
        .await
        .with_context(|| format!("Failed to connect to {dsn}"))?;
    tracing::info!(engine = ?db.engine(), "Connected to database");
    Ok(db)
}

async fn run_command(client: &dyn LessonListingApi, command: Commands) -> Result<()> {
    // one clock reading per invocation
    let now = Utc::now();

    let output = match command {
        Commands::Lessons {
            page,
            window,
            at,
            from_date,
            to_date,
            location_ids,
            teacher_ids,
            course_ids,
            class_ids,
            statuses,
            keyword,
        } => {
            let mut query = LessonListQuery::new(window.into(), at.unwrap_or(now));
            query.from_date = from_date;
            query.to_date = to_date;
            query.location_ids = location_ids;
            query.teacher_ids = teacher_ids;
            query.course_ids = course_ids;
            query.class_ids = class_ids;
            query.statuses = statuses;
            query.keyword = keyword;
            let result = client.list_lessons(query, page.request()).await?;
            serde_json::to_string_pretty(&result)?
        }
        Commands::AssignedStudents {
            page,
            method,
            filters,
        } => {
            let query = filters.query(method.into(), now);
            let result = client.list_assigned_students(query, page.request()).await?;
            serde_json::to_string_pretty(&result)?
        }
        Commands::Subscriptions {
            page,
            course_ids,
            location_ids,
            grades,
            class_ids,
            lesson_date,
            keyword,
        } => {
            let query = SubscriptionQuery {
                course_ids,
                location_ids,
                grades,
                class_ids,
                keyword,
                lesson_date,
            };
            let result = client.list_subscriptions(query, page.request()).await?;
            serde_json::to_string_pretty(&result)?
        }
        Commands::OccurrenceAt {
            row_number,
            filters,
        } => {
            let query = filters.query(PurchaseMethod::Recurring, now);
            let found = client.occurrence_at(query, row_number).await?;
            serde_json::to_string_pretty(&found)?
        }
    };

    println!("{output}");
    Ok(())
}
