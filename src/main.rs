use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use clinicap_lib::aggregate::{self, SummaryRow};
use clinicap_lib::capture::{self, CaptureRequest, CaptureService};
use clinicap_lib::config;
use clinicap_lib::generator::{self, GeneratorConfig, RecordGenerator};
use clinicap_lib::models::{CardiacEvent, PatientMeasurement, VisitRecord};
use clinicap_lib::randomness::{LocalRange, StdRandom};
use clinicap_lib::remote::RandomNumberApiClient;
use clinicap_lib::store::{RecordStore, RewriteMode};
use clinicap_lib::CoreError;

#[derive(Debug, Parser)]
#[command(
    name = "clinicap",
    version,
    about = "Synthetic visit logs and BMI / cardiac-event capture",
    long_about = "clinicap generates synthetic clinic visit logs and captures\n\
        height, weight, BMI and cardiac-event measurements.\n\n\
        Commands:\n  \
        generate        Write a synthetic visit log\n  \
        summarize       Print a canned summary of a log\n  \
        capture         Append one measurement\n  \
        random-patient  Draw and optionally append a random patient\n  \
        records         List stored measurements\n  \
        delete          Remove a measurement by row index"
)]
struct Cli {
    /// Directory holding visit_data.csv and data.csv (defaults to ~/Clinicap)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// How deletes and full rewrites touch the file
    #[arg(long, global = true, value_enum, default_value_t = RewriteArg::InPlace)]
    rewrite_mode: RewriteArg,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a synthetic visit log, replacing any existing one
    Generate(GenerateArgs),
    /// Summarize the visit or measurement log
    Summarize(SummarizeArgs),
    /// Capture one measurement and append it to the log
    Capture(CaptureArgs),
    /// Draw a random patient's height and weight
    RandomPatient(RandomPatientArgs),
    /// List stored measurements with their row index
    Records,
    /// Delete a stored measurement by row index
    Delete {
        /// Zero-based row index as shown by `records`
        index: usize,
    },
}

#[derive(Debug, Args)]
struct GenerateArgs {
    /// Number of original visits
    #[arg(long, default_value_t = config::DEFAULT_VISIT_COUNT)]
    count: usize,

    /// Number of duplicated visits appended after the originals
    #[arg(long, default_value_t = config::DEFAULT_DUPLICATE_COUNT)]
    duplicates: usize,

    /// Seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// JSON generator configuration (names, reasons, tables, year)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output file (defaults to <data-dir>/visit_data.csv)
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SummaryView {
    /// Visit count per reason and month
    ReasonMonth,
    /// Mean visit duration per reason
    MeanDuration,
    /// Visit durations listed per reason
    DurationSeries,
    /// Mean BMI per cardiac-event label
    BmiByEvent,
    /// BMI values listed per cardiac-event label
    BmiSeries,
}

#[derive(Debug, Args)]
struct SummarizeArgs {
    #[arg(value_enum)]
    view: SummaryView,

    /// Drop repeated rows before summarizing
    #[arg(long)]
    dedup: bool,

    /// Log file to read (defaults to the view's log under <data-dir>)
    #[arg(long)]
    input: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CaptureArgs {
    /// Height in metres
    #[arg(long)]
    height: f64,

    /// Weight in kilograms
    #[arg(long)]
    weight: f64,

    /// Cardiac event label (Yes/No); derived from BMI when omitted
    #[arg(long)]
    event: Option<CardiacEvent>,
}

#[derive(Debug, Args)]
struct RandomPatientArgs {
    /// Draw locally instead of calling the random-number service
    #[arg(long)]
    offline: bool,

    /// Random-number service base URL
    #[arg(long, default_value = config::RANDOM_API_BASE_URL)]
    api_url: String,

    /// Append the drawn patient to the measurement log
    #[arg(long)]
    save: bool,

    /// Seed for offline draws and the risk model
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RewriteArg {
    InPlace,
    TempThenRename,
}

impl From<RewriteArg> for RewriteMode {
    fn from(arg: RewriteArg) -> Self {
        match arg {
            RewriteArg::InPlace => RewriteMode::InPlace,
            RewriteArg::TempThenRename => RewriteMode::TempThenRename,
        }
    }
}

fn main() {
    clinicap_lib::init_tracing();

    let cli = Cli::parse();
    let ctx = Context {
        data_dir: cli.data_dir.clone().unwrap_or_else(config::app_data_dir),
        mode: cli.rewrite_mode.into(),
        json: cli.json,
    };

    let result = match &cli.command {
        Command::Generate(args) => run_generate(&ctx, args),
        Command::Summarize(args) => run_summarize(&ctx, args),
        Command::Capture(args) => run_capture(&ctx, args),
        Command::RandomPatient(args) => run_random_patient(&ctx, args),
        Command::Records => run_records(&ctx),
        Command::Delete { index } => run_delete(&ctx, *index),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(exit_code(&e));
    }
}

/// Bad input is 1, bad files or configuration is 2, remote failures are 3.
fn exit_code(err: &CoreError) -> i32 {
    match err {
        CoreError::Domain(_) | CoreError::Index { .. } => 1,
        CoreError::Configuration(_)
        | CoreError::Format { .. }
        | CoreError::Io(_)
        | CoreError::Csv(_) => 2,
        CoreError::Source(_) => 3,
    }
}

struct Context {
    data_dir: PathBuf,
    mode: RewriteMode,
    json: bool,
}

impl Context {
    fn visits(&self, path: Option<&PathBuf>) -> RecordStore<VisitRecord> {
        let path = path
            .cloned()
            .unwrap_or_else(|| self.data_dir.join(config::VISIT_LOG_FILE));
        RecordStore::with_mode(path, self.mode)
    }

    fn measurements(&self, path: Option<&PathBuf>) -> RecordStore<PatientMeasurement> {
        let path = path
            .cloned()
            .unwrap_or_else(|| self.data_dir.join(config::MEASUREMENT_LOG_FILE));
        RecordStore::with_mode(path, self.mode)
    }

    fn capture_service(&self) -> CaptureService {
        CaptureService::new(self.measurements(None))
    }

    /// Prints `value` as pretty JSON when `--json` is set, otherwise runs `plain`.
    fn emit<T: Serialize>(&self, value: &T, plain: impl FnOnce()) {
        if !self.json {
            plain();
            return;
        }
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("error: failed to encode JSON: {e}"),
        }
    }
}

fn rng_for(seed: Option<u64>) -> StdRandom {
    match seed {
        Some(seed) => StdRandom::seeded(seed),
        None => StdRandom::from_entropy(),
    }
}

fn run_generate(ctx: &Context, args: &GenerateArgs) -> Result<(), CoreError> {
    let config = match &args.config {
        Some(path) => GeneratorConfig::from_json_file(path)?,
        None => GeneratorConfig::default(),
    };
    let mut rng = rng_for(args.seed);
    let records = RecordGenerator::new(config).generate(args.count, args.duplicates, &mut rng)?;

    let store = ctx.visits(args.output.as_ref());
    generator::write_dataset(&store, &records)?;

    #[derive(Serialize)]
    struct Generated<'a> {
        path: &'a std::path::Path,
        rows: usize,
    }
    ctx.emit(
        &Generated {
            path: store.path(),
            rows: records.len(),
        },
        || println!("Wrote {} visits to {}", records.len(), store.path().display()),
    );
    Ok(())
}

fn run_summarize(ctx: &Context, args: &SummarizeArgs) -> Result<(), CoreError> {
    match args.view {
        SummaryView::ReasonMonth | SummaryView::MeanDuration | SummaryView::DurationSeries => {
            let mut records = ctx.visits(args.input.as_ref()).read_records()?;
            if args.dedup {
                records = aggregate::remove_duplicates(&records);
            }
            match args.view {
                SummaryView::ReasonMonth => {
                    print_rows(ctx, &aggregate::visits_per_reason_month(&records)?)
                }
                SummaryView::MeanDuration => {
                    print_rows(ctx, &aggregate::mean_duration_per_reason(&records)?)
                }
                _ => print_series(ctx, &aggregate::series_by_group(&records, "reason", "duration")?),
            }
        }
        SummaryView::BmiByEvent | SummaryView::BmiSeries => {
            let measurements = ctx.measurements(args.input.as_ref()).read_records()?;
            if matches!(args.view, SummaryView::BmiByEvent) {
                print_rows(ctx, &aggregate::bmi_by_cardiac_event(&measurements)?)
            } else {
                print_series(
                    ctx,
                    &aggregate::series_by_group(&measurements, "cardiac_event", "bmi")?,
                )
            }
        }
    }
    Ok(())
}

fn print_rows(ctx: &Context, rows: &[SummaryRow]) {
    ctx.emit(&rows, || {
        for row in rows {
            let value = if row.value.fract() == 0.0 {
                format!("{:.0}", row.value)
            } else {
                format!("{:.2}", row.value)
            };
            println!("{:<32} {value:>10}", row.key.join(" / "));
        }
    });
}

fn print_series(ctx: &Context, series: &[(String, Vec<f64>)]) {
    ctx.emit(&series, || {
        for (key, values) in series {
            let listed: Vec<String> = values.iter().map(|v| format!("{v:.2}")).collect();
            println!("{key}: {}", listed.join(", "));
        }
    });
}

fn print_measurement(ctx: &Context, m: &PatientMeasurement) {
    ctx.emit(m, || {
        println!(
            "height={:.2} m  weight={:.1} kg  bmi={:.2}  cardiac_event={}",
            m.height(),
            m.weight(),
            m.bmi(),
            m.cardiac_event()
        )
    });
}

fn run_capture(ctx: &Context, args: &CaptureArgs) -> Result<(), CoreError> {
    let request = CaptureRequest {
        height: args.height,
        weight: args.weight,
        cardiac_event: args.event,
    };
    let mut rng = StdRandom::from_entropy();
    let measurement = ctx.capture_service().submit(&request, &mut rng)?;
    print_measurement(ctx, &measurement);
    Ok(())
}

fn run_random_patient(ctx: &Context, args: &RandomPatientArgs) -> Result<(), CoreError> {
    let mut rng = rng_for(args.seed);
    let measurement = if args.offline {
        let mut draws = rng_for(args.seed.map(|s| s.wrapping_add(1)));
        capture::random_patient(&mut LocalRange::new(&mut draws), &mut rng)?
    } else {
        let mut client = RandomNumberApiClient::new(&args.api_url, config::RANDOM_API_TIMEOUT_SECS)?;
        capture::random_patient(&mut client, &mut rng)?
    };

    if args.save {
        ctx.capture_service().save(&measurement)?;
    }
    print_measurement(ctx, &measurement);
    Ok(())
}

fn run_records(ctx: &Context) -> Result<(), CoreError> {
    let rows = ctx.capture_service().records()?;
    ctx.emit(&rows, || {
        if rows.is_empty() {
            println!("No measurements stored.");
        }
        for row in &rows {
            println!(
                "{:>4}  {:.2} m  {:.1} kg  BMI {:.2}  {}",
                row.index, row.height, row.weight, row.bmi, row.cardiac_event
            );
        }
    });
    Ok(())
}

fn run_delete(ctx: &Context, index: usize) -> Result<(), CoreError> {
    ctx.capture_service().delete(index)?;
    ctx.emit(&serde_json::json!({ "deleted": index }), || {
        println!("Deleted row {index}")
    });
    Ok(())
}
