use std::{
    ops::Range,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use backend::{
    FheBfv,
    hal::{
        api::ModuleNew,
        layouts::{BatchParams, Module},
    },
};
use clap::{Parser, Subcommand, ValueEnum};
use oblut_core::{
    ComputeServer, DayOutcome, DayReadings, EvaluationKeys, INTERVAL_FUNCTIONS, KeyHolder, KeySet, LookupFunction,
    PeriodId, ProtocolConfig, ProtocolOrchestrator, ResolverKeys, SUM_FUNCTIONS, StateStore, TableBuilder, TableSet,
    TableStore, load_params,
};
use sampling::{
    readings::ReadingSampler,
    source::{Source, new_seed},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "HM/AM ratio of smart-meter readings over oblivious table lookups")]
struct Cli {
    /// JSON protocol config; absent fields take their default
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the key set into the key directory
    Keygen {
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Build and encrypt the lookup tables into the table directory
    Tables,
    /// Write a synthetic day of readings
    Sample {
        date: String,
        output: PathBuf,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Log-normal location of the readings
        #[arg(long, default_value_t = 5.5)]
        mu: f64,
        #[arg(long, default_value_t = 1.0)]
        sigma: f64,
    },
    /// Compute server: aggregate one run and send its table differences
    RoundA {
        date: String,
        input: PathBuf,
        state_dir: PathBuf,
        #[arg(long, default_value_t = 0)]
        run: usize,
    },
    /// Key holder: answer the pending table differences of a stage
    Resolve {
        date: String,
        #[arg(value_enum)]
        stage: ResolveStage,
        state_dir: PathBuf,
        #[arg(long, default_value_t = 0)]
        run: usize,
    },
    /// Compute server: look up the means of one run into the day running sums
    Accumulate {
        date: String,
        state_dir: PathBuf,
        #[arg(long, default_value_t = 0)]
        run: usize,
    },
    /// Compute server: difference the running sums against the sum tables
    Sums { date: String, state_dir: PathBuf },
    /// Compute server: combine the split sums and difference the cross term
    Cross { date: String, state_dir: PathBuf },
    /// Compute server: add the corrected cross term and send the final ciphertext
    Final { date: String, state_dir: PathBuf },
    /// Key holder: decrypt the day ratio
    Decrypt { date: String, state_dir: PathBuf },
    /// Run every stage of a day in one process
    Day {
        date: String,
        input: PathBuf,
        state_dir: PathBuf,
        /// Also report the plaintext ratio
        #[arg(long)]
        calibration: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ResolveStage {
    /// Interval means of one run
    A,
    /// Day running sums
    Sums,
    /// Cross term
    Hundredth,
}

fn load_config(path: Option<&Path>) -> Result<ProtocolConfig> {
    let config: ProtocolConfig = match path {
        Some(path) => ProtocolConfig::load(path)?,
        None => ProtocolConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

/// Module matching the stored key parameters.
fn module(config: &ProtocolConfig) -> Result<Module<FheBfv>> {
    let params: BatchParams = load_params(&config.key_dir)?;
    if params != config.he.batch_params() {
        return Err(anyhow!(
            "keys in {} were generated for other encryption parameters",
            config.key_dir.display()
        ));
    }
    Ok(Module::<FheBfv>::new(params)?)
}

fn server<'a>(module: &'a Module<FheBfv>, config: &ProtocolConfig) -> Result<ComputeServer<'a, Module<FheBfv>>> {
    let keys: EvaluationKeys = EvaluationKeys::load(&config.key_dir)?;
    let tables: TableSet = TableStore::new(&config.table_dir).load_set(config.meter_count)?;
    Ok(ComputeServer::new(module, keys, tables, config)?)
}

fn holder<'a>(module: &'a Module<FheBfv>, config: &ProtocolConfig) -> Result<KeyHolder<'a, Module<FheBfv>>> {
    Ok(KeyHolder::new(module, ResolverKeys::load(&config.key_dir)?, config)?)
}

fn run_range(config: &ProtocolConfig, run: usize) -> Result<Range<usize>> {
    config
        .runs()
        .get(run)
        .cloned()
        .ok_or_else(|| anyhow!("run {} out of {} runs", run, config.runs().len()))
}

fn seed_bytes(seed: u64) -> [u8; 32] {
    let mut bytes: [u8; 32] = [0u8; 32];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli: Cli = Cli::parse();
    let mut config: ProtocolConfig = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Keygen { seed } => {
            let module: Module<FheBfv> = Module::<FheBfv>::new(config.he.batch_params())?;
            let mut source: Source = Source::new(seed.map(seed_bytes).unwrap_or_else(new_seed));
            KeySet::generate(&module, &mut source)?.save(&config.key_dir)?;
        }
        Commands::Tables => {
            let module: Module<FheBfv> = module(&config)?;
            let keys: EvaluationKeys = EvaluationKeys::load(&config.key_dir)?;
            let plain = TableBuilder::new(&config).build_all()?;
            let set: TableSet = TableSet::encrypt(&module, &keys.pk, &plain)?;
            TableStore::new(&config.table_dir).save_set(&set)?;
            info!(dir = %config.table_dir.display(), meters = config.meter_count, "tables saved");
        }
        Commands::Sample {
            date,
            output,
            seed,
            mu,
            sigma,
        } => {
            let domain = config.reading_domain;
            let sampler: ReadingSampler = ReadingSampler::new(mu, sigma, domain.min, domain.max)
                .ok_or_else(|| anyhow!("invalid sampler: mu={mu} sigma={sigma} over [{}, {}]", domain.min, domain.max))?;
            let intervals: Vec<Vec<f64>> = sampler.sample_day(
                &mut Source::new(seed_bytes(seed)),
                config.intervals_per_day,
                config.meter_count,
            );
            let readings: DayReadings = DayReadings {
                timestamps: (0..intervals.len()).map(|h| format!("{date} {h:02}:00")).collect(),
                intervals,
            };
            readings.write_csv(&output)?;
            info!(output = %output.display(), "readings written");
        }
        Commands::RoundA {
            date,
            input,
            state_dir,
            run,
        } => {
            let day: PeriodId = PeriodId::day(&date)?;
            let module: Module<FheBfv> = module(&config)?;
            let server = server(&module, &config)?;
            let readings: DayReadings = DayReadings::load_csv(&input)?;
            let sums = server.aggregate(&day, run_range(&config, run)?, &readings)?;
            server.diff_intervals(&sums, &mut StateStore::new(&state_dir)?)?;
        }
        Commands::Resolve {
            date,
            stage,
            state_dir,
            run,
        } => {
            let day: PeriodId = PeriodId::day(&date)?;
            let module: Module<FheBfv> = module(&config)?;
            let holder = holder(&module, &config)?;
            let mut store: StateStore = StateStore::new(&state_dir)?;
            match stage {
                ResolveStage::A => {
                    let periods: Vec<PeriodId> = run_range(&config, run)?.map(|i| day.interval(i)).collect();
                    holder.resolve_round(&INTERVAL_FUNCTIONS, &periods, &mut store)?
                }
                ResolveStage::Sums => holder.resolve_round(&SUM_FUNCTIONS, &[day], &mut store)?,
                ResolveStage::Hundredth => {
                    holder.resolve_round(&[LookupFunction::Hundredth], &[day], &mut store)?
                }
            }
        }
        Commands::Accumulate { date, state_dir, run } => {
            let day: PeriodId = PeriodId::day(&date)?;
            let module: Module<FheBfv> = module(&config)?;
            let server = server(&module, &config)?;
            server.select_intervals(&day, run, run_range(&config, run)?, &mut StateStore::new(&state_dir)?)?;
        }
        Commands::Sums { date, state_dir } => {
            let module: Module<FheBfv> = module(&config)?;
            server(&module, &config)?.diff_sums(&PeriodId::day(&date)?, &mut StateStore::new(&state_dir)?)?;
        }
        Commands::Cross { date, state_dir } => {
            let day: PeriodId = PeriodId::day(&date)?;
            let module: Module<FheBfv> = module(&config)?;
            let server = server(&module, &config)?;
            let mut store: StateStore = StateStore::new(&state_dir)?;
            server.combine_cross_terms(&day, &mut store)?;
            server.diff_cross(&day, &mut store)?;
        }
        Commands::Final { date, state_dir } => {
            let day: PeriodId = PeriodId::day(&date)?;
            let module: Module<FheBfv> = module(&config)?;
            let server = server(&module, &config)?;
            let mut store: StateStore = StateStore::new(&state_dir)?;
            let hundredth = server.select_hundredth(&day, &mut store)?;
            server.final_combine(&day, hundredth, &mut store)?;
        }
        Commands::Decrypt { date, state_dir } => {
            let module: Module<FheBfv> = module(&config)?;
            let result = holder(&module, &config)?
                .decrypt_final(&PeriodId::day(&date)?, &mut StateStore::new(&state_dir)?)?;
            println!("{date} {:.6}", result.ratio);
        }
        Commands::Day {
            date,
            input,
            state_dir,
            calibration,
        } => {
            config.calibration |= calibration;
            let day: PeriodId = PeriodId::day(&date)?;
            let module: Module<FheBfv> = module(&config)?;
            let readings: DayReadings =
                DayReadings::load_csv(&input).with_context(|| format!("readings of {date}"))?;
            let orchestrator = ProtocolOrchestrator::new(&config, server(&module, &config)?, holder(&module, &config)?);
            let outcome: DayOutcome = orchestrator.run_day(&day, &readings, &mut StateStore::new(&state_dir)?)?;
            match outcome.calibration {
                Some(plain) => println!("{date} {:.6} (plaintext {:.6})", outcome.ratio, plain),
                None => println!("{date} {:.6}", outcome.ratio),
            }
        }
    }
    Ok(())
}
