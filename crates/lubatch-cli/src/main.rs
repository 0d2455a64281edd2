//! `lubatch`: workspace queries and batched LU runs from the command line.

mod factor;
mod residual;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use lubatch_backend_cpu::HostBackend;
use lubatch_core::{
    Algorithm, FactorConfig, Handle, MemoryMode, Scalar, WorkspacePlanner, WorkspaceSizes,
    config::DEFAULT_BLOCK_SIZE,
};
use num_complex::{Complex32, Complex64};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "lubatch",
    version,
    about = "Batched LU factorization with partial pivoting",
    long_about = None
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the workspace a call would need, as JSON
    Query(ShapeArgs),
    /// Factor a random batch on the host and report accuracy
    Factor(FactorArgs),
}

/// Element precision, named by its LAPACK letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    S,
    D,
    C,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Layout {
    /// One buffer, fixed stride between matrices
    Strided,
    /// One slice per matrix
    Pointer,
}

#[derive(Args, Debug, Clone)]
pub struct ShapeArgs {
    /// Rows of each matrix
    #[arg(short = 'm', long = "rows")]
    pub m: usize,

    /// Columns of each matrix
    #[arg(short = 'n', long = "cols")]
    pub n: usize,

    /// Number of matrices
    #[arg(short, long, default_value_t = 1)]
    pub batch: usize,

    #[arg(short, long, value_enum, default_value = "d")]
    pub precision: Precision,

    /// Skip row interchanges (npvt variants)
    #[arg(long)]
    pub no_pivot: bool,

    /// Use the column-at-a-time getf2 family
    #[arg(long)]
    pub unblocked: bool,

    /// Scratch sizing policy (optimal, reduced)
    #[arg(long, default_value = "optimal")]
    pub memory: String,

    /// Column block size of the blocked driver
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
}

impl ShapeArgs {
    pub fn algorithm(&self) -> Algorithm {
        if self.unblocked {
            Algorithm::Unblocked
        } else {
            Algorithm::Blocked
        }
    }

    pub fn config(&self) -> Result<FactorConfig> {
        let Some(memory) = MemoryMode::from_name(&self.memory) else {
            bail!("unknown memory mode '{}' (expected optimal or reduced)", self.memory);
        };
        let config = FactorConfig::default()
            .with_block_size(self.block_size)
            .with_memory(memory);
        config.validate().context("invalid factorization settings")?;
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
pub struct FactorArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    #[arg(long, value_enum, default_value = "strided")]
    pub layout: Layout,

    /// Seed for the random input
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[derive(Serialize)]
struct QueryReport {
    precision: Precision,
    m: usize,
    n: usize,
    batch_count: usize,
    pivot: bool,
    algorithm: Algorithm,
    memory: MemoryMode,
    block_size: usize,
    sizes: WorkspaceSizes,
    total_bytes: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    match cli.command {
        Command::Query(shape) => run_query(&shape),
        Command::Factor(args) => factor::run(&args),
    }
}

fn run_query(shape: &ShapeArgs) -> Result<()> {
    let sizes = match shape.precision {
        Precision::S => plan::<f32>(shape)?,
        Precision::D => plan::<f64>(shape)?,
        Precision::C => plan::<Complex32>(shape)?,
        Precision::Z => plan::<Complex64>(shape)?,
    };
    let config = shape.config()?;
    let report = QueryReport {
        precision: shape.precision,
        m: shape.m,
        n: shape.n,
        batch_count: shape.batch,
        pivot: !shape.no_pivot,
        algorithm: shape.algorithm(),
        memory: config.memory,
        block_size: config.block_size,
        sizes,
        total_bytes: sizes.total_bytes(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Plan through a size query on a real handle, then cross-check the planner.
fn plan<T: Scalar>(shape: &ShapeArgs) -> Result<WorkspaceSizes> {
    let config = shape.config()?;
    let mut handle = Handle::with_config(HostBackend::new(), config.clone());
    let queried = factor::query_bytes::<T>(&mut handle, shape)?;

    let sizes = WorkspacePlanner::plan::<T>(
        shape.m,
        shape.n,
        shape.batch,
        !shape.no_pivot,
        shape.algorithm(),
        &config,
    )
    .context("workspace plan overflows")?;
    if queried != sizes.total_bytes() {
        bail!(
            "size query reported {} bytes but the plan needs {}",
            queried,
            sizes.total_bytes()
        );
    }
    Ok(sizes)
}
