use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use mie_store::{Artifact, MieConfig, MieDatabase, MieSolver, load_scenario};

#[derive(Parser)]
#[command(name = "mie", about = "Mie scattering data cache")]
struct Cli {
    /// Configuration TOML (data locations, worker count)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the worker pool size
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a scenario, computing it on a cache miss, and print the artifact path
    Compute {
        /// Scenario TOML file
        #[arg(long)]
        scenario: PathBuf,

        /// Compute a new artifact even if one is cached
        #[arg(long)]
        force: bool,

        /// Solve on a background thread and report progress
        #[arg(long)]
        background: bool,
    },

    /// Print the cached artifact path for a scenario without computing
    Lookup {
        /// Scenario TOML file
        #[arg(long)]
        scenario: PathBuf,
    },

    /// List index entries, newest first
    List,

    /// Summarise an artifact file
    Show {
        /// Artifact path
        artifact: PathBuf,

        /// Print the whole artifact as JSON
        #[arg(long)]
        json: bool,
    },
}

fn load_config(cli: &Cli) -> Result<MieConfig> {
    let mut config = MieConfig::load(cli.config.as_deref()).context("failed to load config")?;
    if let Some(dir) = std::env::var_os("MIE_DATA_DIR") {
        config = config.with_data_dir(dir);
    }
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }
    Ok(config)
}

fn open_database(cli: &Cli) -> Result<MieDatabase> {
    let config = load_config(cli)?;
    MieDatabase::open(&config).with_context(|| {
        format!(
            "failed to open cache index {}",
            config.index_path().display()
        )
    })
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Compute {
            scenario,
            force,
            background,
        } => cmd_compute(&cli, scenario, *force, *background),
        Commands::Lookup { scenario } => cmd_lookup(&cli, scenario),
        Commands::List => cmd_list(&cli),
        Commands::Show { artifact, json } => cmd_show(artifact, *json),
    }
}

fn cmd_compute(cli: &Cli, scenario: &Path, force: bool, background: bool) -> Result<()> {
    let mut request = load_scenario(scenario).context("failed to load scenario")?;
    request.force_recompute |= force;
    let db = open_database(cli)?;

    if !background {
        let path = db.resolve(&request).context("failed to resolve scenario")?;
        println!("{}", path.display());
        return Ok(());
    }

    let mut solver = MieSolver::new(Arc::new(db), request);
    solver
        .solve_step(true)
        .context("failed to start background solve")?;
    let started = std::time::Instant::now();
    while !solver.is_solved() {
        std::thread::sleep(std::time::Duration::from_millis(200));
        if cli.verbose {
            eprintln!("--- solving: {:.1}s ---", started.elapsed().as_secs_f64());
        }
    }
    solver.wait().context("background solve failed")?;

    let path = solver.path().context("solve finished without an artifact")?;
    println!("{}", path.display());
    Ok(())
}

fn cmd_lookup(cli: &Cli, scenario: &Path) -> Result<()> {
    let request = load_scenario(scenario).context("failed to load scenario")?;
    request.validate().context("invalid scenario")?;
    let db = open_database(cli)?;

    match db.lookup(&request.key()).context("lookup failed")? {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!("not cached"),
    }
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let db = open_database(cli)?;
    let entries = db.entries().context("failed to read index")?;

    if entries.is_empty() {
        println!("(no entries)");
        return Ok(());
    }
    for e in &entries {
        let k = &e.key;
        println!(
            "{:>4}  {}  {:<9} {}  n={}{:+}j host={}  ({}, {})  wave={}..{}x{}  d={}..{}x{}  {}",
            e.id,
            e.created_at,
            k.distribution_kind.as_str(),
            if k.effective_model { "eff" } else { "raw" },
            k.n_particle_re,
            k.n_particle_im,
            k.n_host,
            k.distribution_a,
            k.distribution_b,
            k.wavelengths.min,
            k.wavelengths.max,
            k.wavelengths.n,
            k.diameters.min,
            k.diameters.max,
            k.diameters.n,
            e.path.display(),
        );
    }
    Ok(())
}

fn cmd_show(path: &Path, json: bool) -> Result<()> {
    let artifact =
        Artifact::read(path).with_context(|| format!("failed to read {}", path.display()))?;

    if json {
        let out = serde_json::to_string_pretty(&artifact).context("failed to serialize artifact")?;
        println!("{out}");
        return Ok(());
    }

    println!("artifact:    {}", path.display());
    println!("particles:   {}", artifact.particle_id.len());
    println!("diameters:   {:?}", artifact.particle_diameter);
    println!("wavelengths: {}", artifact.wavelengths.len());
    for id in &artifact.particle_id {
        let Some(group) = artifact.group(*id) else {
            continue;
        };
        let (lo, hi) = group
            .cross_sections
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        println!(
            "  [{id}] d={}  cross_section={lo:.4e}..{hi:.4e}  inverse_cdf={}x{}",
            group.diameter, group.inverse_cdf.rows, group.inverse_cdf.cols
        );
    }
    Ok(())
}
