use clap::Parser;
use std::path::PathBuf;

use rangeopt::config::{AnalysisLimits, PipelineOptions, SensorConfig};
use rangeopt::diag::{has_errors, DiagLevel};
use rangeopt::pass::{PassId, ALL_PASSES};
use rangeopt::pipeline::{output_path, read_source, run_pipeline, write_output, LoadError};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum EmitKind {
    Ir,
    Bounds,
}

#[derive(Parser, Debug)]
#[command(
    name = "rangeopt",
    version,
    about = "Range-guided optimizer for physical-units-aware SSA intermediate code"
)]
struct Cli {
    /// Input intermediate-code file
    input: PathBuf,

    /// Sensor range configuration (JSON)
    #[arg(short, long)]
    sensors: Option<PathBuf>,

    /// Output file path [default: <stem>_<suffix>.<ext> next to the input]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Suffix for the default output file name
    #[arg(long, default_value = "opt")]
    suffix: String,

    /// Pass to run (repeatable): range, cfg, const, align [default: all]
    #[arg(long = "pass", value_parser = parse_pass)]
    passes: Vec<PassId>,

    /// Output kind
    #[arg(long, value_enum, default_value_t = EmitKind::Ir)]
    emit: EmitKind,

    /// Deepest nested call-site analysis
    #[arg(long, default_value_t = AnalysisLimits::default().max_call_depth)]
    max_call_depth: usize,

    /// Instruction visits per analyzed function, callees included
    #[arg(long, default_value_t = AnalysisLimits::default().max_visits)]
    max_visits: usize,

    /// Print pass timing, notes and debug logging
    #[arg(long)]
    verbose: bool,
}

fn parse_pass(name: &str) -> Result<PassId, String> {
    PassId::from_name(name).ok_or_else(|| {
        let known: Vec<&str> = ALL_PASSES.iter().map(|p| p.name()).collect();
        format!("unknown pass `{}` (expected one of: {})", name, known.join(", "))
    })
}

fn init_logging(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "rangeopt=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(err: &LoadError) -> ! {
    for diag in err.diagnostics() {
        eprintln!("rangeopt: {}", diag);
    }
    std::process::exit(2);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = cli.output.clone().unwrap_or_else(|| {
        let path = output_path(&cli.input, &cli.suffix);
        match cli.emit {
            EmitKind::Ir => path,
            EmitKind::Bounds => path.with_extension("json"),
        }
    });
    if cli.verbose {
        eprintln!("rangeopt: input  = {}", cli.input.display());
        eprintln!("rangeopt: output = {}", output.display());
        eprintln!("rangeopt: emit   = {:?}", cli.emit);
    }

    // ── Load sensor configuration ──
    let sensors = match &cli.sensors {
        Some(path) => match SensorConfig::load(path) {
            Ok(s) => s,
            Err(e) => fail(&LoadError::Config(e)),
        },
        None => SensorConfig::default(),
    };
    if cli.verbose {
        eprintln!("rangeopt: {} sensor ranges", sensors.sensors.len());
    }

    // ── Optimize ──
    let source = read_source(&cli.input).unwrap_or_else(|e| fail(&e));
    let options = PipelineOptions {
        passes: if cli.passes.is_empty() {
            ALL_PASSES.to_vec()
        } else {
            cli.passes.clone()
        },
        suffix: cli.suffix.clone(),
        limits: AnalysisLimits {
            max_call_depth: cli.max_call_depth,
            max_visits: cli.max_visits,
        },
        verbose: cli.verbose,
    };
    let result = run_pipeline(&source, &sensors, &options).unwrap_or_else(|e| fail(&e));

    for diag in &result.diagnostics {
        if diag.level != DiagLevel::Note || cli.verbose {
            eprintln!("rangeopt: {}", diag);
        }
    }
    if cli.verbose {
        let s = &result.stats;
        eprintln!(
            "rangeopt: {} functions, {} bounded values, {} compares folded, {} blocks removed, {} constants, {} alignments",
            s.analyzed_functions,
            s.bounded_values,
            s.cfg.folded_compares,
            s.cfg.removed_blocks,
            s.substituted,
            s.alignment.total(),
        );
    }

    // ── Write ──
    let text = match cli.emit {
        EmitKind::Ir => result.render(),
        EmitKind::Bounds => result.bounds_json(),
    };
    if let Err(e) = write_output(&output, &text) {
        fail(&e);
    }

    if has_errors(&result.diagnostics) {
        std::process::exit(1);
    }
}
