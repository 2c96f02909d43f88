// pipeline.rs — Optimizer state and pass orchestration
//
// Parses and resolves a module, creates one bound table per function seeded
// from the sensor configuration, and runs the selected passes over every
// function in module order. Range analysis runs for all functions before
// any rewriting pass touches the module.
//
// Preconditions: the sensor configuration validates.
// Postconditions: on success, every selected pass has run over every
//   function and the module is in its rewritten form.
// Failure modes: unreadable input, syntax errors, unresolved names and
//   invalid configuration produce `LoadError`. Analysis never fails.
// Side effects: verbose mode prints per-pass timing to stderr.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::align::{correct_alignment, AlignStats};
use crate::bounds::{BoundInfo, ReportInterval};
use crate::cfg_simplify::{simplify_control_flow, CfgStats};
use crate::config::{ConfigError, PipelineOptions, SensorConfig};
use crate::const_subst::substitute_constants;
use crate::diag::{codes, Diagnostic};
use crate::id::{FuncId, InstId, ValueKey};
use crate::interval::Interval;
use crate::ir::Module;
use crate::layout::DataLayout;
use crate::pass::{descriptor, required_passes, PassId};
use crate::range::{seed_globals, RangeAnalyzer};

// ── Error type ─────────────────────────────────────────────────────────────

/// Input that cannot be optimized at all.
#[derive(Debug)]
pub enum LoadError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(Vec<Diagnostic>),
    Resolve(Vec<Diagnostic>),
    Config(ConfigError),
}

impl LoadError {
    /// The error as printable diagnostics.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            LoadError::Io { .. } => vec![Diagnostic::error(codes::E0001, self.to_string())],
            LoadError::Parse(diags) | LoadError::Resolve(diags) => diags.clone(),
            LoadError::Config(e) => vec![Diagnostic::error(codes::E0004, e.to_string())],
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            LoadError::Parse(diags) => write!(f, "{} syntax error(s)", diags.len()),
            LoadError::Resolve(diags) => write!(f, "{} resolution error(s)", diags.len()),
            LoadError::Config(e) => write!(f, "sensor configuration: {}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Config(e) => Some(e),
            LoadError::Parse(_) | LoadError::Resolve(_) => None,
        }
    }
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata written at the top of the optimized module.
///
/// `source_hash`: SHA-256 of the raw input text.
/// `sensor_fingerprint`: SHA-256 of `SensorConfig::canonical_json()`.
/// `optimizer_version`: crate version from `Cargo.toml`.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
    pub sensor_fingerprint: [u8; 32],
    pub optimizer_version: &'static str,
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }

    /// Hex string of the sensor fingerprint (64 characters).
    pub fn sensor_fingerprint_hex(&self) -> String {
        bytes_to_hex(&self.sensor_fingerprint)
    }

    /// Comment header lines, each starting with `;`.
    pub fn header(&self, passes: &[PassId]) -> String {
        let names: Vec<&str> = passes.iter().map(|p| p.name()).collect();
        format!(
            "; rangeopt {}\n; source-sha256: {}\n; sensors-sha256: {}\n; passes: {}\n",
            self.optimizer_version,
            self.source_hash_hex(),
            self.sensor_fingerprint_hex(),
            names.join(","),
        )
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn sha256(text: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Compute provenance from the input text and the sensor configuration.
pub fn compute_provenance(source: &str, sensors: &SensorConfig) -> Provenance {
    Provenance {
        source_hash: sha256(source),
        sensor_fingerprint: sha256(&sensors.canonical_json()),
        optimizer_version: env!("CARGO_PKG_VERSION"),
    }
}

// ── Output ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    pub analyzed_functions: usize,
    pub bounded_values: usize,
    pub cfg: CfgStats,
    pub substituted: usize,
    pub alignment: AlignStats,
}

#[derive(Debug)]
pub struct PipelineOutput {
    /// The rewritten module.
    pub module: Module,
    /// One bound table per function, indexed by `FuncId`.
    pub bounds: Vec<BoundInfo>,
    /// Inferred result interval per function, indexed by `FuncId`.
    pub results: Vec<Option<Interval>>,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: PipelineStats,
    pub passes: Vec<PassId>,
    pub provenance: Provenance,
}

impl PipelineOutput {
    /// Bound of the value `%value` as recorded while analyzing `function`.
    pub fn bound(&self, function: &str, value: &str) -> Option<Interval> {
        let fid = self.module.function_by_name(function)?;
        let idx = self
            .module
            .func(fid)
            .insts
            .iter()
            .position(|i| i.name.as_deref() == Some(value))?;
        self.bounds[fid.index()].get(&ValueKey::inst(fid, InstId(idx as u32)))
    }

    pub fn result(&self, function: &str) -> Option<Interval> {
        let fid = self.module.function_by_name(function)?;
        self.results[fid.index()]
    }

    /// The optimized module text with its provenance header.
    pub fn render(&self) -> String {
        format!("{}\n{}", self.provenance.header(&self.passes), self.module)
    }

    /// Per-function bound tables as pretty JSON.
    pub fn bounds_json(&self) -> String {
        #[derive(Serialize)]
        struct FunctionBounds {
            result: Option<ReportInterval>,
            values: BTreeMap<String, ReportInterval>,
        }

        let report: BTreeMap<String, FunctionBounds> = self
            .module
            .func_ids()
            .map(|fid| {
                let entry = FunctionBounds {
                    result: self.results[fid.index()].map(ReportInterval::from),
                    values: self.bounds[fid.index()].report(&self.module),
                };
                (self.module.func(fid).name.clone(), entry)
            })
            .collect();
        serde_json::to_string_pretty(&report).unwrap_or_default()
    }
}

/// `<dir>/<stem>_<suffix>.<ext>` next to `input`.
pub fn output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}_{}", stem, suffix),
    };
    input.with_file_name(name)
}

pub fn read_source(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_output(path: &Path, text: &str) -> Result<(), LoadError> {
    std::fs::write(path, text).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Pipeline runner ────────────────────────────────────────────────────────

fn finish_pass(pass: PassId, elapsed: Duration, verbose: bool) {
    if verbose {
        eprintln!(
            "rangeopt: {} complete, {:.1}ms",
            descriptor(pass).name,
            elapsed.as_secs_f64() * 1000.0
        );
    }
}

fn parse_diagnostics(errors: &[chumsky::error::Rich<'static, crate::lexer::Token>]) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|e| {
            Diagnostic::error(codes::E0002, e.to_string())
                .with_hint(format!("at byte offset {}", e.span().start))
        })
        .collect()
}

/// Optimize `source` with the passes selected in `options`.
pub fn run_pipeline(
    source: &str,
    sensors: &SensorConfig,
    options: &PipelineOptions,
) -> Result<PipelineOutput, LoadError> {
    sensors.validate().map_err(LoadError::Config)?;
    let provenance = compute_provenance(source, sensors);

    // ── Load ──
    let t = Instant::now();
    let parsed = crate::parser::parse(source);
    if !parsed.errors.is_empty() {
        return Err(LoadError::Parse(parse_diagnostics(&parsed.errors)));
    }
    let Some(ast) = parsed.module else {
        return Err(LoadError::Parse(vec![Diagnostic::error(
            codes::E0002,
            "parse failed with no output",
        )]));
    };
    let mut module = crate::resolve::resolve(&ast).map_err(LoadError::Resolve)?;
    if options.verbose {
        eprintln!(
            "rangeopt: loaded {} functions, {} instructions, {:.1}ms",
            module.functions.len(),
            module.inst_count(),
            t.elapsed().as_secs_f64() * 1000.0
        );
    }

    let mut diagnostics = Vec::new();
    let layout = match &module.datalayout {
        Some(spec) => {
            let (layout, problems) = DataLayout::parse(spec);
            for p in problems {
                diagnostics.push(Diagnostic::warning(
                    codes::W0204,
                    format!("target datalayout entry ignored: {}", p),
                ));
            }
            layout
        }
        None => DataLayout::default(),
    };

    // ── Seed ──
    let seeds = Rc::new(sensors.seed_table());
    let ids: Vec<FuncId> = module.func_ids().collect();
    let mut bounds: Vec<BoundInfo> = ids
        .iter()
        .map(|_| {
            let mut table = BoundInfo::new(Rc::clone(&seeds));
            seed_globals(&module, &mut table);
            table
        })
        .collect();
    let mut results = vec![None; ids.len()];

    // ── Passes ──
    let passes = required_passes(&options.passes);
    let mut stats = PipelineStats::default();
    for &pass in &passes {
        let t = Instant::now();
        match pass {
            PassId::RangeAnalysis => {
                let mut engine = RangeAnalyzer::new(&module, &layout, options.limits);
                for &id in &ids {
                    let table = &mut bounds[id.index()];
                    results[id.index()] = engine.analyze_function(id, table).map(|(_, iv)| iv);
                    info!(
                        function = %module.func(id).name,
                        values = table.len(),
                        "analyzed"
                    );
                    stats.analyzed_functions += 1;
                    stats.bounded_values += table.len();
                }
                diagnostics.extend(engine.take_diagnostics());
            }
            PassId::SimplifyControlFlow => {
                for &id in &ids {
                    let s = simplify_control_flow(id, module.func_mut(id), &bounds[id.index()]);
                    stats.cfg.folded_compares += s.folded_compares;
                    stats.cfg.folded_branches += s.folded_branches;
                    stats.cfg.removed_blocks += s.removed_blocks;
                    stats.cfg.collapsed_phis += s.collapsed_phis;
                }
            }
            PassId::ConstantSubstitution => {
                for &id in &ids {
                    stats.substituted +=
                        substitute_constants(id, module.func_mut(id), &bounds[id.index()]);
                }
            }
            PassId::MemoryAlignment => {
                for &id in &ids {
                    let s = correct_alignment(id, module.func_mut(id), &bounds[id.index()], &layout);
                    stats.alignment.stores += s.stores;
                    stats.alignment.loads += s.loads;
                    stats.alignment.allocas += s.allocas;
                }
            }
        }
        finish_pass(pass, t.elapsed(), options.verbose);
    }

    Ok(PipelineOutput {
        module,
        bounds,
        results,
        diagnostics,
        stats,
        passes,
        provenance,
    })
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Sensor;

    fn sensors() -> SensorConfig {
        SensorConfig {
            sensors: vec![Sensor {
                identifier: "Speed".into(),
                lower: 0.0,
                upper: 10.0,
            }],
        }
    }

    #[test]
    fn output_path_inserts_suffix() {
        assert_eq!(
            output_path(Path::new("dir/prog.ir"), "opt"),
            PathBuf::from("dir/prog_opt.ir")
        );
        assert_eq!(output_path(Path::new("prog"), "x"), PathBuf::from("prog_x"));
    }

    #[test]
    fn provenance_is_deterministic() {
        let a = compute_provenance("define void @f() {\nentry:\n  ret void\n}\n", &sensors());
        let b = compute_provenance("define void @f() {\nentry:\n  ret void\n}\n", &sensors());
        assert_eq!(a.source_hash, b.source_hash);
        assert_eq!(a.sensor_fingerprint_hex(), b.sensor_fingerprint_hex());
        assert_eq!(a.source_hash_hex().len(), 64);
        let c = compute_provenance("", &sensors());
        assert_ne!(a.source_hash, c.source_hash);
    }

    #[test]
    fn syntax_error_is_a_load_error() {
        let err = run_pipeline("define i32 @f( {", &sensors(), &PipelineOptions::default())
            .unwrap_err();
        assert!(matches!(err, LoadError::Parse(_)));
        assert!(err.diagnostics().iter().all(|d| d.code == Some(codes::E0002)));
    }

    #[test]
    fn unresolved_name_is_a_load_error() {
        let src = "define i32 @f() {\nentry:\n  ret i32 %nope\n}\n";
        let err = run_pipeline(src, &sensors(), &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Resolve(_)));
    }

    #[test]
    fn invalid_sensors_are_rejected() {
        let bad = SensorConfig {
            sensors: vec![Sensor {
                identifier: "T".into(),
                lower: 2.0,
                upper: 1.0,
            }],
        };
        let err = run_pipeline("", &bad, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
        assert_eq!(err.diagnostics()[0].code, Some(codes::E0004));
    }

    #[test]
    fn unknown_layout_entries_warn() {
        let src = "target datalayout = \"e-zz:9\"\n\ndefine void @f() {\nentry:\n  ret void\n}\n";
        let out = run_pipeline(src, &sensors(), &PipelineOptions::default()).unwrap();
        assert!(out.diagnostics.iter().any(|d| d.code == Some(codes::W0204)));
    }

    #[test]
    fn range_only_leaves_module_unchanged() {
        let src = "define i32 @f() {\nentry:\n  %a = alloca i32\n  store i32 3, i32* %a\n  %v = load i32, i32* %a\n  %s = add i32 %v, 4\n  ret i32 %s\n}\n";
        let options = PipelineOptions {
            passes: vec![PassId::RangeAnalysis],
            ..PipelineOptions::default()
        };
        let out = run_pipeline(src, &sensors(), &options).unwrap();
        assert_eq!(out.passes, vec![PassId::RangeAnalysis]);
        assert_eq!(out.bound("f", "s"), Some(Interval::singleton(7.0)));
        assert_eq!(out.stats.substituted, 0);
        assert_eq!(out.module.inst_count(), 5);

        let full = run_pipeline(src, &sensors(), &PipelineOptions::default()).unwrap();
        assert_eq!(full.stats.substituted, 1);
        assert_eq!(full.module.inst_count(), 4);
    }

    #[test]
    fn render_starts_with_provenance_header() {
        let src = "define void @f() {\nentry:\n  ret void\n}\n";
        let out = run_pipeline(src, &sensors(), &PipelineOptions::default()).unwrap();
        let text = out.render();
        assert!(text.starts_with("; rangeopt "));
        assert!(text.contains("; passes: range,cfg,const,align\n"));
        // The rendered module parses back.
        assert!(crate::parser::parse(&text).errors.is_empty());
    }

    #[test]
    fn bounds_json_lists_functions() {
        let src = "define i32 @f() {\nentry:\n  %a = alloca i32\n  store i32 3, i32* %a\n  %v = load i32, i32* %a\n  ret i32 %v\n}\n";
        let out = run_pipeline(src, &sensors(), &PipelineOptions::default()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&out.bounds_json()).unwrap();
        assert_eq!(json["f"]["result"]["lo"], 3.0);
        assert_eq!(json["f"]["values"]["@f:%v"]["hi"], 3.0);
    }
}
