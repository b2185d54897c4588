use std::fs;
use std::path::PathBuf;
use std::process;

use ariadne::{Color, Label, Report, ReportKind, Source};
use clap::Parser;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use blc_common::manifest::{self, BlcManifest};
use blc_common::{Diagnostic, LineMap, Phase, Severity};
use blc_compiler::lexer::Lexer;
use blc_compiler::parser;
use blc_compiler::semantic::{self, Analysis};

/// BL language front-end.
///
/// Checks .bl source files through name resolution, type inference and
/// type checking.
#[derive(Parser)]
#[command(
    name = "blc",
    version,
    about,
    long_about = "BL language front-end.\n\nRuns lexing, parsing and semantic analysis on a .bl source file\nand reports every error found.\n\nExamples:\n  blc hello.bl                 Analyze and print a summary\n  blc hello.bl --check         Check for errors only\n  blc hello.bl --emit-types    Print the inferred type of every declaration\n  blc hello.bl --json          Print diagnostics as JSON"
)]
struct Cli {
    /// Input .bl source file.
    input: PathBuf,

    /// Check for errors only.
    #[arg(long)]
    check: bool,

    /// Suppress warning output.
    #[arg(short, long)]
    quiet: bool,

    /// Emit token stream to stdout (debug).
    #[arg(long = "emit-tokens")]
    emit_tokens: bool,

    /// Emit AST to stdout (debug).
    #[arg(long = "emit-ast")]
    emit_ast: bool,

    /// Emit the type of every declared symbol.
    #[arg(long = "emit-types")]
    emit_types: bool,

    /// Print diagnostics as a JSON array on stdout.
    #[arg(long)]
    json: bool,
}

/// A diagnostic with its resolved source position, for `--json`.
#[derive(Serialize)]
struct JsonDiagnostic<'d> {
    #[serde(flatten)]
    diagnostic: &'d Diagnostic,
    line: Option<u32>,
    column: Option<u32>,
}

fn main() {
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: could not read '{}': {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let file_name = cli
        .input
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    // === Manifest ===
    let abs_input = fs::canonicalize(&cli.input).unwrap_or_else(|_| cli.input.clone());
    let manifest = match manifest::find_and_load_manifest(&abs_input) {
        Ok(m) => Some(m),
        Err(manifest::ManifestError::NotFound(_)) => None,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };
    init_logging(manifest.as_ref());
    match &manifest {
        Some(m) => debug!(
            project = %m.project.name,
            root = %m.root_dir.display(),
            "loaded manifest"
        ),
        None => debug!("no Blc.toml found, using defaults"),
    }

    let tab_size = manifest
        .as_ref()
        .map(|m| m.analysis.tab_size)
        .unwrap_or(LineMap::DEFAULT_TAB_SIZE);
    let stop_after = manifest
        .as_ref()
        .and_then(|m| m.analysis.stop_after)
        .unwrap_or(Phase::CheckReturns);
    let lines = LineMap::with_tab_size(source.as_str(), tab_size);
    let output = Output {
        source: &source,
        file_name: &file_name,
        lines: &lines,
        json: cli.json,
    };

    // === Lexer ===
    let (tokens, lex_diags) = Lexer::new(&source).tokenize();

    if lex_diags.has_errors() {
        output.fail(lex_diags.diagnostics());
    }

    if cli.emit_tokens {
        for token in &tokens {
            let position = lines.position_of(token.span.start);
            println!(
                "{:>4}:{:<3} {:?} {:?}",
                position.line, position.column, token.kind, token.lexeme,
            );
        }
        if cli.check {
            println!("\nNo lexer errors.");
        }
        return;
    }

    // === Parser ===
    let (unit, parse_diags) = parser::Parser::new(tokens).parse();

    if parse_diags.has_errors() {
        output.fail(parse_diags.diagnostics());
    }

    if !cli.quiet && !cli.json {
        for diag in parse_diags.diagnostics() {
            if !diag.is_error() {
                output.print_diagnostic(diag);
            }
        }
    }

    if cli.emit_ast {
        println!("{:#?}", unit);
        return;
    }

    // === Semantic Analysis ===
    let analysis = match semantic::analyze_until(&unit, stop_after) {
        Ok(analysis) => analysis,
        Err(err) => output.fail(&err.diagnostics()),
    };

    if cli.json {
        let warnings: Vec<Diagnostic> = parse_diags
            .diagnostics()
            .iter()
            .filter(|diag| !diag.is_error())
            .cloned()
            .collect();
        output.print_json(&warnings);
        return;
    }

    if cli.emit_types {
        emit_types(&analysis, &lines);
        return;
    }

    if cli.check {
        println!("No errors found.");
        return;
    }

    let declarations = analysis
        .symbols()
        .symbols()
        .filter(|(_, symbol)| symbol.span.is_some())
        .count();
    let completed = if stop_after == Phase::CheckReturns {
        String::new()
    } else {
        format!(" (stopped after {})", stop_after)
    };
    println!(
        "Analyzed {}: {} declarations, {} attributes{}",
        cli.input.display(),
        declarations,
        analysis.reactor().attributes().count(),
        completed
    );
}

/// Install the tracing subscriber. `RUST_LOG` wins over the manifest filter.
fn init_logging(manifest: Option<&BlcManifest>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives = manifest.map(|m| m.log.filter.as_str()).unwrap_or("warn");
        EnvFilter::try_new(directives).unwrap_or_else(|e| {
            eprintln!("warning: invalid log filter '{}': {}", directives, e);
            EnvFilter::new("warn")
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn emit_types(analysis: &Analysis<'_>, lines: &LineMap) {
    let table = analysis.symbols();
    for (id, symbol) in table.symbols() {
        let Some(span) = symbol.span else {
            continue;
        };
        let ty = analysis
            .symbol_type(id)
            .map(|ty| ty.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!(
            "{} {} : {}",
            lines.position_of(span.start),
            table.qualified_name(id, "_"),
            ty
        );
    }
}

struct Output<'s> {
    source: &'s str,
    file_name: &'s str,
    lines: &'s LineMap,
    json: bool,
}

impl Output<'_> {
    /// Report `diagnostics` and exit with status 1.
    fn fail(&self, diagnostics: &[Diagnostic]) -> ! {
        if self.json {
            self.print_json(diagnostics);
        } else {
            for diag in diagnostics {
                self.print_diagnostic(diag);
            }
        }
        process::exit(1);
    }

    fn print_json(&self, diagnostics: &[Diagnostic]) {
        let entries: Vec<JsonDiagnostic<'_>> = diagnostics
            .iter()
            .map(|diagnostic| {
                let position = diagnostic
                    .span
                    .map(|span| self.lines.position_of(span.start));
                JsonDiagnostic {
                    diagnostic,
                    line: position.map(|p| p.line),
                    column: position.map(|p| p.column),
                }
            })
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("error: failed to serialize diagnostics: {}", e),
        }
    }

    fn print_diagnostic(&self, diag: &Diagnostic) {
        let file_name = self.file_name;
        let (kind, color) = match diag.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let Some(span) = diag.span else {
            eprintln!("{}\n", diag.render(self.lines, file_name));
            return;
        };

        let range = widen(span.range());
        let mut report = Report::build(kind, file_name, range.start)
            .with_message(&diag.message)
            .with_label(
                Label::new((file_name, range))
                    .with_message(&diag.message)
                    .with_color(color),
            );

        for related in &diag.related {
            report = report.with_label(
                Label::new((file_name, widen(related.span.range())))
                    .with_message(&related.message)
                    .with_color(Color::Blue),
            );
        }

        if let Some(ref suggestion) = diag.suggestion {
            report = report.with_help(suggestion);
        }

        if let Err(e) = report
            .finish()
            .eprint((file_name, Source::from(self.source)))
        {
            debug!("ariadne rendering failed: {}", e);
            eprintln!("{}\n", diag.render(self.lines, file_name));
        }
    }
}

/// Zero-width ranges still get a one-character label.
fn widen(range: std::ops::Range<usize>) -> std::ops::Range<usize> {
    range.start..range.end.max(range.start + 1)
}
