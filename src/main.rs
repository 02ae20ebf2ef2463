// predicc: grammar-driven parser and constant-folding analyzer

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser as ClapParser;
use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use tracing_subscriber::EnvFilter;

use predicc::analyzer::analyze;
use predicc::diagnostics::{Diagnostic, Diagnostics};
use predicc::dump;
use predicc::parser::ast::Ast;
use predicc::parser::grammar::Grammar;
use predicc::parser::lexer::Lexer;
use predicc::parser::parse::Parser;

#[derive(Debug, ClapParser)]
#[command(name = "predicc", version, about = "Parse and analyze a program")]
struct Cli {
    /// Source file to compile
    input: PathBuf,

    /// Grammar file to parse with instead of the built-in grammar
    #[arg(long, value_name = "FILE")]
    grammar: Option<PathBuf>,

    /// Write the parse tree as JSON before analysis
    #[arg(long, value_name = "FILE")]
    dump_parse_tree: Option<PathBuf>,

    /// Write the pruned, annotated tree as JSON after analysis
    #[arg(long, value_name = "FILE")]
    dump_ast: Option<PathBuf>,

    /// Never colour diagnostics
    #[arg(long)]
    no_color: bool,

    /// Treat warnings as errors for the exit status
    #[arg(long)]
    warnings_as_errors: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if !run(&cli)? {
        std::process::exit(1);
    }
    Ok(())
}

/// Returns whether compilation succeeded
fn run(cli: &Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let color = !cli.no_color && std::io::stderr().is_tty();

    let source = fs::read_to_string(&cli.input)
        .map_err(|e| format!("cannot read '{}': {}", cli.input.display(), e))?;

    let custom;
    let grammar = match &cli.grammar {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
            custom = Grammar::parse(&text)?;
            &custom
        }
        None => Grammar::builtin(),
    };

    eprintln!("Parsing {}...", cli.input.display());
    let tokens = Lexer::new(&source).tokenize()?;
    let mut diagnostics = Diagnostics::new();
    let mut ast = Parser::with_tokens(grammar, tokens).parse_program(&mut diagnostics);

    if let Some(path) = &cli.dump_parse_tree {
        write_dump(path, &ast)?;
    }

    if diagnostics.has_errors() {
        report(&diagnostics, color);
        eprintln!("Parsing failed with {} error(s).", diagnostics.error_count());
        return Ok(false);
    }
    eprintln!("Parsed successfully. {} nodes.", ast.len());

    if cli.grammar.is_some() {
        // Analysis is defined over the built-in grammar's tree shapes
        eprintln!("Custom grammar: skipping analysis.");
        return Ok(true);
    }

    eprintln!("Analyzing...");
    let analysis = analyze(&mut ast, &mut diagnostics);
    report(&diagnostics, color);

    let analysis = match analysis {
        Ok(analysis) => analysis,
        Err(e) => {
            eprintln!("{}", paint_error(&e.to_string(), color));
            return Ok(false);
        }
    };

    if let Some(path) = &cli.dump_ast {
        write_dump(path, &ast)?;
    }

    let errors = diagnostics.error_count();
    let warnings = diagnostics.warning_count();
    eprintln!(
        "Analysis finished: {} method(s), {} error(s), {} warning(s).",
        analysis.methods.len(),
        errors,
        warnings
    );

    Ok(errors == 0 && !(cli.warnings_as_errors && warnings > 0))
}

fn write_dump(path: &Path, ast: &Ast) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(path, dump::to_json(ast)?)
        .map_err(|e| format!("cannot write '{}': {}", path.display(), e))?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn report(diagnostics: &Diagnostics, color: bool) {
    for diagnostic in diagnostics {
        eprintln!("{}", render(diagnostic, color));
    }
}

fn render(diagnostic: &Diagnostic, color: bool) -> String {
    let severity = diagnostic.severity.to_string();
    let severity = if !color {
        severity
    } else if diagnostic.is_error() {
        severity.red().bold().to_string()
    } else {
        severity.yellow().bold().to_string()
    };
    format!("{}: {}", severity, diagnostic)
}

fn paint_error(message: &str, color: bool) -> String {
    if color {
        format!("{}: {}", "error".red().bold(), message)
    } else {
        format!("error: {}", message)
    }
}
