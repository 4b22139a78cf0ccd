use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use mathformula::backends::TreeType;
use mathformula::render::RenderConfig;
use mathformula::{check_source, compile_source, export, render, CompileError, CompileOptions, Source};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Node graph as JSON for a host bridge
    Json,
    /// One row per node
    Csv,
    /// Diagram of the main tree
    Png,
    /// Compiled stack operations
    Ops,
}

#[derive(Parser, Debug)]
#[command(name = "mathformula")]
#[command(about = "Compile math formulas into shader and geometry node trees", long_about = None)]
struct Args {
    /// Formula text, e.g. "x = sin(t) * 2;"
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    formula: Option<String>,

    #[arg(short = 'f', long = "file", help = "Read the formula from a file (`-` for stdin)")]
    file: Option<PathBuf>,

    #[arg(
        short = 't',
        long = "tree",
        env = "MATHFORMULA_TREE",
        default_value = "shader",
        value_parser = clap::value_parser!(TreeType),
        help = "Tree type: shader or geometry"
    )]
    tree: TreeType,

    #[arg(short = 'l', long = "library", help = "File with definitions to make available (repeatable)")]
    library: Vec<PathBuf>,

    #[arg(long = "format", value_enum, default_value = "json", help = "Output format")]
    format: Format,

    #[arg(short = 'o', long = "output", help = "Write to a file instead of stdout")]
    output: Option<PathBuf>,

    #[arg(long = "name", default_value = "Formula", help = "Name of the main tree")]
    name: String,

    #[arg(long = "width", default_value = "1024", help = "Diagram width in pixels")]
    width: u32,

    #[arg(long = "height", default_value = "768", help = "Diagram height in pixels")]
    height: u32,

    #[arg(long = "title", help = "Diagram title (defaults to the tree name)")]
    title: Option<String>,

    #[arg(long = "check", help = "Only report diagnostics")]
    check: bool,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help = "More logging (-v, -vv)")]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .init();
}

fn read_source(args: &Args) -> Result<Source> {
    match (&args.formula, &args.file) {
        (Some(text), _) => Ok(Source::new("<formula>", text.as_str())),
        (None, Some(path)) if path.as_os_str() == "-" => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read formula from stdin")?;
            Ok(Source::new("<stdin>", text))
        }
        (None, Some(path)) => read_file(path),
        (None, None) => anyhow::bail!("No formula given"),
    }
}

fn read_file(path: &Path) -> Result<Source> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Source::new(path.display().to_string(), text))
}

fn write_output(args: &Args, bytes: &[u8]) -> Result<()> {
    if let Some(path) = &args.output {
        return fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()));
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(bytes)
        .context("Failed to write output to stdout")?;
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn report(err: CompileError) -> Result<ExitCode> {
    match err {
        CompileError::Diagnostics(diagnostics) => {
            let stderr = io::stderr();
            let mut handle = stderr.lock();
            for diagnostic in &diagnostics {
                writeln!(handle, "{}", diagnostic.rendered).context("Failed to write diagnostics")?;
            }
            writeln!(handle, "error: {}", CompileError::Diagnostics(diagnostics))
                .context("Failed to write diagnostics")?;
            Ok(ExitCode::FAILURE)
        }
        CompileError::Internal(e) => Err(e.context("Failed to compile formula")),
    }
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let source = read_source(&args)?;
    let libraries = args
        .library
        .iter()
        .map(|path| read_file(path))
        .collect::<Result<Vec<_>>>()?;
    let options = CompileOptions {
        tree_type: args.tree,
        tree_name: args.name.clone(),
        libraries,
    };

    if args.check {
        return match check_source(&source, &options) {
            Ok(()) => Ok(ExitCode::SUCCESS),
            Err(err) => report(err),
        };
    }

    let compilation = match compile_source(&source, &options) {
        Ok(compilation) => compilation,
        Err(err) => return report(err),
    };

    let bytes = match args.format {
        Format::Json => export::to_json(&compilation.graph)?.into_bytes(),
        Format::Csv => export::to_csv(&compilation.graph)?.into_bytes(),
        Format::Ops => export::ops_listing(&compilation.ops).into_bytes(),
        Format::Png => {
            let config = RenderConfig {
                title: args.title.clone(),
                width: args.width,
                height: args.height,
            };
            render::render_tree(&compilation.graph.tree, &config)
                .context("Failed to render diagram")?
        }
    };
    write_output(&args, &bytes)?;
    Ok(ExitCode::SUCCESS)
}
