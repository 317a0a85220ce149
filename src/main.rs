use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use autotag::{Editor, Engine, EngineConfig, PatternFile, builtin};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// File to annotate; standard input if omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// TOML file with additional patterns
    #[arg(short = 'p', long, value_name = "FILE")]
    patterns: Option<PathBuf>,

    /// Do not register the built-in patterns
    #[arg(long)]
    no_builtins: bool,

    /// Print the document rendered as HTML instead of a list of annotations
    #[arg(long)]
    html: bool,

    /// Render target used with --html
    #[arg(short = 't', long, value_name = "NAME", default_value = "editing")]
    target: String,

    /// Log engine activity to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("autotag=debug")
        } else {
            EnvFilter::new("autotag=warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => {
            let mut contents = String::new();
            io::stdin()
                .read_to_string(&mut contents)
                .context("Failed to read stdin")?;
            Ok(contents)
        }
    }
}

fn build_engine(args: &Args) -> Result<Engine> {
    let pattern_file = match args.patterns.as_ref() {
        Some(path) => PatternFile::load(path)?,
        None => PatternFile::default(),
    };

    let config = if args.patterns.is_some() {
        pattern_file.engine.clone()
    } else {
        EngineConfig::default()
    };
    let mut engine = Engine::with_config(config);
    for spec in pattern_file.patterns {
        let kind = spec.kind.clone();
        let definition = spec
            .into_definition()
            .with_context(|| format!("Pattern '{kind}'"))?;
        engine
            .register(definition)
            .with_context(|| format!("Failed to register pattern '{kind}'"))?;
    }
    if !args.no_builtins {
        builtin::register_defaults(&mut engine).context("Failed to register built-in patterns")?;
    }
    Ok(engine)
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    let text = read_input(args.file.as_ref())?;
    let mut editor = Editor::new(build_engine(&args)?);
    editor.load(&text);
    futures::executor::block_on(editor.settle());

    if args.html {
        println!("{}", editor.render_html(&args.target));
        return Ok(());
    }

    let doc = editor.document();
    let annotations = doc.annotations();
    for (range, annotation) in &annotations {
        let position = doc.position_of(range.start);
        println!(
            "{}:{}  {}  {}",
            position.block + 1,
            position.offset + 1,
            annotation.kind.as_str().cyan(),
            doc.text_in(range.clone()).bold()
        );
    }
    println!(
        "{} annotation{}.",
        annotations.len(),
        if annotations.len() == 1 { "" } else { "s" }
    );
    Ok(())
}
