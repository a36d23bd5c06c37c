use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser;
use imagegen::{ImagegenError, JobOpts};

#[derive(Parser, Debug)]
#[command(name = "imagegen", version, about = "Render a PNG from a scene template")]
struct Cli {
    /// Template file to be processed.
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Resulting PNG file.
    #[arg(short = 'o', long = "output", required_unless_present = "dump_scene")]
    output: Option<PathBuf>,

    /// Print the marshalled scene as JSON instead of rendering it.
    #[arg(long, default_value_t = false)]
    dump_scene: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,

    /// Extra arguments exposed to the template as `args`.
    #[arg(trailing_var_arg = true, value_name = "ARGS")]
    args: Vec<String>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let opts = JobOpts {
        template: cli.input,
        output: cli.output.unwrap_or_default(),
        args: cli.args,
        working_dir: None,
    };

    let result = if cli.dump_scene {
        dump_scene(&opts)
    } else {
        imagegen::job::run(&opts).map(|report| {
            tracing::debug!(?report.stats, "job finished");
        })
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.category().exit_code())
        }
    }
}

fn dump_scene(opts: &JobOpts) -> Result<(), ImagegenError> {
    let scene = imagegen::job::load_scene(opts)?;
    let json = serde_json::to_string_pretty(&scene).context("serialize scene")?;
    println!("{json}");
    Ok(())
}
