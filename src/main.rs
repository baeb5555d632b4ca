use std::path::{Path, PathBuf};

use bpmn_pst::{render_text, structure_file, Config, Error};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "bpmn-pst", version, about = "Convert between BPMN flow graphs and process structure trees")]
struct Args {
    /// Config JSON file with structuring limits and layout settings
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recover the process structure tree of a .bpmn file
    Structure {
        input: PathBuf,
        /// Output file for the tree notation. Defaults to stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Render a tree notation file (.txt or .pst) as a laid out BPMN diagram
    Render {
        input: PathBuf,
        /// Output .bpmn file. Defaults to stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = run(Args::parse()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Error> {
    let config = Config::load(args.config.as_deref())?;
    match args.command {
        Command::Structure { input, output } => {
            require_extension(&input, &["bpmn", "xml"])?;
            let tree = structure_file(&input, &config)?;
            write_output(output.as_deref(), &format!("{tree:#}\n"))
        }
        Command::Render { input, output } => {
            require_extension(&input, &["txt", "pst"])?;
            let text = std::fs::read_to_string(&input)?;
            let bpmn = render_text(&text, &config)?;
            write_output(output.as_deref(), &format!("{bpmn}\n"))
        }
    }
}

fn require_extension(path: &Path, allowed: &[&str]) -> Result<(), Error> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| allowed.iter().any(|a| ext.eq_ignore_ascii_case(a)));
    if supported {
        Ok(())
    } else {
        Err(Error::UnsupportedFileExt)
    }
}

/// Everything is produced in memory first, so a failed run never leaves a partial file behind
fn write_output(path: Option<&Path>, contents: &str) -> Result<(), Error> {
    match path {
        Some(path) => {
            std::fs::write(path, contents)?;
            log::info!("wrote {}", path.display());
        }
        None => print!("{contents}"),
    }
    Ok(())
}
