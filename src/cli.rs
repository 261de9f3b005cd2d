use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;

use crate::app::DotRest;
use crate::config::Config;
use crate::output::{ConsoleReporter, JsonReporter};

#[derive(Parser)]
#[command(name = "dotrest")]
#[command(about = "Run .rest HTTP script files", version)]
pub struct Cli {
    /// Script file to run
    pub file: PathBuf,

    /// Verify mode: count assertions and print a summary instead of the
    /// final response body
    #[arg(short, long)]
    pub test: bool,

    /// Increase verbosity (repeatable)
    #[arg(short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit outcomes as JSON objects instead of plain text
    #[arg(long)]
    pub json: bool,
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        test_mode: cli.test,
        verbosity: cli.verbose as i64,
        ..Config::default()
    };
    let reporter: Rc<dyn crate::output::Reporter> = if cli.json {
        Rc::new(JsonReporter)
    } else {
        Rc::new(ConsoleReporter::new(config.verbosity))
    };

    let mut app = DotRest::new(config, reporter);
    #[cfg(feature = "lua")]
    {
        app.context.engine = Some(Rc::new(crate::scripting::LuaEngine::new()));
    }

    if app.run(&cli.file) {
        Ok(())
    } else {
        anyhow::bail!("{} failed", cli.file.display())
    }
}
