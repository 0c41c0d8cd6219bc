// WDB - Watch-display Debugger
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! WDB - Watch-display Debugger
//!
//! Reads debugger commands from stdin and writes their output to stdout.

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use clap::Parser;
use eyre::Result;
use wdb::{CommandOutcome, Config, Terminal};
use wdb_common::logging;
use wdb_engine::SimulatedDebuggee;

/// Command-line interface for WDB
#[derive(Debug, Parser)]
#[command(name = "wdb")]
#[command(about = "WDB - Watch-display Debugger over a simulated debuggee", version)]
struct Cli {
    /// Scenario file describing the debuggee (built-in demo program if not specified)
    #[arg(long, env = "WDB_SCENARIO")]
    scenario: Option<PathBuf>,

    /// Config file path (uses ~/.wdb.toml if not specified)
    #[arg(long, env = "WDB_CONFIG")]
    config: Option<PathBuf>,

    /// Disable logging to file
    #[arg(long)]
    no_file_log: bool,

    /// Read commands from stdin without banner or prompt
    #[arg(long)]
    batch: bool,
}

fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load().unwrap_or_default(),
    };

    logging::init_logging(
        "wdb",
        config.logging.file_logging && !cli.no_file_log,
        config.logging.level()?,
    )?;

    let debuggee = match &cli.scenario {
        Some(path) => {
            tracing::info!("Loading scenario from {}", path.display());
            SimulatedDebuggee::load(path)?
        }
        None => SimulatedDebuggee::default(),
    };

    let prompt = config.terminal.prompt.clone();
    let mut terminal = Terminal::new(debuggee, config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut out = String::new();

    if !cli.batch {
        terminal.banner(&mut out);
        stdout.write_all(out.as_bytes())?;
    }

    let mut line = String::new();
    loop {
        if !cli.batch {
            write!(stdout, "{prompt}")?;
            stdout.flush()?;
        }

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        out.clear();
        let outcome = terminal.execute(&line, &mut out);
        stdout.write_all(out.as_bytes())?;

        if outcome == CommandOutcome::Exit {
            break;
        }
    }

    tracing::info!("WDB exited normally");
    Ok(())
}
