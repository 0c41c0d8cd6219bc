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

//! Command shell driving the display registry.
//!
//! Each input line is one command. Output meant for the user is appended to a
//! caller-supplied buffer; diagnostics go through `tracing`.

use std::{collections::VecDeque, fmt::Write as _};

use eyre::{bail, Result};
use tracing::debug;
use wdb_common::{split_format_prefix, DisplayFormat, FormatSpec};
use wdb_engine::{
    handlers::ValueFormatter,
    CommandStatus, DisplayRegistry, SimExpr, SimulatedDebuggee, ALL_DISPLAYS,
};

use crate::config::Config;

/// What the shell should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Keep reading commands
    Continue,
    /// Leave the shell
    Exit,
}

/// The debugger's command shell
#[derive(Debug)]
pub struct Terminal {
    debuggee: SimulatedDebuggee,
    registry: DisplayRegistry<SimExpr>,
    config: Config,
    /// Command history, oldest first
    command_history: VecDeque<String>,
}

impl Terminal {
    /// Create a shell over `debuggee` with an empty display registry
    pub fn new(debuggee: SimulatedDebuggee, config: Config) -> Self {
        Self {
            debuggee,
            registry: DisplayRegistry::new(),
            config,
            command_history: VecDeque::new(),
        }
    }

    /// The debuggee being driven
    pub fn debuggee(&self) -> &SimulatedDebuggee {
        &self.debuggee
    }

    /// The display registry
    pub fn registry(&self) -> &DisplayRegistry<SimExpr> {
        &self.registry
    }

    /// Welcome text shown by interactive sessions
    pub fn banner(&self, out: &mut String) {
        let _ = writeln!(out, "WDB - Watch-display Debugger v{}", env!("CARGO_PKG_VERSION"));
        match self.debuggee.current_function() {
            Some(function) => {
                let _ = writeln!(out, "Stopped in {function}");
            }
            None => {
                let _ = writeln!(out, "The program is not being run.");
            }
        }
        let _ = writeln!(out, "Type 'help' for available commands");
    }

    /// Execute one command line
    pub fn execute(&mut self, command: &str, out: &mut String) -> CommandOutcome {
        let command = command.trim();
        debug!("Executing command: {}", command);

        if !command.is_empty() && self.command_history.back().is_none_or(|last| last != command) {
            if self.command_history.len() >= self.config.terminal.max_history {
                self.command_history.pop_front();
            }
            if self.config.terminal.max_history > 0 {
                self.command_history.push_back(command.to_string());
            }
        }

        if self.config.terminal.echo_commands {
            let _ = writeln!(out, "> {command}");
        }

        match command {
            "" => {}
            "quit" | "q" | "exit" => return CommandOutcome::Exit,
            "help" | "h" => show_help(out),
            "history" => self.show_history(out),
            cmd => {
                if let Err(e) = self.handle_debug_command(cmd, out) {
                    let _ = writeln!(out, "Error: {e}");
                }
            }
        }

        CommandOutcome::Continue
    }

    fn handle_debug_command(&mut self, command: &str, out: &mut String) -> Result<()> {
        let (word, rest) = match command.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (command, ""),
        };
        // `display/4i` carries its format on the command word
        let (name, suffix) = match word.find('/') {
            Some(slash) => word.split_at(slash),
            None => (word, ""),
        };
        let (spec, argument) = if suffix.is_empty() {
            split_format_prefix(rest)?
        } else {
            (Some(suffix.parse::<FormatSpec>()?), rest.to_string())
        };

        match name {
            "display" | "disp" => self.display(spec, &argument, out),
            "undisplay" => self.undisplay(&argument, out),
            "delete" | "d" => match display_subcommand(&argument) {
                Some(numbers) => self.undisplay(numbers, out),
                None => bail!("Usage: delete display [n...]"),
            },
            "enable" | "disable" => {
                let Some(numbers) = display_subcommand(&argument) else {
                    bail!("Usage: {name} display <n...>");
                };
                self.set_enabled(numbers, name == "enable", out)
            }
            "info" => match argument.as_str() {
                "display" => self.info_display(out),
                other => bail!("Undefined info command: \"{other}\""),
            },
            "print" | "p" => self.print(spec.unwrap_or_default(), &argument, out),
            "call" => {
                if argument.is_empty() {
                    bail!("Usage: call <function>");
                }
                self.debuggee.call(&argument)?;
                let _ = writeln!(out, "Stopped in {argument}");
                self.stopped(out)
            }
            "finish" => {
                let function = self.debuggee.finish()?;
                let _ = writeln!(out, "Run till exit from {function}");
                self.stopped(out)
            }
            "set" => self.set(&argument, out),
            "where" | "bt" | "backtrace" => {
                self.backtrace(out);
                Ok(())
            }
            _ => bail!("Unknown command: {word}. Type 'help' for available commands"),
        }
    }

    /// Print every display after the debuggee stopped somewhere new
    fn stopped(&mut self, out: &mut String) -> Result<()> {
        match self.debuggee.current_function() {
            Some(function) => debug!(function, "Debuggee stopped"),
            None => {
                let _ = writeln!(out, "The program is not being run.");
                return Ok(());
            }
        }
        self.registry.print_all(&self.debuggee, out)?;
        Ok(())
    }

    fn display(&mut self, spec: Option<FormatSpec>, expression: &str, out: &mut String) -> Result<()> {
        if expression.is_empty() {
            if spec.is_some() {
                bail!("Argument required (expression to display)");
            }
            self.registry.print_all(&self.debuggee, out)?;
            return Ok(());
        }

        let display = &self.config.display;
        let (count, format) = match spec {
            Some(spec) => (spec.count, spec.format),
            None => (display.default_count, display.default_format),
        };

        let expr = self.debuggee.parse(expression)?;
        let number = self.registry.add(&self.debuggee, &expr, count, format)?;
        let status = self.registry.print_one(&self.debuggee, out, number as i64)?;
        debug!(number, ?status, "Displayed new expression");
        Ok(())
    }

    fn undisplay(&mut self, numbers: &str, out: &mut String) -> Result<()> {
        if numbers.is_empty() {
            report(self.registry.delete(out, ALL_DISPLAYS)?);
            return Ok(());
        }
        for number in parse_display_numbers(numbers)? {
            report(self.registry.delete(out, number)?);
        }
        Ok(())
    }

    fn set_enabled(&mut self, numbers: &str, enabled: bool, out: &mut String) -> Result<()> {
        if numbers.is_empty() {
            bail!("Argument required (one or more display numbers)");
        }
        for number in parse_display_numbers(numbers)? {
            report(self.registry.set_enabled(&self.debuggee, out, number, enabled)?);
        }
        Ok(())
    }

    fn info_display(&self, out: &mut String) -> Result<()> {
        if self.registry.is_empty() {
            let _ = writeln!(out, "There are no auto-display expressions now.");
            return Ok(());
        }
        let mut listing = String::new();
        self.registry.list(&self.debuggee, &mut listing)?;
        let _ = writeln!(out, "Auto-display expressions now in effect:");
        out.push_str(&listing);
        Ok(())
    }

    fn print(&self, spec: FormatSpec, expression: &str, out: &mut String) -> Result<()> {
        if expression.is_empty() {
            bail!("Argument required (expression to print)");
        }
        let (expr, value) = self.debuggee.evaluate_text(expression)?;
        let _ = write!(out, "{expr} = ");
        let format = if spec.format == DisplayFormat::Instruction { DisplayFormat::Hex } else { spec.format };
        let _ = self.debuggee.print_scalar(out, &value, format, 0);
        let _ = writeln!(out);
        Ok(())
    }

    fn set(&mut self, assignment: &str, out: &mut String) -> Result<()> {
        let assignment = assignment.strip_prefix("var ").unwrap_or(assignment);
        let Some((name, value)) = assignment.split_once('=') else {
            bail!("Usage: set [var] <name> = <expression>");
        };
        let name = name.trim();
        let (_, value) = self.debuggee.evaluate_text(value.trim())?;
        self.debuggee.set_variable(name, value)?;
        debug!(name, value, "Assigned variable");
        self.stopped(out)
    }

    fn backtrace(&self, out: &mut String) {
        let frames = self.debuggee.backtrace();
        if frames.is_empty() {
            let _ = writeln!(out, "No stack.");
            return;
        }
        for (depth, frame) in frames.iter().enumerate() {
            let _ = writeln!(out, "#{depth}  0x{:08x} in {}", frame.address, frame.name());
        }
    }

    fn show_history(&self, out: &mut String) {
        if self.command_history.is_empty() {
            let _ = writeln!(out, "No command history");
            return;
        }
        let _ = writeln!(out, "Command history:");
        for (i, cmd) in self.command_history.iter().enumerate() {
            let _ = writeln!(out, "  {}: {}", i + 1, cmd);
        }
    }
}

fn report(status: CommandStatus) {
    if status == CommandStatus::InvalidDisplayNumber {
        debug!("Command named an invalid display number");
    }
}

/// Numbers following a leading `display` word, if the argument starts with one
fn display_subcommand(argument: &str) -> Option<&str> {
    let (word, rest) = argument.split_once(char::is_whitespace).unwrap_or((argument, ""));
    (word == "display").then(|| rest.trim())
}

fn parse_display_numbers(text: &str) -> Result<Vec<i64>> {
    text.split_whitespace()
        .map(|word| match word.parse::<i64>() {
            Ok(number) => Ok(number),
            Err(_) => bail!("Arguments must be display numbers, got '{word}'"),
        })
        .collect()
}

fn show_help(out: &mut String) {
    const HELP: &str = "\
Available commands:

Displays:
  display                  - Print all enabled displays in scope
  display[/fmt] <expr>     - Display <expr> every time the program stops
  info display             - List displays
  undisplay [n...]         - Delete displays (all when no number is given)
  delete display [n...]    - Same as undisplay
  enable display <n...>    - Enable displays
  disable display <n...>   - Disable displays

Formats (/[count][letter]):
  x hex, d decimal, u unsigned, c char, s string,
  b byte, w word, g giant, i instruction (dumps <count> items)

Execution:
  call <function>          - Enter <function>
  finish                   - Return from the current function
  set [var] <name> = <expr> - Assign a variable
  where, bt                - Show the call stack
  print[/fmt] <expr>, p    - Evaluate and print <expr> once

Other:
  help, h                  - Show this help
  history                  - Show command history
  quit, q, exit            - Exit debugger
";
    out.push_str(HELP);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminal() -> Terminal {
        Terminal::new(SimulatedDebuggee::default(), Config::default())
    }

    fn run(terminal: &mut Terminal, command: &str) -> String {
        let mut out = String::new();
        assert_eq!(terminal.execute(command, &mut out), CommandOutcome::Continue);
        out
    }

    #[test]
    fn test_display_adds_and_prints() {
        let mut terminal = terminal();
        assert_eq!(run(&mut terminal, "display counter"), "1: counter = 3\n");
        assert_eq!(run(&mut terminal, "display/x limit"), "2: limit = 0x64\n");
        assert_eq!(run(&mut terminal, "display /2i 0x401000"), "3: 4198400 = 0x00401000: push   %ebp\n0x00401001: mov    %esp,%ebp\n");
        assert_eq!(terminal.registry().len(), 3);
    }

    #[test]
    fn test_display_without_argument_prints_all() {
        let mut terminal = terminal();
        run(&mut terminal, "display counter");
        run(&mut terminal, "display argc");
        assert_eq!(run(&mut terminal, "display"), "1: counter = 3\n2: argc = 1\n");
        assert!(run(&mut terminal, "display/x").starts_with("Error: Argument required"));
    }

    #[test]
    fn test_info_display() {
        let mut terminal = terminal();
        assert_eq!(run(&mut terminal, "info display"), "There are no auto-display expressions now.\n");

        run(&mut terminal, "display argc");
        run(&mut terminal, "display counter");
        run(&mut terminal, "disable display 2");
        assert_eq!(
            run(&mut terminal, "info display"),
            "Auto-display expressions now in effect:\n1: argc in main\n2: counter (disabled)\n"
        );
    }

    #[test]
    fn test_call_and_finish_print_displays() {
        let mut terminal = terminal();
        run(&mut terminal, "display argc");
        run(&mut terminal, "display counter");

        assert_eq!(run(&mut terminal, "call compute"), "Stopped in compute\n2: counter = 3\n");
        assert_eq!(run(&mut terminal, "finish"), "Run till exit from compute\n1: argc = 1\n2: counter = 3\n");
        assert_eq!(run(&mut terminal, "finish"), "Run till exit from main\nThe program is not being run.\n");
        assert!(run(&mut terminal, "info display").starts_with("Error: no current frame"));
    }

    #[test]
    fn test_set_variable_reprints() {
        let mut terminal = terminal();
        run(&mut terminal, "display counter * 2");
        assert_eq!(run(&mut terminal, "set var counter = limit + 1"), "1: counter * 2 = 202\n");
        assert_eq!(run(&mut terminal, "set counter = 0"), "1: counter * 2 = 0\n");
        assert!(run(&mut terminal, "set nothing").starts_with("Error: Usage"));
    }

    #[test]
    fn test_invalid_display_numbers() {
        let mut terminal = terminal();
        run(&mut terminal, "display counter");
        assert_eq!(run(&mut terminal, "undisplay 5"), "Invalid display number\n");
        assert_eq!(run(&mut terminal, "enable display 0"), "Invalid display number\n");
        assert!(run(&mut terminal, "undisplay two").starts_with("Error: Arguments must be display numbers"));
        assert_eq!(terminal.registry().len(), 1);
    }

    #[test]
    fn test_undisplay_and_delete_display() {
        let mut terminal = terminal();
        for expr in ["counter", "limit", "flags"] {
            run(&mut terminal, &format!("display {expr}"));
        }
        assert!(run(&mut terminal, "delete display 2").is_empty());
        assert_eq!(run(&mut terminal, "display total"), "2: total = 0\n");
        assert!(run(&mut terminal, "undisplay").is_empty());
        assert!(terminal.registry().is_empty());
        assert!(run(&mut terminal, "delete 1").starts_with("Error: Usage"));
    }

    #[test]
    fn test_display_subcommand_needs_separate_word() {
        let mut terminal = terminal();
        for expr in ["counter", "limit", "flags"] {
            run(&mut terminal, &format!("display {expr}"));
        }
        assert!(run(&mut terminal, "delete display2").starts_with("Error: Usage: delete display"));
        assert!(run(&mut terminal, "disable display3").starts_with("Error: Usage: disable display"));
        assert!(run(&mut terminal, "enable displays 1").starts_with("Error: Usage: enable display"));
        assert_eq!(terminal.registry().len(), 3);
        assert!(terminal.registry().get(3).is_some_and(|record| record.is_enabled()));

        assert!(run(&mut terminal, "disable display\t3").is_empty());
        assert!(terminal.registry().get(3).is_some_and(|record| !record.is_enabled()));
        assert!(run(&mut terminal, "delete display").is_empty());
        assert!(terminal.registry().is_empty());
    }

    #[test]
    fn test_print_is_one_shot() {
        let mut terminal = terminal();
        assert_eq!(run(&mut terminal, "print counter + 1"), "counter + 1 = 4\n");
        assert_eq!(run(&mut terminal, "p/x limit"), "limit = 0x64\n");
        assert_eq!(run(&mut terminal, "print/s greeting"), "greeting = \"hello\"\n");
        assert!(terminal.registry().is_empty());
        assert!(run(&mut terminal, "print nope").starts_with("Error: No symbol"));
    }

    #[test]
    fn test_where() {
        let mut terminal = terminal();
        run(&mut terminal, "call compute");
        assert_eq!(run(&mut terminal, "where"), "#0  0x00401040 in compute\n#1  0x00401000 in main\n");
    }

    #[test]
    fn test_history_and_quit() {
        let mut terminal = terminal();
        run(&mut terminal, "display counter");
        run(&mut terminal, "display counter");
        run(&mut terminal, "info display");
        assert_eq!(run(&mut terminal, "history"), "Command history:\n  1: display counter\n  2: info display\n  3: history\n");

        let mut out = String::new();
        assert_eq!(terminal.execute("quit", &mut out), CommandOutcome::Exit);
    }

    #[test]
    fn test_unknown_command() {
        let mut terminal = terminal();
        assert_eq!(run(&mut terminal, "frobnicate now"), "Error: Unknown command: frobnicate. Type 'help' for available commands\n");
        assert!(run(&mut terminal, "help").contains("display[/fmt] <expr>"));
    }

    #[test]
    fn test_config_defaults_and_echo() {
        let mut config = Config::default();
        config.display.default_format = DisplayFormat::Hex;
        config.terminal.echo_commands = true;
        let mut terminal = Terminal::new(SimulatedDebuggee::default(), config);

        assert_eq!(run(&mut terminal, "display limit"), "> display limit\n1: limit = 0x64\n");
    }
}
