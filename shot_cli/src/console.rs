//! Operator commands typed on stdin, for running without a button panel.
//!
//! One command per line:
//!
//! | line              | effect                           |
//! |-------------------|----------------------------------|
//! | `start`, `p`      | paddle engaged                   |
//! | `stop`, `s`       | paddle released                  |
//! | `+` / `-`         | target up / down by a short step |
//! | `++` / `--`       | target up / down by a long step  |
//! | `rotate`, `r`     | next preset                      |
//! | `tare`, `t`       | tare the scale                   |
//! | `link on|off`     | scale link switch                |
//! | `quit`, `q`       | shut down                        |
use std::io::BufRead;

use shot_core::{Command, CommandSender, InputCfg, Shutdown};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleInput {
    Cmd(Command),
    Quit,
}

pub fn parse_line(line: &str, cfg: &InputCfg) -> Option<ConsoleInput> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let cmd = match head.as_str() {
        "start" | "p" => Command::StartShot,
        "stop" | "s" => Command::StopShot,
        "+" => Command::Adjust(cfg.short_step_g),
        "-" => Command::Adjust(-cfg.short_step_g),
        "++" => Command::Adjust(cfg.long_step_g),
        "--" => Command::Adjust(-cfg.long_step_g),
        "rotate" | "r" => Command::RotatePreset,
        "tare" | "t" => Command::Tare,
        "link" => match words.next().map(str::to_ascii_lowercase).as_deref() {
            Some("on") => Command::LinkEnabled(true),
            Some("off") => Command::LinkEnabled(false),
            _ => return None,
        },
        "quit" | "q" => return Some(ConsoleInput::Quit),
        _ => return None,
    };
    Some(ConsoleInput::Cmd(cmd))
}

/// Read commands from stdin on a detached thread.
///
/// The thread is never joined: it spends its life blocked in `read_line`
/// and goes away with the process. It ends on EOF, on `quit`, or when the
/// control loop has dropped its command receiver.
pub fn spawn_stdin_reader(commands: CommandSender, cfg: InputCfg, shutdown: Shutdown) {
    let spawned = std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                };
                match parse_line(&line, &cfg) {
                    Some(ConsoleInput::Cmd(cmd)) => {
                        tracing::debug!(?cmd, "console command");
                        if commands.send(cmd).is_err() {
                            break;
                        }
                    }
                    Some(ConsoleInput::Quit) => {
                        shutdown.trigger();
                        break;
                    }
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!(line = %line.trim(), "unknown console command"),
                }
            }
            tracing::trace!("stdin reader exiting");
        });
    if let Err(e) = spawned {
        tracing::error!(error = %e, "failed to spawn stdin reader");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("start", Some(ConsoleInput::Cmd(Command::StartShot)))]
    #[case("  P ", Some(ConsoleInput::Cmd(Command::StartShot)))]
    #[case("s", Some(ConsoleInput::Cmd(Command::StopShot)))]
    #[case("+", Some(ConsoleInput::Cmd(Command::Adjust(0.1))))]
    #[case("--", Some(ConsoleInput::Cmd(Command::Adjust(-1.0))))]
    #[case("r", Some(ConsoleInput::Cmd(Command::RotatePreset)))]
    #[case("tare", Some(ConsoleInput::Cmd(Command::Tare)))]
    #[case("link OFF", Some(ConsoleInput::Cmd(Command::LinkEnabled(false))))]
    #[case("link", None)]
    #[case("quit", Some(ConsoleInput::Quit))]
    #[case("", None)]
    #[case("brew", None)]
    fn parses_console_lines(#[case] line: &str, #[case] want: Option<ConsoleInput>) {
        assert_eq!(parse_line(line, &InputCfg::default()), want);
    }
}
