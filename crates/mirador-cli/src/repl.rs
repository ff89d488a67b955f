//! Read-Eval-Print Loop for a conversation session.
//!
//! Every non-empty line is one turn.  Two local commands never reach the
//! classifier:
//!   /help    – show this list
//!   /memory  – print the remembered context
//!
//! The session ends on a STOP turn (e.g. `exit`, `quit`, `bye`) or at end of
//! input.  A line that is not valid UTF-8 is skipped with a notice.

use colored::Colorize;
use std::io::{self, BufRead, Write};

use mirador_runtime::{AgentLoop, TurnOutcome, TurnReply};
use tokio::runtime::Runtime;
use tracing::warn;

/// Drive `agent` from `input` until the session stops.
///
/// Turns are executed on `rt`; the REPL itself stays synchronous.
pub fn run<R: BufRead, W: Write>(
    agent: &mut AgentLoop,
    rt: &Runtime,
    mut input: R,
    out: &mut W,
) -> io::Result<()> {
    loop {
        write!(out, "{} ", "You:".bold().green())?;
        out.flush()?;

        let mut buf = Vec::new();
        if input.read_until(b'\n', &mut buf)? == 0 {
            agent.shutdown();
            writeln!(out)?;
            writeln!(out, "{}", "Goodbye.".green())?;
            return Ok(());
        }

        let line = match String::from_utf8(buf) {
            Ok(line) => line,
            Err(e) => {
                warn!(bytes = e.as_bytes().len(), "discarding non-UTF-8 input line");
                writeln!(out, "{}", "Input was not valid UTF-8; line ignored.".yellow())?;
                continue;
            }
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        match text {
            "/help" => print_help(out)?,
            "/memory" => print_memory(agent, out)?,
            _ => match rt.block_on(agent.handle_turn(text)) {
                TurnOutcome::Stopped => {
                    writeln!(out, "{}", "[Intent → STOP]".dimmed())?;
                    writeln!(out, "{}", "Goodbye.".green())?;
                    return Ok(());
                }
                TurnOutcome::Reply(reply) => print_reply(&reply, out)?,
            },
        }
    }
}

fn print_reply<W: Write>(reply: &TurnReply, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", format!("[Intent → {}]", reply.intent).dimmed())?;
    if let Some(path) = &reply.image_path {
        writeln!(out, "  {} {}", "saved".dimmed(), path.display())?;
    }
    let text = if reply.degraded.is_some() {
        reply.text.yellow()
    } else {
        reply.text.normal()
    };
    writeln!(out, "{} {}", "Agent:".bold().cyan(), text)
}

fn print_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "Mirador".bold().underline())?;
    writeln!(out, "  Just talk.  Ask about what the camera or your screen shows and")?;
    writeln!(out, "  the agent will capture an image before answering.")?;
    writeln!(out, "  {}   – print the remembered conversation", "/memory".bold().cyan())?;
    writeln!(out, "  {}     – show this list", "/help".bold().cyan())?;
    writeln!(out, "  {}  – end the session", "exit  quit  bye".bold().cyan())?;
    writeln!(out)
}

fn print_memory<W: Write>(agent: &AgentLoop, out: &mut W) -> io::Result<()> {
    let memory = agent.memory();
    writeln!(
        out,
        "{}",
        format!("Memory ({}/{} turns)", memory.len(), memory.capacity()).bold()
    )?;
    if memory.is_empty() {
        writeln!(out, "  {}", "(empty)".dimmed())
    } else {
        for turn in memory.turns() {
            writeln!(out, "  {turn}")?;
        }
        Ok(())
    }
}
