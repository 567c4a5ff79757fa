use std::io::{BufRead, Write};

use anyhow::{Context, anyhow};
use tracing::{debug, info, instrument};

use crate::backend::BackendKind;
use crate::cli::Invocation;
use crate::config::Config;
use crate::error::StoreError;
use crate::filter::FilterMode;
use crate::render::Renderer;
use crate::store::{Outcome, TaskStore};
use crate::task::TaskId;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "backend", "clear", "delete", "edit", "exit", "filter", "help", "list", "quit",
        "shell", "stats", "toggle", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &str, known: &[&'a str]) -> Option<&'a str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Composition root of one run: owns the task store and turns intents into
/// store operations and rendered snapshots.
pub struct Session {
    store: TaskStore,
    renderer: Renderer,
    ask_confirmation: bool,
}

impl Session {
    pub fn new(store: TaskStore, renderer: Renderer, ask_confirmation: bool) -> Self {
        Self {
            store,
            renderer,
            ask_confirmation,
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Initial load; a failure is reported and the session starts empty.
    pub async fn start<W: Write>(&mut self, out: &mut W) -> anyhow::Result<()> {
        let loaded = self.store.load_all().await;
        self.report(loaded.map(|_| ()), out)
    }

    #[instrument(skip(self, inv, input, out), fields(command = %inv.command))]
    pub async fn dispatch<R: BufRead, W: Write>(
        &mut self,
        inv: &Invocation,
        input: &mut R,
        out: &mut W,
    ) -> anyhow::Result<Flow> {
        debug!(args = ?inv.args, "dispatching command");
        let args = inv.args.as_slice();

        match inv.command.as_str() {
            "list" => self.render(out)?,
            "add" => {
                let text = args.join(" ");
                match self.store.add(&text).await {
                    Ok(task) => {
                        writeln!(out, "Created task {}.", task.id)?;
                        self.render(out)?;
                    }
                    Err(err) => self.report(Err(err), out)?,
                }
            }
            "toggle" => {
                let id = parse_id(args)?;
                let result = self.store.toggle(id).await;
                self.settle(result, out)?;
            }
            "edit" => {
                let id = parse_id(args)?;
                let text = args[1..].join(" ");
                let result = self.store.edit(id, &text).await;
                self.settle(result, out)?;
            }
            "delete" => {
                let id = parse_id(args)?;
                if self.store.get(id).is_none() {
                    debug!(id, "delete of unknown task ignored");
                } else if self.confirm(input, out, "Are you sure you want to delete this task?")? {
                    let result = self.store.remove(id).await;
                    self.settle(result, out)?;
                }
            }
            "clear" => {
                if self.confirm(
                    input,
                    out,
                    "Are you sure you want to clear all completed tasks?",
                )? {
                    let result = self.store.clear_completed().await;
                    self.settle(result, out)?;
                }
            }
            "filter" => {
                let mode: FilterMode = single_arg(args, "filter mode")?.parse()?;
                let _ = self.store.set_filter(mode);
                self.render(out)?;
            }
            "backend" => {
                let kind: BackendKind = single_arg(args, "backend")?.parse()?;
                let result = self.store.switch_backend(kind).await;
                self.settle(result, out)?;
            }
            "stats" => {
                let snapshot = self.store.snapshot();
                self.renderer.write_stats(&mut *out, &snapshot.stats)?;
            }
            "help" => write_help(out)?,
            "version" => writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?,
            "quit" | "exit" => return Ok(Flow::Quit),
            "shell" => return Err(anyhow!("already in a shell session")),
            other => return Err(anyhow!("unknown command: {other}")),
        }

        Ok(Flow::Continue)
    }

    /// Reads one intent per line until `quit`, `exit` or end of input.
    #[instrument(skip_all)]
    pub async fn run_shell<R: BufRead, W: Write>(
        &mut self,
        cfg: &Config,
        input: &mut R,
        out: &mut W,
    ) -> anyhow::Result<()> {
        info!("starting shell session");
        self.render(out)?;

        loop {
            write!(out, "todo> ")?;
            out.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line).context("failed reading input")? == 0 {
                writeln!(out)?;
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let flow = match Invocation::from_line(cfg, &line) {
                Ok(inv) if inv.command == "shell" => Ok(Flow::Continue),
                Ok(inv) => self.dispatch(&inv, input, out).await,
                Err(err) => Err(err),
            };
            match flow {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => writeln!(out, "error: {err:#}")?,
            }
        }

        info!("shell session ended");
        Ok(())
    }

    fn render<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        self.renderer.write_snapshot(out, &self.store.snapshot())
    }

    fn settle<W: Write>(
        &self,
        result: Result<Outcome, StoreError>,
        out: &mut W,
    ) -> anyhow::Result<()> {
        match result {
            Ok(Outcome::Applied) => self.render(out),
            Ok(Outcome::Unchanged) => Ok(()),
            Err(err) => self.report(Err(err), out),
        }
    }

    /// Backend failures become a notice; validation rejections stay silent.
    fn report<W: Write>(&self, result: Result<(), StoreError>, out: &mut W) -> anyhow::Result<()> {
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.is_validation() => {
                debug!(reason = %err, "intent ignored");
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, "operation had no effect");
                writeln!(out, "{err}")?;
                if matches!(err, StoreError::Read(_) | StoreError::PartialClear { .. }) {
                    self.render(out)?;
                }
                Ok(())
            }
        }
    }

    fn confirm<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        out: &mut W,
        prompt: &str,
    ) -> anyhow::Result<bool> {
        if !self.ask_confirmation {
            return Ok(true);
        }

        write!(out, "{prompt} (yes/no) ")?;
        out.flush()?;

        let mut answer = String::new();
        if input.read_line(&mut answer).context("failed reading confirmation")? == 0 {
            writeln!(out)?;
            return Ok(false);
        }
        let accepted = matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes");
        debug!(accepted, "confirmation answered");
        Ok(accepted)
    }
}

fn parse_id(args: &[String]) -> anyhow::Result<TaskId> {
    let raw = args.first().ok_or_else(|| anyhow!("expected a task id"))?;
    raw.parse::<TaskId>()
        .map_err(|_| anyhow!("invalid task id: {raw}"))
}

fn single_arg<'a>(args: &'a [String], what: &str) -> anyhow::Result<&'a str> {
    match args {
        [one] => Ok(one.as_str()),
        [] => Err(anyhow!("expected a {what}")),
        _ => Err(anyhow!("expected a single {what}")),
    }
}

fn write_help<W: Write>(out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "Usage: todo [options] <command> [args]")?;
    writeln!(out)?;
    writeln!(out, "  list                 show tasks under the active filter")?;
    writeln!(out, "  add <text>           create a task")?;
    writeln!(out, "  toggle <id>          flip a task between pending and completed")?;
    writeln!(out, "  edit <id> <text>     replace a task's text")?;
    writeln!(out, "  delete <id>          delete a task")?;
    writeln!(out, "  clear                delete every completed task")?;
    writeln!(out, "  filter <mode>        all, active or completed")?;
    writeln!(out, "  backend <kind>       local or remote")?;
    writeln!(out, "  stats                total, completed and pending counts")?;
    writeln!(out, "  shell                read commands from stdin until quit")?;
    writeln!(out, "  version              print the version")?;
    Ok(())
}
