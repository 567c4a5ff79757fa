use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::store::{Snapshot, Stats};
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            color: cfg.color()? && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn write_snapshot<W: Write>(&self, mut out: W, snapshot: &Snapshot) -> anyhow::Result<()> {
        writeln!(
            out,
            "Currently using: {}  (filter: {})",
            snapshot.backend.label(),
            snapshot.filter
        )?;
        writeln!(out)?;

        if snapshot.visible.is_empty() {
            writeln!(out, "No tasks to show.")?;
        } else {
            self.write_tasks(&mut out, &snapshot.visible)?;
        }

        writeln!(out)?;
        self.write_stats(&mut out, &snapshot.stats)?;
        Ok(())
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: &Stats) -> anyhow::Result<()> {
        writeln!(
            out,
            "{} tasks, {} completed, {} pending",
            stats.total, stats.completed, stats.pending
        )?;
        Ok(())
    }

    fn write_tasks<W: Write>(&self, out: W, tasks: &[Task]) -> anyhow::Result<()> {
        let headers = vec!["ID".to_string(), "Done".to_string(), "Text".to_string()];

        let rows = tasks
            .iter()
            .map(|task| {
                let id = self.paint(&task.id.to_string(), "33");
                let done = if task.completed { "[x]" } else { "[ ]" }.to_string();
                let text = if task.completed {
                    self.paint(&task.text, "9;90")
                } else {
                    task.text.clone()
                };
                vec![id, done, text]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let last = column_count.saturating_sub(1);
    for (idx, header) in headers.iter().enumerate() {
        if idx == last {
            writeln!(writer, "{header}")?;
        } else {
            write!(writer, "{:width$} ", header, width = widths[idx])?;
        }
    }

    for (idx, width) in widths.iter().enumerate() {
        write!(writer, "{:-<width$}", "", width = *width)?;
        if idx == last {
            writeln!(writer)?;
        } else {
            write!(writer, " ")?;
        }
    }

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx == last {
                writeln!(writer, "{cell}")?;
                continue;
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
