//! Interactive menu for collecting the run settings from an operator.
//!
//! Two pages: the main menu (`1) Start`, `2) Exit`) and the settings page,
//! which asks for the starting index, batch size and worker count. Anything
//! that does not parse, or that the caller's validator rejects, prints an
//! error and asks for all three settings again.
//!
//! The prompt reads from any [`BufRead`] and writes to any [`Write`], so it
//! does not depend on a real terminal.

use super::config::Settings;
use anyhow::Context;
use core::str::FromStr;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    MainMenu,
    Settings,
}

/// One answer on the settings page.
enum Reply<N> {
    Value(N),
    /// Did not parse; already reported.
    Invalid,
    Eof,
}

/// Runs the menu until `validate` accepts a set of settings.
///
/// Returns `Ok(None)` if the operator chose to exit or input ended.
///
/// # Errors
///
/// Returns an error only if reading input or writing output fails.
pub fn collect<R, W, T, F>(mut input: R, mut output: W, validate: F) -> anyhow::Result<Option<T>>
where
    R: BufRead,
    W: Write,
    F: Fn(Settings) -> anyhow::Result<T>,
{
    let mut page = Page::MainMenu;

    loop {
        match page {
            Page::MainMenu => {
                writeln!(output, "1) Start")?;
                writeln!(output, "2) Exit")?;
                match read_line(&mut input)?.as_deref() {
                    Some("1") => page = Page::Settings,
                    Some("2") | None => return Ok(None),
                    Some(_) => {}
                }
            }
            Page::Settings => {
                let starting_index = match ask::<u64, _, _>(
                    &mut input,
                    &mut output,
                    "Enter starting index:",
                    "number",
                )? {
                    Reply::Value(n) => n,
                    Reply::Invalid => continue,
                    Reply::Eof => return Ok(None),
                };
                let batch_size = match ask::<u64, _, _>(
                    &mut input,
                    &mut output,
                    "Enter batch size:",
                    "batch size",
                )? {
                    Reply::Value(n) => n,
                    Reply::Invalid => continue,
                    Reply::Eof => return Ok(None),
                };
                let num_workers = match ask::<usize, _, _>(
                    &mut input,
                    &mut output,
                    "Enter number of workers:",
                    "workers count",
                )? {
                    Reply::Value(n) => n,
                    Reply::Invalid => continue,
                    Reply::Eof => return Ok(None),
                };

                let settings = Settings {
                    starting_index,
                    batch_size,
                    num_workers,
                };
                match validate(settings) {
                    Ok(value) => return Ok(Some(value)),
                    Err(e) => writeln!(output, "(x) Error: {e:#}. Try again.")?,
                }
            }
        }
    }
}

/// Prints `question` and parses the answer.
fn ask<N, R, W>(input: &mut R, output: &mut W, question: &str, what: &str) -> anyhow::Result<Reply<N>>
where
    N: FromStr,
    R: BufRead,
    W: Write,
{
    writeln!(output, "{question}")?;
    let Some(line) = read_line(input)? else {
        return Ok(Reply::Eof);
    };
    match line.parse() {
        Ok(n) => Ok(Reply::Value(n)),
        Err(_) => {
            writeln!(output, "(x) Error: Invalid {what}. Try again.")?;
            Ok(Reply::Invalid)
        }
    }
}

fn read_line<R: BufRead>(input: &mut R) -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    let n = input.read_line(&mut line).context("failed to read input")?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_owned()))
}
