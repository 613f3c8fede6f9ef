use crate::discovery::ScanFolder;

use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::PathBuf;

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl Prompter<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{}", question).context("write prompt")?;
        self.output.flush().context("flush prompt")?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read answer")?;
        if read == 0 {
            writeln!(self.output).ok();
            return Ok(None);
        }
        let answer = line.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }

    pub fn select_folder<'a>(&mut self, folders: &'a [ScanFolder]) -> Result<Option<&'a ScanFolder>> {
        if folders.is_empty() {
            return Ok(None);
        }
        writeln!(self.output, "Available scan folders:").context("write prompt")?;
        for (i, folder) in folders.iter().enumerate() {
            writeln!(self.output, "  {}. {}", i + 1, folder.path).context("write prompt")?;
        }
        loop {
            let question = format!("Select folder [1-{}] (1): ", folders.len());
            let Some(answer) = self.ask(&question)? else {
                return Ok(folders.first());
            };
            match answer.parse::<usize>() {
                Ok(n) if (1..=folders.len()).contains(&n) => return Ok(folders.get(n - 1)),
                _ => {
                    writeln!(self.output, "Please enter a number between 1 and {}", folders.len())
                        .context("write prompt")?;
                }
            }
        }
    }

    pub fn confirm(&mut self, question: &str, default: bool) -> Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let Some(answer) = self.ask(&format!("{} {} ", question, hint))? else {
                return Ok(default);
            };
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => {
                    writeln!(self.output, "Please answer y or n").context("write prompt")?;
                }
            }
        }
    }

    pub fn output_path(&mut self, default: PathBuf) -> Result<PathBuf> {
        let question = format!("Output path ({}): ", default.display());
        Ok(self.ask(&question)?.map(PathBuf::from).unwrap_or(default))
    }
}
