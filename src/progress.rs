use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::{Duration, Instant};

const MAX_STORED_WARNINGS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum ProgressMode {
    Auto,
    Rich,
    Plain,
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedProgressMode {
    Rich,
    Plain,
    Quiet,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    pub mode: ProgressMode,
    pub plain_interval: Duration,
    tty_override: Option<bool>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            mode: ProgressMode::Auto,
            plain_interval: Duration::from_secs(2),
            tty_override: None,
        }
    }
}

impl ProgressConfig {
    pub fn new(mode: ProgressMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn with_tty_override(mut self, is_tty: bool) -> Self {
        self.tty_override = Some(is_tty);
        self
    }

    pub fn resolve_mode(self) -> ResolvedProgressMode {
        self.mode.resolve(
            self.tty_override
                .unwrap_or_else(|| std::io::stderr().is_terminal()),
        )
    }
}

impl ProgressMode {
    fn resolve(self, stderr_is_tty: bool) -> ResolvedProgressMode {
        match self {
            ProgressMode::Auto => {
                if stderr_is_tty {
                    ResolvedProgressMode::Rich
                } else {
                    ResolvedProgressMode::Plain
                }
            }
            ProgressMode::Rich => ResolvedProgressMode::Rich,
            ProgressMode::Plain => ResolvedProgressMode::Plain,
            ProgressMode::Quiet => ResolvedProgressMode::Quiet,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProgressOutcome {
    pub elapsed: Duration,
    pub total_items: u64,
    pub processed_items: u64,
    pub items_per_sec: f64,
    pub warning_count: usize,
    pub warnings: Vec<String>,
}

/// Item counter for one pipeline stage (downloads, encoded frames).
///
/// Rich mode draws an indicatif bar, plain mode prints `[PROGRESS]` lines at
/// most every `plain_interval`, quiet prints nothing. Warnings are kept either
/// way and handed back by [`ProgressReporter::finish`].
pub struct ProgressReporter {
    label: String,
    mode: ResolvedProgressMode,
    plain_interval: Duration,
    bar: Option<ProgressBar>,
    started: Instant,
    last_plain_emit: Instant,
    total_items: u64,
    processed_items: u64,
    warning_count: usize,
    warnings: Vec<String>,
    finalized: bool,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, total_items: u64, config: ProgressConfig) -> Self {
        let label = label.into();
        let mode = config.resolve_mode();
        let now = Instant::now();

        let bar = if mode == ResolvedProgressMode::Rich {
            let pb = ProgressBar::new(total_items.max(1));
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} {prefix:.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {pos}/{len} {percent:>3}% ETA {eta_precise} {msg}",
                )
                .expect("valid progress template"),
            );
            pb.set_prefix(label.clone());
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        Self {
            label,
            mode,
            plain_interval: config.plain_interval,
            bar,
            started: now,
            last_plain_emit: now.checked_sub(config.plain_interval).unwrap_or(now),
            total_items,
            processed_items: 0,
            warning_count: 0,
            warnings: Vec::new(),
            finalized: false,
        }
    }

    pub fn processed(&self) -> u64 {
        self.processed_items
    }

    pub fn advance(&mut self) {
        self.processed_items = self.processed_items.saturating_add(1);
        if self.total_items > 0 {
            self.processed_items = self.processed_items.min(self.total_items);
        }

        match self.mode {
            ResolvedProgressMode::Rich => {
                if let Some(bar) = &self.bar {
                    bar.set_position(self.processed_items);
                }
            }
            ResolvedProgressMode::Plain => {
                let now = Instant::now();
                let last = self.processed_items >= self.total_items;
                if last || now.duration_since(self.last_plain_emit) >= self.plain_interval {
                    self.last_plain_emit = now;
                    self.render_plain();
                }
            }
            ResolvedProgressMode::Quiet => {}
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}: {}", self.label, message);
        self.warning_count += 1;
        if self.warnings.len() >= MAX_STORED_WARNINGS {
            self.warnings.remove(0);
        }
        self.warnings.push(message.clone());
        self.emit_message("WARN", &message);
    }

    pub fn finish(mut self, final_message: impl Into<String>) -> ProgressOutcome {
        self.finalize(Some(final_message.into()))
    }

    fn finalize(&mut self, final_message: Option<String>) -> ProgressOutcome {
        if !self.finalized {
            self.finalized = true;
            match self.mode {
                ResolvedProgressMode::Quiet => {}
                ResolvedProgressMode::Plain => {
                    if let Some(msg) = final_message.as_deref() {
                        eprintln!("[DONE] {}: {}", self.label, msg);
                    }
                }
                ResolvedProgressMode::Rich => {
                    if let Some(bar) = &self.bar {
                        match final_message {
                            Some(msg) => bar.finish_with_message(msg),
                            None => bar.finish_and_clear(),
                        }
                    }
                }
            }
        }
        self.outcome()
    }

    fn outcome(&self) -> ProgressOutcome {
        let elapsed = self.started.elapsed();
        ProgressOutcome {
            elapsed,
            total_items: self.total_items,
            processed_items: self.processed_items,
            items_per_sec: average_rate(self.processed_items, elapsed),
            warning_count: self.warning_count,
            warnings: self.warnings.clone(),
        }
    }

    fn render_plain(&self) {
        let elapsed = self.started.elapsed();
        let pct = if self.total_items == 0 {
            0.0
        } else {
            (self.processed_items as f64 / self.total_items as f64) * 100.0
        };
        let rate = average_rate(self.processed_items, elapsed);
        eprintln!(
            "[PROGRESS] {} elapsed={} done={}/{} ({:.1}%) rate={:.1}/s ETA={}",
            self.label,
            format_duration(elapsed),
            self.processed_items,
            self.total_items,
            pct,
            rate,
            format_eta(compute_eta(self.total_items, self.processed_items, rate)),
        );
    }

    fn emit_message(&self, level: &str, message: &str) {
        match self.mode {
            ResolvedProgressMode::Quiet => {}
            ResolvedProgressMode::Plain => {
                eprintln!("[{}] {}: {}", level, self.label, message);
            }
            ResolvedProgressMode::Rich => {
                let line = format!("[{}] {}: {}", level, self.label, message);
                match &self.bar {
                    Some(bar) => bar.println(line),
                    None => eprintln!("{}", line),
                }
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        let _ = self.finalize(None);
    }
}

fn average_rate(items: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64().max(1e-6);
    items as f64 / secs
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

fn format_eta(eta: Option<Duration>) -> String {
    eta.map(format_duration)
        .unwrap_or_else(|| "--:--".to_string())
}

fn compute_eta(total_items: u64, processed_items: u64, items_per_sec: f64) -> Option<Duration> {
    if items_per_sec <= f64::EPSILON || processed_items >= total_items {
        return None;
    }
    let remaining = total_items.saturating_sub(processed_items) as f64;
    Some(Duration::from_secs_f64((remaining / items_per_sec).max(0.0)))
}
