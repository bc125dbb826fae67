//! Terminal progress reporting for parallel runs.
//!
//! Writes a 30-cell bar plus a spinner to stderr after each prompt
//! finalises. Purely observational; the scheduler behaves identically with
//! the bar disabled.

use std::io::{self, Write};

const BAR_WIDTH: usize = 30;
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

pub struct ProgressBar {
    total: usize,
    completed: usize,
    spinner: usize,
}

impl ProgressBar {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            spinner: 0,
        }
    }

    /// Record one finalised prompt and redraw.
    pub fn tick(&mut self) {
        self.completed += 1;
        #[allow(clippy::cast_precision_loss)]
        let percent = (self.completed as f32 / self.total.max(1) as f32).min(1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let filled = ((percent * BAR_WIDTH as f32) as usize).min(BAR_WIDTH);
        let spinner = SPINNER[self.spinner];
        self.spinner = (self.spinner + 1) % SPINNER.len();

        let mut err = io::stderr();
        let _ = write!(
            err,
            "\r {spinner} [{}{}] {}/{} ({:3.0}%)",
            "=".repeat(filled),
            " ".repeat(BAR_WIDTH - filled),
            self.completed,
            self.total,
            percent * 100.0
        );
        let _ = err.flush();
    }

    /// Draw the terminal 100% line.
    pub fn finish(&mut self) {
        let _ = writeln!(
            io::stderr(),
            "\r [{}] {}/{} (100%)",
            "=".repeat(BAR_WIDTH),
            self.total,
            self.total
        );
    }
}
