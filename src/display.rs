//! Terminal output: coloured status lines, the spinner and the exit prompt.

use std::borrow::Cow;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use crate::lang::Texts;

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "];
const SPINNER_TICK: Duration = Duration::from_millis(100);

const LOGO: &str = r"
   ______                              ________     ____                 __
  / ____/_  ________________  _____   /  _/ __ \   / __ \___  ________  / /_
 / /   / / / / ___/ ___/ __ \/ ___/   / // / / /  / /_/ / _ \/ ___/ _ \/ __/
/ /___/ /_/ / /  (__  ) /_/ / /     _/ // /_/ /  / _, _/  __(__  )  __/ /_
\____/\__,_/_/  /____/\____/_/     /___/_____/  /_/ |_|\___/____/\___/\__/
";

/// A running spinner. Stopping is idempotent and also happens on drop.
pub struct Progress {
    bar: ProgressBar,
    stopped: AtomicBool,
}

impl Progress {
    pub fn start(message: impl Into<Cow<'static, str>>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan.bold} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER_FRAMES),
        );
        bar.set_message(message);
        bar.enable_steady_tick(SPINNER_TICK);
        Self {
            bar,
            stopped: AtomicBool::new(false),
        }
    }

    /// A spinner that draws nothing, for non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn set_message(&self, message: impl Into<Cow<'static, str>>) {
        self.bar.set_message(message);
    }

    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.bar.finish_and_clear();
    }

    pub fn is_active(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct Display {
    texts: &'static Texts,
    interactive: bool,
}

impl Display {
    pub fn new(texts: &'static Texts) -> Self {
        let interactive = io::stdout().is_terminal() && io::stdin().is_terminal();
        tracing::trace!(interactive, "Display created");
        Self { texts, interactive }
    }

    /// Plain output only: no spinner, no screen clearing, no prompt.
    pub fn non_interactive(texts: &'static Texts) -> Self {
        Self {
            texts,
            interactive: false,
        }
    }

    pub fn texts(&self) -> &'static Texts {
        self.texts
    }

    pub fn progress(&self, message: &'static str) -> Progress {
        if self.interactive {
            Progress::start(message)
        } else {
            println!("{}", message);
            Progress::hidden()
        }
    }

    pub fn success(&self, lines: &[&str]) {
        for line in lines {
            println!("{}", style(line).green());
        }
    }

    pub fn info(&self, message: &str) {
        println!("{}", style(message).cyan());
    }

    pub fn warning(&self, message: &str) {
        println!("{}", style(message).yellow());
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", style(message).red());
    }

    /// Headline in bold red followed by the hints in yellow.
    pub fn privilege_error(&self, hints: &[String]) {
        println!();
        println!("{}", style(self.texts.privilege_error).red().bold());
        println!();
        for hint in hints {
            println!("{}", style(hint).yellow());
        }
    }

    pub fn logo(&self) {
        println!("{}", style(LOGO).cyan().bold());
    }

    pub fn clear_screen(&self) -> io::Result<()> {
        if !self.interactive {
            return Ok(());
        }
        Term::stdout().clear_screen()
    }

    /// Blocks until a line is read from stdin. Skipped without a terminal.
    pub fn wait_for_enter(&self) {
        if !self.interactive {
            return;
        }
        println!();
        print!("{}", self.texts.press_enter_to_exit);
        let _ = io::stdout().flush();
        let mut input = String::new();
        let _ = io::stdin().read_line(&mut input);
    }
}
