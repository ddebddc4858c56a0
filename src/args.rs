use std::path::PathBuf;

use clap::Parser;

use cursor_id_reset::lang::Language;

#[derive(Parser)]
#[command(name = "cursor-id-reset")]
#[command(version)]
#[command(about = "Reset Cursor's telemetry identifiers in storage.json", long_about = None)]
pub(crate) struct Cli {
    /// Leave storage.json read-only after writing
    #[arg(short, long)]
    pub read_only: bool,

    /// Override language. Detected from LANG / LANGUAGE / LC_ALL otherwise.
    #[arg(long, value_enum)]
    pub lang: Option<Language>,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long)]
    pub verbose: bool,

    /// Exit without waiting for Enter
    #[arg(long)]
    pub no_wait: bool,

    /// Do not close running Cursor instances first
    #[arg(long)]
    pub skip_kill: bool,

    /// Path to storage.json. Defaults to $CURSOR_STORAGE_PATH or the platform location.
    #[arg(long, value_name = "PATH")]
    pub storage_path: Option<PathBuf>,

    /// Set by the elevated re-launch on Windows
    #[arg(long, hide = true)]
    pub automated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from(["cursor-id-reset", "-r", "--lang", "cn", "--no-wait"]).unwrap();
        assert!(cli.read_only);
        assert!(cli.no_wait);
        assert_eq!(cli.lang, Some(Language::Cn));
        assert!(!cli.skip_kill);
        assert!(!cli.automated);
    }

    #[test]
    fn rejects_unknown_language() {
        assert!(Cli::try_parse_from(["cursor-id-reset", "--lang", "fr"]).is_err());
    }
}
