use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;

use super::collection::input::InputSource;

#[derive(Parser)]
pub struct DaemonArgs {
    /// Run in the current process instead of detaching.
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Named pipe with counted events. Standard input is used when missing, which is only allowed
    /// together with `--force`.
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Seconds between rollover checks.
    #[arg(long = "check-interval", default_value_t = 60)]
    pub check_interval: u64,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}

impl DaemonArgs {
    /// Where counted events come from. A detached daemon has its stdin on `/dev/null`, so it needs
    /// a named pipe.
    pub fn input_source(&self) -> Result<InputSource> {
        match (&self.input, self.force) {
            (Some(path), _) => Ok(InputSource::Fifo(path.clone())),
            (None, true) => Ok(InputSource::Stdin),
            (None, false) => bail!("--input is required unless the daemon runs with --force"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use anyhow::Result;
    use clap::Parser;

    use super::DaemonArgs;
    use crate::daemon::collection::input::InputSource;

    #[test]
    fn test_detached_daemon_requires_input() -> Result<()> {
        let args = DaemonArgs::try_parse_from(["keytally-daemon"])?;

        assert!(args.input_source().is_err());
        Ok(())
    }

    #[test]
    fn test_forced_daemon_reads_stdin() -> Result<()> {
        let args = DaemonArgs::try_parse_from(["keytally-daemon", "--force"])?;

        assert!(matches!(args.input_source()?, InputSource::Stdin));
        Ok(())
    }

    #[test]
    fn test_input_is_a_pipe() -> Result<()> {
        let args = DaemonArgs::try_parse_from(["keytally-daemon", "--input", "/tmp/keys"])?;

        match args.input_source()? {
            InputSource::Fifo(path) => assert_eq!(path, PathBuf::from("/tmp/keys")),
            InputSource::Stdin => panic!("Expected a named pipe"),
        }
        Ok(())
    }
}
