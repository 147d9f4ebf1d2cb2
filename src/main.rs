use std::time::Duration;

use anyhow::Result;
use keytally::{cli::run_cli, utils::runtime::multi_thread_runtime};
use tracing::error;

fn main() -> Result<()> {
    let runtime = multi_thread_runtime()?;
    let result = runtime.block_on(run_cli()).inspect_err(|e| {
        error!("Error running cli {e:?}");
    });
    // `serve` may leave a blocking read of stdin behind.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}
