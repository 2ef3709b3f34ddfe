pub mod progress;
pub mod run;
pub mod stats;

pub use progress::{LogProgress, NoProgress, ProgressSink};
pub use run::{fetch_catalog, RadioCheck, RunOutput};
pub use stats::RunStats;
