pub mod error;
pub mod layout;
pub mod ledger;
pub mod mirror;
pub mod report;
pub mod retry;

pub use error::MirrorError;
pub use layout::MirrorLayout;
pub use ledger::{FailureLedger, FailureRecord};
pub use mirror::{
    MirrorOptions, MirrorOutcome, MirrorStats, execute_fetch, execute_listing, execute_mirror,
    normalize_directory_url,
};
pub use retry::{RetryOutcome, RetryPolicy, retry_failures};

use colored::Colorize;

const BANNER: &str = r#"
     _ _                _
  __| (_)_ __ _ __ ___ (_)_ __ _ __ ___  _ __
 / _` | | '__| '_ ` _ \| | '__| '__/ _ \| '__|
| (_| | | |  | | | | | | | |  | | | (_) | |
 \__,_|_|_|  |_| |_| |_|_|_|  |_|  \___/|_|
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "mirror remote directory listings".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}
