use crate::CLAP_STYLING;
use crate::handlers::parse_url_arg;
use clap::{arg, command};

fn url_arg() -> clap::Arg {
    arg!(-u --"url" <URL>)
        .required(true)
        .help("Root URL of the remote directory listing")
        .value_parser(parse_url_arg)
}

fn prefix_arg() -> clap::Arg {
    arg!(--"prefix" <URL>)
        .required(false)
        .help("Only follow links under this URL (default: the root URL)")
        .value_parser(parse_url_arg)
}

fn ext_arg() -> clap::Arg {
    arg!(-e --"ext" <EXT>)
        .required(false)
        .help("File extension to download; repeat or comma-separate (default: tif,nc,csv,gpkg)")
        .action(clap::ArgAction::Append)
}

fn exclude_arg() -> clap::Arg {
    arg!(-x --"exclude" <PATTERN>)
        .required(false)
        .help("Skip any URL containing this substring; may be repeated")
        .action(clap::ArgAction::Append)
}

fn max_depth_arg() -> clap::Arg {
    arg!(--"max-depth" <DEPTH>)
        .required(false)
        .help("Maximum directory depth below the root to expand")
        .value_parser(clap::value_parser!(usize))
        .default_value("32")
}

fn timeout_arg() -> clap::Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Per-request timeout in seconds")
        .value_parser(clap::value_parser!(u64).range(1..))
        .default_value("30")
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("dirmirror")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("dirmirror")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner, progress bars and info logging").required(false))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            command!("mirror")
                .about(
                    "Recursively mirror a remote directory listing to local disk, \
                retrying failed downloads.",
                )
                .arg(url_arg())
                .arg(
                    arg!(-d --"dest" <PATH>)
                        .required(true)
                        .help("Local destination directory (created if missing)"),
                )
                .arg(prefix_arg())
                .arg(ext_arg())
                .arg(exclude_arg())
                .arg(max_depth_arg())
                .arg(timeout_arg())
                .arg(
                    arg!(--"chunk-size" <BYTES>)
                        .required(false)
                        .help("Write buffer size used while streaming downloads")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("8192"),
                )
                .arg(
                    arg!(--"retries" <ATTEMPTS>)
                        .required(false)
                        .help("Total download attempts per file, the first one included")
                        .value_parser(clap::value_parser!(u32).range(1..))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"retry-delay" <SECONDS>)
                        .required(false)
                        .help("Pause before each retry, in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("2"),
                )
                .arg(
                    arg!(-t --"workers" <NUM_WORKERS>)
                        .required(false)
                        .help("Concurrent file downloads once the crawl is complete")
                        .value_parser(clap::builder::RangedU64ValueParser::<usize>::new().range(1..))
                        .default_value("1"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(--"no-progress")
                        .required(false)
                        .help("Disable progress bars")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("fetch")
                .about("Download a single URL to a local path")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The URL to download")
                        .value_parser(parse_url_arg),
                )
                .arg(
                    arg!(-d --"dest" <PATH>)
                        .required(true)
                        .help("Destination file, or an existing directory to download into"),
                )
                .arg(timeout_arg()),
        )
        .subcommand(
            command!("list")
                .about("Crawl a remote directory listing and print what would be mirrored")
                .arg(url_arg())
                .arg(prefix_arg())
                .arg(ext_arg())
                .arg(exclude_arg())
                .arg(max_depth_arg())
                .arg(timeout_arg()),
        )
}
