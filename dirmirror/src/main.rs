use colored::Colorize;
use dirmirror::command_argument_builder;
use dirmirror::handlers::{handle_fetch, handle_list, handle_mirror, init_logging};
use dirmirror_core::print_banner;

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    init_logging(quiet);

    let result = match chosen_command.subcommand() {
        Some(("mirror", primary_command)) => handle_mirror(primary_command, quiet).await,
        Some(("fetch", primary_command)) => handle_fetch(primary_command).await,
        Some(("list", primary_command)) => handle_list(primary_command).await,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {:#}", "✗".red().bold(), e);
            std::process::exit(1);
        }
    }
}
