mod run;
mod info;

use std::fmt::Display;
use colored::{Colorize, ColoredString};
use crate::Error;

const PROGRAM: &'static str = env!("CARGO_PKG_NAME");

/// Print tool version and authors.
fn print_version() {
    println!("{} {}", PROGRAM.underline(), format!("v{}", env!("CARGO_PKG_VERSION")).green());
    let authors: Vec<_> = env!("CARGO_PKG_AUTHORS").split(':').filter(|s| !s.is_empty()).collect();
    let n = authors.len();
    if n == 0 {
        return;
    }
    print!("Created by ");
    for (i, author) in authors.iter().enumerate() {
        if i == 0 {
            print!("{}", author.bright_blue());
        } else if i < n - 1 {
            print!(", {}", author.bright_blue());
        } else {
            print!(" and {}", author.bright_blue());
        }
    }
    println!();
}

/// Logs program name and version.
fn greet() {
    log::info!("{} v{}", PROGRAM.underline(), env!("CARGO_PKG_VERSION"));
}

/// Formats default value in help messages.
fn fmt_def(val: impl Display) -> ColoredString {
    val.to_string().cyan()
}

/// Placeholder for arguments without values.
fn flag() -> ColoredString {
    "".normal()
}

fn print_help() {
    print_version();
    println!("\n{} {} command [arguments]",
        "Usage:".bold(), PROGRAM);

    println!("\n{}", "[ Variant calling ]".bold());
    println!("    {:<8}  Run the whole pipeline: index, align, convert, sort, call variants.", "run".red());
    println!("    {:<8}  Run a slice of the pipeline on previously produced files.", "partial".red());

    println!("\n{}", "[ Information ]".bold());
    println!("    {:<8}  List pipeline stages with their inputs and outputs.", "stages".red());
    println!("    {:<8}  Write default configuration in JSON format.", "config".red());

    println!("\n{}", "[ General help ]".bold());
    println!("    {:<8}  Show this help message.", "help".red());
    println!("    {:<8}  Show version.", "version".red());
}

pub fn run(argv: &[String]) -> crate::Result<()> {
    if argv.len() <= 1 {
        print_help();
        std::process::exit(1);
    }
    match &argv[1] as &str {
        "run" => run::run(&argv[2..], false)?,
        "partial" => run::run(&argv[2..], true)?,
        "stages" => info::print_stages(),
        "config" => info::write_config(&argv[2..])?,
        "help" | "h" | "--help" | "-h" => print_help(),
        "version" | "--version" | "-V" => print_version(),
        cmd => {
            print_help();
            return Err(Error::InvalidInput(format!("Unknown command {}", cmd)));
        }
    }
    Ok(())
}
