//! Informational subcommands.

use std::path::PathBuf;
use colored::Colorize;
use crate::{
    Error,
    config::Config,
    pipeline::{STAGES, Wire, InputKey},
};

/// Prints all stages, their parameters and outputs.
pub(super) fn print_stages() {
    println!("{}", "Pipeline stages, in the execution order:".bold());
    for (i, def) in STAGES.iter().enumerate() {
        println!("\n{}. {}  {}", i + 1, def.kind.to_string().red(), def.description);
        for param in def.params {
            let source = match param.wire {
                Wire::Previous => format!("output of {}", def.kind.prev().map(|s| s.name()).unwrap_or("-")),
                Wire::Input(InputKey::Reference) => "input -r/--reference".to_owned(),
                Wire::Input(InputKey::Read1) => "input -1/--read1".to_owned(),
                Wire::Input(InputKey::Read2) => "input -2/--read2".to_owned(),
            };
            println!("    {} {:<15} {:<4}  ({})", "in ".green(), param.name, param.ty.to_string().yellow(), source);
        }
        println!("    {} {:<15} {}", "out".green(), "", def.output.to_string().yellow());
    }
}

/// Writes default configuration to a file.
pub(super) fn write_config(argv: &[String]) -> Result<(), Error> {
    use lexopt::prelude::*;
    let mut output: Option<PathBuf> = None;
    let mut parser = lexopt::Parser::from_args(argv);
    while let Some(arg) = parser.next()? {
        match arg {
            Short('o') | Long("output") => output = Some(parser.value()?.parse()?),
            Short('h') | Long("help") => {
                println!("{}", "Write default configuration in JSON format.".yellow());
                println!("\n{} {} config -o config.json", "Usage:".bold(), super::PROGRAM);
                std::process::exit(0);
            }
            _ => Err(arg.unexpected())?,
        }
    }
    let output = output.ok_or_else(|| Error::InvalidInput("Output file is not provided (see -o/--output)".to_owned()))?;
    Config::default().save_file(&output)?;
    log::info!("Default configuration written to {}", crate::ext::fmt::path(&output));
    Ok(())
}
