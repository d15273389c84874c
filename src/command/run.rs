//! Run the whole pipeline or its slice.

use std::{
    path::PathBuf,
    time::Instant,
};
use colored::Colorize;
use const_format::str_repeat;
use crate::{
    Error,
    err::validate_param,
    ext,
    config::Config,
    storage::LocalStorage,
    pipeline::{self, Pipeline, Inputs, StageKind, Substitutes},
};

struct Args {
    config: Option<PathBuf>,
    reference: Option<String>,
    read1: Option<String>,
    read2: Option<String>,
    storage_root: Option<PathBuf>,
    work_dir: Option<PathBuf>,
    ploidy: Option<u8>,

    from: Option<StageKind>,
    to: StageKind,
    substitutes: Substitutes,

    bwa: Option<PathBuf>,
    samtools: Option<PathBuf>,
    bcftools: Option<PathBuf>,
    vcfutils: Option<PathBuf>,
    clean: bool,
    verbose: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            reference: None,
            read1: None,
            read2: None,
            storage_root: None,
            work_dir: None,
            ploidy: None,

            from: None,
            to: StageKind::CallVariants,
            substitutes: Substitutes::new(),

            bwa: None,
            samtools: None,
            bcftools: None,
            vcfutils: None,
            clean: false,
            verbose: false,
        }
    }
}

impl Args {
    fn validate(self, partial: bool) -> Result<Self, Error> {
        if partial {
            validate_param!(self.from.is_some(), "First stage is not provided (see -f/--from)");
        } else {
            validate_param!(self.from.is_none() && self.to == StageKind::CallVariants && self.substitutes.is_empty(),
                "Arguments -f/--from, -t/--to and -s/--sub are only allowed with `{} partial`", super::PROGRAM);
        }
        if let Some(ploidy) = self.ploidy {
            validate_param!(ploidy > 0, "Ploidy must be positive");
        }
        Ok(self)
    }

    /// Loads configuration and overrides it with command-line arguments.
    fn config(&self) -> Result<Config, Error> {
        let mut config = match &self.config {
            Some(path) => Config::load_file(path)?,
            None => Config::default(),
        };
        if let Some(val) = &self.reference { config.reference = val.clone(); }
        if let Some(val) = &self.read1 { config.read1 = val.clone(); }
        if let Some(val) = &self.read2 { config.read2 = val.clone(); }
        if let Some(val) = &self.storage_root { config.storage_root = val.clone(); }
        if let Some(val) = &self.work_dir { config.work_dir = val.clone(); }
        if let Some(val) = self.ploidy { config.ploidy = val; }
        if let Some(val) = &self.bwa { config.tools.bwa = val.clone(); }
        if let Some(val) = &self.samtools { config.tools.samtools = val.clone(); }
        if let Some(val) = &self.bcftools { config.tools.bcftools = val.clone(); }
        if let Some(val) = &self.vcfutils { config.tools.vcfutils = val.clone(); }
        config.validate()?;
        Ok(config)
    }
}

fn print_help(partial: bool) {
    const KEY: usize = 18;
    const VAL: usize = 8;
    const EMPTY: &'static str = str_repeat!(" ", KEY + VAL + 5);

    let defaults = Config::default();
    if partial {
        println!("{}", "Run a slice of the variant calling pipeline on previously produced files.".yellow());
        println!("\n{} {} partial -f STAGE [-t STAGE] [-s STAGE=ID ...] [arguments]",
            "Usage:".bold(), super::PROGRAM);
    } else {
        println!("{}", "Run the whole variant calling pipeline.".yellow());
        println!("\n{} {} run [-r ref.fasta] [-1 reads1.fq -2 reads2.fq] [arguments]",
            "Usage:".bold(), super::PROGRAM);
    }

    println!("\n{}", "Input arguments:".bold());
    println!("    {:KEY$} {:VAL$}  Configuration file in JSON format (see {}).\n\
        {EMPTY}  Command-line arguments override its values.",
        "-c, --config".green(), "FILE".yellow(), config_command());
    println!("    {:KEY$} {:VAL$}  Reference genome [{}].",
        "-r, --reference".green(), "ID".yellow(), super::fmt_def(&defaults.reference));
    println!("    {:KEY$} {:VAL$}  First read file [{}].",
        "-1, --read1".green(), "ID".yellow(), super::fmt_def(&defaults.read1));
    println!("    {:KEY$} {:VAL$}  Second read file [{}].",
        "-2, --read2".green(), "ID".yellow(), super::fmt_def(&defaults.read2));
    println!("    {:KEY$} {:VAL$}  Local directory, that stores inputs and outputs [{}].\n\
        {EMPTY}  Identifier {} corresponds to {}.",
        "-S, --storage".green(), "DIR".yellow(), super::fmt_def(defaults.storage_root.display()),
        "scheme:///a/b".yellow(), "DIR/a/b".yellow());

    if partial {
        println!("\n{}", "Pipeline slice:".bold());
        println!("    {:KEY$} {:VAL$}  First stage to run.",
            "-f, --from".green(), "STAGE".yellow());
        println!("    {:KEY$} {:VAL$}  Last stage to run [{}].",
            "-t, --to".green(), "STAGE".yellow(), super::fmt_def(StageKind::CallVariants));
        println!("    {:KEY$} {:VAL$}  Use this file/directory instead of the output of a skipped stage.\n\
            {EMPTY}  May be repeated. For example, {}.",
            "-s, --sub".green(), "STAGE=ID".yellow(), "-s sort_alignment=latch:///wgs/results/aligned.sorted.bam".cyan());
        println!("    {EMPTY}  Stages: {}.", StageKind::ALL.iter().map(|s| s.name()).collect::<Vec<_>>().join(", "));
    }

    println!("\n{}", "Optional parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Ploidy for variant calling [{}].",
        "-p, --ploidy".green(), "INT".yellow(), super::fmt_def(defaults.ploidy));

    println!("\n{}", "Execution parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Per-run scratch directories are created here [{}].",
        "-w, --work-dir".green(), "DIR".yellow(), super::fmt_def(defaults.work_dir.display()));
    println!("    {:KEY$} {:VAL$}  Remove scratch directory after a successful run.",
        "    --clean".green(), super::flag());
    println!("    {:KEY$} {:VAL$}  BWA executable         [{}].",
        "    --bwa".green(), "EXE".yellow(), super::fmt_def(defaults.tools.bwa.display()));
    println!("    {:KEY$} {:VAL$}  Samtools executable    [{}].",
        "    --samtools".green(), "EXE".yellow(), super::fmt_def(defaults.tools.samtools.display()));
    println!("    {:KEY$} {:VAL$}  Bcftools executable    [{}].",
        "    --bcftools".green(), "EXE".yellow(), super::fmt_def(defaults.tools.bcftools.display()));
    println!("    {:KEY$} {:VAL$}  vcfutils.pl executable [{}].",
        "    --vcfutils".green(), "EXE".yellow(), super::fmt_def(defaults.tools.vcfutils.display()));

    println!("\n{}", "Other parameters:".bold());
    println!("    {:KEY$} {:VAL$}  Debug output, including all tool command lines.",
        "-v, --verbose".green(), super::flag());
    println!("    {:KEY$} {:VAL$}  Show this help message.", "-h, --help".green(), "");
    println!("    {:KEY$} {:VAL$}  Show version.", "-V, --version".green(), "");
}

fn config_command() -> String {
    format!("{} config", super::PROGRAM).underline().to_string()
}

/// Parses `STAGE=ID`.
fn parse_substitute(s: &str) -> Result<(StageKind, String), lexopt::Error> {
    let (stage, id) = s.split_once('=')
        .ok_or_else(|| lexopt::Error::from(format!("Cannot parse substitute '{}', expected STAGE=ID", s)))?;
    let stage = stage.parse::<StageKind>()?;
    if id.is_empty() {
        return Err(lexopt::Error::from(format!("Empty identifier in substitute '{}'", s)));
    }
    Ok((stage, id.to_owned()))
}

fn parse_args(argv: &[String], partial: bool) -> Result<Args, lexopt::Error> {
    if argv.is_empty() && partial {
        print_help(partial);
        std::process::exit(1);
    }
    use lexopt::prelude::*;
    let mut args = Args::default();
    let mut parser = lexopt::Parser::from_args(argv);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('c') | Long("config") => args.config = Some(parser.value()?.parse()?),
            Short('r') | Long("reference") => args.reference = Some(parser.value()?.string()?),
            Short('1') | Long("read1") => args.read1 = Some(parser.value()?.string()?),
            Short('2') | Long("read2") => args.read2 = Some(parser.value()?.string()?),
            Short('S') | Long("storage") => args.storage_root = Some(parser.value()?.parse()?),

            Short('f') | Long("from") => args.from = Some(parser.value()?.parse()?),
            Short('t') | Long("to") => args.to = parser.value()?.parse()?,
            Short('s') | Long("sub") | Long("substitute") => {
                let (stage, id) = parse_substitute(&parser.value()?.string()?)?;
                if args.substitutes.insert(stage, id).is_some() {
                    return Err(lexopt::Error::from(format!("Substitute for stage {} is provided twice", stage)));
                }
            }

            Short('p') | Long("ploidy") => args.ploidy = Some(parser.value()?.parse()?),
            Short('w') | Long("work-dir") | Long("workdir") => args.work_dir = Some(parser.value()?.parse()?),
            Long("clean") => args.clean = true,
            Long("bwa") => args.bwa = Some(parser.value()?.parse()?),
            Long("samtools") => args.samtools = Some(parser.value()?.parse()?),
            Long("bcftools") => args.bcftools = Some(parser.value()?.parse()?),
            Long("vcfutils") | Long("vcfutils.pl") => args.vcfutils = Some(parser.value()?.parse()?),

            Short('v') | Long("verbose") => args.verbose = true,
            Short('V') | Long("version") => {
                super::print_version();
                std::process::exit(0);
            }
            Short('h') | Long("help") => {
                print_help(partial);
                std::process::exit(0);
            }
            _ => Err(arg.unexpected())?,
        }
    }
    Ok(args)
}

pub(super) fn run(argv: &[String], partial: bool) -> Result<(), Error> {
    let args = parse_args(argv, partial)?.validate(partial)?;
    if args.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }
    super::greet();
    let timer = Instant::now();
    let config = args.config()?;
    let inputs = Inputs::from_config(&config);
    let storage = LocalStorage::new(config.storage_root.clone());
    let pipeline = Pipeline::new(config, storage)?;

    let output = match args.from {
        Some(start) => pipeline.run_partial(start, args.to, &inputs, &args.substitutes)?,
        None => pipeline.run(&inputs)?,
    };
    let last = output.last();
    log::info!("Success. Final output: {} ({}). Total time: {}", ext::fmt::path(last.local_path()), last.id(),
        ext::fmt::Duration(timer.elapsed()));
    if args.clean {
        log::debug!("Removing scratch directory {}", ext::fmt::path(&output.scratch));
        pipeline::remove_scratch(&output.scratch)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_owned).collect()
    }

    #[test]
    fn partial_arguments() {
        let args = parse_args(&argv("-f call -s sort_alignment=s3:///res/a.sorted.bam -p 2 --samtools /bin/st -v"),
            true).unwrap().validate(true).unwrap();
        assert!(args.verbose && !args.clean);
        assert_eq!(args.from, Some(StageKind::CallVariants));
        assert_eq!(args.to, StageKind::CallVariants);
        assert_eq!(args.substitutes[&StageKind::SortAlignment], "s3:///res/a.sorted.bam");
        let config = args.config().unwrap();
        assert_eq!(config.ploidy, 2);
        assert_eq!(config.tools.samtools, PathBuf::from("/bin/st"));
        assert_eq!(config.tools.bwa, PathBuf::from("bwa"));
    }

    #[test]
    fn invalid_arguments() {
        assert!(parse_args(&argv("-s sort=a -s sort=b"), true).is_err());
        assert!(parse_args(&argv("-s sort"), true).is_err());
        assert!(parse_args(&argv("-f nothing"), true).is_err());
        assert!(parse_args(&argv("--unknown"), false).is_err());
        // Slices require `partial`.
        assert!(parse_args(&argv("-f sort"), false).unwrap().validate(false).is_err());
        assert!(parse_args(&argv("-t sort"), true).unwrap().validate(true).is_err());
        assert!(parse_args(&argv("-p 0"), false).unwrap().validate(false).is_err());
    }

    #[test]
    fn config_file_is_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.read1 = "s3:///reads/a_1.fq".to_owned();
        config.ploidy = 2;
        config.save_file(&path).unwrap();

        let args = parse_args(&argv(&format!("-c {} -p 3 -2 s3:///reads/b_2.fq", path.display())), false)
            .unwrap().validate(false).unwrap();
        let loaded = args.config().unwrap();
        assert_eq!(loaded.read1, "s3:///reads/a_1.fq");
        assert_eq!(loaded.read2, "s3:///reads/b_2.fq");
        assert_eq!(loaded.ploidy, 3);
    }
}
