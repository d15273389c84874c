//! Pipeline configuration: default locations of the inputs and outputs, and tool executables.

use std::path::{Path, PathBuf};
use crate::{
    Error,
    err::validate_param,
    ext,
    ser::{JsonSer, json_get},
    pipeline::tools::Tools,
};

/// Default reference genome.
pub const DEF_REFERENCE: &'static str = "latch:///wgs/ref_genome/ecoli_rel606.fasta";
/// Default first and second read files.
pub const DEF_READ1: &'static str = "latch:///wgs/trimmed_fastqs/SRR2584863_1.trim.sub.fastq";
pub const DEF_READ2: &'static str = "latch:///wgs/trimmed_fastqs/SRR2584863_2.trim.sub.fastq";
/// Reference index directory is published here.
pub const DEF_REF_DIR: &'static str = "latch:///wgs/ref_genome";
/// All other stage outputs are published into this directory.
pub const DEF_RESULTS: &'static str = "latch:///wgs/results";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Local directory, that backs logical identifiers.
    pub storage_root: PathBuf,
    /// Per-run scratch directories are created here.
    pub work_dir: PathBuf,

    pub reference: String,
    pub read1: String,
    pub read2: String,
    pub ref_dir: String,
    pub results: String,

    /// Reference file pattern within the index directory.
    pub ref_pattern: String,
    /// Ploidy, used for variant calling.
    pub ploidy: u8,
    pub tools: Tools,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            work_dir: PathBuf::from("work"),

            reference: DEF_REFERENCE.to_owned(),
            read1: DEF_READ1.to_owned(),
            read2: DEF_READ2.to_owned(),
            ref_dir: DEF_REF_DIR.to_owned(),
            results: DEF_RESULTS.to_owned(),

            ref_pattern: "*.fasta".to_owned(),
            ploidy: 1,
            tools: Tools::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        validate_param!(self.ploidy > 0, "Ploidy must be positive");
        validate_param!(!self.ref_pattern.is_empty(), "Reference pattern must not be empty");
        glob::Pattern::new(&self.ref_pattern).map_err(|e|
            Error::InvalidInput(format!("Cannot parse reference pattern '{}': {}", self.ref_pattern, e)))?;
        for (name, id) in [("reference", &self.reference), ("read1", &self.read1), ("read2", &self.read2),
                ("ref_dir", &self.ref_dir), ("results", &self.results)] {
            validate_param!(!id.is_empty(), "Identifier '{}' must not be empty", name);
        }
        Ok(())
    }

    pub fn load_file(path: &Path) -> Result<Self, Error> {
        Self::load(&ext::sys::load_json(path)?)
    }

    pub fn save_file(&self, path: &Path) -> Result<(), Error> {
        ext::sys::save_json(&self.save(), path)
    }
}

impl JsonSer for Config {
    fn save(&self) -> json::JsonValue {
        json::object!{
            storage_root: self.storage_root.to_string_lossy().into_owned(),
            work_dir: self.work_dir.to_string_lossy().into_owned(),
            reference: self.reference.clone(),
            read1: self.read1.clone(),
            read2: self.read2.clone(),
            ref_dir: self.ref_dir.clone(),
            results: self.results.clone(),
            ref_pattern: self.ref_pattern.clone(),
            ploidy: self.ploidy,
            tools: self.tools.save(),
        }
    }

    /// Missing keys keep their default values.
    fn load(obj: &json::JsonValue) -> Result<Self, Error> {
        if !obj.is_object() {
            return Err(Error::JsonLoad(format!("Configuration must be a JSON object, found '{}'", obj)));
        }
        json_get!(obj -> storage_root? (as_str), work_dir? (as_str), reference? (as_str), read1? (as_str),
            read2? (as_str), ref_dir? (as_str), results? (as_str), ref_pattern? (as_str), ploidy? (as_u8));
        let mut config = Self::default();
        if let Some(s) = storage_root { config.storage_root = PathBuf::from(s); }
        if let Some(s) = work_dir { config.work_dir = PathBuf::from(s); }
        if let Some(s) = reference { config.reference = s.to_owned(); }
        if let Some(s) = read1 { config.read1 = s.to_owned(); }
        if let Some(s) = read2 { config.read2 = s.to_owned(); }
        if let Some(s) = ref_dir { config.ref_dir = s.to_owned(); }
        if let Some(s) = results { config.results = s.to_owned(); }
        if let Some(s) = ref_pattern { config.ref_pattern = s.to_owned(); }
        if let Some(val) = ploidy { config.ploidy = val; }
        if !obj["tools"].is_null() {
            config.tools = Tools::load(&obj["tools"])?;
        }
        Ok(config)
    }
}
