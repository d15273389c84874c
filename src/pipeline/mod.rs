//! Stage definitions, wiring between stages, and the sequential pipeline runner.

pub mod invoke;
pub mod resolve;
pub mod tools;
pub mod stages;
mod reads;
#[cfg(all(test, unix))]
pub(crate) mod testing;

use std::{
    fmt,
    fs, io,
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};
use colored::Colorize;
use crate::{
    Error,
    err::{add_path, error, validate_param},
    ext,
    config::Config,
    storage::{Artifact, ArtifactType, Storage},
};

/// Pipeline stages in their execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    BuildIndex,
    AlignReads,
    ConvertFormat,
    SortAlignment,
    CallVariants,
}

impl StageKind {
    pub const ALL: [StageKind; 5] = [Self::BuildIndex, Self::AlignReads, Self::ConvertFormat,
        Self::SortAlignment, Self::CallVariants];

    pub fn name(self) -> &'static str {
        match self {
            Self::BuildIndex => "build_index",
            Self::AlignReads => "align_reads",
            Self::ConvertFormat => "convert_format",
            Self::SortAlignment => "sort_alignment",
            Self::CallVariants => "call_variants",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Previous stage, if any.
    pub fn prev(self) -> Option<StageKind> {
        self.index().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn def(self) -> &'static StageDef {
        &STAGES[self.index()]
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = String;

    /// Accepts `align_reads`, `align-reads`, `AlignReads` and the like.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s.chars().filter(|&c| c != '_' && c != '-').collect::<String>().to_lowercase();
        match &norm as &str {
            "buildindex" | "index" => Ok(Self::BuildIndex),
            "alignreads" | "align" => Ok(Self::AlignReads),
            "convertformat" | "convert" => Ok(Self::ConvertFormat),
            "sortalignment" | "sort" => Ok(Self::SortAlignment),
            "callvariants" | "call" => Ok(Self::CallVariants),
            _ => Err(format!("Unknown stage '{}'", s)),
        }
    }
}

/// Pipeline-level inputs, not produced by any stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKey {
    Reference,
    Read1,
    Read2,
}

/// Where the parameter value comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wire {
    /// Output of the previous stage (or its substitute).
    Previous,
    Input(InputKey),
}

#[derive(Debug)]
pub struct ParamDef {
    pub name: &'static str,
    pub ty: ArtifactType,
    pub wire: Wire,
}

#[derive(Debug)]
pub struct StageDef {
    pub kind: StageKind,
    /// Parameters in the order in which they are passed to the stage.
    pub params: &'static [ParamDef],
    pub output: ArtifactType,
    pub description: &'static str,
}

/// Pipeline definition, in the execution order.
pub static STAGES: [StageDef; 5] = [
    StageDef {
        kind: StageKind::BuildIndex,
        params: &[
            ParamDef { name: "ref_genome", ty: ArtifactType::File, wire: Wire::Input(InputKey::Reference) },
        ],
        output: ArtifactType::Dir,
        description: "Build BWA index next to a copy of the reference genome",
    },
    StageDef {
        kind: StageKind::AlignReads,
        params: &[
            ParamDef { name: "ref_genome_dir", ty: ArtifactType::Dir, wire: Wire::Previous },
            ParamDef { name: "read1", ty: ArtifactType::File, wire: Wire::Input(InputKey::Read1) },
            ParamDef { name: "read2", ty: ArtifactType::File, wire: Wire::Input(InputKey::Read2) },
        ],
        output: ArtifactType::File,
        description: "Align paired-end reads with bwa mem (SAM)",
    },
    StageDef {
        kind: StageKind::ConvertFormat,
        params: &[
            ParamDef { name: "sam", ty: ArtifactType::File, wire: Wire::Previous },
        ],
        output: ArtifactType::File,
        description: "Convert SAM to BAM with samtools view",
    },
    StageDef {
        kind: StageKind::SortAlignment,
        params: &[
            ParamDef { name: "bam", ty: ArtifactType::File, wire: Wire::Previous },
        ],
        output: ArtifactType::File,
        description: "Sort BAM by position with samtools sort",
    },
    StageDef {
        kind: StageKind::CallVariants,
        params: &[
            ParamDef { name: "ref_genome", ty: ArtifactType::File, wire: Wire::Input(InputKey::Reference) },
            ParamDef { name: "sorted_bam", ty: ArtifactType::File, wire: Wire::Previous },
        ],
        output: ArtifactType::File,
        description: "Call and filter variants with bcftools and vcfutils.pl (VCF)",
    },
];

/// Logical identifiers of the pipeline inputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inputs {
    pub reference: String,
    pub read1: String,
    pub read2: String,
}

impl Inputs {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reference: config.reference.clone(),
            read1: config.read1.clone(),
            read2: config.read2.clone(),
        }
    }

    pub fn get(&self, key: InputKey) -> &str {
        match key {
            InputKey::Reference => &self.reference,
            InputKey::Read1 => &self.read1,
            InputKey::Read2 => &self.read2,
        }
    }
}

/// Outputs of skipped stages, provided by the user: stage -> logical identifier.
pub type Substitutes = BTreeMap<StageKind, String>;

/// Per-run record of produced artifacts and the private scratch directory.
pub struct Context {
    scratch: PathBuf,
    outputs: BTreeMap<StageKind, Artifact>,
    /// Executed stages and elapsed seconds.
    log: Vec<(StageKind, f64)>,
}

impl Context {
    /// Creates a new unique scratch directory within `work_dir`.
    /// Concurrent runs use distinct scratch directories, as intermediate file names are fixed.
    pub fn create(work_dir: &Path) -> Result<Self, Error> {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        ext::sys::mkdir(work_dir)?;
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        loop {
            let scratch = work_dir.join(format!("run-{}-{}-{}", timestamp, std::process::id(),
                COUNTER.fetch_add(1, Ordering::Relaxed)));
            match fs::create_dir(&scratch) {
                Ok(()) => return Ok(Self { scratch, outputs: BTreeMap::new(), log: Vec::new() }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::Io(e, vec![scratch])),
            }
        }
    }

    pub fn scratch(&self) -> &Path {
        &self.scratch
    }

    pub fn get(&self, stage: StageKind) -> Option<&Artifact> {
        self.outputs.get(&stage)
    }

    fn insert(&mut self, stage: StageKind, artifact: Artifact) {
        self.outputs.insert(stage, artifact);
    }

    fn summary(&self) -> json::JsonValue {
        let stages: Vec<_> = self.log.iter().map(|&(stage, seconds)| {
            let artifact = &self.outputs[&stage];
            json::object!{
                stage: stage.name(),
                output: artifact.local_path().to_string_lossy().into_owned(),
                id: artifact.id(),
                seconds: seconds,
            }
        }).collect();
        json::object!{
            scratch: self.scratch.to_string_lossy().into_owned(),
            stages: json::JsonValue::Array(stages),
        }
    }
}

/// Artifacts produced by a (partial) pipeline run.
#[derive(Debug)]
pub struct RunOutput {
    pub scratch: PathBuf,
    /// Outputs of the executed stages, in order.
    pub outputs: Vec<(StageKind, Artifact)>,
}

impl RunOutput {
    /// Output of the last executed stage.
    pub fn last(&self) -> &Artifact {
        &self.outputs.last().expect("At least one stage is executed").1
    }
}

/// Summary of the finished run, written to the scratch directory.
pub const SUMMARY: &'static str = "summary.json";
/// File, created on the successful completion.
pub const SUCCESS: &'static str = "success";

/// Sequential pipeline: BuildIndex -> AlignReads -> ConvertFormat -> SortAlignment -> CallVariants.
pub struct Pipeline<S> {
    config: Config,
    storage: S,
}

impl<S: Storage> Pipeline<S> {
    pub fn new(config: Config, storage: S) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self { config, storage })
    }

    /// Runs all stages.
    pub fn run(&self, inputs: &Inputs) -> Result<RunOutput, Error> {
        self.run_partial(StageKind::BuildIndex, StageKind::CallVariants, inputs, &Substitutes::new())
    }

    /// Runs stages `start..=end`. Outputs of the stages before `start`, that are needed in the slice,
    /// must be provided in `substitutes`.
    pub fn run_partial(
        &self,
        start: StageKind,
        end: StageKind,
        inputs: &Inputs,
        substitutes: &Substitutes,
    ) -> Result<RunOutput, Error>
    {
        validate_param!(start <= end, "Start stage {} comes after end stage {}", start, end);
        let slice = &StageKind::ALL[start.index()..=end.index()];
        // Artifacts that are not produced in this run, materialized before anything is executed.
        let external = self.collect_external(slice, inputs, substitutes)?;
        for &stage in slice {
            self.check_tools(stage)?;
        }

        let mut ctx = Context::create(&self.config.work_dir)?;
        log::info!("Running {} stage(s) [{} .. {}] in {}", slice.len(), start, end, ext::fmt::path(ctx.scratch()));
        let scratch = ctx.scratch.clone();
        let env = stages::Env { config: &self.config, tools: &self.config.tools, scratch: &scratch };
        for (i, &stage) in slice.iter().enumerate() {
            log::info!("[{}/{}] {}", i + 1, slice.len(), stage.to_string().bold());
            let timer = Instant::now();
            let res = {
                // Arguments were checked in `collect_external`.
                let args: Vec<&Artifact> = stage.def().params.iter().enumerate()
                    .map(|(j, param)| {
                        let arg = match param.wire {
                            Wire::Previous => stage.prev().and_then(|prev| ctx.get(prev))
                                .or_else(|| external.get(&(stage, j))),
                            Wire::Input(_) => external.get(&(stage, j)),
                        };
                        arg.expect("All stage arguments are available")
                    })
                    .collect();
                stages::execute(stage, &env, &args)
                    .and_then(|artifact| {
                        self.storage.publish(artifact.local_path(), artifact.id())?;
                        Ok(artifact)
                    })
            };
            match res {
                Ok(artifact) => {
                    let elapsed = timer.elapsed();
                    log::info!("    Finished in {}, output {}", ext::fmt::Duration(elapsed),
                        ext::fmt::path(artifact.local_path()));
                    ctx.insert(stage, artifact);
                    ctx.log.push((stage, elapsed.as_secs_f64()));
                }
                Err(e) => {
                    log::error!("Intermediate files are kept in {}", ext::fmt::path(ctx.scratch()));
                    return Err(e.in_stage(stage));
                }
            }
        }

        ext::sys::save_json(&ctx.summary(), &ctx.scratch.join(SUMMARY))?;
        ext::sys::write_success_file(ctx.scratch.join(SUCCESS))?;
        let outputs = slice.iter().map(|stage| (*stage, ctx.outputs[stage].clone())).collect();
        Ok(RunOutput { scratch: ctx.scratch, outputs })
    }

    /// Materializes pipeline inputs and substitutes, needed by the stages in the slice.
    /// Returns map (stage, parameter index) -> artifact.
    fn collect_external(
        &self,
        slice: &[StageKind],
        inputs: &Inputs,
        substitutes: &Substitutes,
    ) -> Result<BTreeMap<(StageKind, usize), Artifact>, Error>
    {
        let start = slice[0];
        for (&sub_stage, id) in substitutes.iter() {
            if sub_stage >= start {
                return Err(error!(InvalidInput, "Substitute {} for stage {} is not allowed: \
                    the stage is not skipped", id, sub_stage));
            }
            if sub_stage.index() + 1 != start.index() {
                log::warn!("Substitute {} for stage {} is not used", id, sub_stage);
            }
        }

        let mut external = BTreeMap::new();
        for &stage in slice {
            for (j, param) in stage.def().params.iter().enumerate() {
                let id = match param.wire {
                    Wire::Input(key) => inputs.get(key),
                    Wire::Previous => {
                        let prev = stage.prev().expect("First stage has no previous stage");
                        if prev >= start {
                            continue;
                        }
                        match substitutes.get(&prev) {
                            Some(id) => id.as_str(),
                            None => return Err(error!(InvalidInput,
                                "Stage {} requires parameter '{}' ({}), produced by skipped stage {}. \
                                Please provide a substitute", stage, param.name, param.ty, prev)),
                        }
                    }
                };
                let artifact = self.storage.artifact(id, param.ty).map_err(|e| e.in_stage(stage))?;
                external.insert((stage, j), artifact);
            }
        }
        Ok(external)
    }

    /// Checks that executables, used by the stage, exist.
    fn check_tools(&self, stage: StageKind) -> Result<(), Error> {
        let tools = &self.config.tools;
        let exes = match stage {
            StageKind::BuildIndex | StageKind::AlignReads => vec![&tools.bwa],
            StageKind::ConvertFormat | StageKind::SortAlignment => vec![&tools.samtools],
            StageKind::CallVariants => vec![&tools.bcftools, &tools.vcfutils],
        };
        for exe in exes {
            ext::sys::find_exe(exe).map_err(|e| e.in_stage(stage))?;
        }
        Ok(())
    }
}

/// Removes scratch directory of a finished run.
pub fn remove_scratch(scratch: &Path) -> Result<(), Error> {
    fs::remove_dir_all(scratch).map_err(add_path!(scratch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_is_consistent() {
        for (i, def) in STAGES.iter().enumerate() {
            assert_eq!(def.kind.index(), i);
            for param in def.params {
                if param.wire == Wire::Previous {
                    // Output of stage i feeds the correspondingly-typed input of stage i + 1.
                    assert_eq!(def.kind.prev().unwrap().def().output, param.ty);
                }
            }
            assert!(def.kind == StageKind::BuildIndex || def.params.iter().any(|p| p.wire == Wire::Previous));
        }
        assert_eq!(StageKind::BuildIndex.prev(), None);
        assert_eq!(StageKind::CallVariants.prev(), Some(StageKind::SortAlignment));
    }

    #[test]
    fn parse_stage_names() {
        for stage in StageKind::ALL {
            assert_eq!(stage.name().parse::<StageKind>().unwrap(), stage);
            assert_eq!(format!("{:?}", stage).parse::<StageKind>().unwrap(), stage);
        }
        assert_eq!("sort-alignment".parse::<StageKind>().unwrap(), StageKind::SortAlignment);
        assert!("variants".parse::<StageKind>().is_err());
    }

    #[test]
    fn unique_scratch_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let handles: Vec<_> = (0..4).map(|_| {
            let work = dir.path().to_owned();
            std::thread::spawn(move || Context::create(&work).unwrap().scratch().to_owned())
        }).collect();
        let mut dirs: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        dirs.sort();
        dirs.dedup();
        assert_eq!(dirs.len(), 4);
        assert!(dirs.iter().all(|d| d.is_dir()));
    }
}
