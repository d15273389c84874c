//! Implementation of the individual stages.
//! Each stage invokes one or more external tools and checks that its output was produced.

use std::{
    fs,
    path::{Path, PathBuf},
};
use crate::{
    Error,
    err::{add_path, error},
    ext,
    config::Config,
    storage::{Artifact, ArtifactType, FileHandle, DirHandle, join_id},
};
use super::{
    StageKind,
    invoke::invoke,
    resolve::resolve,
    reads,
    tools::Tools,
};

/// Index directory, created within the scratch directory.
pub const INDEX_DIR: &'static str = "ref_genome";
/// Files, created by `bwa index` next to the reference.
pub const INDEX_SUFFIXES: [&'static str; 5] = [".amb", ".ann", ".bwt", ".pac", ".sa"];
pub const ALIGNED_SAM: &'static str = "aligned.sam";
pub const ALIGNED_BAM: &'static str = "aligned.bam";
pub const SORTED_BAM: &'static str = "aligned.sorted.bam";
/// Intermediate coverage summary.
pub const RAW_BCF: &'static str = "raw.bcf";
/// Unfiltered variant calls.
pub const RAW_VCF: &'static str = "variants.vcf";
pub const FINAL_VCF: &'static str = "final_variants.vcf";

/// Everything a stage needs besides its inputs.
pub struct Env<'a> {
    pub config: &'a Config,
    pub tools: &'a Tools,
    /// Per-run scratch directory.
    pub scratch: &'a Path,
}

impl<'a> Env<'a> {
    /// Handle for a file in the scratch directory, published into the results directory.
    fn result_file(&self, name: &str) -> FileHandle {
        FileHandle::new(self.scratch.join(name), join_id(&self.config.results, name))
    }
}

/// Checks that the output exists and is not empty.
pub fn check_output(path: &Path, ty: ArtifactType) -> Result<(), Error> {
    let ok = match ty {
        ArtifactType::File => ext::sys::nonempty_file(path),
        ArtifactType::Dir => ext::sys::nonempty_dir(path),
    };
    if ok { Ok(()) } else { Err(Error::MissingOutput(path.to_owned())) }
}

/// Returns a copy of the reference in `<scratch>/ref_genome/`, copying it if needed.
/// Tools may create auxiliary files (for example, `.fai`) next to the reference,
/// so they never receive the file from the storage.
fn scratch_reference(env: &Env, reference: &FileHandle) -> Result<PathBuf, Error> {
    let out_dir = env.scratch.join(INDEX_DIR);
    let filename = reference.local_path().file_name()
        .ok_or_else(|| error!(InvalidInput, "Reference path {} has no file name",
            ext::fmt::path(reference.local_path())))?;
    let local_ref = out_dir.join(filename);
    if !local_ref.exists() {
        ext::sys::mkdir(&out_dir)?;
        fs::copy(reference.local_path(), &local_ref).map_err(add_path!(reference.local_path(), local_ref))?;
    }
    Ok(local_ref)
}

/// Copies the reference into the scratch directory and builds BWA index next to it.
pub fn build_index(env: &Env, reference: &FileHandle) -> Result<DirHandle, Error> {
    let local_ref = scratch_reference(env, reference)?;
    invoke(&mut env.tools.bwa_index(&local_ref), None)?;
    for suffix in INDEX_SUFFIXES {
        check_output(&ext::sys::append_path(&local_ref, suffix), ArtifactType::File)?;
    }
    let out_dir = env.scratch.join(INDEX_DIR);
    Ok(DirHandle::new(out_dir, env.config.ref_dir.clone()))
}

/// Finds the reference in the index directory, and aligns paired-end reads to it.
pub fn align_reads(
    env: &Env,
    ref_dir: &DirHandle,
    read1: &FileHandle,
    read2: &FileHandle,
) -> Result<FileHandle, Error>
{
    let reference = resolve(ref_dir, &env.config.ref_pattern)?;
    log::debug!("    Using reference {}", ext::fmt::path(reference.local_path()));
    reads::check_pair(read1.local_path(), read2.local_path())?;

    let sam = env.result_file(ALIGNED_SAM);
    invoke(&mut env.tools.bwa_mem(reference.local_path(), read1.local_path(), read2.local_path(),
        sam.local_path()), None)?;
    check_output(sam.local_path(), ArtifactType::File)?;
    Ok(sam)
}

/// Compresses SAM into BAM.
pub fn convert_format(env: &Env, sam: &FileHandle) -> Result<FileHandle, Error> {
    let bam = env.result_file(ALIGNED_BAM);
    invoke(&mut env.tools.samtools_view(sam.local_path(), bam.local_path()), None)?;
    check_output(bam.local_path(), ArtifactType::File)?;
    Ok(bam)
}

/// Sorts BAM file by position.
pub fn sort_alignment(env: &Env, bam: &FileHandle) -> Result<FileHandle, Error> {
    let sorted = env.result_file(SORTED_BAM);
    invoke(&mut env.tools.samtools_sort(bam.local_path(), sorted.local_path()), None)?;
    check_output(sorted.local_path(), ArtifactType::File)?;
    Ok(sorted)
}

/// Summarizes coverage, calls variants with the configured ploidy, and filters them.
pub fn call_variants(env: &Env, reference: &FileHandle, sorted_bam: &FileHandle) -> Result<FileHandle, Error> {
    let local_ref = scratch_reference(env, reference)?;
    let bcf = env.scratch.join(RAW_BCF);
    invoke(&mut env.tools.bcftools_mpileup(&local_ref, sorted_bam.local_path(), &bcf), None)?;

    let vcf = env.scratch.join(RAW_VCF);
    invoke(&mut env.tools.bcftools_call(&bcf, env.config.ploidy, &vcf), None)?;

    let final_vcf = env.result_file(FINAL_VCF);
    invoke(&mut env.tools.vcfutils_filter(&vcf), Some(final_vcf.local_path()))?;
    check_output(final_vcf.local_path(), ArtifactType::File)?;
    Ok(final_vcf)
}

fn expect_file<'a>(stage: StageKind, args: &[&'a Artifact], i: usize) -> Result<&'a FileHandle, Error> {
    args.get(i).and_then(|a| a.as_file())
        .ok_or_else(|| error!(InvalidInput, "Stage {}: argument #{} must be a file", stage, i + 1))
}

fn expect_dir<'a>(stage: StageKind, args: &[&'a Artifact], i: usize) -> Result<&'a DirHandle, Error> {
    args.get(i).and_then(|a| a.as_dir())
        .ok_or_else(|| error!(InvalidInput, "Stage {}: argument #{} must be a directory", stage, i + 1))
}

/// Executes the stage on arguments, ordered as in the stage definition.
pub fn execute(stage: StageKind, env: &Env, args: &[&Artifact]) -> Result<Artifact, Error> {
    Ok(match stage {
        StageKind::BuildIndex => Artifact::Dir(build_index(env, expect_file(stage, args, 0)?)?),
        StageKind::AlignReads => Artifact::File(align_reads(env, expect_dir(stage, args, 0)?,
            expect_file(stage, args, 1)?, expect_file(stage, args, 2)?)?),
        StageKind::ConvertFormat => Artifact::File(convert_format(env, expect_file(stage, args, 0)?)?),
        StageKind::SortAlignment => Artifact::File(sort_alignment(env, expect_file(stage, args, 0)?)?),
        StageKind::CallVariants => Artifact::File(call_variants(env, expect_file(stage, args, 0)?,
            expect_file(stage, args, 1)?)?),
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::pipeline::testing;

    fn env<'a>(config: &'a Config, scratch: &'a Path) -> Env<'a> {
        Env { config, tools: &config.tools, scratch }
    }

    #[test]
    fn all_stages_by_hand() {
        let fx = testing::fixture("ref.fasta");
        let scratch = fx.dir.path().join("scratch");
        ext::sys::mkdir(&scratch).unwrap();
        let env = env(&fx.config, &scratch);
        let (reference, read1, read2) = fx.inputs();

        let index = build_index(&env, &reference).unwrap();
        assert!(index.local_path().join("ref.fasta").is_file());
        assert!(index.local_path().join("ref.fasta.bwt").is_file());
        // Original reference is not modified.
        assert!(!reference.local_path().with_extension("fasta.bwt").exists());
        let ref_files = || fs::read_dir(reference.local_path().parent().unwrap()).unwrap().count();
        let n_ref_files = ref_files();

        let sam = align_reads(&env, &index, &read1, &read2).unwrap();
        assert_eq!(sam.id(), "mem:///wgs/results/aligned.sam");
        let bam = convert_format(&env, &sam).unwrap();
        let sorted = sort_alignment(&env, &bam).unwrap();
        let vcf = call_variants(&env, &reference, &sorted).unwrap();
        assert!(ext::sys::nonempty_file(vcf.local_path()));
        let contents = fs::read_to_string(vcf.local_path()).unwrap();
        assert!(contents.starts_with("##fileformat=VCF"));
        assert!(contents.contains("##ploidy=1"));
        assert!(scratch.join(RAW_BCF).exists() && scratch.join(RAW_VCF).exists());
        // Index built in this run is reused by the variant caller.
        assert!(index.local_path().join("ref.fasta.fai").is_file());
        assert_eq!(ref_files(), n_ref_files);
    }

    #[test]
    fn failed_indexing() {
        let mut fx = testing::fixture("ref.fasta");
        fx.config.tools.bwa = testing::fake_tools().join("bwa_failing");
        let scratch = fx.dir.path().join("scratch");
        ext::sys::mkdir(&scratch).unwrap();
        let (reference, _, _) = fx.inputs();

        match build_index(&env(&fx.config, &scratch), &reference) {
            Err(Error::MissingOutput(path)) => assert_eq!(path, scratch.join(INDEX_DIR).join("ref.fasta.amb")),
            res => panic!("Expected MissingOutput, got {:?}", res),
        }
    }

    #[test]
    fn reference_is_copied_for_calling() {
        let fx = testing::fixture("ref.fasta");
        let scratch = fx.dir.path().join("scratch");
        ext::sys::mkdir(&scratch).unwrap();
        let (reference, _, _) = fx.inputs();
        let sorted = FileHandle::new(scratch.join("in.sorted.bam"), "mem:///in.sorted.bam");
        std::fs::write(sorted.local_path(), b"@HD\tVN:1.6\n").unwrap();

        call_variants(&env(&fx.config, &scratch), &reference, &sorted).unwrap();
        assert!(scratch.join(INDEX_DIR).join("ref.fasta.fai").is_file());
        assert!(!reference.local_path().with_extension("fasta.fai").exists());
    }

    #[test]
    fn no_reference_in_index_dir() {
        let fx = testing::fixture("ref.fasta");
        let scratch = fx.dir.path().join("scratch");
        let index_dir = fx.dir.path().join("index");
        ext::sys::mkdir(&scratch).unwrap();
        ext::sys::mkdir(&index_dir).unwrap();
        std::fs::write(&index_dir.join("ref.fa"), b">chr\nACGT\n").unwrap();
        let env = env(&fx.config, &scratch);
        let (_, read1, read2) = fx.inputs();

        let e = align_reads(&env, &DirHandle::new(&index_dir, "mem:///index"), &read1, &read2).unwrap_err();
        assert_eq!(e.kind(), "NoCandidateError");
        assert!(!scratch.join(ALIGNED_SAM).exists());
        assert!(!scratch.join(testing::BWA_MEM_MARKER).exists());
    }

    #[test]
    fn empty_output_is_missing() {
        let mut fx = testing::fixture("ref.fasta");
        fx.config.tools.samtools = testing::fake_tools().join("samtools_empty");
        let scratch = fx.dir.path().join("scratch");
        ext::sys::mkdir(&scratch).unwrap();
        let sam = FileHandle::new(scratch.join("in.sam"), "mem:///in.sam");
        std::fs::write(sam.local_path(), b"@HD\tVN:1.6\n").unwrap();

        let e = convert_format(&env(&fx.config, &scratch), &sam).unwrap_err();
        match e {
            Error::MissingOutput(path) => assert_eq!(path, scratch.join(ALIGNED_BAM)),
            e => panic!("Unexpected error {:?}", e),
        }
    }

    #[test]
    fn killed_tool() {
        let mut fx = testing::fixture("ref.fasta");
        fx.config.tools.samtools = testing::fake_tools().join("samtools_killed");
        let scratch = fx.dir.path().join("scratch");
        ext::sys::mkdir(&scratch).unwrap();
        let bam = FileHandle::new(scratch.join("in.bam"), "mem:///in.bam");
        std::fs::write(bam.local_path(), b"bam").unwrap();
        let e = sort_alignment(&env(&fx.config, &scratch), &bam).unwrap_err();
        assert_eq!(e.kind(), "ToolExecutionError");
    }

    #[test]
    fn wrong_argument_types() {
        let fx = testing::fixture("ref.fasta");
        let scratch = fx.dir.path();
        let dir = Artifact::Dir(DirHandle::new(scratch, "mem:///d"));
        let e = execute(StageKind::ConvertFormat, &env(&fx.config, scratch), &[&dir]).unwrap_err();
        assert_eq!(e.kind(), "InvalidInputError");
    }
}
