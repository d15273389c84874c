//! Test fixtures: shell scripts that imitate the external tools, and a small storage with inputs.

use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::Path,
    process::Command,
};
use tempfile::TempDir;
use crate::{
    config::Config,
    ext::sys::mkdir,
    storage::{FileHandle, LocalStorage, Storage},
};
use super::tools::Tools;

/// Fake `bwa mem` leaves this file next to its output.
pub const BWA_MEM_MARKER: &'static str = "bwa_mem_called";

const BWA: &'static str = r#"#!/bin/sh
case "$1" in
    index)
        for ext in amb ann bwt pac sa; do echo index > "$2.$ext"; done ;;
    mem)
        touch "$(dirname "$6")/bwa_mem_called"
        { printf '@HD\tVN:1.6\n@PG\tID:bwa\tCL:%s\n' "$(basename "$2")"; head -n 2 "$3"; head -n 2 "$4"; } > "$6" ;;
    *) exit 1 ;;
esac
"#;

const BWA_FAILING: &'static str = "#!/bin/sh\necho fail >&2\nexit 1\n";

const SAMTOOLS: &'static str = r#"#!/bin/sh
case "$1" in
    view) cat "$4" > "$6" ;;
    sort) LC_ALL=C sort "$4" > "$3" ;;
    *) exit 1 ;;
esac
"#;

const SAMTOOLS_EMPTY: &'static str = r#"#!/bin/sh
case "$1" in
    view) : > "$6" ;;
    sort) : > "$3" ;;
esac
exit 1
"#;

const SAMTOOLS_KILLED: &'static str = "#!/bin/sh\nkill -9 $$\n";

const BCFTOOLS: &'static str = r#"#!/bin/sh
case "$1" in
    mpileup)
        # Reference index is created next to the reference, as htslib does.
        [ -f "$7.fai" ] || printf 'chr\t10\t5\t10\t11\n' > "$7.fai"
        cat "$8" > "$5" ;;
    call)
        {
            printf '##fileformat=VCFv4.2\n##ploidy=%s\n' "$3"
            printf '#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n'
            printf 'chr\t1\t.\tA\tC\t%s\t.\t.\n' "$(grep -c . "$8")"
        } > "$7" ;;
    *) exit 1 ;;
esac
"#;

const BCFTOOLS_EMPTY: &'static str = "#!/bin/sh\nexit 1\n";

const VCFUTILS: &'static str = "#!/bin/sh\n[ \"$1\" = varFilter ] && cat \"$2\"\n";

fn write_script(dir: &Path, name: &str, contents: &str) {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

lazy_static::lazy_static!{
    /// All scripts are written once, before any test spawns a process
    /// (otherwise, executing a script may fail with "Text file busy").
    static ref FAKE_TOOLS: TempDir = {
        let dir = tempfile::tempdir().unwrap();
        for (name, contents) in [
            ("bwa", BWA),
            ("bwa_failing", BWA_FAILING),
            ("samtools", SAMTOOLS),
            ("samtools_empty", SAMTOOLS_EMPTY),
            ("samtools_killed", SAMTOOLS_KILLED),
            ("bcftools", BCFTOOLS),
            ("bcftools_empty", BCFTOOLS_EMPTY),
            ("vcfutils.pl", VCFUTILS),
        ] {
            write_script(dir.path(), name, contents);
        }
        dir
    };
}

/// Directory with fake tools.
pub fn fake_tools() -> &'static Path {
    FAKE_TOOLS.path()
}

pub fn tools() -> Tools {
    let dir = fake_tools();
    Tools {
        bwa: dir.join("bwa"),
        samtools: dir.join("samtools"),
        bcftools: dir.join("bcftools"),
        vcfutils: dir.join("vcfutils.pl"),
    }
}

/// Shell command.
pub fn sh(script: &str) -> Command {
    fake_tools();
    let mut command = Command::new("sh");
    command.arg("-c").arg(script);
    command
}

pub fn scratch() -> TempDir {
    tempfile::tempdir().unwrap()
}

pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(&self.config.storage_root)
    }

    /// Materialized reference and reads.
    pub fn inputs(&self) -> (FileHandle, FileHandle, FileHandle) {
        let storage = self.storage();
        (storage.file(&self.config.reference).unwrap(), storage.file(&self.config.read1).unwrap(),
            storage.file(&self.config.read2).unwrap())
    }
}

/// Storage with a small reference named `ref_name`, and a pair of reads.
pub fn fixture(ref_name: &str) -> Fixture {
    let dir = scratch();
    let root = dir.path().join("store");
    let ref_dir = root.join("wgs/ref_genome");
    let reads_dir = root.join("wgs/trimmed_fastqs");
    mkdir(&ref_dir).unwrap();
    mkdir(&reads_dir).unwrap();
    std::fs::write(&ref_dir.join(ref_name), b">chr\nACGTACGTAC\n").unwrap();
    std::fs::write(&reads_dir.join("r1.fastq"), b"@read1/1\nACGTACGT\n+\nIIIIIIII\n@read2/1\nCGTA\n+\nIIII\n")
        .unwrap();
    std::fs::write(&reads_dir.join("r2.fastq"), b"@read1/2\nGTACGTAC\n+\nIIIIIIII\n@read2/2\nTACG\n+\nIIII\n")
        .unwrap();

    let config = Config {
        storage_root: root,
        work_dir: dir.path().join("work"),
        reference: format!("mem:///wgs/ref_genome/{}", ref_name),
        read1: "mem:///wgs/trimmed_fastqs/r1.fastq".to_owned(),
        read2: "mem:///wgs/trimmed_fastqs/r2.fastq".to_owned(),
        ref_dir: "mem:///wgs/ref_genome".to_owned(),
        results: "mem:///wgs/results".to_owned(),
        tools: tools(),
        ..Config::default()
    };
    Fixture { dir, config }
}

