//! External executables and the exact command lines, used by the stages.

use std::{
    path::{Path, PathBuf},
    process::Command,
};
use crate::{
    Error,
    ser::{JsonSer, json_get},
};

/// Paths to the external executables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tools {
    pub bwa: PathBuf,
    pub samtools: PathBuf,
    pub bcftools: PathBuf,
    pub vcfutils: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            bwa: PathBuf::from("bwa"),
            samtools: PathBuf::from("samtools"),
            bcftools: PathBuf::from("bcftools"),
            vcfutils: PathBuf::from("vcfutils.pl"),
        }
    }
}

impl Tools {
    /// Builds BWA index next to the reference file.
    pub fn bwa_index(&self, reference: &Path) -> Command {
        let mut command = Command::new(&self.bwa);
        command.arg("index").arg(reference);
        command
    }

    /// Aligns paired-end reads, writes SAM file.
    pub fn bwa_mem(&self, reference: &Path, read1: &Path, read2: &Path, out_sam: &Path) -> Command {
        let mut command = Command::new(&self.bwa);
        command.arg("mem").arg(reference).arg(read1).arg(read2)
            .arg("-o").arg(out_sam);
        command
    }

    /// Converts SAM into BAM.
    pub fn samtools_view(&self, sam: &Path, out_bam: &Path) -> Command {
        let mut command = Command::new(&self.samtools);
        command.args(&[
                "view",
                "-S", // Input is SAM,
                "-b", // Output BAM.
            ])
            .arg(sam)
            .arg("-o").arg(out_bam);
        command
    }

    /// Sorts BAM file by position.
    pub fn samtools_sort(&self, bam: &Path, out_bam: &Path) -> Command {
        let mut command = Command::new(&self.samtools);
        command.arg("sort").arg("-o").arg(out_bam).arg(bam);
        command
    }

    /// Summarizes read coverage into a binary BCF file.
    pub fn bcftools_mpileup(&self, reference: &Path, sorted_bam: &Path, out_bcf: &Path) -> Command {
        let mut command = Command::new(&self.bcftools);
        command.args(&["mpileup", "-O", "b"])
            .arg("-o").arg(out_bcf)
            .arg("-f").arg(reference)
            .arg(sorted_bam);
        command
    }

    /// Detects SNVs from the coverage summary.
    pub fn bcftools_call(&self, bcf: &Path, ploidy: u8, out_vcf: &Path) -> Command {
        let mut command = Command::new(&self.bcftools);
        command.args(&[
                "call",
                "--ploidy", &ploidy.to_string(),
                "-m", // Multiallelic caller,
                "-v", // Output variant sites only.
            ])
            .arg("-o").arg(out_vcf)
            .arg(bcf);
        command
    }

    /// Filters variants. Output is written to stdout.
    pub fn vcfutils_filter(&self, vcf: &Path) -> Command {
        let mut command = Command::new(&self.vcfutils);
        command.arg("varFilter").arg(vcf);
        command
    }
}

impl JsonSer for Tools {
    fn save(&self) -> json::JsonValue {
        json::object!{
            bwa: self.bwa.to_string_lossy().into_owned(),
            samtools: self.samtools.to_string_lossy().into_owned(),
            bcftools: self.bcftools.to_string_lossy().into_owned(),
            vcfutils: self.vcfutils.to_string_lossy().into_owned(),
        }
    }

    fn load(obj: &json::JsonValue) -> Result<Self, Error> {
        json_get!(obj -> bwa? (as_str), samtools? (as_str), bcftools? (as_str), vcfutils? (as_str));
        let def = Self::default();
        Ok(Self {
            bwa: bwa.map(PathBuf::from).unwrap_or(def.bwa),
            samtools: samtools.map(PathBuf::from).unwrap_or(def.samtools),
            bcftools: bcftools.map(PathBuf::from).unwrap_or(def.bcftools),
            vcfutils: vcfutils.map(PathBuf::from).unwrap_or(def.vcfutils),
        })
    }
}
