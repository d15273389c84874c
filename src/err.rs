use std::{
    io,
    fmt::Write,
    path::PathBuf,
};
use colored::Colorize;
use crate::{
    ext,
    pipeline::StageKind,
};

/// General enum, representing possible errors.
#[derive(Debug)]
pub enum Error {
    Io(io::Error, Vec<PathBuf>),
    /// Error, produced by an argument parser.
    Lexopt(lexopt::Error),
    /// Executable not found.
    ToolNotFound(PathBuf),
    /// External process terminated abnormally (for example, killed by a signal).
    ToolExecution(String),
    /// External tools finished, but the expected output is absent or empty.
    MissingOutput(PathBuf),
    /// Pattern matched no files in the directory.
    NoCandidate { dir: PathBuf, pattern: String },
    /// Error, raised while executing a pipeline stage.
    Stage(StageKind, Box<Error>),
    InvalidInput(String),
    JsonLoad(String),
}

impl From<lexopt::Error> for Error {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}

impl From<json::JsonError> for Error {
    fn from(e: json::JsonError) -> Self {
        Self::JsonLoad(e.to_string())
    }
}

impl From<crate::ser::LoadError> for Error {
    fn from(e: crate::ser::LoadError) -> Self {
        Self::JsonLoad(e.0)
    }
}

impl Error {
    /// Wraps error into the stage context. Errors, that already have a stage, are not wrapped twice.
    pub fn in_stage(self, stage: StageKind) -> Self {
        match self {
            Self::Stage(..) => self,
            e => Self::Stage(stage, Box::new(e)),
        }
    }

    /// Stage, in which the error occured, if known.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::Stage(stage, _) => Some(*stage),
            _ => None,
        }
    }

    /// Name of the error kind, reported to the user.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(..) => "IoError",
            Self::Lexopt(_) => "ArgumentError",
            Self::ToolNotFound(_) => "ToolNotFoundError",
            Self::ToolExecution(_) => "ToolExecutionError",
            Self::MissingOutput(_) => "MissingOutputError",
            Self::NoCandidate { .. } => "NoCandidateError",
            Self::Stage(_, e) => e.kind(),
            Self::InvalidInput(_) => "InvalidInputError",
            Self::JsonLoad(_) => "JsonError",
        }
    }

    /// Format error message.
    pub fn display(&self) -> String {
        let mut s = String::new();
        match self {
            Self::Io(e, files) => {
                write!(s, "{} in relation to ", "Input/Output error".red()).unwrap();
                if files.is_empty() {
                    write!(s, "unnamed streams").unwrap();
                } else {
                    write!(s, "{}", files.iter().map(|f| ext::fmt::path(f).cyan().to_string())
                        .collect::<Vec<_>>().join(", ")).unwrap();
                }
                write!(s, ": {}", e.kind()).unwrap();
                if let Some(e2) = e.get_ref() {
                    write!(s, ", {}", e2).unwrap();
                }
            }
            Self::Lexopt(e) => write!(s, "{} to parse command-line arguments: {}", "Failed".red(), e).unwrap(),
            Self::ToolNotFound(path) => write!(s, "{} at {}", "Could not find executable".red(),
                ext::fmt::path(path).cyan()).unwrap(),
            Self::ToolExecution(e) => write!(s, "{}:\n{}", "Subprocess error".red(), e).unwrap(),
            Self::MissingOutput(path) => write!(s, "{}: {} is absent or empty", "Missing output".red(),
                ext::fmt::path(path).cyan()).unwrap(),
            Self::NoCandidate { dir, pattern } => write!(s, "{}: no files matching {} in {}",
                "No candidate".red(), pattern.yellow(), ext::fmt::path(dir).cyan()).unwrap(),
            Self::Stage(stage, e) => write!(s, "Stage {} failed ({}). {}", stage.to_string().bold(),
                e.kind().yellow(), e.display()).unwrap(),
            Self::InvalidInput(e) => write!(s, "{}: {}", "Invalid input".red(), e).unwrap(),
            Self::JsonLoad(e) => write!(s, "{}: {}", "Could not load JSON".red(), e).unwrap(),
        };
        s
    }
}

macro_rules! validate_param {
    ($cond:expr, $($arg:expr),+) => {{
        if !($cond) {
            (
                Err($crate::Error::InvalidInput(format!($($arg),+)))
            ?)
        }
    }};
}
pub(crate) use validate_param;

macro_rules! add_path {
    (!) => {
        |e| $crate::Error::Io(e, Vec::new())
    };
    ($path:expr) => {
        |e| $crate::Error::Io(e, vec![std::convert::AsRef::<std::path::Path>::as_ref(&$path).to_owned()])
    };
    ($($path:expr),+) => {
        |e| {
            let mut v = Vec::new();
            $(
                v.push(std::convert::AsRef::<std::path::Path>::as_ref(&$path).to_owned());
            )*
            $crate::Error::Io(e, v)
        }
    };
}
pub(crate) use add_path;

macro_rules! error {
    ($var:ident, $($arg:expr),+ $(,)?) => {
        $crate::Error::$var(format!($($arg),+))
    }
}
pub(crate) use error;

/// Wrapper around the standard result.
pub type Result<T> = std::result::Result<T, Error>;
