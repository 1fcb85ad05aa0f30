//! File classifier.
//!
//! Maps a repository path to one of the fixed transformation pipelines
//! based on its extension, flags paths that must be skipped entirely
//! (build artifacts, lock files, VCS metadata), and recognises the two
//! special non-mutable inputs: the instructions file and the
//! project-context file.

use serde::Serialize;
use strum::Display;

/// Which transformation pipeline a file's content runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Code,
    Config,
    Docs,
}

/// Contextual role of a special file. Special files are absorbed as
/// session context and never passed through a pipeline, regardless of
/// what their extension would map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialRole {
    None,
    /// Accumulated custom instructions; the one file the roadmap
    /// sub-flow may rewrite.
    Instructions,
    /// Read-only project context (README equivalent).
    Context,
}

/// Full classification of a single path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub kind: FileKind,
    pub skip: bool,
    pub special: SpecialRole,
}

const CODE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "py", "rs", "go", "java", "rb", "c", "cc", "cpp", "h", "hpp", "cs",
    "php", "swift", "kt", "sh",
];

const CONFIG_EXTENSIONS: &[&str] = &["json", "yml", "yaml", "toml", "ini", "cfg", "xml"];

const DOCS_EXTENSIONS: &[&str] = &["md", "txt", "rst", "adoc"];

/// Directory names that exclude everything beneath them. Matched as
/// whole path segments so `layout/` or `checkout/` never trips `out`.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "dist",
    "build",
    "target",
    "out",
    ".git",
    ".svn",
];

/// Exact lowercase basenames excluded outright.
const SKIP_BASENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "cargo.lock",
    "poetry.lock",
    "gemfile.lock",
];

/// Extensions excluded outright.
const SKIP_EXTENSIONS: &[&str] = &["log"];

/// Recognised instruction filenames (lowercase basenames).
const INSTRUCTION_BASENAMES: &[&str] = &[
    ".sovereign-instructions.md",
    "sovereign-instructions.md",
    ".sovereign.md",
];

/// Recognised project-context filename (lowercase basename).
const CONTEXT_BASENAME: &str = "readme.md";

/// Classify a path into pipeline kind, skip flag, and special role.
///
/// Unmatched-but-not-skipped files default to [`FileKind::Code`]; callers
/// that pre-filter by extension (queue construction) rely on that default
/// holding for anything they let through.
pub fn classify(path: &str) -> Classification {
    let lower = path.to_ascii_lowercase();
    let basename = lower.rsplit('/').next().unwrap_or(&lower);

    let special = if INSTRUCTION_BASENAMES.contains(&basename) {
        SpecialRole::Instructions
    } else if basename == CONTEXT_BASENAME {
        SpecialRole::Context
    } else {
        SpecialRole::None
    };

    let skip = is_skipped(&lower, basename);

    let kind = match extension(&lower) {
        Some(ext) if CONFIG_EXTENSIONS.contains(&ext) => FileKind::Config,
        Some(ext) if DOCS_EXTENSIONS.contains(&ext) => FileKind::Docs,
        _ => FileKind::Code,
    };

    Classification { kind, skip, special }
}

/// Whether the extension belongs to any recognised pipeline set.
/// Queue construction drops files outside these sets; special files are
/// kept regardless.
pub fn has_known_extension(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    match extension(&lower) {
        Some(ext) => {
            CODE_EXTENSIONS.contains(&ext)
                || CONFIG_EXTENSIONS.contains(&ext)
                || DOCS_EXTENSIONS.contains(&ext)
        }
        None => false,
    }
}

fn is_skipped(lower: &str, basename: &str) -> bool {
    let mut dirs = lower.split('/');
    dirs.next_back();
    if dirs.any(|seg| SKIP_DIRS.contains(&seg)) {
        return true;
    }
    if SKIP_BASENAMES.contains(&basename) || basename.contains(".min.") {
        return true;
    }
    matches!(extension(lower), Some(ext) if SKIP_EXTENSIONS.contains(&ext))
}

fn extension(lower_path: &str) -> Option<&str> {
    let basename = lower_path.rsplit('/').next()?;
    match basename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => Some(ext),
        _ => None,
    }
}
