use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;

use crate::config::resolve_against;
use crate::formats::BookStructure;
use crate::front_matter::strip_front_matter;

/// One Markdown source with its front matter removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub title: Option<String>,
    pub body: String,
}

/// A book-structure section after path resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub title: Option<String>,
    pub documents: Vec<SourceDocument>,
}

struct PlannedPart {
    title: Option<String>,
    entries: Vec<(PathBuf, Option<String>)>,
}

/// Resolve, check and read every referenced file, in book order.
///
/// `extra_files` (from `include_markdown_files`) form a trailing untitled part.
/// A path listed twice keeps its first position only. Any missing file fails
/// the whole gather, and the error lists all of them.
pub fn gather(
    structure: &BookStructure,
    extra_files: &[String],
    source_root: &Path,
) -> anyhow::Result<Vec<Part>> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut planned = Vec::new();

    let mut sections: Vec<(Option<String>, Vec<(&str, Option<String>)>)> = structure
        .sections
        .iter()
        .map(|section| {
            let files = section
                .files
                .iter()
                .map(|file| (file.path(), file.title().map(str::to_owned)))
                .collect::<Vec<_>>();
            (section.title.clone(), files)
        })
        .collect();
    if !extra_files.is_empty() {
        sections.push((None, extra_files.iter().map(|f| (f.as_str(), None)).collect()));
    }

    for (title, files) in sections {
        let mut entries = Vec::new();
        for (rel, file_title) in files {
            let path = normalize(&resolve_against(source_root, rel));
            if !seen.insert(path.clone()) {
                tracing::debug!(path = %path.display(), "skip duplicate book entry");
                continue;
            }
            entries.push((path, file_title));
        }
        if entries.is_empty() {
            tracing::debug!(section = ?title, "skip empty section");
            continue;
        }
        planned.push(PlannedPart { title, entries });
    }

    let missing: Vec<&Path> = planned
        .iter()
        .flat_map(|part| part.entries.iter())
        .map(|(path, _)| path.as_path())
        .filter(|path| !path.is_file())
        .collect();
    if !missing.is_empty() {
        let list = missing
            .iter()
            .map(|path| format!("  - {}", path.display()))
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!(
            "{} markdown file(s) referenced by the book structure not found:\n{list}",
            missing.len()
        );
    }

    let mut parts = Vec::with_capacity(planned.len());
    for part in planned {
        let mut documents = Vec::with_capacity(part.entries.len());
        for (path, title) in part.entries {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("read markdown: {}", path.display()))?;
            let body = strip_front_matter(&contents).to_owned();
            tracing::debug!(path = %path.display(), bytes = body.len(), "gathered");
            documents.push(SourceDocument { path, title, body });
        }
        parts.push(Part {
            title: part.title,
            documents,
        });
    }

    Ok(parts)
}

/// Lexically drop `.` and fold `..` so one file is not listed twice under two spellings.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir
                if matches!(out.components().next_back(), Some(Component::Normal(_))) =>
            {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
