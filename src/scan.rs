use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::cli::BuildArgs;
use crate::config::{
    self, BOOK_STRUCTURE_FILE, DEFAULT_OUTPUT_FILE, DEFAULT_TITLE, EXPORT_CONFIG_FILE,
    ExportConfig,
};
use crate::formats::{BookStructure, FileRef, Section};
use crate::front_matter::parse_front_matter;

const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];
const LEADING_FILE_STEMS: &[&str] = &["index", "readme"];

#[derive(Debug, Deserialize)]
struct TitleOnly {
    title: Option<String>,
}

/// Generate `book_structure.yaml` (and a starter `export_config.yaml`) from the source tree.
pub fn run(args: &BuildArgs) -> anyhow::Result<()> {
    let export = config::load_export_config(&args.config_dir)?;
    let source_root = config::source_root(&args.root, &export);
    if !source_root.is_dir() {
        anyhow::bail!("source root is not a directory: {}", source_root.display());
    }

    let structure_path = args.config_dir.join(BOOK_STRUCTURE_FILE);
    if structure_path.exists() && !args.force {
        anyhow::bail!(
            "book structure already exists: {} (pass --force to overwrite)",
            structure_path.display()
        );
    }

    let files = discover_markdown(&source_root)?;
    if files.is_empty() {
        anyhow::bail!("no markdown files found under {}", source_root.display());
    }
    let structure = structure_from_files(&source_root, &files);

    std::fs::create_dir_all(&args.config_dir)
        .with_context(|| format!("create config dir: {}", args.config_dir.display()))?;
    write_yaml(&structure_path, &structure, true)?;
    tracing::info!(
        path = %structure_path.display(),
        sections = structure.sections.len(),
        files = structure.file_count(),
        "wrote book structure"
    );

    let export_path = args.config_dir.join(EXPORT_CONFIG_FILE);
    if !export_path.exists() {
        let starter = ExportConfig {
            title: Some(
                args.title
                    .clone()
                    .unwrap_or_else(|| default_title(&args.root)),
            ),
            author: args.author.clone(),
            output_file: Some(DEFAULT_OUTPUT_FILE.to_owned()),
            ..ExportConfig::default()
        };
        write_yaml(&export_path, &starter, false)?;
        tracing::info!(path = %export_path.display(), "wrote starter export config");
    }

    Ok(())
}

/// Markdown files under `root`, relative to it. Hidden and git-ignored paths are skipped.
pub fn discover_markdown(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(true)
        .require_git(false)
        .build();

    for entry in walker {
        let entry = entry.with_context(|| format!("walk {}", root.display()))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        let is_markdown = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                MARKDOWN_EXTENSIONS
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(ext))
            });
        if !is_markdown {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .with_context(|| format!("relativize {}", path.display()))?;
        files.push(rel.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// One section per directory: the root first (untitled), then directories in
/// lexical order. Within a directory `index`/`readme` lead, then file names.
pub fn structure_from_files(source_root: &Path, files: &[PathBuf]) -> BookStructure {
    let mut by_dir: BTreeMap<PathBuf, Vec<&PathBuf>> = BTreeMap::new();
    for file in files {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        by_dir.entry(dir).or_default().push(file);
    }

    let sections = by_dir
        .into_iter()
        .map(|(dir, mut dir_files)| {
            dir_files.sort_by_key(|f| file_sort_key(f));
            let title = (!dir.as_os_str().is_empty()).then(|| humanize_dir(&dir));
            let files = dir_files
                .into_iter()
                .map(|file| file_ref(source_root, file))
                .collect();
            Section { title, files }
        })
        .collect();

    BookStructure { sections }
}

fn file_sort_key(file: &Path) -> (bool, String) {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let name = file
        .file_name()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (!LEADING_FILE_STEMS.contains(&stem.as_str()), name)
}

fn file_ref(source_root: &Path, rel: &Path) -> FileRef {
    let path = to_slash(rel);
    let title = std::fs::read_to_string(source_root.join(rel))
        .ok()
        .and_then(|contents| match parse_front_matter::<TitleOnly>(&contents) {
            Ok(meta) => meta.and_then(|m| m.title),
            Err(err) => {
                tracing::warn!(path = %rel.display(), error = %err, "ignore unreadable front matter");
                None
            }
        });
    match title {
        Some(title) => FileRef::Titled {
            path,
            title: Some(title),
        },
        None => FileRef::Path(path),
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `guides/02-getting_started` -> `Guides / Getting Started`.
pub fn humanize_dir(dir: &Path) -> String {
    dir.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(humanize(&part.to_string_lossy())),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn humanize(name: &str) -> String {
    let trimmed = name.trim_start_matches(|c: char| c.is_ascii_digit());
    let trimmed = if trimmed.len() < name.len() {
        trimmed.trim_start_matches(['-', '_', '.', ' '])
    } else {
        name
    };
    let base = if trimmed.is_empty() { name } else { trimmed };

    base.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_title(root: &Path) -> String {
    std::fs::canonicalize(root)
        .ok()
        .and_then(|p| p.file_name().map(|n| humanize(&n.to_string_lossy())))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_owned())
}

fn write_yaml<T: Serialize>(path: &Path, value: &T, overwrite: bool) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(value).context("serialize yaml")?;

    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut out = options
        .open(path)
        .with_context(|| format!("open {}", path.display()))?;
    out.write_all(yaml.as_bytes())
        .with_context(|| format!("write {}", path.display()))?;
    out.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}
