use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::CONFIG_DIR;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Project directory (holds `config/`; default: current directory).
    #[arg(long)]
    pub path: Option<String>,

    /// Directory with `export_config.yaml` and `book_structure.yaml` (default: `<path>/config`).
    #[arg(long)]
    pub config_dir: Option<String>,

    /// Scan the source tree and write `book_structure.yaml`.
    #[arg(long)]
    pub build: bool,

    /// Render the book to PDF.
    #[arg(long)]
    pub export: bool,

    /// Book title (overrides `export_config.yaml`).
    #[arg(long)]
    pub title: Option<String>,

    /// Book author (overrides `export_config.yaml`).
    #[arg(long)]
    pub author: Option<String>,

    /// Output PDF path (overrides `output_file`).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite an existing `book_structure.yaml` on --build.
    #[arg(long)]
    pub force: bool,

    /// Leave diagram code blocks as plain code.
    #[arg(long)]
    pub no_diagrams: bool,

    /// More log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn has_action(&self) -> bool {
        self.build || self.export
    }

    pub fn invocation(&self) -> Invocation {
        let root = PathBuf::from(self.path.as_deref().unwrap_or("."));
        Invocation {
            config_dir: config_dir_for(&root, self.config_dir.as_deref()),
            root,
            title: self.title.clone(),
            author: self.author.clone(),
            out: self.out.clone(),
            build: self.build,
            export: self.export,
            force: self.force,
            diagrams: !self.no_diagrams,
        }
    }
}

pub fn config_dir_for(root: &std::path::Path, config_dir: Option<&str>) -> PathBuf {
    match config_dir {
        Some(dir) => PathBuf::from(dir),
        None => root.join(CONFIG_DIR),
    }
}

/// What to do this run, from flags or from the interactive prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub title: Option<String>,
    pub author: Option<String>,
    pub out: Option<String>,
    pub build: bool,
    pub export: bool,
    pub force: bool,
    pub diagrams: bool,
}

#[derive(Debug, Clone)]
pub struct BuildArgs {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub title: Option<String>,
    pub author: Option<String>,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct ExportArgs {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub title: Option<String>,
    pub author: Option<String>,
    pub out: Option<String>,
    pub diagrams: bool,
}

impl Invocation {
    pub fn build_args(&self) -> BuildArgs {
        BuildArgs {
            root: self.root.clone(),
            config_dir: self.config_dir.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            force: self.force,
        }
    }

    pub fn export_args(&self) -> ExportArgs {
        ExportArgs {
            root: self.root.clone(),
            config_dir: self.config_dir.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            out: self.out.clone(),
            diagrams: self.diagrams,
        }
    }
}
