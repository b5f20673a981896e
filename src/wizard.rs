//! Interactive prompts used when neither `--build` nor `--export` is given.

use std::path::PathBuf;

use anyhow::{Context as _, anyhow};
use console::Term;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};

use crate::cli::{Cli, Invocation, config_dir_for};
use crate::config::{self, BOOK_STRUCTURE_FILE};

pub fn run(cli: &Cli) -> anyhow::Result<Invocation> {
    if !Term::stderr().is_term() {
        anyhow::bail!("nothing to do: pass --build and/or --export (no terminal for prompts)");
    }

    let theme = ColorfulTheme::default();

    let root: String = Input::with_theme(&theme)
        .with_prompt("Project directory")
        .default(cli.path.clone().unwrap_or_else(|| ".".to_owned()))
        .interact_text()
        .context("failed to obtain project directory")?;
    let root = PathBuf::from(root);
    if !root.is_dir() {
        return Err(anyhow!("'{}' isn't a directory", root.display()));
    }
    let config_dir = config_dir_for(&root, cli.config_dir.as_deref());

    // Prefill from an existing config, if any.
    let existing = config::load_export_config(&config_dir).unwrap_or_default();

    let title: String = Input::with_theme(&theme)
        .with_prompt("Book title")
        .with_initial_text(
            cli.title
                .clone()
                .or(existing.title)
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .interact_text()
        .context("failed to obtain title")?;

    let author: String = Input::with_theme(&theme)
        .with_prompt("Author")
        .with_initial_text(
            cli.author
                .clone()
                .or(existing.author)
                .unwrap_or_default(),
        )
        .allow_empty(true)
        .interact_text()
        .context("failed to obtain author")?;

    let structure_exists = config_dir.join(BOOK_STRUCTURE_FILE).exists();
    let build = Confirm::with_theme(&theme)
        .with_prompt(if structure_exists {
            "Rescan the directory and overwrite the book structure?"
        } else {
            "Scan the directory to generate a book structure?"
        })
        .default(!structure_exists)
        .interact()?;

    let export = Confirm::with_theme(&theme)
        .with_prompt("Export the PDF now?")
        .default(true)
        .interact()?;

    Ok(Invocation {
        root,
        config_dir,
        title: non_empty(title),
        author: non_empty(author),
        out: cli.out.clone(),
        build,
        export,
        force: build && structure_exists,
        diagrams: !cli.no_diagrams,
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
