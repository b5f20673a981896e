use anyhow::Context as _;

use crate::assemble::{self, BookMeta};
use crate::cli::ExportArgs;
use crate::config::{self, DEFAULT_AUTHOR, DEFAULT_TITLE, Project};
use crate::diagram::{self, DiagramRenderer, MermaidCli};
use crate::gather;
use crate::pdf::{self, PdfEngine, WeasyPrint};
use crate::render::{self, StyleOptions};

pub fn run(args: &ExportArgs) -> anyhow::Result<()> {
    let project = Project::load(&args.root, &args.config_dir).context("load config")?;
    let diagrams = (args.diagrams && project.export.diagrams.enabled)
        .then(|| MermaidCli::from_settings(&project.export.diagrams));
    let engine = WeasyPrint::from_settings(&project.export.renderer);

    export_with(
        &project,
        args,
        diagrams.as_ref().map(|d| d as &dyn DiagramRenderer),
        &engine,
    )
}

/// The whole pipeline with the external tools injected.
pub fn export_with(
    project: &Project,
    args: &ExportArgs,
    diagrams: Option<&dyn DiagramRenderer>,
    engine: &dyn PdfEngine,
) -> anyhow::Result<()> {
    let export = &project.export;
    let source_root = project.source_root();
    let output = match args.out.as_deref() {
        Some(out) => config::resolve_against(&args.root, out),
        None => project.output_path(),
    };

    tracing::info!(
        root = %project.root.display(),
        source_root = %source_root.display(),
        files = project.structure.file_count() + export.include_markdown_files.len(),
        "export: gather"
    );
    let parts = gather::gather(
        &project.structure,
        &export.include_markdown_files,
        &source_root,
    )
    .context("gather markdown")?;

    let meta = book_meta(args, export);
    tracing::info!(title = %meta.title, "export: assemble");
    let document = assemble::assemble(&parts, meta, export.title_page);

    let template = render::load_template(project.template_path().as_deref())?;
    let css = render::generated_css(&StyleOptions {
        page: &export.page,
        fonts: export.font_settings.as_ref(),
        number_sections: export.number_sections,
        title_page: export.title_page,
    });
    let body = document.to_html(|idx, path, markdown| {
        let markdown = match diagrams {
            Some(renderer) => {
                diagram::preprocess(markdown, &export.diagrams.languages, renderer)
                    .with_context(|| format!("pre-render diagrams: {}", path.display()))?
            }
            None => markdown.to_owned(),
        };
        Ok(render::markdown_to_html(&markdown, &format!("doc{idx}-")))
    })?;
    let html = render::compose_html(&template, &document.meta, &body, &css);

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir: {}", parent.display()))?;
    }

    if export.keep_html {
        let sidecar = pdf::html_sidecar_path(&output);
        std::fs::write(&sidecar, &html)
            .with_context(|| format!("write html: {}", sidecar.display()))?;
        tracing::info!(path = %sidecar.display(), "kept html");
    }

    let css_path = project.css_path();
    let bytes = pdf::write_pdf(engine, &html, css_path.as_deref(), &source_root, &output)
        .context("render pdf")?;

    tracing::info!(
        out = %output.display(),
        bytes,
        documents = document.sources().len(),
        "pdf written"
    );
    Ok(())
}

/// CLI flags beat the export config, which beats the built-in defaults.
fn book_meta(args: &ExportArgs, export: &config::ExportConfig) -> BookMeta {
    let title = args
        .title
        .clone()
        .or_else(|| export.title.clone())
        .unwrap_or_else(|| DEFAULT_TITLE.to_owned());
    let author = args
        .author
        .clone()
        .or_else(|| export.author.clone())
        .unwrap_or_else(|| DEFAULT_AUTHOR.to_owned());
    let date = export
        .date
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    BookMeta {
        title,
        author,
        date,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::config::{BOOK_STRUCTURE_FILE, EXPORT_CONFIG_FILE};
    use crate::diagram::RenderedDiagram;
    use crate::pdf::RenderJob;

    #[derive(Default)]
    struct CapturingEngine {
        html: RefCell<Option<String>>,
        base_url: RefCell<Option<PathBuf>>,
    }

    impl PdfEngine for CapturingEngine {
        fn render(&self, job: &RenderJob<'_>) -> anyhow::Result<()> {
            let html = std::fs::read_to_string(job.html)?;
            std::fs::write(job.output, b"%PDF-1.7\n")?;
            *self.html.borrow_mut() = Some(html);
            *self.base_url.borrow_mut() = Some(job.base_url.to_path_buf());
            Ok(())
        }
    }

    struct StubDiagrams;

    impl DiagramRenderer for StubDiagrams {
        fn render(&self, _source: &str) -> anyhow::Result<RenderedDiagram> {
            Ok(RenderedDiagram {
                mime: "image/png",
                bytes: vec![1, 2, 3],
            })
        }
    }

    fn project(root: &Path, export_yaml: &str, structure_yaml: &str) -> anyhow::Result<Project> {
        let config_dir = root.join("config");
        std::fs::create_dir_all(&config_dir)?;
        std::fs::write(config_dir.join(EXPORT_CONFIG_FILE), export_yaml)?;
        std::fs::write(config_dir.join(BOOK_STRUCTURE_FILE), structure_yaml)?;
        Project::load(root, &config_dir)
    }

    fn args(root: &Path) -> ExportArgs {
        ExportArgs {
            root: root.to_path_buf(),
            config_dir: root.join("config"),
            title: None,
            author: None,
            out: None,
            diagrams: true,
        }
    }

    #[test]
    fn exports_in_book_order_with_title_page() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let root = temp.path();
        std::fs::create_dir_all(root.join("docs"))?;
        std::fs::write(root.join("docs/one.md"), "---\ndraft: true\n---\n# One\n\nFirst.\n")?;
        std::fs::write(
            root.join("docs/two.md"),
            "# Two\n\n```mermaid\ngraph LR\n  A-->B\n```\n",
        )?;
        let project = project(
            root,
            "title: Field Guide\nauthor: Ada\ndate: 2026-01-01\nsource_root: docs\noutput_file: out/guide.pdf\nkeep_html: true\n",
            "sections:\n  - title: Basics\n    files: [two.md, one.md]\n",
        )?;
        let engine = CapturingEngine::default();

        export_with(&project, &args(root), Some(&StubDiagrams), &engine)?;

        let html = engine.html.borrow().clone().expect("engine was called");
        assert!(html.contains("<title>Field Guide</title>"), "{html}");
        assert!(html.contains("<div class=\"author\">by Ada</div>"), "{html}");
        assert!(!html.contains("draft: true"), "{html}");
        assert!(html.contains("data:image/png;base64,AQID"), "{html}");

        let positions: Vec<usize> = ["class=\"title-page\"", ">Basics<", ">Two<", ">One<"]
            .iter()
            .map(|needle| html.find(needle).expect(needle))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{html}");

        assert_eq!(engine.base_url.borrow().as_deref(), Some(root.join("docs").as_path()));
        assert!(root.join("out/guide.pdf").is_file());
        assert_eq!(std::fs::read_to_string(root.join("out/guide.html"))?, html);
        Ok(())
    }

    #[test]
    fn cli_overrides_beat_config() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let root = temp.path();
        std::fs::write(root.join("a.md"), "text\n")?;
        let project = project(
            root,
            "title: Config Title\ndate: 2026-01-01\n",
            "sections:\n  - files: [a.md]\n",
        )?;
        let mut args = args(root);
        args.title = Some("Flag Title".to_owned());
        args.out = Some("custom.pdf".to_owned());
        let engine = CapturingEngine::default();

        export_with(&project, &args, None, &engine)?;

        let html = engine.html.borrow().clone().expect("engine was called");
        assert!(html.contains("Flag Title"));
        assert!(!html.contains("Config Title"));
        assert!(html.contains("by Author Name"), "{html}");
        assert!(root.join("custom.pdf").is_file());
        Ok(())
    }

    #[test]
    fn same_inputs_produce_identical_html() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let root = temp.path();
        std::fs::write(root.join("a.md"), "# A\n\n| x |\n|---|\n| 1 |\n")?;
        let project = project(root, "date: 2026-01-01\n", "sections:\n  - files: [a.md]\n")?;

        let first = CapturingEngine::default();
        export_with(&project, &args(root), None, &first)?;
        let second = CapturingEngine::default();
        export_with(&project, &args(root), None, &second)?;

        assert_eq!(*first.html.borrow(), *second.html.borrow());
        Ok(())
    }

    #[test]
    fn missing_source_fails_before_rendering() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let root = temp.path();
        let project = project(root, "", "sections:\n  - files: [ghost.md]\n")?;
        let engine = CapturingEngine::default();

        let err = export_with(&project, &args(root), None, &engine).expect_err("missing file");

        assert!(format!("{err:#}").contains("ghost.md"));
        assert!(engine.html.borrow().is_none());
        Ok(())
    }

    #[test]
    fn files_are_converted_independently() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let root = temp.path();
        std::fs::write(
            root.join("one.md"),
            "# One\n\nnote[^1] and [site]\n\n[^1]: first\n\n[site]: https://one.example\n\n```\nleft open\n",
        )?;
        std::fs::write(
            root.join("two.md"),
            "# Two\n\nnote[^1] and [site]\n\n[^1]: second\n",
        )?;
        let project = project(
            root,
            "date: 2026-01-01\ntitle_page: false\n",
            "sections:\n  - files: [one.md, two.md]\n",
        )?;
        let engine = CapturingEngine::default();

        export_with(&project, &args(root), None, &engine)?;

        let html = engine.html.borrow().clone().expect("engine was called");
        let open_code = html.find("left open").expect("first file code");
        let page_break = html.find("class=\"page-break\" style=").expect("page break");
        let second = html.find("<h1>Two</h1>").expect("second file heading");
        assert!(open_code < page_break && page_break < second, "{html}");
        assert!(!html.contains("&lt;div class=\"page-break\""), "{html}");

        assert_eq!(html.matches("href=\"https://one.example\"").count(), 1, "{html}");
        assert!(html.contains("[site]"), "{html}");
        assert!(html.contains("id=\"doc0-1\""), "{html}");
        assert!(html.contains("id=\"doc1-1\""), "{html}");
        Ok(())
    }

    #[test]
    fn diagrams_left_as_code_when_disabled() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let root = temp.path();
        std::fs::write(root.join("a.md"), "```mermaid\ngraph LR\n```\n")?;
        let project = project(root, "date: 2026-01-01\n", "sections:\n  - files: [a.md]\n")?;
        let engine = CapturingEngine::default();

        export_with(&project, &args(root), None, &engine)?;

        let html = engine.html.borrow().clone().expect("engine was called");
        assert!(html.contains("language-mermaid"), "{html}");
        Ok(())
    }
}
