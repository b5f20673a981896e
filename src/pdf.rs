use std::ffi::OsString;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;

use crate::config::RendererSettings;

pub const PDF_ENGINE_ENV: &str = "MDBINDER_PDF_ENGINE";

/// Inputs for one HTML-to-PDF conversion.
#[derive(Debug, Clone)]
pub struct RenderJob<'a> {
    pub html: &'a Path,
    pub stylesheet: Option<&'a Path>,
    pub base_url: &'a Path,
    pub output: &'a Path,
}

pub trait PdfEngine {
    fn render(&self, job: &RenderJob<'_>) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct WeasyPrint {
    pub bin: String,
    pub extra_args: Vec<String>,
}

impl WeasyPrint {
    /// `MDBINDER_PDF_ENGINE` overrides the configured binary.
    pub fn from_settings(settings: &RendererSettings) -> Self {
        let bin = std::env::var(PDF_ENGINE_ENV).unwrap_or_else(|_| settings.command.clone());
        Self {
            bin,
            extra_args: settings.args.clone(),
        }
    }

    fn build_args(&self, job: &RenderJob<'_>) -> Vec<OsString> {
        let mut args = Vec::new();
        args.push(OsString::from("--base-url"));
        args.push(job.base_url.as_os_str().to_owned());
        if let Some(stylesheet) = job.stylesheet {
            args.push(OsString::from("--stylesheet"));
            args.push(stylesheet.as_os_str().to_owned());
        }
        args.extend(self.extra_args.iter().map(OsString::from));
        args.push(job.html.as_os_str().to_owned());
        args.push(job.output.as_os_str().to_owned());
        args
    }
}

impl PdfEngine for WeasyPrint {
    fn render(&self, job: &RenderJob<'_>) -> anyhow::Result<()> {
        tracing::info!(
            engine = %self.bin,
            out = %job.output.display(),
            "render pdf"
        );

        let output = match Command::new(&self.bin).args(self.build_args(job)).output() {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                anyhow::bail!(
                    "pdf engine `{}` not found; install weasyprint, set {PDF_ENGINE_ENV}, or set `renderer.command`",
                    self.bin
                );
            }
            Err(err) => return Err(err).with_context(|| format!("run pdf engine: {}", self.bin)),
        };

        if !output.status.success() {
            anyhow::bail!(
                "{} failed ({}): {}",
                self.bin,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Write `html` to a temp file, hand it to `engine`, and check the PDF appeared.
///
/// Returns the size of the written PDF in bytes.
pub fn write_pdf(
    engine: &dyn PdfEngine,
    html: &str,
    stylesheet: Option<&Path>,
    base_url: &Path,
    output: &Path,
) -> anyhow::Result<u64> {
    if let Some(stylesheet) = stylesheet
        && !stylesheet.is_file()
    {
        anyhow::bail!("stylesheet not found: {}", stylesheet.display());
    }

    let mut html_file = tempfile::Builder::new()
        .prefix("mdbinder-")
        .suffix(".html")
        .tempfile()
        .context("create html temp file")?;
    html_file
        .write_all(html.as_bytes())
        .context("write html temp file")?;
    html_file.flush().context("flush html temp file")?;

    // A stale file from an earlier run must not pass the existence check below.
    if output.exists() {
        std::fs::remove_file(output)
            .with_context(|| format!("remove previous output: {}", output.display()))?;
    }

    engine.render(&RenderJob {
        html: html_file.path(),
        stylesheet,
        base_url,
        output,
    })?;

    let metadata = std::fs::metadata(output).with_context(|| {
        format!(
            "pdf engine reported success but wrote nothing: {}",
            output.display()
        )
    })?;
    Ok(metadata.len())
}

/// `<output>.html`, written next to the PDF when `keep_html` is set.
pub fn html_sidecar_path(output: &Path) -> PathBuf {
    output.with_extension("html")
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct CopyEngine {
        jobs: RefCell<Vec<(PathBuf, Option<PathBuf>, PathBuf)>>,
    }

    impl PdfEngine for CopyEngine {
        fn render(&self, job: &RenderJob<'_>) -> anyhow::Result<()> {
            self.jobs.borrow_mut().push((
                job.base_url.to_path_buf(),
                job.stylesheet.map(Path::to_path_buf),
                job.output.to_path_buf(),
            ));
            std::fs::copy(job.html, job.output)?;
            Ok(())
        }
    }

    struct SilentEngine;

    impl PdfEngine for SilentEngine {
        fn render(&self, _job: &RenderJob<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_pdf_passes_job_to_engine() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let css = temp.path().join("book.css");
        std::fs::write(&css, "body {}")?;
        let out = temp.path().join("book.pdf");
        let engine = CopyEngine::default();

        let bytes = write_pdf(&engine, "<p>hi</p>", Some(&css), temp.path(), &out)?;

        assert_eq!(bytes, 9);
        assert_eq!(std::fs::read_to_string(&out)?, "<p>hi</p>");
        let jobs = engine.jobs.borrow();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].0, temp.path());
        assert_eq!(jobs[0].1.as_deref(), Some(css.as_path()));
        Ok(())
    }

    #[test]
    fn missing_output_after_success_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let out = temp.path().join("book.pdf");
        std::fs::write(&out, "stale")?;

        let err = write_pdf(&SilentEngine, "<p/>", None, temp.path(), &out)
            .expect_err("no output written");
        assert!(format!("{err:#}").contains("wrote nothing"));
        Ok(())
    }

    #[test]
    fn missing_stylesheet_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let css = temp.path().join("nope.css");
        let err = write_pdf(
            &SilentEngine,
            "<p/>",
            Some(&css),
            temp.path(),
            &temp.path().join("o.pdf"),
        )
        .expect_err("missing css");
        assert!(format!("{err:#}").contains("stylesheet not found"));
        Ok(())
    }

    #[test]
    fn weasyprint_arguments_put_input_and_output_last() {
        let engine = WeasyPrint {
            bin: "weasyprint".to_owned(),
            extra_args: vec!["--presentational-hints".to_owned()],
        };
        let job = RenderJob {
            html: Path::new("/tmp/in.html"),
            stylesheet: Some(Path::new("/p/book.css")),
            base_url: Path::new("/p/docs"),
            output: Path::new("/p/out.pdf"),
        };

        let args: Vec<String> = engine
            .build_args(&job)
            .into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(
            args,
            vec![
                "--base-url",
                "/p/docs",
                "--stylesheet",
                "/p/book.css",
                "--presentational-hints",
                "/tmp/in.html",
                "/p/out.pdf",
            ]
        );
    }

    #[test]
    fn unknown_engine_binary_reports_how_to_fix() {
        let engine = WeasyPrint {
            bin: "mdbinder-no-such-engine".to_owned(),
            extra_args: Vec::new(),
        };
        let job = RenderJob {
            html: Path::new("in.html"),
            stylesheet: None,
            base_url: Path::new("."),
            output: Path::new("out.pdf"),
        };
        let err = engine.render(&job).expect_err("missing binary");
        assert!(format!("{err:#}").contains("not found"));
    }
}
