//! Markup-to-PDF rendering.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::error::{ConvertError, Result};

/// Page setup passed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOptions {
    pub page_size: String,
    pub margin_top: String,
    pub margin_right: String,
    pub margin_bottom: String,
    pub margin_left: String,
    pub encoding: String,
}

impl Default for PageOptions {
    /// A4 with 0.75in margins all round, UTF-8 input.
    fn default() -> Self {
        Self {
            page_size: "A4".to_string(),
            margin_top: "0.75in".to_string(),
            margin_right: "0.75in".to_string(),
            margin_bottom: "0.75in".to_string(),
            margin_left: "0.75in".to_string(),
            encoding: "UTF-8".to_string(),
        }
    }
}

/// Turns a complete HTML document into a fixed-page document at `output`.
pub trait Renderer {
    fn render(&self, document: &str, output: &Path, options: &PageOptions) -> Result<()>;
}

/// Renders through an external `wkhtmltopdf` binary.
#[derive(Debug, Clone)]
pub struct WkHtmlToPdf {
    program: PathBuf,
}

impl WkHtmlToPdf {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(options: &PageOptions, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "--quiet",
            "--page-size",
            options.page_size.as_str(),
            "--margin-top",
            options.margin_top.as_str(),
            "--margin-right",
            options.margin_right.as_str(),
            "--margin-bottom",
            options.margin_bottom.as_str(),
            "--margin-left",
            options.margin_left.as_str(),
            "--encoding",
            options.encoding.as_str(),
            // document is read from stdin
            "-",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Default for WkHtmlToPdf {
    fn default() -> Self {
        Self::new("wkhtmltopdf")
    }
}

impl Renderer for WkHtmlToPdf {
    fn render(&self, document: &str, output: &Path, options: &PageOptions) -> Result<()> {
        debug!(program = %self.program.display(), output = %output.display(), "rendering");
        // A file left over from an earlier run must not count as output.
        match fs::remove_file(output) {
            Ok(()) => debug!(output = %output.display(), "removed stale output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConvertError::io(
                    format!("remove stale {}", output.display()),
                    e,
                ))
            }
        }

        let mut child = Command::new(&self.program)
            .args(Self::args(options, output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ConvertError::Render(format!("spawn {}: {e}", self.program.display()))
            })?;

        // stdin is fed from its own thread while stderr is drained here, and
        // the child is always waited on, even when the write fails.
        let stdin = child.stdin.take();
        let (written, finished) = thread::scope(|scope| {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(document.as_bytes()),
                None => Ok(()),
            });
            let finished = child.wait_with_output();
            (writer.join(), finished)
        });

        let finished =
            finished.map_err(|e| ConvertError::Render(format!("wait for renderer: {e}")))?;
        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(ConvertError::Render(format!(
                "{} failed with status {}: {}",
                self.program.display(),
                finished.status,
                stderr.trim()
            )));
        }
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(ConvertError::Render(format!(
                    "write document to renderer: {e}"
                )))
            }
            Err(_) => {
                return Err(ConvertError::Render(
                    "document writer thread panicked".to_string(),
                ))
            }
        }
        if !output.is_file() {
            return Err(ConvertError::Render(format!(
                "renderer produced no file at {}",
                output.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_page_is_a4_with_three_quarter_inch_margins() {
        let args = WkHtmlToPdf::args(&PageOptions::default(), Path::new("/tmp/out.pdf"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let joined = args.join(" ");
        assert!(joined.contains("--page-size A4"));
        for side in ["top", "right", "bottom", "left"] {
            assert!(joined.contains(&format!("--margin-{side} 0.75in")));
        }
        assert!(joined.contains("--encoding UTF-8"));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.pdf"));
    }

    #[test]
    fn missing_backend_is_render_error() {
        let renderer = WkHtmlToPdf::new("/nonexistent/wkhtmltopdf-binary");
        let dir = tempfile::tempdir().unwrap();
        let err = renderer
            .render("<html></html>", &dir.path().join("x.pdf"), &PageOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Render(_)));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    // One test so the scripts are never being written while another test forks.
    #[cfg(unix)]
    #[test]
    fn external_renderer_process_handling() {
        let dir = tempfile::tempdir().unwrap();
        let options = PageOptions::default();
        let large = "x".repeat(4 * 1024 * 1024);

        // copies stdin to the last argument after flooding stderr
        let copier = WkHtmlToPdf::new(script(
            dir.path(),
            "copier",
            "for last; do :; done\nhead -c 262144 /dev/zero >&2\ncat > \"$last\"",
        ));
        let out = dir.path().join("copied.pdf");
        copier.render(&large, &out, &options).unwrap();
        assert_eq!(fs::metadata(&out).unwrap().len(), large.len() as u64);

        // exits before reading any of the document
        let quitter = WkHtmlToPdf::new(script(dir.path(), "quitter", "echo boom >&2\nexit 3"));
        let err = quitter
            .render(&large, &dir.path().join("never.pdf"), &options)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Render(_)));
        assert!(err.to_string().contains("boom"));

        // succeeds without writing anything; a stale file must not pass for output
        let silent = WkHtmlToPdf::new(script(dir.path(), "silent", "cat > /dev/null"));
        let stale = dir.path().join("stale.pdf");
        fs::write(&stale, "old").unwrap();
        let err = silent.render("<html></html>", &stale, &options).unwrap_err();
        assert!(err.to_string().contains("produced no file"));
        assert!(!stale.exists());
    }
}
