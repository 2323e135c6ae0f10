//! External bundler invocation (esbuild-compatible CLI).
//!
//! One subprocess per cache miss. The bundler reads a generated entry file
//! that imports every input by absolute path and writes a single output into
//! the staging directory. Any failure is reported to the caller, which falls
//! back to concatenation.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::component::Category;
use crate::config::BundlerConfig;

/// Grace period for reaping a killed bundler.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// A located bundler binary and its invocation settings.
#[derive(Debug, Clone)]
pub struct ExternalBundler {
    program: PathBuf,
    timeout: Duration,
    minify: bool,
    externals: Vec<String>,
}

impl ExternalBundler {
    /// Locate the configured program on `PATH`.
    ///
    /// `None` when the bundler is disabled or not installed; every build then
    /// takes the fallback path.
    pub fn locate(config: &BundlerConfig) -> Option<Self> {
        if config.program.is_empty() {
            return None;
        }
        match which::which(&config.program) {
            Ok(program) => Some(Self {
                program,
                timeout: config.timeout(),
                minify: config.minify,
                externals: config.externals.clone(),
            }),
            Err(_) => {
                crate::debug!("bundle"; "`{}` not found, using concatenation", config.program);
                None
            }
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Bundle `files` into `output`. `work_dir` holds the generated entry.
    pub async fn run(
        &self,
        files: &[&PathBuf],
        category: Category,
        work_dir: &Path,
        output: &Path,
    ) -> Result<()> {
        let entry = work_dir.join(format!("entry.{}", category.ext()));
        fs::write(&entry, entry_source(files, category)?)
            .with_context(|| format!("failed to write {}", entry.display()))?;

        let mut cmd = Command::new(&self.program);
        cmd.arg(&entry)
            .arg("--bundle")
            .arg(format!("--outfile={}", output.display()))
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if self.minify {
            cmd.arg("--minify");
        }
        for glob in &self.externals {
            cmd.arg(format!("--external:{glob}"));
        }

        let name = self.program_name();
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn `{name}`"))?;

        // Drain stderr concurrently so a chatty bundler cannot block on a full pipe
        let stderr_task = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                buf
            })
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(anyhow!(e).context(format!("`{name}` wait failed"))),
            Err(_elapsed) => {
                let _ = child.start_kill();
                let _ = tokio::time::timeout(REAP_TIMEOUT, child.wait()).await;
                bail!("`{name}` timed out after {}s", self.timeout.as_secs());
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            let detail = strip_ansi(stderr.trim());
            bail!("`{name}` failed with {status}\n{detail}");
        }
        if !output.is_file() {
            bail!("`{name}` exited cleanly but wrote no output");
        }
        Ok(())
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Entry file importing every input by absolute path, in order.
fn entry_source(files: &[&PathBuf], category: Category) -> Result<String> {
    let keyword = match category {
        Category::Css => "@import",
        Category::Js => "import",
        Category::Py => bail!("{category} assets are not bundleable"),
    };

    let mut source = String::new();
    for path in files {
        let quoted = serde_json::to_string(&path.to_string_lossy())?;
        source.push_str(&format!("{keyword} {quoted};\n"));
    }
    Ok(source)
}

fn strip_ansi(s: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid regex"));
    re.replace_all(s, "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_source_css() {
        let a = PathBuf::from("/s/a.css");
        let b = PathBuf::from("/s/b.css");
        let src = entry_source(&[&a, &b], Category::Css).unwrap();
        assert_eq!(src, "@import \"/s/a.css\";\n@import \"/s/b.css\";\n");
    }

    #[test]
    fn test_entry_source_escapes_quotes() {
        let a = PathBuf::from("/s/we\"ird.js");
        let src = entry_source(&[&a], Category::Js).unwrap();
        assert_eq!(src, "import \"/s/we\\\"ird.js\";\n");
    }

    #[test]
    fn test_entry_source_rejects_py() {
        let a = PathBuf::from("/s/a.py");
        assert!(entry_source(&[&a], Category::Py).is_err());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31merror\x1b[0m: x"), "error: x");
    }

    #[test]
    fn test_locate_disabled() {
        assert!(ExternalBundler::locate(&BundlerConfig::fallback_only()).is_none());
    }

    #[test]
    fn test_locate_missing_program() {
        let config = BundlerConfig {
            program: "bundlewright-no-such-bundler".into(),
            ..BundlerConfig::default()
        };
        assert!(ExternalBundler::locate(&config).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout_kills_process() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("slow-bundler");
        fs::write(&script, "#!/bin/sh\nsleep 10\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let bundler = ExternalBundler {
            program: script,
            timeout: Duration::from_millis(200),
            minify: false,
            externals: Vec::new(),
        };
        let input = dir.path().join("a.css");
        fs::write(&input, "a{}").unwrap();
        let output = dir.path().join("out.css");

        let started = std::time::Instant::now();
        let err = bundler
            .run(&[&input], Category::Css, dir.path(), &output)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_nonzero_exit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("bad-bundler");
        fs::write(&script, "#!/bin/sh\necho boom >&2\nexit 3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let bundler = ExternalBundler {
            program: script,
            timeout: Duration::from_secs(5),
            minify: false,
            externals: Vec::new(),
        };
        let input = dir.path().join("a.js");
        fs::write(&input, "let a;").unwrap();

        let err = bundler
            .run(&[&input], Category::Js, dir.path(), &dir.path().join("out.js"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
