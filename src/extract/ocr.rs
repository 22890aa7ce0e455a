use super::types::OcrEngine;
use super::ExtractionError;
use crate::config;
use image::{ImageFormat, RgbImage};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Runs the `tesseract` binary as a subprocess.
pub struct TesseractCli {
    exe: PathBuf,
    langs: String,
    extra_args: Vec<String>,
    timeout: Option<Duration>,
}

impl TesseractCli {
    /// Resolves the binary once. `None` means OCR is unavailable on this host.
    pub fn locate(cfg: &config::Ocr) -> Option<Self> {
        let exe = resolve_tesseract_exe(&cfg.tesseract_cmd)?;
        Some(Self {
            exe,
            langs: cfg.langs.clone(),
            extra_args: cfg.extra_args.clone(),
            timeout: (cfg.timeout_seconds > 0).then(|| Duration::from_secs(cfg.timeout_seconds)),
        })
    }

    pub fn exe(&self) -> &Path {
        &self.exe
    }

    /// First line of `tesseract --version`.
    pub fn version(&self) -> Result<String, ExtractionError> {
        let output = Command::new(&self.exe)
            .arg("--version")
            .output()
            .map_err(|e| ExtractionError::Ocr(format!("spawning {}: {e}", self.exe.display())))?;
        // Older releases print the banner on stderr.
        let raw = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn run(&self, input: &Path) -> Result<Output, ExtractionError> {
        debug!(
            "tesseract {} langs={} timeout={:?}",
            input.display(),
            self.langs,
            self.timeout
        );
        let mut cmd = Command::new(&self.exe);
        cmd.arg(input).arg("stdout");
        if !self.langs.is_empty() {
            cmd.arg("-l").arg(&self.langs);
        }
        cmd.args(&self.extra_args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| ExtractionError::Ocr(format!("spawning {}: {e}", self.exe.display())))?;

        match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout),
            None => child.wait_with_output().map_err(ExtractionError::Io),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &RgbImage) -> Result<String, ExtractionError> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| ExtractionError::Image(e.to_string()))?;

        let mut tmp = tempfile::Builder::new()
            .prefix("medreport-ocr-")
            .suffix(".png")
            .tempfile()?;
        tmp.write_all(&png)?;
        tmp.flush()?;

        let output = self.run(tmp.path())?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !output.stderr.is_empty() {
            debug!("tesseract stderr: {}", String::from_utf8_lossy(&output.stderr).trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn resolve_tesseract_exe(raw: &str) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        return find_on_path("tesseract");
    }
    let p = expand_tilde(raw);
    if p.components().count() == 1 {
        return find_on_path(raw);
    }
    if p.is_file() {
        Some(p)
    } else {
        warn!("configured tesseract_cmd does not exist: {}", p.display());
        None
    }
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        exe.is_file().then_some(exe)
    })
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<Output, ExtractionError> {
    // Drain both pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });
    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let join = |handle: std::thread::JoinHandle<std::io::Result<Vec<u8>>>| {
        handle
            .join()
            .map_err(|_| ExtractionError::Ocr("pipe reader thread panicked".into()))?
            .map_err(ExtractionError::Io)
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Output {
                status,
                stdout: join(stdout_thread)?,
                stderr: join(stderr_thread)?,
            });
        }

        if start.elapsed() > timeout {
            warn!("tesseract timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait()?;
            let stderr = join(stderr_thread)?;
            let _ = join(stdout_thread);
            return Err(ExtractionError::Ocr(format!(
                "tesseract exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Canned OCR results, for tests and hosts without tesseract.
pub struct MockOcrEngine {
    outcome: Result<String, String>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            outcome: Ok(text.to_string()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            outcome: Err(reason.to_string()),
        }
    }
}

impl OcrEngine for MockOcrEngine {
    fn recognize(&self, _image: &RgbImage) -> Result<String, ExtractionError> {
        self.outcome.clone().map_err(ExtractionError::Ocr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_missing_path_is_unavailable() {
        let cfg = config::Ocr {
            tesseract_cmd: "/nonexistent/bin/tesseract".into(),
            ..Default::default()
        };
        assert!(TesseractCli::locate(&cfg).is_none());
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_tilde("~/bin/x"), PathBuf::from(home).join("bin/x"));
        }
        assert_eq!(expand_tilde("/usr/bin/x"), PathBuf::from("/usr/bin/x"));
    }
}
