//! Seam to the external transcoding engine.

use crate::config::WebpParams;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Something that turns one JPEG into one WebP file.
///
/// `Ok` means the output file was fully written; any error is treated as a
/// failed attempt by the executor.
#[async_trait]
pub trait Transcoder: Send + Sync + 'static {
    async fn transcode(&self, input: &Path, output: &Path, params: &WebpParams) -> Result<()>;
}

/// Arguments after the program name, in the order the engine expects them.
pub fn build_args(input: &Path, output: &Path, params: &WebpParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![input.into(), "-strip".into()];
    if params.lossless {
        args.extend(["-define", "webp:lossless=true"].map(OsString::from));
    } else {
        args.extend([
            OsString::from("-quality"),
            params.quality.to_string().into(),
            "-define".into(),
            format!("webp:method={}", params.method).into(),
        ]);
        if params.auto_filter {
            args.extend(
                [
                    "-define",
                    "webp:auto-filter=true",
                    "-define",
                    "webp:image-hint=photo",
                ]
                .map(OsString::from),
            );
        }
    }
    args.push(output.into());
    args
}

/// ImageMagick run as a child process.
#[derive(Debug, Clone)]
pub struct MagickTranscoder {
    program: String,
}

impl Default for MagickTranscoder {
    fn default() -> Self {
        Self::new("magick")
    }
}

impl MagickTranscoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `<program> -version` and return the first line of its banner.
    pub async fn probe(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("`{}` is not installed or not in PATH", self.program))?;
        if !output.status.success() {
            return Err(anyhow!(
                "`{}` was found but `-version` exited with {}",
                self.program,
                output.status.code().unwrap_or(-1)
            ));
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        Ok(banner.lines().next().unwrap_or("unknown version").trim().to_string())
    }
}

#[async_trait]
impl Transcoder for MagickTranscoder {
    async fn transcode(&self, input: &Path, output: &Path, params: &WebpParams) -> Result<()> {
        let out = Command::new(&self.program)
            .args(build_args(input, output, params))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to spawn `{}` for {:?}", self.program, input))?;
        if out.status.success() {
            Ok(())
        } else {
            Err(anyhow!(
                "`{}` exited with status {}: {}",
                self.program,
                out.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&out.stderr).trim()
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn lossy_arguments_follow_the_engine_contract() {
        let params = WebpParams {
            quality: 82,
            method: 6,
            lossless: false,
            auto_filter: true,
        };
        let args = strings(build_args(Path::new("/in/a.jpg"), Path::new("/out/a.webp"), &params));
        assert_eq!(
            args,
            [
                "/in/a.jpg",
                "-strip",
                "-quality",
                "82",
                "-define",
                "webp:method=6",
                "-define",
                "webp:auto-filter=true",
                "-define",
                "webp:image-hint=photo",
                "/out/a.webp",
            ]
        );
    }

    #[test]
    fn auto_filter_hints_are_optional() {
        let params = WebpParams {
            quality: 50,
            method: 2,
            lossless: false,
            auto_filter: false,
        };
        let args = strings(build_args(Path::new("a.jpg"), Path::new("a.webp"), &params));
        assert_eq!(
            args,
            ["a.jpg", "-strip", "-quality", "50", "-define", "webp:method=2", "a.webp"]
        );
    }

    #[test]
    fn lossless_drops_quality_and_method() {
        let params = WebpParams {
            lossless: true,
            ..WebpParams::default()
        };
        let args = strings(build_args(Path::new("a.jpg"), Path::new("a.webp"), &params));
        assert_eq!(
            args,
            ["a.jpg", "-strip", "-define", "webp:lossless=true", "a.webp"]
        );
    }

    #[tokio::test]
    async fn missing_program_is_an_error_not_a_panic() {
        let engine = MagickTranscoder::new("webpsync-no-such-engine");
        assert!(engine.probe().await.is_err());
        let err = engine
            .transcode(Path::new("a.jpg"), Path::new("a.webp"), &WebpParams::default())
            .await;
        assert!(err.is_err());
    }
}
