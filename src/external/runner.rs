//! Helper-program implementations of [`Analyzer`] and [`ReadingConverter`].

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{Analyzer, ConvertOptions, ExternalError, ReadingConverter};
use crate::annotate::align::Token;
use crate::config::CommandConfig;

/// A configured helper program speaking JSON over stdin/stdout
#[derive(Debug, Clone)]
struct CommandRunner {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRunner {
    /// `None` when no command is configured.
    ///
    /// Bare names are looked up on `PATH`; a name that cannot be found is
    /// kept as-is and fails at spawn time.
    fn from_config(config: &CommandConfig) -> Option<Self> {
        let name = config.command.as_deref()?.trim();
        if name.is_empty() {
            return None;
        }
        let program = which::which(name).unwrap_or_else(|_| PathBuf::from(name));
        Some(Self {
            name: name.to_string(),
            program,
            args: config.args.clone(),
            timeout: config.timeout(),
        })
    }

    async fn call<I: Serialize + Sync, O: DeserializeOwned>(
        &self,
        input: &I,
    ) -> Result<O, ExternalError> {
        let payload = serde_json::to_vec(input).map_err(|source| ExternalError::Output {
            program: self.name.clone(),
            source,
        })?;
        let spawn_error = |source| ExternalError::Spawn {
            program: self.name.clone(),
            source,
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        // Input is one subtitle line; writing it all before reading cannot
        // fill the pipe. A helper that exits without reading is judged by its
        // exit status instead.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&payload).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(spawn_error(e));
                }
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExternalError::Timeout {
                program: self.name.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(spawn_error)?;

        if !output.status.success() {
            return Err(ExternalError::Exit {
                program: self.name.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(program = %self.name, bytes = output.stdout.len(), "Helper finished");
        serde_json::from_slice(&output.stdout).map_err(|source| ExternalError::Output {
            program: self.name.clone(),
            source,
        })
    }
}

#[derive(Serialize)]
struct AnalyzerInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ConverterInput<'a> {
    text: &'a str,
    #[serde(flatten)]
    options: ConvertOptions,
}

#[derive(Deserialize)]
struct ConverterOutput {
    markup: String,
}

/// Morphological analyzer backed by a helper program
pub struct CommandAnalyzer {
    runner: CommandRunner,
}

impl CommandAnalyzer {
    /// `None` when `[analyzer] command` is unset
    #[must_use]
    pub fn from_config(config: &CommandConfig) -> Option<Self> {
        CommandRunner::from_config(config).map(|runner| Self { runner })
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn parse(&self, text: &str) -> Result<Vec<Token>, ExternalError> {
        self.runner.call(&AnalyzerInput { text }).await
    }
}

/// Reading converter backed by a helper program
pub struct CommandConverter {
    runner: CommandRunner,
}

impl CommandConverter {
    /// `None` when `[converter] command` is unset
    #[must_use]
    pub fn from_config(config: &CommandConfig) -> Option<Self> {
        CommandRunner::from_config(config).map(|runner| Self { runner })
    }
}

#[async_trait]
impl ReadingConverter for CommandConverter {
    async fn convert(&self, text: &str, options: ConvertOptions) -> Result<String, ExternalError> {
        let output: ConverterOutput = self.runner.call(&ConverterInput { text, options }).await?;
        Ok(output.markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str) -> CommandConfig {
        CommandConfig {
            command: Some("sh".to_string()),
            args: vec!["-c".to_string(), script.to_string()],
            timeout_secs: 2,
        }
    }

    #[test]
    fn unset_command_disables_helper() {
        assert!(CommandAnalyzer::from_config(&CommandConfig::default()).is_none());
        let blank = CommandConfig {
            command: Some("  ".to_string()),
            ..CommandConfig::default()
        };
        assert!(CommandConverter::from_config(&blank).is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn analyzer_reads_tokens_from_stdout() {
        let analyzer = CommandAnalyzer::from_config(&shell(
            r#"cat >/dev/null; printf '[{"surfaceForm":"猫","reading":"ネコ","partOfSpeech":"名詞"}]'"#,
        ))
        .unwrap();
        let tokens = analyzer.parse("猫").await.unwrap();
        assert_eq!(tokens, vec![Token::new("猫", "ネコ", "名詞")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn converter_receives_text_and_options() {
        let converter = CommandConverter::from_config(&shell(
            r#"input=$(cat); case "$input" in *'"mode":"furigana","to":"hiragana"'*) printf '{"markup":"<ruby>猫<rt>ねこ</rt></ruby>"}';; *) exit 1;; esac"#,
        ))
        .unwrap();
        let markup = converter
            .convert("猫", ConvertOptions::default())
            .await
            .unwrap();
        assert_eq!(markup, "<ruby>猫<rt>ねこ</rt></ruby>");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let analyzer = CommandAnalyzer::from_config(&shell("cat >/dev/null; echo broken >&2; exit 3")).unwrap();
        let err = analyzer.parse("猫").await.unwrap_err();
        assert!(matches!(err, ExternalError::Exit { ref stderr, .. } if stderr == "broken"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn invalid_output_is_reported() {
        let analyzer = CommandAnalyzer::from_config(&shell("cat >/dev/null; echo nope")).unwrap();
        assert!(matches!(
            analyzer.parse("猫").await,
            Err(ExternalError::Output { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_helper_times_out() {
        let mut config = shell("sleep 5");
        config.timeout_secs = 1;
        let analyzer = CommandAnalyzer::from_config(&config).unwrap();
        assert!(matches!(
            analyzer.parse("猫").await,
            Err(ExternalError::Timeout { secs: 1, .. })
        ));
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let config = CommandConfig {
            command: Some("/nonexistent/subgloss-analyzer".to_string()),
            ..CommandConfig::default()
        };
        let analyzer = CommandAnalyzer::from_config(&config).unwrap();
        assert!(matches!(
            analyzer.parse("猫").await,
            Err(ExternalError::Spawn { .. })
        ));
    }
}
