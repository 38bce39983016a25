use chat_archiver::bot::run_bot;
use chat_archiver::config::Settings;
use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Secret patterns masked in every log line, with their replacements
const REDACTIONS: &[(&str, &str)] = &[
    (
        r"(https?://[^/]+/(?:file/)?bot)([0-9]+:[A-Za-z0-9_-]+)",
        "$1[TELEGRAM_TOKEN]",
    ),
    (r"[0-9]{8,10}:[A-Za-z0-9_-]{35}", "[TELEGRAM_TOKEN]"),
    (r"TELEGRAM_TOKEN=[^\s&]+", "TELEGRAM_TOKEN=[MASKED]"),
    (r"R2_ACCESS_KEY_ID=[^\s&]+", "R2_ACCESS_KEY_ID=[MASKED]"),
    (r"R2_SECRET_ACCESS_KEY=[^\s&]+", "R2_SECRET_ACCESS_KEY=[MASKED]"),
    (
        r"'aws_access_key_id': '[^']*'",
        "'aws_access_key_id': '[MASKED]'",
    ),
    (
        r"'aws_secret_access_key': '[^']*'",
        "'aws_secret_access_key': '[MASKED]'",
    ),
];

/// Compiled redaction rules
struct RedactionPatterns {
    rules: Vec<(Regex, &'static str)>,
}

impl RedactionPatterns {
    /// Compile all patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        let rules = REDACTIONS
            .iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, *replacement)))
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { rules })
    }

    fn redact(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, *replacement).into_owned()
            })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = self.patterns.redact(&String::from_utf8_lossy(buf));
        self.inner.write_all(redacted.as_bytes())?;
        // Report the caller's length; the redacted text may be shorter
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: Arc::clone(&self.patterns),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);
    init_logging(patterns);

    info!("Starting chat archiver...");

    let settings = init_settings();
    run_bot(settings).await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Arc<Settings> {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_bot_token_in_api_url() {
        let patterns = RedactionPatterns::new().expect("patterns compile");
        let line = "GET https://api.telegram.org/bot123456789:AAH-token_value/getFile failed";
        let redacted = patterns.redact(line);

        assert!(!redacted.contains("AAH-token_value"));
        assert!(redacted.contains("https://api.telegram.org/bot[TELEGRAM_TOKEN]/getFile"));
    }

    #[test]
    fn test_masks_r2_credentials() {
        let patterns = RedactionPatterns::new().expect("patterns compile");
        let redacted = patterns.redact("R2_ACCESS_KEY_ID=abc R2_SECRET_ACCESS_KEY=xyz");

        assert_eq!(
            redacted,
            "R2_ACCESS_KEY_ID=[MASKED] R2_SECRET_ACCESS_KEY=[MASKED]"
        );
    }

    #[test]
    fn test_plain_text_untouched() {
        let patterns = RedactionPatterns::new().expect("patterns compile");
        assert_eq!(patterns.redact("uploaded 3 files"), "uploaded 3 files");
    }
}
