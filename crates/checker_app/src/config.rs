use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use checker_core::RunConfig;
use checker_engine::ProbeSettings;
use checker_logging::checker_info;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Everything a run needs besides its input, as stored in a RON file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub run: RunConfig,
    pub probe: ProbeSettings,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = ron::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        checker_info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Loads the config named on the command line (or defaults), applies the
    /// flag overrides and validates the result.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_cli(cli)?;
        config
            .run
            .validate()
            .context("invalid run configuration")?;
        Ok(config)
    }

    fn apply_cli(&mut self, cli: &Cli) -> Result<()> {
        if let Some(endpoint) = &cli.endpoint {
            self.probe.endpoint = endpoint.clone();
        }
        for raw in &cli.headers {
            let (name, value) = parse_header(raw)?;
            self.probe
                .headers
                .retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
            self.probe.headers.push((name, value));
        }
        if let Some(concurrency) = cli.concurrency {
            self.run.concurrency = concurrency;
        }
        if let Some(max_retries) = cli.max_retries {
            self.run.max_retries = max_retries;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            let timeout = Duration::from_millis(timeout_ms);
            self.run.probe_timeout = timeout;
            self.probe.request_timeout = timeout;
        }
        if cli.retry_malformed {
            self.run.retry_malformed = true;
        }
        Ok(())
    }
}

fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header {raw:?} must look like \"Name: value\"");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header {raw:?} has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn cli() -> Cli {
        Cli {
            input: PathBuf::from("handles.csv"),
            ..Cli::default()
        }
    }

    #[test]
    fn ron_file_overrides_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("checker.ron");
        fs::write(
            &path,
            r#"(
                run: (
                    concurrency: 3,
                    probe_timeout: 1500,
                    backoff: (initial_delay: 250, max_delay: 4000),
                ),
                probe: (
                    endpoint: "https://lookup.example.com/users?name={key}",
                    headers: [("X-Api-Key", "secret")],
                ),
            )"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.run.concurrency, 3);
        assert_eq!(config.run.probe_timeout, Duration::from_millis(1500));
        assert_eq!(config.run.backoff.initial_delay, Duration::from_millis(250));
        assert_eq!(config.run.backoff.growth_factor, 2.0);
        assert_eq!(config.run.max_retries, RunConfig::default().max_retries);
        assert_eq!(
            config.probe.headers,
            vec![("X-Api-Key".to_string(), "secret".to_string())]
        );
        assert_eq!(config.probe.record_path, "data.user");
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = AppConfig::default();
        config
            .probe
            .headers
            .push(("x-api-key".to_string(), "old".to_string()));
        let cli = Cli {
            endpoint: Some("https://lookup.example.com/{key}".to_string()),
            headers: vec!["X-Api-Key:  new ".to_string()],
            concurrency: Some(8),
            max_retries: Some(2),
            timeout_ms: Some(900),
            retry_malformed: true,
            ..cli()
        };

        config.apply_cli(&cli).unwrap();

        assert_eq!(config.probe.endpoint, "https://lookup.example.com/{key}");
        let api_keys: Vec<_> = config
            .probe
            .headers
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case("x-api-key"))
            .collect();
        assert_eq!(api_keys, vec![&("X-Api-Key".to_string(), "new".to_string())]);
        assert_eq!(config.run.concurrency, 8);
        assert_eq!(config.run.max_retries, 2);
        assert_eq!(config.run.probe_timeout, Duration::from_millis(900));
        assert_eq!(config.probe.request_timeout, Duration::from_millis(900));
        assert!(config.run.retry_malformed);
    }

    #[test]
    fn malformed_header_flag_is_rejected() {
        let cli = Cli {
            headers: vec!["no-colon-here".to_string()],
            ..cli()
        };
        assert!(AppConfig::default().apply_cli(&cli).is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn invalid_overrides_fail_validation() {
        let cli = Cli {
            concurrency: Some(0),
            ..cli()
        };
        let err = AppConfig::resolve(&cli).unwrap_err();
        assert!(format!("{err:#}").contains("concurrency must be at least 1"));
    }

    #[test]
    fn missing_config_file_names_the_path() {
        let cli = Cli {
            config: Some(PathBuf::from("/nonexistent/checker.ron")),
            ..cli()
        };
        let err = AppConfig::resolve(&cli).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/checker.ron"));
    }
}
