//! Configuration loader for the Howell coordination daemon (spec.md §6):
//! built-in defaults, then an optional TOML file, then `HOWELL_`-prefixed
//! environment variables, then explicit CLI flags — each layer
//! overriding the last, following the teacher's `config` crate +
//! `Environment::with_prefix` layering.

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use howell_core::Config;

/// CLI overrides applied after every other layer (highest precedence).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub persist_root: Option<String>,
    pub daemon_host: Option<String>,
    pub daemon_port: Option<u16>,
}

/// Load the daemon's [`Config`] document, layering defaults, an
/// optional TOML file, environment variables, then CLI overrides.
pub fn load(config_file: Option<&str>, overrides: &CliOverrides) -> Result<Config> {
    let defaults = Config::default();
    let mut builder = ConfigBuilder::builder()
        .add_source(config::Config::try_from(&defaults).context("failed to seed config defaults")?);

    if let Some(path) = config_file {
        builder = builder.add_source(File::with_name(path).required(false).format(FileFormat::Toml));
    }

    builder = builder.add_source(
        Environment::with_prefix("HOWELL")
            .separator("_")
            .try_parsing(true),
    );

    let built = builder.build().context("failed to build layered configuration")?;
    let mut cfg: Config = built
        .try_deserialize()
        .context("failed to deserialize configuration document")?;

    // HOWELL_PERSIST_ROOT and HOWELL_WATCH_DIRS get explicit handling
    // per spec.md §6: the former is already covered by the generic
    // Environment source above, restated here for clarity; the latter
    // needs colon/semicolon splitting the generic source can't do.
    if let Ok(root) = std::env::var("HOWELL_PERSIST_ROOT") {
        cfg.persist_root = root;
    }
    if let Ok(dirs) = std::env::var("HOWELL_WATCH_DIRS") {
        cfg.watch_dirs = dirs
            .split(|c| c == ':' || c == ';')
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .collect();
    }

    if let Some(ref root) = overrides.persist_root {
        cfg.persist_root = root.clone();
    }
    if let Some(ref host) = overrides.daemon_host {
        cfg.daemon_host = host.clone();
    }
    if let Some(port) = overrides.daemon_port {
        cfg.daemon_port = port;
    }

    cfg.validate().context("configuration failed validation")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_with_no_file_or_env_returns_defaults() {
        let cfg = load(None, &CliOverrides::default()).unwrap();
        assert_eq!(cfg.daemon_port, 7777);
    }

    #[test]
    fn cli_overrides_win_over_defaults() {
        let overrides = CliOverrides {
            persist_root: Some("/tmp/howell-test".to_string()),
            daemon_host: None,
            daemon_port: Some(9999),
        };
        let cfg = load(None, &overrides).unwrap();
        assert_eq!(cfg.persist_root, "/tmp/howell-test");
        assert_eq!(cfg.daemon_port, 9999);
    }

    #[test]
    fn watch_dirs_env_var_splits_on_colon() {
        std::env::set_var("HOWELL_WATCH_DIRS", "/a:/b:/c");
        let cfg = load(None, &CliOverrides::default()).unwrap();
        std::env::remove_var("HOWELL_WATCH_DIRS");
        assert_eq!(cfg.watch_dirs, vec!["/a", "/b", "/c"]);
    }
}
