#[cfg(test)]
mod tests {
    use crate::archive::{Pacing, DEFAULT_CHUNK_SIZE};
    use crate::config::{self, AppConfig, Overrides};
    use std::env;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_temp_config(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("custom.toml");
        fs::write(&path, content).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_valid_config_does_not_error() {
        let result = config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.index_file, "index.html");
        assert_eq!(config.archive.root, "test_photos");
        assert_eq!(config.archive.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.archive.delay_secs, 0.0);
        assert_eq!(config.archive.request_timeout(), None);
        assert_eq!(config.archive.archiver.program, "zip");
        assert_eq!(config.archive.archiver.args, vec!["-r", "-", "."]);
        assert!(!config.logging.enabled);
        assert!(config.security.is_none());
    }

    #[test]
    fn test_default_pacing() {
        let config = AppConfig::default();
        assert_eq!(config.archive.pacing(), Pacing::default());
        assert_eq!(Pacing::default().chunk_size, 500 * 1024);
        assert_eq!(Pacing::default().delay, Duration::ZERO);
    }

    #[test]
    fn test_command_line_overrides() {
        let overrides = Overrides {
            root: Some("/srv/photos".to_string()),
            delay_secs: Some(1.5),
            chunk_size: Some(4096),
            port: Some(9000),
            logging: true,
            ..Default::default()
        };
        let config = config::load_with(&overrides).unwrap();

        assert_eq!(config.archive.root, "/srv/photos");
        assert_eq!(config.archive.chunk_size, 4096);
        assert_eq!(config.server.port, 9000);
        assert!(config.logging.enabled);
        assert_eq!(
            config.archive.pacing(),
            Pacing { chunk_size: 4096, delay: Duration::from_millis(1500) }
        );
    }

    #[test]
    fn test_invalid_server_port() {
        let overrides = Overrides { port: Some(0), ..Default::default() };
        let result = config::load_with(&overrides);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("invalid server.port"));
    }

    #[test]
    fn test_invalid_pacing_is_rejected() {
        let overrides = Overrides { chunk_size: Some(0), ..Default::default() };
        assert!(config::load_with(&overrides).is_err());

        let overrides = Overrides { delay_secs: Some(-1.0), ..Default::default() };
        let err = config::load_with(&overrides).unwrap_err();
        assert!(err.to_string().contains("delay_secs"));

        let mut cfg = AppConfig::default();
        cfg.archive.chunk_size = config::MAX_CHUNK_SIZE + 1;
        assert!(config::validate(&cfg).is_err());

        let mut cfg = AppConfig::default();
        cfg.archive.delay_secs = f64::NAN;
        assert!(config::validate(&cfg).is_err());

        // Finite but too large for a Duration
        let overrides = Overrides { delay_secs: Some(1e30), ..Default::default() };
        let err = config::load_with(&overrides).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_empty_archiver_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.archive.archiver.program = "  ".to_string();
        let err = config::validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("archiver.program"));
    }

    #[test]
    fn test_config_file_override() {
        let dir = TempDir::new().unwrap();
        let path = write_temp_config(
            &dir,
            r#"
[archive]
chunk_size = 1024
request_timeout_secs = 30

[archive.archiver]
program = "/usr/bin/zip"
args = ["-q", "-r", "-", "."]

[security]
enable_hsts = true
"#,
        );
        let overrides = Overrides { config_file: Some(path), ..Default::default() };
        let config = config::load_with(&overrides).unwrap();

        assert_eq!(config.archive.chunk_size, 1024);
        assert_eq!(config.archive.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.archive.archiver.program, "/usr/bin/zip");
        assert_eq!(config.archive.archiver.args.len(), 4);
        assert_eq!(config.security.unwrap().enable_hsts, Some(true));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let overrides = Overrides { config_file: Some("/nonexistent/zipstream".to_string()), ..Default::default() };
        assert!(config::load_with(&overrides).is_err());
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("ZIPSTREAM__SERVER__HOST", "0.0.0.0");

        let config = config::load().unwrap();
        assert_eq!(config.server.host, "0.0.0.0");

        // Command line beats the environment
        let overrides = Overrides { host: Some("127.0.0.2".to_string()), ..Default::default() };
        let config = config::load_with(&overrides).unwrap();
        assert_eq!(config.server.host, "127.0.0.2");

        env::remove_var("ZIPSTREAM__SERVER__HOST");
    }
}
