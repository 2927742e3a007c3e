#[cfg(test)]
mod tests {
    use crate::config::*;
    use std::env;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_valid() {
        let config = PulseConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.buffer.window_sec, 20.0);
        assert_eq!(config.estimator.min_analysis_window_sec, 5.0);
    }

    #[test]
    fn test_config_validation_gate() {
        let mut config = PulseConfig::default();

        config.gate.min_coverage = 0.0;
        assert!(config.validate().is_err());

        config.gate.min_coverage = 0.9;
        config.gate.dark_level = 0.9;
        config.gate.saturation_level = 0.5;
        assert!(config.validate().is_err());

        config.gate.dark_level = 0.02;
        config.gate.saturation_level = 0.995;
        config.gate.noise_floor = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_estimator() {
        let mut config = PulseConfig::default();

        // Band must be ordered
        config.estimator.min_bpm = 180.0;
        config.estimator.max_bpm = 40.0;
        assert!(config.validate().is_err());

        // Resample rate below Nyquist for 180 BPM (3 Hz)
        config.estimator.min_bpm = 40.0;
        config.estimator.max_bpm = 180.0;
        config.estimator.resample_hz = 5.0;
        assert!(config.validate().is_err());

        // Analysis window cannot exceed the buffer
        config.estimator.resample_hz = 30.0;
        config.estimator.min_analysis_window_sec = 25.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml_partial() {
        let toml = r#"
            [buffer]
            window_sec = 15.0

            [estimator]
            method = "Autocorrelation"
            max_step_bpm = 2.0
        "#;
        let config = PulseConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.buffer.window_sec, 15.0);
        assert_eq!(config.estimator.method, PeriodicityMethod::Autocorrelation);
        assert_eq!(config.estimator.max_step_bpm, 2.0);
        // Unspecified sections fall back to defaults
        assert_eq!(config.gate, GateConfig::default());
    }

    #[test]
    fn test_config_from_file_rejects_invalid() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[buffer]\nwindow_sec = -1.0").unwrap();
        let result = PulseConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_config_from_file_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[buffer\nwindow_sec = ").unwrap();
        let result = PulseConfig::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_config_roundtrip_toml_string() {
        let config = PulseConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed = PulseConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_shipped_default_config_loads() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/pulse.toml");
        let config = PulseConfig::load_layered(Some(&path), None).unwrap();
        assert_eq!(config.estimator.min_bpm, 40.0);
        assert_eq!(config.estimator.max_bpm, 180.0);
        assert_eq!(config.estimator.min_confidence, 0.6);
    }

    #[test]
    fn test_layered_user_file_overlays_default_file() {
        let mut defaults = NamedTempFile::new().unwrap();
        writeln!(
            defaults,
            "[gate]\nmin_coverage = 0.8\n\n[estimator]\nmin_bpm = 45.0\nmax_step_bpm = 3.0"
        )
        .unwrap();
        let mut user = NamedTempFile::new().unwrap();
        writeln!(user, "[estimator]\nmax_step_bpm = 2.0").unwrap();

        let config = PulseConfig::load_layered(Some(defaults.path()), Some(user.path())).unwrap();
        // Values the user file does not name come from the default file
        assert_eq!(config.gate.min_coverage, 0.8);
        assert_eq!(config.estimator.min_bpm, 45.0);
        assert_eq!(config.estimator.max_step_bpm, 2.0);
        assert_eq!(config.buffer, BufferConfig::default());
    }

    #[test]
    fn test_layered_user_parse_error() {
        let mut user = NamedTempFile::new().unwrap();
        writeln!(user, "[estimator\nmax_step_bpm = ").unwrap();
        let result = PulseConfig::load_layered(None, Some(user.path()));
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_env_override() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[gate]\nmin_valid_duration_sec = 3.0").unwrap();

        env::set_var("ZENB_PULSE_GATE_MIN_VALID_DURATION_SEC", "4.5");
        let config = PulseConfig::from_file_with_env(file.path());
        env::remove_var("ZENB_PULSE_GATE_MIN_VALID_DURATION_SEC");

        assert_eq!(config.unwrap().gate.min_valid_duration_sec, 4.5);
    }

    #[test]
    fn test_layered_missing_files_use_defaults() {
        let config = PulseConfig::load_layered(
            Some(std::path::Path::new("/nonexistent/pulse.toml")),
            None,
        )
        .unwrap();
        assert_eq!(config.buffer, BufferConfig::default());
    }
}
