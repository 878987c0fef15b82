use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.embedding.host = "test-host".to_string();
        original_config.embedding.port = 8080;
        original_config.llm.model = "llama3:8b".to_string();
        original_config.vector_store.backend = VectorBackend::Lancedb;

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [embedding
            host = "localhost"
            port = "invalid_port"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_unparseable_file() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        fs::write(temp_dir.path().join("config.toml"), "[chunking]\nchunk_size = \"big\"\n")
            .expect("should write config");

        let result = Config::load_with_env(temp_dir.path(), |_| None);
        let message = format!("{:#}", result.expect_err("load should fail"));
        assert!(message.contains("Failed to parse config file"), "{}", message);
    }

    #[test]
    fn show_config_renders() {
        let config = Config::default();
        assert!(show_config(&config).is_ok());
    }
}
