use nightswap_config::{Config, ConfigError, ConfigManager};
use tempfile::tempdir;

#[test]
fn default_config_has_sensible_values() {
    let cfg = Config::default();

    assert_eq!(cfg.currency, "USD");
    assert_eq!(cfg.request_ttl_hours, 48);
    assert_eq!(cfg.backup_retention, 5);
    assert_eq!(cfg.log_filter, "nightswap=info");
    assert!(cfg.resolve_data_root().ends_with("nightswap"));
}

#[test]
fn missing_file_loads_defaults() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");

    assert_eq!(manager.load().expect("load"), Config::default());
}

#[test]
fn config_manager_persists_and_loads_config() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"), dir.path().join("backups"));

    let mut cfg = Config::default();
    cfg.currency = "EUR".to_string();
    cfg.request_ttl_hours = 12;
    cfg.data_root = Some(dir.path().join("leases"));

    manager.save(&cfg).expect("save config");
    let loaded = manager.load().expect("load config");

    assert_eq!(loaded, cfg);
    assert_eq!(loaded.resolve_data_root(), dir.path().join("leases"));
    assert!(!dir.path().join("config.json.tmp").exists());
}

#[test]
fn older_files_pick_up_new_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "locale": "en-GB", "currency": "GBP" }"#).expect("write");
    let manager = ConfigManager::new(path, dir.path().join("backups"));

    let loaded = manager.load().expect("load");
    assert_eq!(loaded.currency, "GBP");
    assert_eq!(loaded.request_ttl_hours, 48);
    assert!(loaded.ui_color_enabled);
}

#[test]
fn invalid_values_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::new(dir.path().join("config.json"), dir.path().join("backups"));

    let mut cfg = Config::default();
    cfg.request_ttl_hours = 0;
    assert!(matches!(manager.save(&cfg), Err(ConfigError::Invalid(_))));
}

#[test]
fn backups_round_trip_and_list() {
    let dir = tempdir().expect("tempdir");
    let manager = ConfigManager::with_base_dir(dir.path().to_path_buf()).expect("manager");

    let mut cfg = Config::default();
    cfg.locale = "fr-FR".into();
    let name = manager.backup(&cfg, Some("before move")).expect("backup");
    assert!(name.ends_with("_before-move.json"));

    assert_eq!(manager.list_backups().expect("list"), vec![name.clone()]);
    assert_eq!(manager.restore(&name).expect("restore").locale, "fr-FR");
    assert!(manager.restore("missing.json").is_err());
}
