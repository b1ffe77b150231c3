use projectpages_settings::{PluginSettings, SettingsStore};
use std::fs;
use tempfile::tempdir;

#[test]
fn load_missing_file_returns_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");

    let store = SettingsStore::load(&path).expect("load defaults");
    assert_eq!(store.settings().rename.last_template(), "page");
    assert_eq!(store.settings().export.extension, "png");
    assert_eq!(store.settings().export.max_edge, None);
    assert!(store.settings().close.delete_working_dir);
    assert!(!path.exists());
}

#[test]
fn save_and_reload_roundtrip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");

    let mut store = SettingsStore::new(path.clone(), PluginSettings::default());
    store
        .update(|settings| {
            settings.export.extension = "jpg".to_string();
            settings.export.max_edge = Some(2048);
            settings.close.delete_working_dir = false;
        })
        .expect("save");
    store.remember_rename_template("chapter").expect("remember");

    let reloaded = SettingsStore::load(&path).expect("reload");
    assert_eq!(reloaded.settings().export.extension, "jpg");
    assert_eq!(reloaded.settings().export.max_edge, Some(2048));
    assert!(!reloaded.settings().close.delete_working_dir);
    assert_eq!(
        reloaded.settings().rename.history,
        vec!["chapter".to_string(), "page".to_string()]
    );
}

#[test]
fn corrupt_file_is_replaced_with_defaults() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(&path, "{ not json").expect("write corrupt");

    let store = SettingsStore::load(&path).expect("self-heal");
    assert_eq!(store.settings(), &PluginSettings::default());

    let rewritten = fs::read_to_string(&path).expect("read back");
    let parsed: PluginSettings = serde_json::from_str(&rewritten).expect("valid json");
    assert_eq!(parsed, PluginSettings::default());
}

#[test]
fn partial_file_fills_missing_fields_and_sanitizes() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");
    fs::write(
        &path,
        r#"{
  "version": 0,
  "export": { "extension": "", "max_edge": 0 }
}"#,
    )
    .expect("write legacy");

    let store = SettingsStore::load(&path).expect("load");
    let settings = store.settings();
    assert_eq!(settings.version, 1);
    assert_eq!(settings.export.extension, "png");
    assert_eq!(settings.export.max_edge, None);
    assert_eq!(settings.rename.last_template(), "page");

    let persisted = fs::read_to_string(&path).expect("read back");
    assert!(persisted.contains("\"version\": 1"));
}
