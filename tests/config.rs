use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use gicat_driver::config::{Config, ConfigLoader, ConfigOverrides, HarvestSettings};
use gicat_driver::error::GiCatError;

fn file_config() -> Config {
    Config {
        base_url: Some("http://file.example/gi-cat".to_string()),
        username: Some("file-user".to_string()),
        password: Some("file-pass".to_string()),
        harvest_timeout_secs: Some(900),
        poll_interval_secs: Some(5),
        request_timeout_secs: Some(30),
    }
}

#[test]
fn reads_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("gicat.json")).unwrap();
    fs::write(
        &path,
        r#"{ "base_url": "http://localhost:8080/gi-cat/", "username": "admin", "password": "abcd123$" }"#,
    )
    .unwrap();

    let config = ConfigLoader::read(&path).unwrap();
    let resolved =
        ConfigLoader::resolve_config(config, ConfigOverrides::default(), ConfigOverrides::default())
            .unwrap();

    assert_eq!(resolved.endpoint().base_url(), "http://localhost:8080/gi-cat");
    assert_eq!(resolved.username, "admin");
    assert_eq!(resolved.harvest, HarvestSettings::default());
    assert_eq!(resolved.harvest.timeout, Duration::from_secs(1500));
}

#[test]
fn missing_file_and_bad_json_are_distinct_errors() {
    let dir = tempfile::tempdir().unwrap();
    let missing = Utf8PathBuf::from_path_buf(dir.path().join("absent.json")).unwrap();
    assert_matches!(ConfigLoader::read(&missing), Err(GiCatError::ConfigRead(_)));

    let broken = Utf8PathBuf::from_path_buf(dir.path().join("broken.json")).unwrap();
    fs::write(&broken, "{ base_url: ").unwrap();
    assert_matches!(ConfigLoader::read(&broken), Err(GiCatError::ConfigParse(_)));
}

#[test]
fn command_line_beats_environment_beats_file() {
    let env = ConfigOverrides {
        base_url: Some("http://env.example/gi-cat".to_string()),
        username: Some("env-user".to_string()),
        poll_interval_secs: Some(3),
        ..ConfigOverrides::default()
    };
    let cli = ConfigOverrides {
        base_url: Some("https://cli.example/gi-cat".to_string()),
        ..ConfigOverrides::default()
    };

    let resolved = ConfigLoader::resolve_config(file_config(), env, cli).unwrap();

    assert_eq!(resolved.base_url, "https://cli.example/gi-cat");
    assert_eq!(resolved.username, "env-user");
    assert_eq!(resolved.password, "file-pass");
    assert_eq!(resolved.harvest.poll_interval, Duration::from_secs(3));
    assert_eq!(resolved.harvest.timeout, Duration::from_secs(900));
    assert_eq!(resolved.request_timeout, Duration::from_secs(30));
}

#[test]
fn base_url_is_required() {
    let err = ConfigLoader::resolve_config(
        Config::default(),
        ConfigOverrides::default(),
        ConfigOverrides {
            base_url: Some("   ".to_string()),
            ..ConfigOverrides::default()
        },
    )
    .unwrap_err();
    assert_matches!(err, GiCatError::MissingConfig);
}

#[test]
fn rejects_non_http_urls_and_zero_poll_interval() {
    let ftp = Config {
        base_url: Some("ftp://gicat.example".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(ftp, ConfigOverrides::default(), ConfigOverrides::default()),
        Err(GiCatError::InvalidConfig(_))
    );

    let cli = ConfigOverrides {
        poll_interval_secs: Some(0),
        ..ConfigOverrides::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(file_config(), ConfigOverrides::default(), cli),
        Err(GiCatError::InvalidConfig(_))
    );
}
