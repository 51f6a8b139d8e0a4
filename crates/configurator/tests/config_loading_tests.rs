//! Loading and validating configuration directories from disk.

mod common;

use std::collections::BTreeSet;
use std::time::Duration;

use common::{
    profile_yaml, service_yaml, template_file_yaml, template_yaml, SettingsBuilder, TestHarness,
};
use configurator::engine::NextState;
use configurator::error::ConfigError;
use configurator::template::TemplateSource;

fn write_valid(h: &TestHarness) {
    h.write_config(
        "settings.yaml",
        &SettingsBuilder::new()
            .retry_count(5)
            .retry_wait(7)
            .refresh_interval(30)
            .concurrency(2)
            .build(),
    );
    h.write_config("profiles/web.yaml", &profile_yaml("web", "web-app"));
    h.write_config(
        "templates/site.yaml",
        &template_yaml("site", "{{ web.host }}", "nginx/site.conf", &["web"]),
    );
    h.write_config("services/nginx.yaml", &service_yaml("nginx", &["site"]));
}

#[test]
fn test_valid_directory_builds_memory() {
    let h = TestHarness::new();
    write_valid(&h);
    // Ignored: hidden and non-YAML files.
    h.write_config(".hidden.yaml", "not: [valid");
    h.write_config("README.md", "# notes");

    let config = configurator::config::load(&h.config_dir).expect("config should load");
    assert_eq!(config.profiles.len(), 1);
    assert_eq!(config.templates.len(), 1);
    assert_eq!(config.services.len(), 1);

    let memory = config.build_memory(h.source.clone(), h.services.clone());
    assert_eq!(memory.retry_count, 5);
    assert_eq!(memory.retry_wait, Duration::from_secs(7));
    assert_eq!(memory.refresh_interval, Duration::from_secs(30));
    assert_eq!(memory.source_concurrency, 2);
    assert_eq!(memory.client_id, "integration");
    assert_eq!(memory.profile_defs["web"].application, "web-app");
    assert_eq!(memory.service_defs["nginx"].unit, "nginx.service");
    assert_eq!(
        memory.dependencies.services_for_profile("web"),
        BTreeSet::from(["nginx".to_string()])
    );
    assert_eq!(memory.next_state, NextState::Starting);
}

#[test]
fn test_invalid_directories_are_rejected() {
    type Setup = fn(&TestHarness);
    type Check = fn(&ConfigError) -> bool;

    let cases: [(&str, Setup, Check); 6] = [
        (
            "duplicate profile name",
            |h: &TestHarness| {
                h.write_config("a.yaml", &profile_yaml("web", "one"));
                h.write_config("b.yaml", &profile_yaml("web", "two"));
            },
            |e: &ConfigError| matches!(e, ConfigError::DuplicateName { name, .. } if name == "web"),
        ),
        (
            "template references missing profile",
            |h: &TestHarness| {
                h.write_config(
                    "site.yaml",
                    &template_yaml("site", "{{ db.url }}", "site.conf", &["db"]),
                );
            },
            |e: &ConfigError| matches!(e, ConfigError::UnknownReference { target, .. } if target == "db"),
        ),
        (
            "service references missing template",
            |h: &TestHarness| {
                h.write_config("nginx.yaml", &service_yaml("nginx", &["site"]));
            },
            |e: &ConfigError| matches!(e, ConfigError::UnknownReference { target, .. } if target == "site"),
        ),
        (
            "wrong api version",
            |h: &TestHarness| {
                let yaml = profile_yaml("web", "web").replace("configurator.io/v1", "other.io/v2");
                h.write_config("web.yaml", &yaml);
            },
            |e: &ConfigError| matches!(e, ConfigError::InvalidApiVersion { version, .. } if version == "other.io/v2"),
        ),
        (
            "profile name is not a symbol",
            |h: &TestHarness| {
                h.write_config("web.yaml", &profile_yaml("web-app", "web"));
            },
            |e: &ConfigError| matches!(e, ConfigError::InvalidName { name, .. } if name == "web-app"),
        ),
        (
            "malformed yaml",
            |h: &TestHarness| {
                h.write_config("broken.yaml", "apiVersion: [unclosed");
            },
            |e: &ConfigError| matches!(e, ConfigError::ParseYaml { .. }),
        ),
    ];

    for (name, setup, check) in cases {
        let h = TestHarness::new();
        setup(&h);
        match configurator::config::load(&h.config_dir) {
            Ok(_) => panic!("case '{}': expected an error", name),
            Err(e) => assert!(check(&e), "case '{}': unexpected error {:?}", name, e),
        }
    }
}

#[test]
fn test_missing_directory() {
    let h = TestHarness::new();
    let result = configurator::config::load(h.temp_path().join("absent"));
    assert!(matches!(result, Err(ConfigError::DirectoryNotFound(_))));
}

#[tokio::test]
async fn test_file_template_resolves_against_config_dir() {
    let h = TestHarness::new();
    h.write_config("settings.yaml", &SettingsBuilder::new().retry_count(0).build());
    h.write_config("profiles/web.yaml", &profile_yaml("web", "web"));
    h.write_config("files/site.conf.tmpl", "listen {{ web.port }};\n");
    h.write_config(
        "templates/site.yaml",
        &template_file_yaml("site", "files/site.conf.tmpl", "site.conf", &["web"]),
    );
    h.source
        .updated("web", "3", r#"{"port": 8443}"#, "application/json");

    let config = configurator::config::load(&h.config_dir).expect("config should load");
    let defs = config.template_defs();
    assert_eq!(
        defs["site"].source,
        TemplateSource::File(h.config_dir.join("files/site.conf.tmpl"))
    );

    let mut engine = h.single_shot();
    engine.run().await;

    assert!(!engine.has_errors());
    assert_eq!(h.read_output("site.conf"), "listen 8443;\n");
    assert!(h.services.calls().is_empty());
}
