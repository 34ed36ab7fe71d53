use super::*;
use crate::{ModelProvider, PlanningConfig};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tenderflow_protocol::DiagramKind;

fn write_json5(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}

/// A project dir with a `.git` marker and a nested working dir.
fn project_tree(temp: &TempDir) -> (PathBuf, PathBuf) {
    let project_root = temp.path().join("project");
    fs::create_dir_all(project_root.join(".git")).expect("git");
    let cwd = project_root.join("tenders");
    fs::create_dir_all(&cwd).expect("cwd");
    (project_root, cwd)
}

fn isolated_options(cwd: &Path) -> LayeredConfigOptions {
    let mut options = LayeredConfigOptions::new(cwd);
    options.system_config_path = None;
    options.user_config_path = None;
    options
}

#[test]
fn empty_config_uses_defaults() {
    let config = TenderflowConfig::load_from_str("{}").expect("config");
    assert_eq!(config.memory.backend, MemoryBackend::File);
    assert_eq!(config.model.provider, ModelProvider::Openai);
    assert_eq!(config.model.api_key_env, "OPENAI_API_KEY");
    assert_eq!(config.analysis.excerpt_chars, 1000);
    assert_eq!(config.planning, PlanningConfig::default());
    assert_eq!(config.workflow.diagrams.len(), 6);
}

#[test]
fn rejects_unknown_top_level_key() {
    let err = TenderflowConfig::load_from_str("{ agents: {} }").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("config:agents"), "{msg}");
    assert!(msg.contains("unknown key"), "{msg}");
}

#[test]
fn rejects_unknown_memory_backend() {
    let err = TenderflowConfig::load_from_str(r#"{ memory: { backend: "redis" } }"#).unwrap_err();
    assert!(err.to_string().contains("memory.backend"));
}

#[test]
fn rejects_unknown_diagram_name() {
    let err = TenderflowConfig::load_from_str(
        r#"{ workflow: { diagrams: ["system_architecture", "gantt"] } }"#,
    )
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("workflow.diagrams[1]"), "{msg}");
    assert!(msg.contains("gantt"), "{msg}");
}

#[test]
fn rejects_duplicate_diagrams() {
    let err = TenderflowConfig::load_from_str(
        r#"{ workflow: { diagrams: ["sequence", "sequence"] } }"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn rejects_contingency_above_one() {
    let err = TenderflowConfig::load_from_str("{ planning: { contingency_rate: 1.5 } }")
        .unwrap_err();
    assert!(err.to_string().contains("contingency_rate"));
}

#[test]
fn parses_planning_start_date_and_diagrams() {
    let config = TenderflowConfig::load_from_str(
        r#"{
            // JSON5 comments are allowed
            planning: { start_date: "2026-01-05", hourly_rate: 90 },
            workflow: { diagrams: ["data_flow", "database_er"] },
            model: { provider: "offline" },
        }"#,
    )
    .expect("config");
    assert_eq!(
        config.planning.start_date,
        NaiveDate::from_ymd_opt(2026, 1, 5)
    );
    assert_eq!(config.planning.hourly_rate, 90.0);
    assert_eq!(
        config.workflow.diagrams,
        vec![DiagramKind::DataFlow, DiagramKind::DatabaseEr]
    );
    assert_eq!(config.model.provider, ModelProvider::Offline);
}

#[test]
fn rejects_malformed_start_date() {
    let err = TenderflowConfig::load_from_str(r#"{ planning: { start_date: "05/01/2026" } }"#)
        .unwrap_err();
    assert!(err.to_string().contains("planning.start_date"));
}

#[test]
fn layered_config_prefers_repo_over_cwd() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, cwd) = project_tree(&temp);

    let system_config = temp.path().join("system.json5");
    write_json5(&system_config, "{ analysis: { excerpt_chars: 10 } }");
    let user_config = temp.path().join("user.json5");
    write_json5(&user_config, "{ analysis: { excerpt_chars: 20 } }");
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ analysis: { excerpt_chars: 30 } }",
    );
    write_json5(
        &cwd.join(DEFAULT_CONFIG_FILE),
        "{ analysis: { excerpt_chars: 40 }, model: { name: \"cwd-model\" } }",
    );
    write_json5(
        &project_root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
        "{ analysis: { excerpt_chars: 50 } }",
    );

    let mut options = LayeredConfigOptions::new(&cwd);
    options.system_config_path = Some(system_config);
    options.user_config_path = Some(user_config);

    let layered = TenderflowConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.analysis.excerpt_chars, 50);
    // Keys only set in lower layers survive the merge.
    assert_eq!(layered.config.model.name, "cwd-model");
    let sources: Vec<_> = layered.layers.iter().map(|layer| layer.source).collect();
    assert_eq!(
        sources,
        vec![
            ConfigLayerSource::System,
            ConfigLayerSource::User,
            ConfigLayerSource::Project,
            ConfigLayerSource::Cwd,
            ConfigLayerSource::Repo,
        ]
    );
}

#[test]
fn runtime_override_is_applied_last() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, cwd) = project_tree(&temp);
    write_json5(
        &project_root.join(DEFAULT_CONFIG_DIR).join(DEFAULT_CONFIG_FILE),
        "{ memory: { backend: \"file\", path: \"/var/lib/tenderflow\" } }",
    );
    let runtime_config = temp.path().join("runtime.json5");
    write_json5(&runtime_config, "{ memory: { backend: \"in_memory\" } }");

    let options = isolated_options(&cwd).with_runtime_path(&runtime_config);
    let layered = TenderflowConfig::load_layered_with_options(options).expect("layered");
    assert_eq!(layered.config.memory.backend, MemoryBackend::InMemory);
    assert_eq!(
        layered.config.memory.path.as_deref(),
        Some("/var/lib/tenderflow")
    );
    assert_eq!(
        layered.layers.last().map(|layer| layer.source),
        Some(ConfigLayerSource::Runtime)
    );
}

#[test]
fn project_root_config_is_read_once_when_cwd_is_root() {
    let temp = TempDir::new().expect("tmp");
    let (project_root, _) = project_tree(&temp);
    write_json5(
        &project_root.join(DEFAULT_CONFIG_FILE),
        "{ analysis: { excerpt_chars: 64 } }",
    );

    let layered =
        TenderflowConfig::load_layered_with_options(isolated_options(&project_root))
            .expect("layered");
    assert_eq!(layered.layers.len(), 1);
    assert_eq!(layered.config.analysis.excerpt_chars, 64);
}

#[test]
fn invalid_layer_reports_its_source() {
    let temp = TempDir::new().expect("tmp");
    let (_, cwd) = project_tree(&temp);
    write_json5(&cwd.join(DEFAULT_CONFIG_FILE), "{ model: { timeout_secs: \"soon\" } }");

    let err = TenderflowConfig::load_layered_with_options(isolated_options(&cwd)).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("cwd("), "{msg}");
    assert!(msg.contains("model.timeout_secs"), "{msg}");
}

#[test]
fn builder_overrides_sections() {
    let config = TenderflowConfig::builder()
        .planning(PlanningConfig {
            hourly_rate: 100.0,
            ..PlanningConfig::default()
        })
        .build();
    assert_eq!(config.planning.hourly_rate, 100.0);
    config.validate().expect("valid");
}

#[test]
fn explicit_memory_path_resolves_verbatim() {
    let config =
        TenderflowConfig::load_from_str(r#"{ memory: { path: "/tmp/tf-memory" } }"#).expect("config");
    assert_eq!(
        config.memory.resolved_path().expect("path"),
        PathBuf::from("/tmp/tf-memory")
    );
}
