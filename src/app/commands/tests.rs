use super::*;

use crate::app::config::CONFIG_PATH_ENV;
use crate::app::error::ErrorCode;
use crate::app::state::WorkflowStep;
use crate::app::test_support::{write_apk, FakeAdb};

const LISTING: &str = "List of devices attached\n\
    ABC123 device usb:1-1 product:foo model:Pixel_4 transport_id:5\n\
    DEF456 device product:bar model:Pixel_7 transport_id:6\n\
    GHI789 unauthorized transport_id:7\n";

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    LOCK.get_or_init(|| std::sync::Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn config_with_packages(tmp: &tempfile::TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.provisioning.helper_apk = write_apk(tmp, "installer-release.apk")
        .to_string_lossy()
        .to_string();
    config.provisioning.app_apk = write_apk(tmp, "app-release.apk")
        .to_string_lossy()
        .to_string();
    config
}

#[test]
fn resolve_trace_id_keeps_caller_value() {
    assert_eq!(resolve_trace_id(Some("abc".to_string())), "abc");
    let generated = resolve_trace_id(Some("  ".to_string()));
    assert!(Uuid::parse_str(&generated).is_ok());
}

#[test]
fn list_devices_inner_updates_workflow_state() {
    let adb = FakeAdb::ok().with_devices(LISTING);
    let state = AppState::new();
    let devices =
        list_devices_inner(&adb, &AppConfig::default(), &state, "trace-1").expect("devices");
    assert_eq!(devices.len(), 2);

    let workflow = state.workflow();
    assert_eq!(workflow.targets.len(), 2);
    assert_eq!(workflow.targets[0].transport_id, "5");
    assert_eq!(workflow.current_step(), WorkflowStep::Install);
}

#[test]
fn run_stage_inner_without_ids_discovers_targets() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let adb = FakeAdb::ok().with_devices(LISTING);
    let state = AppState::new();
    let report = run_stage_inner(
        Stage::Install,
        Vec::new(),
        &adb,
        &config_with_packages(&tmp),
        &state,
        "trace-2",
    )
    .expect("report");

    assert_eq!(report.total, 2);
    assert!(report.all_succeeded());
    assert_eq!(adb.calls_for("5").len(), 2);
    assert_eq!(adb.calls_for("6").len(), 2);
    assert!(adb.calls_for("7").is_empty());
    assert_eq!(state.workflow().current_step(), WorkflowStep::Admin);
}

#[test]
fn run_stage_inner_with_explicit_ids_skips_discovery() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let adb = FakeAdb::ok().with_devices(LISTING);
    let state = AppState::new();
    let report = run_stage_inner(
        Stage::Finish,
        vec![" 9 ".to_string()],
        &adb,
        &config_with_packages(&tmp),
        &state,
        "trace-3",
    )
    .expect("report");

    assert_eq!(report.total, 1);
    assert!(report.results.contains_key("9"));
    assert!(adb.calls().iter().all(|(target, _)| target.is_some()));
}

#[test]
fn run_stage_inner_rejects_blank_ids() {
    let adb = FakeAdb::ok();
    let state = AppState::new();
    let err = run_stage_inner(
        Stage::Admin,
        vec!["5".to_string(), "   ".to_string()],
        &adb,
        &AppConfig::default(),
        &state,
        "trace-4",
    )
    .expect_err("expected validation error");
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(err.trace_id, "trace-4");
    assert!(adb.calls().is_empty());
}

#[test]
fn run_stage_inner_with_no_devices_does_nothing() {
    let adb = FakeAdb::ok();
    let state = AppState::new();
    let report = run_stage_inner(
        Stage::Finish,
        Vec::new(),
        &adb,
        &AppConfig::default(),
        &state,
        "trace-5",
    )
    .expect("report");
    assert_eq!(report.total, 0);
    // Only the discovery scan ran.
    assert_eq!(adb.calls().len(), 1);
}

#[test]
fn provision_inner_runs_every_stage_in_order() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let adb = FakeAdb::ok().with_devices(LISTING);
    let state = AppState::new();
    let reports =
        provision_inner(&adb, &config_with_packages(&tmp), &state, "trace-6").expect("reports");

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|r| r.all_succeeded()));
    let ops: Vec<String> = adb
        .calls_for("5")
        .into_iter()
        .map(|args| args[..2.min(args.len())].join(" "))
        .collect();
    assert_eq!(
        ops,
        vec![
            "install -r",
            "install -r",
            "shell dpm",
            "shell dpm",
            "shell am",
            "shell settings"
        ]
    );
    assert_eq!(state.workflow().current_step(), WorkflowStep::Done);
}

#[test]
fn get_and_reset_config_use_configured_path() {
    let _guard = env_lock();
    let tmp = tempfile::TempDir::new().expect("tmp");
    let path = tmp.path().join("config.json");
    std::env::set_var(CONFIG_PATH_ENV, &path);

    let loaded = get_config(Some("trace-7".to_string())).expect("config");
    assert_eq!(loaded.trace_id, "trace-7");
    assert_eq!(loaded.data, AppConfig::default());
    assert!(!path.exists());

    reset_config(Some("trace-8".to_string())).expect("reset");
    assert!(path.exists());
    assert_eq!(
        get_config_path(None).data,
        path.to_string_lossy().to_string()
    );

    std::env::remove_var(CONFIG_PATH_ENV);
}

#[test]
fn unsupported_platform_fails_before_any_command() {
    let mut config = AppConfig::default();
    config.adb.platform_binaries.clear();
    let err = build_client(&config, "trace-9").expect_err("expected unsupported platform");
    assert_eq!(err.code, ErrorCode::UnsupportedPlatform);
}

#[cfg(unix)]
fn stub_adb(dir: &tempfile::TempDir, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.path().join("adb");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path.to_string_lossy().to_string()
}

#[test]
fn missing_adb_binary_fails_each_target_with_spawn() {
    let mut config = AppConfig::default();
    config.adb.command_path = "/this/path/should/not/exist/adb".to_string();
    let client = build_client(&config, "trace-10").expect("client");
    let state = AppState::new();

    let report = run_stage_inner(
        Stage::Finish,
        vec!["5".to_string(), "6".to_string()],
        &client,
        &config,
        &state,
        "trace-10",
    )
    .expect("report");
    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 0);
    assert!(report
        .results
        .values()
        .all(|result| result.error_code == Some(ErrorCode::Spawn)));

    let err = list_devices_inner(&client, &config, &state, "trace-10")
        .expect_err("discovery needs adb");
    assert_eq!(err.code, ErrorCode::Spawn);
}

#[cfg(unix)]
#[test]
fn check_adb_reports_version_output() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let program = stub_adb(&tmp, "echo 'Android Debug Bridge version 1.0.41'");
    let info = check_adb_inner(program.clone(), "trace-11");
    assert!(info.available);
    assert_eq!(info.version_output, "Android Debug Bridge version 1.0.41");
    assert_eq!(info.command_path, program);
    assert!(info.error.is_none());
}

#[cfg(unix)]
#[test]
fn check_adb_explains_silent_failure() {
    let tmp = tempfile::TempDir::new().expect("tmp");
    let info = check_adb_inner(stub_adb(&tmp, "exit 3"), "trace-12");
    assert!(!info.available);
    assert_eq!(info.error.as_deref(), Some("adb exited with code 3"));

    let info = check_adb_inner(stub_adb(&tmp, "echo 'cannot bind' 1>&2; exit 1"), "trace-12");
    assert!(!info.available);
    assert_eq!(info.error.as_deref(), Some("cannot bind"));
}

#[test]
fn check_adb_flags_missing_executable() {
    let info = check_adb_inner("/this/path/should/not/exist/adb".to_string(), "trace-13");
    assert!(!info.available);
    assert!(info
        .error
        .unwrap_or_default()
        .to_lowercase()
        .contains("not found"));
}

#[cfg(unix)]
#[test]
fn check_adb_uses_configured_command_path() {
    let _guard = env_lock();
    let tmp = tempfile::TempDir::new().expect("tmp");
    let mut config = AppConfig::default();
    config.adb.command_path = stub_adb(&tmp, "echo 'Android Debug Bridge version 1.0.41'");
    let path = tmp.path().join("config.json");
    crate::app::config::save_config_to_path(
        &config,
        &path,
        &tmp.path().join("config.backup.json"),
        "trace-14",
    )
    .expect("save");
    std::env::set_var(CONFIG_PATH_ENV, &path);

    let response = check_adb(Some("trace-14".to_string()));
    std::env::remove_var(CONFIG_PATH_ENV);

    let response = response.expect("check");
    assert_eq!(response.trace_id, "trace-14");
    assert!(response.data.available);
    assert_eq!(response.data.command_path, config.adb.command_path);
}

#[test]
fn rediscovery_prunes_locks_of_departed_devices() {
    let adb = FakeAdb::ok().with_devices(LISTING);
    let state = AppState::new();
    state.scheduler.device_lock("6");
    state.scheduler.device_lock("99");
    assert_eq!(state.scheduler.tracked_devices(), 2);

    list_devices_inner(&adb, &AppConfig::default(), &state, "trace-15").expect("devices");
    assert_eq!(state.scheduler.tracked_devices(), 1);
}
