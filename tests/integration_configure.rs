//! Integration tests for the configuration writer through the public API.
//!
//! Every test points the provisioner at scratch home/temp directories, so
//! nothing on the host is touched.

use claude_provision::{ApiConfiguration, ConfigError, Provisioner, ProvisionOptions};
use serde_json::{json, Value};
use tempfile::TempDir;

fn scratch_provisioner() -> (Provisioner, TempDir, TempDir) {
    let home = tempfile::tempdir().unwrap();
    let temp = tempfile::tempdir().unwrap();
    let provisioner = Provisioner::new(ProvisionOptions {
        home_dir: Some(home.path().to_path_buf()),
        temp_dir: Some(temp.path().to_path_buf()),
        shell: Some("/bin/zsh".to_string()),
        ..Default::default()
    });
    (provisioner, home, temp)
}

fn config(rpm: u32, persist: bool) -> ApiConfiguration {
    ApiConfiguration {
        api_key: "sk-integration-test-key".to_string(),
        requests_per_minute: rpm,
        persist_system_wide: persist,
    }
}

#[tokio::test]
async fn test_configure_writes_managed_keys() {
    let (provisioner, home, _temp) = scratch_provisioner();

    provisioner.configure_api(&config(200, false)).await.unwrap();

    let raw = std::fs::read_to_string(home.path().join(".claude.json")).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["hasCompletedOnboarding"], json!(true));
    assert_eq!(value["apiKey"], json!("sk-integration-test-key"));
    assert_eq!(value["apiBaseUrl"], json!("https://api.moonshot.cn/anthropic/"));
    assert_eq!(value["requestDelayMs"], json!(300));
    assert_eq!(value["maxConcurrentRequests"], json!(1));
}

#[tokio::test]
async fn test_configure_preserves_foreign_keys() {
    let (provisioner, home, _temp) = scratch_provisioner();
    std::fs::write(
        home.path().join(".claude.json"),
        r#"{"theme":"dark","tipsHistory":{"memory":3},"numStartups":42}"#,
    )
    .unwrap();

    provisioner.configure_api(&config(30, false)).await.unwrap();

    let raw = std::fs::read_to_string(home.path().join(".claude.json")).unwrap();
    let value: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["theme"], json!("dark"));
    assert_eq!(value["tipsHistory"]["memory"], json!(3));
    assert_eq!(value["numStartups"], json!(42));
    assert_eq!(value["requestDelayMs"], json!(2000));
}

#[tokio::test]
async fn test_configure_zero_rate_is_rejected() {
    let (provisioner, home, _temp) = scratch_provisioner();

    let result = provisioner.configure_api(&config(0, false)).await;
    assert!(matches!(result, Err(ConfigError::InvalidRateLimit)));
    assert!(!home.path().join(".claude.json").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_persist_round_trip_restores_profile_exactly() {
    let (provisioner, home, _temp) = scratch_provisioner();
    let original = "# user zshrc\nexport EDITOR=vim\nalias g=git\n";
    std::fs::write(home.path().join(".zshrc"), original).unwrap();

    // restore on an untouched system changes nothing
    provisioner.restore_configuration().await.unwrap();
    assert_eq!(
        std::fs::read_to_string(home.path().join(".zshrc")).unwrap(),
        original
    );

    provisioner.configure_api(&config(30, true)).await.unwrap();
    assert!(home.path().join(".claude.json").exists());
    let configured = std::fs::read_to_string(home.path().join(".zshrc")).unwrap();
    assert!(configured.contains("ANTHROPIC_API_KEY"));
    assert!(configured.contains("unset ANTHROPIC_AUTH_TOKEN"));

    provisioner.restore_configuration().await.unwrap();
    assert!(!home.path().join(".claude.json").exists());
    assert_eq!(
        std::fs::read_to_string(home.path().join(".zshrc")).unwrap(),
        original
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_double_configure_is_idempotent_for_profiles() {
    let (provisioner, home, _temp) = scratch_provisioner();
    std::fs::write(home.path().join(".zshrc"), "# user zshrc\n").unwrap();

    provisioner.configure_api(&config(30, true)).await.unwrap();
    provisioner.configure_api(&config(30, true)).await.unwrap();

    let content = std::fs::read_to_string(home.path().join(".zshrc")).unwrap();
    assert_eq!(content.matches("# Claude Code K2 Configuration").count(), 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_session_mode_writes_launch_script() {
    let (provisioner, _home, temp) = scratch_provisioner();

    provisioner.configure_api(&config(500, false)).await.unwrap();

    let script = temp.path().join("claude_k2_setup.sh");
    let contents = std::fs::read_to_string(&script).unwrap();
    assert!(contents.contains("export ANTHROPIC_BASE_URL=\"https://api.moonshot.cn/anthropic/\""));
    assert!(contents.contains("export CLAUDE_REQUEST_DELAY_MS=\"120\""));
    assert!(contents.contains("unset ANTHROPIC_AUTH_TOKEN"));
}

#[tokio::test]
async fn test_configure_phase_emits_terminal_event() {
    let (provisioner, _home, _temp) = scratch_provisioner();

    let mut events = provisioner.configure(config(30, false));
    let mut last = None;
    while let Some(event) = events.recv().await {
        last = Some(event);
    }

    let terminal = last.expect("configure phase should emit events");
    assert_eq!(terminal.fraction, Some(1.0));
    assert!(terminal.error.is_none());
}

#[tokio::test]
async fn test_configure_phase_reports_validation_failure() {
    let (provisioner, _home, _temp) = scratch_provisioner();

    let mut events = provisioner.configure(config(0, false));
    let mut terminal = None;
    while let Some(event) = events.recv().await {
        if event.error.is_some() {
            terminal = Some(event);
        }
    }

    let terminal = terminal.expect("expected a terminal error event");
    assert!(terminal.error.unwrap().contains("greater than zero"));
}

#[tokio::test]
async fn test_logs_accumulate_across_operations() {
    let (provisioner, _home, _temp) = scratch_provisioner();

    provisioner.configure_api(&config(30, false)).await.unwrap();
    let after_configure = provisioner.logs().len();
    assert!(after_configure > 0);

    provisioner.restore_configuration().await.unwrap();
    assert!(provisioner.logs().len() > after_configure);
}
