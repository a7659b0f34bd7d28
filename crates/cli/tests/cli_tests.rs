//! CLI integration tests

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CONTEXT: &str = r#"{
  "networks": [
    {
      "vpc_id": "vpc-0default",
      "is_default": true,
      "availability_zones": ["us-east-1a", "us-east-1b"],
      "public_subnet_ids": ["subnet-pub-a", "subnet-pub-b"],
      "private_subnet_ids": ["subnet-priv-a", "subnet-priv-b"]
    },
    {
      "vpc_id": "vpc-0shared",
      "name": "shared",
      "availability_zones": ["us-east-1a"],
      "public_subnet_ids": ["subnet-shared"]
    }
  ]
}"#;

/// Run the binary inside `dir` with a clean configuration environment
fn infra(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_infra"))
        .args(args)
        .current_dir(dir)
        .env("CDK_DEFAULT_ACCOUNT", "123456789012")
        .env("CDK_DEFAULT_REGION", "us-east-1")
        .env("NO_COLOR", "1")
        .env_remove("INFRA_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute infra")
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cdk.context.json"), CONTEXT).unwrap();
    dir
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let dir = workspace();
    let output = infra(dir.path(), &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("list"), "Should show list command");
    assert!(stdout.contains("synth"), "Should show synth command");
    assert!(stdout.contains("resources"), "Should show resources command");
}

#[test]
fn test_list_stacks_json() {
    let dir = workspace();
    let output = infra(dir.path(), &["--format", "json", "list"]);
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["my-container-infrastructure", "my-stack"]);
    assert_eq!(rows[0]["region"], "us-east-1");
}

#[test]
fn test_synth_writes_assembly() {
    let dir = workspace();
    let output = infra(dir.path(), &["synth"]);
    assert!(
        output.status.success(),
        "synth failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let out = dir.path().join("cdk.out");
    let manifest = read_json(&out.join("manifest.json"));
    assert_eq!(
        manifest["artifacts"]["my-container-infrastructure"]["environment"],
        "aws://123456789012/us-east-1"
    );
    assert!(out.join("my-stack.template.json").exists());

    let template = read_json(&out.join("my-container-infrastructure.template.json"));
    let services: Vec<&serde_json::Value> = template["Resources"]
        .as_object()
        .unwrap()
        .values()
        .filter(|resource| resource["Type"] == "AWS::ECS::Service")
        .collect();
    assert_eq!(services.len(), 1);
    let awsvpc = &services[0]["Properties"]["NetworkConfiguration"]["AwsvpcConfiguration"];
    assert_eq!(awsvpc["AssignPublicIp"], "ENABLED");
    assert_eq!(
        awsvpc["Subnets"],
        serde_json::json!(["subnet-pub-a", "subnet-pub-b"])
    );
}

#[test]
fn test_synth_is_repeatable() {
    let dir = workspace();
    assert!(infra(dir.path(), &["--out", "first", "synth", "my-stack"]).status.success());
    assert!(infra(dir.path(), &["--out", "second", "synth", "my-stack"]).status.success());

    let first = fs::read_to_string(dir.path().join("first/my-stack.template.json")).unwrap();
    let second = fs::read_to_string(dir.path().join("second/my-stack.template.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_context_selects_named_network() {
    let dir = workspace();
    let output = infra(
        dir.path(),
        &["--context", "vpc_name=shared", "synth", "my-stack"],
    );
    assert!(output.status.success());

    let template = read_json(&dir.path().join("cdk.out/my-stack.template.json"));
    let instance = template["Resources"]
        .as_object()
        .unwrap()
        .values()
        .find(|resource| resource["Type"] == "AWS::EC2::Instance")
        .unwrap();
    assert_eq!(instance["Properties"]["SubnetId"], "subnet-shared");
    assert_eq!(instance["Properties"]["InstanceType"], "t2.micro");
}

#[test]
fn test_config_file_drives_container_stack() {
    let dir = workspace();
    fs::write(
        dir.path().join("infra.toml"),
        r#"
[container_stack]
image = "nginx"
tcp_ports = [80]
desired_count = 2
load_balanced = true
"#,
    )
    .unwrap();

    let output = infra(
        dir.path(),
        &["--format", "json", "resources", "my-container-infrastructure"],
    );
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let types: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["resource_type"].as_str().unwrap())
        .collect();
    assert!(types.contains(&"AWS::ElasticLoadBalancingV2::LoadBalancer"));
    assert!(rows
        .as_array()
        .unwrap()
        .iter()
        .any(|row| row["path"] == "taskdef-webserver/containernginx/LogGroup"));
}

#[test]
fn test_unknown_stack_fails() {
    let dir = workspace();
    let output = infra(dir.path(), &["synth", "nope"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown stack 'nope'"));
}

#[test]
fn test_missing_context_file_fails() {
    let dir = TempDir::new().unwrap();
    let output = infra(dir.path(), &["synth"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load network context"));
    assert!(!dir.path().join("cdk.out").exists());
}

#[test]
fn test_synth_metrics() {
    let dir = workspace();
    let output = infra(dir.path(), &["--format", "json", "synth", "--metrics"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("infra_resources_registered_total"));
    assert!(stdout.contains("infra_synth_duration_seconds"));
}
