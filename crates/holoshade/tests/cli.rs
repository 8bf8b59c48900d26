use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn holoshade(config_dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_holoshade"));
    command.env("HOLOSHADE_CONFIG_DIR", config_dir);
    command.env_remove("RUST_LOG");
    command
}

#[test]
fn params_prints_json_for_variant() {
    let root = TempDir::new().unwrap();
    let output = holoshade(root.path())
        .args(["params", "20"])
        .output()
        .expect("failed to run holoshade params");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["variant"], 20);
    assert_eq!(json["primary_geometry"], "klein-bottle");
    assert_eq!(json["complexity_level"], 2);
}

#[test]
fn params_honours_complexity_ceiling_from_config() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("holoshade.toml"),
        "version = 1\nmax_complexity = 1\n",
    )
    .unwrap();
    let output = holoshade(root.path())
        .args(["params", "80"])
        .output()
        .expect("failed to run holoshade params");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["complexity_level"], 1);
}

#[test]
fn invalid_variant_is_rejected() {
    let root = TempDir::new().unwrap();
    for raw in ["-4", "1.5"] {
        let output = holoshade(root.path())
            .args(["params", raw])
            .output()
            .expect("failed to run holoshade params");
        assert!(!output.status.success(), "{raw}");
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("invalid argument"), "{stderr}");
    }
}

#[test]
fn layers_lists_the_stack_in_order() {
    let root = TempDir::new().unwrap();
    let output = holoshade(root.path())
        .args(["layers", "--json"])
        .output()
        .expect("failed to run holoshade layers");
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let layers = json.as_array().unwrap();
    assert_eq!(layers.len(), 10);
    assert_eq!(layers[0]["name"], "deep-background");
    assert_eq!(layers[9]["name"], "hologram-edge");
}

#[test]
fn still_exports_png() {
    let root = TempDir::new().unwrap();
    let target = root.path().join("frames/still.png");
    let output = holoshade(root.path())
        .args(["still", "--output"])
        .arg(&target)
        .args(["--time", "1.25", "--size", "48x27", "--variant", "13", "--seed", "5"])
        .output()
        .expect("failed to run holoshade still");
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let bytes = fs::read(&target).unwrap();
    assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
}

#[test]
fn missing_explicit_config_fails() {
    let root = TempDir::new().unwrap();
    let output = holoshade(root.path())
        .args(["params", "1", "--config"])
        .arg(root.path().join("absent.toml"))
        .output()
        .expect("failed to run holoshade params");
    assert!(!output.status.success());
}
