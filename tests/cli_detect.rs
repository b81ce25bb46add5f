use assert_cmd::Command;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// A scratch dir with a placeholder image and an empty config home.
struct Scratch {
    dir: TempDir,
}

impl Scratch {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("room.jpg"), b"not really a jpeg").unwrap();
        std::fs::create_dir(dir.path().join("config")).unwrap();
        Self { dir }
    }

    fn image(&self) -> PathBuf {
        self.dir.path().join("room.jpg")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("roomsense").unwrap();
        cmd.env_remove("ROOMSENSE_CONFIG")
            .env_remove("ROOMSENSE_LOG")
            .env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env("HOME", self.dir.path());
        cmd
    }
}

fn run_json(cmd: &mut Command) -> Value {
    let output = cmd.output().expect("failed to run roomsense");
    assert!(output.status.success(), "detect must always exit 0");
    assert_eq!(output.status.code(), Some(0));
    serde_json::from_slice(&output.stdout).expect("stdout is not json")
}

#[test]
fn detect_from_sidecar() {
    let s = Scratch::new();
    let json = run_json(
        s.cmd()
            .args(["detect", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(fixture("living_room.json")),
    );

    assert_eq!(
        json,
        json!({
            "objects": ["sofa", "dining chair"],
            "raw": ["couch", "chair"],
            "conf": {"sofa": 0.9, "dining chair": 0.4},
        })
    );
}

#[test]
fn detect_class_ids_and_threshold() {
    let s = Scratch::new();
    let json = run_json(
        s.cmd()
            .args(["detect", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(fixture("bedroom.json")),
    );

    assert_eq!(json["objects"], json!(["bed", "desk", "decor plant"]));
    assert_eq!(json["raw"], json!(["bed", "potted plant", "laptop"]));
    assert_eq!(json["conf"]["bed"], json!(0.875));

    let json = run_json(
        s.cmd()
            .args(["detect", "--conf", "0.2", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(fixture("bedroom.json")),
    );
    assert_eq!(json["objects"], json!(["bed", "desk", "decor plant", "tv console"]));
    assert_eq!(json["raw"], json!(["bed", "tv", "potted plant", "laptop"]));
}

#[test]
fn invalid_threshold_falls_back_to_default() {
    let s = Scratch::new();
    let json = run_json(
        s.cmd()
            .args(["detect", "--conf", "lots", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(fixture("bedroom.json")),
    );
    assert_eq!(json["raw"], json!(["bed", "potted plant", "laptop"]));
    assert!(json.get("error").is_none());
}

#[test]
fn max_objects_caps_objects_only() {
    let s = Scratch::new();
    let json = run_json(
        s.cmd()
            .args(["detect", "--max-objects", "1", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(fixture("bedroom.json")),
    );
    assert_eq!(json["objects"], json!(["bed"]));
    assert_eq!(json["conf"].as_object().unwrap().len(), 3);
}

#[test]
fn boxes_and_layout() {
    let s = Scratch::new();
    let json = run_json(
        s.cmd()
            .args(["detect", "--boxes", "--layout", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(fixture("living_room.json")),
    );

    let boxes = json["boxes"].as_array().unwrap();
    assert_eq!(boxes.len(), 2);
    assert_eq!(boxes[0]["label"], "couch");
    assert_eq!(boxes[0]["need"], "sofa");
    assert!(boxes.iter().all(|b| b["label"] != "book"));
    assert_eq!(
        json["layoutSuggestions"],
        json!([
            "Sofa: middle area, left side",
            "Dining Chair: place near wall with clear circulation"
        ])
    );
}

#[test]
fn near_threshold_confidences_keep_their_order() {
    let s = Scratch::new();
    let detections = s.path("close.json");
    std::fs::write(
        &detections,
        r#"[{"label": "couch", "confidence": 0.300000001},
            {"label": "bed", "confidence": 0.30000001}]"#,
    )
    .unwrap();
    let json = run_json(
        s.cmd()
            .args(["detect", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(&detections),
    );
    assert_eq!(json["objects"], json!(["bed", "sofa"]));
    assert_eq!(json["conf"]["bed"], json!(0.30000001));
    assert_eq!(json["conf"]["sofa"], json!(0.300000001));
}

#[test]
fn missing_image_is_reported_in_band() {
    let s = Scratch::new();
    let missing = s.path("nope.jpg");
    let json = run_json(
        s.cmd()
            .args(["detect", "--image"])
            .arg(&missing)
            .arg("--detections")
            .arg(fixture("living_room.json")),
    );
    assert_eq!(json["objects"], json!([]));
    assert_eq!(json["raw"], json!([]));
    assert_eq!(
        json["error"],
        json!(format!("Image not found: {}", missing.display()))
    );
}

#[test]
fn malformed_detections_are_reported_in_band() {
    let s = Scratch::new();
    let broken = s.path("broken.json");
    std::fs::write(&broken, "[{\"label\": ").unwrap();
    let json = run_json(
        s.cmd()
            .args(["detect", "--image"])
            .arg(s.image())
            .arg("--detections")
            .arg(&broken),
    );
    assert_eq!(json["objects"], json!([]));
    assert!(json["error"].as_str().unwrap().starts_with("Invalid detections"));
}

#[cfg(not(feature = "onnx"))]
#[test]
fn missing_runtime_is_reported_in_band() {
    let s = Scratch::new();
    let json = run_json(s.cmd().args(["detect", "--image"]).arg(s.image()));
    assert_eq!(json["objects"], json!([]));
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("Missing detector runtime"));
    assert!(error.contains("--features onnx"));
}

#[test]
fn bad_config_is_reported_in_band() {
    let s = Scratch::new();
    let json = run_json(
        s.cmd()
            .args(["detect", "--config"])
            .arg(s.path("absent.toml"))
            .arg("--image")
            .arg(s.image()),
    );
    assert!(json["error"].as_str().unwrap().starts_with("cannot read config"));
}

#[test]
fn pretty_output_is_multiline() {
    let s = Scratch::new();
    let output = s
        .cmd()
        .args(["detect", "--pretty", "--image"])
        .arg(s.image())
        .arg("--detections")
        .arg(fixture("living_room.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().count() > 1);
    assert!(stdout.contains("  \"objects\": ["));
}

#[test]
fn logs_stay_off_stdout() {
    let s = Scratch::new();
    let output = s
        .cmd()
        .args(["-vv", "detect", "--image"])
        .arg(s.image())
        .arg("--detections")
        .arg(fixture("living_room.json"))
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["objects"], json!(["sofa", "dining chair"]));
    assert!(!output.stderr.is_empty());
}
