use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use catwatch::config::CatwatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CATWATCH_CONFIG",
        "CATWATCH_MODEL_PATH",
        "CATWATCH_SOURCE",
        "CATWATCH_EVENTS_DIR",
        "CATWATCH_TARGET_CLASS",
        "CATWATCH_CONFIDENCE",
        "CATWATCH_PERSISTENCE_S",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_toml_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [thresholds]
        confidence_threshold = 0.6
        persistence_time_s = 1.5

        [device]
        camera_index = 1
        width = 640
        height = 480
        fps = 15

        [model]
        path = "models/custom.onnx"
        target_class_id = 16
        input_width = 512
        input_height = 384

        [events]
        dir = "/var/lib/catwatch/events"
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("CATWATCH_CONFIG", file.path());
    std::env::set_var("CATWATCH_TARGET_CLASS", "15");
    std::env::set_var("CATWATCH_PERSISTENCE_S", "0.25");

    let cfg = CatwatchConfig::load().expect("load config");

    assert_eq!(cfg.confidence_threshold, 0.6);
    assert_eq!(cfg.persistence_time_s, 0.25);
    assert_eq!(cfg.device.camera_index, 1);
    assert_eq!((cfg.device.width, cfg.device.height, cfg.device.fps), (640, 480, 15));
    assert_eq!(cfg.capture().source, "/dev/video1");
    assert_eq!(cfg.model.path, PathBuf::from("models/custom.onnx"));
    assert_eq!(cfg.model.target_class_id, 15);
    assert_eq!(cfg.model.input_size, Some((512, 384)));
    assert_eq!(cfg.events_dir, PathBuf::from("/var/lib/catwatch/events"));
    assert_eq!(cfg.persistence(), Duration::from_millis(250));

    clear_env();
}

#[test]
fn loads_json_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("temp config");
    let json = r#"{
        "thresholds": { "confidence_threshold": 0.4 },
        "device": { "source": "stub://bench" }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    let cfg = CatwatchConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.confidence_threshold, 0.4);
    assert_eq!(cfg.persistence_time_s, 0.7);
    assert_eq!(cfg.capture().source, "stub://bench");
    assert_eq!(cfg.model.target_class_id, 15);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CATWATCH_SOURCE", "stub://front");
    std::env::set_var("CATWATCH_EVENTS_DIR", "/tmp/catwatch-events");

    let cfg = CatwatchConfig::load().expect("load config");
    assert_eq!(cfg.capture().source, "stub://front");
    assert_eq!(cfg.events_dir, PathBuf::from("/tmp/catwatch-events"));
    assert_eq!(cfg.model.path, PathBuf::from("models/yolov8n.onnx"));
    assert_eq!(cfg.model.input_size, None);

    clear_env();
}

#[test]
fn rejects_out_of_range_confidence() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CATWATCH_CONFIDENCE", "1.2");
    let err = CatwatchConfig::load().expect_err("confidence above 1 must fail");
    assert!(err.to_string().contains("confidence_threshold"));

    clear_env();
}

#[test]
fn rejects_overflowing_persistence() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CATWATCH_PERSISTENCE_S", "1e20");
    let err = CatwatchConfig::load().expect_err("unrepresentable persistence must fail");
    assert!(err.to_string().contains("persistence_time_s"));

    clear_env();
}

#[test]
fn rejects_unparseable_env_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CATWATCH_TARGET_CLASS", "cat");
    assert!(CatwatchConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"[thresholds\nconfidence_threshold = ").expect("write");
    std::env::set_var("CATWATCH_CONFIG", file.path());
    let err = CatwatchConfig::load().expect_err("malformed toml must fail");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
