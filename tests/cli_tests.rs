use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "{name}_{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

/// One-hot `(length, 11)` digit scores flattened into a single row.
fn write_digits(dir: &std::path::Path, name: &str, digits: &str) -> PathBuf {
    let mut data = vec![0.0f32; digits.len() * 11];
    for (pos, c) in digits.chars().enumerate() {
        let idx = c.to_digit(10).unwrap() as usize;
        data[pos * 11 + idx] = 1.0;
    }
    let json = serde_json::json!({ "shape": [1, data.len()], "data": data });
    let path = dir.join(name);
    std::fs::write(&path, json.to_string()).expect("write should succeed");
    path
}

/// The binary with no config source other than the built-ins: the per-user
/// config directory resolves inside `home`.
fn captcha_ocr(home: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_captcha-ocr"));
    cmd.env_remove("CAPTCHA_OCR_CONFIG")
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"));
    cmd
}

#[test]
fn decode_prints_one_line_per_input() {
    let dir = temp_dir("captcha_ocr_cli_lines");
    let a = write_digits(&dir, "a.json", "042135");
    let b = write_digits(&dir, "b.json", "998877");

    let out = captcha_ocr(&dir)
        .args(["decode", "--hint", "captcha_model_v2.onnx"])
        .arg(&a)
        .arg(&b)
        .output()
        .expect("binary should run");
    let _ = std::fs::remove_dir_all(&dir);

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("\t042135"));
    assert!(lines[1].ends_with("\t998877"));
}

#[test]
fn json_report_carries_schema_and_variant() {
    let dir = temp_dir("captcha_ocr_cli_json");
    let input = write_digits(&dir, "4213.json", "4213");

    let out = captcha_ocr(&dir)
        .args(["decode", "--json", "--label-from-filename"])
        .arg(&input)
        .output()
        .expect("binary should run");
    let _ = std::fs::remove_dir_all(&dir);

    assert!(out.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be one JSON object");
    assert_eq!(report["text"], "4213");
    assert_eq!(report["variant"], "reshape:11");
    assert_eq!(report["schema"]["schema"], "generic_reshape");
    assert_eq!(report["schema"]["sequence_length"], 4);
}

#[test]
fn unresolved_input_fails_the_run() {
    let dir = temp_dir("captcha_ocr_cli_fail");
    let path = dir.join("odd.json");
    std::fs::write(&path, r#"{"shape":[1,13],"data":[0,0,0,0,0,0,0,0,0,0,0,0,1]}"#)
        .expect("write should succeed");

    let out = captcha_ocr(&dir)
        .arg("decode")
        .arg(&path)
        .output()
        .expect("binary should run");
    let _ = std::fs::remove_dir_all(&dir);

    assert!(!out.status.success());
    assert!(out.stdout.is_empty());
    assert!(String::from_utf8_lossy(&out.stderr).contains("odd.json"));
}

#[cfg(target_os = "linux")]
#[test]
fn user_config_directory_is_consulted() {
    let dir = temp_dir("captcha_ocr_cli_home");
    let config_dir = dir.join(".config").join("captcha-ocr");
    std::fs::create_dir_all(&config_dir).expect("config dir should be creatable");
    std::fs::write(
        config_dir.join("models.json"),
        r#"{ "models": [ { "names": ["pin.onnx"], "schema": "flat_segmented", "sequence_length": 3, "vocabulary": "11" } ] }"#,
    )
    .expect("write should succeed");
    let input = write_digits(&dir, "pin.json", "907");

    let out = captcha_ocr(&dir)
        .args(["decode", "--json", "--hint", "pin.onnx"])
        .arg(&input)
        .output()
        .expect("binary should run");
    let _ = std::fs::remove_dir_all(&dir);

    assert!(out.status.success());
    let report: serde_json::Value =
        serde_json::from_slice(&out.stdout).expect("stdout should be one JSON object");
    assert_eq!(report["text"], "907");
    assert_eq!(report["schema"]["schema"], "flat_segmented");
}
