use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn synth_probe(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_synth-probe"))
        .current_dir(cwd)
        .args(["--enumerate-plugins", "false"])
        .args(args)
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to spawn synth-probe")
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

#[test]
fn test_existing_output_is_refused_without_force() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("synth_raw_state_initial.bin"), b"old").unwrap();

    let out = synth_probe(dir.path(), &["--output-state", "--synth-path", "Missing.vst3"]);

    assert_eq!(out.status.code(), Some(1));
    let stderr = text(&out.stderr);
    assert!(stderr.contains("Error: The following files already exist: synth_raw_state_initial.bin"), "{stderr}");
    assert!(stderr.contains("Use --force to overwrite."));
    // Refused before any plugin is loaded.
    assert!(!text(&out.stdout).contains("Loading synth plugin"));
    assert_eq!(fs::read(dir.path().join("synth_raw_state_initial.bin")).unwrap(), b"old");
}

#[test]
fn test_force_warns_then_continues() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("synth_raw_state_new.xml"), b"<old/>").unwrap();

    let out = synth_probe(
        dir.path(),
        &["--output-state", "--force", "--synth-path", "Missing.vst3"],
    );

    let stdout = text(&out.stdout);
    assert!(stdout.contains(
        "Warning: The following files will be overwritten due to --force: synth_raw_state_new.xml"
    ), "{stdout}");
    assert!(stdout.contains("Loading synth plugin (Missing.vst3).."));

    // The plugin does not exist, so the run still fails, at load time.
    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out.stderr).contains("Failed to load synth plugin Missing.vst3"));
}

#[test]
fn test_json_snapshot_path_is_guarded_too() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("session.json"), b"{}").unwrap();

    let out = synth_probe(dir.path(), &["--out-params-json", "session.json"]);

    assert_eq!(out.status.code(), Some(1));
    assert!(text(&out.stderr).contains("session.json"));
}

#[test]
fn test_invalid_boolean_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let out = synth_probe(dir.path(), &["--force", "maybe"]);

    assert_eq!(out.status.code(), Some(2));
    assert!(text(&out.stderr).contains("Boolean value expected."));
}

#[test]
fn test_audio_unit_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let out = synth_probe(dir.path(), &["--synth-path", "Serum.component"]);

    assert_eq!(out.status.code(), Some(1));
    let stderr = text(&out.stderr);
    assert!(stderr.contains("Unsupported plugin format"), "{stderr}");
}

#[test]
fn test_args_summary_is_printed_first() {
    let dir = tempfile::tempdir().unwrap();
    let out = synth_probe(dir.path(), &["--synth-path", "Missing.vst3"]);

    let stdout = text(&out.stdout);
    assert!(stdout.starts_with("Args:\n"), "{stdout}");
    assert!(stdout.contains("  synth_path: Missing.vst3,"));
    assert!(stdout.contains("  output_state: false,"));
}
