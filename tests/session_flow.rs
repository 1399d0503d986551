use std::cell::Cell;
use std::fs;
use std::path::Path;

use clap::Parser;
use synth_probe_lib::guard::GuardError;
use synth_probe_lib::output::load_snapshot;
use synth_probe_lib::params::{Parameter, ParameterMap};
use synth_probe_lib::state_xml::wrap_vst3_xml;
use synth_probe_lib::vst_host::{HostError, LoadStage, PluginHandle, PluginHost};
use synth_probe_lib::{run_with, Args};

const XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><PLUGINSTATE cutoff="0.8"/>"#;

struct MockPlugin {
    name: &'static str,
    before: Vec<(&'static str, f64)>,
    after: Vec<(&'static str, f64)>,
    state_before: Vec<u8>,
    state_after: Vec<u8>,
    edited: bool,
}

impl MockPlugin {
    fn synth() -> Self {
        Self {
            name: "Mock Synth",
            before: vec![("Cutoff", 0.5), ("Resonance", 0.1), ("Osc #1 Level", 0.3)],
            after: vec![("Cutoff", 0.8), ("Resonance", 0.1), ("Osc #1 Level", 0.3)],
            state_before: vec![0x01, 0x02, 0x03, 0xff],
            state_after: wrap_vst3_xml(XML),
            edited: false,
        }
    }

    fn other() -> Self {
        let params = vec![("Cutoff", 0.5), ("Drive", 0.0)];
        Self {
            name: "Other Synth",
            before: params.clone(),
            after: params,
            state_before: Vec::new(),
            state_after: Vec::new(),
            edited: false,
        }
    }
}

impl PluginHandle for MockPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn is_instrument(&self) -> bool {
        true
    }

    fn is_effect(&self) -> bool {
        false
    }

    fn parameters(&self) -> Result<ParameterMap, HostError> {
        let values = if self.edited { &self.after } else { &self.before };
        Ok(ParameterMap::from_parameters(
            values
                .iter()
                .enumerate()
                .map(|(i, (name, v))| Parameter::new(i as u32, i, *name, *v)),
        ))
    }

    fn raw_state(&self) -> Result<Vec<u8>, HostError> {
        Ok(if self.edited {
            self.state_after.clone()
        } else {
            self.state_before.clone()
        })
    }

    fn show_editor(&mut self) -> Result<(), HostError> {
        self.edited = true;
        Ok(())
    }
}

#[derive(Default)]
struct MockHost {
    loads: Cell<usize>,
}

impl PluginHost for MockHost {
    fn installed_vst3_plugins(&self) -> Vec<String> {
        vec![
            "/Library/Audio/Plug-Ins/VST3/Vital.vst3".to_string(),
            "/Library/Audio/Plug-Ins/VST3/OTT.vst3".to_string(),
        ]
    }

    fn installed_au_plugins(&self) -> Vec<String> {
        vec!["/Library/Audio/Plug-Ins/Components/Serum.component".to_string()]
    }

    fn load_plugin(&self, path: &Path) -> Result<Box<dyn PluginHandle>, HostError> {
        self.loads.set(self.loads.get() + 1);
        match path.file_name().and_then(|n| n.to_str()) {
            Some("Other.vst3") => Ok(Box::new(MockPlugin::other())),
            Some("Missing.vst3") => Err(HostError::LoadFailed {
                path: path.to_path_buf(),
                stage: LoadStage::Opening,
                reason: "no VST3 module binary found".to_string(),
            }),
            _ => Ok(Box::new(MockPlugin::synth())),
        }
    }
}

fn args(dir: &Path, extra: &[&str]) -> Args {
    let file = |name: &str| dir.join(name).to_string_lossy().to_string();
    let mut argv = vec![
        "synth-probe".to_string(),
        "--synth-path".to_string(),
        "/Library/Audio/Plug-Ins/VST3/Vital.vst3".to_string(),
        "--out-state-file-initial".to_string(),
        file("initial.bin"),
        "--out-state-file-new".to_string(),
        file("new.bin"),
        "--out-state-file-initial-xml".to_string(),
        file("initial.xml"),
        "--out-state-file-new-xml".to_string(),
        file("new.xml"),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    Args::try_parse_from(argv).unwrap()
}

#[test]
fn test_editor_session_is_diffed_and_states_written() {
    let dir = tempfile::tempdir().unwrap();
    let host = MockHost::default();

    let report = run_with(&args(dir.path(), &["--output-state"]), &host).unwrap();

    assert_eq!(report.plugin_name, "Mock Synth");
    let diff = report.diff.unwrap();
    assert_eq!(diff.before_count, 3);
    assert_eq!(diff.after_count, 3);
    assert_eq!(diff.changed.len(), 1);
    let change = &diff.changed["cutoff"];
    assert_eq!((change.before, change.after), (0.5, 0.8));

    assert_eq!(fs::read(dir.path().join("initial.bin")).unwrap(), vec![0x01, 0x02, 0x03, 0xff]);
    assert_eq!(fs::read(dir.path().join("new.bin")).unwrap(), wrap_vst3_xml(XML));

    // Only the XML-bearing state gets an XML file.
    assert!(!dir.path().join("initial.xml").exists());
    assert_eq!(fs::read_to_string(dir.path().join("new.xml")).unwrap(), XML);
    assert_eq!(report.written.len(), 3);
}

#[test]
fn test_without_output_state_nothing_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_with(&args(dir.path(), &[]), &MockHost::default()).unwrap();

    assert!(report.written.is_empty());
    assert!(!dir.path().join("initial.bin").exists());
    assert!(report.diff.is_some());
}

#[test]
fn test_no_editor_means_no_changes() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_with(&args(dir.path(), &["--no-editor"]), &MockHost::default()).unwrap();

    assert!(report.diff.unwrap().is_unchanged());
}

#[test]
fn test_param_enumeration_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_with(
        &args(dir.path(), &["--enumerate-params", "no"]),
        &MockHost::default(),
    )
    .unwrap();

    assert!(report.diff.is_none());
}

#[test]
fn test_existing_output_aborts_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("new.xml"), b"<old/>").unwrap();
    let host = MockHost::default();

    let err = run_with(&args(dir.path(), &["--output-state"]), &host).unwrap_err();

    let guard = err.downcast_ref::<GuardError>().unwrap();
    let GuardError::FilesExist { paths } = guard;
    assert_eq!(paths, &vec![dir.path().join("new.xml")]);
    assert_eq!(host.loads.get(), 0);
    assert_eq!(fs::read(dir.path().join("new.xml")).unwrap(), b"<old/>");
}

#[test]
fn test_force_overwrites_existing_outputs() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("initial.bin"), b"old").unwrap();

    run_with(&args(dir.path(), &["--output-state", "--force"]), &MockHost::default()).unwrap();

    assert_eq!(fs::read(dir.path().join("initial.bin")).unwrap(), vec![0x01, 0x02, 0x03, 0xff]);
}

#[test]
fn test_json_snapshot_holds_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let json = dir.path().join("out").join("session.json");
    let json_arg = json.to_string_lossy().to_string();

    let report = run_with(
        &args(dir.path(), &["--output-state", "--out-params-json", &json_arg]),
        &MockHost::default(),
    )
    .unwrap();
    assert!(report.written.contains(&json));

    let snapshot = load_snapshot(&json).unwrap();
    assert_eq!(snapshot.plugin_name, "Mock Synth");
    assert_eq!(snapshot.initial_params["cutoff"], 0.5);
    assert_eq!(snapshot.new_params["cutoff"], 0.8);
    assert_eq!(snapshot.new_params["osc_sharp1_level"], 0.3);
    assert_eq!(snapshot.initial_state.as_deref(), Some(&[0x01, 0x02, 0x03, 0xff][..]));
    assert_eq!(snapshot.new_state, Some(wrap_vst3_xml(XML)));
}

#[test]
fn test_compare_with_reports_key_sets() {
    let dir = tempfile::tempdir().unwrap();
    let host = MockHost::default();

    let report = run_with(
        &args(dir.path(), &["--no-editor", "--compare-with", "/Library/Audio/Plug-Ins/VST3/Other.vst3"]),
        &host,
    )
    .unwrap();

    let cmp = report.key_comparison.unwrap();
    assert!(cmp.in_both.contains("cutoff"));
    assert!(cmp.only_in_a.contains("resonance"));
    assert!(cmp.only_in_b.contains("drive"));
    assert_eq!(host.loads.get(), 2);
}

#[test]
fn test_load_failure_is_reported_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = args(dir.path(), &[]);
    a.synth_path = "/nowhere/Missing.vst3".to_string();

    let err = run_with(&a, &MockHost::default()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("Failed to load synth plugin /nowhere/Missing.vst3"));
    assert!(msg.contains("opening library"));
}
