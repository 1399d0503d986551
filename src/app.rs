//! The probe sequence: guard, list, load, snapshot, editor, diff, write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cli::Args;
use crate::diff::{self, compare_keys, KeyComparison, ParamDiff};
use crate::filter::report_filtered;
use crate::guard::{check_outputs, join_paths};
use crate::output::{self, StateSnapshot};
use crate::params::{print_parameter_properties, ParameterMap};
use crate::state_xml::extract_vst3_xml;
use crate::vst_host::{PluginHandle, PluginHost};

/// What a run produced, for callers that want more than the printed report.
#[derive(Debug, Default)]
pub struct RunReport {
    pub plugin_name: String,
    pub diff: Option<ParamDiff>,
    pub key_comparison: Option<KeyComparison>,
    pub written: Vec<PathBuf>,
}

pub fn run_with(args: &Args, host: &dyn PluginHost) -> Result<RunReport> {
    args.print_summary();

    let outputs = args.output_paths();
    if !outputs.is_empty() {
        let existing = check_outputs(&outputs, args.force)?;
        if !existing.is_empty() {
            println!(
                "Warning: The following files will be overwritten due to --force: {}",
                join_paths(&existing)
            );
        }
    }

    if args.enumerate_plugins {
        report_filtered(
            &host.installed_vst3_plugins(),
            &host.installed_au_plugins(),
            &args.plugin_filters,
        );
    }

    println!("Loading synth plugin ({})..", args.synth_path);
    let mut synth = host
        .load_plugin(Path::new(&args.synth_path))
        .with_context(|| format!("Failed to load synth plugin {}", args.synth_path))?;
    println!("  Synth plugin loaded: {}", synth.name());
    println!("  Synth plugin is instrument? {}", synth.is_instrument());
    println!("  Synth plugin is effect? {}", synth.is_effect());

    let mut report = RunReport {
        plugin_name: synth.name().to_string(),
        ..Default::default()
    };

    if !args.describe_params.is_empty() {
        describe_parameters(synth.as_ref(), &args.describe_params)?;
    }

    if let Some(other) = &args.compare_with {
        report.key_comparison = Some(compare_plugin_parameters(host, synth.as_ref(), other)?);
    }

    let initial_state = if args.output_state {
        println!("Capturing initial raw state of the synth..");
        Some(synth.raw_state()?)
    } else {
        None
    };

    let initial_params = if args.enumerate_params {
        println!("Capturing initial state of synth params..");
        let params = synth.parameters()?;
        log::info!("{} exposes {} parameters", synth.name(), params.len());
        Some(params)
    } else {
        None
    };

    if args.no_editor {
        println!("Skipping synth GUI (--no-editor).");
    } else {
        println!("Showing synth GUI..");
        synth.show_editor()?;
    }

    let new_params = match &initial_params {
        Some(initial) => {
            println!("Capturing state of synth params after showing GUI..");
            let new_params = synth.parameters()?;
            let d = diff::diff(&diff::snapshot(initial), &diff::snapshot(&new_params));
            diff::report_diff(&d, &new_params);
            report.diff = Some(d);
            Some(new_params)
        }
        None => None,
    };

    let new_state = match &initial_state {
        Some(initial) => {
            println!("Capturing new raw state of the synth after showing GUI..");
            let new_state = synth.raw_state()?;
            println!("Raw synth state length before: {}", initial.len());
            println!("Raw synth state length after: {}", new_state.len());
            write_states(args, initial, &new_state, &mut report.written)?;
            Some(new_state)
        }
        None => None,
    };

    if let Some(path) = &args.out_params_json {
        let snapshot = StateSnapshot {
            plugin_path: args.synth_path.clone(),
            plugin_name: report.plugin_name.clone(),
            initial_params: initial_params.as_ref().map(diff::snapshot).unwrap_or_default(),
            new_params: new_params.as_ref().map(diff::snapshot).unwrap_or_default(),
            initial_state,
            new_state,
        };
        output::save_snapshot(path, &snapshot)?;
        println!("Parameter snapshot written to {}", path.display());
        report.written.push(path.clone());
    }

    Ok(report)
}

fn describe_parameters(synth: &dyn PluginHandle, keys: &[String]) -> Result<()> {
    let parameters = synth.parameters()?;
    if parameters.is_empty() {
        log::warn!("{} exposes no parameters", synth.name());
    }
    for key in keys {
        match parameters.get(key) {
            Some(parameter) => {
                println!("Parameter properties for {key}:");
                print_parameter_properties(parameter);
            }
            None => println!("Parameter {key} not found in {}.", synth.name()),
        }
    }
    Ok(())
}

fn compare_plugin_parameters(
    host: &dyn PluginHost,
    synth: &dyn PluginHandle,
    other_path: &Path,
) -> Result<KeyComparison> {
    println!("Comparing plugin parameters with {}:", other_path.display());
    println!("  Loading plugin..");
    let other = host
        .load_plugin(other_path)
        .with_context(|| format!("Failed to load plugin {}", other_path.display()))?;
    println!("  Successfully loaded plugin: {}", other.name());

    let ours: ParameterMap = synth.parameters()?;
    let theirs: ParameterMap = other.parameters()?;
    let comparison = compare_keys(ours.keys(), theirs.keys());

    println!("  Parameters only in {}: {:?}", synth.name(), comparison.only_in_a);
    println!("  Parameters only in {}: {:?}", other.name(), comparison.only_in_b);
    println!("  Parameters in both: {:?}", comparison.in_both);
    Ok(comparison)
}

fn write_states(args: &Args, initial: &[u8], new: &[u8], written: &mut Vec<PathBuf>) -> Result<()> {
    output::write_raw_state(&args.out_state_file_initial, initial)?;
    println!("Initial raw state written to {}", args.out_state_file_initial.display());
    written.push(args.out_state_file_initial.clone());

    output::write_raw_state(&args.out_state_file_new, new)?;
    println!("New raw state written to {}", args.out_state_file_new.display());
    written.push(args.out_state_file_new.clone());

    let xml_targets = [
        ("Initial", initial, &args.out_state_file_initial_xml),
        ("New", new, &args.out_state_file_new_xml),
    ];
    for (label, state, path) in xml_targets {
        match extract_vst3_xml(state) {
            Some(xml) => {
                output::write_xml(path, &xml)?;
                println!("{label} raw state XML written to {}", path.display());
                written.push(path.clone());
            }
            None => println!("{label} state does not look like VST3 XML."),
        }
    }
    Ok(())
}
