use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Accepts the usual spellings of a boolean on the command line.
pub fn parse_bool(v: &str) -> Result<bool, String> {
    match v.to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(true),
        "no" | "false" | "f" | "n" | "0" => Ok(false),
        _ => Err("Boolean value expected.".to_string()),
    }
}

pub fn default_synth_path() -> String {
    #[cfg(target_os = "macos")]
    {
        "/Library/Audio/Plug-Ins/VST3/Vital.vst3".to_string()
    }
    #[cfg(windows)]
    {
        r"C:\Program Files\Common Files\VST3\Vital.vst3".to_string()
    }
    #[cfg(not(any(target_os = "macos", windows)))]
    {
        "/usr/lib/vst3/Vital.vst3".to_string()
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "synth-probe", about = "Load and compare synth plugins.")]
pub struct Args {
    /// Path to the synth plugin file.
    #[arg(long, default_value_t = default_synth_path())]
    pub synth_path: String,

    /// Enumerate and display installed synth plugins.
    #[arg(long, value_parser = parse_bool, num_args = 0..=1, default_value = "true",
          default_missing_value = "true", action = ArgAction::Set)]
    pub enumerate_plugins: bool,

    /// Enumerate the synth parameters and diff them around the editor session.
    #[arg(long, value_parser = parse_bool, num_args = 0..=1, default_value = "true",
          default_missing_value = "true", action = ArgAction::Set)]
    pub enumerate_params: bool,

    /// Output the raw state of the synth.
    #[arg(long, value_parser = parse_bool, num_args = 0..=1, default_value = "false",
          default_missing_value = "true", action = ArgAction::Set)]
    pub output_state: bool,

    /// Filename to save the initial raw state.
    #[arg(long, default_value = "synth_raw_state_initial.bin")]
    pub out_state_file_initial: PathBuf,

    /// Filename to save the new raw state.
    #[arg(long, default_value = "synth_raw_state_new.bin")]
    pub out_state_file_new: PathBuf,

    /// Filename to save the initial raw state XML part.
    #[arg(long, default_value = "synth_raw_state_initial.xml")]
    pub out_state_file_initial_xml: PathBuf,

    /// Filename to save the new raw state XML part.
    #[arg(long, default_value = "synth_raw_state_new.xml")]
    pub out_state_file_new_xml: PathBuf,

    /// Force overwrite of existing files.
    #[arg(long, value_parser = parse_bool, num_args = 0..=1, default_value = "false",
          default_missing_value = "true", action = ArgAction::Set)]
    pub force: bool,

    /// Name fragment used to filter the installed plugin listing (repeatable).
    #[arg(long = "plugin-filter", value_name = "NAME", action = ArgAction::Append,
          default_values_t = [String::from("Vital"), String::from("Serum")])]
    pub plugin_filters: Vec<String>,

    /// Print every property of the given parameter key (repeatable).
    #[arg(long = "describe-param", value_name = "KEY", action = ArgAction::Append)]
    pub describe_params: Vec<String>,

    /// Second plugin whose parameter keys are compared with the synth's.
    #[arg(long, value_name = "PATH")]
    pub compare_with: Option<PathBuf>,

    /// Save both parameter snapshots and raw states as JSON.
    #[arg(long, value_name = "PATH")]
    pub out_params_json: Option<PathBuf>,

    /// Skip opening the plugin editor.
    #[arg(long)]
    pub no_editor: bool,
}

impl Args {
    /// Every file this run may write, for the overwrite guard.
    pub fn output_paths(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if self.output_state {
            paths.extend([
                self.out_state_file_initial.clone(),
                self.out_state_file_initial_xml.clone(),
                self.out_state_file_new.clone(),
                self.out_state_file_new_xml.clone(),
            ]);
        }
        paths.extend(self.out_params_json.iter().cloned());
        paths
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let path = |p: &PathBuf| p.display().to_string();
        let entries = [
            ("synth_path", self.synth_path.clone()),
            ("enumerate_plugins", self.enumerate_plugins.to_string()),
            ("enumerate_params", self.enumerate_params.to_string()),
            ("output_state", self.output_state.to_string()),
            ("out_state_file_initial", path(&self.out_state_file_initial)),
            ("out_state_file_new", path(&self.out_state_file_new)),
            ("out_state_file_initial_xml", path(&self.out_state_file_initial_xml)),
            ("out_state_file_new_xml", path(&self.out_state_file_new_xml)),
            ("force", self.force.to_string()),
            ("plugin_filters", format!("{:?}", self.plugin_filters)),
            ("describe_params", format!("{:?}", self.describe_params)),
            ("compare_with", format!("{:?}", self.compare_with)),
            ("out_params_json", format!("{:?}", self.out_params_json)),
            ("no_editor", self.no_editor.to_string()),
        ];
        entries
            .into_iter()
            .map(|(key, value)| format!("  {key}: {value},"))
            .collect()
    }

    pub fn print_summary(&self) {
        println!("Args:");
        for line in self.summary_lines() {
            println!("{line}");
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("synth-probe").chain(extra.iter().copied())).unwrap()
    }

    #[test]
    fn parse_bool_accepts_permissive_forms() {
        for v in ["yes", "TRUE", "t", "Y", "1"] {
            assert_eq!(parse_bool(v), Ok(true), "{v}");
        }
        for v in ["no", "False", "f", "N", "0"] {
            assert_eq!(parse_bool(v), Ok(false), "{v}");
        }
        assert_eq!(parse_bool("maybe"), Err("Boolean value expected.".to_string()));
        assert!(parse_bool("").is_err());
    }

    #[test]
    fn defaults_match_the_documented_ones() {
        let args = parse(&[]);
        assert!(args.enumerate_plugins);
        assert!(args.enumerate_params);
        assert!(!args.output_state);
        assert!(!args.force);
        assert_eq!(args.out_state_file_new_xml, PathBuf::from("synth_raw_state_new.xml"));
        assert_eq!(args.plugin_filters, ["Vital", "Serum"]);
        assert!(args.output_paths().is_empty());
    }

    #[test]
    fn bare_bool_flag_means_true_and_values_are_parsed() {
        let args = parse(&["--output-state", "--force", "--enumerate-plugins", "no"]);
        assert!(args.output_state);
        assert!(args.force);
        assert!(!args.enumerate_plugins);

        let args = parse(&["--enumerate-params", "0", "--force=y"]);
        assert!(!args.enumerate_params);
        assert!(args.force);
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let err = Args::try_parse_from(["synth-probe", "--force", "maybe"]).unwrap_err();
        assert!(err.to_string().contains("Boolean value expected."));
    }

    #[test]
    fn output_paths_cover_state_files_and_json() {
        let args = parse(&["--output-state", "--out-params-json", "session.json"]);
        let paths = args.output_paths();
        assert_eq!(paths.len(), 5);
        assert_eq!(paths[0], PathBuf::from("synth_raw_state_initial.bin"));
        assert_eq!(paths[4], PathBuf::from("session.json"));

        let args = parse(&["--out-params-json", "only.json"]);
        assert_eq!(args.output_paths(), [PathBuf::from("only.json")]);
    }

    #[test]
    fn filters_replace_defaults_when_given() {
        let args = parse(&["--plugin-filter", "Diva", "--plugin-filter", "Pigments"]);
        assert_eq!(args.plugin_filters, ["Diva", "Pigments"]);
        assert!(args.summary_lines().iter().any(|l| l == "  force: false,"));
    }
}
