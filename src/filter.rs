/// Keeps the paths that contain at least one of `filters`, ignoring case.
pub fn filter_by_names<S: AsRef<str>>(paths: &[String], filters: &[S]) -> Vec<String> {
    let needles: Vec<String> = filters.iter().map(|f| f.as_ref().to_lowercase()).collect();

    paths
        .iter()
        .filter(|path| {
            let path = path.to_lowercase();
            needles.iter().any(|needle| path.contains(needle.as_str()))
        })
        .cloned()
        .collect()
}

/// Prints `items` pretty-printed, every line shifted right by `indent`.
pub fn print_with_indent<T: std::fmt::Debug>(items: &T, indent: usize) {
    let pad = " ".repeat(indent);
    for line in format!("{items:#?}").lines() {
        println!("{pad}{line}");
    }
}

pub fn report_filtered(vst3: &[String], au: &[String], filters: &[String]) {
    println!("Showing installed VST/AU plugins, filtered by names:");
    println!("Plugin filters: {filters:?}");

    println!("  Filtered VST3 Plugins:");
    print_with_indent(&filter_by_names(vst3, filters), 4);

    println!("  Filtered AudioUnit Plugins:");
    print_with_indent(&filter_by_names(au, filters), 4);
}

#[cfg(test)]
mod tests {
    use super::filter_by_names;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_any_term_case_insensitively() {
        let installed = paths(&[
            "/Library/Audio/Plug-Ins/VST3/Vital.vst3",
            "/Library/Audio/Plug-Ins/VST3/Diva.vst3",
            "/Library/Audio/Plug-Ins/VST3/SERUM.vst3",
            "/Library/Audio/Plug-Ins/VST3/OTT.vst3",
        ]);

        let hits = filter_by_names(&installed, &["vital", "Serum"]);
        assert_eq!(
            hits,
            paths(&[
                "/Library/Audio/Plug-Ins/VST3/Vital.vst3",
                "/Library/Audio/Plug-Ins/VST3/SERUM.vst3",
            ])
        );
    }

    #[test]
    fn term_may_match_any_part_of_the_path() {
        let installed = paths(&["/opt/vital-plugins/Synth.vst3", "/opt/other/Synth.vst3"]);
        assert_eq!(
            filter_by_names(&installed, &["VITAL"]),
            paths(&["/opt/vital-plugins/Synth.vst3"])
        );
    }

    #[test]
    fn empty_filter_list_keeps_nothing() {
        let installed = paths(&["/a/Vital.vst3"]);
        let none: [&str; 0] = [];
        assert!(filter_by_names(&installed, &none).is_empty());
    }
}
