use std::env;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const VST3_PATH_ENV: &str = "VST3_PATH";

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

fn default_vst3_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(windows)]
    {
        paths.push(PathBuf::from(r"C:\Program Files\Common Files\VST3"));
        paths.push(PathBuf::from(r"C:\Program Files\Steinberg\VST3"));
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/Library/Audio/Plug-Ins/VST3"));
        if let Some(home) = home_dir() {
            paths.push(home.join("Library/Audio/Plug-Ins/VST3"));
        }
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        if let Some(home) = home_dir() {
            paths.push(home.join(".vst3"));
        }
        paths.push(PathBuf::from("/usr/lib/vst3"));
        paths.push(PathBuf::from("/usr/local/lib/vst3"));
    }

    paths
}

/// Platform VST3 directories followed by the entries of `VST3_PATH`.
pub fn vst3_search_paths() -> Vec<PathBuf> {
    let mut paths = default_vst3_paths();
    if let Some(extra) = env::var_os(VST3_PATH_ENV) {
        paths.extend(env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }
    paths
}

pub fn au_search_paths() -> Vec<PathBuf> {
    if !cfg!(target_os = "macos") {
        return Vec::new();
    }
    let mut paths = vec![PathBuf::from("/Library/Audio/Plug-Ins/Components")];
    if let Some(home) = home_dir() {
        paths.push(home.join("Library/Audio/Plug-Ins/Components"));
    }
    paths
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Collects every path under `roots` with extension `ext`, without looking
/// inside matching bundle directories. Sorted and deduplicated.
pub fn find_bundles(roots: &[PathBuf], ext: &str) -> Vec<String> {
    let mut found = Vec::new();

    for root in roots {
        if !root.exists() {
            continue;
        }
        let mut walker = WalkDir::new(root).follow_links(true).into_iter();
        while let Some(entry_res) = walker.next() {
            let entry = match entry_res {
                Ok(e) => e,
                Err(e) => {
                    log::debug!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };

            let entry_path = entry.path();
            if !has_extension(entry_path, ext) {
                continue;
            }
            // The inner binary of a bundle shares its extension.
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            found.push(entry_path.to_string_lossy().to_string());
        }
    }

    found.sort();
    found.dedup();
    found
}

pub fn installed_vst3_plugins() -> Vec<String> {
    let roots = vst3_search_paths();
    let plugins = find_bundles(&roots, "vst3");
    log::info!("Found {} VST3 plugins in {:?}", plugins.len(), roots);
    plugins
}

pub fn installed_au_plugins() -> Vec<String> {
    let roots = au_search_paths();
    let plugins = find_bundles(&roots, "component");
    log::info!("Found {} AudioUnit plugins in {:?}", plugins.len(), roots);
    plugins
}
