//! Loading a VST3 module binary and reading its factory.

use std::ffi::{c_char, c_void, OsStr};
use std::path::{Path, PathBuf};

use libloading::Library;
use vst3::Steinberg::{
    kResultOk, IPluginFactory, IPluginFactory2, IPluginFactory2Trait, IPluginFactoryTrait,
    PClassInfo, PClassInfo2, TUID,
};
use vst3::{ComPtr, Interface};
use walkdir::WalkDir;

use super::com::char_array_to_string;
use super::error::{HostError, LoadStage, Result};

pub const AUDIO_MODULE_CLASS: &str = "Audio Module Class";

type GetPluginFactoryFn = unsafe extern "system" fn() -> *mut IPluginFactory;
type ExitFn = unsafe extern "system" fn() -> bool;

/// A class exported by a plugin factory.
#[derive(Debug, Clone)]
pub struct ClassInfo {
    pub cid: TUID,
    pub name: String,
    pub category: String,
    /// `|`-separated, e.g. `Instrument|Synth`. Only present with `IPluginFactory2`.
    pub sub_categories: Option<String>,
}

/// IID of `I` in the form `createInstance` expects.
pub fn iid_of<I: Interface>() -> TUID {
    let mut tuid: TUID = [0; 16];
    for (dst, src) in tuid.iter_mut().zip(I::IID.iter()) {
        *dst = *src as c_char;
    }
    tuid
}

fn arch_dir() -> String {
    let arch = std::env::consts::ARCH;
    if cfg!(target_os = "macos") {
        "MacOS".to_string()
    } else if cfg!(windows) {
        match arch {
            "aarch64" => "arm64-win".to_string(),
            "x86" => "x86-win".to_string(),
            _ => "x86_64-win".to_string(),
        }
    } else {
        format!("{arch}-linux")
    }
}

fn binary_name(stem: &str) -> String {
    if cfg!(target_os = "macos") {
        stem.to_string()
    } else if cfg!(windows) {
        format!("{stem}.vst3")
    } else {
        format!("{stem}.so")
    }
}

/// Binary inside a bundle at its standard location, e.g.
/// `Foo.vst3/Contents/x86_64-linux/Foo.so`.
pub fn bundle_binary_path(bundle: &Path) -> PathBuf {
    let stem = bundle
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    bundle
        .join("Contents")
        .join(arch_dir())
        .join(binary_name(&stem))
}

fn candidate_binaries(bundle: &Path) -> Vec<PathBuf> {
    WalkDir::new(bundle)
        .follow_links(false)
        .max_depth(8)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.into_path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let ext = p
                .extension()
                .and_then(OsStr::to_str)
                .map(|s| s.to_ascii_lowercase())
                .unwrap_or_default();
            matches!(ext.as_str(), "vst3" | "dll" | "so" | "dylib")
                || (cfg!(target_os = "macos") && p.parent().is_some_and(|d| d.ends_with("MacOS")))
        })
        .collect()
}

fn has_plugin_factory(binary: &Path) -> bool {
    unsafe {
        let Ok(lib) = Library::new(binary) else {
            return false;
        };
        lib.get::<GetPluginFactoryFn>(b"GetPluginFactory").is_ok()
    }
}

/// Resolves a plugin path (single-file module or bundle directory) to the
/// binary that exports `GetPluginFactory`.
pub fn resolve_binary(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if !path.is_dir() {
        return None;
    }

    let standard = bundle_binary_path(path);
    if standard.is_file() {
        return Some(standard);
    }

    log::debug!(
        "{} not found, searching bundle for a module binary",
        standard.display()
    );
    candidate_binaries(path)
        .into_iter()
        .find(|bin| has_plugin_factory(bin))
}

/// A loaded module binary with its entry function already called.
pub struct PluginModule {
    // Field order is drop order: factory, then the library.
    factory: Option<ComPtr<IPluginFactory>>,
    exit_fn: Option<ExitFn>,
    binary: PathBuf,
    _library: Library,
}

impl PluginModule {
    pub fn load(path: &Path) -> Result<Self> {
        let binary = resolve_binary(path).ok_or_else(|| {
            HostError::load(path, LoadStage::Opening, "no VST3 module binary found")
        })?;
        log::info!("Loading VST3 module {}", binary.display());

        let library = unsafe { Library::new(&binary) }
            .map_err(|e| HostError::load(path, LoadStage::Opening, e.to_string()))?;

        Self::call_entry(&library).map_err(|reason| HostError::load(path, LoadStage::Opening, reason))?;
        let exit_fn = Self::exit_fn(&library);

        let get_factory = unsafe { library.get::<GetPluginFactoryFn>(b"GetPluginFactory") }
            .map_err(|e| HostError::load(path, LoadStage::Factory, format!("GetPluginFactory not found: {e}")))?;
        let factory = unsafe { ComPtr::from_raw(get_factory()) }
            .ok_or_else(|| HostError::load(path, LoadStage::Factory, "GetPluginFactory returned null"))?;

        Ok(Self {
            factory: Some(factory),
            exit_fn,
            binary,
            _library: library,
        })
    }

    #[cfg(windows)]
    fn call_entry(library: &Library) -> std::result::Result<(), String> {
        type InitFn = unsafe extern "system" fn() -> bool;
        if let Ok(init) = unsafe { library.get::<InitFn>(b"InitDll") } {
            if !unsafe { init() } {
                return Err("InitDll returned false".to_string());
            }
        }
        Ok(())
    }

    #[cfg(target_os = "macos")]
    fn call_entry(library: &Library) -> std::result::Result<(), String> {
        type EntryFn = unsafe extern "C" fn(*mut c_void) -> bool;
        if let Ok(entry) = unsafe { library.get::<EntryFn>(b"bundleEntry") } {
            if !unsafe { entry(std::ptr::null_mut()) } {
                return Err("bundleEntry returned false".to_string());
            }
        }
        Ok(())
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    fn call_entry(library: &Library) -> std::result::Result<(), String> {
        type EntryFn = unsafe extern "C" fn(*mut c_void) -> bool;
        match unsafe { library.get::<EntryFn>(b"ModuleEntry") } {
            Ok(entry) => {
                if !unsafe { entry(std::ptr::null_mut()) } {
                    return Err("ModuleEntry returned false".to_string());
                }
            }
            Err(_) => log::warn!("Module exports no ModuleEntry, continuing without it"),
        }
        Ok(())
    }

    fn exit_fn(library: &Library) -> Option<ExitFn> {
        let symbol: &[u8] = if cfg!(windows) {
            b"ExitDll"
        } else if cfg!(target_os = "macos") {
            b"bundleExit"
        } else {
            b"ModuleExit"
        };
        unsafe { library.get::<ExitFn>(symbol) }.ok().map(|s| *s)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn factory(&self) -> Option<&ComPtr<IPluginFactory>> {
        self.factory.as_ref()
    }

    pub fn classes(&self) -> Vec<ClassInfo> {
        let Some(factory) = self.factory() else {
            return Vec::new();
        };
        let factory2 = factory.cast::<IPluginFactory2>();

        let count = unsafe { factory.countClasses() }.max(0);
        let mut classes = Vec::with_capacity(count as usize);
        for index in 0..count {
            if let Some(factory2) = &factory2 {
                let mut info: PClassInfo2 = unsafe { std::mem::zeroed() };
                if unsafe { factory2.getClassInfo2(index, &mut info) } == kResultOk {
                    classes.push(ClassInfo {
                        cid: info.cid,
                        name: char_array_to_string(&info.name),
                        category: char_array_to_string(&info.category),
                        sub_categories: Some(char_array_to_string(&info.subCategories)),
                    });
                    continue;
                }
            }

            let mut info: PClassInfo = unsafe { std::mem::zeroed() };
            if unsafe { factory.getClassInfo(index, &mut info) } != kResultOk {
                log::debug!("getClassInfo({index}) failed");
                continue;
            }
            classes.push(ClassInfo {
                cid: info.cid,
                name: char_array_to_string(&info.name),
                category: char_array_to_string(&info.category),
                sub_categories: None,
            });
        }
        classes
    }

    /// Creates an instance of class `cid` and returns it as interface `I`.
    pub fn create_instance<I: Interface>(&self, cid: &TUID) -> std::result::Result<ComPtr<I>, String> {
        let factory = self.factory().ok_or_else(|| "factory already released".to_string())?;
        let iid = iid_of::<I>();
        let mut obj: *mut c_void = std::ptr::null_mut();
        let result = unsafe { factory.createInstance(cid.as_ptr(), iid.as_ptr(), &mut obj) };
        if result != kResultOk || obj.is_null() {
            return Err(format!("createInstance failed (result={result})"));
        }
        unsafe { ComPtr::from_raw(obj as *mut I) }.ok_or_else(|| "createInstance returned null".to_string())
    }
}

impl Drop for PluginModule {
    fn drop(&mut self) {
        self.factory.take();
        if let Some(exit) = self.exit_fn {
            unsafe {
                exit();
            }
        }
    }
}
