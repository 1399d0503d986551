pub mod com;
pub mod editor;
pub mod error;
pub mod instance;
pub mod module;
pub mod run_loop;
pub mod scanner;

use std::path::Path;

use crate::params::ParameterMap;

pub use error::{HostError, LoadStage};
pub use instance::VstInstance;

/// A loaded plugin, as seen by the probe.
pub trait PluginHandle {
    fn name(&self) -> &str;
    fn is_instrument(&self) -> bool;
    fn is_effect(&self) -> bool;
    fn parameters(&self) -> error::Result<ParameterMap>;
    /// Opaque state blob, as the plugin serializes it.
    fn raw_state(&self) -> error::Result<Vec<u8>>;
    /// Shows the plugin's editor and blocks until it is closed.
    fn show_editor(&mut self) -> error::Result<()>;
}

/// Plugin discovery and loading.
pub trait PluginHost {
    fn installed_vst3_plugins(&self) -> Vec<String>;
    fn installed_au_plugins(&self) -> Vec<String>;
    fn load_plugin(&self, path: &Path) -> error::Result<Box<dyn PluginHandle>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginFormat {
    Vst3,
    AudioUnit,
}

impl PluginFormat {
    /// `.component` bundles are AudioUnits; everything else is tried as VST3.
    pub fn from_path(path: &Path) -> Self {
        let is_component = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("component"));
        if is_component {
            PluginFormat::AudioUnit
        } else {
            PluginFormat::Vst3
        }
    }
}

/// The in-process VST3 host.
#[derive(Debug, Default, Clone, Copy)]
pub struct Vst3Host;

impl PluginHost for Vst3Host {
    fn installed_vst3_plugins(&self) -> Vec<String> {
        scanner::installed_vst3_plugins()
    }

    fn installed_au_plugins(&self) -> Vec<String> {
        scanner::installed_au_plugins()
    }

    fn load_plugin(&self, path: &Path) -> error::Result<Box<dyn PluginHandle>> {
        match PluginFormat::from_path(path) {
            PluginFormat::AudioUnit => Err(HostError::UnsupportedFormat(path.to_path_buf())),
            PluginFormat::Vst3 => Ok(Box::new(VstInstance::load(path)?)),
        }
    }
}
