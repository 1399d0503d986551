use std::path::Path;

use vst3::Steinberg::Vst::ParameterInfo_::ParameterFlags_::kCanAutomate;
use vst3::Steinberg::Vst::{
    IComponent, IComponentHandler, IComponentTrait, IConnectionPoint, IConnectionPointTrait,
    IEditController, IEditControllerTrait, ParameterInfo, String128,
};
use vst3::Steinberg::{kResultFalse, kResultOk, tresult, FUnknown, IBStream, IPluginBaseTrait, TUID};
use vst3::{ComPtr, ComWrapper};

use super::com::{string128_to_string, ComponentHandler, HostApplication, MemoryStream};
use super::editor;
use super::error::{HostError, LoadStage, Result};
use super::module::{PluginModule, AUDIO_MODULE_CLASS};
use super::PluginHandle;
use crate::params::{ParamRange, Parameter, ParameterMap, ValueType};
use crate::state_xml::{plugin_state_xml, wrap_vst3_xml};

const SYNTH_LIKE: &[&str] = &[
    "synth",
    "synthesizer",
    "sampler",
    "drum",
    "drum machine",
    "drum-machine",
    "musicalinstrument",
];

fn sub_category_tokens(sub_categories: &str) -> Vec<String> {
    sub_categories
        .split('|')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn is_instrument_category(sub_categories: &str) -> bool {
    sub_category_tokens(sub_categories)
        .iter()
        .any(|t| t == "instrument" || SYNTH_LIKE.contains(&t.as_str()))
}

/// `Fx` marks an effect; anything that is not an instrument counts as one too.
pub fn is_effect_category(sub_categories: &str) -> bool {
    sub_category_tokens(sub_categories).iter().any(|t| t == "fx")
        || !is_instrument_category(sub_categories)
}

/// Values read back from the controller for one parameter.
struct ParamReadout {
    raw_value: f64,
    display: Option<String>,
    plain_min: f64,
    plain_max: f64,
}

fn build_parameter(index: usize, info: &ParameterInfo, readout: ParamReadout) -> Parameter {
    let mut name = string128_to_string(&info.title);
    let short_title = string128_to_string(&info.shortTitle);
    if name.is_empty() {
        name = short_title.clone();
    }

    let mut parameter = Parameter::new(info.id, index, name, readout.raw_value);
    let step_count = info.stepCount.max(0) as u32;
    let discrete = step_count > 0;
    let step = discrete.then(|| (readout.plain_max - readout.plain_min) / step_count as f64);

    parameter.string_value = readout.display;
    parameter.default_raw_value = Some(info.defaultNormalizedValue);
    parameter.range = Some(ParamRange {
        min: readout.plain_min,
        max: readout.plain_max,
        step,
    });
    parameter.step_size = step;
    parameter.approximate_step_size = step;
    parameter.num_steps = discrete.then_some(step_count + 1);
    parameter.value_type = Some(match step_count {
        0 => ValueType::Float,
        1 => ValueType::Boolean,
        _ => ValueType::Choice,
    });
    parameter.units = Some(string128_to_string(&info.units));
    parameter.label = Some(short_title);
    parameter.is_discrete = Some(discrete);
    parameter.is_boolean = Some(step_count == 1);
    parameter.is_automatable = Some(info.flags & kCanAutomate as i32 != 0);
    parameter
}

/// Runs `write` against a fresh host stream and returns what was written, or
/// the plugin's result code on failure.
fn read_state(write: impl FnOnce(*mut IBStream) -> tresult) -> std::result::Result<Vec<u8>, tresult> {
    let stream = ComWrapper::new(MemoryStream::new());
    let stream_ptr = stream.to_com_ptr::<IBStream>().ok_or(kResultFalse)?;
    let result = write(stream_ptr.as_ptr());
    if result != kResultOk {
        return Err(result);
    }
    Ok(stream.data())
}

pub struct VstInstance {
    name: String,
    sub_categories: String,
    // Released in this order, before the module is unloaded.
    connection: Option<(ComPtr<IConnectionPoint>, ComPtr<IConnectionPoint>)>,
    controller: Option<ComPtr<IEditController>>,
    separate_controller: bool,
    component: ComPtr<IComponent>,
    handler: ComWrapper<ComponentHandler>,
    _host_app: ComWrapper<HostApplication>,
    _module: PluginModule,
}

impl VstInstance {
    pub fn load(path: &Path) -> Result<Self> {
        let module = PluginModule::load(path)?;

        let classes = module.classes();
        for class in &classes {
            log::debug!("Found class: '{}', Category: '{}'", class.name, class.category);
        }
        let class = classes
            .iter()
            .find(|c| c.category == AUDIO_MODULE_CLASS)
            .ok_or_else(|| {
                HostError::load(path, LoadStage::Instantiation, "factory has no Audio Module Class")
            })?;

        let name = if class.name.is_empty() {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Unknown Plugin".to_string())
        } else {
            class.name.clone()
        };
        let sub_categories = class.sub_categories.clone().unwrap_or_default();
        log::info!(
            "Using class '{}' [{}] from {}",
            name,
            sub_categories,
            module.binary().display()
        );

        let host_app = ComWrapper::new(HostApplication::from_env());
        let host_unknown = host_app.to_com_ptr::<FUnknown>().ok_or_else(|| {
            HostError::load(path, LoadStage::Initialization, "failed to create host context")
        })?;
        log::debug!("Host context name: {}", host_app.name());

        let component = module
            .create_instance::<IComponent>(&class.cid)
            .map_err(|reason| HostError::load(path, LoadStage::Instantiation, reason))?;

        let result = unsafe { component.initialize(host_unknown.as_ptr()) };
        if result != kResultOk {
            return Err(HostError::load(
                path,
                LoadStage::Initialization,
                format!("IComponent::initialize failed (result={result})"),
            ));
        }

        let (controller, separate_controller) = match component.cast::<IEditController>() {
            Some(controller) => {
                log::info!("Single-component plugin (component implements IEditController)");
                (Some(controller), false)
            }
            None => {
                let controller = Self::create_separate_controller(&module, &component, &host_unknown);
                if controller.is_none() {
                    log::warn!("{name}: no edit controller, parameters and editor are unavailable");
                }
                (controller, true)
            }
        };

        let handler = ComWrapper::new(ComponentHandler);
        let mut instance = Self {
            name,
            sub_categories,
            connection: None,
            controller,
            separate_controller,
            component,
            handler,
            _host_app: host_app,
            _module: module,
        };
        instance.wire_controller();
        Ok(instance)
    }

    fn create_separate_controller(
        module: &PluginModule,
        component: &ComPtr<IComponent>,
        host_unknown: &ComPtr<FUnknown>,
    ) -> Option<ComPtr<IEditController>> {
        let mut cid: TUID = [0; 16];
        if unsafe { component.getControllerClassId(&mut cid) } != kResultOk {
            log::debug!("Component reports no controller class ID");
            return None;
        }

        let controller = match module.create_instance::<IEditController>(&cid) {
            Ok(controller) => controller,
            Err(e) => {
                log::warn!("Failed to create separate controller: {e}");
                return None;
            }
        };
        let result = unsafe { controller.initialize(host_unknown.as_ptr()) };
        if result != kResultOk {
            log::warn!("IEditController::initialize failed (result={result})");
            return None;
        }
        log::info!("Separate controller created and initialized");
        Some(controller)
    }

    /// Handler, connection points, then the component state mirrored into
    /// the controller.
    fn wire_controller(&mut self) {
        let Some(controller) = &self.controller else {
            return;
        };

        if let Some(handler) = self.handler.to_com_ptr::<IComponentHandler>() {
            let result = unsafe { controller.setComponentHandler(handler.as_ptr()) };
            log::debug!("setComponentHandler -> {result}");
        }

        let connection = match (
            self.separate_controller,
            self.component.cast::<IConnectionPoint>(),
            controller.cast::<IConnectionPoint>(),
        ) {
            (true, Some(comp_cp), Some(ctrl_cp)) => {
                let (r1, r2) = unsafe {
                    (
                        comp_cp.connect(ctrl_cp.as_ptr()),
                        ctrl_cp.connect(comp_cp.as_ptr()),
                    )
                };
                log::debug!("IConnectionPoint Component->Controller: {r1}, Controller->Component: {r2}");
                Some((comp_cp, ctrl_cp))
            }
            _ => None,
        };

        Self::sync_controller_state(&self.component, controller);
        self.connection = connection;
    }

    fn sync_controller_state(component: &ComPtr<IComponent>, controller: &ComPtr<IEditController>) {
        let stream = ComWrapper::new(MemoryStream::new());
        let Some(stream_ptr) = stream.to_com_ptr::<IBStream>() else {
            return;
        };
        let get_res = unsafe { component.getState(stream_ptr.as_ptr()) };
        if get_res != kResultOk {
            log::debug!("Get state from component failed (or not supported). Result: {get_res}");
            return;
        }
        stream.rewind();
        let set_res = unsafe { controller.setComponentState(stream_ptr.as_ptr()) };
        if set_res == kResultOk {
            log::debug!("Controller state synchronized");
        } else {
            log::warn!("Failed to sync controller state: {set_res}");
        }
    }

    fn read_parameter(controller: &ComPtr<IEditController>, index: i32) -> Option<Parameter> {
        let mut info: ParameterInfo = unsafe { std::mem::zeroed() };
        if unsafe { controller.getParameterInfo(index, &mut info) } != kResultOk {
            log::debug!("getParameterInfo({index}) failed");
            return None;
        }

        let raw_value = unsafe { controller.getParamNormalized(info.id) };
        let mut text: String128 = [0; 128];
        let display = (unsafe { controller.getParamStringByValue(info.id, raw_value, &mut text) } == kResultOk)
            .then(|| string128_to_string(&text));
        let readout = ParamReadout {
            raw_value,
            display,
            plain_min: unsafe { controller.normalizedParamToPlain(info.id, 0.0) },
            plain_max: unsafe { controller.normalizedParamToPlain(info.id, 1.0) },
        };
        Some(build_parameter(index as usize, &info, readout))
    }
}

impl PluginHandle for VstInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_instrument(&self) -> bool {
        is_instrument_category(&self.sub_categories)
    }

    fn is_effect(&self) -> bool {
        is_effect_category(&self.sub_categories)
    }

    fn parameters(&self) -> Result<ParameterMap> {
        let Some(controller) = &self.controller else {
            return Ok(ParameterMap::default());
        };
        let count = unsafe { controller.getParameterCount() }.max(0);
        let parameters = (0..count).filter_map(|index| Self::read_parameter(controller, index));
        Ok(ParameterMap::from_parameters(parameters))
    }

    fn raw_state(&self) -> Result<Vec<u8>> {
        let component = read_state(|stream| unsafe { self.component.getState(stream) })
            .map_err(|result| {
                HostError::State(format!("IComponent::getState failed (result={result})"))
            })?;

        let controller = self.controller.as_ref().and_then(|controller| {
            read_state(|stream| unsafe { controller.getState(stream) })
                .map_err(|result| log::debug!("IEditController::getState failed (result={result})"))
                .ok()
        });

        let xml = plugin_state_xml(&component, controller.as_deref());
        Ok(wrap_vst3_xml(&xml))
    }

    fn show_editor(&mut self) -> Result<()> {
        let controller = self.controller.as_ref().ok_or(HostError::NoEditor)?;
        editor::run_editor(controller, &self.name)
    }
}

impl Drop for VstInstance {
    fn drop(&mut self) {
        if let Some((comp_cp, ctrl_cp)) = self.connection.take() {
            unsafe {
                comp_cp.disconnect(ctrl_cp.as_ptr());
                ctrl_cp.disconnect(comp_cp.as_ptr());
            }
        }

        if let Some(controller) = self.controller.take() {
            unsafe {
                controller.setComponentHandler(std::ptr::null_mut());
                if self.separate_controller {
                    controller.terminate();
                }
            }
        }

        unsafe {
            self.component.terminate();
        }
        log::debug!("Unloaded {}", self.name);
    }
}
