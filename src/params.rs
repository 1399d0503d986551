//! Plugin parameter model.
//!
//! A [`Parameter`] carries the descriptive attributes a host can read back from
//! a plugin. Formats differ in what they expose, so attributes that a format
//! cannot supply are `None` and are reported as missing instead of failing.

use std::fmt;

use indexmap::IndexMap;

/// Attribute names in display order.
pub const PROPERTY_NAMES: [&str; 20] = [
    "index",
    "name",
    "python_name",
    "string_value",
    "raw_value",
    "default_raw_value",
    "range",
    "max_value",
    "min_value",
    "step_size",
    "approximate_step_size",
    "num_steps",
    "type",
    "units",
    "label",
    "is_discrete",
    "is_boolean",
    "is_orientation_inverted",
    "is_automatable",
    "is_meta_parameter",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Float,
    Boolean,
    Choice,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Float => write!(f, "float"),
            ValueType::Boolean => write!(f, "bool"),
            ValueType::Choice => write!(f, "choice"),
        }
    }
}

/// Plain-unit range of a parameter. `step` is absent for continuous values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub step: Option<f64>,
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min, max) = (format_value(self.min), format_value(self.max));
        match self.step {
            Some(step) => write!(f, "({min}, {max}, {})", format_value(step)),
            None => write!(f, "({min}, {max}, None)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Format-native identifier (VST3 `ParamID`).
    pub id: u32,
    pub index: usize,
    pub name: String,
    /// Key under which the parameter is stored in a [`ParameterMap`].
    pub python_name: String,
    pub string_value: Option<String>,
    /// Normalized value in `0.0..=1.0`.
    pub raw_value: f64,
    pub default_raw_value: Option<f64>,
    pub range: Option<ParamRange>,
    pub step_size: Option<f64>,
    pub approximate_step_size: Option<f64>,
    pub num_steps: Option<u32>,
    pub value_type: Option<ValueType>,
    pub units: Option<String>,
    pub label: Option<String>,
    pub is_discrete: Option<bool>,
    pub is_boolean: Option<bool>,
    pub is_orientation_inverted: Option<bool>,
    pub is_automatable: Option<bool>,
    pub is_meta_parameter: Option<bool>,
}

impl Parameter {
    /// Bare parameter with only the mandatory fields filled in.
    pub fn new(id: u32, index: usize, name: impl Into<String>, raw_value: f64) -> Self {
        Self {
            id,
            index,
            name: name.into(),
            python_name: String::new(),
            string_value: None,
            raw_value,
            default_raw_value: None,
            range: None,
            step_size: None,
            approximate_step_size: None,
            num_steps: None,
            value_type: None,
            units: None,
            label: None,
            is_discrete: None,
            is_boolean: None,
            is_orientation_inverted: None,
            is_automatable: None,
            is_meta_parameter: None,
        }
    }

    pub fn min_value(&self) -> Option<f64> {
        self.range.map(|r| r.min)
    }

    pub fn max_value(&self) -> Option<f64> {
        self.range.map(|r| r.max)
    }

    /// Looks an attribute up by its display name.
    ///
    /// Returns `None` both for unknown names and for attributes the plugin
    /// format does not provide.
    pub fn property(&self, name: &str) -> Option<String> {
        fn show<T: ToString>(v: &Option<T>) -> Option<String> {
            v.as_ref().map(ToString::to_string)
        }
        fn show_value(v: Option<f64>) -> Option<String> {
            v.map(format_value)
        }

        match name {
            "index" => Some(self.index.to_string()),
            "name" => Some(self.name.clone()),
            "python_name" => Some(self.python_name.clone()),
            "string_value" => self.string_value.clone(),
            "raw_value" => Some(format_value(self.raw_value)),
            "default_raw_value" => show_value(self.default_raw_value),
            "range" => show(&self.range),
            "max_value" => show_value(self.max_value()),
            "min_value" => show_value(self.min_value()),
            "step_size" => show_value(self.step_size),
            "approximate_step_size" => show_value(self.approximate_step_size),
            "num_steps" => show(&self.num_steps),
            "type" => show(&self.value_type),
            "units" => self.units.clone(),
            "label" => self.label.clone(),
            "is_discrete" => show(&self.is_discrete),
            "is_boolean" => show(&self.is_boolean),
            "is_orientation_inverted" => show(&self.is_orientation_inverted),
            "is_automatable" => show(&self.is_automatable),
            "is_meta_parameter" => show(&self.is_meta_parameter),
            _ => None,
        }
    }
}

/// Floats keep their fractional part (`1.0`, not `1`), so printed values and
/// keys line up with listings produced by Python-based tools.
pub fn format_value(value: f64) -> String {
    format!("{value:?}")
}

/// Property listing for one parameter, one line per attribute.
pub fn parameter_property_lines(parameter: &Parameter) -> Vec<String> {
    PROPERTY_NAMES
        .iter()
        .map(|name| match parameter.property(name) {
            Some(value) => format!("{name}: {value}"),
            None => format!("{name}: Property does not exist."),
        })
        .collect()
}

pub fn print_parameter_properties(parameter: &Parameter) {
    for line in parameter_property_lines(parameter) {
        println!("    {line}");
    }
}

/// Normalizes a display name into a snake_case key.
pub fn python_style_name(name: &str) -> String {
    let name = name.replace('#', "_sharp").to_lowercase();

    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }

    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Parameters keyed by their normalized name, in plugin enumeration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterMap(IndexMap<String, Parameter>);

impl ParameterMap {
    /// Assigns unique keys and collects the parameters.
    ///
    /// Colliding names get `_2`, `_3`, … in enumeration order; names that
    /// normalize to nothing fall back to `param_<index>`.
    pub fn from_parameters(parameters: impl IntoIterator<Item = Parameter>) -> Self {
        let mut map = IndexMap::new();
        for mut parameter in parameters {
            let mut base = python_style_name(&parameter.name);
            if base.is_empty() {
                base = format!("param_{}", parameter.index);
            }

            let mut key = base.clone();
            let mut suffix = 2;
            while map.contains_key(&key) {
                key = format!("{base}_{suffix}");
                suffix += 1;
            }

            parameter.python_name = key.clone();
            map.insert(key, parameter);
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
