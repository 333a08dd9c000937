//! The dataset description the loader consumes.
//!
//! These types mirror what a netCDF/HDF5 reader exposes: nested groups carrying attributes,
//! dimensions and variables, each variable with its dimension names, shape, attributes and
//! (optionally) its data. They deserialize from TOML, JSON or YAML:
//!
//! ```toml
//! location = "/data/ProcessedSonarData.nc"
//!
//! [attributes]
//! bald__isPrefixedBy = "prefix_list"
//!
//! [dimensions]
//! pdim0 = 11
//! pdim1 = 17
//!
//! [variables.parent_variable]
//! dimensions = ["pdim0", "pdim1"]
//! attributes = { bald__references = "child_variable" }
//!
//! [variables.prefix_list]
//! attributes = { bald__ = "https://www.opengis.net/def/binary-array-ld/" }
//! ```
//!
//! TOML has no null, so masked data points there are written as the variable's `_FillValue`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

use crate::error::BaldError;

/// netCDF's default fill value for floating point data.
pub const DEFAULT_FLOAT_FILL: f64 = 9.969209968386869e36;

/// An attribute value as stored in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Text(String),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    TextArray(Vec<String>),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(i) => Some(*i as f64),
            AttrValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

/// A single data element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl DataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataValue::Int(i) => Some(*i as f64),
            DataValue::Float(f) => Some(*f),
            DataValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Variable {
    #[serde(skip)]
    pub name: String,
    pub dimensions: Vec<String>,
    /// Filled from the enclosing groups' dimension tables when not given.
    pub shape: Vec<usize>,
    pub attributes: IndexMap<String, AttrValue>,
    /// `None` marks a masked element.
    pub values: Vec<Option<DataValue>>,
}

impl Variable {
    pub fn new(name: impl Into<String>) -> Self {
        Variable {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_dimensions(mut self, dims: &[(&str, usize)]) -> Self {
        self.dimensions = dims.iter().map(|(d, _)| d.to_string()).collect();
        self.shape = dims.iter().map(|(_, s)| *s).collect();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_values(mut self, values: Vec<Option<DataValue>>) -> Self {
        self.values = values;
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// A one-dimensional variable named after its only dimension.
    pub fn is_coordinate(&self) -> bool {
        self.dimensions.len() == 1 && self.dimensions[0] == self.name
    }

    /// The element at `index` unless it is missing, null or a fill value.
    pub fn unmasked(&self, index: usize) -> Option<&DataValue> {
        let value = self.values.get(index)?.as_ref()?;
        let fill = self.attributes.get("_FillValue");
        let masked = match (value, fill) {
            (DataValue::Text(s), Some(AttrValue::Text(f))) => s == f,
            (DataValue::Text(_), _) => false,
            (v, Some(f)) if v.as_f64().is_some() && v.as_f64() == f.as_f64() => true,
            (DataValue::Float(f), _) => *f == DEFAULT_FLOAT_FILL,
            _ => false,
        };
        (!masked).then_some(value)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    #[serde(skip)]
    pub name: String,
    pub attributes: IndexMap<String, AttrValue>,
    pub dimensions: IndexMap<String, usize>,
    pub variables: IndexMap<String, Variable>,
    pub groups: IndexMap<String, Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Group {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.insert(variable.name.clone(), variable);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.insert(group.name.clone(), group);
        self
    }

    pub fn find_group(&self, name: &str) -> Option<&Group> {
        self.groups.get(name)
    }

    pub fn find_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn attribute_text(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(AttrValue::as_text)
    }

    /// Copies map keys into `name` fields and fills missing shapes from dimension tables,
    /// innermost group first.
    fn normalize(&mut self, inherited: &IndexMap<String, usize>) -> Result<(), BaldError> {
        let mut dims = inherited.clone();
        for (name, size) in &self.dimensions {
            dims.insert(name.clone(), *size);
        }
        for (name, variable) in self.variables.iter_mut() {
            variable.name = name.clone();
            if variable.shape.is_empty() && !variable.dimensions.is_empty() {
                variable.shape = variable
                    .dimensions
                    .iter()
                    .map(|d| {
                        dims.get(d).copied().ok_or_else(|| {
                            BaldError::Config(format!(
                                "variable {name} uses undeclared dimension {d}"
                            ))
                        })
                    })
                    .collect::<Result<_, _>>()?;
            }
            if variable.shape.len() != variable.dimensions.len() {
                return Err(BaldError::Config(format!(
                    "variable {name} has {} dimensions but a shape of rank {}",
                    variable.dimensions.len(),
                    variable.shape.len()
                )));
            }
        }
        for (name, group) in self.groups.iter_mut() {
            group.name = name.clone();
            group.normalize(&dims)?;
        }
        Ok(())
    }
}

/// A whole file: its location (used for the default base URI) and root group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(flatten)]
    pub root: Group,
}

impl Dataset {
    pub fn new(location: Option<String>, root: Group) -> Result<Self, BaldError> {
        let mut dataset = Dataset { location, root };
        dataset.root.normalize(&IndexMap::new())?;
        Ok(dataset)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BaldError> {
        let dataset: Dataset = toml::from_str(content)?;
        Self::new(dataset.location, dataset.root)
    }

    pub fn from_json_str(content: &str) -> Result<Self, BaldError> {
        let dataset: Dataset = serde_json::from_str(content)?;
        Self::new(dataset.location, dataset.root)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, BaldError> {
        let dataset: Dataset = serde_yaml::from_str(content)?;
        Self::new(dataset.location, dataset.root)
    }

    /// Reads a description, choosing the format by file extension. The path becomes the
    /// location unless the description names one.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, BaldError> {
        let path = path.as_ref();
        tracing::debug!("Reading dataset description from {:?}", path);
        let content = read_to_string(path)?;
        let mut dataset = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            other => {
                return Err(BaldError::Config(format!(
                    "file suffix not supported: {}",
                    other.unwrap_or_default()
                )))
            }
        };
        if dataset.location.is_none() {
            dataset.location = Some(path.to_string_lossy().into_owned());
        }
        Ok(dataset)
    }
}
