//! NetCDF-4 backend.
//!
//! Layout: one unlimited `time` dimension holding int32 epoch seconds, 1-D
//! data variables along it (f32 and i32 deflated with shuffle, strings as
//! NetCDF strings), 0-D latitude/longitude for fixed stations, and every
//! attribute written as stored in the [`Dataset`].

use super::{DatasetStore, atomic_write};
use crate::constants::{DEFLATE_LEVEL, FILL_VALUE, FILL_VALUE_F32, FILL_VALUE_TEXT, TIME_COLUMN};
use crate::error::{Result, SynopError};
use crate::metadata::{AttrValue, Attributes, Dataset};

use netcdf::AttributeValue;
use netcdf::types::{FloatType, IntType, NcVariableType};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct NetcdfStore;

impl NetcdfStore {
    pub fn new() -> Self {
        Self
    }
}

fn to_netcdf(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::Text(s) => AttributeValue::Str(s.clone()),
        AttrValue::Int(i) => AttributeValue::Int(*i),
        AttrValue::Float(f) => AttributeValue::Float(*f),
    }
}

fn from_netcdf(value: AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::Str(s) => Some(AttrValue::Text(s)),
        AttributeValue::Strs(s) => Some(AttrValue::Text(s.join(", "))),
        AttributeValue::Int(i) => Some(AttrValue::Int(i)),
        AttributeValue::Short(i) => Some(AttrValue::Int(i32::from(i))),
        AttributeValue::Longlong(i) => i32::try_from(i).ok().map(AttrValue::Int),
        AttributeValue::Float(f) => Some(AttrValue::Float(f)),
        AttributeValue::Double(f) => Some(AttrValue::Float(f as f32)),
        _ => None,
    }
}

fn put_attributes(variable: &mut netcdf::VariableMut<'_>, attributes: Option<&Attributes>) -> Result<()> {
    for (name, value) in attributes.into_iter().flatten() {
        // written through set_fill_value
        if name == "_FillValue" {
            continue;
        }
        variable.put_attribute(name, to_netcdf(value))?;
    }
    Ok(())
}

fn write_file(path: &Path, dataset: &Dataset) -> Result<()> {
    let mut file = netcdf::create(path)?;
    file.add_unlimited_dimension(TIME_COLUMN)?;

    let times = dataset
        .times()?
        .into_iter()
        .map(|t| {
            i32::try_from(t)
                .map_err(|_| SynopError::persistence(path, format!("time {} outside int32 range", t)))
        })
        .collect::<Result<Vec<i32>>>()?;
    let rows = times.len();

    {
        let mut variable = file.add_variable::<i32>(TIME_COLUMN, &[TIME_COLUMN])?;
        variable.set_compression(DEFLATE_LEVEL, true)?;
        put_attributes(&mut variable, dataset.variable_attributes.get(TIME_COLUMN))?;
        variable.put_values(&times, 0..rows)?;
    }

    for (name, value) in &dataset.scalars {
        let mut variable = file.add_variable::<f32>(name, &[])?;
        put_attributes(&mut variable, dataset.variable_attributes.get(name))?;
        variable.put_value(*value, ())?;
    }

    for column in dataset.frame.get_columns() {
        let name = column.name().as_str();
        if name == TIME_COLUMN {
            continue;
        }
        let attributes = dataset.variable_attributes.get(name);

        match column.dtype() {
            DataType::Int32 => {
                let values: Vec<i32> = column.i32()?.iter().map(|v| v.unwrap_or(FILL_VALUE)).collect();
                let mut variable = file.add_variable::<i32>(name, &[TIME_COLUMN])?;
                variable.set_compression(DEFLATE_LEVEL, true)?;
                variable.set_fill_value(FILL_VALUE)?;
                put_attributes(&mut variable, attributes)?;
                variable.put_values(&values, 0..rows)?;
            }
            DataType::Float32 => {
                let values: Vec<f32> = column
                    .f32()?
                    .iter()
                    .map(|v| v.unwrap_or(FILL_VALUE_F32))
                    .collect();
                let mut variable = file.add_variable::<f32>(name, &[TIME_COLUMN])?;
                variable.set_compression(DEFLATE_LEVEL, true)?;
                variable.set_fill_value(FILL_VALUE_F32)?;
                put_attributes(&mut variable, attributes)?;
                variable.put_values(&values, 0..rows)?;
            }
            DataType::String => {
                let mut variable =
                    file.add_variable_with_type(name, &[TIME_COLUMN], &NcVariableType::String)?;
                put_attributes(&mut variable, attributes)?;
                for (i, value) in column.str()?.iter().enumerate() {
                    variable.put_string(value.unwrap_or(FILL_VALUE_TEXT), i)?;
                }
            }
            other => {
                return Err(SynopError::persistence(
                    path,
                    format!("cannot store column {} of type {}", name, other),
                ));
            }
        }
    }

    for (name, value) in &dataset.global_attributes {
        file.add_attribute(name, to_netcdf(value))?;
    }

    file.close()?;
    Ok(())
}

fn read_attributes(variable: &netcdf::Variable<'_>) -> Result<Attributes> {
    let mut attributes = Attributes::new();
    for attribute in variable.attributes() {
        if let Some(value) = from_netcdf(attribute.value()?) {
            attributes.insert(attribute.name().to_string(), value);
        }
    }
    Ok(attributes)
}

fn read_file(path: &Path) -> Result<Dataset> {
    let file = netcdf::open(path)?;

    let time = file
        .variable(TIME_COLUMN)
        .ok_or_else(|| SynopError::persistence(path, "missing time variable"))?;
    let times: Vec<i64> = time
        .get_values::<i32, _>(..)?
        .into_iter()
        .map(i64::from)
        .collect();

    let mut columns = vec![Column::new(TIME_COLUMN.into(), times)];
    let mut scalars = BTreeMap::new();
    let mut variable_attributes = BTreeMap::new();
    variable_attributes.insert(TIME_COLUMN.to_string(), read_attributes(&time)?);

    for variable in file.variables() {
        let name = variable.name();
        if name == TIME_COLUMN {
            continue;
        }
        variable_attributes.insert(name.clone(), read_attributes(&variable)?);

        if variable.dimensions().is_empty() {
            scalars.insert(name, variable.get_value::<f32, _>(())?);
            continue;
        }

        let column = match variable.vartype() {
            NcVariableType::Int(IntType::I32) => {
                Column::new(name.as_str().into(), variable.get_values::<i32, _>(..)?)
            }
            NcVariableType::Float(FloatType::F32) => {
                Column::new(name.as_str().into(), variable.get_values::<f32, _>(..)?)
            }
            NcVariableType::String => {
                let values = (0..variable.len())
                    .map(|i| variable.get_string(i))
                    .collect::<netcdf::Result<Vec<String>>>()?;
                Column::new(name.as_str().into(), values)
            }
            other => {
                return Err(SynopError::persistence(
                    path,
                    format!("unsupported type {:?} for variable {}", other, name),
                ));
            }
        };
        columns.push(column);
    }

    let mut global_attributes = Attributes::new();
    for attribute in file.attributes() {
        if let Some(value) = from_netcdf(attribute.value()?) {
            global_attributes.insert(attribute.name().to_string(), value);
        }
    }

    let dataset = Dataset {
        frame: DataFrame::new(columns)?,
        scalars,
        variable_attributes,
        global_attributes,
    };
    debug!(
        "Read {} rows from {}",
        dataset.frame.height(),
        path.display()
    );
    Ok(dataset)
}

impl DatasetStore for NetcdfStore {
    fn write(&self, path: &Path, dataset: &Dataset) -> Result<()> {
        atomic_write(path, |tmp| write_file(tmp, dataset))
    }

    fn read(&self, path: &Path) -> Result<Dataset> {
        read_file(path)
    }

    fn remove(&self, path: &Path) -> Result<()> {
        std::fs::remove_file(path)
            .map_err(|e| SynopError::persistence(path, format!("cannot remove superseded file: {}", e)))
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
