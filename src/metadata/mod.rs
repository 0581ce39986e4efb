//! Dataset annotation.
//!
//! Turns an assembled station table into a [`Dataset`]: variables renamed
//! and downcast, missing values filled, CF/ACDD variable attributes and the
//! global attribute block attached.

pub mod duration;
pub mod keywords;
pub mod naming;
pub mod standard_names;

use self::standard_names::StandardNameLookup;

use crate::config::SynopConfig;
use crate::constants::{
    CONVENTIONS, COVERAGE_DATETIME_FORMAT, FILL_VALUE, FILL_VALUE_F32, FILL_VALUE_TEXT,
    HISTORY_SUFFIX, KEYWORDS_VOCABULARY, LATITUDE, LONGITUDE, NAMING_AUTHORITY,
    STANDARD_NAME_VOCABULARY, TIME_CALENDAR, TIME_COLUMN, TIME_UNITS, coverage, identifiers,
    station_type_label,
};
use crate::error::Result;
use crate::models::{FeatureType, StationScheme};
use crate::table::{StationFrame, VariableInfo};

use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Attribute value as stored in the output file
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Int(i32),
    Float(f32),
}

impl AttrValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        AttrValue::Text(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        AttrValue::Int(value)
    }
}

impl From<f32> for AttrValue {
    fn from(value: f32) -> Self {
        AttrValue::Float(value)
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

fn set(attributes: &mut Attributes, name: &str, value: impl Into<AttrValue>) {
    attributes.insert(name.to_string(), value.into());
}

/// Annotated station dataset, ready to persist
#[derive(Debug, Clone)]
pub struct Dataset {
    /// `time` (Int64 epoch seconds) plus Int32, Float32 and String variables
    pub frame: DataFrame,
    /// Scalar coordinates of fixed stations
    pub scalars: BTreeMap<String, f32>,
    pub variable_attributes: BTreeMap<String, Attributes>,
    pub global_attributes: Attributes,
}

impl Dataset {
    pub fn times(&self) -> Result<Vec<i64>> {
        let times = self.frame.column(TIME_COLUMN)?.cast(&DataType::Int64)?;
        Ok(times.i64()?.iter().flatten().collect())
    }

    /// First and last timestamp
    pub fn time_range(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
        let times = self.times()?;
        let first = times.iter().min().copied().and_then(epoch_to_datetime);
        let last = times.iter().max().copied().and_then(epoch_to_datetime);
        Ok(first.zip(last))
    }

    /// Rows selected by `mask`, coverage attributes recomputed
    pub fn filter_rows(&self, mask: &BooleanChunked) -> Result<Dataset> {
        let mut selected = Dataset {
            frame: self.frame.filter(mask)?,
            scalars: self.scalars.clone(),
            variable_attributes: self.variable_attributes.clone(),
            global_attributes: self.global_attributes.clone(),
        };
        refresh_coverage(&mut selected)?;
        Ok(selected)
    }

    pub fn global_text(&self, name: &str) -> Option<&str> {
        self.global_attributes.get(name).and_then(AttrValue::as_text)
    }
}

pub fn epoch_to_datetime(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

/// Downcast to 32 bits, replace nulls by the fill value and record `_FillValue`
pub fn apply_fill(dataset: &mut Dataset) -> Result<()> {
    let names: Vec<String> = dataset
        .frame
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| name != TIME_COLUMN)
        .collect();

    for name in names {
        let column = dataset.frame.column(&name)?;
        let dtype = column.dtype().clone();
        let attributes = dataset.variable_attributes.entry(name.clone()).or_default();

        let filled = if dtype.is_integer() {
            let cast = column.cast(&DataType::Int32)?;
            let values: Vec<i32> = cast.i32()?.iter().map(|v| v.unwrap_or(FILL_VALUE)).collect();
            set(attributes, "_FillValue", FILL_VALUE);
            Column::new(name.as_str().into(), values)
        } else if dtype.is_float() {
            let cast = column.cast(&DataType::Float32)?;
            let values: Vec<f32> = cast
                .f32()?
                .iter()
                .map(|v| v.unwrap_or(FILL_VALUE_F32))
                .collect();
            set(attributes, "_FillValue", FILL_VALUE_F32);
            Column::new(name.as_str().into(), values)
        } else {
            let cast = column.cast(&DataType::String)?;
            let values: Vec<String> = cast
                .str()?
                .iter()
                .map(|v| v.unwrap_or(FILL_VALUE_TEXT).to_string())
                .collect();
            attributes.remove("_FillValue");
            Column::new(name.as_str().into(), values)
        };
        dataset.frame.with_column(filled)?;
    }
    Ok(())
}

fn coordinate_bounds(dataset: &Dataset, name: &str) -> Result<Option<(f32, f32)>> {
    if let Some(value) = dataset.scalars.get(name) {
        return Ok(Some((*value, *value)));
    }
    let Ok(column) = dataset.frame.column(name) else {
        return Ok(None);
    };
    let values = column.cast(&DataType::Float32)?;
    let bounds = values
        .f32()?
        .iter()
        .flatten()
        .filter(|v| *v != FILL_VALUE_F32)
        .fold(None, |acc: Option<(f32, f32)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });
    Ok(bounds)
}

/// Recompute geospatial and temporal coverage from the rows present
pub fn refresh_coverage(dataset: &mut Dataset) -> Result<()> {
    let latitude = coordinate_bounds(dataset, LATITUDE)?;
    let longitude = coordinate_bounds(dataset, LONGITUDE)?;
    let time_range = dataset.time_range()?;
    let globals = &mut dataset.global_attributes;

    for (axis, bounds) in [("lat", latitude), ("lon", longitude)] {
        let min_key = format!("geospatial_{}_min", axis);
        let max_key = format!("geospatial_{}_max", axis);
        match bounds {
            Some((lo, hi)) => {
                set(globals, &min_key, format!("{:.3}", lo));
                set(globals, &max_key, format!("{:.3}", hi));
            }
            None => {
                globals.remove(&min_key);
                globals.remove(&max_key);
            }
        }
    }

    match time_range {
        Some((start, end)) => {
            set(
                globals,
                "time_coverage_start",
                start.format(COVERAGE_DATETIME_FORMAT).to_string(),
            );
            set(
                globals,
                "time_coverage_end",
                end.format(COVERAGE_DATETIME_FORMAT).to_string(),
            );
            set(
                globals,
                "time_coverage_duration",
                duration::iso8601_duration(start, end),
            );
        }
        None => {
            for key in ["time_coverage_start", "time_coverage_end", "time_coverage_duration"] {
                globals.remove(key);
            }
        }
    }
    Ok(())
}

/// `long_name` with the qualifier context spelled out
pub fn describe_long_name(humanized: String, info: &VariableInfo) -> String {
    if humanized.chars().any(|c| c.is_ascii_digit()) {
        return humanized;
    }
    let mut long_name = humanized;
    if let Some(height) = &info.height {
        long_name.push_str(" measured at ");
        long_name.push_str(height);
    }
    if let Some(time) = &info.time {
        long_name.push_str(" with time duration of ");
        long_name.push_str(time);
    }
    long_name
}

/// Map BUFR unit strings to CF units, moving table references into the long name
pub fn translate_units(units: &str, code: &str, long_name: String) -> (String, String) {
    match units {
        "deg" => ("degrees".to_string(), long_name),
        "Numeric" => ("1".to_string(), long_name),
        "CODE TABLE" => (
            "1".to_string(),
            format!("{} according to WMO code table {}", long_name, code),
        ),
        "FLAG TABLE" => (
            "1".to_string(),
            format!("{} according to WMO flag table {}", long_name, code),
        ),
        other => (other.to_string(), long_name),
    }
}

/// `coverage_content_type` of a data variable
pub fn coverage_content_type(name: &str, code: &str) -> &'static str {
    if name == LATITUDE || name == LONGITUDE {
        coverage::COORDINATE
    } else if name == TIME_COLUMN {
        coverage::REFERENCE
    } else if identifiers::ALL.contains(&name) || code.starts_with("001") || code.starts_with("002")
    {
        // table B classes 01 (identification) and 02 (instrumentation)
        coverage::THEMATIC
    } else {
        coverage::PHYSICAL
    }
}

fn coordinate_attributes(name: &str) -> Attributes {
    let units = if name == LATITUDE {
        "degrees_north"
    } else {
        "degrees_east"
    };
    let mut attributes = Attributes::new();
    set(&mut attributes, "long_name", name);
    set(&mut attributes, "standard_name", name);
    set(&mut attributes, "units", units);
    set(&mut attributes, "coverage_content_type", coverage::COORDINATE);
    attributes
}

fn time_attributes() -> Attributes {
    let mut attributes = Attributes::new();
    set(&mut attributes, "long_name", TIME_COLUMN);
    set(&mut attributes, "standard_name", TIME_COLUMN);
    set(&mut attributes, "units", TIME_UNITS);
    set(&mut attributes, "calendar", TIME_CALENDAR);
    set(&mut attributes, "coverage_content_type", coverage::REFERENCE);
    attributes
}

fn first_text(column: &Column) -> Option<String> {
    (0..column.len()).find_map(|i| match column.get(i).ok()? {
        AnyValue::Null => None,
        AnyValue::String(s) => Some(s.to_string()),
        AnyValue::StringOwned(s) => Some(s.to_string()),
        other => Some(other.to_string()),
    })
}

fn first_f64(column: &Column) -> Result<Option<f64>> {
    let values = column.cast(&DataType::Float64)?;
    Ok(values.f64()?.iter().flatten().next())
}

/// Builds datasets for one identifier scheme
#[derive(Clone)]
pub struct DatasetAnnotator {
    config: Arc<SynopConfig>,
    scheme: StationScheme,
    vocabulary: Arc<dyn StandardNameLookup>,
    created: DateTime<Utc>,
}

impl fmt::Debug for DatasetAnnotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetAnnotator")
            .field("scheme", &self.scheme)
            .field("created", &self.created)
            .finish()
    }
}

impl DatasetAnnotator {
    pub fn new(
        config: Arc<SynopConfig>,
        scheme: StationScheme,
        vocabulary: Arc<dyn StandardNameLookup>,
    ) -> Self {
        Self {
            config,
            scheme,
            vocabulary,
            created: Utc::now(),
        }
    }

    /// Fix the creation time written to `history` and `date_created`
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    fn standard_name(&self, normalized: &str) -> Option<String> {
        match self.vocabulary.lookup(normalized) {
            Ok(found) => found,
            Err(e) => {
                warn!("{}; continuing without standard name", e);
                None
            }
        }
    }

    /// Annotate one station's table
    pub fn annotate(&self, table: StationFrame) -> Result<Dataset> {
        let StationFrame {
            station,
            mut frame,
            variables,
            ..
        } = table;
        let fixed = self.scheme.feature_type() == FeatureType::TimeSeries;

        let mut lifted: BTreeMap<String, String> = BTreeMap::new();
        let mut scalars: BTreeMap<String, f32> = BTreeMap::new();
        let mut variable_attributes: BTreeMap<String, Attributes> = BTreeMap::new();
        let mut keyword_names: Vec<String> = Vec::new();
        let mut renames: Vec<(String, String)> = Vec::new();

        variable_attributes.insert(TIME_COLUMN.to_string(), time_attributes());

        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        for name in &names {
            let name = name.clone();
            if name == TIME_COLUMN {
                continue;
            }
            if identifiers::ALL.contains(&name.as_str()) {
                let column = frame.drop_in_place(&name)?;
                if let Some(value) = first_text(&column) {
                    lifted.insert(name, value);
                }
                continue;
            }
            if name == LATITUDE || name == LONGITUDE {
                if fixed {
                    let column = frame.drop_in_place(&name)?;
                    if let Some(value) = first_f64(&column)? {
                        scalars.insert(name.clone(), value as f32);
                    }
                }
                variable_attributes.insert(name.clone(), coordinate_attributes(&name));
                continue;
            }

            let (base, _) = naming::split_dedup_suffix(&name);
            let normalized = naming::normalize(base);
            let mut attributes = Attributes::new();

            if let Some(standard_name) = self.standard_name(&normalized) {
                set(&mut attributes, "standard_name", standard_name);
            }

            let humanized = naming::humanize(&normalized);
            let (long_name, units, code) = match variables.get(&name) {
                Some(info) => {
                    let long_name = describe_long_name(humanized, info);
                    let (units, long_name) = translate_units(&info.units, &info.code, long_name);
                    (long_name, Some(units), info.code.as_str())
                }
                None => (humanized, None, ""),
            };
            set(&mut attributes, "long_name", long_name);
            if let Some(units) = units {
                set(&mut attributes, "units", units);
            }
            set(
                &mut attributes,
                "coverage_content_type",
                coverage_content_type(base, code),
            );
            keyword_names.push(normalized);

            let mut renamed = naming::rename(&name);
            if renamed != name {
                if names.contains(&renamed) {
                    warn!(
                        "Cannot rename {} to {} for station {}: name taken",
                        name, renamed, station
                    );
                    renamed = name.clone();
                } else {
                    renames.push((name.clone(), renamed.clone()));
                }
            }
            variable_attributes.insert(renamed, attributes);
        }

        for (from, to) in renames {
            frame.rename(&from, to.as_str().into())?;
        }

        let keywords =
            keywords::collect_keywords(keyword_names.iter().map(String::as_str)).join(", ");
        let global_attributes = self.global_attributes(&station, &lifted, keywords);

        let mut dataset = Dataset {
            frame,
            scalars,
            variable_attributes,
            global_attributes,
        };
        apply_fill(&mut dataset)?;
        refresh_coverage(&mut dataset)?;

        debug!(
            "Annotated station {}: {} variables, {} global attributes",
            station,
            dataset.frame.width().saturating_sub(1),
            dataset.global_attributes.len()
        );
        Ok(dataset)
    }

    fn global_attributes(
        &self,
        station: &str,
        lifted: &BTreeMap<String, String>,
        keywords: String,
    ) -> Attributes {
        let author = &self.config.author;
        let output = &self.config.output;
        let site_name = lifted
            .get(identifiers::STATION_OR_SITE_NAME)
            .filter(|name| !name.is_empty());

        let (title, id) = match site_name {
            Some(site) => (
                format!(
                    "Measurements from {} with {} {}",
                    site,
                    self.scheme.title_label(),
                    station
                ),
                format!("{}, {}", site, station),
            ),
            None => (self.scheme.anonymous_title(station), station.to_string()),
        };

        let mut globals = Attributes::new();
        set(&mut globals, "featureType", self.scheme.feature_type().as_str());
        set(&mut globals, "title", title);
        set(&mut globals, "id", id);
        set(&mut globals, "naming_authority", NAMING_AUTHORITY);
        set(&mut globals, "source", output.source.as_str());
        set(&mut globals, "summary", output.summary.as_str());
        set(
            &mut globals,
            "history",
            format!(
                "{}: {}",
                self.created.format("%Y-%m-%d %H:%M:%S"),
                HISTORY_SUFFIX
            ),
        );
        set(
            &mut globals,
            "date_created",
            self.created.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        set(&mut globals, "keywords", keywords);
        set(&mut globals, "keywords_vocabulary", KEYWORDS_VOCABULARY);
        set(&mut globals, "standard_name_vocabulary", STANDARD_NAME_VOCABULARY);
        set(&mut globals, "Conventions", CONVENTIONS);
        set(&mut globals, "creator_type", author.creator_type.as_str());
        set(&mut globals, "institution", author.institution.as_str());
        set(&mut globals, "creator_name", author.creator_name.as_str());
        set(&mut globals, "creator_email", author.creator_email.as_str());
        set(&mut globals, "creator_url", author.creator_url.as_str());
        set(&mut globals, "publisher_name", author.publisher_name.as_str());
        set(&mut globals, "publisher_email", author.publisher_email.as_str());
        set(&mut globals, "publisher_url", author.publisher_url.as_str());
        set(&mut globals, "project", author.project.as_str());
        set(&mut globals, "license", author.license.as_str());

        if let Some(label) = lifted
            .get(identifiers::STATION_TYPE)
            .and_then(|code| station_type_label(code))
            .filter(|label| !label.is_empty())
        {
            set(&mut globals, "station_type", label);
        }
        globals
    }
}
