//! SYNOP Processor Library
//!
//! Converts WMO SYNOP surface observations encoded as BUFR into CF/ACDD
//! annotated NetCDF files, one file per station and calendar month.
//!
//! This library provides tools for:
//! - Decoding BUFR files through `bufr_dump` into flat record lists
//! - Attaching height and time-period qualifiers to the measurements they describe
//! - Routing subsets to stations under the block, state, WIGOS or ship identifier schemes
//! - Pivoting each station's reports into a time-indexed table
//! - Annotating variables and files with CF standard names, units and ACDD metadata
//! - Monthly rollover and merge-on-append of the station files

pub mod bufr;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod metadata;
pub mod models;
pub mod processor;
pub mod qualifier;
pub mod station;
pub mod store;
pub mod table;

pub use config::SynopConfig;
pub use error::{Result, SynopError};
pub use metadata::{Dataset, DatasetAnnotator};
pub use models::{ProcessingStats, Record, RecordValue, RunMode, StationScheme, StationScope, Subset};
pub use processor::StationProcessor;
pub use store::{DatasetStore, MemoryStore};
