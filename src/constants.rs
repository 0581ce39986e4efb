//! Application constants for the SYNOP processor
//!
//! WMO descriptor codes, decoder sentinel keys, fixed attribute strings
//! and default values used throughout the conversion pipeline.

// =============================================================================
// Decoder Output
// =============================================================================

/// Key that marks the start of a new data subset in `bufr_dump -j f` output
pub const SUBSET_SENTINEL_KEY: &str = "subsetNumber";

/// Default external decoder executable (ecCodes)
pub const DEFAULT_DUMP_COMMAND: &str = "bufr_dump";

/// Arguments that select flat JSON output
pub const DUMP_ARGS: &[&str] = &["-j", "f"];

/// Default input/output file prefix
pub const DEFAULT_FILE_PREFIX: &str = "syno";

// =============================================================================
// Qualifier Descriptors
// =============================================================================

/// Height of sensor above ground / deck / water surface (table B class 07)
pub const HEIGHT_QUALIFIER_CODES: &[&str] = &["007006", "007030", "007031", "007032", "007033"];

/// Time period or displacement, hours and minutes (table B class 04)
pub const TIME_QUALIFIER_CODES: &[&str] = &["004024", "004025"];

/// Records with this key never receive a height qualifier
pub const TIME_PERIOD_KEY: &str = "timePeriod";

/// Bookkeeping keys dropped before records become variables
pub const FILTERED_KEYS: &[&str] = &[
    "shortDelayedDescriptorReplicationFactor",
    "delayedDescriptorReplicationFactor",
    "instrumentationForWindMeasurement",
    "timeSignificance",
];

// =============================================================================
// Table Columns
// =============================================================================

/// Name of the time coordinate
pub const TIME_COLUMN: &str = "time";

/// Columns combined into the observation timestamp, in order
pub const TIMESTAMP_KEYS: [&str; 5] = ["year", "month", "day", "hour", "minute"];

pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

/// Identifier and bookkeeping fields lifted out of the data into global attributes
pub mod identifiers {
    pub const BLOCK_NUMBER: &str = "blockNumber";
    pub const STATION_NUMBER: &str = "stationNumber";
    pub const STATE_IDENTIFIER: &str = "stateIdentifier";
    pub const NATIONAL_STATION_NUMBER: &str = "nationalStationNumber";
    pub const STATION_OR_SITE_NAME: &str = "stationOrSiteName";
    pub const STATION_TYPE: &str = "stationType";
    pub const WIGOS_SERIES: &str = "wigosIdentifierSeries";
    pub const WIGOS_ISSUER: &str = "wigosIssuerOfIdentifier";
    pub const WIGOS_ISSUE_NUMBER: &str = "wigosIssueNumber";
    pub const WIGOS_LOCAL: &str = "wigosLocalIdentifierCharacter";
    pub const SHIP_IDENTIFIER: &str = "shipOrMobileLandStationIdentifier";

    pub const ALL: &[&str] = &[
        BLOCK_NUMBER,
        STATION_NUMBER,
        STATE_IDENTIFIER,
        NATIONAL_STATION_NUMBER,
        STATION_OR_SITE_NAME,
        STATION_TYPE,
        WIGOS_SERIES,
        WIGOS_ISSUER,
        WIGOS_ISSUE_NUMBER,
        WIGOS_LOCAL,
        SHIP_IDENTIFIER,
    ];
}

// =============================================================================
// CF / ACDD Metadata
// =============================================================================

/// Sentinel for missing values, also written as `_FillValue`
pub const FILL_VALUE: i32 = -9999;
pub const FILL_VALUE_F32: f32 = -9999.0;
pub const FILL_VALUE_TEXT: &str = "-9999";

pub const TIME_UNITS: &str = "seconds since 1970-01-01 00:00:00";
pub const TIME_CALENDAR: &str = "standard";

pub const NAMING_AUTHORITY: &str = "World Meteorological Organization (WMO)";
pub const STANDARD_NAME_VOCABULARY: &str = "CF Standard Name V79";
pub const CONVENTIONS: &str = "ACDD-1.3, CF-1.6";
pub const KEYWORDS_VOCABULARY: &str =
    "GCMDSK:GCMD Science Keywords:https://gcmd.earthdata.nasa.gov/kms/concepts/concept_scheme/sciencekeywords";
pub const HISTORY_SUFFIX: &str = "Data converted from BUFR to NetCDF-CF";

/// Display format of `time_coverage_start` / `time_coverage_end`
pub const COVERAGE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format embedded in output file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Timestamp format embedded in input file names
pub const INPUT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H";

/// Deflate level used for every compressed variable
pub const DEFLATE_LEVEL: i32 = 5;

/// Coverage content types (ACDD-1.3)
pub mod coverage {
    pub const THEMATIC: &str = "thematicClassification";
    pub const COORDINATE: &str = "coordinate";
    pub const REFERENCE: &str = "referenceInformation";
    pub const PHYSICAL: &str = "physicalMeasurement";
}

/// Time unit words that trigger the leading-digit rename
pub const TIME_UNIT_WORDS: &[&str] = &["hour", "second", "minute", "year", "month", "day"];

/// WMO code table 002001, type of station
pub fn station_type_label(code: &str) -> Option<&'static str> {
    match code {
        "0" => Some("AUTOMATIC STATION"),
        "1" => Some("MANNED STATION"),
        "2" => Some("HYBRID, BOTH MANNED AND AUTOMATIC"),
        "3" => Some(""),
        _ => None,
    }
}
