/// Marker searched for in dataset filenames when no boundaries file is named
pub const BOUNDARIES_MARKER: &str = "district";

/// Supported boundaries file extensions
pub const EXT_GEOPARQUET: &str = "parquet";
pub const EXT_GEOJSON: &str = "geojson";
pub const EXT_GEOPACKAGE: &str = "gpkg";
pub const BOUNDARY_EXTENSIONS: [&str; 3] = [EXT_GEOPARQUET, EXT_GEOJSON, EXT_GEOPACKAGE];

/// Raw extract file extension
pub const RAW_EXTENSION: &str = "grib";

/// Degrees added on every side of the boundaries extent
pub const BOUNDS_PADDING: f64 = 0.5;

/// Default pipeline parameters
pub const DEFAULT_START_DATE: &str = "2018-01-01";
pub const DEFAULT_RAW_DIR: &str = "data/era5/raw";
pub const DEFAULT_AGGREGATE_DIR: &str = "data/era5/aggregate";
pub const DEFAULT_IMPORT_DIR: &str = "data/era5/import";
pub const DEFAULT_FILES_ROOT: &str = ".";
pub const DEFAULT_TOOLBOX_PROGRAM: &str = "era5-toolbox";

/// Output column names
pub const BOUNDARY_ID_COLUMN: &str = "boundary_id";
pub const DEFAULT_GEOMETRY_COLUMN: &str = "geometry";

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 10000;

/// Parquet compression options
pub const COMPRESSION_SNAPPY: &str = "snappy";
pub const COMPRESSION_GZIP: &str = "gzip";
pub const COMPRESSION_LZ4: &str = "lz4";
pub const COMPRESSION_ZSTD: &str = "zstd";
pub const COMPRESSION_NONE: &str = "none";

/// DHIS2 import defaults
pub const DEFAULT_CATEGORY_OPTION_COMBO: &str = "HllvX50cXC0";
pub const DHIS2_MAX_POST_VALUES: usize = 1000;
pub const DHIS2_IMPORT_STRATEGY: &str = "CREATE_AND_UPDATE";
pub const IMPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
pub const PAYLOAD_FILENAME: &str = "payload.json";
pub const REPORT_FILENAME: &str = "report.json";
