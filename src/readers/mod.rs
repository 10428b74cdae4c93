pub mod boundary_reader;
pub mod dataset;
pub mod raw_extract;

pub use boundary_reader::{BoundaryFormat, BoundaryReader};
pub use dataset::{Dataset, DatasetFile, DatasetVersion, LocalDataset, MemoryDataset};
pub use raw_extract::RawExtractTree;
