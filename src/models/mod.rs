pub mod boundary;
pub mod bounds;
pub mod grid;
pub mod statistics;
pub mod variable;

pub use boundary::{Boundaries, Boundary};
pub use bounds::BoundingBox;
pub use grid::{BoundaryMask, GridFrame, GridMetadata, GridStack};
pub use statistics::{DailyRecord, Frequency, PeriodRecord};
pub use variable::{
    TemporalAggregation, UnitConversion, VariableDescriptor, VariableRegistry, VariableToggles,
};
