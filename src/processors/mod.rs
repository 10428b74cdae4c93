pub mod temporal;
pub mod zonal;

pub use temporal::TemporalAggregator;
pub use zonal::ZonalAggregator;
