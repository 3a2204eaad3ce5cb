// private sub-module defined in other files
mod user_defined_weights_filter;

// exports identifiers from private sub-modules in the current module namespace
pub use self::user_defined_weights_filter::UserDefinedWeightsFilter;
