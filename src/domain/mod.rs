// Domain layer: pipeline data types and the delivery port. No network or filesystem access here.

pub mod model;
pub mod ports;
