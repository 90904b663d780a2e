// Domain layer: data model and ports (interfaces). No external dependencies beyond std/serde/chrono/uuid.

pub mod model;
pub mod ports;
