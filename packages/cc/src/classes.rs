pub mod association;
pub mod basic;
pub mod battery;
pub mod configuration;
pub mod indicator;
pub mod manufacturer_specific;
pub mod meter;
pub mod multi_instance;
pub mod no_operation;
pub mod node_naming;
pub mod sensor_binary;
pub mod switch_all;
pub mod switch_binary;
pub mod switch_multilevel;
pub mod version;
pub mod wake_up;

pub use association::Association;
pub use basic::Basic;
pub use battery::Battery;
pub use configuration::Configuration;
pub use indicator::Indicator;
pub use manufacturer_specific::ManufacturerSpecific;
pub use meter::Meter;
pub use multi_instance::MultiInstance;
pub use no_operation::NoOperation;
pub use node_naming::NodeNaming;
pub use sensor_binary::SensorBinary;
pub use switch_all::SwitchAll;
pub use switch_binary::SwitchBinary;
pub use switch_multilevel::SwitchMultilevel;
pub use version::Version;
pub use wake_up::WakeUp;
