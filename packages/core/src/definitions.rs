mod command_class_id;
mod command_type;
mod controller_caps;
mod device_class;
mod function_type;
mod ids;
mod query_stage;
mod transmit;

pub use command_class_id::*;
pub use command_type::*;
pub use controller_caps::*;
pub use device_class::*;
pub use function_type::*;
pub use ids::*;
pub use query_stage::*;
pub use transmit::*;
