pub mod checksum;
pub mod definitions;
pub mod group;
pub mod notification;
pub mod prelude;
pub mod values;
