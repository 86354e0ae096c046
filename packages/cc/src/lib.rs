pub mod classes;
pub mod commandclass;
pub mod prelude;
