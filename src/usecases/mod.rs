pub mod table_controller;
pub mod table_state;
