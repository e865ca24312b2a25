pub mod fs;
pub mod path_validator;
pub mod ui;
