pub mod capture;
pub mod relations;
pub mod similarity;
pub mod validate;
