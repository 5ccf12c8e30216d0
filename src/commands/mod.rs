pub mod companies;
pub mod dashboard;
pub mod posts;
pub mod settings;
