pub mod load;
pub mod query;
pub mod run;
