pub mod analyze;
pub mod convert;
pub mod run;
pub mod train;
