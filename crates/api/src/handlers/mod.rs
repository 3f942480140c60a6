pub mod explain;
pub mod multipart;
pub mod predict;
pub mod uploads;
