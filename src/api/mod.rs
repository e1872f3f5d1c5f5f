// CMS gateway client module
//
// HTTP communication with the vendor gateway:
// - session (login once, reuse jsession)
// - video file lookup and export task status
// - export download
// - GPS track detail

pub mod client;
pub mod error;
pub mod session;
pub mod task_url;
pub mod types;
