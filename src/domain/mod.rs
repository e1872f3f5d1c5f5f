// Domain layer
//
// Time windows, the export polling state machine, the transcoder seam and
// the segment exporter that ties them to the gateway client.

pub mod error;
pub mod exporter;
pub mod poller;
pub mod transcoder;
pub mod window;
