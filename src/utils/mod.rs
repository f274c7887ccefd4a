//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    parse_prediction_line, prediction_log_path, DataLoader, FileFormat, PredictionLogReader,
};
