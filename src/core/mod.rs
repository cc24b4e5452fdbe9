//! Core data types, signal primitives and I/O operations.

pub mod loaders;
pub mod synthetic;
pub mod transforms;
pub mod writers;

pub use loaders::{load_recording_csv, LoaderError, Recording, Sample};
pub use writers::{
    write_group_results_csv, write_recording_csv, write_score_points_csv, GroupResultRow,
    WriteError,
};
