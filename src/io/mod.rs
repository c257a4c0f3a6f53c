pub mod notebook_io;
pub mod recovery;

pub use notebook_io::{
    CONFIG_FILE, NotebookError, WriteOutcome, day_file_name, is_day_file_name, list_day_files,
    load_config, read_day_file, save_config, write_day_file,
};
