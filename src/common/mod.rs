pub mod io;


pub use self::io::{RecordData, map_input, write_output};
