mod password_file;

pub use password_file::{PasswordFileError, PasswordFileStore, parse_passwords};
