pub mod open_file_service;
