pub mod core_utils;
