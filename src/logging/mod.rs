pub mod dead_letter;
