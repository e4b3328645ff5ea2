pub mod gs;
