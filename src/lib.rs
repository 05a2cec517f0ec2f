// B33 software CPU: interpreter, memory bus, devices and image loader

pub mod bus;
pub mod config;
pub mod control;
pub mod cpu;
pub mod device;
pub mod display;
pub mod error;
pub mod keys;
pub mod loader;
pub mod machine;
pub mod observer;
pub mod opcode;
pub mod operand;
pub mod registers;
pub mod symbols;

#[cfg(test)]
mod image_tests;
