#![no_std]

pub mod debounce;
pub mod note;
pub mod poll;
pub mod report;
