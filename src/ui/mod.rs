pub mod pages;
pub mod panels;
