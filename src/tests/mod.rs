mod fixtures;

mod boundary;
mod json;
