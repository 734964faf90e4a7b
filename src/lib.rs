pub mod error;
pub mod geo;
pub mod gsl;
pub mod isl;
pub mod net;
pub mod partition;
pub mod sim;
pub mod topo;

#[cfg(test)]
mod test;
