pub mod correlator;
