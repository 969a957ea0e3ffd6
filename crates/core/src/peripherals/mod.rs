pub mod ds1307;
pub mod gpio;
pub mod timer;
pub mod uart;
