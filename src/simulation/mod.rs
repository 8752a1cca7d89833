pub mod controller;

pub use controller::SimulationController;
