pub mod pool;
pub mod size;
pub mod topology;
pub mod zone;
