pub mod health;
pub mod pipeline;
pub mod provider;
pub mod shapes;
