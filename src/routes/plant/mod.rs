mod handler;
mod model;

pub use handler::identify_plant;
pub use model::PlantIdClient;
