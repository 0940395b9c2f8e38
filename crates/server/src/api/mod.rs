pub mod handlers;
pub mod orders;
pub mod routes;

pub use routes::create_router;
